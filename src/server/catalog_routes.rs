//! CRUD routes shared by every catalog collection.
//!
//! The same handlers serve `/api/tracks`, `/api/mhouse`, `/api/banners` and
//! `/api/youtube`; they only differ by the entity type and the collection of
//! the repository they are given as state.

use super::error::ApiError;
use crate::catalog::{CatalogError, Entity, Repository};
use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::info;

#[derive(Deserialize, Debug)]
pub(super) struct IdQuery {
    pub id: Option<String>,
}

pub(super) fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ApiError::BadRequest(format!("Invalid id: {}", raw)))
}

fn required_id(query: Result<Query<IdQuery>, QueryRejection>) -> Result<i64, ApiError> {
    match query?.0.id {
        Some(raw) if !raw.trim().is_empty() => parse_id(&raw),
        _ => Err(ApiError::BadRequest("ID is required".to_string())),
    }
}

/// `{"success": true, "<name>": record}`
fn envelope<E: Entity>(entity: &E) -> Result<Response, ApiError> {
    let record = serde_json::to_value(entity)
        .map_err(|err| ApiError::Catalog(CatalogError::Backend(err.into())))?;
    let mut body = Map::new();
    body.insert("success".to_string(), Value::Bool(true));
    body.insert(E::NAME.to_string(), record);
    Ok(Json(Value::Object(body)).into_response())
}

async fn list_or_get<E: Entity>(
    State(repository): State<Repository<E>>,
    query: Result<Query<IdQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    match query?.0.id {
        Some(raw) if !raw.trim().is_empty() => envelope(&repository.get(parse_id(&raw)?)?),
        _ => Ok(Json(repository.list()?).into_response()),
    }
}

async fn get_one<E: Entity>(
    State(repository): State<Repository<E>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    envelope(&repository.get(parse_id(&id)?)?)
}

async fn create<E: Entity>(
    State(repository): State<Repository<E>>,
    payload: Result<Json<E::Draft>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(draft) = payload?;
    let created = repository.create(draft)?;
    info!("Created {} entry", repository.collection());
    envelope(&created)
}

async fn update<E: Entity>(
    repository: Repository<E>,
    id: i64,
    payload: Result<Json<E::Patch>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(patch) = payload?;
    let updated = repository.update(id, patch)?;
    info!("Updated {} entry {}", repository.collection(), id);
    envelope(&updated)
}

async fn update_one<E: Entity>(
    State(repository): State<Repository<E>>,
    Path(id): Path<String>,
    payload: Result<Json<E::Patch>, JsonRejection>,
) -> Result<Response, ApiError> {
    update(repository, parse_id(&id)?, payload).await
}

async fn update_by_query<E: Entity>(
    State(repository): State<Repository<E>>,
    query: Result<Query<IdQuery>, QueryRejection>,
    payload: Result<Json<E::Patch>, JsonRejection>,
) -> Result<Response, ApiError> {
    update(repository, required_id(query)?, payload).await
}

fn delete<E: Entity>(repository: &Repository<E>, id: i64) -> Result<Response, ApiError> {
    repository.delete(id)?;
    info!("Deleted {} entry {}", repository.collection(), id);
    Ok(Json(json!({ "success": true })).into_response())
}

async fn delete_one<E: Entity>(
    State(repository): State<Repository<E>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    delete(&repository, parse_id(&id)?)
}

async fn delete_by_query<E: Entity>(
    State(repository): State<Repository<E>>,
    query: Result<Query<IdQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    delete(&repository, required_id(query)?)
}

/// Routes for one collection:
/// - GET /api/{name} - List, or one entry with `?id=`
/// - POST /api/{name} - Create
/// - PUT /api/{name}?id= - Update
/// - DELETE /api/{name}?id= - Delete
/// - GET|PUT|DELETE /api/{name}/{id} - Same, id in the path
pub fn collection_routes<E: Entity>(repository: Repository<E>) -> Router {
    let name = repository.collection().name();
    Router::new()
        .route(
            &format!("/api/{}", name),
            get(list_or_get::<E>)
                .post(create::<E>)
                .put(update_by_query::<E>)
                .delete(delete_by_query::<E>),
        )
        .route(
            &format!("/api/{}/{{id}}", name),
            get(get_one::<E>)
                .put(update_one::<E>)
                .delete(delete_one::<E>),
        )
        .with_state(repository)
}
