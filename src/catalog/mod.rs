//! Typed repositories on top of the storage backends.
//!
//! A [`Repository`] is parametrised by an [`Entity`] (the record shape and
//! its defaulting rules) and by the [`Collection`] it reads and writes, so the
//! same `Track` repository serves both the main catalog and M-House.

mod models;
mod settings;
pub mod stats;

pub use models::{
    Banner, BannerDraft, BannerPatch, MhouseTrack, Track, TrackDraft, TrackPatch, TrackStats,
    YoutubeDraft, YoutubeEntry, YoutubePatch,
};
pub use settings::{fingerprint, SettingsRepository, MASTER_PASSWORD_KEY};

use crate::storage::{format_timestamp, Collection, GuardedBackend, Record};
use anyhow::anyhow;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{0}")]
    Validation(String),

    #[error("No {collection} entry with id {id}")]
    NotFound { collection: Collection, id: i64 },

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// A record shape stored in one or more collections.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Body of a create request.
    type Draft: DeserializeOwned + Send + 'static;
    /// Body of an update request; every field is optional.
    type Patch: DeserializeOwned + Send + 'static;

    /// Key the record is wrapped in for single-record responses.
    const NAME: &'static str;

    /// Validates a draft and returns the complete set of fields to store,
    /// defaults included.
    fn prepare_create(draft: Self::Draft, now: &str) -> Result<Record, CatalogError>;

    /// Returns the fields to merge into `existing`. Fields the caller did not
    /// send are left out so the stored values survive.
    fn prepare_update(
        existing: &Record,
        patch: Self::Patch,
        now: &str,
    ) -> Result<Record, CatalogError>;
}

pub(crate) fn decode<E: DeserializeOwned>(record: Record) -> Result<E, CatalogError> {
    serde_json::from_value(Value::Object(record))
        .map_err(|err| CatalogError::Backend(anyhow!("Stored record has an unexpected shape: {}", err)))
}

/// Rejects blank values of a required text field.
pub(crate) fn require_text(field: &str, value: Option<String>) -> Result<String, CatalogError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(CatalogError::Validation(format!("{} is required", field))),
    }
}

pub struct Repository<E: Entity> {
    backend: GuardedBackend,
    collection: Collection,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Repository {
            backend: self.backend.clone(),
            collection: self.collection,
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Repository<E> {
    pub fn new(backend: GuardedBackend, collection: Collection) -> Self {
        Repository {
            backend,
            collection,
            _entity: PhantomData,
        }
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    fn not_found(&self, id: i64) -> CatalogError {
        CatalogError::NotFound {
            collection: self.collection,
            id,
        }
    }

    pub fn list(&self) -> Result<Vec<E>, CatalogError> {
        self.backend
            .list(self.collection)?
            .into_iter()
            .map(decode)
            .collect()
    }

    pub fn get(&self, id: i64) -> Result<E, CatalogError> {
        match self.backend.get(self.collection, id)? {
            Some(record) => decode(record),
            None => Err(self.not_found(id)),
        }
    }

    pub fn create(&self, draft: E::Draft) -> Result<E, CatalogError> {
        let now = format_timestamp(&Utc::now());
        let fields = E::prepare_create(draft, &now)?;
        let stored = self.backend.insert(self.collection, fields)?;
        decode(stored)
    }

    pub fn update(&self, id: i64, patch: E::Patch) -> Result<E, CatalogError> {
        let existing = self
            .backend
            .get(self.collection, id)?
            .ok_or_else(|| self.not_found(id))?;
        let now = format_timestamp(&Utc::now());
        let fields = E::prepare_update(&existing, patch, &now)?;
        match self.backend.update(self.collection, id, fields)? {
            Some(updated) => decode(updated),
            None => Err(self.not_found(id)),
        }
    }

    pub fn delete(&self, id: i64) -> Result<(), CatalogError> {
        if self.backend.delete(self.collection, id)? {
            Ok(())
        } else {
            Err(self.not_found(id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileBackend, SqliteBackend, StorageBackend};
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn backends() -> (TempDir, Vec<GuardedBackend>) {
        let dir = TempDir::new().unwrap();
        let sqlite: Arc<dyn StorageBackend> =
            Arc::new(SqliteBackend::open(dir.path().join("catalog.db"), 1).unwrap());
        let file: Arc<dyn StorageBackend> =
            Arc::new(FileBackend::new(dir.path().join("data"), false));
        (dir, vec![sqlite, file])
    }

    fn draft<T: DeserializeOwned>(value: Value) -> T {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn created_track_gets_id_date_and_zeroed_stats() {
        let (_dir, backends) = backends();
        for backend in backends {
            let repo = Repository::<Track>::new(backend, Collection::Tracks);
            let track = repo
                .create(draft(json!({
                    "title": "A",
                    "genre": "House",
                    "uploadDate": "1999-01-01T00:00:00.000Z",
                    "stats": { "views": 50, "plays": 9 }
                })))
                .unwrap();

            assert_eq!(track.id, 1);
            assert_eq!(track.genre.as_deref(), Some("House"));
            assert_eq!(track.stats, TrackStats::default());
            assert_ne!(track.upload_date.as_deref(), Some("1999-01-01T00:00:00.000Z"));
            assert!(track.upload_date.is_some());
        }
    }

    #[test]
    fn create_without_title_is_rejected_before_storage() {
        let (_dir, backends) = backends();
        for backend in backends {
            let repo = Repository::<Track>::new(backend.clone(), Collection::Mhouse);
            let err = repo.create(draft(json!({ "title": "  ", "genre": "House" })));
            assert!(matches!(err, Err(CatalogError::Validation(_))));
            assert!(backend.list(Collection::Mhouse).unwrap().is_empty());
        }
    }

    #[test]
    fn update_is_a_partial_merge() {
        let (_dir, backends) = backends();
        for backend in backends {
            let repo = Repository::<Track>::new(backend, Collection::Tracks);
            let created = repo
                .create(draft(json!({ "title": "A", "genre": "House", "image": "a.png" })))
                .unwrap();

            let updated = repo
                .update(
                    created.id,
                    draft(json!({ "genre": "Techno", "stats": { "views": 99 } })),
                )
                .unwrap();
            assert_eq!(updated.id, created.id);
            assert_eq!(updated.title, "A");
            assert_eq!(updated.image.as_deref(), Some("a.png"));
            assert_eq!(updated.genre.as_deref(), Some("Techno"));
            assert_eq!(updated.upload_date, created.upload_date);
            assert_eq!(updated.stats, TrackStats::default());
        }
    }

    #[test]
    fn blanking_a_required_field_is_rejected() {
        let (_dir, backends) = backends();
        for backend in backends {
            let repo = Repository::<Banner>::new(backend, Collection::Banners);
            let banner = repo
                .create(draft(json!({ "imagePath": "assets/uploads/a.png" })))
                .unwrap();
            let err = repo.update(banner.id, draft(json!({ "imagePath": "" })));
            assert!(matches!(err, Err(CatalogError::Validation(_))));
            assert_eq!(repo.get(banner.id).unwrap().image_path, "assets/uploads/a.png");
        }
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let (_dir, backends) = backends();
        for backend in backends {
            let repo = Repository::<YoutubeEntry>::new(backend, Collection::Youtube);
            repo.create(draft(json!({ "videoId": "abc" }))).unwrap();

            assert!(matches!(repo.get(999), Err(CatalogError::NotFound { id: 999, .. })));
            assert!(matches!(
                repo.update(999, draft(json!({ "title": "x" }))),
                Err(CatalogError::NotFound { .. })
            ));
            assert!(matches!(repo.delete(999), Err(CatalogError::NotFound { .. })));
            assert_eq!(repo.list().unwrap().len(), 1);
        }
    }

    #[test]
    fn both_backends_return_the_same_shape() {
        let (_dir, backends) = backends();
        let shapes: Vec<Value> = backends
            .into_iter()
            .map(|backend| {
                let repo = Repository::<Banner>::new(backend, Collection::Banners);
                repo.create(draft(json!({ "image_path": "b.png", "display_order": "2" })))
                    .unwrap();
                repo.create(draft(json!({ "imagePath": "a.png", "linkUrl": "https://a" })))
                    .unwrap();
                serde_json::to_value(repo.list().unwrap()).unwrap()
            })
            .collect();

        assert_eq!(shapes[0], shapes[1]);
        assert_eq!(
            shapes[0],
            json!([
                { "id": 2, "imagePath": "a.png", "linkUrl": "https://a", "displayOrder": 0 },
                { "id": 1, "imagePath": "b.png", "linkUrl": null, "displayOrder": 2 },
            ])
        );
    }
}
