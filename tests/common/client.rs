//! HTTP client for end-to-end tests
//!
//! This module wraps reqwest and provides one method per server endpoint.
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::multipart::{Form, Part};
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ========================================================================
    // Server Info
    // ========================================================================

    /// GET /
    pub async fn home(&self) -> Response {
        self.client
            .get(self.url("/"))
            .send()
            .await
            .expect("Home request failed")
    }

    /// GET /api/meta
    pub async fn meta(&self) -> Response {
        self.client
            .get(self.url("/api/meta"))
            .send()
            .await
            .expect("Meta request failed")
    }

    // ========================================================================
    // Collections (tracks, mhouse, banners, youtube)
    // ========================================================================

    /// GET /api/{collection}
    pub async fn list(&self, collection: &str) -> Response {
        self.client
            .get(self.url(&format!("/api/{}", collection)))
            .send()
            .await
            .expect("List request failed")
    }

    /// GET /api/{collection} and decode the array
    pub async fn list_json(&self, collection: &str) -> Vec<Value> {
        let response = self.list(collection).await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        response.json().await.expect("List response is not an array")
    }

    /// GET /api/{collection}?id={id}
    pub async fn get_by_query(&self, collection: &str, id: i64) -> Response {
        self.client
            .get(self.url(&format!("/api/{}?id={}", collection, id)))
            .send()
            .await
            .expect("Get request failed")
    }

    /// GET /api/{collection}/{id}
    pub async fn get(&self, collection: &str, id: i64) -> Response {
        self.client
            .get(self.url(&format!("/api/{}/{}", collection, id)))
            .send()
            .await
            .expect("Get request failed")
    }

    /// POST /api/{collection}
    pub async fn create(&self, collection: &str, body: Value) -> Response {
        self.client
            .post(self.url(&format!("/api/{}", collection)))
            .json(&body)
            .send()
            .await
            .expect("Create request failed")
    }

    /// POST /api/{collection} and return the id of the created entry
    pub async fn create_id(&self, collection: &str, envelope: &str, body: Value) -> i64 {
        let response = self.create(collection, body).await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        body[envelope]["id"].as_i64().expect("Created entry has no id")
    }

    /// PUT /api/{collection}/{id}
    pub async fn update(&self, collection: &str, id: i64, body: Value) -> Response {
        self.client
            .put(self.url(&format!("/api/{}/{}", collection, id)))
            .json(&body)
            .send()
            .await
            .expect("Update request failed")
    }

    /// PUT /api/{collection}?id={id}
    pub async fn update_by_query(&self, collection: &str, id: i64, body: Value) -> Response {
        self.client
            .put(self.url(&format!("/api/{}?id={}", collection, id)))
            .json(&body)
            .send()
            .await
            .expect("Update request failed")
    }

    /// DELETE /api/{collection}/{id}
    pub async fn delete(&self, collection: &str, id: i64) -> Response {
        self.client
            .delete(self.url(&format!("/api/{}/{}", collection, id)))
            .send()
            .await
            .expect("Delete request failed")
    }

    /// DELETE /api/{collection}?id={id}
    pub async fn delete_by_query(&self, collection: &str, id: i64) -> Response {
        self.client
            .delete(self.url(&format!("/api/{}?id={}", collection, id)))
            .send()
            .await
            .expect("Delete request failed")
    }

    // ========================================================================
    // Settings
    // ========================================================================

    /// GET /api/settings?key={key}
    pub async fn get_setting(&self, key: &str) -> Response {
        self.client
            .get(self.url("/api/settings"))
            .query(&[("key", key)])
            .send()
            .await
            .expect("Get setting request failed")
    }

    /// GET /api/settings without a key
    pub async fn get_setting_without_key(&self) -> Response {
        self.client
            .get(self.url("/api/settings"))
            .send()
            .await
            .expect("Get setting request failed")
    }

    /// POST /api/settings
    pub async fn put_setting(&self, key: &str, value: &str) -> Response {
        self.client
            .post(self.url("/api/settings"))
            .json(&json!({ "key": key, "value": value }))
            .send()
            .await
            .expect("Put setting request failed")
    }

    /// POST /api/settings with a raw body
    pub async fn put_setting_json(&self, body: Value) -> Response {
        self.client
            .post(self.url("/api/settings"))
            .json(&body)
            .send()
            .await
            .expect("Put setting request failed")
    }

    /// POST /api/settings/verify
    pub async fn verify_setting(&self, key: &str, value: &str) -> Response {
        self.client
            .post(self.url("/api/settings/verify"))
            .json(&json!({ "key": key, "value": value }))
            .send()
            .await
            .expect("Verify setting request failed")
    }

    // ========================================================================
    // Stats
    // ========================================================================

    /// POST /api/stats for the main track catalog
    pub async fn post_stat(&self, id: i64, kind: &str) -> Response {
        self.post_stat_json(json!({ "id": id, "type": kind })).await
    }

    /// POST /api/stats for a given catalog
    pub async fn post_stat_in(&self, catalog: &str, id: i64, kind: &str) -> Response {
        self.post_stat_json(json!({ "id": id, "type": kind, "catalog": catalog }))
            .await
    }

    /// POST /api/stats with a raw body
    pub async fn post_stat_json(&self, body: Value) -> Response {
        self.client
            .post(self.url("/api/stats"))
            .json(&body)
            .send()
            .await
            .expect("Stats request failed")
    }

    // ========================================================================
    // Uploads
    // ========================================================================

    /// POST /api/upload
    pub async fn upload(
        &self,
        title: Option<&str>,
        image: Option<(&str, &'static [u8])>,
        audio: Option<(&str, &'static [u8])>,
    ) -> Response {
        let mut form = Form::new();
        if let Some(title) = title {
            form = form.text("title", title.to_string());
        }
        if let Some((file_name, data)) = image {
            form = form.part("image", Part::bytes(data).file_name(file_name.to_string()));
        }
        if let Some((file_name, data)) = audio {
            form = form.part("audio", Part::bytes(data).file_name(file_name.to_string()));
        }
        self.client
            .post(self.url("/api/upload"))
            .multipart(form)
            .send()
            .await
            .expect("Upload request failed")
    }

    /// GET a path relative to the site root (e.g. an uploaded file)
    pub async fn get_path(&self, path: &str) -> Response {
        self.client
            .get(self.url(&format!("/{}", path.trim_start_matches('/'))))
            .send()
            .await
            .expect("Request failed")
    }
}
