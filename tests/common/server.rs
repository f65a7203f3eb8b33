//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own database or data directory.

use super::constants::*;
use media_catalog_server::{
    make_app, resolve_backend, BackendMode, RequestsLoggingLevel, ServerConfig, StorageSettings,
    UploadStore,
};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Which storage the test server is started with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestStorage {
    /// A fresh SQLite database file.
    Sqlite,
    /// JSON files, no database configured.
    Files,
    /// A database path that cannot be opened, so the server falls back to files.
    UnreachableDatabase,
}

/// Test server instance with isolated storage
///
/// When dropped, the server gracefully shuts down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// The backend the server resolved at startup
    pub mode: BackendMode,

    /// Directory of the JSON collection files
    pub data_dir: PathBuf,

    /// Directory uploads are written to
    pub uploads_dir: PathBuf,

    // Private fields - keep resources alive until drop
    _temp_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a server on an empty SQLite catalog
    pub async fn spawn() -> Self {
        Self::spawn_with(TestStorage::Sqlite, false).await
    }

    /// Spawns a server on an empty file-mode catalog
    pub async fn spawn_file_mode() -> Self {
        Self::spawn_with(TestStorage::Files, false).await
    }

    /// Spawns a server on a random port
    ///
    /// This function:
    /// 1. Creates a temporary directory for the database, JSON files and uploads
    /// 2. Resolves the storage backend the same way the binary does
    /// 3. Binds to a random port (127.0.0.1:0)
    /// 4. Spawns the server in a background task
    /// 5. Waits for the server to be ready
    ///
    /// # Panics
    ///
    /// Panics if port binding fails or the server doesn't become ready within timeout.
    pub async fn spawn_with(storage: TestStorage, seed: bool) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let data_dir = temp_dir.path().join("data");
        let uploads_dir = temp_dir.path().join("uploads");

        let db_path = match storage {
            TestStorage::Sqlite => Some(temp_dir.path().join("catalog.db")),
            TestStorage::Files => None,
            TestStorage::UnreachableDatabase => Some(
                temp_dir
                    .path()
                    .join("no-such-directory")
                    .join("catalog.db"),
            ),
        };

        let backend = resolve_backend(&StorageSettings {
            db_path,
            data_dir: data_dir.clone(),
            read_pool_size: 2,
            seed,
        });
        let mode = backend.mode;

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let base_url = format!("http://127.0.0.1:{}", port);

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            frontend_dir_path: None,
            uploads_dir: uploads_dir.clone(),
        };
        let uploads = UploadStore::new(&uploads_dir, "assets/uploads");
        let app = make_app(config, backend, uploads);

        // Spawn server in background task with graceful shutdown
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            mode,
            data_dir,
            uploads_dir,
            _temp_dir: temp_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling the home endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Send shutdown signal
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
        // TempDir will be cleaned up automatically
    }
}
