//! Media catalog server library.
//!
//! Serves the tracks, M-House, banner and YouTube collections of the
//! storefront, plus settings, play/download counters and file uploads, from
//! SQLite or from plain JSON files.

pub mod catalog;
pub mod config;
pub mod server;
pub mod sqlite_persistence;
pub mod storage;
pub mod upload;

// Re-export commonly used types for convenience
pub use server::{make_app, run_server, RequestsLoggingLevel, ServerConfig};
pub use storage::{resolve_backend, BackendMode, ResolvedBackend, StorageSettings};
pub use upload::UploadStore;
