use axum::extract::FromRef;

use crate::catalog::stats::StatsCounter;
use crate::catalog::SettingsRepository;
use crate::storage::{GuardedBackend, ResolvedBackend};
use crate::upload::UploadStore;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedUploadStore = Arc<UploadStore>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub backend: ResolvedBackend,
    pub settings: SettingsRepository,
    pub stats: StatsCounter,
    pub uploads: GuardedUploadStore,
}

impl ServerState {
    pub fn new(config: ServerConfig, backend: ResolvedBackend, uploads: UploadStore) -> Self {
        ServerState {
            config,
            start_time: Instant::now(),
            settings: SettingsRepository::new(backend.backend.clone()),
            stats: StatsCounter::new(backend.backend.clone()),
            backend,
            uploads: Arc::new(uploads),
        }
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for GuardedBackend {
    fn from_ref(input: &ServerState) -> Self {
        input.backend.backend.clone()
    }
}

impl FromRef<ServerState> for SettingsRepository {
    fn from_ref(input: &ServerState) -> Self {
        input.settings.clone()
    }
}

impl FromRef<ServerState> for StatsCounter {
    fn from_ref(input: &ServerState) -> Self {
        input.stats.clone()
    }
}

impl FromRef<ServerState> for GuardedUploadStore {
    fn from_ref(input: &ServerState) -> Self {
        input.uploads.clone()
    }
}
