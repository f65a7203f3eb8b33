mod file_config;

pub use file_config::FileConfig;

use crate::server::RequestsLoggingLevel;
use crate::storage::StorageSettings;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;

/// URL prefix uploaded files are served under and recorded with.
pub const UPLOADS_PUBLIC_PREFIX: &str = "assets/uploads";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub data_dir: PathBuf,
    pub uploads_dir: PathBuf,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub read_pool_size: usize,
    pub seed: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite database file. `None` runs the catalog from JSON files.
    pub db_path: Option<PathBuf>,
    pub data_dir: PathBuf,
    pub uploads_dir: PathBuf,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub read_pool_size: usize,
    pub seed: bool,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_path = file
            .db_path
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone());

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| cli.data_dir.clone());
        if data_dir.exists() && !data_dir.is_dir() {
            bail!("data_dir is not a directory: {:?}", data_dir);
        }

        let uploads_dir = file
            .uploads_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| cli.uploads_dir.clone());
        if uploads_dir.exists() && !uploads_dir.is_dir() {
            bail!("uploads_dir is not a directory: {:?}", uploads_dir);
        }

        let port = file.port.unwrap_or(cli.port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let frontend_dir_path = file
            .frontend_dir_path
            .or_else(|| cli.frontend_dir_path.clone());
        if let Some(frontend) = &frontend_dir_path {
            if !PathBuf::from(frontend).is_dir() {
                bail!("Frontend directory does not exist: {:?}", frontend);
            }
        }

        let read_pool_size = file.read_pool_size.unwrap_or(cli.read_pool_size);
        if read_pool_size == 0 {
            bail!("read_pool_size must be at least 1");
        }

        let seed = file.seed.unwrap_or(cli.seed);

        Ok(Self {
            db_path,
            data_dir,
            uploads_dir,
            port,
            logging_level,
            frontend_dir_path,
            read_pool_size,
            seed,
        })
    }

    pub fn storage_settings(&self) -> StorageSettings {
        StorageSettings {
            db_path: self.db_path.clone(),
            data_dir: self.data_dir.clone(),
            read_pool_size: self.read_pool_size,
            seed: self.seed,
        }
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
