use anyhow::{Context, Result};
use clap::Parser;
use std::{fmt::Debug, path::PathBuf};
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use media_catalog_server::config::{AppConfig, CliConfig, FileConfig, UPLOADS_PUBLIC_PREFIX};
use media_catalog_server::{resolve_backend, run_server, RequestsLoggingLevel, ServerConfig};
use media_catalog_server::UploadStore;

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to the SQLite database file. Without it the catalog is kept in
    /// JSON files under --data-dir.
    #[clap(long, env = "DB_PATH", value_parser = parse_path)]
    pub db_path: Option<PathBuf>,

    /// Directory of the JSON collection files (file mode).
    #[clap(long, default_value = "data", value_parser = parse_path)]
    pub data_dir: PathBuf,

    /// Directory uploaded images and audio files are written to.
    #[clap(long, default_value = "assets/uploads", value_parser = parse_path)]
    pub uploads_dir: PathBuf,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3000)]
    pub port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    /// Number of read-only SQLite connections.
    #[clap(long, default_value_t = 4)]
    pub read_pool_size: usize,

    /// Do not write the default records into collections without a file.
    #[clap(long)]
    pub no_seed: bool,

    /// Path to a TOML config file. Its values override command line values.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_path: self.db_path.clone(),
            data_dir: self.data_dir.clone(),
            uploads_dir: self.uploads_dir.clone(),
            port: self.port,
            logging_level: self.logging_level.clone(),
            frontend_dir_path: self.frontend_dir_path.clone(),
            read_pool_size: self.read_pool_size,
            seed: !self.no_seed,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let app_config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    let backend = resolve_backend(&app_config.storage_settings());
    info!("Catalog backend: {}", backend.mode);

    let uploads = UploadStore::new(&app_config.uploads_dir, UPLOADS_PUBLIC_PREFIX);

    let server_config = ServerConfig {
        requests_logging_level: app_config.logging_level.clone(),
        port: app_config.port,
        frontend_dir_path: app_config.frontend_dir_path.clone(),
        uploads_dir: app_config.uploads_dir.clone(),
    };

    info!("Ready to serve at port {}!", app_config.port);
    run_server(server_config, backend, uploads).await
}
