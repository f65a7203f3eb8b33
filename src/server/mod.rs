mod catalog_routes;
pub mod config;
mod error;
mod http_layers;
pub mod server;
pub mod state;
mod upload_routes;

pub use config::ServerConfig;
pub use error::{ApiError, ErrorResponse};
pub use http_layers::*;
pub use server::{make_app, run_server};
