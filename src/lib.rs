pub mod api;
pub mod config;
pub mod enricher;
pub mod llm;
pub mod models;
pub mod service;
pub mod store;

pub use api::{create_app, AppState};
pub use config::{Config, Credential};
pub use service::MovieService;
