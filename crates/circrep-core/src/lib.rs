pub mod app_config;
pub mod circuit;
pub mod config;
pub mod telemetry;

pub use app_config::{AppConfig, Environment};
pub use circuit::{sanitize_path_component, CircuitRow, REQUIRED_COLUMNS};
pub use config::{load_app_config, load_app_config_from_env};
pub use telemetry::{RawRate, RawTimestamp, TelemetryRecord};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
