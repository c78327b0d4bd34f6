//! Configuration management for the pipeline.
//!
//! Loads settings from, in priority order:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (`PIPELINE__<section>__<key>`, highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use hsds_pipeline::config::PipelineConfig;
//!
//! let config = PipelineConfig::load().expect("failed to load configuration");
//! println!("broker: {}", config.broker_url);
//! ```

mod models;
mod sources;
mod validation;

pub use models::{
    GeocoderConfig, GeocoderProviderKind, LlmConfig, LlmProviderKind, PipelineConfig,
    PublisherConfig, ReconcilerConfig, TelemetryConfig, ValidatorConfig, WorkerConfig,
};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("configuration validation failed: {0}")]
    Validation(#[from] ValidationError),
}

impl PipelineConfig {
    /// Load configuration from all sources (file + environment) and validate it.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path, useful for tests.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn load_from_path_validates() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(
            &config_path,
            r#"
broker_url = "fjall://data/broker"
db_url = "postgres://localhost/pantry"
content_store_path = "data/content_store"
"#,
        )
        .unwrap();

        let config = PipelineConfig::load_from_path(config_path).unwrap();
        assert_eq!(config.worker.count_per_queue, 1);
    }
}
