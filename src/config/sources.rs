use super::models::PipelineConfig;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "PIPELINE_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/pipeline.toml";
const ENV_PREFIX: &str = "PIPELINE";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in struct `Default` impls)
/// 2. TOML file (if present)
/// 3. Environment variables (highest priority)
pub fn load() -> Result<PipelineConfig, ConfigError> {
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = load_from_sources(config_path)?;
    load_secrets(&mut config);
    Ok(config)
}

/// Secrets never live in TOML; they're read straight from the environment.
fn load_secrets(config: &mut PipelineConfig) {
    if let Ok(key) = env::var("PIPELINE_LLM_API_KEY") {
        config.llm.api_key = Some(key);
    }
    if let Ok(cmd) = env::var("PIPELINE_LLM_SUBPROCESS_COMMAND") {
        config.llm.subprocess_command = Some(cmd);
    }
}

pub fn load_from_sources(config_path: PathBuf) -> Result<PipelineConfig, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn load_defaults_only_fails_without_required_fields() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");
        // broker_url/db_url/content_store_path are required, so this must fail.
        assert!(load_from_sources(config_path).is_err());
    }

    #[test]
    fn load_from_toml_applies_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
broker_url = "fjall://data/broker"
db_url = "postgres://localhost/pantry"
content_store_path = "data/content_store"

[llm]
provider = "mock"
        "#;

        fs::write(&config_path, toml_content).unwrap();
        let config = load_from_sources(config_path).unwrap();

        assert_eq!(config.broker_url, "fjall://data/broker");
        assert_eq!(config.validator.score_threshold, 10);
        assert_eq!(config.geocoder.providers.len(), 3);
    }
}
