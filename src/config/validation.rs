use super::models::PipelineConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("broker_url must not be empty")]
    MissingBrokerUrl,

    #[error("db_url must not be empty")]
    MissingDbUrl,

    #[error("content_store_path must not be empty")]
    MissingContentStorePath,

    #[error("llm provider is 'openai' but no api key was supplied via PIPELINE_LLM_API_KEY")]
    MissingLlmApiKey,

    #[error("llm provider is 'subprocess' but no command was supplied via PIPELINE_LLM_SUBPROCESS_COMMAND")]
    MissingSubprocessCommand,

    #[error("geocoder_providers must list at least one provider")]
    EmptyGeocoderProviders,

    #[error("validator_score_threshold must be within [-100, 100], got {0}")]
    InvalidScoreThreshold(i32),

    #[error("publisher_ratchet_fraction must be within (0.0, 1.0], got {0}")]
    InvalidRatchetFraction(f64),

    #[error("reconciler_name_similarity must be within [0.0, 1.0], got {0}")]
    InvalidNameSimilarity(f64),
}

/// Validate the entire configuration against its documented invariants.
pub fn validate(config: &PipelineConfig) -> Result<(), ValidationError> {
    if config.broker_url.trim().is_empty() {
        return Err(ValidationError::MissingBrokerUrl);
    }
    if config.db_url.trim().is_empty() {
        return Err(ValidationError::MissingDbUrl);
    }
    if config.content_store_path.as_os_str().is_empty() {
        return Err(ValidationError::MissingContentStorePath);
    }

    use super::models::LlmProviderKind;
    match config.llm.provider {
        LlmProviderKind::Openai if config.llm.api_key.is_none() => {
            return Err(ValidationError::MissingLlmApiKey);
        }
        LlmProviderKind::Subprocess if config.llm.subprocess_command.is_none() => {
            return Err(ValidationError::MissingSubprocessCommand);
        }
        _ => {}
    }

    if config.geocoder.providers.is_empty() {
        return Err(ValidationError::EmptyGeocoderProviders);
    }

    if !(-100..=100).contains(&config.validator.score_threshold) {
        return Err(ValidationError::InvalidScoreThreshold(
            config.validator.score_threshold,
        ));
    }

    if !(0.0..=1.0).contains(&config.publisher.ratchet_fraction)
        || config.publisher.ratchet_fraction <= 0.0
    {
        return Err(ValidationError::InvalidRatchetFraction(
            config.publisher.ratchet_fraction,
        ));
    }

    if !(0.0..=1.0).contains(&config.reconciler.name_similarity) {
        return Err(ValidationError::InvalidNameSimilarity(
            config.reconciler.name_similarity,
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::models::*;

    fn base_config() -> PipelineConfig {
        PipelineConfig {
            broker_url: "fjall://data/broker".into(),
            db_url: "postgres://localhost/pantry".into(),
            content_store_path: "data/content_store".into(),
            llm: LlmConfig::default(),
            worker: WorkerConfig::default(),
            validator: ValidatorConfig::default(),
            geocoder: GeocoderConfig::default(),
            reconciler: ReconcilerConfig::default(),
            publisher: PublisherConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert!(validate(&base_config()).is_ok());
    }

    #[test]
    fn openai_without_key_is_rejected() {
        let mut config = base_config();
        config.llm.provider = LlmProviderKind::Openai;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::MissingLlmApiKey)
        ));
    }

    #[test]
    fn empty_geocoder_providers_is_rejected() {
        let mut config = base_config();
        config.geocoder.providers.clear();
        assert!(matches!(
            validate(&config),
            Err(ValidationError::EmptyGeocoderProviders)
        ));
    }

    #[test]
    fn zero_ratchet_fraction_is_rejected() {
        let mut config = base_config();
        config.publisher.ratchet_fraction = 0.0;
        assert!(validate(&config).is_err());
    }
}
