//! Explicit shared-state struct constructed once at start-up and cloned
//! (cheap, Arc-backed) into every spawned worker task. Replaces the
//! implicit mutable module state the Design Notes flag as a defect.

use std::sync::Arc;
use std::time::Duration;

use fjall::{Config as FjallConfig, PartitionCreateOptions};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::config::{GeocoderProviderKind, LlmProviderKind, PipelineConfig};
use crate::content_store::ContentStore;
use crate::geocoder::{ArcGisProvider, CensusProvider, Geocoder, GeocodeCache, GeocoderProvider, NominatimProvider};
use crate::llm::{LlmProvider, MockProvider, OpenAiProvider, QuotaGate, SubprocessProvider};
use crate::observability::Metrics;
use crate::queue::QueueBroker;

#[derive(Clone)]
pub struct PipelineRuntime {
    pub broker: Arc<QueueBroker>,
    pub content_store: Arc<ContentStore>,
    pub db_pool: PgPool,
    pub llm_provider: Arc<dyn LlmProvider>,
    pub quota_gate: Arc<QuotaGate>,
    pub geocoder: Arc<Geocoder>,
    pub config: Arc<PipelineConfig>,
    pub metrics: Arc<Metrics>,
}

impl PipelineRuntime {
    pub fn new(
        broker: Arc<QueueBroker>,
        content_store: Arc<ContentStore>,
        db_pool: PgPool,
        llm_provider: Arc<dyn LlmProvider>,
        quota_gate: Arc<QuotaGate>,
        geocoder: Arc<Geocoder>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            broker,
            content_store,
            db_pool,
            llm_provider,
            quota_gate,
            geocoder,
            config: Arc::new(config),
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Builds every shared client from a loaded `PipelineConfig`: opens the
    /// content store and queue broker under `content_store_path`/`broker_url`,
    /// connects the Postgres pool, and constructs the configured LLM
    /// provider and geocoder provider chain. Used by every binary entry
    /// point (`serve-api`, `worker`, `publish`, `stats`) so they share one
    /// construction path instead of each wiring clients ad hoc.
    pub async fn from_config(config: PipelineConfig) -> anyhow::Result<Self> {
        let content_store = Arc::new(ContentStore::open(&config.content_store_path)?);

        let broker_path = std::path::PathBuf::from(
            config.broker_url.strip_prefix("fjall://").unwrap_or(&config.broker_url),
        );
        let broker = Arc::new(QueueBroker::open(&broker_path, 5)?);

        let db_pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.db_url)
            .await?;

        let llm_provider: Arc<dyn LlmProvider> = match config.llm.provider {
            LlmProviderKind::Openai => Arc::new(OpenAiProvider::new(
                config.llm.api_key.clone().unwrap_or_default(),
                config.llm.model.clone(),
                config.llm.temperature,
                config.llm.max_tokens,
                Duration::from_secs(config.llm.timeout_s),
            )),
            LlmProviderKind::Subprocess => Arc::new(SubprocessProvider::new(
                config.llm.subprocess_command.clone().unwrap_or_default(),
                Vec::new(),
                Duration::from_secs(config.llm.timeout_s),
            )),
            LlmProviderKind::Mock => Arc::new(MockProvider::new(Vec::new())),
        };

        let quota_keyspace = FjallConfig::new(broker_path.parent().unwrap_or(&broker_path).join("quota")).open()?;
        let quota_partition = quota_keyspace.open_partition("metadata", PartitionCreateOptions::default())?;
        let quota_gate = Arc::new(QuotaGate::new(quota_partition));

        let geocode_keyspace = FjallConfig::new(broker_path.parent().unwrap_or(&broker_path).join("geocode_cache")).open()?;
        let geocode_partition =
            geocode_keyspace.open_partition("geocode", PartitionCreateOptions::default())?;
        let cache = GeocodeCache::new(geocode_partition, Duration::from_secs(config.geocoder.cache_ttl_s));
        let breaker_partition =
            geocode_keyspace.open_partition("circuit_breaker", PartitionCreateOptions::default())?;

        let providers: Vec<Arc<dyn GeocoderProvider>> = config
            .geocoder
            .providers
            .iter()
            .map(|kind| -> Arc<dyn GeocoderProvider> {
                match kind {
                    GeocoderProviderKind::Arcgis => Arc::new(ArcGisProvider::new(1.0, Duration::from_secs(10))),
                    GeocoderProviderKind::Nominatim => Arc::new(NominatimProvider::new(1.0, Duration::from_secs(10))),
                    GeocoderProviderKind::Census => Arc::new(CensusProvider::new(1.0, Duration::from_secs(10))),
                }
            })
            .collect();

        let geocoder = Arc::new(Geocoder::new(
            providers,
            cache,
            breaker_partition,
            config.geocoder.circuit_failure_threshold,
            Duration::from_secs(config.geocoder.circuit_cooldown_s),
        ));

        Ok(Self::new(broker, content_store, db_pool, llm_provider, quota_gate, geocoder, config))
    }
}
