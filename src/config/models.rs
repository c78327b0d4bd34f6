use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    pub broker_url: String,
    pub db_url: String,
    pub content_store_path: std::path::PathBuf,

    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub validator: ValidatorConfig,
    #[serde(default)]
    pub geocoder: GeocoderConfig,
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
    #[serde(default)]
    pub publisher: PublisherConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// LLM provider selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    Openai,
    Subprocess,
    Mock,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: LlmProviderKind,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_temperature")]
    pub temperature: f32,
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_timeout_s")]
    pub timeout_s: u64,
    #[serde(default = "default_quota_base_delay_s")]
    pub quota_base_delay_s: u64,
    #[serde(default = "default_quota_max_delay_s")]
    pub quota_max_delay_s: u64,
    #[serde(default = "default_quota_backoff")]
    pub quota_backoff: f64,
    /// API key / subprocess command are secrets, never persisted in TOML.
    #[serde(skip)]
    pub api_key: Option<String>,
    #[serde(skip)]
    pub subprocess_command: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            temperature: default_llm_temperature(),
            max_tokens: default_llm_max_tokens(),
            timeout_s: default_llm_timeout_s(),
            quota_base_delay_s: default_quota_base_delay_s(),
            quota_max_delay_s: default_quota_max_delay_s(),
            quota_backoff: default_quota_backoff(),
            api_key: None,
            subprocess_command: None,
        }
    }
}

fn default_llm_provider() -> LlmProviderKind {
    LlmProviderKind::Mock
}
fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_llm_temperature() -> f32 {
    0.7
}
fn default_llm_max_tokens() -> u32 {
    64 * 1024
}
fn default_llm_timeout_s() -> u64 {
    30
}
fn default_quota_base_delay_s() -> u64 {
    3600
}
fn default_quota_max_delay_s() -> u64 {
    14400
}
fn default_quota_backoff() -> f64 {
    1.5
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    #[serde(default = "default_worker_count")]
    pub count_per_queue: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count_per_queue: default_worker_count(),
        }
    }
}

fn default_worker_count() -> usize {
    1
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ValidatorConfig {
    #[serde(default = "default_score_threshold")]
    pub score_threshold: i32,
    /// Opt-in compatibility path for the legacy forgiving state-boundary
    /// check — off by default.
    #[serde(default)]
    pub legacy_forgiving_state_check: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            score_threshold: default_score_threshold(),
            legacy_forgiving_state_check: false,
        }
    }
}

fn default_score_threshold() -> i32 {
    10
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GeocoderProviderKind {
    Arcgis,
    Nominatim,
    Census,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeocoderConfig {
    #[serde(default = "default_geocoder_providers")]
    pub providers: Vec<GeocoderProviderKind>,
    #[serde(default = "default_cache_ttl_s")]
    pub cache_ttl_s: u64,
    #[serde(default = "default_circuit_failure_threshold")]
    pub circuit_failure_threshold: u32,
    #[serde(default = "default_circuit_cooldown_s")]
    pub circuit_cooldown_s: u64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            providers: default_geocoder_providers(),
            cache_ttl_s: default_cache_ttl_s(),
            circuit_failure_threshold: default_circuit_failure_threshold(),
            circuit_cooldown_s: default_circuit_cooldown_s(),
        }
    }
}

fn default_geocoder_providers() -> Vec<GeocoderProviderKind> {
    vec![
        GeocoderProviderKind::Arcgis,
        GeocoderProviderKind::Nominatim,
        GeocoderProviderKind::Census,
    ]
}
fn default_cache_ttl_s() -> u64 {
    86_400
}
fn default_circuit_failure_threshold() -> u32 {
    5
}
fn default_circuit_cooldown_s() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReconcilerConfig {
    #[serde(default = "default_location_epsilon_m")]
    pub location_epsilon_m: f64,
    #[serde(default = "default_name_similarity")]
    pub name_similarity: f64,
    /// Total order of scraper ids used to break majority-vote ties.
    #[serde(default)]
    pub source_priority: Vec<String>,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            location_epsilon_m: default_location_epsilon_m(),
            name_similarity: default_name_similarity(),
            source_priority: Vec::new(),
        }
    }
}

fn default_location_epsilon_m() -> f64 {
    50.0
}
fn default_name_similarity() -> f64 {
    0.85
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PublisherConfig {
    #[serde(default = "default_publisher_interval_s")]
    pub interval_s: u64,
    #[serde(default = "default_ratchet_fraction")]
    pub ratchet_fraction: f64,
    #[serde(default)]
    pub ratchet_override: bool,
    #[serde(default = "default_publish_dir")]
    pub staging_dir: std::path::PathBuf,
    pub repository_url: Option<String>,
    pub repository_path: Option<std::path::PathBuf>,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            interval_s: default_publisher_interval_s(),
            ratchet_fraction: default_ratchet_fraction(),
            ratchet_override: false,
            staging_dir: default_publish_dir(),
            repository_url: None,
            repository_path: None,
        }
    }
}

fn default_publisher_interval_s() -> u64 {
    3600
}
fn default_ratchet_fraction() -> f64 {
    0.9
}
fn default_publish_dir() -> std::path::PathBuf {
    std::path::PathBuf::from("data/publish")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_metrics_addr")]
    pub metrics_addr: SocketAddr,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_addr: default_metrics_addr(),
        }
    }
}

fn default_metrics_addr() -> SocketAddr {
    "0.0.0.0:9090".parse().unwrap()
}

/// Re-exported so callers needing byte-sized limits don't have to reach
/// into `humanize` directly.
pub type BytesConfig = ByteSize;
