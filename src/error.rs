//! Top-level error aggregation for process entry points.
//!
//! Individual modules own their own `thiserror` enums; this type exists so
//! `main.rs` and other binary-boundary code can propagate any of them with
//! a single `?`, typed instead of boxed.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error(transparent)]
    ContentStore(#[from] crate::content_store::ContentStoreError),

    #[error(transparent)]
    Queue(#[from] crate::queue::QueueError),

    #[error(transparent)]
    Llm(#[from] crate::llm::LlmError),

    #[error(transparent)]
    Validator(#[from] crate::validator::ValidatorError),

    #[error(transparent)]
    Geocoder(#[from] crate::geocoder::GeocoderError),

    #[error(transparent)]
    Reconciler(#[from] crate::reconciler::ReconcilerError),

    #[error(transparent)]
    Publisher(#[from] crate::publisher::PublisherError),

    #[error("fatal startup error: {0}")]
    Fatal(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Coarse error classification used by the retry combinator and by
/// worker loops deciding ack/nack/DLQ outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Retryable at the current stage: transport hiccups, broker momentary
    /// unavailability, provider 5xx, DB serialization conflicts.
    Transient,
    /// Not retryable: unparseable JSON, schema violation, oversized payload.
    InputMalformed,
    /// Not an error: validator rejection below threshold.
    BusinessRejection,
    /// Operator attention: repeated constraint violations, push rejection.
    Integrity,
    /// Process-exit: missing configuration, unreachable database at start-up.
    Fatal,
}
