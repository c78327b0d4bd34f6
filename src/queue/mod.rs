//! Four-stage job queue substrate: `scrape_intake`, `llm`,
//! `validator`, `reconciler`. Each stage gets an independent fjall-backed
//! queue with pending/inflight/dlq partitions, at-least-once delivery via
//! visibility timeouts, and a dead-letter queue for exhausted retries.

pub mod broker;
pub mod error;
pub mod model;
pub mod store;

pub use broker::QueueBroker;
pub use error::{QueueError, Result};
pub use model::{JobHandle, JobRecord, QueueName};
pub use store::Queue;
