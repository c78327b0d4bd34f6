//! Content-addressed deduplication store.
//!
//! Enforces "each unique payload is processed at most once." Storage is a
//! fjall embedded keyspace, keyed off the SHA-256 hash of the raw bytes
//! rather than a server-issued job id.

mod error;
mod hash;
mod store;

pub use error::{ContentStoreError, Result};
pub use hash::ContentHash;
pub use store::{ContentStore, ContentStoreStats, PayloadRecord, PayloadStatus, SourceMetadata};
