//! Integrates a single `AlignedRecord` into the canonical store: matches
//! or creates `Organization`/`Location`/`Service` rows,
//! serializes concurrent writers per entity via Postgres advisory locks,
//! and merges incoming field values with existing source history.

mod error;
mod lock;
mod matchers;
mod merge;
mod model;
mod store;

pub use error::{ReconcilerError, Result};
pub use lock::hashed_lock_key;
pub use matchers::{match_location, match_organization, match_service};
pub use merge::{merge_field, MergeOutcome};
pub use model::{
    CanonicalIds, EntityKind, FieldSource, SourceRecord, VersionEntry,
};
pub use store::Reconciler;

const MIGRATIONS: &str = include_str!("migrations.sql");

pub fn migrations() -> &'static str {
    MIGRATIONS
}
