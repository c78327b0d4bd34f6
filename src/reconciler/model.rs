use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Organization,
    Location,
    Service,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Organization => "organization",
            EntityKind::Location => "location",
            EntityKind::Service => "service",
        }
    }
}

/// Per-field provenance used by the merge strategy's majority vote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRecord {
    pub scraper_id: String,
    pub source_org_id: Option<String>,
    pub value: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionEntry {
    pub entity_kind: EntityKind,
    pub entity_id: Uuid,
    pub field_name: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Incoming value plus the scraper it came from, the unit `merge_field`
/// reasons over.
#[derive(Debug, Clone)]
pub struct FieldSource {
    pub scraper_id: String,
    pub value: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Stable identifiers returned to callers, never implementation-specific
/// strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalIds {
    pub organization_id: Uuid,
    pub location_ids: Vec<Uuid>,
    pub service_ids: Vec<Uuid>,
}
