use serde::{Deserialize, Serialize};

/// Top-level LLM output contract, bit-exact: `organization`,
/// `location` (nullable), `services`, `schedules`. Unrecognised fields are
/// rejected by `schema::validate_aligned_json` before this type is built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlignedRecord {
    pub organization: AlignedOrganization,
    pub location: Option<AlignedLocation>,
    #[serde(default)]
    pub services: Vec<AlignedService>,
    #[serde(default)]
    pub schedules: Vec<AlignedSchedule>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlignedOrganization {
    pub name: String,
    pub description: Option<String>,
    pub website: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlignedLocation {
    pub address_line_1: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlignedService {
    pub name: String,
    pub description: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlignedSchedule {
    pub service_name: Option<String>,
    pub opens_at: Option<String>,
    pub closes_at: Option<String>,
    pub byday: Option<String>,
}
