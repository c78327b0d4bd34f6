use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::Result;

/// Coarseness of a geocoding result, used by the validator's deduction
/// table ("mid-precision" / "lowest-precision" provider rules).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    Rooftop,
    Street,
    City,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub latitude: f64,
    pub longitude: f64,
    pub provider: String,
    pub precision: Precision,
}

#[async_trait]
pub trait GeocoderProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn geocode(&self, address: &str) -> Result<GeocodeResult>;
    async fn reverse(&self, lat: f64, lng: f64) -> Result<String>;
}
