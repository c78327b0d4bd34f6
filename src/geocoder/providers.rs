use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::error::{GeocoderError, Result};
use super::provider::{GeocodeResult, GeocoderProvider, Precision};
use super::ratelimit::RateLimiter;

pub struct ArcGisProvider {
    client: Client,
    limiter: RateLimiter,
}

impl ArcGisProvider {
    pub fn new(requests_per_second: f64, timeout: Duration) -> Self {
        Self {
            client: Client::builder().timeout(timeout).build().expect("plain timeout client builds"),
            limiter: RateLimiter::new(requests_per_second),
        }
    }
}

#[async_trait]
impl GeocoderProvider for ArcGisProvider {
    fn name(&self) -> &'static str {
        "arcgis"
    }

    async fn geocode(&self, address: &str) -> Result<GeocodeResult> {
        self.limiter.acquire().await;
        let response: Value = self
            .client
            .get("https://geocode-api.arcgis.com/arcgis/rest/services/World/GeocodeServer/findAddressCandidates")
            .query(&[("SingleLine", address), ("f", "json"), ("outFields", "*")])
            .send()
            .await
            .map_err(|e| GeocoderError::Request(e.to_string()))?
            .json()
            .await
            .map_err(|e| GeocoderError::Request(e.to_string()))?;

        let candidate = response["candidates"]
            .get(0)
            .ok_or(GeocoderError::NotGeocodable)?;
        let score = candidate["score"].as_f64().unwrap_or(0.0);
        let location = &candidate["location"];
        let latitude = location["y"].as_f64().ok_or(GeocoderError::NotGeocodable)?;
        let longitude = location["x"].as_f64().ok_or(GeocoderError::NotGeocodable)?;

        Ok(GeocodeResult {
            latitude,
            longitude,
            provider: self.name().to_string(),
            precision: if score >= 95.0 { Precision::Rooftop } else { Precision::Street },
        })
    }

    async fn reverse(&self, lat: f64, lng: f64) -> Result<String> {
        self.limiter.acquire().await;
        let response: Value = self
            .client
            .get("https://geocode-api.arcgis.com/arcgis/rest/services/World/GeocodeServer/reverseGeocode")
            .query(&[("location", format!("{lng},{lat}")), ("f", "json".to_string())])
            .send()
            .await
            .map_err(|e| GeocoderError::Request(e.to_string()))?
            .json()
            .await
            .map_err(|e| GeocoderError::Request(e.to_string()))?;

        response["address"]["Match_addr"]
            .as_str()
            .map(str::to_string)
            .ok_or(GeocoderError::NotResolvable)
    }
}

pub struct NominatimProvider {
    client: Client,
    limiter: RateLimiter,
}

impl NominatimProvider {
    pub fn new(requests_per_second: f64, timeout: Duration) -> Self {
        Self {
            client: Client::builder().timeout(timeout).build().expect("plain timeout client builds"),
            limiter: RateLimiter::new(requests_per_second),
        }
    }
}

#[async_trait]
impl GeocoderProvider for NominatimProvider {
    fn name(&self) -> &'static str {
        "nominatim"
    }

    async fn geocode(&self, address: &str) -> Result<GeocodeResult> {
        self.limiter.acquire().await;
        let response: Vec<Value> = self
            .client
            .get("https://nominatim.openstreetmap.org/search")
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .header("User-Agent", "hsds-pipeline/1.0")
            .send()
            .await
            .map_err(|e| GeocoderError::Request(e.to_string()))?
            .json()
            .await
            .map_err(|e| GeocoderError::Request(e.to_string()))?;

        let first = response.first().ok_or(GeocoderError::NotGeocodable)?;
        let latitude: f64 = first["lat"]
            .as_str()
            .and_then(|s| s.parse().ok())
            .ok_or(GeocoderError::NotGeocodable)?;
        let longitude: f64 = first["lon"]
            .as_str()
            .and_then(|s| s.parse().ok())
            .ok_or(GeocoderError::NotGeocodable)?;

        Ok(GeocodeResult {
            latitude,
            longitude,
            provider: self.name().to_string(),
            precision: Precision::Street,
        })
    }

    async fn reverse(&self, lat: f64, lng: f64) -> Result<String> {
        self.limiter.acquire().await;
        let response: Value = self
            .client
            .get("https://nominatim.openstreetmap.org/reverse")
            .query(&[("lat", lat.to_string()), ("lon", lng.to_string()), ("format", "json".to_string())])
            .header("User-Agent", "hsds-pipeline/1.0")
            .send()
            .await
            .map_err(|e| GeocoderError::Request(e.to_string()))?
            .json()
            .await
            .map_err(|e| GeocoderError::Request(e.to_string()))?;

        response["display_name"]
            .as_str()
            .map(str::to_string)
            .ok_or(GeocoderError::NotResolvable)
    }
}

/// Last resort in the fallback chain: coarse city-level lookups via the
/// US Census geocoder. Deliberately the lowest-precision provider; the
/// scoring table's "lowest-precision provider" deduction applies to its
/// results.
pub struct CensusProvider {
    client: Client,
    limiter: RateLimiter,
}

impl CensusProvider {
    pub fn new(requests_per_second: f64, timeout: Duration) -> Self {
        Self {
            client: Client::builder().timeout(timeout).build().expect("plain timeout client builds"),
            limiter: RateLimiter::new(requests_per_second),
        }
    }
}

#[async_trait]
impl GeocoderProvider for CensusProvider {
    fn name(&self) -> &'static str {
        "census"
    }

    async fn geocode(&self, address: &str) -> Result<GeocodeResult> {
        self.limiter.acquire().await;
        let response: Value = self
            .client
            .get("https://geocoding.geo.census.gov/geocoder/locations/onelineaddress")
            .query(&[("address", address), ("benchmark", "Public_AR_Current"), ("format", "json")])
            .send()
            .await
            .map_err(|e| GeocoderError::Request(e.to_string()))?
            .json()
            .await
            .map_err(|e| GeocoderError::Request(e.to_string()))?;

        let matches = &response["result"]["addressMatches"];
        let first = matches.get(0).ok_or(GeocoderError::NotGeocodable)?;
        let coords = &first["coordinates"];
        let latitude = coords["y"].as_f64().ok_or(GeocoderError::NotGeocodable)?;
        let longitude = coords["x"].as_f64().ok_or(GeocoderError::NotGeocodable)?;

        Ok(GeocodeResult {
            latitude,
            longitude,
            provider: self.name().to_string(),
            precision: Precision::City,
        })
    }

    async fn reverse(&self, _lat: f64, _lng: f64) -> Result<String> {
        Err(GeocoderError::NotResolvable)
    }
}
