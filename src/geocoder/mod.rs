//! Address to coordinates, with provider fallback, a shared cache, and a
//! circuit breaker per provider.

mod breaker;
mod cache;
mod error;
mod provider;
mod providers;
mod ratelimit;

pub use breaker::{CircuitBreaker, CircuitState};
pub use cache::GeocodeCache;
pub use error::{GeocoderError, Result};
pub use provider::{GeocodeResult, GeocoderProvider, Precision};
pub use providers::{ArcGisProvider, CensusProvider, NominatimProvider};
pub use ratelimit::RateLimiter;

use std::sync::Arc;

use fjall::PartitionHandle;
use tracing::{debug, warn};

/// Orchestrates the provider chain (default ArcGIS -> Nominatim -> Census),
/// each guarded by its own circuit breaker, backed by one shared cache
/// namespaced `geocode:` ("One TTL across the system, no
/// competing namespaces").
pub struct Geocoder {
    providers: Vec<(Arc<dyn GeocoderProvider>, CircuitBreaker)>,
    cache: GeocodeCache,
}

impl Geocoder {
    pub fn new(
        providers: Vec<Arc<dyn GeocoderProvider>>,
        cache: GeocodeCache,
        breaker_metadata: PartitionHandle,
        failure_threshold: u32,
        cooldown: std::time::Duration,
    ) -> Self {
        let providers = providers
            .into_iter()
            .map(|p| {
                let breaker = CircuitBreaker::new(breaker_metadata.clone(), p.name(), failure_threshold, cooldown);
                (p, breaker)
            })
            .collect();
        Self { providers, cache }
    }

    pub async fn geocode(&self, address: &str) -> Result<GeocodeResult> {
        if let Some(cached) = self.cache.get(address)? {
            debug!(address, "geocode cache hit");
            return Ok(cached);
        }

        for (provider, breaker) in &self.providers {
            if !breaker.allow() {
                debug!(provider = provider.name(), "circuit open, skipping");
                continue;
            }

            match provider.geocode(address).await {
                Ok(result) => {
                    breaker.record_success();
                    self.cache.put(address, &result)?;
                    return Ok(result);
                }
                Err(err) => {
                    warn!(provider = provider.name(), %err, "geocode attempt failed");
                    breaker.record_failure();
                }
            }
        }

        Err(GeocoderError::NotGeocodable)
    }

    pub async fn reverse(&self, lat: f64, lng: f64) -> Result<String> {
        for (provider, breaker) in &self.providers {
            if !breaker.allow() {
                continue;
            }
            match provider.reverse(lat, lng).await {
                Ok(address) => {
                    breaker.record_success();
                    return Ok(address);
                }
                Err(err) => {
                    warn!(provider = provider.name(), %err, "reverse geocode attempt failed");
                    breaker.record_failure();
                }
            }
        }
        Err(GeocoderError::NotResolvable)
    }
}
