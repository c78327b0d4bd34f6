//! Deterministic quality gate + enrichment. `score()` is a pure
//! function over an `AlignedRecord`; `enrich()` orchestrates the geocoder
//! when coordinates are missing, then the caller re-scores.

mod error;
mod model;
mod rules;

pub use error::{Result, ValidatorError};
pub use model::{RejectionEvent, ValidatedRecord};
pub use rules::{score, score_with_precision, ScoreBreakdown};

use std::sync::Arc;

use tracing::{debug, info};

use crate::coords::{is_within_continental_us, is_zero_point, normalize_state, state_for_zip};
use crate::geocoder::Geocoder;
use crate::llm::AlignedRecord;

pub struct Validator {
    geocoder: Arc<Geocoder>,
    score_threshold: i32,
    legacy_forgiving_state_check: bool,
}

impl Validator {
    pub fn new(geocoder: Arc<Geocoder>, score_threshold: i32) -> Self {
        Self {
            geocoder,
            score_threshold,
            legacy_forgiving_state_check: false,
        }
    }

    /// Opt-in compatibility path: the legacy state-boundary check always
    /// returned true, i.e. never flagged a disagreement. Off by default;
    /// the coordinate-based lookup below is the defined correct behaviour.
    pub fn with_legacy_forgiving_state_check(mut self, enabled: bool) -> Self {
        self.legacy_forgiving_state_check = enabled;
        self
    }

    /// Runs the full scoring + enrichment sequence and returns either an
    /// accepted record (to be enqueued to `reconciler`) or a rejection
    /// event (persisted, not forwarded).
    pub async fn validate(&self, mut record: AlignedRecord) -> ValidatedRecord {
        let mut breakdown = score(&record);

        if self.needs_enrichment(&record) && self.has_enrichable_address(&record) {
            if let Some(location) = record.location.as_mut() {
                if let Some(address) = Self::address_line(location) {
                    match self.geocoder.geocode(&address).await {
                        Ok(result) => {
                            location.latitude = Some(result.latitude);
                            location.longitude = Some(result.longitude);
                            debug!(provider = %result.provider, "enrichment populated coordinates");
                            breakdown = score_with_precision(&record, Some(result.precision));
                        }
                        Err(err) => {
                            info!(%err, "geocoder could not enrich record");
                        }
                    }
                }
            }
        }

        if !self.legacy_forgiving_state_check {
            self.apply_state_cross_check(&mut record, &mut breakdown).await;
        }

        if breakdown.accepted(self.score_threshold) {
            ValidatedRecord::Accepted {
                record,
                score: breakdown.total,
            }
        } else {
            ValidatedRecord::Rejected(RejectionEvent {
                score: breakdown.total,
                reasons: breakdown.applied_rules,
                is_test_data: breakdown.is_test_data,
            })
        }
    }

    /// Applies the scoring table's "address state disagrees with
    /// coordinate-state lookup" deduction whenever the record
    /// carries both a state and in-bounds coordinates — not only when
    /// enrichment ran. Corrects the stored state to the coordinate-derived
    /// one on disagreement, same as the enrichment path used to do inline.
    ///
    /// Tries the ZIP-code cross-check first since it's pure and free; only
    /// falls back to reverse geocoding when the postal code doesn't resolve
    /// to a known state.
    async fn apply_state_cross_check(&self, record: &mut AlignedRecord, breakdown: &mut ScoreBreakdown) {
        let Some(location) = record.location.as_mut() else {
            return;
        };
        let (Some(lat), Some(lng)) = (location.latitude, location.longitude) else {
            return;
        };
        if is_zero_point(lat, lng) || !is_within_continental_us(lat, lng) {
            return;
        }
        let Some(state) = location.state.clone() else {
            return;
        };
        let address_state = normalize_state(&state);
        if address_state.is_empty() {
            return;
        }

        let coordinate_state = match location.postal_code.as_deref().and_then(state_for_zip) {
            Some(zip_state) => zip_state.to_string(),
            None => self.lookup_coordinate_state(lat, lng).await,
        };
        if !coordinate_state.is_empty() && coordinate_state != address_state {
            breakdown.apply_external("address_state_disagrees_with_coordinate_lookup", -20);
            location.state = Some(coordinate_state);
        }
    }

    fn needs_enrichment(&self, record: &AlignedRecord) -> bool {
        match &record.location {
            None => false,
            Some(loc) => match (loc.latitude, loc.longitude) {
                (Some(lat), Some(lng)) => is_zero_point(lat, lng) || !is_within_continental_us(lat, lng),
                _ => true,
            },
        }
    }

    fn has_enrichable_address(&self, record: &AlignedRecord) -> bool {
        record
            .location
            .as_ref()
            .map(|loc| loc.address_line_1.is_some() && loc.city.is_some())
            .unwrap_or(false)
    }

    fn address_line(location: &crate::llm::AlignedLocation) -> Option<String> {
        let parts = [
            location.address_line_1.as_deref(),
            location.city.as_deref(),
            location.state.as_deref(),
            location.postal_code.as_deref(),
        ];
        let joined: Vec<&str> = parts.into_iter().flatten().collect();
        if joined.is_empty() {
            None
        } else {
            Some(joined.join(", "))
        }
    }

    /// Resolves a state code from coordinates via reverse geocoding,
    /// pulling the two-letter code out of the last comma-separated
    /// component of the returned address.
    async fn lookup_coordinate_state(&self, lat: f64, lng: f64) -> String {
        let Ok(address) = self.geocoder.reverse(lat, lng).await else {
            return String::new();
        };
        address
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .find_map(|part| {
                let code = normalize_state(part);
                (!code.is_empty()).then_some(code)
            })
            .unwrap_or_default()
    }
}
