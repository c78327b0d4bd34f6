use crate::coords::{is_within_continental_us, is_zero_point};
use crate::geocoder::Precision;
use crate::llm::AlignedRecord;

const TEST_NAME_PATTERNS: &[&str] = &["test", "do not use", "placeholder", "example"];
const PLACEHOLDER_ADDRESSES: &[&str] = &["123 main st", "123 fake st", "1234 anywhere st", "n/a", "unknown"];

#[derive(Debug, Clone, Default)]
pub struct ScoreBreakdown {
    pub total: i32,
    pub applied_rules: Vec<String>,
    pub is_test_data: bool,
}

impl ScoreBreakdown {
    pub fn accepted(&self, threshold: i32) -> bool {
        self.total >= threshold && !self.is_test_data
    }

    fn apply(&mut self, rule: &str, deduction: i32) {
        self.total += deduction;
        self.applied_rules.push(rule.to_string());
    }

    /// Applies a deduction decided outside the pure scoring pass — used by
    /// `Validator::validate` for the address/coordinate state cross-check,
    /// which needs the geocoder's reverse lookup and so can't live in the
    /// I/O-free `score` function.
    pub(crate) fn apply_external(&mut self, rule: &str, deduction: i32) {
        self.apply(rule, deduction);
    }
}

/// Pure deduction-table scoring. Starts at 100, applies the
/// first matching rule per family; families never stack with each other.
/// `geocode_precision` is supplied by the caller when enrichment ran this
/// cycle, since the HSDS wire schema carries no precision field of its own.
pub fn score(record: &AlignedRecord) -> ScoreBreakdown {
    score_with_precision(record, None)
}

pub fn score_with_precision(record: &AlignedRecord, geocode_precision: Option<Precision>) -> ScoreBreakdown {
    let mut breakdown = ScoreBreakdown {
        total: 100,
        applied_rules: Vec::new(),
        is_test_data: false,
    };

    apply_coordinate_family(&mut breakdown, record);
    apply_test_data_family(&mut breakdown, record);
    apply_geocode_precision_family(&mut breakdown, geocode_precision);

    if let Some(location) = &record.location {
        if location.city.as_deref().unwrap_or("").trim().is_empty() {
            breakdown.apply("missing_city", -10);
        }
        if location.postal_code.as_deref().unwrap_or("").trim().is_empty() {
            breakdown.apply("missing_postal_code", -5);
        }
    } else {
        breakdown.apply("missing_city", -10);
        breakdown.apply("missing_postal_code", -5);
    }

    breakdown
}

fn apply_coordinate_family(breakdown: &mut ScoreBreakdown, record: &AlignedRecord) {
    let coords = record.location.as_ref().and_then(|l| match (l.latitude, l.longitude) {
        (Some(lat), Some(lng)) => Some((lat, lng)),
        _ => None,
    });

    match coords {
        None => breakdown.apply("missing_coordinates", -100),
        Some((lat, lng)) if is_zero_point(lat, lng) => breakdown.apply("zero_point_coordinates", -100),
        Some((lat, lng)) if !is_within_continental_us(lat, lng) => {
            breakdown.apply("coordinates_outside_continental_us", -95)
        }
        Some(_) => {}
    }
}

fn apply_test_data_family(breakdown: &mut ScoreBreakdown, record: &AlignedRecord) {
    let name_is_test_pattern = TEST_NAME_PATTERNS
        .iter()
        .any(|pattern| record.organization.name.to_lowercase().contains(pattern));

    let address_line = record
        .location
        .as_ref()
        .and_then(|l| l.address_line_1.as_deref())
        .unwrap_or("")
        .to_lowercase();
    let address_is_placeholder = PLACEHOLDER_ADDRESSES.iter().any(|p| address_line == *p);

    if name_is_test_pattern && address_is_placeholder {
        breakdown.apply("test_or_placeholder_data_detected", -95);
        breakdown.is_test_data = true;
    } else if address_is_placeholder {
        breakdown.apply("placeholder_address_recognised", -75);
    }
}

fn apply_geocode_precision_family(breakdown: &mut ScoreBreakdown, precision: Option<Precision>) {
    match precision {
        Some(Precision::City) => breakdown.apply("geocode_fallback_lowest_precision", -15),
        Some(Precision::Street) => breakdown.apply("geocode_mid_precision", -10),
        Some(Precision::Rooftop) | None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{AlignedLocation, AlignedOrganization};

    fn base_record() -> AlignedRecord {
        AlignedRecord {
            organization: AlignedOrganization {
                name: "Example Pantry".into(),
                description: None,
                website: None,
                email: None,
            },
            location: Some(AlignedLocation {
                address_line_1: Some("500 Elm St".into()),
                city: Some("Topeka".into()),
                state: Some("KS".into()),
                postal_code: Some("66603".into()),
                latitude: Some(39.0),
                longitude: Some(-95.7),
            }),
            services: vec![],
            schedules: vec![],
        }
    }

    #[test]
    fn complete_record_scores_100() {
        let breakdown = score(&base_record());
        assert_eq!(breakdown.total, 100);
        assert!(breakdown.accepted(10));
    }

    #[test]
    fn missing_coordinates_deducts_100() {
        let mut record = base_record();
        record.location.as_mut().unwrap().latitude = None;
        let breakdown = score(&record);
        assert_eq!(breakdown.total, 0);
        assert!(!breakdown.accepted(10));
    }

    #[test]
    fn zero_point_and_out_of_bounds_do_not_stack() {
        let mut record = base_record();
        let loc = record.location.as_mut().unwrap();
        loc.latitude = Some(0.0);
        loc.longitude = Some(0.0);
        let breakdown = score(&record);
        assert_eq!(breakdown.applied_rules, vec!["zero_point_coordinates"]);
        assert_eq!(breakdown.total, 0);
    }

    #[test]
    fn test_data_pattern_rejects_regardless_of_score() {
        let mut record = base_record();
        record.organization.name = "Test Pantry".into();
        record.location.as_mut().unwrap().address_line_1 = Some("123 Main St".into());
        let breakdown = score(&record);
        assert!(breakdown.is_test_data);
        assert!(!breakdown.accepted(10));
    }

    #[test]
    fn placeholder_address_alone_does_not_flag_test_data() {
        let mut record = base_record();
        record.location.as_mut().unwrap().address_line_1 = Some("123 Main St".into());
        let breakdown = score(&record);
        assert!(!breakdown.is_test_data);
        assert_eq!(breakdown.total, 25);
    }

    #[test]
    fn missing_city_and_postal_both_apply_independently() {
        let mut record = base_record();
        let loc = record.location.as_mut().unwrap();
        loc.city = None;
        loc.postal_code = None;
        let breakdown = score(&record);
        assert_eq!(breakdown.total, 85);
    }

    #[test]
    fn low_precision_geocode_deducts_without_stacking() {
        let record = base_record();
        let breakdown = score_with_precision(&record, Some(Precision::City));
        assert_eq!(breakdown.total, 85);
    }
}
