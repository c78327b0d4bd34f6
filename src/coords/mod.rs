//! Pure coordinate and state-code helpers shared by the validator and
//! reconciler. No I/O, no fjall, no network — kept separate so the scoring
//! and matching logic that depends on these stays trivially unit-testable.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Continental-US bounding box used by the validator's out-of-bounds rule.
pub const US_MIN_LAT: f64 = 25.0;
pub const US_MAX_LAT: f64 = 49.0;
pub const US_MIN_LNG: f64 = -125.0;
pub const US_MAX_LNG: f64 = -67.0;

pub fn is_zero_point(lat: f64, lng: f64) -> bool {
    lat == 0.0 && lng == 0.0
}

pub fn is_within_continental_us(lat: f64, lng: f64) -> bool {
    (US_MIN_LAT..=US_MAX_LAT).contains(&lat) && (US_MIN_LNG..=US_MAX_LNG).contains(&lng)
}

/// Great-circle distance in meters (haversine formula). Used by the
/// reconciler's location matcher and nowhere else, so it lives alongside
/// the other pure geometry helpers rather than in its own crate.
pub fn haversine_meters(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;
    let (lat1_r, lat2_r) = (lat1.to_radians(), lat2.to_radians());
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1_r.cos() * lat2_r.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_M * c
}

fn state_table() -> &'static HashMap<&'static str, &'static str> {
    static TABLE: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    TABLE.get_or_init(|| {
        [
            ("alabama", "AL"), ("alaska", "AK"), ("arizona", "AZ"), ("arkansas", "AR"),
            ("california", "CA"), ("colorado", "CO"), ("connecticut", "CT"), ("delaware", "DE"),
            ("florida", "FL"), ("georgia", "GA"), ("hawaii", "HI"), ("idaho", "ID"),
            ("illinois", "IL"), ("indiana", "IN"), ("iowa", "IA"), ("kansas", "KS"),
            ("kentucky", "KY"), ("louisiana", "LA"), ("maine", "ME"), ("maryland", "MD"),
            ("massachusetts", "MA"), ("michigan", "MI"), ("minnesota", "MN"), ("mississippi", "MS"),
            ("missouri", "MO"), ("montana", "MT"), ("nebraska", "NE"), ("nevada", "NV"),
            ("new hampshire", "NH"), ("new jersey", "NJ"), ("new mexico", "NM"), ("new york", "NY"),
            ("north carolina", "NC"), ("north dakota", "ND"), ("ohio", "OH"), ("oklahoma", "OK"),
            ("oregon", "OR"), ("pennsylvania", "PA"), ("rhode island", "RI"), ("south carolina", "SC"),
            ("south dakota", "SD"), ("tennessee", "TN"), ("texas", "TX"), ("utah", "UT"),
            ("vermont", "VT"), ("virginia", "VA"), ("washington", "WA"), ("west virginia", "WV"),
            ("wisconsin", "WI"), ("wyoming", "WY"), ("district of columbia", "DC"),
            ("puerto rico", "PR"), ("guam", "GU"), ("american samoa", "AS"),
            ("u.s. virgin islands", "VI"), ("northern mariana islands", "MP"),
        ]
        .into_iter()
        .collect()
    })
}

/// ZIP3-prefix -> state ranges, the standard USPS prefix assignment table.
/// Inclusive `(low, high, state)`
/// triples over the first three digits of a ZIP code; approximate at the
/// boundaries (a handful of prefixes are split finer by the real USPS
/// table) but sufficient for a cross-check rather than authoritative
/// routing.
const ZIP3_STATE_RANGES: &[(u32, u32, &str)] = &[
    (5, 9, "NY"), (10, 27, "MA"), (28, 29, "RI"), (30, 38, "NH"),
    (39, 49, "ME"), (50, 59, "VT"), (60, 69, "CT"), (70, 89, "NJ"),
    (100, 149, "NY"), (150, 196, "PA"), (197, 199, "DE"), (200, 205, "DC"),
    (206, 219, "MD"), (220, 246, "VA"), (247, 268, "WV"), (270, 289, "NC"),
    (290, 299, "SC"), (300, 319, "GA"), (320, 349, "FL"), (350, 369, "AL"),
    (370, 385, "TN"), (386, 397, "MS"), (398, 399, "GA"), (400, 427, "KY"),
    (430, 459, "OH"), (460, 479, "IN"), (480, 499, "MI"), (500, 528, "IA"),
    (530, 549, "WI"), (550, 567, "MN"), (570, 577, "SD"), (580, 588, "ND"),
    (590, 599, "MT"), (600, 629, "IL"), (630, 658, "MO"), (660, 679, "KS"),
    (680, 693, "NE"), (700, 714, "LA"), (716, 729, "AR"), (730, 749, "OK"),
    (750, 799, "TX"), (800, 816, "CO"), (820, 831, "WY"), (832, 838, "ID"),
    (840, 847, "UT"), (850, 865, "AZ"), (870, 884, "NM"), (889, 898, "NV"),
    (900, 961, "CA"), (967, 968, "HI"), (970, 979, "OR"), (980, 994, "WA"),
    (995, 999, "AK"),
];

/// Resolves the state a ZIP/postal code's first three digits fall under,
/// per `ZIP3_STATE_RANGES`. Returns `None` for non-US-looking input (not
/// purely digits, or outside every assigned range).
pub fn state_for_zip(postal_code: &str) -> Option<&'static str> {
    let digits: String = postal_code.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() < 3 {
        return None;
    }
    let prefix: u32 = digits[..3].parse().ok()?;
    ZIP3_STATE_RANGES
        .iter()
        .find(|(low, high, _)| (*low..=*high).contains(&prefix))
        .map(|(_, _, state)| *state)
}

/// Cross-checks a stated two-letter state code against the state implied
/// by a ZIP code. Unresolvable ZIPs
/// cross-check as `true` (nothing to disagree with).
pub fn zip_matches_state(postal_code: &str, state_code: &str) -> bool {
    match state_for_zip(postal_code) {
        Some(zip_state) => zip_state.eq_ignore_ascii_case(state_code),
        None => true,
    }
}

/// Normalizes a state name or code to its two-letter code. Unrecognised
/// input becomes an empty string.
pub fn normalize_state(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.len() == 2 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
        return trimmed.to_uppercase();
    }
    state_table()
        .get(trimmed.to_lowercase().as_str())
        .map(|code| code.to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_point_detected() {
        assert!(is_zero_point(0.0, 0.0));
        assert!(!is_zero_point(0.0, 1.0));
    }

    #[test]
    fn bounding_box_excludes_alaska() {
        assert!(is_within_continental_us(39.0, -98.0));
        assert!(!is_within_continental_us(61.2, -149.9));
    }

    #[test]
    fn haversine_zero_for_same_point() {
        assert_eq!(haversine_meters(39.0, -98.0, 39.0, -98.0), 0.0);
    }

    #[test]
    fn haversine_known_distance_approx() {
        // NYC to LA, roughly 3940 km
        let d = haversine_meters(40.7128, -74.0060, 34.0522, -118.2437);
        assert!((d - 3_935_000.0).abs() < 20_000.0);
    }

    #[test]
    fn normalize_state_handles_full_name_and_code() {
        assert_eq!(normalize_state("California"), "CA");
        assert_eq!(normalize_state("ca"), "CA");
        assert_eq!(normalize_state("Not A State"), "");
    }

    #[test]
    fn state_for_zip_resolves_known_prefixes() {
        assert_eq!(state_for_zip("66603"), Some("KS"));
        assert_eq!(state_for_zip("10001"), Some("NY"));
        assert_eq!(state_for_zip("99501"), Some("AK"));
    }

    #[test]
    fn state_for_zip_rejects_unresolvable_input() {
        assert_eq!(state_for_zip("abc"), None);
        assert_eq!(state_for_zip("1"), None);
    }

    #[test]
    fn zip_matches_state_flags_disagreement_and_tolerates_unknowns() {
        assert!(zip_matches_state("66603", "KS"));
        assert!(!zip_matches_state("66603", "NE"));
        assert!(zip_matches_state("not-a-zip", "KS"));
    }
}
