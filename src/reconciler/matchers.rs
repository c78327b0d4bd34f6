use crate::coords::haversine_meters;

/// Lowercases and collapses whitespace, the baseline normalisation every
/// matcher applies before comparing names.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Jaro-Winkler-free, dependency-free similarity: trigram Jaccard over the
/// normalised strings. Cheap, deterministic, good enough for the
/// name-similarity threshold without pulling in a fuzzy-matching crate.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let a = normalize_name(a);
    let b = normalize_name(b);
    if a == b {
        return 1.0;
    }
    let trigrams_a = trigrams(&a);
    let trigrams_b = trigrams(&b);
    if trigrams_a.is_empty() || trigrams_b.is_empty() {
        return 0.0;
    }

    let intersection = trigrams_a.intersection(&trigrams_b).count();
    let union = trigrams_a.union(&trigrams_b).count();
    intersection as f64 / union as f64
}

fn trigrams(s: &str) -> std::collections::HashSet<String> {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() < 3 {
        return std::iter::once(s.to_string()).collect();
    }
    chars.windows(3).map(|w| w.iter().collect()).collect()
}

/// Organization match: exact normalised-name match, or
/// similarity above threshold combined with a prior source record for the
/// same scraper/source-org-id pair (checked by the caller, which has
/// database access this pure function doesn't).
pub fn match_organization(candidate_name: &str, existing_name: &str, threshold: f64) -> bool {
    normalize_name(candidate_name) == normalize_name(existing_name)
        || name_similarity(candidate_name, existing_name) >= threshold
}

/// Location match: haversine distance within epsilon meters and fuzzy
/// address match above threshold.
pub fn match_location(
    candidate: (f64, f64, &str),
    existing: (f64, f64, &str),
    epsilon_meters: f64,
    address_threshold: f64,
) -> bool {
    let (lat_a, lng_a, addr_a) = candidate;
    let (lat_b, lng_b, addr_b) = existing;
    haversine_meters(lat_a, lng_a, lat_b, lng_b) <= epsilon_meters
        && name_similarity(addr_a, addr_b) >= address_threshold
}

/// Service match: exact `(normalised_name, organization_id)` tuple.
pub fn match_service(candidate_name: &str, candidate_org: uuid::Uuid, existing_name: &str, existing_org: uuid::Uuid) -> bool {
    candidate_org == existing_org && normalize_name(candidate_name) == normalize_name(existing_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_names_match_exactly() {
        assert!(match_organization("Example Pantry", "example   pantry", 0.85));
    }

    #[test]
    fn similar_names_match_above_threshold() {
        assert!(name_similarity("Example Food Pantry", "Example Food Pantry Inc") > 0.6);
    }

    #[test]
    fn dissimilar_names_do_not_match() {
        assert!(!match_organization("Example Pantry", "Totally Different Org", 0.85));
    }

    #[test]
    fn location_match_requires_both_distance_and_address() {
        let a = (39.0, -95.0, "500 Elm St");
        let close_same_address = (39.0001, -95.0001, "500 Elm St");
        let close_different_address = (39.0001, -95.0001, "900 Oak Ave");
        assert!(match_location(a, close_same_address, 50.0, 0.85));
        assert!(!match_location(a, close_different_address, 50.0, 0.85));
    }

    #[test]
    fn service_match_is_scoped_to_organization() {
        let org_a = uuid::Uuid::now_v7();
        let org_b = uuid::Uuid::now_v7();
        assert!(match_service("Hot Meals", org_a, "hot meals", org_a));
        assert!(!match_service("Hot Meals", org_a, "Hot Meals", org_b));
    }
}
