use std::collections::HashMap;

use super::model::FieldSource;

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub value: Option<String>,
    pub changed: bool,
}

/// Per-field merge strategy, independently testable without a
/// database. `source_priority` is the scraper id total order, most
/// preferred first; a tie after majority vote and priority falls back to
/// recency.
pub fn merge_field(
    canonical_value: Option<&str>,
    incoming: &FieldSource,
    other_sources: &[FieldSource],
    source_priority: &[String],
) -> MergeOutcome {
    if incoming.value.is_none() {
        return MergeOutcome {
            value: canonical_value.map(str::to_string),
            changed: false,
        };
    }

    let mut all_sources: Vec<&FieldSource> = other_sources.iter().collect();
    all_sources.push(incoming);

    let winner = majority_value(&all_sources, source_priority);

    match winner {
        Some(value) if canonical_value != Some(value.as_str()) => MergeOutcome {
            value: Some(value),
            changed: true,
        },
        Some(value) => MergeOutcome {
            value: Some(value),
            changed: false,
        },
        None => MergeOutcome {
            value: canonical_value.map(str::to_string),
            changed: false,
        },
    }
}

fn majority_value(sources: &[&FieldSource], source_priority: &[String]) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for source in sources {
        if let Some(value) = source.value.as_deref() {
            *counts.entry(value).or_insert(0) += 1;
        }
    }

    let max_count = *counts.values().max()?;
    let tied: Vec<&str> = counts
        .iter()
        .filter(|(_, count)| **count == max_count)
        .map(|(value, _)| *value)
        .collect();

    if tied.len() == 1 {
        return Some(tied[0].to_string());
    }

    // Tie-break by source priority: pick the value held by the
    // highest-priority scraper among the tied values.
    for scraper_id in source_priority {
        if let Some(source) = sources.iter().find(|s| &s.scraper_id == scraper_id) {
            if let Some(value) = source.value.as_deref() {
                if tied.contains(&value) {
                    return Some(value.to_string());
                }
            }
        }
    }

    // Still tied: prefer the most recent.
    most_recent_among(sources, &tied).map(str::to_string)
}

fn most_recent_among<'a>(sources: &[&'a FieldSource], candidates: &[&'a str]) -> Option<&'a str> {
    sources
        .iter()
        .filter(|s| s.value.as_deref().map(|v| candidates.contains(&v)).unwrap_or(false))
        .max_by_key(|s| s.recorded_at)
        .and_then(|s| s.value.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn source(scraper_id: &str, value: Option<&str>, minutes_ago: i64) -> FieldSource {
        FieldSource {
            scraper_id: scraper_id.to_string(),
            value: value.map(str::to_string),
            recorded_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn missing_incoming_value_leaves_canonical_unchanged() {
        let incoming = source("scraper_a", None, 0);
        let outcome = merge_field(Some("old"), &incoming, &[], &[]);
        assert_eq!(outcome.value.as_deref(), Some("old"));
        assert!(!outcome.changed);
    }

    #[test]
    fn majority_wins_over_canonical() {
        let incoming = source("scraper_a", Some("new"), 0);
        let others = vec![source("scraper_b", Some("new"), 5), source("scraper_c", Some("old"), 10)];
        let outcome = merge_field(Some("old"), &incoming, &others, &[]);
        assert_eq!(outcome.value.as_deref(), Some("new"));
        assert!(outcome.changed);
    }

    #[test]
    fn tie_breaks_by_source_priority() {
        let incoming = source("low_priority", Some("b"), 0);
        let others = vec![source("high_priority", Some("a"), 0)];
        let priority = vec!["high_priority".to_string(), "low_priority".to_string()];
        let outcome = merge_field(Some("a"), &incoming, &others, &priority);
        assert_eq!(outcome.value.as_deref(), Some("a"));
        assert!(!outcome.changed);
    }

    #[test]
    fn tie_without_priority_prefers_most_recent() {
        let incoming = source("scraper_a", Some("new"), 0);
        let others = vec![source("scraper_b", Some("old"), 120)];
        let outcome = merge_field(Some("old"), &incoming, &others, &[]);
        assert_eq!(outcome.value.as_deref(), Some("new"));
        assert!(outcome.changed);
    }
}
