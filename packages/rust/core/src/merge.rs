//! Confidence-priority combination of data-point maps.

use prospector_shared::{DataPointMap, DataPointSpec};

/// Merge `incoming` into `base`, keeping the higher-confidence value per key.
///
/// Ties keep the existing (earlier-stage) value: earlier stages worked from
/// richer first-party context, so they win unless a later stage is strictly
/// more confident. Re-applying the same incoming map is idempotent.
pub fn merge(base: &DataPointMap, incoming: &DataPointMap) -> DataPointMap {
    let mut merged = base.clone();
    for (name, candidate) in incoming {
        match merged.get(name) {
            Some(existing) if candidate.confidence <= existing.confidence => {}
            _ => {
                merged.insert(name.clone(), candidate.clone());
            }
        }
    }
    merged
}

/// Specs whose data points are absent from `base` or below `threshold`.
///
/// Every downstream stage filters through this before doing work; a pure
/// cost-control measure so confident data is never re-derived.
pub fn needs_improvement(
    base: &DataPointMap,
    specs: &[DataPointSpec],
    threshold: u8,
) -> Vec<DataPointSpec> {
    specs
        .iter()
        .filter(|spec| {
            base.get(&spec.name)
                .is_none_or(|dp| dp.confidence < threshold)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use prospector_shared::DataPoint;

    fn dp(content: &str, confidence: u8, source: &str) -> DataPoint {
        DataPoint::new(content, confidence, source).expect("valid data point")
    }

    fn map_of(entries: &[(&str, DataPoint)]) -> DataPointMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn higher_confidence_replaces() {
        let base = map_of(&[("name", dp("Acme", 3, "https://a.example"))]);
        let incoming = map_of(&[("name", dp("Acme Inc", 5, "https://b.example"))]);

        let merged = merge(&base, &incoming);
        assert_eq!(merged["name"], incoming["name"]);
    }

    #[test]
    fn lower_confidence_keeps_base() {
        let base = map_of(&[("name", dp("Acme", 5, "https://a.example"))]);
        let incoming = map_of(&[("name", dp("Acme Inc", 3, "https://b.example"))]);

        let merged = merge(&base, &incoming);
        assert_eq!(merged["name"], base["name"]);
    }

    #[test]
    fn tie_keeps_earlier_stage_value() {
        let base = map_of(&[("industry", dp("Logistics", 4, "https://a.example"))]);
        let incoming = map_of(&[("industry", dp("Freight", 4, "https://b.example"))]);

        let merged = merge(&base, &incoming);
        assert_eq!(merged["industry"].content, "Logistics");
    }

    #[test]
    fn missing_key_is_inserted() {
        let base = DataPointMap::new();
        let incoming = map_of(&[("hq", dp("Berlin", 2, "https://b.example"))]);

        let merged = merge(&base, &incoming);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged["hq"].content, "Berlin");
    }

    #[test]
    fn merge_is_idempotent() {
        let base = map_of(&[
            ("name", dp("Acme", 3, "https://a.example")),
            ("hq", dp("Berlin", 5, "https://a.example")),
        ]);
        let incoming = map_of(&[
            ("name", dp("Acme Inc", 5, "https://b.example")),
            ("industry", dp("Logistics", 2, "https://b.example")),
        ]);

        let once = merge(&base, &incoming);
        let twice = merge(&once, &incoming);
        assert_eq!(once, twice);
    }

    #[test]
    fn needs_improvement_filters_confident_entries() {
        let specs = vec![
            DataPointSpec::new("name", "Company name"),
            DataPointSpec::new("hq", "Headquarters city"),
            DataPointSpec::new("industry", "Primary industry"),
        ];
        let base = map_of(&[
            ("name", dp("Acme", 5, "https://a.example")),
            ("hq", dp("Berlin", 3, "https://a.example")),
        ]);

        let needed = needs_improvement(&base, &specs, 4);
        let names: Vec<&str> = needed.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["hq", "industry"]);
    }

    #[test]
    fn needs_improvement_empty_when_all_confident() {
        let specs = vec![DataPointSpec::new("name", "Company name")];
        let base = map_of(&[("name", dp("Acme", 4, "https://a.example"))]);
        assert!(needs_improvement(&base, &specs, 4).is_empty());
    }
}
