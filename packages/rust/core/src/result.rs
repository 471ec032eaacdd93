//! Final result assembly.
//!
//! This is the single point where an [`EnrichmentResult`] is built, so the
//! early-termination path and the full-pipeline path produce structurally
//! identical results.

use std::time::Instant;

use prospector_shared::{AnalysisOutcome, DataPointMap, EnrichedRecord, EnrichmentResult};

use crate::sources::SourcesManager;

/// Assemble the terminal result for a run.
///
/// The data-point map is copied (never aliased) into the record, and the
/// duration is measured from the run's start to build time.
pub fn build(
    data_points: &DataPointMap,
    social_media_links: &[String],
    sources: &SourcesManager,
    primary_url: &str,
    started: Instant,
    analysis: Option<AnalysisOutcome>,
) -> EnrichmentResult {
    EnrichmentResult {
        record: EnrichedRecord {
            data_points: data_points.clone(),
            social_media_links: social_media_links.to_vec(),
        },
        sources: sources.get_sources(primary_url),
        duration_seconds: started.elapsed().as_secs_f64(),
        analysis,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prospector_shared::DataPoint;

    #[test]
    fn build_copies_data_and_orders_sources() {
        let mut data_points = DataPointMap::new();
        data_points.insert(
            "name".into(),
            DataPoint::new("Acme", 5, "https://acme.example").unwrap(),
        );

        let mut sources = SourcesManager::new();
        sources.add_source("https://acme.example/about");

        let started = Instant::now();
        let result = build(
            &data_points,
            &["https://linkedin.com/company/acme".to_string()],
            &sources,
            "https://acme.example",
            started,
            None,
        );

        assert_eq!(result.record.data_points, data_points);
        assert_eq!(result.record.social_media_links.len(), 1);
        assert_eq!(
            result.sources,
            vec!["https://acme.example", "https://acme.example/about"]
        );
        assert!(result.duration_seconds >= 0.0);
        assert!(result.analysis.is_none());
    }
}
