//! Capability contracts for the external extraction stages.
//!
//! Prospector's core never talks to a scraping service, a search API, or a
//! language model directly. Each stage is an async capability implemented by
//! an out-of-tree collaborator; this crate defines the typed boundary the
//! enrichment flow consumes. Implementations self-report a 1..=5 confidence
//! per extracted value using a fixed evidentiary rubric (5 = explicit
//! statement on the page, 1 = weak inference); the orchestrator compares
//! those scores but never recomputes them.
//!
//! The [`CompanyAgents`] trait bundles all five operations so the flow is
//! generic over one parameter. Methods are declared `-> impl Future + Send`
//! so scheduled batch runs can cross thread boundaries.

use std::collections::BTreeMap;
use std::future::Future;

use serde::{Deserialize, Serialize};

use prospector_shared::{
    AnalysisOutcome, DataPoint, DataPointMap, DataPointSpec, EnrichedRecord, Result,
};

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Output of the discovery stage (the primary web page).
///
/// Discovery is the only mandatory stage: everything downstream keys off the
/// resolved URL, the discovered internal pages, and the social links found
/// here. `social_media_links` is consumed once by the flow and never merged
/// again from later stages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryOutput {
    /// Data points extracted from the primary page.
    pub data_points: DataPointMap,
    /// Discovered internal pages, keyed by page type ("about", "team", ...).
    #[serde(default)]
    pub internal_page_urls: BTreeMap<String, String>,
    /// Social profile URLs found on the primary page.
    #[serde(default)]
    pub social_media_links: Vec<String>,
    /// Final URL after redirects; the run's canonical primary URL.
    pub resolved_url: String,
    /// Pre-generated search queries per data-point name, present only when
    /// the run asked for them (search stage enabled).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_query_groups: Option<BTreeMap<String, Vec<String>>>,
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// A candidate value found in web-search snippets. `source` must be a URL
/// drawn from the search results actually supplied to the stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchFinding {
    pub content: String,
    pub confidence: u8,
    pub source: String,
}

impl SearchFinding {
    /// Convert into a [`DataPoint`], enforcing the stage-contract invariants.
    pub fn into_data_point(self) -> Result<DataPoint> {
        DataPoint::new(self.content, self.confidence, self.source)
    }
}

/// Input to the search stage.
#[derive(Debug, Clone)]
pub struct SearchInput<'a> {
    /// Best-known company name, for query context. Filled from the
    /// `company_name` data point when the caller requested one under that
    /// conventional key, otherwise from the domain.
    pub company_name: &'a str,
    /// Registrable domain of the resolved primary URL.
    pub domain: &'a str,
    /// Specs still needing improvement.
    pub needed_specs: &'a [DataPointSpec],
    /// Pre-generated query groups from discovery, keyed by data-point name.
    pub query_groups: Option<&'a BTreeMap<String, Vec<String>>>,
    /// Existing data points, so the stage can re-check weak confidences.
    pub existing: &'a DataPointMap,
    /// Cap on queries executed.
    pub max_queries: usize,
}

// ---------------------------------------------------------------------------
// CompanyAgents
// ---------------------------------------------------------------------------

/// The five extraction capabilities the enrichment flow depends on.
///
/// Per-stage error semantics (enforced by the flow, documented here for
/// implementers): a `discover` error is fatal to the run; errors from the
/// other extraction methods are caught, logged, and treated as a
/// zero-contribution stage.
pub trait CompanyAgents: Send + Sync {
    /// Extract from the primary page. `discover_links` asks for internal
    /// page + social link discovery; `generate_search_queries` asks for
    /// per-name query groups (only when the search stage will run).
    fn discover(
        &self,
        target_url: &str,
        specs: &[DataPointSpec],
        discover_links: bool,
        generate_search_queries: bool,
    ) -> impl Future<Output = Result<DiscoveryOutput>> + Send;

    /// Extract from discovered internal pages, capped at `max_pages`.
    /// Pages are processed independently; a per-page failure must not fail
    /// the stage, it just contributes nothing for that page.
    fn extract_internal_pages(
        &self,
        discovery: &DiscoveryOutput,
        needed_specs: &[DataPointSpec],
        max_pages: usize,
    ) -> impl Future<Output = Result<DataPointMap>> + Send;

    /// Extract from the professional-network company profile. `None` values
    /// mean the profile had nothing for that name. "Special" bulk-structured
    /// names are read directly off the profile and arrive at maximum
    /// confidence with the profile URL as source.
    fn extract_profile(
        &self,
        profile_url: &str,
        needed_specs: &[DataPointSpec],
    ) -> impl Future<Output = Result<BTreeMap<String, Option<DataPoint>>>> + Send;

    /// Re-check weak or missing data points against web-search snippets,
    /// capped at `input.max_queries` queries.
    fn search(
        &self,
        input: SearchInput<'_>,
    ) -> impl Future<Output = Result<BTreeMap<String, Option<SearchFinding>>>> + Send;

    /// Produce the narrative summary and, iff `criteria` is non-empty, a
    /// 0..=10 fit score with reasoning.
    fn analyze(
        &self,
        record: &EnrichedRecord,
        criteria: Option<&str>,
    ) -> impl Future<Output = Result<AnalysisOutcome>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_output_roundtrip() {
        let mut output = DiscoveryOutput {
            resolved_url: "https://www.acme.example/".into(),
            ..Default::default()
        };
        output
            .internal_page_urls
            .insert("about".into(), "https://www.acme.example/about".into());
        output
            .social_media_links
            .push("https://linkedin.com/company/acme".into());

        let json = serde_json::to_string(&output).expect("serialize");
        // query groups omitted entirely when not requested
        assert!(!json.contains("search_query_groups"));

        let parsed: DiscoveryOutput = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.resolved_url, "https://www.acme.example/");
        assert_eq!(parsed.internal_page_urls.len(), 1);
    }

    #[test]
    fn search_finding_conversion() {
        let finding = SearchFinding {
            content: "250 employees".into(),
            confidence: 3,
            source: "https://news.example/acme-growth".into(),
        };
        let dp = finding.into_data_point().expect("valid finding");
        assert_eq!(dp.confidence, 3);

        let bad = SearchFinding {
            content: String::new(),
            confidence: 3,
            source: "https://news.example".into(),
        };
        assert!(bad.into_data_point().is_err());
    }
}
