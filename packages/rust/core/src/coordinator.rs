//! Typed boundary between the flow and the external extraction stages.
//!
//! The coordinator owns the in-scope glue around each capability call:
//! filtering which requested data points still need work (skipping the stage
//! entirely when none do), picking the canonical profile URL out of the
//! discovered social links, and deriving the search/context domain from the
//! resolved primary URL.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;
use url::Url;

use prospector_agents::{CompanyAgents, DiscoveryOutput, SearchInput};
use prospector_shared::{
    AnalysisOutcome, DataPointMap, EnrichedRecord, ProspectorError, Result, RunConfig, Stage,
};

use crate::merge;

/// Professional-network company-page pattern. First social link matching
/// this is taken as the canonical profile URL.
static PROFILE_URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)linkedin\.com/company/[^/?#]+").expect("profile pattern compiles")
});

/// Why an optional stage was skipped without invoking its capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageSkip {
    /// Every requested data point is already at or above the threshold.
    NothingNeeded,
    /// Discovery found no professional-network company page link.
    NoProfileUrl,
    /// Discovery found no internal page URLs to visit.
    NoInternalPages,
}

impl StageSkip {
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NothingNeeded => "no data needed",
            Self::NoProfileUrl => "no profile URL discovered",
            Self::NoInternalPages => "no internal pages discovered",
        }
    }
}

/// Result of asking the coordinator to run one optional stage.
#[derive(Debug)]
pub enum StageOutcome {
    /// The stage was not invoked.
    Skipped(StageSkip),
    /// The stage ran and produced these incremental data points.
    Extracted(DataPointMap),
}

/// Wraps a [`CompanyAgents`] implementation with the needs-improvement
/// filter applied before every optional stage.
///
/// Optional-stage methods return [`StageOutcome::Skipped`] when every
/// requested data point is already confident enough (or the stage has no
/// input to work from); the flow reports that as a skip event rather than
/// invoking the capability.
pub struct AgentCoordinator<A> {
    agents: A,
}

impl<A: CompanyAgents> AgentCoordinator<A> {
    pub fn new(agents: A) -> Self {
        Self { agents }
    }

    /// Access the wrapped implementation.
    pub fn agents(&self) -> &A {
        &self.agents
    }

    /// Run the mandatory discovery stage against the target URL.
    pub async fn discover(&self, target_url: &str, config: &RunConfig) -> Result<DiscoveryOutput> {
        let discover_links = config.sources.crawl || config.sources.linkedin;
        let generate_search_queries = config.sources.google;

        self.agents
            .discover(
                target_url,
                &config.data_point_specs,
                discover_links,
                generate_search_queries,
            )
            .await
            .map_err(|e| ProspectorError::discovery(target_url, e.to_string()))
    }

    /// Internal-pages extraction for data points still needing improvement.
    pub async fn internal_pages(
        &self,
        discovery: &DiscoveryOutput,
        current: &DataPointMap,
        config: &RunConfig,
    ) -> Result<StageOutcome> {
        let needed = merge::needs_improvement(
            current,
            &config.data_point_specs,
            config.minimum_confidence,
        );
        if needed.is_empty() {
            return Ok(StageOutcome::Skipped(StageSkip::NothingNeeded));
        }
        if discovery.internal_page_urls.is_empty() {
            debug!("no internal pages discovered, nothing to visit");
            return Ok(StageOutcome::Skipped(StageSkip::NoInternalPages));
        }

        let incoming = self
            .agents
            .extract_internal_pages(discovery, &needed, config.max_internal_pages)
            .await
            .map_err(|e| ProspectorError::agent(Stage::InternalPages, e.to_string()))?;
        Ok(StageOutcome::Extracted(incoming))
    }

    /// Profile extraction. Skipped when nothing needs improvement or no
    /// profile URL was discovered.
    pub async fn profile(
        &self,
        discovery: &DiscoveryOutput,
        current: &DataPointMap,
        config: &RunConfig,
    ) -> Result<StageOutcome> {
        let needed = merge::needs_improvement(
            current,
            &config.data_point_specs,
            config.minimum_confidence,
        );
        if needed.is_empty() {
            return Ok(StageOutcome::Skipped(StageSkip::NothingNeeded));
        }
        let Some(profile_url) = pick_profile_url(&discovery.social_media_links) else {
            debug!("no profile URL among discovered social links");
            return Ok(StageOutcome::Skipped(StageSkip::NoProfileUrl));
        };

        let extracted = self
            .agents
            .extract_profile(profile_url, &needed)
            .await
            .map_err(|e| ProspectorError::agent(Stage::Profile, e.to_string()))?;

        Ok(StageOutcome::Extracted(flatten_nullable(extracted)))
    }

    /// Web-search extraction for data points still needing improvement.
    ///
    /// Query context uses the `company_name` data point when one exists (a
    /// naming convention for callers, not a requirement) and falls back to
    /// the registrable domain of the resolved primary URL.
    pub async fn search(
        &self,
        discovery: &DiscoveryOutput,
        current: &DataPointMap,
        config: &RunConfig,
    ) -> Result<StageOutcome> {
        let needed = merge::needs_improvement(
            current,
            &config.data_point_specs,
            config.minimum_confidence,
        );
        if needed.is_empty() {
            return Ok(StageOutcome::Skipped(StageSkip::NothingNeeded));
        }

        let domain = registrable_domain(&discovery.resolved_url)?;
        // "company_name" is the conventional spec key for the company's
        // name; the domain stands in until some stage extracts one.
        let company_name = current
            .get("company_name")
            .map(|dp| dp.content.as_str())
            .unwrap_or(domain.as_str());

        let findings = self
            .agents
            .search(SearchInput {
                company_name,
                domain: &domain,
                needed_specs: &needed,
                query_groups: discovery.search_query_groups.as_ref(),
                existing: current,
                max_queries: config.max_search_queries,
            })
            .await
            .map_err(|e| ProspectorError::agent(Stage::Search, e.to_string()))?;

        let mut incoming = DataPointMap::new();
        for (name, finding) in findings {
            if let Some(finding) = finding {
                match finding.into_data_point() {
                    Ok(dp) => {
                        incoming.insert(name, dp);
                    }
                    Err(e) => {
                        debug!(name, error = %e, "dropping invalid search finding");
                    }
                }
            }
        }
        Ok(StageOutcome::Extracted(incoming))
    }

    /// Analysis over the full merged record.
    pub async fn analyze(
        &self,
        record: &EnrichedRecord,
        config: &RunConfig,
    ) -> Result<AnalysisOutcome> {
        let criteria = config
            .analysis
            .company_criteria
            .as_deref()
            .filter(|c| !c.trim().is_empty());

        self.agents
            .analyze(record, criteria)
            .await
            .map_err(|e| ProspectorError::agent(Stage::Analysis, e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// URL heuristics
// ---------------------------------------------------------------------------

/// First discovered social link that looks like a professional-network
/// company page.
pub fn pick_profile_url(links: &[String]) -> Option<&str> {
    links
        .iter()
        .find(|link| PROFILE_URL_PATTERN.is_match(link))
        .map(String::as_str)
}

/// Registrable domain of the resolved primary URL, used as the search and
/// context key. Strips a leading `www.`.
pub fn registrable_domain(url: &str) -> Result<String> {
    let parsed = Url::parse(url)
        .map_err(|e| ProspectorError::validation(format!("invalid primary URL {url}: {e}")))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| ProspectorError::validation(format!("primary URL has no host: {url}")))?;
    Ok(host.trim_start_matches("www.").to_string())
}

/// Drop the `None` entries a nullable-per-name stage may return.
fn flatten_nullable(
    extracted: BTreeMap<String, Option<prospector_shared::DataPoint>>,
) -> DataPointMap {
    extracted
        .into_iter()
        .filter_map(|(name, dp)| dp.map(|dp| (name, dp)))
        .collect()
}
