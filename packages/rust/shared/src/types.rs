//! Core domain types for company enrichment runs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Lowest confidence a stage may self-report (weak inference).
pub const MIN_CONFIDENCE: u8 = 1;

/// Highest confidence a stage may self-report (explicit statement).
pub const MAX_CONFIDENCE: u8 = 5;

/// Default minimum confidence a data point needs before later stages stop
/// trying to improve it.
pub const DEFAULT_CONFIDENCE_THRESHOLD: u8 = 4;

/// Ordered map from data-point name to its best-known value.
///
/// Keys are caller-supplied names from [`DataPointSpec`]; ordering is
/// deterministic so serialized records and progress payloads are stable.
pub type DataPointMap = BTreeMap<String, DataPoint>;

// ---------------------------------------------------------------------------
// DataPointSpec / DataPoint
// ---------------------------------------------------------------------------

/// A caller-defined attribute to extract. `name` is the unique key used
/// throughout the run; `description` guides the extraction stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPointSpec {
    pub name: String,
    pub description: String,
}

impl DataPointSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// One extracted fact. Immutable once produced by a stage; the orchestrator
/// compares confidence scores but never recomputes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Extracted value. Never empty.
    pub content: String,
    /// Self-reported confidence, 1 (weak inference) to 5 (explicit statement).
    pub confidence: u8,
    /// URL of the evidence this value was drawn from.
    pub source: String,
}

impl DataPoint {
    /// Build a data point, validating the stage-contract invariants
    /// (non-empty content, confidence within 1..=5).
    pub fn new(
        content: impl Into<String>,
        confidence: u8,
        source: impl Into<String>,
    ) -> crate::Result<Self> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(crate::ProspectorError::validation(
                "data point content must be non-empty",
            ));
        }
        if !(MIN_CONFIDENCE..=MAX_CONFIDENCE).contains(&confidence) {
            return Err(crate::ProspectorError::validation(format!(
                "confidence {confidence} out of range {MIN_CONFIDENCE}..={MAX_CONFIDENCE}"
            )));
        }
        Ok(Self {
            content,
            confidence,
            source: source.into(),
        })
    }
}

// ---------------------------------------------------------------------------
// EnrichedRecord
// ---------------------------------------------------------------------------

/// The record built incrementally by the enrichment flow.
///
/// `social_media_links` is distinct from the scalar data points: it is set
/// exactly once from discovery output and never confidence-merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    /// Best-known value per requested data-point name.
    pub data_points: DataPointMap,
    /// Social profile URLs found on the primary page.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub social_media_links: Vec<String>,
}

// ---------------------------------------------------------------------------
// Run configuration
// ---------------------------------------------------------------------------

/// Toggles for the optional stages. Discovery always runs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Visit discovered internal pages (about, team, pricing, ...).
    pub crawl: bool,
    /// Extract from the professional-network company profile.
    pub linkedin: bool,
    /// Re-check weak data points against web search snippets.
    pub google: bool,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            crawl: true,
            linkedin: true,
            google: true,
        }
    }
}

/// Analysis options. The analysis stage runs iff at least one is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Produce a narrative executive summary of the enriched record.
    #[serde(default)]
    pub executive_summary: bool,
    /// Caller-supplied fit criteria; non-empty text enables fit scoring.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_criteria: Option<String>,
}

impl AnalysisConfig {
    /// Whether the analysis stage should run at all.
    pub fn is_enabled(&self) -> bool {
        self.executive_summary || self.has_criteria()
    }

    /// Whether fit scoring was requested (criteria text present and non-empty).
    pub fn has_criteria(&self) -> bool {
        self.company_criteria
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty())
    }
}

/// Configuration for one enrichment run. Constructed once per invocation,
/// read-only thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Attributes to extract, in caller order.
    pub data_point_specs: Vec<DataPointSpec>,
    /// Which optional stages run.
    #[serde(default)]
    pub sources: SourcesConfig,
    /// Summary / fit-scoring options.
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// Confidence at or above which a data point no longer needs improvement.
    #[serde(default = "default_threshold")]
    pub minimum_confidence: u8,
    /// Cap on internal pages visited by the crawl stage.
    #[serde(default = "default_max_internal_pages")]
    pub max_internal_pages: usize,
    /// Cap on queries executed by the search stage.
    #[serde(default = "default_max_search_queries")]
    pub max_search_queries: usize,
}

fn default_threshold() -> u8 {
    DEFAULT_CONFIDENCE_THRESHOLD
}
fn default_max_internal_pages() -> usize {
    5
}
fn default_max_search_queries() -> usize {
    10
}

impl RunConfig {
    /// Build a config with defaults for everything but the requested specs.
    pub fn new(data_point_specs: Vec<DataPointSpec>) -> Self {
        Self {
            data_point_specs,
            sources: SourcesConfig::default(),
            analysis: AnalysisConfig::default(),
            minimum_confidence: default_threshold(),
            max_internal_pages: default_max_internal_pages(),
            max_search_queries: default_max_search_queries(),
        }
    }

    /// Validate at the run boundary: at least one spec, unique names,
    /// threshold within the confidence range. Internal logic assumes this
    /// has passed and does not re-validate.
    pub fn validate(&self) -> crate::Result<()> {
        if self.data_point_specs.is_empty() {
            return Err(crate::ProspectorError::validation(
                "at least one data point spec is required",
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for spec in &self.data_point_specs {
            if spec.name.trim().is_empty() {
                return Err(crate::ProspectorError::validation(
                    "data point spec name must be non-empty",
                ));
            }
            if !seen.insert(spec.name.as_str()) {
                return Err(crate::ProspectorError::validation(format!(
                    "duplicate data point name: {}",
                    spec.name
                )));
            }
        }
        if !(MIN_CONFIDENCE..=MAX_CONFIDENCE).contains(&self.minimum_confidence) {
            return Err(crate::ProspectorError::validation(format!(
                "minimum_confidence {} out of range {MIN_CONFIDENCE}..={MAX_CONFIDENCE}",
                self.minimum_confidence
            )));
        }
        Ok(())
    }

    /// Names of all requested data points, in caller order.
    pub fn requested_names(&self) -> Vec<&str> {
        self.data_point_specs
            .iter()
            .map(|s| s.name.as_str())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Stage / CompletionStats
// ---------------------------------------------------------------------------

/// A pipeline step that contributes data points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Discovery,
    InternalPages,
    Profile,
    Search,
    Analysis,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovery => "discovery",
            Self::InternalPages => "internal_pages",
            Self::Profile => "profile",
            Self::Search => "search",
            Self::Analysis => "analysis",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived completion snapshot for progress payloads. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompletionStats {
    /// Requested names present at or above the threshold.
    pub completed_count: usize,
    /// Total requested names.
    pub total_count: usize,
    /// Mean confidence across present data points (0.0 when none).
    pub average_confidence: f64,
}

// ---------------------------------------------------------------------------
// Progress events
// ---------------------------------------------------------------------------

/// Event categories emitted to the progress side channel, totally ordered
/// within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressEventKind {
    Connected,
    StageStarted,
    StageCompleted,
    StageSkipped,
    EarlyTerminated,
    StageFailed,
    RunCompleted,
    RunFailed,
}

/// One progress event. `payload` carries structured data such as
/// [`CompletionStats`] or the final [`EnrichmentResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub kind: ProgressEventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Output of the analysis stage. Fit fields are present iff the run supplied
/// non-empty criteria text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub executive_summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit_reasoning: Option<String>,
}

/// Terminal result of one enrichment run. Produced exactly once, at the end
/// of the pipeline or at an early-termination point, and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub record: EnrichedRecord,
    /// Evidence URLs, deduplicated, primary page first.
    pub sources: Vec<String>,
    pub duration_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisOutcome>,
}
