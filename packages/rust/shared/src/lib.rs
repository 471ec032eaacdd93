//! Shared types, error model, and configuration for Prospector.
//!
//! This crate is the foundation depended on by all other Prospector crates.
//! It provides:
//! - [`ProspectorError`], the unified error type
//! - Domain types ([`DataPoint`], [`EnrichedRecord`], [`RunConfig`], [`EnrichmentResult`])
//! - Configuration ([`AppConfig`], [`Credentials`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BatchDefaults, Credentials, CredentialsConfig, DefaultsConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, resolve_credentials,
};
pub use error::{ProspectorError, Result};
pub use types::{
    AnalysisConfig, AnalysisOutcome, CompletionStats, DataPoint, DataPointMap, DataPointSpec,
    EnrichedRecord, EnrichmentResult, MAX_CONFIDENCE, MIN_CONFIDENCE, ProgressEvent,
    ProgressEventKind, RunConfig, SourcesConfig, Stage,
};
