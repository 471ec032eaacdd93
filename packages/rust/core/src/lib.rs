//! Enrichment flow orchestration: sequencing, merging, termination,
//! evidence tracking, and progress reporting for a single company run.
//!
//! The flow is a linear sequence of asynchronous stage calls; stages never
//! run concurrently within one run because each stage's "what still needs
//! improvement" input depends on the previous stage's merged output.

pub mod coordinator;
pub mod flow;
pub mod merge;
pub mod progress;
pub mod result;
pub mod sources;
pub mod termination;

pub use coordinator::{AgentCoordinator, StageOutcome, StageSkip};
pub use flow::enrich;
pub use progress::{ProgressSink, SilentProgress};
pub use sources::SourcesManager;
