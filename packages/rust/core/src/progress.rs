//! Progress event side channel.
//!
//! The sink is write-only and best-effort: a missing or failing subscriber
//! must never affect pipeline outcome, so implementations swallow their own
//! errors and the flow never inspects a return value.

use prospector_shared::{
    CompletionStats, EnrichmentResult, ProgressEvent, ProgressEventKind, Stage,
};

/// Observer for the ordered event stream of one run.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// No-op sink for headless/test usage.
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn emit(&self, _event: ProgressEvent) {}
}

// ---------------------------------------------------------------------------
// Event constructors
// ---------------------------------------------------------------------------

pub fn connected(target_url: &str) -> ProgressEvent {
    ProgressEvent {
        kind: ProgressEventKind::Connected,
        message: Some(format!("enriching {target_url}")),
        payload: None,
    }
}

pub fn stage_started(stage: Stage) -> ProgressEvent {
    ProgressEvent {
        kind: ProgressEventKind::StageStarted,
        message: Some(format!("{stage} started")),
        payload: Some(serde_json::json!({ "stage": stage })),
    }
}

/// Stage finished; reports the merged data-point count and the completion
/// snapshot so observers can render per-stage progress.
pub fn stage_completed(stage: Stage, data_point_count: usize, stats: CompletionStats) -> ProgressEvent {
    ProgressEvent {
        kind: ProgressEventKind::StageCompleted,
        message: Some(format!("{stage} complete: {data_point_count} data points")),
        payload: Some(serde_json::json!({
            "stage": stage,
            "data_point_count": data_point_count,
            "stats": stats,
        })),
    }
}

pub fn stage_skipped(stage: Stage, reason: &str) -> ProgressEvent {
    ProgressEvent {
        kind: ProgressEventKind::StageSkipped,
        message: Some(format!("{stage}: {reason}")),
        payload: Some(serde_json::json!({ "stage": stage, "reason": reason })),
    }
}

pub fn stage_failed(stage: Stage, error: &str) -> ProgressEvent {
    ProgressEvent {
        kind: ProgressEventKind::StageFailed,
        message: Some(format!("{stage} failed (continuing): {error}")),
        payload: Some(serde_json::json!({ "stage": stage, "error": error })),
    }
}

pub fn early_terminated(after: Stage, stats: CompletionStats) -> ProgressEvent {
    ProgressEvent {
        kind: ProgressEventKind::EarlyTerminated,
        message: Some(format!(
            "all requested data points confident after {after}, skipping remaining sources"
        )),
        payload: Some(serde_json::json!({ "after_stage": after, "stats": stats })),
    }
}

pub fn run_completed(result: &EnrichmentResult) -> ProgressEvent {
    ProgressEvent {
        kind: ProgressEventKind::RunCompleted,
        message: Some(format!(
            "enrichment complete in {:.1}s",
            result.duration_seconds
        )),
        payload: serde_json::to_value(result).ok(),
    }
}

pub fn run_failed(error: &str) -> ProgressEvent {
    ProgressEvent {
        kind: ProgressEventKind::RunFailed,
        message: Some(error.to_string()),
        payload: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_events_carry_stage_payload() {
        let event = stage_started(Stage::Profile);
        let payload = event.payload.expect("payload");
        assert_eq!(payload["stage"], "profile");
        assert_eq!(event.kind, ProgressEventKind::StageStarted);
    }

    #[test]
    fn completed_event_carries_stats() {
        let stats = CompletionStats {
            completed_count: 2,
            total_count: 3,
            average_confidence: 4.5,
        };
        let event = stage_completed(Stage::Discovery, 2, stats);
        let payload = event.payload.expect("payload");
        assert_eq!(payload["data_point_count"], 2);
        assert_eq!(payload["stats"]["completed_count"], 2);
    }

    #[test]
    fn skip_event_names_reason() {
        let event = stage_skipped(Stage::Search, "disabled, skipping");
        assert!(event.message.unwrap().contains("disabled"));
    }
}
