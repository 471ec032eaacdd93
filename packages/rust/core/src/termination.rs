//! Early-termination evaluation.
//!
//! Once every requested data point is well-evidenced, the remaining optional
//! stages can only add redundant confirmation or noise, so skipping them
//! saves cost and latency without harming the deliverable. The flow
//! evaluates this after discovery, internal pages, and profile, never after
//! search, which is always the last optional stage before analysis.

use prospector_shared::{CompletionStats, DataPointMap, DataPointSpec};

/// True iff every requested name has an entry at or above `threshold`.
pub fn should_terminate(
    current: &DataPointMap,
    specs: &[DataPointSpec],
    threshold: u8,
) -> bool {
    specs.iter().all(|spec| {
        current
            .get(&spec.name)
            .is_some_and(|dp| dp.confidence >= threshold)
    })
}

/// Completion snapshot over the requested names. Derived, never stored.
pub fn stats(current: &DataPointMap, specs: &[DataPointSpec], threshold: u8) -> CompletionStats {
    let present: Vec<u8> = specs
        .iter()
        .filter_map(|spec| current.get(&spec.name).map(|dp| dp.confidence))
        .collect();

    let completed_count = present.iter().filter(|&&c| c >= threshold).count();
    let average_confidence = if present.is_empty() {
        0.0
    } else {
        present.iter().map(|&c| c as f64).sum::<f64>() / present.len() as f64
    };

    CompletionStats {
        completed_count,
        total_count: specs.len(),
        average_confidence,
    }
}
