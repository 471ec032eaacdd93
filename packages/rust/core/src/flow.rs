//! The enrichment flow state machine.
//!
//! `INIT → DISCOVERY → [TERMINATED | INTERNAL_PAGES] → [TERMINATED | PROFILE]
//! → [TERMINATED | SEARCH] → ANALYSIS → DONE`, with `ERROR` reachable only
//! from `DISCOVERY`. Optional stages are gated by the sources config flags;
//! failures in them are caught here, logged, and treated as
//! zero-contribution stages so the run still yields a (possibly degraded)
//! result. Analysis runs whenever configured, even after early termination,
//! because it operates on whatever record exists at that point.

use std::time::Instant;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use prospector_agents::CompanyAgents;
use prospector_shared::{
    Credentials, DataPointMap, EnrichedRecord, EnrichmentResult, Result, RunConfig, Stage,
};

use crate::coordinator::{AgentCoordinator, StageOutcome};
use crate::progress::{self, ProgressSink};
use crate::sources::SourcesManager;
use crate::{merge, result, termination};

/// Run one enrichment flow for `target_url`.
///
/// Validates the run config and credentials before any stage executes
/// (absence is a fatal configuration error, not a stage failure), then
/// drives the stage sequence and returns the terminal result exactly once.
#[instrument(skip_all, fields(url = %target_url, run_id = tracing::field::Empty))]
pub async fn enrich<A: CompanyAgents>(
    target_url: &str,
    config: &RunConfig,
    credentials: &Credentials,
    coordinator: &AgentCoordinator<A>,
    sink: &dyn ProgressSink,
) -> Result<EnrichmentResult> {
    config.validate()?;
    credentials.validate(config.sources.google)?;

    let run_id = Uuid::now_v7();
    tracing::Span::current().record("run_id", tracing::field::display(run_id));

    let started = Instant::now();
    let threshold = config.minimum_confidence;
    let specs = &config.data_point_specs;

    sink.emit(progress::connected(target_url));
    info!(data_points = specs.len(), threshold, "starting enrichment run");

    // --- Discovery (mandatory; failure aborts the run) ---
    sink.emit(progress::stage_started(Stage::Discovery));
    let discovery = match coordinator.discover(target_url, config).await {
        Ok(output) => output,
        Err(e) => {
            warn!(error = %e, "discovery failed, aborting run");
            sink.emit(progress::run_failed(&e.to_string()));
            return Err(e);
        }
    };

    let primary_url = if discovery.resolved_url.is_empty() {
        target_url.to_string()
    } else {
        discovery.resolved_url.clone()
    };

    let mut sources = SourcesManager::new();
    sources.add_source(primary_url.clone());

    let mut data_points = discovery.data_points.clone();
    // Social links are set once from discovery and never merged again.
    let social_media_links = discovery.social_media_links.clone();

    sink.emit(progress::stage_completed(
        Stage::Discovery,
        data_points.len(),
        termination::stats(&data_points, specs, threshold),
    ));

    let mut terminated = check_termination(Stage::Discovery, &data_points, config, sink);

    // --- Internal pages ---
    if !config.sources.crawl {
        sink.emit(progress::stage_skipped(
            Stage::InternalPages,
            "disabled, skipping",
        ));
    } else if !terminated {
        sink.emit(progress::stage_started(Stage::InternalPages));
        let outcome = coordinator
            .internal_pages(&discovery, &data_points, config)
            .await;
        fold_stage(
            Stage::InternalPages,
            outcome,
            &mut data_points,
            &mut sources,
            config,
            sink,
        );
        terminated = check_termination(Stage::InternalPages, &data_points, config, sink);
    }

    // --- Profile ---
    if !config.sources.linkedin {
        sink.emit(progress::stage_skipped(Stage::Profile, "disabled, skipping"));
    } else if !terminated {
        sink.emit(progress::stage_started(Stage::Profile));
        let outcome = coordinator.profile(&discovery, &data_points, config).await;
        fold_stage(
            Stage::Profile,
            outcome,
            &mut data_points,
            &mut sources,
            config,
            sink,
        );
        terminated = check_termination(Stage::Profile, &data_points, config, sink);
    }

    // --- Search (last optional stage; no termination check after it) ---
    if !config.sources.google {
        sink.emit(progress::stage_skipped(Stage::Search, "disabled, skipping"));
    } else if !terminated {
        sink.emit(progress::stage_started(Stage::Search));
        let outcome = coordinator.search(&discovery, &data_points, config).await;
        fold_stage(
            Stage::Search,
            outcome,
            &mut data_points,
            &mut sources,
            config,
            sink,
        );
    }

    // --- Analysis (independent of the early-termination path) ---
    let analysis = if config.analysis.is_enabled() {
        sink.emit(progress::stage_started(Stage::Analysis));
        let record = EnrichedRecord {
            data_points: data_points.clone(),
            social_media_links: social_media_links.clone(),
        };
        match coordinator.analyze(&record, config).await {
            Ok(outcome) => {
                sink.emit(progress::stage_completed(
                    Stage::Analysis,
                    data_points.len(),
                    termination::stats(&data_points, specs, threshold),
                ));
                Some(outcome)
            }
            Err(e) => {
                warn!(error = %e, "analysis failed, returning record without it");
                sink.emit(progress::stage_failed(Stage::Analysis, &e.to_string()));
                None
            }
        }
    } else {
        sink.emit(progress::stage_skipped(
            Stage::Analysis,
            "disabled, skipping",
        ));
        None
    };

    // --- Done ---
    let result = result::build(
        &data_points,
        &social_media_links,
        &sources,
        &primary_url,
        started,
        analysis,
    );
    sink.emit(progress::run_completed(&result));

    info!(
        data_points = result.record.data_points.len(),
        sources = result.sources.len(),
        early_terminated = terminated,
        elapsed_ms = started.elapsed().as_millis(),
        "enrichment run complete"
    );

    Ok(result)
}

/// Fold one optional stage's outcome into the run state. Stage errors are
/// non-fatal here: they are logged, reported, and contribute nothing.
fn fold_stage(
    stage: Stage,
    outcome: Result<StageOutcome>,
    data_points: &mut DataPointMap,
    sources: &mut SourcesManager,
    config: &RunConfig,
    sink: &dyn ProgressSink,
) {
    match outcome {
        Ok(StageOutcome::Skipped(skip)) => {
            sink.emit(progress::stage_skipped(stage, skip.reason()));
        }
        Ok(StageOutcome::Extracted(incoming)) => {
            // Evidence was consulted even for values that lose the merge.
            sources.add_sources(incoming.values().map(|dp| dp.source.clone()));
            *data_points = merge::merge(data_points, &incoming);
            sink.emit(progress::stage_completed(
                stage,
                data_points.len(),
                termination::stats(
                    data_points,
                    &config.data_point_specs,
                    config.minimum_confidence,
                ),
            ));
        }
        Err(e) => {
            warn!(%stage, error = %e, "stage failed, continuing with existing data");
            sink.emit(progress::stage_failed(stage, &e.to_string()));
        }
    }
}

/// Evaluate early termination after a stage; emits the event on transition.
fn check_termination(
    after: Stage,
    data_points: &DataPointMap,
    config: &RunConfig,
    sink: &dyn ProgressSink,
) -> bool {
    let specs = &config.data_point_specs;
    let threshold = config.minimum_confidence;
    if termination::should_terminate(data_points, specs, threshold) {
        info!(after = %after, "early termination: all requested data points confident");
        sink.emit(progress::early_terminated(
            after,
            termination::stats(data_points, specs, threshold),
        ));
        true
    } else {
        false
    }
}
