//! Batch coordinator: runs one enrichment flow per company URL with bounded
//! concurrency, a consecutive-failure circuit breaker, and resumable
//! persistence through the libSQL store.
//!
//! Launch order follows input order; completion order does not. Outcomes are
//! reported in input order regardless, with an explicit entry per URL so
//! callers can line results up against their input list.
//!
//! Breaker semantics: `failure_threshold` *consecutive* failures trip it
//! (any success resets the count). Once tripped, in-flight runs finish
//! normally and every URL not yet launched is abandoned as skipped. The
//! breaker never untrips within one batch.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use prospector_agents::CompanyAgents;
use prospector_core::{AgentCoordinator, ProgressSink, enrich};
use prospector_shared::{
    Credentials, EnrichmentResult, ProgressEvent, ProspectorError, Result, RunConfig,
};
use prospector_storage::{RecordStatus, Store};

/// Knobs for one batch invocation.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Maximum simultaneously in-flight runs.
    pub concurrency: usize,
    /// Consecutive failures before the breaker trips. 0 disables it.
    pub failure_threshold: u32,
    /// Minimum delay between run launches, for rate-limited backends.
    pub min_task_interval: Option<Duration>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            failure_threshold: 5,
            min_task_interval: None,
        }
    }
}

/// Terminal outcome for one input URL.
#[derive(Debug)]
pub enum BatchItemOutcome {
    /// The run produced a result. `reused` marks a stored result returned
    /// without re-running the pipeline.
    Completed {
        result: EnrichmentResult,
        reused: bool,
    },
    /// The run failed. `reused` marks a stored failure returned without
    /// re-running the pipeline.
    Failed { error: String, reused: bool },
    /// Never launched (breaker open, or abandoned before launch).
    Skipped { reason: String },
}

/// Aggregate counts for one batch invocation.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Of `completed` + `failed`, how many came straight from the store.
    pub reused: usize,
    pub breaker_tripped: bool,
    pub duration_seconds: f64,
}

/// Full batch output: per-URL outcomes in input order, plus the summary.
#[derive(Debug)]
pub struct BatchReport {
    pub outcomes: Vec<BatchItemOutcome>,
    pub summary: BatchSummary,
}

// ---------------------------------------------------------------------------
// Circuit breaker
// ---------------------------------------------------------------------------

struct CircuitBreaker {
    threshold: u32,
    consecutive_failures: AtomicU32,
    tripped: AtomicBool,
}

impl CircuitBreaker {
    fn new(threshold: u32) -> Self {
        Self {
            threshold,
            consecutive_failures: AtomicU32::new(0),
            tripped: AtomicBool::new(false),
        }
    }

    fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
    }

    /// Count a failure; returns whether this one tripped the breaker.
    fn record_failure(&self) -> bool {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        if self.threshold > 0 && failures >= self.threshold {
            return !self.tripped.swap(true, Ordering::SeqCst);
        }
        false
    }

    fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Keyed progress
// ---------------------------------------------------------------------------

/// Sink adapter that stamps the company URL into every event payload, so a
/// shared subscriber can demultiplex interleaved batch runs.
pub struct KeyedProgress {
    url: String,
    inner: Arc<dyn ProgressSink>,
}

impl KeyedProgress {
    pub fn new(url: impl Into<String>, inner: Arc<dyn ProgressSink>) -> Self {
        Self {
            url: url.into(),
            inner,
        }
    }
}

impl ProgressSink for KeyedProgress {
    fn emit(&self, mut event: ProgressEvent) {
        let payload = event
            .payload
            .take()
            .unwrap_or_else(|| serde_json::Value::Object(Default::default()));
        event.payload = Some(match payload {
            serde_json::Value::Object(mut map) => {
                map.insert(
                    "company_url".to_string(),
                    serde_json::Value::String(self.url.clone()),
                );
                serde_json::Value::Object(map)
            }
            other => other,
        });
        self.inner.emit(event);
    }
}

// ---------------------------------------------------------------------------
// Batch runner
// ---------------------------------------------------------------------------

/// Run one enrichment flow per URL in `urls`.
///
/// Every URL gets exactly one outcome. Per-run failures are contained (they
/// count toward the breaker but never abort the batch); the returned error
/// covers batch-level problems only.
#[instrument(skip_all, fields(total = urls.len(), concurrency = options.concurrency))]
pub async fn run_batch<A>(
    urls: &[String],
    config: &RunConfig,
    credentials: &Credentials,
    coordinator: Arc<AgentCoordinator<A>>,
    store: Option<Arc<Store>>,
    sink: Arc<dyn ProgressSink>,
    options: &BatchOptions,
) -> Result<BatchReport>
where
    A: CompanyAgents + 'static,
{
    config.validate()?;
    credentials.validate(config.sources.google)?;

    let started = Instant::now();
    let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let breaker = Arc::new(CircuitBreaker::new(options.failure_threshold));

    let mut slots: Vec<Option<BatchItemOutcome>> = Vec::with_capacity(urls.len());
    slots.resize_with(urls.len(), || None);

    let mut join_set: JoinSet<(usize, BatchItemOutcome)> = JoinSet::new();

    info!("starting batch");
    for (index, url) in urls.iter().enumerate() {
        if index > 0 {
            if let Some(interval) = options.min_task_interval {
                tokio::time::sleep(interval).await;
            }
        }

        // Own a permit before deciding anything, so the breaker check sees
        // the failures of every run that would otherwise still be queued.
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ProspectorError::config("batch semaphore closed"))?;

        if breaker.is_tripped() {
            debug!(url = %url, "breaker open, abandoning queued URL");
            slots[index] = Some(BatchItemOutcome::Skipped {
                reason: "circuit breaker open".to_string(),
            });
            continue;
        }

        let url = url.clone();
        let config = config.clone();
        let credentials = credentials.clone();
        let coordinator = Arc::clone(&coordinator);
        let store = store.clone();
        let breaker = Arc::clone(&breaker);
        let sink = Arc::clone(&sink);

        join_set.spawn(async move {
            let _permit = permit;
            let outcome = run_one(
                &url,
                &config,
                &credentials,
                &coordinator,
                store.as_deref(),
                &breaker,
                &sink,
            )
            .await;
            (index, outcome)
        });
    }

    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((index, outcome)) => slots[index] = Some(outcome),
            Err(e) => {
                // A panicked run is a failure with no known index; the slot
                // it owned stays empty and is reported as skipped below.
                warn!(error = %e, "batch task did not complete");
            }
        }
    }

    let outcomes: Vec<BatchItemOutcome> = slots
        .into_iter()
        .map(|slot| {
            slot.unwrap_or(BatchItemOutcome::Skipped {
                reason: "run did not complete".to_string(),
            })
        })
        .collect();

    let mut summary = BatchSummary {
        total: urls.len(),
        breaker_tripped: breaker.is_tripped(),
        duration_seconds: started.elapsed().as_secs_f64(),
        ..BatchSummary::default()
    };
    for outcome in &outcomes {
        match outcome {
            BatchItemOutcome::Completed { reused, .. } => {
                summary.completed += 1;
                summary.reused += usize::from(*reused);
            }
            BatchItemOutcome::Failed { reused, .. } => {
                summary.failed += 1;
                summary.reused += usize::from(*reused);
            }
            BatchItemOutcome::Skipped { .. } => summary.skipped += 1,
        }
    }

    info!(
        completed = summary.completed,
        failed = summary.failed,
        skipped = summary.skipped,
        reused = summary.reused,
        breaker_tripped = summary.breaker_tripped,
        "batch finished"
    );

    Ok(BatchReport { outcomes, summary })
}

/// Run (or reuse) one company. Never returns an error: every path folds
/// into a [`BatchItemOutcome`]. A successful run whose result cannot be
/// persisted is reported as failed; the store has no record for it, so a
/// resumed batch would otherwise silently re-run it.
async fn run_one<A: CompanyAgents>(
    url: &str,
    config: &RunConfig,
    credentials: &Credentials,
    coordinator: &AgentCoordinator<A>,
    store: Option<&Store>,
    breaker: &CircuitBreaker,
    sink: &Arc<dyn ProgressSink>,
) -> BatchItemOutcome {
    // Resume: a stored outcome short-circuits the run and leaves the
    // breaker untouched.
    if let Some(store) = store {
        match store.get(url).await {
            Ok(Some(record)) => match record.status {
                RecordStatus::Success => match record.result() {
                    Ok(Some(result)) => {
                        debug!(url, "reusing stored result");
                        return BatchItemOutcome::Completed {
                            result,
                            reused: true,
                        };
                    }
                    Ok(None) | Err(_) => {
                        warn!(url, "stored result unreadable, re-running");
                    }
                },
                RecordStatus::Error => {
                    debug!(url, "reusing stored failure");
                    return BatchItemOutcome::Failed {
                        error: record
                            .error_message
                            .unwrap_or_else(|| "unknown stored failure".to_string()),
                        reused: true,
                    };
                }
            },
            Ok(None) => {}
            Err(e) => warn!(url, error = %e, "resume lookup failed, running anyway"),
        }
    }

    let keyed = KeyedProgress::new(url, Arc::clone(sink));
    match enrich(url, config, credentials, coordinator, &keyed).await {
        Ok(result) => {
            breaker.record_success();
            if let Some(store) = store {
                if let Err(e) = store.record_success(url, &result).await {
                    warn!(url, error = %e, "result could not be persisted");
                    return BatchItemOutcome::Failed {
                        error: format!("run succeeded but persisting the result failed: {e}"),
                        reused: false,
                    };
                }
            }
            BatchItemOutcome::Completed {
                result,
                reused: false,
            }
        }
        Err(e) => {
            let mut error = e.to_string();
            if breaker.record_failure() {
                warn!(url, "consecutive-failure threshold reached, tripping breaker");
            }
            if let Some(store) = store {
                if let Err(persist_err) = store.record_failure(url, &error).await {
                    warn!(url, error = %persist_err, "failed to persist failure");
                    error = format!("{error} (failure not persisted: {persist_err})");
                }
            }
            BatchItemOutcome::Failed {
                error,
                reused: false,
            }
        }
    }
}
