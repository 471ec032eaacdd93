//! Batch coordinator tests against scripted agents and a temp-file store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use prospector_agents::{CompanyAgents, DiscoveryOutput, SearchFinding, SearchInput};
use prospector_batch::{BatchItemOutcome, BatchOptions, run_batch};
use prospector_core::{AgentCoordinator, ProgressSink, SilentProgress};
use prospector_shared::{
    AnalysisOutcome, Credentials, DataPoint, DataPointMap, DataPointSpec, EnrichedRecord,
    EnrichmentResult, ProgressEvent, ProspectorError, Result, RunConfig,
};
use prospector_storage::Store;
use uuid::Uuid;

/// Agents whose discovery satisfies the single requested data point at full
/// confidence, so each run terminates right after discovery. URLs containing
/// "bad" fail discovery.
#[derive(Default)]
struct FlakyAgents {
    discover_calls: AtomicUsize,
}

impl CompanyAgents for FlakyAgents {
    async fn discover(
        &self,
        target_url: &str,
        _specs: &[DataPointSpec],
        _discover_links: bool,
        _generate_search_queries: bool,
    ) -> Result<DiscoveryOutput> {
        self.discover_calls.fetch_add(1, Ordering::SeqCst);
        if target_url.contains("bad") {
            return Err(ProspectorError::discovery(target_url, "503 from origin"));
        }
        let mut data_points = DataPointMap::new();
        data_points.insert(
            "company_name".into(),
            DataPoint::new("Acme Inc", 5, target_url).unwrap(),
        );
        Ok(DiscoveryOutput {
            data_points,
            resolved_url: target_url.to_string(),
            ..Default::default()
        })
    }

    async fn extract_internal_pages(
        &self,
        _discovery: &DiscoveryOutput,
        _needed_specs: &[DataPointSpec],
        _max_pages: usize,
    ) -> Result<DataPointMap> {
        Ok(DataPointMap::new())
    }

    async fn extract_profile(
        &self,
        _profile_url: &str,
        _needed_specs: &[DataPointSpec],
    ) -> Result<BTreeMap<String, Option<DataPoint>>> {
        Ok(BTreeMap::new())
    }

    async fn search(
        &self,
        _input: SearchInput<'_>,
    ) -> Result<BTreeMap<String, Option<SearchFinding>>> {
        Ok(BTreeMap::new())
    }

    async fn analyze(
        &self,
        _record: &EnrichedRecord,
        _criteria: Option<&str>,
    ) -> Result<AnalysisOutcome> {
        Ok(AnalysisOutcome {
            executive_summary: "Summary.".into(),
            fit_score: None,
            fit_reasoning: None,
        })
    }
}

fn config() -> RunConfig {
    RunConfig::new(vec![DataPointSpec::new(
        "company_name",
        "Legal company name",
    )])
}

fn credentials() -> Credentials {
    Credentials {
        scrape_api_key: "sk-scrape".into(),
        model_api_key: "sk-model".into(),
        search_api_key: Some("sk-search".into()),
    }
}

fn silent() -> Arc<dyn ProgressSink> {
    Arc::new(SilentProgress)
}

async fn temp_store() -> Arc<Store> {
    let tmp = std::env::temp_dir().join(format!("prospector_batch_{}.db", Uuid::now_v7()));
    Arc::new(Store::open(&tmp).await.expect("open temp store"))
}

fn urls(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn sequential(failure_threshold: u32) -> BatchOptions {
    BatchOptions {
        concurrency: 1,
        failure_threshold,
        min_task_interval: None,
    }
}

#[tokio::test]
async fn outcomes_follow_input_order() {
    let coordinator = Arc::new(AgentCoordinator::new(FlakyAgents::default()));
    let store = temp_store().await;
    let input = urls(&[
        "https://a.example",
        "https://b.example",
        "https://c.example",
    ]);

    let report = run_batch(
        &input,
        &config(),
        &credentials(),
        Arc::clone(&coordinator),
        Some(Arc::clone(&store)),
        silent(),
        &BatchOptions::default(),
    )
    .await
    .expect("batch runs");

    assert_eq!(report.outcomes.len(), 3);
    for (url, outcome) in input.iter().zip(&report.outcomes) {
        match outcome {
            BatchItemOutcome::Completed { result, reused } => {
                // the scripted resolved URL ties each result to its input
                assert_eq!(&result.sources[0], url);
                assert!(!reused);
            }
            other => panic!("expected completion for {url}, got {other:?}"),
        }
    }
    assert_eq!(report.summary.completed, 3);
    assert_eq!(report.summary.failed, 0);
    assert!(!report.summary.breaker_tripped);

    // every outcome was persisted for resume
    assert_eq!(store.count().await.unwrap(), 3);
}

#[tokio::test]
async fn breaker_trips_and_abandons_queued_urls() {
    let coordinator = Arc::new(AgentCoordinator::new(FlakyAgents::default()));
    let input = urls(&[
        "https://bad1.example",
        "https://bad2.example",
        "https://c.example",
        "https://d.example",
    ]);

    let report = run_batch(
        &input,
        &config(),
        &credentials(),
        Arc::clone(&coordinator),
        None,
        silent(),
        &sequential(2),
    )
    .await
    .expect("batch runs");

    assert!(matches!(
        report.outcomes[0],
        BatchItemOutcome::Failed { .. }
    ));
    assert!(matches!(
        report.outcomes[1],
        BatchItemOutcome::Failed { .. }
    ));
    for outcome in &report.outcomes[2..] {
        match outcome {
            BatchItemOutcome::Skipped { reason } => assert!(reason.contains("breaker")),
            other => panic!("expected skip after trip, got {other:?}"),
        }
    }
    assert!(report.summary.breaker_tripped);
    assert_eq!(report.summary.skipped, 2);

    // URLs after the trip never reached discovery
    assert_eq!(
        coordinator.agents().discover_calls.load(Ordering::SeqCst),
        2
    );
}

#[tokio::test]
async fn success_resets_the_failure_count() {
    let coordinator = Arc::new(AgentCoordinator::new(FlakyAgents::default()));
    let input = urls(&[
        "https://bad1.example",
        "https://b.example",
        "https://bad2.example",
        "https://d.example",
    ]);

    let report = run_batch(
        &input,
        &config(),
        &credentials(),
        Arc::clone(&coordinator),
        None,
        silent(),
        &sequential(2),
    )
    .await
    .expect("batch runs");

    // alternating failures never reach two consecutive
    assert!(!report.summary.breaker_tripped);
    assert_eq!(report.summary.completed, 2);
    assert_eq!(report.summary.failed, 2);
    assert_eq!(report.summary.skipped, 0);
    assert_eq!(
        coordinator.agents().discover_calls.load(Ordering::SeqCst),
        4
    );
}

#[tokio::test]
async fn stored_outcomes_are_reused_without_rerunning() {
    let coordinator = Arc::new(AgentCoordinator::new(FlakyAgents::default()));
    let store = temp_store().await;

    let stored_result = EnrichmentResult {
        record: EnrichedRecord::default(),
        sources: vec!["https://done.example".into()],
        duration_seconds: 1.0,
        analysis: None,
    };
    store
        .record_success("https://done.example", &stored_result)
        .await
        .unwrap();
    store
        .record_failure("https://gone.example", "dns failure")
        .await
        .unwrap();

    let input = urls(&[
        "https://done.example",
        "https://gone.example",
        "https://fresh.example",
    ]);

    let report = run_batch(
        &input,
        &config(),
        &credentials(),
        Arc::clone(&coordinator),
        Some(Arc::clone(&store)),
        silent(),
        &sequential(5),
    )
    .await
    .expect("batch runs");

    match &report.outcomes[0] {
        BatchItemOutcome::Completed { result, reused } => {
            assert!(reused);
            assert_eq!(result.sources[0], "https://done.example");
        }
        other => panic!("expected reused completion, got {other:?}"),
    }
    match &report.outcomes[1] {
        BatchItemOutcome::Failed { error, reused } => {
            assert!(reused);
            assert_eq!(error, "dns failure");
        }
        other => panic!("expected reused failure, got {other:?}"),
    }
    assert!(matches!(
        report.outcomes[2],
        BatchItemOutcome::Completed { reused: false, .. }
    ));

    // only the fresh URL actually ran
    assert_eq!(
        coordinator.agents().discover_calls.load(Ordering::SeqCst),
        1
    );
    assert_eq!(report.summary.reused, 2);

    // reused failures leave the breaker alone
    assert!(!report.summary.breaker_tripped);
}

#[tokio::test]
async fn failures_are_persisted_for_resume() {
    let coordinator = Arc::new(AgentCoordinator::new(FlakyAgents::default()));
    let store = temp_store().await;

    run_batch(
        &urls(&["https://bad.example"]),
        &config(),
        &credentials(),
        coordinator,
        Some(Arc::clone(&store)),
        silent(),
        &BatchOptions::default(),
    )
    .await
    .expect("batch runs");

    let stored = store
        .get("https://bad.example")
        .await
        .unwrap()
        .expect("failure recorded");
    assert_eq!(stored.status, prospector_storage::RecordStatus::Error);
    assert!(stored.error_message.unwrap().contains("503"));
}

#[tokio::test]
async fn unpersistable_result_fails_the_item() {
    let coordinator = Arc::new(AgentCoordinator::new(FlakyAgents::default()));
    let tmp = std::env::temp_dir().join(format!("prospector_batch_{}.db", Uuid::now_v7()));
    let store = Arc::new(Store::open(&tmp).await.expect("open temp store"));

    // A second connection holds the write lock for the whole batch, so the
    // store's retry loop exhausts its attempts.
    let blocker_db = libsql::Builder::new_local(&tmp)
        .build()
        .await
        .expect("open blocker db");
    let blocker = blocker_db.connect().expect("blocker connection");
    blocker
        .execute("BEGIN IMMEDIATE", libsql::params![])
        .await
        .expect("take write lock");

    let report = run_batch(
        &urls(&["https://a.example"]),
        &config(),
        &credentials(),
        coordinator,
        Some(Arc::clone(&store)),
        silent(),
        &BatchOptions::default(),
    )
    .await
    .expect("batch runs");

    match &report.outcomes[0] {
        BatchItemOutcome::Failed { error, reused } => {
            assert!(!reused);
            assert!(error.contains("persist"), "unexpected error: {error}");
        }
        other => panic!("expected persistence failure to surface, got {other:?}"),
    }
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.completed, 0);

    // nothing landed in the store, so the item must not read as resumable
    blocker
        .execute("ROLLBACK", libsql::params![])
        .await
        .expect("release lock");
    assert_eq!(store.count().await.unwrap(), 0);
}

#[derive(Default)]
struct CollectingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl ProgressSink for CollectingSink {
    fn emit(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[tokio::test]
async fn events_carry_the_company_url() {
    let coordinator = Arc::new(AgentCoordinator::new(FlakyAgents::default()));
    let sink = Arc::new(CollectingSink::default());

    run_batch(
        &urls(&["https://a.example"]),
        &config(),
        &credentials(),
        coordinator,
        None,
        sink.clone(),
        &BatchOptions::default(),
    )
    .await
    .expect("batch runs");

    let events = sink.events.lock().unwrap();
    assert!(!events.is_empty());
    for event in events.iter() {
        let payload = event.payload.as_ref().expect("keyed payload");
        assert_eq!(payload["company_url"], "https://a.example");
    }
}
