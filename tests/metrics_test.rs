//! Metrics emission, captured with `metrics_util::debugging::DebuggingRecorder`.
//!
//! The recorder is thread-local, so these tests assert on metrics emitted
//! on the request path (request counters, cache counters, selection
//! counter); per-attempt dispatch metrics are emitted from the detached
//! dispatch task and are exercised by the gateway tests instead.

use std::sync::Arc;

use async_trait::async_trait;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use metrics_util::MetricKind;

use bifrost::telemetry;
use bifrost::{
    BackendAdapter, Bifrost, ProviderConfig, Query, QueryContext, Result, RiskTier,
};

struct EchoAdapter(&'static str);

#[async_trait]
impl BackendAdapter for EchoAdapter {
    fn id(&self) -> &str {
        self.0
    }

    async fn invoke(&self, text: &str, _context: &QueryContext) -> Result<String> {
        Ok(format!("answer to: {text}"))
    }
}

fn gateway() -> Bifrost {
    Bifrost::builder()
        .provider(
            ProviderConfig {
                id: "fast-eu".into(),
                cost_per_unit: 2.5,
                compliance_tags: vec!["region-eu".into()],
                risk_ceiling: RiskTier::High,
            },
            Arc::new(EchoAdapter("fast-eu")),
        )
        .build()
        .unwrap()
}

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

/// Sum all counter values matching a given metric name.
fn counter_total(snapshot: &SnapshotVec, name: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Sum counter values matching a metric name and a label pair.
fn counter_with_label(snapshot: &SnapshotVec, name: &str, label: &str, value: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| {
            key.kind() == MetricKind::Counter
                && key.key().name() == name
                && key
                    .key()
                    .labels()
                    .any(|l| l.key() == label && l.value() == value)
        })
        .map(|(_, _, _, v)| match v {
            DebugValue::Counter(n) => *n,
            _ => 0,
        })
        .sum()
}

/// Check if any histogram entries exist for a given metric name.
fn has_histogram(snapshot: &SnapshotVec, name: &str) -> bool {
    snapshot
        .iter()
        .any(|(key, _, _, _)| key.kind() == MetricKind::Histogram && key.key().name() == name)
}

/// Runs async code within a local recorder scope on the multi-thread
/// runtime. `block_in_place` keeps the sync `with_local_recorder` closure
/// on the current thread while `block_on` drives the inner async work.
#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn miss_then_hit_records_cache_and_request_counters() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let gateway = gateway();
                gateway.route(Query::new("sum VAT")).await.unwrap();
                gateway.route(Query::new("sum VAT")).await.unwrap();
            })
        })
    });

    let snapshot = snapshotter.snapshot().into_vec();

    assert_eq!(counter_total(&snapshot, telemetry::REQUESTS_TOTAL), 2);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_HITS_TOTAL), 1);
    assert!(has_histogram(&snapshot, telemetry::REQUEST_DURATION_SECONDS));

    // The hit is attributed to the cache, not the provider.
    assert_eq!(
        counter_with_label(&snapshot, telemetry::REQUESTS_TOTAL, "provider", "cache"),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn selection_counts_the_top_ranked_provider() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let gateway = gateway();
                gateway.route(Query::new("sum VAT")).await.unwrap();
            })
        })
    });

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(
        counter_with_label(
            &snapshot,
            telemetry::PROVIDER_SELECTED_TOTAL,
            "provider",
            "fast-eu"
        ),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn routing_failure_records_an_error_request() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let gateway = gateway();
                let query = Query::new("sum VAT")
                    .context(QueryContext::default().require("region-mars"));
                let _ = gateway.route(query).await;
            })
        })
    });

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(
        counter_with_label(&snapshot, telemetry::REQUESTS_TOTAL, "status", "error"),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn ambiguous_classification_is_counted() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let gateway = gateway();
                gateway.route(Query::new("???!!!")).await.unwrap();
            })
        })
    });

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(
        counter_total(&snapshot, telemetry::CLASSIFICATION_AMBIGUOUS_TOTAL),
        1
    );
}

#[tokio::test]
async fn metrics_are_noop_without_recorder() {
    // Verify no panics when no recorder is installed.
    let gateway = gateway();
    gateway.route(Query::new("sum VAT")).await.unwrap();
}
