use axum::{http::StatusCode, routing::get, Router};
use chrono::{DateTime, Duration, TimeZone, Utc};
use pulse_monitor::alerting::EvaluationService;
use pulse_monitor::db::models::{
    AlertKind, AlertRule, ComparisonOperator, ProbeRecord, RuleScope, Target,
};
use pulse_monitor::db::{HealthRecordStore, MemoryStore};
use pulse_monitor::metrics::{MetricsQuery, MetricsService};
use pulse_monitor::monitoring::{HttpProber, Scheduler};
use std::net::SocketAddr;
use std::sync::Arc;

async fn spawn_target_server() -> SocketAddr {
    let router = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route(
            "/broken",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }),
        );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn tick_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 7, 14, 15, 30, 0).unwrap()
}

fn target(id: i32, url: String) -> Target {
    Target {
        id,
        name: format!("target-{id}"),
        url,
        method: "GET".into(),
        headers: None,
        body: None,
        check_interval_seconds: 60,
        timeout_seconds: 5,
        is_active: true,
        environment: Some("prod".into()),
    }
}

fn history(target_id: i32, at: DateTime<Utc>, ok: bool) -> ProbeRecord {
    ProbeRecord {
        target_id,
        timestamp: at,
        is_success: ok,
        status_code: if ok { 200 } else { 503 },
        latency_ms: 90,
        response_body: None,
        error_message: (!ok).then(|| "Service Unavailable".to_string()),
    }
}

fn scheduler(store: &Arc<MemoryStore>) -> Scheduler {
    let evaluator = Arc::new(EvaluationService::new(store.clone(), store.clone()));
    Scheduler::new(
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(HttpProber::new().unwrap()),
        evaluator,
        4,
    )
}

#[tokio::test]
async fn first_tick_probes_and_persists_without_alerts() {
    let addr = spawn_target_server().await;
    let store = Arc::new(MemoryStore::new());
    store
        .upsert_target(target(1, format!("http://{addr}/health")))
        .await;
    store
        .add_rule(AlertRule {
            id: 1,
            name: "slow checkout".into(),
            kind: AlertKind::Latency,
            operator: ComparisonOperator::GreaterThan,
            threshold: 5_000.0,
            scope: RuleScope::Target(1),
            is_active: true,
        })
        .await;

    let report = scheduler(&store).run_tick(tick_time()).await.unwrap();

    assert_eq!(report.probed, 1);
    assert_eq!(report.failed_probes, 0);
    assert_eq!(report.firings, 0);

    let records = store.records().await;
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.target_id, 1);
    assert_eq!(record.timestamp, tick_time());
    assert!(record.is_success);
    assert_eq!(record.status_code, 200);
    assert_eq!(record.response_body.as_deref(), Some("ok"));
    assert!(record.latency_ms >= 0);
    assert!(store.firings().await.is_empty());
}

#[tokio::test]
async fn error_rate_breach_fires_once_and_is_debounced() {
    let addr = spawn_target_server().await;
    let store = Arc::new(MemoryStore::new());
    store
        .upsert_target(target(1, format!("http://{addr}/health")))
        .await;
    store
        .add_rule(AlertRule {
            id: 7,
            name: "checkout errors".into(),
            kind: AlertKind::ErrorRate,
            operator: ComparisonOperator::GreaterThan,
            threshold: 30.0,
            scope: RuleScope::Target(1),
            is_active: true,
        })
        .await;

    // 9 prior records, 4 failed; the tick adds a 10th successful one: 40%.
    for i in 0..9 {
        let at = tick_time() - Duration::minutes(5 * (i + 1));
        store.append_record(&history(1, at, i >= 4)).await.unwrap();
    }

    let scheduler = scheduler(&store);
    let report = scheduler.run_tick(tick_time()).await.unwrap();
    assert_eq!(report.probed, 1);
    assert_eq!(report.firings, 1);

    let firings = store.firings().await;
    assert_eq!(firings.len(), 1);
    assert_eq!(firings[0].rule_id, 7);
    assert_eq!(firings[0].fired_at, tick_time());
    assert!(firings[0].message.contains("error rate 40.00%"));
    assert!(firings[0].message.contains("> threshold 30"));

    // Not due yet.
    let report = scheduler
        .run_tick(tick_time() + Duration::seconds(10))
        .await
        .unwrap();
    assert_eq!(report.probed, 0);

    // Due again and still above threshold, but inside the debounce window.
    let report = scheduler
        .run_tick(tick_time() + Duration::minutes(2))
        .await
        .unwrap();
    assert_eq!(report.probed, 1);
    assert_eq!(report.firings, 0);
    assert_eq!(store.firings().await.len(), 1);
}

#[tokio::test]
async fn interval_gates_probing() {
    let addr = spawn_target_server().await;
    let store = Arc::new(MemoryStore::new());
    store
        .upsert_target(target(1, format!("http://{addr}/health")))
        .await;
    store
        .append_record(&history(1, tick_time() - Duration::seconds(30), true))
        .await
        .unwrap();
    let scheduler = scheduler(&store);

    let early = scheduler.run_tick(tick_time()).await.unwrap();
    assert_eq!(early.probed, 0);

    let on_time = scheduler
        .run_tick(tick_time() + Duration::seconds(30))
        .await
        .unwrap();
    assert_eq!(on_time.probed, 1);
    assert_eq!(store.records().await.len(), 2);
}

#[tokio::test]
async fn unreachable_and_failing_targets_are_recorded() {
    let addr = spawn_target_server().await;
    let closed = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let store = Arc::new(MemoryStore::new());
    store
        .upsert_target(target(1, format!("http://{addr}/broken")))
        .await;
    store.upsert_target(target(2, format!("http://{closed}/"))).await;
    store
        .upsert_target(target(3, format!("http://{addr}/health")))
        .await;

    let report = scheduler(&store).run_tick(tick_time()).await.unwrap();

    assert_eq!(report.probed, 3);
    assert_eq!(report.failed_probes, 2);
    assert_eq!(report.target_errors, 0);

    let mut records = store.records().await;
    records.sort_by_key(|r| r.target_id);
    assert_eq!(records[0].status_code, 503);
    assert!(!records[0].is_success);
    assert_eq!(records[1].status_code, 0);
    assert!(records[1].error_message.is_some());
    assert!(records[2].is_success);
}

#[tokio::test]
async fn metrics_reflect_tick_results() {
    let addr = spawn_target_server().await;
    let store = Arc::new(MemoryStore::new());
    store
        .upsert_target(target(1, format!("http://{addr}/health")))
        .await;
    store
        .upsert_target(target(2, format!("http://{addr}/broken")))
        .await;

    scheduler(&store).run_tick(tick_time()).await.unwrap();

    let metrics = MetricsService::new(store.clone(), store.clone(), store.clone(), store.clone());
    let query = MetricsQuery {
        environment: Some("prod".into()),
        start_time: Some(tick_time() - Duration::minutes(1)),
        end_time: Some(tick_time()),
    };
    let result = metrics.get_metrics(&query).await.unwrap();

    assert_eq!(result.error_rate_percent, 50.0);
    assert!((result.total_traffic_tps - 2.0 / 60.0).abs() < 1e-12);
    assert_eq!(result.target_breakdown.len(), 2);
    assert_eq!(result.alert_count, 0);
}
