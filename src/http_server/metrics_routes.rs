use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use super::{AppError, AppState};
use crate::db::models::{Metrics, TargetMetrics};
use crate::metrics::MetricsQuery;

async fn get_metrics_handler(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<MetricsQuery>,
) -> Result<Json<Metrics>, AppError> {
    let metrics = app_state.metrics.get_metrics(&params).await?;
    Ok(Json(metrics))
}

async fn get_target_metrics_handler(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<MetricsQuery>,
) -> Result<Json<Vec<TargetMetrics>>, AppError> {
    let metrics = app_state.metrics.get_per_target_metrics(&params).await?;
    Ok(Json(metrics))
}

pub fn metrics_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/metrics", get(get_metrics_handler))
        .route("/api/metrics/targets", get(get_target_metrics_handler))
}

#[cfg(test)]
mod tests {
    use crate::db::models::{ProbeRecord, Target};
    use crate::db::{HealthRecordStore, MemoryStore};
    use crate::http_server::create_router;
    use crate::metrics::MetricsService;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::{Duration, Utc};
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn router() -> axum::Router {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_target(Target {
                id: 1,
                name: "checkout".into(),
                url: "http://localhost".into(),
                method: "GET".into(),
                headers: None,
                body: None,
                check_interval_seconds: 60,
                timeout_seconds: 5,
                is_active: true,
                environment: Some("prod".into()),
            })
            .await;
        for ok in [true, false] {
            store
                .append_record(&ProbeRecord {
                    target_id: 1,
                    timestamp: Utc::now() - Duration::minutes(5),
                    is_success: ok,
                    status_code: if ok { 200 } else { 502 },
                    latency_ms: 75,
                    response_body: None,
                    error_message: None,
                })
                .await
                .unwrap();
        }
        let metrics = MetricsService::new(store.clone(), store.clone(), store.clone(), store);
        create_router(Arc::new(metrics))
    }

    async fn get_json(uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router()
            .await
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn metrics_are_camel_case_json() {
        let (status, body) = get_json("/api/metrics?environment=prod").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["errorRatePercent"], 50.0);
        assert_eq!(body["latencyP99Ms"], 75);
        assert_eq!(body["alertCount"], 0);
        assert_eq!(body["targetBreakdown"][0]["targetName"], "checkout");
        assert_eq!(body["targetBreakdown"][0]["environment"], "prod");
    }

    #[tokio::test]
    async fn per_target_route_filters_environment() {
        let (status, body) = get_json("/api/metrics/targets?environment=staging").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!([]));
    }

    #[tokio::test]
    async fn inverted_window_is_bad_request() {
        let (status, body) = get_json(
            "/api/metrics?startTime=2025-01-02T00:00:00Z&endTime=2025-01-01T00:00:00Z",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Invalid time window"));
    }
}
