use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tracing::error;

use crate::db::StoreError;
use crate::metrics::{MetricsError, MetricsService};

pub mod metrics_routes;

#[derive(Clone)]
pub struct AppState {
    pub metrics: Arc<MetricsService>,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Store(e) => {
                error!(error = %e, "Store error while serving request.");
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Store error: {e}"))
            }
        };
        (status, Json(serde_json::json!({ "error": error_message }))).into_response()
    }
}

impl From<MetricsError> for AppError {
    fn from(err: MetricsError) -> Self {
        match err {
            MetricsError::InvalidWindow { .. } => AppError::InvalidInput(err.to_string()),
            MetricsError::Store(e) => AppError::Store(e),
        }
    }
}

async fn health_check_handler() -> &'static str {
    "OK"
}

pub fn create_router(metrics: Arc<MetricsService>) -> Router {
    let state = Arc::new(AppState { metrics });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_check_handler))
        .merge(metrics_routes::metrics_router())
        .with_state(state)
        .layer(cors)
}
