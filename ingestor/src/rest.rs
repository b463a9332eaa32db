use crate::metrics::gather_metrics;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tracing::error;

/// `/metrics` (Prometheus text format) and `/health`.
pub fn create_router() -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health))
}

async fn metrics_handler() -> Result<String, AppError> {
    Ok(gather_metrics()?)
}

async fn health() -> &'static str {
    "ok"
}

struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("API error: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Internal server error: {}", self.0),
        )
            .into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health() {
        assert_eq!(tokio_test::block_on(health()), "ok");
    }

    #[test]
    fn test_metrics_endpoint_renders_registry() {
        crate::metrics::init_metrics();
        let body = tokio_test::block_on(metrics_handler()).ok().unwrap();
        assert!(body.contains("ingestor_stored_total"));
    }

    #[test]
    fn test_app_error_is_500() {
        let response = AppError(anyhow::anyhow!("boom")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
