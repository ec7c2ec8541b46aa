use axum::{routing::get, Router};
use std::sync::Arc;

use crate::features::dental_reports::handlers;
use crate::features::dental_reports::services::DentalReportService;

/// Create protected dental report routes
pub fn routes(report_service: Arc<DentalReportService>) -> Router {
    Router::new()
        .route("/api/dental/reports", get(handlers::get_report))
        .with_state(report_service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::test_helpers::{lazy_pool, with_test_auth};
    use axum::http::StatusCode;
    use axum_test::TestServer;

    fn server(authenticated: bool) -> TestServer {
        let router = routes(Arc::new(DentalReportService::new(lazy_pool())));
        let router = if authenticated {
            with_test_auth(router)
        } else {
            router
        };
        TestServer::new(router).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_date_range_is_rejected() {
        let response = server(true)
            .get("/api/dental/reports")
            .add_query_param("dateRange", "fortnight")
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_inverted_custom_range_is_rejected() {
        let response = server(true)
            .get("/api/dental/reports")
            .add_query_param("dateRange", "custom")
            .add_query_param("startDate", "2024-02-01")
            .add_query_param("endDate", "2024-01-01")
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_requires_authentication() {
        let response = server(false).get("/api/dental/reports").await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }
}
