//! Liveness endpoint; the service has no functional HTTP routes.

use axum::{Json, Router, routing::get};
use serde::Serialize;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub(crate) fn router() -> Router {
    Router::new().route("/health", get(health_check))
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use axum_test::TestServer;
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn health_reports_ok() {
        let server = TestServer::new(router()).unwrap();

        let response = server.get("/health").await;

        response.assert_status_ok();
        response.assert_json(&json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
        }));
    }

    #[tokio::test]
    async fn other_paths_are_not_served() {
        let server = TestServer::new(router()).unwrap();

        let response = server.get("/notifications").expect_failure().await;

        response.assert_status_not_found();
    }
}
