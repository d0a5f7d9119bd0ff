//! # Routing Flows
//!
//! Prefix resolution and method checks run before authentication, so a
//! misrouted request is refused without credentials and without any
//! upstream traffic.

#[cfg(test)]
mod tests {
    use crate::support::*;
    use api_gateway::{ServiceConfig, REQUEST_ID_HEADER};
    use axum::{body::Body, http::Method, http::StatusCode};

    // =============================================================================
    // PREFIX RESOLUTION
    // =============================================================================

    #[tokio::test]
    async fn test_unknown_prefix_is_refused_without_upstream_call() {
        let backend = MockBackend::start(MockReply::Ok).await;
        let gateway = TestGateway::for_backend(&backend);

        let token = mint_token(user_claims(), 300);
        let resp = gateway
            .send(
                request(Method::GET, "/zzz/api/anything")
                    .header("authorization", bearer(&token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;

        assert_eq!(resp.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(resp.error_code(), "SERVICE_NOT_CONFIGURED");
        assert_eq!(resp.body["error"]["message"], "Service zzz is not configured");
        assert_eq!(resp.body["success"], false);
        assert_eq!(backend.hits(), 0);
    }

    #[tokio::test]
    async fn test_root_path_has_no_service() {
        let backend = MockBackend::start(MockReply::Ok).await;
        let gateway = TestGateway::for_backend(&backend);

        let resp = gateway.get("/").await;

        assert_eq!(resp.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(resp.error_code(), "SERVICE_NOT_CONFIGURED");
        assert_eq!(backend.hits(), 0);
    }

    #[tokio::test]
    async fn test_invalid_service_entries_are_skipped() {
        let backend = MockBackend::start(MockReply::Ok).await;
        let gateway = TestGateway::new(gateway_config(vec![
            ServiceConfig::new("emp", backend.url()),
            ServiceConfig::new("bad", "not a url"),
            ServiceConfig::new("ftp", "ftp://files.local"),
            ServiceConfig::new("emp", "http://127.0.0.1:1"),
        ]));

        let health = gateway.get("/health").await;
        let services = health.body["data"]["services"].as_array().unwrap();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0]["name"], "emp-service");

        let resp = gateway.get("/bad/api/x").await;
        assert_eq!(resp.error_code(), "SERVICE_NOT_CONFIGURED");
    }

    // =============================================================================
    // METHOD CHECKS
    // =============================================================================

    #[tokio::test]
    async fn test_disallowed_method_is_refused_without_upstream_call() {
        let backend = MockBackend::start(MockReply::Ok).await;
        let gateway = TestGateway::for_backend(&backend);

        let resp = gateway
            .send(
                request(Method::POST, "/rep/api/reports")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await;

        assert_eq!(resp.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(resp.error_code(), "METHOD_NOT_ALLOWED");
        assert_eq!(
            resp.body["error"]["message"],
            "Method POST not allowed for rep-service"
        );
        assert_eq!(backend.hits(), 0);
    }

    #[tokio::test]
    async fn test_allowed_method_reaches_auth() {
        let backend = MockBackend::start(MockReply::Ok).await;
        let gateway = TestGateway::for_backend(&backend);

        let resp = gateway.get("/rep/api/reports").await;

        assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
        assert_eq!(backend.hits(), 0);
    }

    // =============================================================================
    // HEALTH
    // =============================================================================

    #[tokio::test]
    async fn test_health_lists_configured_services() {
        let backend = MockBackend::start(MockReply::Ok).await;
        let gateway = TestGateway::for_backend(&backend);

        let resp = gateway
            .send(
                request(Method::GET, "/health")
                    .header(REQUEST_ID_HEADER, "health-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;

        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.body["success"], true);
        assert_eq!(resp.request_id(), "health-1");
        assert_eq!(resp.body["data"]["status"], "ok");

        let names: Vec<&str> = resp.body["data"]["services"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["id-service", "emp-service", "rep-service"]);
        assert_eq!(backend.hits(), 0);
    }
}
