//! # Envelope Flows
//!
//! Every response, success or failure, leaves the gateway in the same
//! envelope. `error.details` and `error.stack` appear only when the
//! matching switch is on.

#[cfg(test)]
mod tests {
    use crate::support::*;
    use api_gateway::{GatewayConfig, ServiceConfig, REQUEST_ID_HEADER};
    use axum::{
        body::Body,
        http::{header, Method, StatusCode},
    };
    use serde_json::{json, Value};

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    /// Backend failing with every optional error field populated
    async fn verbose_failing_backend() -> MockBackend {
        MockBackend::start(MockReply::json(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({
                "success": false,
                "error": {
                    "code": "DB_DOWN",
                    "message": "Database unavailable",
                    "details": { "pool": "primary" },
                    "stack": "Error: connect ECONNREFUSED\n    at db.js:10"
                }
            }),
        ))
        .await
    }

    fn config(backend: &MockBackend, show_details: bool, show_stack: bool) -> GatewayConfig {
        let mut config = gateway_config(vec![
            ServiceConfig::new("emp", backend.url()),
            ServiceConfig::new("rep", backend.url()).with_methods(["GET"]),
            // Nothing listens on port 9 locally
            ServiceConfig::new("down", "http://127.0.0.1:9"),
        ]);
        config.errors.show_details = show_details;
        config.errors.show_stack = show_stack;
        config
    }

    /// A spread of gateway- and upstream-originated failures
    async fn failures(gateway: &TestGateway) -> Vec<TestResponse> {
        let token = bearer(&mint_token(user_claims(), 300));
        let expired = bearer(&mint_token(user_claims(), -60));
        let requests = vec![
            request(Method::GET, "/nowhere/x").body(Body::empty()).unwrap(),
            request(Method::DELETE, "/rep/api/reports/1").body(Body::empty()).unwrap(),
            request(Method::GET, "/emp/api/employees").body(Body::empty()).unwrap(),
            request(Method::GET, "/emp/api/employees")
                .header(header::AUTHORIZATION, "Bearer garbage")
                .body(Body::empty())
                .unwrap(),
            request(Method::GET, "/emp/api/employees")
                .header(header::AUTHORIZATION, expired)
                .body(Body::empty())
                .unwrap(),
            request(Method::GET, "/emp/api/employees")
                .header(header::AUTHORIZATION, token.clone())
                .body(Body::empty())
                .unwrap(),
            request(Method::GET, "/down/api/x")
                .header(header::AUTHORIZATION, token)
                .body(Body::empty())
                .unwrap(),
        ];

        let mut out = Vec::with_capacity(requests.len());
        for req in requests {
            out.push(gateway.send(req).await);
        }
        out
    }

    fn assert_envelope_shape(resp: &TestResponse) {
        let body = &resp.body;
        assert!(body["success"].is_boolean(), "{}", body);
        assert!(!resp.request_id().is_empty(), "{}", body);
        assert_eq!(resp.headers[REQUEST_ID_HEADER], resp.request_id());
        let timestamp = body["timestamp"].as_str().unwrap();
        assert!(timestamp.ends_with('Z'), "{}", timestamp);
        assert_eq!(resp.headers[header::CONTENT_TYPE], "application/json");

        if body["success"] == true {
            assert!(body.get("data").is_some());
            assert!(body.get("error").is_none());
        } else {
            assert!(body.get("data").is_none());
            assert!(!resp.error_code().is_empty());
            assert!(body["error"]["message"].is_string());
        }
    }

    // =============================================================================
    // VISIBILITY
    // =============================================================================

    #[tokio::test]
    async fn test_internals_hidden_by_default() {
        let backend = verbose_failing_backend().await;
        let gateway = TestGateway::new(config(&backend, false, false));

        let responses = failures(&gateway).await;
        let statuses: Vec<u16> = responses.iter().map(|r| r.status.as_u16()).collect();
        assert_eq!(statuses, vec![503, 405, 401, 401, 401, 500, 503]);

        for resp in &responses {
            assert_envelope_shape(resp);
            let error = resp.body["error"].as_object().unwrap();
            assert!(!error.contains_key("details"), "{}", resp.body);
            assert!(!error.contains_key("stack"), "{}", resp.body);
        }

        // Upstream code and message still pass through
        assert_eq!(responses[5].error_code(), "DB_DOWN");
        assert_eq!(responses[5].body["error"]["message"], "Database unavailable");
    }

    #[tokio::test]
    async fn test_details_and_stack_when_enabled() {
        let backend = verbose_failing_backend().await;
        let gateway = TestGateway::new(config(&backend, true, true));

        let responses = failures(&gateway).await;
        for resp in &responses {
            assert_envelope_shape(resp);
        }

        let upstream = &responses[5].body["error"];
        assert_eq!(upstream["details"], json!({ "pool": "primary" }));
        assert!(upstream["stack"].as_str().unwrap().contains("ECONNREFUSED"));

        let method = &responses[1].body["error"];
        assert_eq!(method["details"], "Allowed methods: GET");

        let unreachable = &responses[6].body["error"];
        assert!(unreachable["details"].is_string());
        assert!(unreachable["stack"].is_string());
    }

    #[tokio::test]
    async fn test_details_without_stack() {
        let backend = verbose_failing_backend().await;
        let gateway = TestGateway::new(config(&backend, true, false));

        let responses = failures(&gateway).await;
        let upstream = responses[5].body["error"].as_object().unwrap();
        assert!(upstream.contains_key("details"));
        assert!(!upstream.contains_key("stack"));
    }

    // =============================================================================
    // SUCCESS AND RESPONSE HEADERS
    // =============================================================================

    #[tokio::test]
    async fn test_success_envelope() {
        let backend = MockBackend::start(MockReply::json(
            StatusCode::OK,
            json!({ "success": true, "data": [{ "id": 1 }, { "id": 2 }], "pagination": { "page": 1 } }),
        ))
        .await;
        let gateway = TestGateway::for_backend(&backend);

        let resp = gateway
            .send(
                request(Method::GET, "/emp/api/employees")
                    .header(header::AUTHORIZATION, bearer(&mint_token(user_claims(), 300)))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;

        assert_envelope_shape(&resp);
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.body["data"], json!([{ "id": 1 }, { "id": 2 }]));
        let keys: Vec<&String> = resp.body.as_object().unwrap().keys().collect();
        assert!(!keys.iter().any(|k| k.as_str() == "pagination"));
    }

    #[tokio::test]
    async fn test_cors_preflight_is_answered_by_the_gateway() {
        let backend = MockBackend::start(MockReply::Ok).await;
        let gateway = TestGateway::for_backend(&backend);

        let response = gateway
            .raw(
                request(Method::OPTIONS, "/emp/api/employees")
                    .header(header::ORIGIN, "https://app.example.com")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;

        assert!(response.status().is_success());
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
        assert_eq!(backend.hits(), 0);
    }

    #[tokio::test]
    async fn test_cross_origin_response_exposes_request_id() {
        let backend = MockBackend::start(MockReply::Ok).await;
        let gateway = TestGateway::for_backend(&backend);

        let resp = gateway
            .send(
                request(Method::GET, "/health")
                    .header(header::ORIGIN, "https://app.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;

        let exposed = resp.headers[header::ACCESS_CONTROL_EXPOSE_HEADERS]
            .to_str()
            .unwrap()
            .to_ascii_lowercase();
        assert!(exposed.contains(REQUEST_ID_HEADER));
        assert!(resp.body.get("data").is_some_and(Value::is_object));
    }
}
