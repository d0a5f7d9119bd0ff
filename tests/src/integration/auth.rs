//! # Authentication Flows
//!
//! The gate runs after routing and before forwarding:
//!
//! 1. **Public paths** pass without credentials and carry no identity
//! 2. **Setup bypass** passes on header presence alone
//! 3. **Bearer tokens** are verified; claims become `x-user-*` headers for
//!    domain services while the identity service gets the raw credentials

#[cfg(test)]
mod tests {
    use crate::support::*;
    use api_gateway::ServiceConfig;
    use axum::{
        body::Body,
        http::{header, Method, StatusCode},
    };
    use serde_json::json;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    const USER_HEADERS: [&str; 3] = ["x-user-id", "x-user-email", "x-user-roles"];

    async fn get_with_auth(gateway: &TestGateway, uri: &str, authorization: &str) -> TestResponse {
        gateway
            .send(
                request(Method::GET, uri)
                    .header(header::AUTHORIZATION, authorization)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
    }

    // =============================================================================
    // PUBLIC PATHS
    // =============================================================================

    #[tokio::test]
    async fn test_public_identity_route_needs_no_token() {
        let backend = MockBackend::start(MockReply::Ok).await;
        let gateway = TestGateway::for_backend(&backend);

        let resp = gateway
            .send(
                request(Method::POST, "/id/api/auth/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header("x-user-id", "spoofed")
                    .body(Body::from(r#"{"email":"a@b.com","password":"pw"}"#))
                    .unwrap(),
            )
            .await;

        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.body["data"], json!({ "ok": true }));
        assert_eq!(backend.hits(), 1);

        let seen = backend.last_request().unwrap();
        assert_eq!(seen.uri.path(), "/id/api/auth/login");
        for name in USER_HEADERS {
            assert!(seen.headers.get(name).is_none(), "{} must not be forwarded", name);
        }
    }

    #[tokio::test]
    async fn test_configured_public_glob() {
        let backend = MockBackend::start(MockReply::Ok).await;
        let mut config = gateway_config(vec![ServiceConfig::new("emp", backend.url())]);
        config
            .whitelist
            .extra
            .insert("emp".into(), vec!["/api/public/*".into()]);
        let gateway = TestGateway::new(config);

        let resp = gateway.get("/emp/api/public/holidays").await;
        assert_eq!(resp.status, StatusCode::OK);

        // Public below one prefix only
        let resp = gateway.get("/emp/api/private/holidays").await;
        assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
        assert_eq!(backend.hits(), 1);
    }

    #[tokio::test]
    async fn test_runtime_whitelist_changes_apply_immediately() {
        let backend = MockBackend::start(MockReply::Ok).await;
        let gateway = TestGateway::for_backend(&backend);
        let whitelist = gateway.service.whitelist();

        assert_eq!(gateway.get("/emp/api/open").await.status, StatusCode::UNAUTHORIZED);

        assert!(whitelist.add("emp", "/api/open").unwrap());
        assert_eq!(gateway.get("/emp/api/open").await.status, StatusCode::OK);

        assert!(whitelist.remove("emp", "/api/open"));
        assert_eq!(gateway.get("/emp/api/open").await.status, StatusCode::UNAUTHORIZED);
        assert_eq!(backend.hits(), 1);
    }

    // =============================================================================
    // SETUP BYPASS
    // =============================================================================

    #[tokio::test]
    async fn test_setup_header_bypasses_authentication() {
        let backend = MockBackend::start(MockReply::Ok).await;
        let gateway = TestGateway::for_backend(&backend);

        let resp = gateway
            .send(
                request(Method::POST, "/emp/api/setup/organization")
                    .header("x-setup-code", "BOOT-1234")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await;

        assert_eq!(resp.status, StatusCode::OK);
        let seen = backend.last_request().unwrap();
        assert_eq!(seen.headers["x-setup-code"], "BOOT-1234");
        for name in USER_HEADERS {
            assert!(seen.headers.get(name).is_none());
        }
    }

    // =============================================================================
    // BEARER TOKENS
    // =============================================================================

    #[tokio::test]
    async fn test_missing_token_is_refused() {
        let backend = MockBackend::start(MockReply::Ok).await;
        let gateway = TestGateway::for_backend(&backend);

        let resp = gateway.get("/emp/api/employees").await;

        assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
        assert_eq!(resp.error_code(), "UNAUTHORIZED");
        assert_eq!(resp.body["error"]["message"], "No token provided");
        assert_eq!(resp.headers[header::WWW_AUTHENTICATE], "Bearer");
        assert_eq!(backend.hits(), 0);
    }

    #[tokio::test]
    async fn test_claims_become_user_headers() {
        let backend = MockBackend::start(MockReply::Ok).await;
        let gateway = TestGateway::for_backend(&backend);
        let token = mint_token(user_claims(), 300);

        let resp = gateway
            .send(
                request(Method::GET, "/emp/api/employees")
                    .header(header::AUTHORIZATION, bearer(&token))
                    .header("x-user-id", "spoofed")
                    .header("x-user-roles", "superuser")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;

        assert_eq!(resp.status, StatusCode::OK);
        let seen = backend.last_request().unwrap();
        assert_eq!(seen.headers["x-user-id"], "u1");
        assert_eq!(seen.headers["x-user-email"], "a@b.com");
        assert_eq!(seen.headers["x-user-roles"], "admin");
        assert!(seen.headers.get(header::AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn test_token_without_expiry_is_accepted() {
        let backend = MockBackend::start(MockReply::Ok).await;
        let gateway = TestGateway::for_backend(&backend);
        let token = mint_token_without_expiry(user_claims());

        let resp = get_with_auth(&gateway, "/emp/api/employees", &bearer(&token)).await;

        assert_eq!(resp.status, StatusCode::OK);
        let seen = backend.last_request().unwrap();
        assert_eq!(seen.headers["x-user-id"], "u1");
        assert_eq!(seen.headers["x-user-email"], "a@b.com");
        assert_eq!(seen.headers["x-user-roles"], "admin");
        assert!(seen.headers.get(header::AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn test_optional_claims_are_projected() {
        let backend = MockBackend::start(MockReply::Ok).await;
        let gateway = TestGateway::for_backend(&backend);
        let token = mint_token(
            json!({
                "id": "u2",
                "email": "hr@corp.io",
                "roles": ["hr", "manager"],
                "organizationId": "org-7",
                "permissions": ["employees:read", "employees:write"],
                "isActive": true,
            }),
            300,
        );

        get_with_auth(&gateway, "/emp/api/employees", &bearer(&token)).await;

        let seen = backend.last_request().unwrap();
        assert_eq!(seen.headers["x-user-roles"], "hr,manager");
        assert_eq!(seen.headers["x-organization-id"], "org-7");
        assert_eq!(seen.headers["x-user-permissions"], "employees:read,employees:write");
        assert_eq!(seen.headers["x-user-is-active"], "true");
        assert!(seen.headers.get("x-employee-id").is_none());
    }

    #[tokio::test]
    async fn test_identity_service_receives_raw_credentials() {
        let backend = MockBackend::start(MockReply::Ok).await;
        let gateway = TestGateway::for_backend(&backend);
        let authorization = bearer(&mint_token(user_claims(), 300));

        let resp = get_with_auth(&gateway, "/id/api/users/me", &authorization).await;

        assert_eq!(resp.status, StatusCode::OK);
        let seen = backend.last_request().unwrap();
        assert_eq!(seen.headers[header::AUTHORIZATION], authorization.as_str());
        for name in USER_HEADERS {
            assert!(seen.headers.get(name).is_none());
        }
    }

    #[tokio::test]
    async fn test_expired_token() {
        let backend = MockBackend::start(MockReply::Ok).await;
        let gateway = TestGateway::for_backend(&backend);
        let token = mint_token(user_claims(), -60);

        let resp = get_with_auth(&gateway, "/emp/api/employees", &bearer(&token)).await;

        assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
        assert_eq!(resp.error_code(), "TOKEN_EXPIRED");
        assert_eq!(backend.hits(), 0);
    }

    #[tokio::test]
    async fn test_rejected_tokens() {
        let backend = MockBackend::start(MockReply::Ok).await;
        let gateway = TestGateway::for_backend(&backend);

        let bad_email = mint_token(json!({ "id": "u1", "email": "nope", "roles": [] }), 300);
        let cases = [
            ("Bearer not-a-jwt".to_string(), "Invalid token"),
            ("Basic dXNlcjpwdw==".to_string(), "Invalid authorization header"),
            ("Bearer".to_string(), "Invalid authorization header"),
            (bearer(&bad_email), "Invalid token payload"),
        ];

        for (authorization, message) in cases {
            let resp = get_with_auth(&gateway, "/emp/api/employees", &authorization).await;
            assert_eq!(resp.status, StatusCode::UNAUTHORIZED, "{}", authorization);
            assert_eq!(resp.error_code(), "UNAUTHORIZED", "{}", authorization);
            assert_eq!(resp.body["error"]["message"], message, "{}", authorization);
        }
        assert_eq!(backend.hits(), 0);
    }

    #[tokio::test]
    async fn test_token_signed_with_another_secret() {
        let backend = MockBackend::start(MockReply::Ok).await;
        let gateway = TestGateway::for_backend(&backend);

        let forged = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &json!({ "id": "u1", "email": "a@b.com", "roles": ["admin"], "exp": 4_102_444_800u64 }),
            &jsonwebtoken::EncodingKey::from_secret(b"someone-else"),
        )
        .unwrap();

        let resp = get_with_auth(&gateway, "/emp/api/employees", &bearer(&forged)).await;
        assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
        assert_eq!(resp.error_code(), "UNAUTHORIZED");
        assert_eq!(backend.hits(), 0);
    }
}
