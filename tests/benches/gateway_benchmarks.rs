//! # Gateway Hot-Path Benchmarks
//!
//! Per-request work done before any upstream I/O:
//!
//! | Stage | Work | Target |
//! |-------|------|--------|
//! | Whitelist | Snapshot load + pattern scan | < 1µs |
//! | Auth gate | HS256 verify + claim validation | < 20µs |
//! | Header projection | Allow-list copy + claim headers | < 5µs |

use api_gateway::domain::config::{AuthConfig, WhitelistConfig};
use api_gateway::{
    AuthGate, ForwardStrategy, HeaderProjector, Passage, RequestContext, RequestId,
    ServiceConfig, ServiceDescriptor, WhitelistMatcher,
};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, Uri};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use gateway_tests::support::{bearer, mint_token, user_claims, TEST_SECRET};
use std::sync::Arc;

fn context(path: &str) -> RequestContext {
    let uri: Uri = path.parse().expect("uri");
    let (prefix, _) = api_gateway::domain::context::split_prefix(uri.path());
    let service = ServiceDescriptor::from_config(&ServiceConfig::new(prefix, "http://127.0.0.1:5003"))
        .expect("service");
    RequestContext::new(RequestId::generate(), Method::GET, &uri).with_service(Arc::new(service))
}

// ============================================================================
// Whitelist
// ============================================================================

fn bench_whitelist(c: &mut Criterion) {
    let mut group = c.benchmark_group("whitelist");

    let matcher = WhitelistMatcher::from_config(&WhitelistConfig::default(), "id").expect("whitelist");
    group.bench_function("public_identity_route", |b| {
        b.iter(|| black_box(matcher.is_public("id", black_box("/api/auth/login"))))
    });
    group.bench_function("protected_route", |b| {
        b.iter(|| black_box(matcher.is_public("id", black_box("/api/users/me"))))
    });

    for size in [10usize, 50, 200] {
        let matcher = WhitelistMatcher::empty();
        for i in 0..size {
            matcher
                .add("emp", &format!("/api/public/area-{}/*", i))
                .expect("pattern");
        }
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("miss_scan", size), &matcher, |b, m| {
            b.iter(|| black_box(m.is_public("emp", black_box("/api/private/records"))))
        });
    }

    group.finish();
}

// ============================================================================
// Auth gate
// ============================================================================

fn bench_auth_gate(c: &mut Criterion) {
    let mut group = c.benchmark_group("auth-gate");

    let config = AuthConfig {
        jwt_secret: TEST_SECRET.to_string(),
        ..AuthConfig::default()
    };
    let whitelist = Arc::new(WhitelistMatcher::from_config(&WhitelistConfig::default(), "id").expect("whitelist"));
    let gate = AuthGate::new(&config, whitelist).expect("gate");

    let ctx = context("/emp/api/employees");
    let mut authorized = HeaderMap::new();
    authorized.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&bearer(&mint_token(user_claims(), 3600))).expect("header"),
    );
    group.bench_function("valid_token", |b| {
        b.iter(|| black_box(gate.evaluate(&ctx, black_box(&authorized)).is_ok()))
    });

    let public = context("/id/api/auth/login");
    let empty = HeaderMap::new();
    group.bench_function("public_path", |b| {
        b.iter(|| black_box(gate.evaluate(&public, black_box(&empty)).is_ok()))
    });

    group.bench_function("missing_token", |b| {
        b.iter(|| black_box(gate.evaluate(&ctx, black_box(&empty)).is_err()))
    });

    group.finish();
}

// ============================================================================
// Header projection
// ============================================================================

fn bench_header_projection(c: &mut Criterion) {
    let mut group = c.benchmark_group("header-projection");

    let projector = HeaderProjector::new("id", HeaderName::from_static("x-setup-code"));
    let claims = api_gateway::Claims::from_payload(serde_json::json!({
        "id": "u1",
        "email": "a@b.com",
        "roles": ["admin", "hr"],
        "organizationId": "org-1",
        "permissions": ["employees:read", "employees:write"],
    }))
    .expect("claims");
    let mut ctx = context("/emp/api/employees");
    ctx.passage = Some(Passage::Authenticated(Arc::new(claims)));

    let mut inbound = HeaderMap::new();
    inbound.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    inbound.insert(header::COOKIE, HeaderValue::from_static("session=abc"));
    inbound.insert("x-api-key", HeaderValue::from_static("key-1"));
    inbound.insert("x-user-id", HeaderValue::from_static("spoofed"));

    group.bench_function("authenticated_buffered", |b| {
        b.iter(|| black_box(projector.project(&ctx, black_box(&inbound), ForwardStrategy::Buffered)))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_whitelist,
    bench_auth_gate,
    bench_header_projection
);
criterion_main!(benches);
