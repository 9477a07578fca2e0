//! Router tests that are decided before any database query.

#![allow(clippy::unwrap_used)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use tower::ServiceExt;

use ventas_core::{UserId, UserRole};
use ventas_integration_tests::{json_body, offline_state};

fn request(method: Method, uri: &str) -> axum::http::request::Builder {
    Request::builder().method(method).uri(uri)
}

#[tokio::test]
async fn test_health_is_ok_and_echoes_request_id() {
    let app = ventas_server::app(offline_state());

    let response = app
        .oneshot(
            request(Method::GET, "/health")
                .header("x-request-id", "it-health-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-request-id").unwrap(),
        "it-health-1"
    );
}

#[tokio::test]
async fn test_health_generates_request_id() {
    let app = ventas_server::app(offline_state());

    let response = app
        .oneshot(request(Method::GET, "/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_readiness_reports_unreachable_database() {
    let app = ventas_server::app(offline_state());

    let response = app
        .oneshot(
            request(Method::GET, "/health/ready")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_guarded_route_requires_token() {
    let app = ventas_server::app(offline_state());

    let response = app
        .oneshot(
            request(Method::GET, "/ventas/v1/cart")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let (status, body) = json_body(response).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_guarded_route_rejects_bad_token() {
    let app = ventas_server::app(offline_state());

    let response = app
        .oneshot(
            request(Method::POST, "/ventas/v1/payment/create")
                .header(header::AUTHORIZATION, "Bearer not.a.token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_signed_with_other_secret_is_rejected() {
    let state = offline_state();
    let mut other = ventas_integration_tests::test_config("postgres://unused");
    other.auth.jwt_secret = "Zq3Lm9Vx1Tb7Nc4Hp8Wd2Fs6Gy0Ka5Ej".to_owned().into();
    let forged = ventas_server::services::TokenService::new(&other.auth)
        .issue(UserId::new(), UserRole::Admin)
        .unwrap();

    let response = ventas_server::app(state)
        .oneshot(
            request(Method::GET, "/ventas/v1/invoice")
                .header(header::AUTHORIZATION, format!("Bearer {forged}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_with_malformed_body_is_validation_error() {
    let app = ventas_server::app(offline_state());

    let response = app
        .oneshot(
            request(Method::POST, "/ventas/v1/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"email": "a@b.co"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    let (status, body) = json_body(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation");
}

#[tokio::test]
async fn test_login_without_identifier_is_validation_error() {
    let app = ventas_server::app(offline_state());

    let response = app
        .oneshot(
            request(Method::POST, "/ventas/v1/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"password": "long enough"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    let (status, body) = json_body(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "email or username is required");
}

#[tokio::test]
async fn test_register_rejects_role_field() {
    let app = ventas_server::app(offline_state());
    let boundary = "ventasboundary";
    let body = [
        ("name", "Ada Lovelace"),
        ("username", "ada"),
        ("email", "ada@example.com"),
        ("password", "analytical"),
        ("role", "ADMIN"),
    ]
    .iter()
    .map(|(name, value)| {
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        )
    })
    .collect::<String>()
        + &format!("--{boundary}--\r\n");

    let response = app
        .oneshot(
            request(Method::POST, "/ventas/v1/auth/register")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    let (status, body) = json_body(response).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "domain_rule");
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = ventas_server::app(offline_state());

    let response = app
        .oneshot(
            request(Method::GET, "/ventas/v1/nothing-here")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
