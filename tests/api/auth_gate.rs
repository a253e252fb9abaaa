use crate::helpers::{assert_no_store, json_body, spawn_app, test_config};
use actix_web::cookie::Cookie;
use actix_web::test;
use chrono::{Duration, Utc};
use secrecy::Secret;
use trading_portal::core::session_auth::SessionKeys;
use uuid::Uuid;

async fn assert_unauthorized(request: test::TestRequest) {
    let app = spawn_app().await;
    let response = test::call_service(&app, request.to_request()).await;

    assert_eq!(response.status().as_u16(), 401);
    assert_no_store(&response);
    let body = json_body(response).await;
    assert_eq!(body, serde_json::json!({"ok": false, "error": "UNAUTHORIZED"}));
}

#[actix_web::test]
async fn me_without_a_cookie_is_unauthorized() {
    assert_unauthorized(test::TestRequest::get().uri("/api/system/auth/me")).await;
}

#[actix_web::test]
async fn every_protected_endpoint_requires_a_session() {
    let get_routes = [
        "/api/system/courses/access",
        "/api/system/courses/5",
        "/api/system/courses/5/notes",
        "/api/system/files",
        "/api/system/files/access",
        "/api/system/notifications",
        "/api/system/admin/course-access/pending",
        "/api/system/admin/file-access/pending",
        "/api/system/admin/users",
        "/api/system/admin/role-audit",
    ];
    for uri in get_routes {
        assert_unauthorized(test::TestRequest::get().uri(uri)).await;
    }

    let post_routes = [
        "/api/system/auth/logout",
        "/api/system/courses/request",
        "/api/system/courses/complete",
        "/api/system/files/request",
        "/api/system/notifications/read-all",
        "/api/system/admin/course-access/bulk-review",
        "/api/system/admin/file-access/bulk-review",
        "/api/system/admin/notifications",
        "/api/system/admin/users/role",
    ];
    for uri in post_routes {
        assert_unauthorized(
            test::TestRequest::post()
                .uri(uri)
                .set_json(serde_json::json!({"courseId": 5})),
        )
        .await;
    }
}

#[actix_web::test]
async fn session_check_runs_before_body_validation() {
    // malformed body and no cookie: the caller learns about the session first
    assert_unauthorized(
        test::TestRequest::post()
            .uri("/api/system/admin/course-access/bulk-review")
            .insert_header(("Content-Type", "application/json"))
            .set_payload("{not json"),
    )
    .await;
}

#[actix_web::test]
async fn garbage_cookie_is_unauthorized() {
    assert_unauthorized(
        test::TestRequest::get()
            .uri("/api/system/auth/me")
            .cookie(Cookie::new("portal_session", "not-a-token")),
    )
    .await;
}

#[actix_web::test]
async fn token_signed_with_another_secret_is_unauthorized() {
    let mut session = test_config().session;
    session.secret = Secret::new("some-other-secret-0000000000000000".to_string());
    let forger = SessionKeys::new(&session);
    let token = forger
        .issue(Uuid::new_v4(), Uuid::new_v4(), Utc::now() + Duration::hours(1))
        .unwrap();

    assert_unauthorized(
        test::TestRequest::get()
            .uri("/api/system/auth/me")
            .cookie(Cookie::new("portal_session", token)),
    )
    .await;
}

#[actix_web::test]
async fn expired_token_is_unauthorized() {
    let keys = SessionKeys::new(&test_config().session);
    let token = keys
        .issue(Uuid::new_v4(), Uuid::new_v4(), Utc::now() - Duration::hours(2))
        .unwrap();

    assert_unauthorized(
        test::TestRequest::get()
            .uri("/api/system/files")
            .cookie(Cookie::new("portal_session", token)),
    )
    .await;
}
