use crate::helpers::{assert_no_store, json_body, spawn_app};
use actix_web::test;
use fake::faker::internet::en::SafeEmail;
use fake::Fake;

#[actix_web::test]
async fn malformed_login_body_is_invalid_body() {
    let app = spawn_app().await;

    let request = test::TestRequest::post()
        .uri("/api/system/auth/login")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(r#"{"email": 42"#)
        .to_request();
    let response = test::call_service(&app, request).await;

    assert_eq!(response.status().as_u16(), 400);
    assert_no_store(&response);
    let body = json_body(response).await;
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"], "INVALID_BODY");
}

#[actix_web::test]
async fn login_with_a_non_email_fails_validation() {
    let app = spawn_app().await;
    let test_cases = vec![
        (serde_json::json!({"email": "not-an-email", "password": "hunter22"}), "bad email"),
        (serde_json::json!({"email": SafeEmail().fake::<String>(), "password": ""}), "empty password"),
        (serde_json::json!({"password": "hunter22"}), "missing email"),
    ];

    for (payload, description) in test_cases {
        let request = test::TestRequest::post()
            .uri("/api/system/auth/login")
            .set_json(payload)
            .to_request();
        let response = test::call_service(&app, request).await;

        assert_eq!(
            response.status().as_u16(),
            400,
            "The API did not reject the login payload ({})",
            description
        );
        assert_eq!(json_body(response).await["error"], "INVALID_BODY");
    }
}

#[actix_web::test]
async fn code_requests_need_an_email_or_phone_number() {
    let app = spawn_app().await;

    for uri in [
        "/api/system/auth/login/request-code",
        "/api/system/auth/password/request-code",
    ] {
        for identifier in ["", "hello world", "12", "@example.com"] {
            let request = test::TestRequest::post()
                .uri(uri)
                .set_json(serde_json::json!({ "identifier": identifier }))
                .to_request();
            let response = test::call_service(&app, request).await;

            assert_eq!(
                response.status().as_u16(),
                400,
                "{} accepted identifier {:?}",
                uri,
                identifier
            );
            assert_eq!(json_body(response).await["error"], "INVALID_BODY");
        }
    }
}

#[actix_web::test]
async fn verify_rejects_codes_of_the_wrong_length() {
    let app = spawn_app().await;
    let email: String = SafeEmail().fake();

    let request = test::TestRequest::post()
        .uri("/api/system/auth/login/verify")
        .set_json(serde_json::json!({ "identifier": email, "code": "12345" }))
        .to_request();
    let response = test::call_service(&app, request).await;

    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(json_body(response).await["error"], "INVALID_BODY");
}

#[actix_web::test]
async fn reset_rejects_short_passwords() {
    let app = spawn_app().await;
    let email: String = SafeEmail().fake();

    let request = test::TestRequest::post()
        .uri("/api/system/auth/password/reset")
        .set_json(serde_json::json!({
            "identifier": email,
            "code": "123456",
            "newPassword": "short"
        }))
        .to_request();
    let response = test::call_service(&app, request).await;

    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(json_body(response).await["error"], "INVALID_BODY");
}
