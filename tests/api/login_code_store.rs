use crate::helpers::{json_body, seed_user, spawn_app_with_pool};
use actix_web::test;
use chrono::{Duration, Utc};
use futures_util::future::join_all;
use secrecy::Secret;
use sqlx::PgPool;
use trading_portal::core::config::{Environment, LoginCodeSettings};
use trading_portal::core::LoginCodeService;
use trading_portal::db::login_codes;
use trading_portal::models::login_codes::{hash_code, CodePurpose, Identifier};

const SECRET: &str = "login-code-store-secret";

fn service() -> LoginCodeService {
    let settings = LoginCodeSettings {
        ttl_seconds: 300,
        max_attempts: 5,
        resend_cooldown_seconds: 60,
        hash_secret: Secret::new(SECRET.to_string()),
        expose_dev_code: true,
    };
    LoginCodeService::new(settings, Environment::Local, None, None)
}

fn identifier() -> Identifier {
    Identifier::parse("user@example.com").unwrap()
}

/// Issues a code and returns it; with no mailer the local service echoes it.
async fn issue(pool: &PgPool, codes: &LoginCodeService) -> String {
    codes
        .request_code(pool, &identifier(), CodePurpose::Login)
        .await
        .expect("Failed to issue code")
        .dev_code
        .expect("Local service should echo the code")
}

fn wrong(code: &str) -> String {
    let value: u32 = code.parse().unwrap();
    format!("{:06}", (value + 1) % 1_000_000)
}

async fn attempts(pool: &PgPool) -> i32 {
    sqlx::query_scalar("SELECT attempts FROM system_login_codes WHERE identifier = $1")
        .bind(identifier().qualified(CodePurpose::Login))
        .fetch_one(pool)
        .await
        .expect("Failed to read attempts")
}

#[sqlx::test]
async fn correct_code_verifies_once_and_replay_is_rejected(pool: PgPool) {
    let codes = service();
    let code = issue(&pool, &codes).await;

    codes
        .verify_code(&pool, &identifier(), CodePurpose::Login, &code)
        .await
        .expect("Fresh code should verify");
    let replay = codes
        .verify_code(&pool, &identifier(), CodePurpose::Login, &code)
        .await
        .unwrap_err();

    assert_eq!(replay.code(), "INVALID_CODE");
}

#[sqlx::test]
async fn correct_code_after_four_failures_still_verifies(pool: PgPool) {
    let codes = service();
    let code = issue(&pool, &codes).await;

    for _ in 0..4 {
        let error = codes
            .verify_code(&pool, &identifier(), CodePurpose::Login, &wrong(&code))
            .await
            .unwrap_err();
        assert_eq!(error.code(), "INVALID_CODE");
    }

    codes
        .verify_code(&pool, &identifier(), CodePurpose::Login, &code)
        .await
        .expect("Fifth guess is still within the limit");
}

#[sqlx::test]
async fn correct_code_after_five_failures_is_locked(pool: PgPool) {
    let codes = service();
    let code = issue(&pool, &codes).await;

    let mut seen = Vec::new();
    for _ in 0..5 {
        let error = codes
            .verify_code(&pool, &identifier(), CodePurpose::Login, &wrong(&code))
            .await
            .unwrap_err();
        seen.push(error.code());
    }
    assert_eq!(
        seen,
        ["INVALID_CODE", "INVALID_CODE", "INVALID_CODE", "INVALID_CODE", "TOO_MANY_ATTEMPTS"]
    );

    let error = codes
        .verify_code(&pool, &identifier(), CodePurpose::Login, &code)
        .await
        .unwrap_err();
    assert_eq!(error.code(), "TOO_MANY_ATTEMPTS");
    assert_eq!(attempts(&pool).await, 5);
}

#[sqlx::test]
async fn concurrent_guesses_cannot_exceed_the_attempt_limit(pool: PgPool) {
    let codes = service();
    let code = issue(&pool, &codes).await;
    let guess = wrong(&code);

    let outcomes = join_all((0..30).map(|_| {
        let identifier = identifier();
        let codes = &codes;
        let pool = &pool;
        let guess = guess.as_str();
        async move {
            codes
                .verify_code(pool, &identifier, CodePurpose::Login, guess)
                .await
        }
    }))
    .await;

    let evaluated = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, Err(e) if e.code() == "INVALID_CODE"))
        .count();
    let locked = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, Err(e) if e.code() == "TOO_MANY_ATTEMPTS"))
        .count();
    assert_eq!(evaluated, 4);
    assert_eq!(locked, 26);
    assert_eq!(attempts(&pool).await, 5);

    let error = codes
        .verify_code(&pool, &identifier(), CodePurpose::Login, &code)
        .await
        .unwrap_err();
    assert_eq!(error.code(), "TOO_MANY_ATTEMPTS");
}

#[sqlx::test]
async fn expired_code_never_verifies(pool: PgPool) {
    let codes = service();
    let qualified = identifier().qualified(CodePurpose::Login);
    login_codes::insert_code(
        &pool,
        &qualified,
        &hash_code(SECRET.as_bytes(), &qualified, "123456"),
        Utc::now() - Duration::seconds(1),
    )
    .await
    .unwrap();

    let error = codes
        .verify_code(&pool, &identifier(), CodePurpose::Login, "123456")
        .await
        .unwrap_err();

    assert_eq!(error.code(), "INVALID_CODE");
}

#[sqlx::test]
async fn reset_code_is_echoed_for_a_registered_user_outside_production(pool: PgPool) {
    seed_user(&pool, "user@example.com", "student", None).await;
    let app = spawn_app_with_pool(pool).await;

    let response = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/system/auth/password/request-code")
            .set_json(serde_json::json!({"identifier": "user@example.com"}))
            .to_request(),
    )
    .await;

    assert_eq!(response.status().as_u16(), 200);
    let body = json_body(response).await;
    assert_eq!(body["ok"], true);
    let dev_code = body["dev_code"].as_str().expect("dev_code missing");
    assert_eq!(dev_code.len(), 6);
    assert!(dev_code.chars().all(|c| c.is_ascii_digit()));
}
