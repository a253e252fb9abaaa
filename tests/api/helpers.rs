use actix_http::Request;
use actix_web::body::{to_bytes, BoxBody};
use actix_web::dev::{Service, ServiceResponse};
use actix_web::cookie::Cookie;
use actix_web::middleware::DefaultHeaders;
use actix_web::{http::header, test, web::Data, App, Error};
use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use sqlx::PgPool;
use trading_portal::core::config::Environment;
use trading_portal::core::session_auth::SessionKeys;
use trading_portal::core::{get_subscriber, init_subscriber, AppConfig, LoginCodeService};
use trading_portal::db::sessions::{create_session, ClientInfo};
use trading_portal::portal_web_server::get_connection_pool;
use trading_portal::routes::portal_routes;
use uuid::Uuid;

// `TEST_LOG=true cargo test` prints the bunyan logs.
static TRACING: Lazy<()> = Lazy::new(|| {
    let default_filter_level = "info".to_string();
    let subscriber_name = "test".to_string();
    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::stdout);
        init_subscriber(subscriber);
    } else {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::sink);
        init_subscriber(subscriber);
    }
});

/// Local configuration pointed at a database nobody listens on. Every path
/// exercised here must finish before touching storage.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::new().expect("Failed to read local configuration");
    config.postgres.port = 1;
    config.environment = Environment::Local;
    config
}

pub async fn spawn_app(
) -> impl Service<Request, Response = ServiceResponse<BoxBody>, Error = Error> {
    let pool = get_connection_pool(&test_config());
    spawn_app_with_pool(pool).await
}

/// Same app, backed by a real database (the pool handed out by
/// `#[sqlx::test]`).
pub async fn spawn_app_with_pool(
    pool: PgPool,
) -> impl Service<Request, Response = ServiceResponse<BoxBody>, Error = Error> {
    Lazy::force(&TRACING);

    let config = test_config();
    let session_keys = SessionKeys::new(&config.session);
    let login_codes = LoginCodeService::new(
        config.login_codes.clone(),
        config.environment,
        None,
        None,
    );

    test::init_service(
        App::new()
            .wrap(DefaultHeaders::new().add((header::CACHE_CONTROL, "no-store")))
            .configure(portal_routes)
            .app_data(Data::new(pool))
            .app_data(Data::new(session_keys))
            .app_data(Data::new(login_codes))
            .app_data(Data::new(config.storage.clone()))
            .app_data(Data::new(config.catalog)),
    )
    .await
}

pub async fn json_body(response: ServiceResponse<BoxBody>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body())
        .await
        .expect("Failed to read response body");
    serde_json::from_slice(&bytes).expect("Response body is not JSON")
}

pub fn assert_no_store(response: &ServiceResponse<BoxBody>) {
    assert_eq!(
        response
            .headers()
            .get(header::CACHE_CONTROL)
            .expect("Cache-Control header missing"),
        "no-store"
    );
}

pub async fn seed_user(pool: &PgPool, email: &str, role: &str, leader_id: Option<Uuid>) -> Uuid {
    sqlx::query_scalar(
        "INSERT INTO system_profiles (email, role, leader_id) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(email)
    .bind(role)
    .bind(leader_id)
    .fetch_one(pool)
    .await
    .expect("Failed to seed profile")
}

pub async fn seed_file(pool: &PgPool, title: &str) -> Uuid {
    sqlx::query_scalar(
        "INSERT INTO system_files (title, storage_path) VALUES ($1, $2) RETURNING id",
    )
    .bind(title)
    .bind(format!("handouts/{}.pdf", title))
    .fetch_one(pool)
    .await
    .expect("Failed to seed file")
}

/// A signed cookie for a fresh session row owned by `user_id`.
pub async fn session_cookie(pool: &PgPool, user_id: Uuid) -> Cookie<'static> {
    let config = test_config();
    let keys = SessionKeys::new(&config.session);
    let expires_at = Utc::now() + Duration::hours(1);
    let client = ClientInfo {
        ip: None,
        user_agent: Some("integration-test".to_string()),
    };
    let session_id = create_session(pool, user_id, expires_at, &client)
        .await
        .expect("Failed to create session");
    let token = keys
        .issue(user_id, session_id, expires_at)
        .expect("Failed to sign session");
    Cookie::new(config.session.cookie_name, token)
}
