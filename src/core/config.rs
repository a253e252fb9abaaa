use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

use sqlx::postgres::{PgConnectOptions, PgSslMode};
use sqlx::ConnectOptions;

#[derive(Deserialize, Clone)]
pub struct AppConfig {
    pub portal_server_config: PortalServerConfig,
    pub postgres: PostgresConfig,
    pub redis: RedisConfig,
    pub session: SessionConfig,
    pub login_codes: LoginCodeSettings,
    pub smtp: Option<SmtpConfig>,
    pub storage: StorageConfig,
    pub catalog: CourseCatalog,
    #[serde(skip, default = "default_environment")]
    pub environment: Environment,
}

impl AppConfig {
    pub fn new() -> Result<Self, config::ConfigError> {
        let base_path = std::env::current_dir()
            .map_err(|e| config::ConfigError::Message(format!("no current dir: {}", e)))?;
        let config_dir = base_path.join("src/core/configurations");

        let app_environment: Environment = std::env::var("TRADING_PORTAL_APP_ENVIRONMENT")
            .unwrap_or_else(|_| "local".into())
            .try_into()
            .map_err(config::ConfigError::Message)?;

        let configurations = config::Config::builder()
            .add_source(
                config::File::from(config_dir.join(app_environment.as_str())).required(true),
            )
            // APP_POSTGRES__PASSWORD=... overrides postgres.password
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let mut app_config: AppConfig = configurations.try_deserialize()?;
        app_config.environment = app_environment;
        Ok(app_config)
    }
}

#[derive(Deserialize, Clone)]
pub struct PortalServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Deserialize, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: String,
    pub password: Option<String>,
}

impl RedisConfig {
    pub fn connect(&self) -> Result<redis::Client, redis::RedisError> {
        let url = format!(
            "redis://:{password}@{host}:{port}",
            password = self.password.as_deref().unwrap_or(""),
            host = self.host,
            port = self.port
        );
        redis::Client::open(url)
    }
}

#[derive(Deserialize, Clone)]
pub struct PostgresConfig {
    pub username: String,
    pub password: Secret<String>,
    pub host: String,
    pub port: u16,
    pub database_name: String,
    #[serde(default)]
    pub require_ssl: bool,
    #[serde(default)]
    pub run_migrations: bool,
}

impl PostgresConfig {
    pub fn connect(&self) -> PgConnectOptions {
        let ssl_mode = if self.require_ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };
        let options = PgConnectOptions::new()
            .host(&self.host)
            .username(&self.username)
            .password(self.password.expose_secret())
            .port(self.port)
            .ssl_mode(ssl_mode)
            .database(&self.database_name);

        options.log_statements(tracing::log::LevelFilter::Trace)
    }
}

#[derive(Deserialize, Clone)]
pub struct SessionConfig {
    pub secret: Secret<String>,
    pub ttl_hours: i64,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default)]
    pub secure_cookie: bool,
}

fn default_cookie_name() -> String {
    "portal_session".to_string()
}

/// Knobs for the one-time-code flow. `expose_dev_code` only takes effect
/// outside production, see `LoginCodeService::new`.
#[derive(Deserialize, Clone)]
pub struct LoginCodeSettings {
    pub ttl_seconds: i64,
    pub max_attempts: i32,
    pub resend_cooldown_seconds: u64,
    pub hash_secret: Secret<String>,
    #[serde(default)]
    pub expose_dev_code: bool,
}

#[derive(Deserialize, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Secret<String>,
    pub from_email: String,
    pub from_name: String,
}

#[derive(Deserialize, Clone)]
pub struct StorageConfig {
    pub public_base_url: String,
}

impl StorageConfig {
    pub fn public_url(&self, storage_path: &str) -> String {
        format!(
            "{}/{}",
            self.public_base_url.trim_end_matches('/'),
            storage_path.trim_start_matches('/')
        )
    }
}

/// Courses are static site content; the portal only knows their id range.
#[derive(Deserialize, Clone, Copy, Debug)]
pub struct CourseCatalog {
    pub first_course_id: i32,
    pub last_course_id: i32,
}

impl CourseCatalog {
    pub fn contains(&self, course_id: i32) -> bool {
        (self.first_course_id..=self.last_course_id).contains(&course_id)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Local,
    Sandbox,
    Production,
}

fn default_environment() -> Environment {
    Environment::Local
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Sandbox => "sandbox",
            Self::Production => "production",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "sandbox" => Ok(Self::Sandbox),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not supported environment. Use either `local`, `sandbox` or `production` ",
                other
            )),
        }
    }
}
