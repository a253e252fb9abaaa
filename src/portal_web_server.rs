use crate::core::session_auth::SessionKeys;
use crate::core::{AppConfig, EmailService, LoginCodeService, RedisHelper};
use crate::routes::portal_routes;
use actix_cors::Cors;
use actix_web::http::header;
use actix_web::middleware::DefaultHeaders;
use actix_web::{dev::Server, web::Data, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::net::TcpListener;
use tracing_actix_web::TracingLogger;

pub struct PortalWebServer {
    port: u16,
    server: Server,
}

impl PortalWebServer {
    pub async fn build(configuration: AppConfig) -> Result<Self, anyhow::Error> {
        let address = format!(
            "{}:{}",
            configuration.portal_server_config.host, configuration.portal_server_config.port
        );

        let pg_pool = get_connection_pool(&configuration);
        if configuration.postgres.run_migrations {
            sqlx::migrate!("./migrations").run(&pg_pool).await?;
            tracing::info!("Database migrations applied");
        }

        let listener = TcpListener::bind(address)?;
        let port = listener.local_addr()?.port();

        let server = run(listener, pg_pool, configuration)?;

        Ok(Self { port, server })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

pub fn get_connection_pool(configuration: &AppConfig) -> PgPool {
    PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect_lazy_with(configuration.postgres.connect())
}

pub fn run(
    listener: TcpListener,
    pg_pool: PgPool,
    configuration: AppConfig,
) -> Result<Server, anyhow::Error> {
    let redis_helper = match configuration.redis.connect() {
        Ok(client) => Some(RedisHelper::new(Data::new(client))),
        Err(e) => {
            tracing::warn!("Redis unavailable, code cooldowns disabled: {}", e);
            None
        }
    };
    let email_service = configuration.smtp.clone().map(EmailService::new);

    let pg_pool = Data::new(pg_pool);
    let session_keys = Data::new(SessionKeys::new(&configuration.session));
    let login_codes = Data::new(LoginCodeService::new(
        configuration.login_codes.clone(),
        configuration.environment,
        email_service,
        redis_helper,
    ));
    let storage = Data::new(configuration.storage.clone());
    let catalog = Data::new(configuration.catalog);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allowed_headers(vec![header::CONTENT_TYPE, header::ACCEPT])
            .supports_credentials();
        App::new()
            .wrap(DefaultHeaders::new().add((header::CACHE_CONTROL, "no-store")))
            .wrap(cors)
            .wrap(TracingLogger::default())
            .configure(portal_routes)
            .app_data(pg_pool.clone())
            .app_data(session_keys.clone())
            .app_data(login_codes.clone())
            .app_data(storage.clone())
            .app_data(catalog.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
