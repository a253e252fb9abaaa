use std::fmt::{Debug, Display};

use tokio::task::JoinError;
use trading_portal::core::{get_subscriber, init_subscriber, AppConfig};
use trading_portal::portal_web_server::PortalWebServer;

use colored::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let file_appender = tracing_appender::rolling::daily("/var/tmp/log/trading_portal", "app");

    let subscriber = get_subscriber("trading_portal".into(), "info".into(), file_appender);
    init_subscriber(subscriber);

    let config = AppConfig::new()?;
    tracing::info!(environment = config.environment.as_str(), "Configuration loaded");

    let portal_web_server = PortalWebServer::build(config.clone()).await?;
    let port = portal_web_server.port();

    let server_task = tokio::spawn(portal_web_server.run_until_stopped());

    println!("{}", "-----------------------------------------".green());
    println!(
        "🚀 Portal started on Addr: {}:{} ({})",
        config.portal_server_config.host,
        port,
        config.environment.as_str()
    );
    println!("{}", "-----------------------------------------".green());

    tokio::select! {
        outcome = server_task => { report_exit("portal web server", outcome); }
    }
    Ok(())
}

fn report_exit(task_name: &str, outcome: Result<Result<(), impl Debug + Display>, JoinError>) {
    match outcome {
        Ok(Ok(())) => {
            tracing::info!("{} has exited", task_name)
        }
        Ok(Err(e)) => {
            tracing::error!(
                error.cause_chain = ?e,
                error.message = %e,
                "{} failed",
                task_name
            )
        }
        Err(e) => {
            tracing::error!(
                error.cause_chain = ?e,
                error.message = %e,
                "{} task failed to complete",
                task_name
            )
        }
    }
}
