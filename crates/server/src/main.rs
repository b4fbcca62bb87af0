pub mod db;
pub mod server;
pub mod services;
pub mod web;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use dotenv::dotenv;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tokio::time::{interval, Duration};
use tracing::{debug, error, info};
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::server::config::ServerConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,
}

fn init_logging(log_dir: &str) {
    // Log to a file: JSON format, daily rotation
    let file_appender = rolling::daily(log_dir, "server.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    // Log to stdout: human-readable format
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sea_orm=warn,sqlx=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();
    dotenv().ok();

    let config = match ServerConfig::load(args.config.as_deref()) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Failed to load server configuration: {e}");
            return Err(e.into());
        }
    };

    init_logging(&config.log_dir);
    info!(version = env!("CARGO_PKG_VERSION"), "Starting PrintWatch server");

    let mut opt = ConnectOptions::new(config.database_url.clone());
    opt.max_connections(10);
    let db: DatabaseConnection = Database::connect(opt).await?;

    db::migrations::run(&db).await?;
    services::auth_service::ensure_bootstrap_admin(&db, &config).await?;

    spawn_dedup_sweep(db.clone(), config.dedup_window_hours);

    let app = web::create_axum_router(db, config.clone());

    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "HTTP server listening");

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Hourly sweep that clears submission ids on rows older than the de-dup
/// horizon so the uniqueness index only guards the configured window.
fn spawn_dedup_sweep(db: DatabaseConnection, window_hours: i64) {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(60 * 60));
        info!(window_hours, "De-duplication sweep task started.");

        loop {
            ticker.tick().await;
            match db::services::print_job_service::expire_dedup_window(&db, window_hours).await {
                Ok(cleared) if cleared > 0 => {
                    info!(cleared, "Cleared submission ids past the de-dup window.");
                }
                Ok(_) => {
                    debug!("No submission ids past the de-dup window.");
                }
                Err(e) => {
                    error!(error = %e, "De-duplication sweep failed.");
                }
            }
        }
    });
}
