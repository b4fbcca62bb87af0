pub mod agent_modules;

use std::error::Error;
use std::path::{Path, PathBuf};

use clap::Parser;
use printwatch_common::agents::RegisterRequest;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, warn};
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::agent_modules::api_client::ApiClient;
use crate::agent_modules::config::{load_cli_config, save_registration};
use crate::agent_modules::queue::OfflineQueue;
use crate::agent_modules::spool::spool_tail_loop;
use crate::agent_modules::uploader::Uploader;

const HEARTBEAT_INTERVAL_SECONDS: u64 = 60;
const PURGE_INTERVAL_SECONDS: u64 = 60 * 60;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "agent_config.toml")]
    config: String,

    /// Register with the server again even if an API key is present
    #[arg(long)]
    reregister: bool,
}

fn init_logging(log_dir: &str) {
    let file_appender = rolling::daily(log_dir, "agent.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let args = Args::parse();

    let mut config = match load_cli_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load agent configuration: {e}");
            return Err(e.to_string().into());
        }
    };

    init_logging(&config.log_dir);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        hostname = %config.hostname,
        "Starting PrintWatch agent"
    );

    if config.api_key.is_none() || args.reregister {
        info!("No usable API key; registering with the portal.");
        let request = RegisterRequest {
            hostname: config.hostname.clone(),
            site: config.site.clone(),
            agent_version: env!("CARGO_PKG_VERSION").to_string(),
            registration_token: config.registration_token.clone(),
        };
        let response = ApiClient::register(&config.server_url, &request)
            .await
            .map_err(|e| {
                error!(error = %e, "Agent registration failed.");
                e
            })?;
        save_registration(&args.config, response.agent_id, &response.api_key)
            .map_err(|e| e.to_string())?;
        config.agent_id = Some(response.agent_id);
        config.api_key = Some(response.api_key);
        info!(agent_id = response.agent_id, "Registered with the portal.");
    }

    let Some(api_key) = config.api_key.clone() else {
        return Err("registration did not yield an API key".into());
    };

    let queue = OfflineQueue::open(Path::new(&config.queue_path)).await?;
    let client = ApiClient::new(&config.server_url, &api_key)?;

    // Capture: tail the spool file written by the platform print hook.
    tokio::spawn(spool_tail_loop(
        queue.clone(),
        PathBuf::from(&config.spool_path),
        config.hostname.clone(),
        Duration::from_secs(config.poll_interval_secs),
    ));

    // Retention: drop queued work past the cap, loudly.
    let purge_queue = queue.clone();
    let retention_days = config.retention_days;
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(PURGE_INTERVAL_SECONDS));
        loop {
            ticker.tick().await;
            match purge_queue.purge_older_than(retention_days).await {
                Ok(purged) if purged > 0 => {
                    warn!(
                        purged,
                        retention_days, "Dropped queued jobs older than the retention cap."
                    );
                }
                Ok(_) => {}
                Err(e) => error!(error = %e, "Retention purge failed."),
            }
        }
    });

    // Heartbeat: keeps last_seen fresh even when nothing is printed.
    let heartbeat_client = client.clone();
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECONDS));
        loop {
            ticker.tick().await;
            if let Err(e) = heartbeat_client.heartbeat().await {
                debug!(error = %e, "Heartbeat failed.");
            }
        }
    });

    // Upload: single in-flight FIFO drain.
    let uploader = Uploader::new(
        queue,
        client,
        Duration::from_secs(config.poll_interval_secs),
    );
    let uploader_handle = tokio::spawn(uploader.run());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received; stopping agent.");
    uploader_handle.abort();

    Ok(())
}
