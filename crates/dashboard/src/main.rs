pub mod client;
pub mod export;
pub mod render;
pub mod state;

use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use tokio::time::{sleep, Duration};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::client::DashboardClient;
use crate::state::{DashboardState, SortColumn, SortDirection};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Portal base URL
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    server_url: String,

    #[arg(long)]
    username: String,

    #[arg(long)]
    password: String,

    /// Poll interval between refreshes
    #[arg(long, default_value_t = 30)]
    interval_secs: u64,

    /// Render once and exit instead of polling
    #[arg(long)]
    once: bool,

    /// Local substring filter on username/document
    #[arg(long)]
    filter: Option<String>,

    /// Local sort, e.g. "pages:desc" or "username:asc"
    #[arg(long)]
    sort: Option<String>,

    #[arg(long, default_value_t = 20)]
    page_size: usize,

    /// How many records to fetch from the server per refresh
    #[arg(long, default_value_t = 200)]
    fetch_limit: u64,

    /// Write the current filtered/sorted view as CSV to this path
    #[arg(long)]
    export_csv: Option<PathBuf>,
}

fn parse_sort(raw: &str) -> Result<(SortColumn, SortDirection), String> {
    let (column, direction) = match raw.split_once(':') {
        Some((c, d)) => (c, d),
        None => (raw, "asc"),
    };
    let column = SortColumn::parse(column)
        .ok_or_else(|| format!("unknown sort column '{column}'"))?;
    let direction = match direction {
        "asc" => SortDirection::Ascending,
        "desc" => SortDirection::Descending,
        other => return Err(format!("sort direction must be asc or desc, got '{other}'")),
    };
    Ok((column, direction))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut state = DashboardState::new(args.page_size);
    if let Some(filter) = &args.filter {
        state.set_filter(filter.clone());
    }
    if let Some(raw) = &args.sort {
        let (column, direction) = parse_sort(raw)?;
        state.set_sort(column, direction);
    }

    let mut client = DashboardClient::new(&args.server_url)?;
    client.login(&args.username, &args.password).await?;
    info!(server = %args.server_url, "Logged in to portal.");

    loop {
        match refresh(&client, &mut state, &args).await {
            Ok(()) => {}
            Err(e) => error!(error = %e, "Refresh failed; keeping previous view."),
        }

        if args.once {
            return Ok(());
        }
        tokio::select! {
            _ = sleep(Duration::from_secs(args.interval_secs)) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down dashboard.");
                return Ok(());
            }
        }
    }
}

async fn refresh(
    client: &DashboardClient,
    state: &mut DashboardState,
    args: &Args,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let page = client.fetch_jobs(args.fetch_limit).await?;
    let overview = client.fetch_overview().await?;
    let trends = client.fetch_trends().await?;

    let fetched = page.items.len();
    state.set_records(page.items);

    let mut screen = String::new();
    screen.push_str(&render::render_overview(&overview));
    screen.push('\n');
    screen.push_str(&render::render_jobs_table(
        &state.visible_rows(),
        state.page(),
        state.page_count(),
        fetched,
    ));
    screen.push('\n');
    screen.push_str(&render::render_trends(&trends));
    println!("{screen}");

    if let Some(path) = &args.export_csv {
        let csv = export::to_csv(&state.filtered_sorted());
        std::fs::write(path, csv)?;
        info!(path = %path.display(), "Exported current view.");
    }
    Ok(())
}
