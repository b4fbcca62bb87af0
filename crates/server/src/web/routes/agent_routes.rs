use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use printwatch_common::agents::{
    AgentSummary, HeartbeatResponse, Liveness, RegisterRequest, RegisterResponse,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::services::{agent_service, print_job_service, site_service};
use crate::services::api_key;
use crate::web::{error::AppError, models::AuthenticatedAgent, AppState};

/// Routes reached by agents with an API key.
pub fn ingest_router() -> Router<Arc<AppState>> {
    Router::new().route("/agents/heartbeat", post(heartbeat))
}

/// Routes reached by portal users with a JWT.
pub fn query_router() -> Router<Arc<AppState>> {
    Router::new().route("/agents", get(list_agents))
}

/// Public registration endpoint, optionally gated by a shared token.
/// The issued API key is returned exactly once; only its hash is kept.
pub async fn register_agent(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Some(expected) = &app_state.config.agent_registration_token {
        if payload.registration_token.as_deref() != Some(expected.as_str()) {
            warn!(hostname = %payload.hostname, "Rejected registration with bad token.");
            return Err(AppError::Unauthorized(
                "Invalid registration token".to_string(),
            ));
        }
    }

    if payload.hostname.trim().is_empty() {
        return Err(AppError::InvalidInput("hostname must not be empty".to_string()));
    }
    if payload.site.trim().is_empty() {
        return Err(AppError::InvalidInput("site must not be empty".to_string()));
    }

    let site = site_service::find_or_create_site(&app_state.db, payload.site.trim()).await?;
    let (full_key, key_hash) = api_key::generate_key();
    let agent = agent_service::register_agent(
        &app_state.db,
        site.id,
        payload.hostname.trim(),
        Some(payload.agent_version.clone()),
        &key_hash,
    )
    .await?;

    info!(
        agent_id = agent.id,
        hostname = %agent.hostname,
        site = %site.label,
        "Registered new agent."
    );

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            agent_id: agent.id,
            api_key: full_key,
        }),
    ))
}

async fn heartbeat(
    Extension(agent): Extension<AuthenticatedAgent>,
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<HeartbeatResponse>, AppError> {
    agent_service::touch_last_seen(&app_state.db, agent.id).await?;
    Ok(Json(HeartbeatResponse {
        server_time: Utc::now(),
    }))
}

async fn list_agents(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<AgentSummary>>, AppError> {
    let now = Utc::now();
    let agents = agent_service::list_agents_with_sites(&app_state.db).await?;
    let job_counts = print_job_service::count_jobs_by_agent(&app_state.db).await?;

    let summaries = agents
        .into_iter()
        .map(|(agent, site)| AgentSummary {
            id: agent.id,
            site_id: agent.site_id,
            site: site.map(|s| s.label).unwrap_or_default(),
            hostname: agent.hostname,
            agent_version: agent.agent_version,
            liveness: Liveness::from_last_seen(agent.last_seen, now),
            last_seen: agent.last_seen,
            registered_at: agent.registered_at,
            total_jobs: job_counts.get(&agent.id).copied().unwrap_or(0),
        })
        .collect();

    Ok(Json(summaries))
}
