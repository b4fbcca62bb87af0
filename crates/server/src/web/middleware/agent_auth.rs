use axum::{
    body::Body as AxumBody,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::warn;

use crate::db::services::agent_service;
use crate::services::api_key;
use crate::web::models::AuthenticatedAgent;
use crate::web::{error::AppError, AppState};

pub const API_KEY_HEADER: &str = "x-api-key";

/// Resolves the `X-Api-Key` header to a registered agent. An unknown or
/// revoked key halts the caller's queue drain with 401.
pub async fn agent_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request<AxumBody>,
    next: Next,
) -> Result<Response, AppError> {
    let presented = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing API key".to_string()))?;

    let key_hash = api_key::hash_key(presented);
    let agent = agent_service::find_by_api_key_hash(&state.db, &key_hash)
        .await?
        .ok_or_else(|| {
            warn!("Rejected request with unknown API key.");
            AppError::Unauthorized("Invalid or revoked API key".to_string())
        })?;

    let authenticated_agent = AuthenticatedAgent {
        id: agent.id,
        site_id: agent.site_id,
        hostname: agent.hostname,
    };
    req.extensions_mut().insert(authenticated_agent);
    Ok(next.run(req).await)
}
