use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use printwatch_common::agents::SiteSummary;
use sea_orm::SqlErr;
use serde::Deserialize;
use std::sync::Arc;

use crate::db::services::site_service;
use crate::web::routes::user_routes::require_admin;
use crate::web::{error::AppError, models::AuthenticatedUser, AppState};

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/sites", get(list_sites).post(create_site))
}

async fn list_sites(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<SiteSummary>>, AppError> {
    let sites = site_service::list_sites(&app_state.db).await?;
    Ok(Json(
        sites
            .into_iter()
            .map(|s| SiteSummary {
                id: s.id,
                label: s.label,
                created_at: s.created_at,
            })
            .collect(),
    ))
}

#[derive(Deserialize, Debug)]
pub struct CreateSiteRequest {
    pub label: String,
}

async fn create_site(
    Extension(user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<CreateSiteRequest>,
) -> Result<impl IntoResponse, AppError> {
    require_admin(&user)?;
    let label = payload.label.trim();
    if label.is_empty() {
        return Err(AppError::InvalidInput("label must not be empty".to_string()));
    }

    match site_service::create_site(&app_state.db, label).await {
        Ok(site) => Ok((
            StatusCode::CREATED,
            Json(SiteSummary {
                id: site.id,
                label: site.label,
                created_at: site.created_at,
            }),
        )),
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => Err(
            AppError::Conflict(format!("site '{label}' already exists")),
        ),
        Err(e) => Err(e.into()),
    }
}
