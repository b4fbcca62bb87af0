use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::db::entities::user;
use crate::db::services::user_service::{self, UserChanges};
use crate::services::directory_sync::{self, DirectoryEntry};
use crate::web::{error::AppError, models::AuthenticatedUser, AppState};

const ROLES: &[&str] = &["admin", "user", "viewer"];
const MIN_PASSWORD_LENGTH: usize = 8;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/{id}", put(update_user).delete(delete_user))
        .route("/users/ldap/sync", post(ldap_sync))
}

pub fn require_admin(user: &AuthenticatedUser) -> Result<(), AppError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(AppError::Unauthorized(
            "Administrator role required".to_string(),
        ))
    }
}

fn validate_role(role: &str) -> Result<(), AppError> {
    if ROLES.contains(&role) {
        Ok(())
    } else {
        Err(AppError::InvalidInput(format!(
            "role must be one of {ROLES:?}, got '{role}'"
        )))
    }
}

#[derive(Serialize, Debug)]
pub struct UserDetailResponse {
    pub id: i32,
    pub username: String,
    pub role: String,
    pub is_ldap_user: bool,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for UserDetailResponse {
    fn from(model: user::Model) -> Self {
        UserDetailResponse {
            id: model.id,
            username: model.username,
            role: model.role,
            is_ldap_user: model.is_ldap_user,
            is_active: model.is_active,
            last_login: model.last_login,
            created_at: model.created_at,
        }
    }
}

async fn list_users(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<UserDetailResponse>>, AppError> {
    require_admin(&auth_user)?;
    let users = user_service::list_users(&app_state.db).await?;
    Ok(Json(users.into_iter().map(Into::into).collect()))
}

fn default_role() -> String {
    "user".to_string()
}

#[derive(Deserialize, Debug)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    #[serde(default = "default_role")]
    pub role: String,
}

async fn create_user(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    require_admin(&auth_user)?;

    if payload.username.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "username must not be empty".to_string(),
        ));
    }
    if payload.password.len() < MIN_PASSWORD_LENGTH {
        return Err(AppError::InvalidInput(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters long"
        )));
    }
    validate_role(&payload.role)?;

    let username = payload.username.trim();
    if user_service::get_user_by_username(&app_state.db, username)
        .await?
        .is_some()
    {
        return Err(AppError::UserAlreadyExists(format!(
            "username '{username}' is taken"
        )));
    }

    let password_hash = bcrypt::hash(&payload.password, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::PasswordHashingError(format!("Failed to hash password: {e}")))?;

    let created =
        user_service::create_user(&app_state.db, username, Some(password_hash), &payload.role, false)
            .await?;
    info!(user_id = created.id, username, "Created portal user.");

    Ok((
        StatusCode::CREATED,
        Json(UserDetailResponse::from(created)),
    ))
}

#[derive(Deserialize, Debug, Default)]
pub struct UpdateUserRequest {
    pub role: Option<String>,
    pub is_active: Option<bool>,
    pub password: Option<String>,
}

async fn update_user(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserDetailResponse>, AppError> {
    require_admin(&auth_user)?;

    if let Some(role) = &payload.role {
        validate_role(role)?;
    }
    let password_hash = match &payload.password {
        None => None,
        Some(p) if p.len() < MIN_PASSWORD_LENGTH => {
            return Err(AppError::InvalidInput(format!(
                "password must be at least {MIN_PASSWORD_LENGTH} characters long"
            )));
        }
        Some(p) => Some(
            bcrypt::hash(p, bcrypt::DEFAULT_COST).map_err(|e| {
                AppError::PasswordHashingError(format!("Failed to hash password: {e}"))
            })?,
        ),
    };

    let changes = UserChanges {
        role: payload.role,
        is_active: payload.is_active,
        password_hash,
    };

    let updated = user_service::update_user(&app_state.db, id, changes)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {id} does not exist")))?;

    Ok(Json(updated.into()))
}

/// Removal is a soft deactivation; accounts are never deleted.
async fn delete_user(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    require_admin(&auth_user)?;

    let deactivated = user_service::deactivate_user(&app_state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {id} does not exist")))?;
    info!(user_id = deactivated.id, "Deactivated portal user.");

    Ok(Json(
        serde_json::json!({ "message": "User deactivated successfully" }),
    ))
}

#[derive(Deserialize, Debug)]
pub struct SyncRequest {
    pub entries: Vec<DirectoryEntry>,
}

async fn ldap_sync(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<SyncRequest>,
) -> Result<impl IntoResponse, AppError> {
    require_admin(&auth_user)?;
    let summary = directory_sync::sync_directory(&app_state.db, &payload.entries).await?;
    Ok(Json(summary))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> AuthenticatedUser {
        AuthenticatedUser {
            id: 1,
            username: "root".to_string(),
            role: "admin".to_string(),
        }
    }

    #[test]
    fn viewer_is_not_admin() {
        let viewer = AuthenticatedUser {
            id: 2,
            username: "v".to_string(),
            role: "viewer".to_string(),
        };
        assert!(require_admin(&admin()).is_ok());
        assert!(require_admin(&viewer).is_err());
    }

    #[test]
    fn only_known_roles_pass() {
        assert!(validate_role("admin").is_ok());
        assert!(validate_role("viewer").is_ok());
        assert!(validate_role("superuser").is_err());
    }
}
