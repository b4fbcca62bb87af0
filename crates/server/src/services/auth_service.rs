use axum::Extension;
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use rand::{distr::Alphanumeric, Rng};
use sea_orm::DatabaseConnection;
use tracing::warn;

use crate::db::entities::user;
use crate::db::services::user_service;
use crate::server::config::ServerConfig;
use crate::web::error::AppError;
use crate::web::models::{AuthenticatedUser, Claims, LoginRequest, LoginResponse, UserResponse};

pub async fn login_user(
    db: &DatabaseConnection,
    req: LoginRequest,
    config: &ServerConfig,
) -> Result<LoginResponse, AppError> {
    if req.username.is_empty() || req.password.is_empty() {
        return Err(AppError::InvalidInput(
            "Username and password must not be empty.".to_string(),
        ));
    }

    let user = match user_service::get_user_by_username(db, &req.username).await? {
        Some(u) => u,
        None => return Err(AppError::UserNotFound),
    };

    if !user.is_active {
        return Err(AppError::InvalidCredentials);
    }

    // Directory-backed accounts have no local password.
    let password_hash = match user.password_hash.as_ref() {
        Some(hash) => hash,
        None => return Err(AppError::InvalidCredentials),
    };

    let valid_password = verify(&req.password, password_hash)
        .map_err(|e| AppError::InternalServerError(format!("Password verification failed: {e}")))?;

    if !valid_password {
        return Err(AppError::InvalidCredentials);
    }

    user_service::touch_last_login(db, user.id).await?;

    create_jwt_for_user(&user, &config.jwt_secret, config.jwt_expiry_hours)
}

pub fn create_jwt_for_user(
    user: &user::Model,
    jwt_secret: &str,
    expiry_hours: i64,
) -> Result<LoginResponse, AppError> {
    let now = Utc::now();
    let expiration = (now + Duration::hours(expiry_hours)).timestamp() as usize;

    let claims = Claims {
        sub: user.username.clone(),
        user_id: user.id,
        role: user.role.clone(),
        exp: expiration,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_ref()),
    )
    .map_err(|e| AppError::TokenCreationError(format!("Failed to create token: {e}")))?;

    Ok(LoginResponse {
        token,
        user_id: user.id,
        username: user.username.clone(),
        role: user.role.clone(),
    })
}

/// Seeds an admin account when the users table is empty. Without a
/// configured password a random one is generated and logged once.
pub async fn ensure_bootstrap_admin(
    db: &DatabaseConnection,
    config: &ServerConfig,
) -> Result<(), AppError> {
    if user_service::count_users(db).await? > 0 {
        return Ok(());
    }

    let (password, generated) = match &config.admin_password {
        Some(p) => (p.clone(), false),
        None => {
            let p: String = rand::rng()
                .sample_iter(&Alphanumeric)
                .take(16)
                .map(char::from)
                .collect();
            (p, true)
        }
    };

    let password_hash = hash(&password, DEFAULT_COST)
        .map_err(|e| AppError::PasswordHashingError(format!("Failed to hash password: {e}")))?;

    user_service::create_user(db, &config.admin_username, Some(password_hash), "admin", false)
        .await?;

    if generated {
        warn!(
            username = %config.admin_username,
            password = %password,
            "Seeded bootstrap admin with a generated password. Change it after first login."
        );
    } else {
        warn!(
            username = %config.admin_username,
            "Seeded bootstrap admin from configuration. Change the password after first login."
        );
    }
    Ok(())
}

pub async fn me(
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<axum::Json<UserResponse>, AppError> {
    Ok(axum::Json(UserResponse {
        id: user.id,
        username: user.username,
        role: user.role,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, DecodingKey, Validation};

    fn user_model() -> user::Model {
        user::Model {
            id: 7,
            username: "jdoe".to_string(),
            password_hash: Some("$2b$12$hash".to_string()),
            role: "viewer".to_string(),
            is_ldap_user: false,
            is_active: true,
            last_login: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn jwt_round_trips_claims() {
        let response = create_jwt_for_user(&user_model(), "test-secret", 24).unwrap();
        assert_eq!(response.user_id, 7);

        let decoded = decode::<Claims>(
            &response.token,
            &DecodingKey::from_secret("test-secret".as_ref()),
            &Validation::default(),
        )
        .unwrap();
        assert_eq!(decoded.claims.sub, "jdoe");
        assert_eq!(decoded.claims.user_id, 7);
        assert_eq!(decoded.claims.role, "viewer");
    }

    #[test]
    fn jwt_with_wrong_secret_fails() {
        let response = create_jwt_for_user(&user_model(), "test-secret", 24).unwrap();
        let result = decode::<Claims>(
            &response.token,
            &DecodingKey::from_secret("other-secret".as_ref()),
            &Validation::default(),
        );
        assert!(result.is_err());
    }
}
