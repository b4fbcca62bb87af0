use axum::{
    extract::State,
    http::{HeaderValue, Method},
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, SameSite};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::server::config::ServerConfig;
use crate::services::auth_service;
use crate::web::{
    error::AppError,
    models::LoginRequest,
    routes::{agent_routes, print_job_routes, report_routes, site_routes, user_routes},
};

pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<ServerConfig>,
}

async fn login_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let login_response =
        auth_service::login_user(&app_state.db, payload, &app_state.config).await?;

    let auth_cookie = Cookie::build(("token", login_response.token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(true)
        .build();

    let mut response = Json(login_response).into_response();
    response.headers_mut().insert(
        axum::http::header::SET_COOKIE,
        auth_cookie.to_string().parse().unwrap(),
    );

    Ok(response)
}

async fn health_check_handler() -> &'static str {
    "OK"
}

fn build_cors(config: &ServerConfig) -> CorsLayer {
    let methods = vec![
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let origins = config.cors_origins();
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| o.parse::<HeaderValue>().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(parsed))
            .allow_methods(methods)
            .allow_headers(Any)
    }
}

pub fn create_axum_router(db: DatabaseConnection, config: Arc<ServerConfig>) -> Router {
    let cors = build_cors(&config);
    let app_state = Arc::new(AppState { db, config });

    let public = Router::new()
        .route("/health", get(health_check_handler))
        .route("/auth/login", post(login_handler))
        .route("/agents/register", post(agent_routes::register_agent));

    // Ingestion surface: authenticated per-agent by API key.
    let ingest = Router::new()
        .merge(print_job_routes::ingest_router())
        .merge(agent_routes::ingest_router())
        .route_layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            middleware::agent_auth::agent_auth,
        ));

    // Portal surface: authenticated by JWT bearer token or cookie.
    let protected = Router::new()
        .route("/auth/me", get(auth_service::me))
        .merge(print_job_routes::query_router())
        .merge(report_routes::router())
        .merge(agent_routes::query_router())
        .merge(site_routes::router())
        .merge(user_routes::router())
        .route_layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            middleware::auth::auth,
        ));

    Router::new()
        .nest("/api", public.merge(ingest).merge(protected))
        .with_state(app_state)
        .layer(cors)
}
