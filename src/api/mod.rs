use axum::{
    Json, Router,
    extract::State,
    http::HeaderValue,
    middleware,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod auth;
mod error;
pub mod passwords;
mod types;

pub use error::ApiError;
pub use types::*;

/// GET /health — liveness plus a database round-trip.
async fn health(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.store.ping().await?;
    Ok(Json(ApiResponse::success(MessageResponse::new("ok"))))
}

pub fn router(state: AppState) -> Router {
    let cors_origins = state.config.server.cors_allowed_origins.clone();

    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh-token", post(auth::refresh_token))
        .route("/passwords/request-reset", post(passwords::request_reset))
        .route("/passwords/reset", post(passwords::reset_password));

    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/auth/logout", post(auth::logout))
        .route("/passwords/change", post(passwords::change_password))
        .route(
            "/passwords/check-change-required",
            get(passwords::check_change_required),
        )
        .route("/passwords/generate", post(passwords::generate_password))
        .route(
            "/passwords/change-user",
            post(passwords::change_user_password),
        )
        .route(
            "/passwords/force-change/{user_id}",
            post(passwords::force_change),
        )
        .route("/passwords/history/{user_id}", get(passwords::history))
        .route("/passwords/cleanup-tokens", post(passwords::cleanup_tokens))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state);

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}
