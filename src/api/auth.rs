use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::{ApiError, ApiResponse, AuthResponse, MessageResponse, UserDto};
use crate::services::auth_service::Registration;
use crate::state::AppState;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
}

/// The authenticated caller, inserted by `auth_middleware` for handlers to
/// pick up via `Extension`.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i32,
    pub email: String,
    pub role: String,
}

impl CurrentUser {
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role == "admin" {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Verifies the `Authorization: Bearer <access token>` header and attaches
/// the resolved user to the request.
pub async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = extract_bearer_token(&headers) else {
        return Err(ApiError::InvalidToken);
    };

    let user = state.auth.authenticate(&token).await?;

    tracing::Span::current().record("user_id", user.id);
    request.extensions_mut().insert(CurrentUser {
        id: user.id,
        email: user.email,
        role: user.role,
    });

    Ok(next.run(request).await)
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth_header = headers.get("Authorization")?;
    let auth_str = auth_header.to_str().ok()?;
    let token = auth_str.strip_prefix("Bearer ")?;
    Some(token.trim().to_string())
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/register
/// Create an account and sign the new user in.
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::validation("Name is required"));
    }
    if payload.email.trim().is_empty() || !payload.email.contains('@') {
        return Err(ApiError::validation("A valid email is required"));
    }

    let session = state
        .auth
        .register(Registration {
            name: payload.name.trim().to_string(),
            email: payload.email.trim().to_string(),
            password: payload.password,
            role: payload.role,
        })
        .await?;

    let body = ApiResponse::success(AuthResponse {
        user: UserDto::from(session.user),
        access_token: session.access_token,
        refresh_token: session.refresh_token,
        password_change_required: session.password_change_required,
    });

    Ok((StatusCode::CREATED, Json(body)))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>, ApiError> {
    if payload.email.is_empty() {
        return Err(ApiError::validation("Email is required"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    let session = state.auth.login(&payload.email, &payload.password).await?;

    Ok(Json(ApiResponse::success(AuthResponse {
        user: UserDto::from(session.user),
        access_token: session.access_token,
        refresh_token: session.refresh_token,
        password_change_required: session.password_change_required,
    })))
}

/// POST /auth/refresh-token
/// Exchange a refresh token for a new access token.
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<ApiResponse<RefreshResponse>>, ApiError> {
    if payload.refresh_token.is_empty() {
        return Err(ApiError::validation("Refresh token is required"));
    }

    let access_token = state
        .auth
        .refresh_access_token(&payload.refresh_token)
        .await?;

    Ok(Json(ApiResponse::success(RefreshResponse { access_token })))
}

/// GET /auth/me
pub async fn me(
    State(state): State<AppState>,
    axum::Extension(current): axum::Extension<CurrentUser>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let user = state.auth.get_user(current.id).await?;
    Ok(Json(ApiResponse::success(UserDto::from(user))))
}

/// POST /auth/logout
/// Tokens are bearer credentials with no server-side session, so logout is a
/// client-side discard; the endpoint exists so clients have a uniform flow.
pub async fn logout(
    axum::Extension(current): axum::Extension<CurrentUser>,
) -> Json<ApiResponse<MessageResponse>> {
    tracing::info!(user_id = current.id, "User logged out");
    Json(ApiResponse::success(MessageResponse::new("Logged out")))
}
