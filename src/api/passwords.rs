use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::auth::CurrentUser;
use super::{ApiError, ApiResponse, MessageResponse};
use crate::state::AppState;

/// Returned for every reset request, known email or not.
const RESET_REQUEST_MESSAGE: &str =
    "If an account exists for that email, a reset link has been sent";

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeUserPasswordRequest {
    pub user_id: i32,
    pub new_password: String,
    #[serde(default)]
    pub force_change: bool,
}

#[derive(Deserialize)]
pub struct RequestResetRequest {
    pub email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Deserialize)]
pub struct GenerateQuery {
    pub length: Option<usize>,
}

#[derive(Serialize)]
pub struct GeneratedPasswordResponse {
    pub password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRequiredResponse {
    pub password_change_required: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetRequestedResponse {
    pub message: String,
    /// Only populated when the server runs with `dev_mode` enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntryDto {
    pub id: i32,
    pub changed_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub history: Vec<HistoryEntryDto>,
}

#[derive(Serialize)]
pub struct CleanupResponse {
    pub swept: u64,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /passwords/change
/// Self-service password change for the authenticated user.
pub async fn change_password(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    if payload.current_password.is_empty() || payload.new_password.is_empty() {
        return Err(ApiError::validation(
            "Current and new password are required",
        ));
    }

    state
        .passwords
        .change_password(current.id, &payload.current_password, &payload.new_password)
        .await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Password updated successfully",
    ))))
}

/// GET /passwords/check-change-required
pub async fn check_change_required(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<ChangeRequiredResponse>>, ApiError> {
    let required = state.passwords.is_change_required(current.id).await?;

    Ok(Json(ApiResponse::success(ChangeRequiredResponse {
        password_change_required: required,
    })))
}

/// POST /passwords/generate
/// A random password that satisfies the strength policy; never persisted.
pub async fn generate_password(
    State(state): State<AppState>,
    Query(query): Query<GenerateQuery>,
) -> Json<ApiResponse<GeneratedPasswordResponse>> {
    let password = state.passwords.generate_password(query.length.unwrap_or(12));

    Json(ApiResponse::success(GeneratedPasswordResponse { password }))
}

/// POST /passwords/request-reset
/// Always answers with the same message so the endpoint cannot be used to
/// probe which emails have accounts.
pub async fn request_reset(
    State(state): State<AppState>,
    Json(payload): Json<RequestResetRequest>,
) -> Result<Json<ApiResponse<ResetRequestedResponse>>, ApiError> {
    if payload.email.is_empty() {
        return Err(ApiError::validation("Email is required"));
    }

    let token = state.passwords.request_reset(&payload.email).await?;

    let token = if state.config.server.dev_mode {
        token
    } else {
        None
    };

    Ok(Json(ApiResponse::success(ResetRequestedResponse {
        message: RESET_REQUEST_MESSAGE.to_string(),
        token,
    })))
}

/// POST /passwords/reset
/// Redeem a reset token. Single-use.
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    if payload.token.is_empty() || payload.new_password.is_empty() {
        return Err(ApiError::validation("Token and new password are required"));
    }

    state
        .passwords
        .redeem_reset(&payload.token, &payload.new_password)
        .await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Password reset successfully",
    ))))
}

/// POST /passwords/change-user
/// Admin-only: set another user's password, optionally flagging them to
/// change it on next login.
pub async fn change_user_password(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<ChangeUserPasswordRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    current.require_admin()?;

    if payload.new_password.is_empty() {
        return Err(ApiError::validation("New password is required"));
    }

    state
        .passwords
        .admin_change_password(payload.user_id, &payload.new_password, payload.force_change)
        .await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Password updated successfully",
    ))))
}

/// POST /passwords/force-change/{user_id}
pub async fn force_change(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(user_id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    current.require_admin()?;

    state.passwords.force_password_change(user_id).await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Password change required at next login",
    ))))
}

/// GET /passwords/history/{user_id}
/// Change timestamps only; hashes never leave the service layer.
pub async fn history(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(user_id): Path<i32>,
) -> Result<Json<ApiResponse<HistoryResponse>>, ApiError> {
    current.require_admin()?;

    let entries = state.passwords.history(user_id).await?;

    Ok(Json(ApiResponse::success(HistoryResponse {
        history: entries
            .into_iter()
            .map(|e| HistoryEntryDto {
                id: e.id,
                changed_at: e.changed_at,
            })
            .collect(),
    })))
}

/// POST /passwords/cleanup-tokens
/// Manual trigger for the expired-reset-token sweep the scheduler also runs.
pub async fn cleanup_tokens(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<CleanupResponse>>, ApiError> {
    current.require_admin()?;

    let swept = state.passwords.sweep_expired_tokens().await?;

    Ok(Json(ApiResponse::success(CleanupResponse { swept })))
}
