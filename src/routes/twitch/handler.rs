use axum::{
    extract::{Extension, Query, State, rejection::QueryRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::{
    AppState,
    error::AppError,
    link::{LinkError, link_twitch_account},
    middleware::MaybeSession,
    store::StoreError,
    twitch::TWITCH_PROVIDER,
    utils::{Claims, error_codes, error_to_api_response, success_to_api_response},
};

use super::model::{AuthCallbackQuery, ConnectionStatusResponse, DisconnectResponse};

const SETTINGS_PATH: &str = "/settings";

/// 302 跳回设置页，成功带 `connected=true`，失败带编码后的错误信息
pub fn settings_redirect(error: Option<&str>) -> Response {
    let location = match error {
        None => format!("{SETTINGS_PATH}?connected=true"),
        Some(message) => format!("{SETTINGS_PATH}?error={}", urlencoding::encode(message)),
    };
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Twitch OAuth 回调
#[axum::debug_handler(state = AppState)]
pub async fn auth_callback(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    query: Result<Query<AuthCallbackQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(e) => {
            tracing::warn!("Invalid Twitch callback query: {}", e);
            return AppError::InvalidQuery.into_response();
        }
    };

    let result = link_twitch_account(
        state.store.as_ref(),
        &state.twitch,
        query.code.as_deref(),
        session.as_ref().map(|claims| claims.sub.as_str()),
    )
    .await;

    match result {
        Ok(_) => settings_redirect(None),
        Err(LinkError::MissingCode) => AppError::MissingCode.into_response(),
        Err(e) => {
            tracing::error!(error = ?e, "Twitch auth error");
            settings_redirect(Some(&e.to_string()))
        }
    }
}

/// 跳转到 Twitch 授权页
#[axum::debug_handler(state = AppState)]
pub async fn connect(State(state): State<AppState>) -> Response {
    match state.twitch.authorize_url() {
        Ok(url) => found(url.as_str()),
        Err(e) => {
            tracing::error!("Failed to build Twitch authorize url: {}", e);
            AppError::InternalServerError.into_response()
        }
    }
}

/// 断开 Twitch，仅清理本地数据
#[axum::debug_handler(state = AppState)]
pub async fn disconnect(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state
        .store
        .unlink_account(&claims.sub, TWITCH_PROVIDER)
        .await
    {
        Ok(()) => {
            tracing::info!(user_id = %claims.sub, "Twitch account disconnected");
            (
                StatusCode::OK,
                success_to_api_response(DisconnectResponse { disconnected: true }),
            )
        }
        Err(StoreError::UserNotFound(_)) => (
            StatusCode::NOT_FOUND,
            error_to_api_response(error_codes::NOT_FOUND, "User not found".to_string()),
        ),
        Err(e) => {
            tracing::error!("Failed to disconnect Twitch: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(
                    error_codes::INTERNAL_ERROR,
                    "Failed to disconnect from Twitch".to_string(),
                ),
            )
        }
    }
}

/// 当前用户的 Twitch 关联状态
#[axum::debug_handler(state = AppState)]
pub async fn connection_status(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state
        .store
        .find_connection(&claims.sub, TWITCH_PROVIDER)
        .await
    {
        Ok(Some(connection)) => (
            StatusCode::OK,
            success_to_api_response(ConnectionStatusResponse {
                connected: connection.is_connected(),
                twitch_username: connection.twitch_username,
                twitch_id: connection.twitch_id,
                expires_at: connection.expires_at,
            }),
        ),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            error_to_api_response(error_codes::NOT_FOUND, "User not found".to_string()),
        ),
        Err(e) => {
            tracing::error!("Failed to load Twitch connection: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(
                    error_codes::INTERNAL_ERROR,
                    "Failed to load Twitch connection".to_string(),
                ),
            )
        }
    }
}
