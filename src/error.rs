use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Debug)]
pub enum AppError {
    MissingCode,
    /// 查询参数无法解析，例如重复的 code
    InvalidQuery,
    Unauthorized,
    InternalServerError,
}

#[derive(Serialize)]
struct ErrorResponse {
    code: i32,
    error_message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::MissingCode => (StatusCode::BAD_REQUEST, "No code provided"),
            AppError::InvalidQuery => (StatusCode::BAD_REQUEST, "Invalid callback parameters"),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Not authenticated"),
            AppError::InternalServerError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = Json(ErrorResponse {
            code: status.as_u16() as i32,
            error_message: error_message.to_string(),
        });

        (status, body).into_response()
    }
}
