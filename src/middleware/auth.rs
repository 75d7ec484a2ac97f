use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, Cookie, HeaderMapExt, authorization::Bearer};

use crate::{
    AppState,
    error::AppError,
    utils::{Claims, verify_token},
};

/// 前端写入的会话 cookie 名称
const SESSION_COOKIE: &str = "session";

/// 依次从 `Authorization: Bearer` 和 session cookie 中取会话令牌
fn session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(Authorization(bearer)) = headers.typed_get::<Authorization<Bearer>>() {
        return Some(bearer.token().to_string());
    }

    headers
        .typed_get::<Cookie>()
        .and_then(|cookie| cookie.get(SESSION_COOKIE).map(str::to_string))
}

fn resolve_session(headers: &HeaderMap, state: &AppState) -> Option<Claims> {
    let token = session_token(headers)?;
    match verify_token(&token, &state.config) {
        Ok(claims) => Some(claims),
        Err(e) => {
            tracing::debug!("Rejected session token: {}", e);
            None
        }
    }
}

/// 可选会话，OAuth 回调需要自行把未登录转换成跳转
pub struct MaybeSession(pub Option<Claims>);

impl FromRequestParts<AppState> for MaybeSession {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeSession(resolve_session(&parts.headers, state)))
    }
}

/// 受保护路由：会话有效时把 Claims 放入扩展
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = resolve_session(request.headers(), &state).ok_or(AppError::Unauthorized)?;
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, header};

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        headers.insert(header::COOKIE, HeaderValue::from_static("session=from-cookie"));
        assert_eq!(session_token(&headers).as_deref(), Some("from-header"));
    }

    #[test]
    fn session_cookie_is_read_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session=from-cookie"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("from-cookie"));
        assert_eq!(session_token(&HeaderMap::new()), None);
    }
}
