use axum::{
    Router,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::{
    AppState,
    middleware::{auth_middleware, log_errors},
};

pub mod twitch;

/// 组装全部路由，限流和 CORS 在 main 中按部署环境追加
pub fn build_router(state: AppState) -> Router {
    // 公开路由：Twitch 回调需要自己处理未登录的情况
    let public_routes = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/twitch/auth", get(twitch::auth_callback))
        .route("/api/twitch/connect", get(twitch::connect));

    let protected_routes = Router::new()
        .route("/api/twitch/disconnect", post(twitch::disconnect))
        .route("/api/twitch/status", get(twitch::connection_status))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        // 先加的层在外：TraceLayer 包住错误日志
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum::middleware::from_fn(log_errors)),
        )
        .with_state(state)
}
