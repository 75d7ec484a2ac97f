use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use redis::{AsyncCommands, aio::ConnectionManager};

use crate::{
    config::Config,
    utils::{error_codes, error_to_api_response},
};

/// 基于 Redis 计数器的固定窗口限流
#[derive(Clone)]
pub struct RateLimiter {
    conn: ConnectionManager,
    window: Duration,
    max_requests: u32,
    trust_proxy_headers: bool,
}

impl RateLimiter {
    /// 启动时建立一次连接，之后每个请求复用（ConnectionManager 会自动重连）
    pub async fn new(redis: redis::Client, config: &Config) -> redis::RedisResult<Self> {
        Self::connect(
            redis,
            config.rate_limit_window(),
            config.rate_limit_requests,
            config.trust_proxy_headers,
        )
        .await
    }

    async fn connect(
        redis: redis::Client,
        window: Duration,
        max_requests: u32,
        trust_proxy_headers: bool,
    ) -> redis::RedisResult<Self> {
        Ok(Self {
            conn: ConnectionManager::new(redis).await?,
            window,
            max_requests,
            trust_proxy_headers,
        })
    }

    async fn hit(&self, ip: &str) -> redis::RedisResult<i64> {
        let key = format!("rate_limit:{}", ip);
        let mut conn = self.conn.clone();

        let (count, ttl): (i64, i64) = redis::pipe()
            .atomic()
            .incr(&key, 1)
            .ttl(&key)
            .query_async(&mut conn)
            .await?;

        // 没有过期时间时（新计数器，或上次 EXPIRE 失败留下的计数器）重新设置窗口
        if ttl < 0 {
            let _: () = conn.expire(&key, self.window.as_secs() as i64).await?;
        }
        Ok(count)
    }

    pub async fn check_rate_limit(self: Arc<Self>, req: Request<Body>, next: Next) -> Response {
        let remote_ip = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string());
        let ip = client_ip(req.headers(), remote_ip.as_deref(), self.trust_proxy_headers);

        match self.hit(&ip).await {
            Ok(count) if count > i64::from(self.max_requests) => {
                tracing::warn!(%ip, count, "Rate limit exceeded");
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    error_to_api_response::<()>(
                        error_codes::RATE_LIMIT,
                        format!(
                            "Too many requests, retry in {} seconds",
                            self.window.as_secs()
                        ),
                    ),
                )
                    .into_response()
            }
            Ok(_) => next.run(req).await,
            Err(e) => {
                // Redis 不可用时放行，不影响账号关联
                tracing::warn!("Rate limiter unavailable: {}", e);
                next.run(req).await
            }
        }
    }
}

/// 代理头可由客户端伪造，只有部署在可信反向代理之后才读取，否则只用连接地址
fn client_ip(headers: &HeaderMap, remote_ip: Option<&str>, trust_proxy_headers: bool) -> String {
    let forwarded = if trust_proxy_headers {
        headers
            .get("x-real-ip")
            .and_then(|h| h.to_str().ok())
            .or_else(|| {
                headers
                    .get("x-forwarded-for")
                    .and_then(|h| h.to_str().ok())
                    .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
            })
    } else {
        None
    };

    forwarded
        .or(remote_ip)
        .unwrap_or("unknown")
        .trim()
        .to_string()
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    limiter.check_rate_limit(req, next).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn real_ip_header_wins_behind_trusted_proxy() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.1"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_ip(&headers, Some("127.0.0.1"), true), "10.0.0.1");
    }

    #[test]
    fn first_forwarded_address_is_used_behind_trusted_proxy() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static(" 203.0.113.5 , 10.0.0.2"),
        );
        assert_eq!(client_ip(&headers, None, true), "203.0.113.5");
    }

    #[test]
    fn proxy_headers_are_ignored_unless_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.1"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_ip(&headers, Some("192.0.2.7"), false), "192.0.2.7");
    }

    #[test]
    fn falls_back_to_connection_address() {
        assert_eq!(
            client_ip(&HeaderMap::new(), Some("127.0.0.1"), true),
            "127.0.0.1"
        );
        assert_eq!(client_ip(&HeaderMap::new(), None, false), "unknown");
    }

    // 以下测试需要真实 Redis，未设置 TEST_REDIS_URL 时直接跳过

    async fn redis_fixture(
        window: Duration,
        max_requests: u32,
    ) -> Option<(RateLimiter, redis::aio::MultiplexedConnection)> {
        let url = std::env::var("TEST_REDIS_URL").ok()?;
        let client = redis::Client::open(url).unwrap();
        let conn = client.get_multiplexed_async_connection().await.unwrap();
        let limiter = RateLimiter::connect(client, window, max_requests, false)
            .await
            .unwrap();
        Some((limiter, conn))
    }

    fn unique_ip(tag: &str) -> String {
        let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        format!("test-{tag}-{}-{nanos}", std::process::id())
    }

    #[tokio::test]
    async fn first_hit_starts_a_window() {
        let Some((limiter, mut conn)) = redis_fixture(Duration::from_secs(60), 5).await else {
            return;
        };
        let ip = unique_ip("first");
        let key = format!("rate_limit:{ip}");

        assert_eq!(limiter.hit(&ip).await.unwrap(), 1);
        assert_eq!(limiter.hit(&ip).await.unwrap(), 2);
        let ttl: i64 = conn.ttl(&key).await.unwrap();
        assert!(ttl > 0 && ttl <= 60, "ttl = {ttl}");

        let _: () = conn.del(&key).await.unwrap();
    }

    #[tokio::test]
    async fn counter_left_without_ttl_is_rearmed() {
        let Some((limiter, mut conn)) = redis_fixture(Duration::from_secs(60), 5).await else {
            return;
        };
        let ip = unique_ip("stale");
        let key = format!("rate_limit:{ip}");

        // 模拟 INCR 成功但 EXPIRE 失败后遗留的计数器
        let _: () = conn.set(&key, 7).await.unwrap();
        let ttl: i64 = conn.ttl(&key).await.unwrap();
        assert_eq!(ttl, -1);

        assert_eq!(limiter.hit(&ip).await.unwrap(), 8);
        let ttl: i64 = conn.ttl(&key).await.unwrap();
        assert!(ttl > 0 && ttl <= 60, "ttl = {ttl}");

        let _: () = conn.del(&key).await.unwrap();
    }
}
