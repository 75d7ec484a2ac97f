use std::env;
use std::time::Duration;

pub const DEFAULT_TWITCH_AUTH_URL: &str = "https://id.twitch.tv/oauth2";
pub const DEFAULT_TWITCH_API_URL: &str = "https://api.twitch.tv/helix";
pub const DEFAULT_TWITCH_SCOPES: &str =
    "user:read:email channel:read:subscriptions moderator:read:followers";

/// 回调路径，必须与 Twitch 后台登记的 redirect_uri 完全一致
pub const TWITCH_CALLBACK_PATH: &str = "/api/twitch/auth";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub jwt_expiration_secs: u64,
    pub server_host: String,
    pub server_port: u16,
    /// 前端应用的外部访问地址，例如 `https://dash.example.com`
    pub app_url: String,
    pub twitch_client_id: String,
    pub twitch_client_secret: String,
    pub twitch_auth_url: String,
    pub twitch_api_url: String,
    pub twitch_scopes: Vec<String>,
    pub twitch_http_timeout_secs: u64,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
    /// 仅当服务部署在可信反向代理之后才读取 x-real-ip / x-forwarded-for
    pub trust_proxy_headers: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        let jwt_expiration = optional_var("JWT_EXPIRATION")
            .and_then(|v| v.trim_end_matches('h').parse::<u64>().ok())
            .unwrap_or(24);

        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL")?,
            jwt_secret: env::var("JWT_SECRET")?,
            jwt_expiration_secs: jwt_expiration * 3600,
            server_host: optional_var("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            server_port: parse_or("SERVER_PORT", 3000),
            app_url: env::var("APP_URL")?,
            twitch_client_id: env::var("TWITCH_CLIENT_ID")?,
            twitch_client_secret: env::var("TWITCH_CLIENT_SECRET")?,
            twitch_auth_url: optional_var("TWITCH_AUTH_URL")
                .unwrap_or_else(|| DEFAULT_TWITCH_AUTH_URL.into()),
            twitch_api_url: optional_var("TWITCH_API_URL")
                .unwrap_or_else(|| DEFAULT_TWITCH_API_URL.into()),
            twitch_scopes: split_scopes(
                &optional_var("TWITCH_SCOPES").unwrap_or_else(|| DEFAULT_TWITCH_SCOPES.into()),
            ),
            twitch_http_timeout_secs: parse_or("TWITCH_HTTP_TIMEOUT_SECS", 10),
            rate_limit_window_secs: parse_or("RATE_LIMIT_WINDOW", 60),
            rate_limit_requests: parse_or("RATE_LIMIT_REQUESTS", 30),
            trust_proxy_headers: parse_or("TRUST_PROXY_HEADERS", false),
        })
    }

    /// 授权跳转与换取令牌两处共用同一个地址
    pub fn redirect_uri(&self) -> String {
        format!(
            "{}{}",
            self.app_url.trim_end_matches('/'),
            TWITCH_CALLBACK_PATH
        )
    }

    pub fn jwt_expiration(&self) -> Duration {
        Duration::from_secs(self.jwt_expiration_secs)
    }

    pub fn twitch_http_timeout(&self) -> Duration {
        Duration::from_secs(self.twitch_http_timeout_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    optional_var(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

pub fn split_scopes(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}
