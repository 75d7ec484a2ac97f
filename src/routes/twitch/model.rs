use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Twitch 回调参数，只使用 code，其余参数（scope、state 等）忽略
#[derive(Debug, Deserialize)]
pub struct AuthCallbackQuery {
    pub code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DisconnectResponse {
    pub disconnected: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConnectionStatusResponse {
    pub connected: bool,
    pub twitch_username: Option<String>,
    pub twitch_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}
