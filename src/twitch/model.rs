use serde::{Deserialize, Serialize};

/// 令牌端点的原始响应，失败时 Twitch 返回 `{status, message}`
#[derive(Debug, Default, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub message: Option<String>,
}

/// 校验后的令牌
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// 有效期（秒）
    pub expires_in: i64,
}

/// 只读取关联需要的 login 和 id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TwitchUser {
    pub id: String,
    pub login: String,
}

/// `GET /helix/users` 的响应体
#[derive(Debug, Deserialize)]
pub struct HelixUsers {
    #[serde(default)]
    pub data: Vec<TwitchUser>,
}
