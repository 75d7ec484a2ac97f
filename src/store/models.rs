use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 用户数据库实体（仅关联相关字段）
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct UserRecord {
    pub id: String,
    pub twitch_username: Option<String>,
    pub twitch_id: Option<String>,
}

/// 第三方令牌实体
#[derive(Debug, Clone, FromRow)]
pub struct UserToken {
    pub user_id: String,
    pub provider: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUserToken {
    pub provider: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// 设置页展示用的关联状态
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Connection {
    pub twitch_username: Option<String>,
    pub twitch_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Connection {
    pub fn is_connected(&self) -> bool {
        self.twitch_username.is_some()
    }
}
