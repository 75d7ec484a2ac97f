// 存储模块
// 账号关联只需要 users 与 user_tokens 两张表上的少量写操作

mod memory;
mod models;
mod postgres;

pub use memory::MemoryLinkStore;
pub use models::{Connection, NewUserToken, UserRecord, UserToken};
pub use postgres::PgLinkStore;

use async_trait::async_trait;

use crate::twitch::TwitchUser;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("user `{0}` does not exist")]
    UserNotFound(String),
    #[error("failed to update user identity: {0}")]
    Identity(#[source] sqlx::Error),
    #[error("failed to upsert user token: {0}")]
    Token(#[source] sqlx::Error),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait LinkStore: Send + Sync + 'static {
    /// 写入 Twitch 身份并 upsert 令牌，二者要么都成功要么都不生效
    async fn link_account(
        &self,
        user_id: &str,
        identity: &TwitchUser,
        token: &NewUserToken,
    ) -> Result<(), StoreError>;

    /// 清空身份字段并删除对应 provider 的令牌
    async fn unlink_account(&self, user_id: &str, provider: &str) -> Result<(), StoreError>;

    async fn find_connection(
        &self,
        user_id: &str,
        provider: &str,
    ) -> Result<Option<Connection>, StoreError>;
}
