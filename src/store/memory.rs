use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Connection, LinkStore, NewUserToken, StoreError, UserRecord, UserToken};
use crate::twitch::TwitchUser;

#[derive(Default)]
struct Tables {
    users: HashMap<String, UserRecord>,
    tokens: HashMap<(String, String), UserToken>,
}

/// 内存存储，用于本地调试和测试
#[derive(Default)]
pub struct MemoryLinkStore {
    tables: RwLock<Tables>,
    writes: AtomicUsize,
    fail_token_writes: AtomicBool,
}

impl MemoryLinkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user_id: &str) {
        self.tables.write().await.users.insert(
            user_id.to_string(),
            UserRecord {
                id: user_id.to_string(),
                twitch_username: None,
                twitch_id: None,
            },
        );
    }

    pub async fn user(&self, user_id: &str) -> Option<UserRecord> {
        self.tables.read().await.users.get(user_id).cloned()
    }

    pub async fn token(&self, user_id: &str, provider: &str) -> Option<UserToken> {
        self.tables
            .read()
            .await
            .tokens
            .get(&(user_id.to_string(), provider.to_string()))
            .cloned()
    }

    pub async fn token_count(&self) -> usize {
        self.tables.read().await.tokens.len()
    }

    /// 已提交的写操作次数
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// 让后续的令牌写入失败，用来模拟数据库故障
    pub fn fail_token_writes(&self, fail: bool) {
        self.fail_token_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl LinkStore for MemoryLinkStore {
    async fn link_account(
        &self,
        user_id: &str,
        identity: &TwitchUser,
        token: &NewUserToken,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;

        // 先完成全部校验再修改，保证与事务相同的效果
        if !tables.users.contains_key(user_id) {
            return Err(StoreError::UserNotFound(user_id.to_string()));
        }
        if self.fail_token_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Token(sqlx::Error::Protocol(
                "token write rejected".into(),
            )));
        }

        if let Some(user) = tables.users.get_mut(user_id) {
            user.twitch_username = Some(identity.login.clone());
            user.twitch_id = Some(identity.id.clone());
        }
        tables.tokens.insert(
            (user_id.to_string(), token.provider.clone()),
            UserToken {
                user_id: user_id.to_string(),
                provider: token.provider.clone(),
                access_token: token.access_token.clone(),
                refresh_token: token.refresh_token.clone(),
                expires_at: token.expires_at,
            },
        );
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn unlink_account(&self, user_id: &str, provider: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;

        let Some(user) = tables.users.get_mut(user_id) else {
            return Err(StoreError::UserNotFound(user_id.to_string()));
        };
        user.twitch_username = None;
        user.twitch_id = None;
        tables
            .tokens
            .remove(&(user_id.to_string(), provider.to_string()));
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn find_connection(
        &self,
        user_id: &str,
        provider: &str,
    ) -> Result<Option<Connection>, StoreError> {
        let tables = self.tables.read().await;

        Ok(tables.users.get(user_id).map(|user| Connection {
            twitch_username: user.twitch_username.clone(),
            twitch_id: user.twitch_id.clone(),
            expires_at: tables
                .tokens
                .get(&(user_id.to_string(), provider.to_string()))
                .map(|t| t.expires_at),
        }))
    }
}
