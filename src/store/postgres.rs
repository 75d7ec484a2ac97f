use async_trait::async_trait;
use sqlx::PgPool;

use super::{Connection, LinkStore, NewUserToken, StoreError};
use crate::twitch::TwitchUser;

/// 基于 Postgres 的存储实现
#[derive(Clone)]
pub struct PgLinkStore {
    pool: PgPool,
}

impl PgLinkStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LinkStore for PgLinkStore {
    async fn link_account(
        &self,
        user_id: &str,
        identity: &TwitchUser,
        token: &NewUserToken,
    ) -> Result<(), StoreError> {
        // 两次写入放在同一个事务里，任何一步失败都会在 tx 析构时回滚
        let mut tx = self.pool.begin().await.map_err(StoreError::Identity)?;

        let updated = sqlx::query(
            r#"
            UPDATE users
            SET twitch_username = $1, twitch_id = $2
            WHERE id = $3
            "#,
        )
        .bind(&identity.login)
        .bind(&identity.id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::Identity)?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::UserNotFound(user_id.to_string()));
        }

        sqlx::query(
            r#"
            INSERT INTO user_tokens (user_id, provider, access_token, refresh_token, expires_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (user_id, provider) DO UPDATE
            SET access_token = EXCLUDED.access_token,
                refresh_token = EXCLUDED.refresh_token,
                expires_at = EXCLUDED.expires_at,
                updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(&token.provider)
        .bind(&token.access_token)
        .bind(&token.refresh_token)
        .bind(token.expires_at)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::Token)?;

        tx.commit().await.map_err(StoreError::Token)?;

        tracing::debug!(user_id, twitch_id = %identity.id, "Twitch account linked");
        Ok(())
    }

    async fn unlink_account(&self, user_id: &str, provider: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE users
            SET twitch_username = NULL, twitch_id = NULL
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::UserNotFound(user_id.to_string()));
        }

        sqlx::query("DELETE FROM user_tokens WHERE user_id = $1 AND provider = $2")
            .bind(user_id)
            .bind(provider)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_connection(
        &self,
        user_id: &str,
        provider: &str,
    ) -> Result<Option<Connection>, StoreError> {
        let connection = sqlx::query_as::<_, Connection>(
            r#"
            SELECT u.twitch_username, u.twitch_id, t.expires_at
            FROM users u
            LEFT JOIN user_tokens t ON t.user_id = u.id AND t.provider = $2
            WHERE u.id = $1
            "#,
        )
        .bind(user_id)
        .bind(provider)
        .fetch_optional(&self.pool)
        .await?;

        Ok(connection)
    }
}
