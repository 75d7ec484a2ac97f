//! Twitch 账号关联流程
//!
//! 顺序固定：校验 code → 确认会话 → 换取令牌 → 查询身份 → 写入身份与令牌。
//! 每一步都只执行一次，失败即终止，不做重试。

use chrono::{DateTime, TimeDelta, Utc};

use crate::store::{LinkStore, NewUserToken, StoreError};
use crate::twitch::{TWITCH_PROVIDER, TwitchClient};

const TOKEN_EXCHANGE_FAILED: &str = "Failed to exchange code for token";

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("No code provided")]
    MissingCode,
    #[error("Not authenticated")]
    Unauthenticated,
    /// message 为 Twitch 返回的说明，没有时使用默认文案
    #[error("{message}")]
    TokenExchange { message: String },
    #[error("Failed to get user data from Twitch")]
    IdentityFetch { reason: String },
    #[error("Failed to update user data")]
    IdentityPersist { reason: String },
    #[error("Failed to store token data")]
    TokenPersist { reason: String },
}

impl From<StoreError> for LinkError {
    fn from(err: StoreError) -> Self {
        let reason = err.to_string();
        match err {
            StoreError::Token(_) => LinkError::TokenPersist { reason },
            StoreError::UserNotFound(_) | StoreError::Identity(_) | StoreError::Database(_) => {
                LinkError::IdentityPersist { reason }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct LinkedAccount {
    pub user_id: String,
    pub twitch_login: String,
    pub twitch_id: String,
    pub expires_at: DateTime<Utc>,
}

pub async fn link_twitch_account(
    store: &dyn LinkStore,
    twitch: &TwitchClient,
    code: Option<&str>,
    session_user_id: Option<&str>,
) -> Result<LinkedAccount, LinkError> {
    // 只用 trim 判断是否为空，发给 Twitch 的 code 保持原样
    let code = code
        .filter(|c| !c.trim().is_empty())
        .ok_or(LinkError::MissingCode)?;

    // 会话检查放在网络请求之前，未登录的请求不会触达 Twitch
    let user_id = session_user_id
        .filter(|id| !id.is_empty())
        .ok_or(LinkError::Unauthenticated)?;

    let grant = twitch.exchange_code(code).await.map_err(|e| {
        tracing::warn!(error = %e, "Twitch token exchange failed");
        LinkError::TokenExchange {
            message: e
                .provider_message()
                .unwrap_or(TOKEN_EXCHANGE_FAILED)
                .to_string(),
        }
    })?;

    let expires_at = TimeDelta::try_seconds(grant.expires_in)
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
        .ok_or_else(|| LinkError::TokenExchange {
            message: TOKEN_EXCHANGE_FAILED.to_string(),
        })?;

    let identity = twitch
        .fetch_identity(&grant.access_token)
        .await
        .map_err(|e| LinkError::IdentityFetch {
            reason: e.to_string(),
        })?;

    let token = NewUserToken {
        provider: TWITCH_PROVIDER.to_string(),
        access_token: grant.access_token,
        refresh_token: grant.refresh_token,
        expires_at,
    };
    store.link_account(user_id, &identity, &token).await?;

    tracing::info!(user_id, twitch_login = %identity.login, "Twitch account connected");

    Ok(LinkedAccount {
        user_id: user_id.to_string(),
        twitch_login: identity.login,
        twitch_id: identity.id,
        expires_at,
    })
}
