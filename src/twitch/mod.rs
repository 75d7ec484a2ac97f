// Twitch 开放平台客户端
// 包含授权跳转、令牌换取和用户信息查询

mod client;
mod model;

pub use client::{TwitchClient, TwitchError};
pub use model::{HelixUsers, TokenGrant, TokenResponse, TwitchUser};

/// user_tokens 表中的 provider 取值
pub const TWITCH_PROVIDER: &str = "twitch";
