use reqwest::{StatusCode, Url};

use super::model::{HelixUsers, TokenGrant, TokenResponse, TwitchUser};
use crate::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum TwitchError {
    #[error("request to Twitch failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Twitch responded with {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Status {
        status: StatusCode,
        message: Option<String>,
    },
    #[error("Twitch response is missing `{field}`")]
    MissingField {
        field: &'static str,
        message: Option<String>,
    },
    #[error("Twitch response is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Twitch returned no user for this token")]
    NoIdentity,
    #[error("invalid Twitch url: {0}")]
    Url(String),
}

impl TwitchError {
    /// Twitch 自己给出的错误说明（如 `Invalid authorization code`）
    pub fn provider_message(&self) -> Option<&str> {
        match self {
            TwitchError::Status { message, .. } | TwitchError::MissingField { message, .. } => {
                message.as_deref().filter(|m| !m.is_empty())
            }
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct TwitchClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    auth_url: String,
    api_url: String,
    redirect_uri: String,
    scopes: Vec<String>,
}

impl TwitchClient {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        // 所有外部请求都带超时，避免 Twitch 挂起拖住整个请求
        let http = reqwest::Client::builder()
            .timeout(config.twitch_http_timeout())
            .build()?;

        Ok(Self {
            http,
            client_id: config.twitch_client_id.clone(),
            client_secret: config.twitch_client_secret.clone(),
            auth_url: config.twitch_auth_url.trim_end_matches('/').to_string(),
            api_url: config.twitch_api_url.trim_end_matches('/').to_string(),
            redirect_uri: config.redirect_uri(),
            scopes: config.twitch_scopes.clone(),
        })
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// 构造跳转到 Twitch 的授权地址
    pub fn authorize_url(&self) -> Result<Url, TwitchError> {
        let scope = self.scopes.join(" ");
        Url::parse_with_params(
            &format!("{}/authorize", self.auth_url),
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", scope.as_str()),
            ],
        )
        .map_err(|e| TwitchError::Url(e.to_string()))
    }

    /// 用授权码换取访问令牌，只请求一次，不重试
    pub async fn exchange_code(&self, code: &str) -> Result<TokenGrant, TwitchError> {
        let response = self
            .http
            .post(format!("{}/token", self.auth_url))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let parsed = serde_json::from_str::<TokenResponse>(&body);

        if !status.is_success() {
            return Err(TwitchError::Status {
                status,
                message: parsed.ok().and_then(|b| b.message),
            });
        }

        let token = parsed?;
        let Some(access_token) = token.access_token.filter(|t| !t.is_empty()) else {
            return Err(TwitchError::MissingField {
                field: "access_token",
                message: token.message,
            });
        };
        let Some(expires_in) = token.expires_in else {
            return Err(TwitchError::MissingField {
                field: "expires_in",
                message: token.message,
            });
        };

        Ok(TokenGrant {
            access_token,
            refresh_token: token.refresh_token,
            expires_in,
        })
    }

    /// 查询令牌所属的 Twitch 用户，空列表视为失败
    pub async fn fetch_identity(&self, access_token: &str) -> Result<TwitchUser, TwitchError> {
        let response = self
            .http
            .get(format!("{}/users", self.api_url))
            .bearer_auth(access_token)
            .header("Client-Id", &self.client_id)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|v| v["message"].as_str().map(str::to_string));
            return Err(TwitchError::Status { status, message });
        }

        let users: HelixUsers = serde_json::from_str(&response.text().await?)?;
        users.data.into_iter().next().ok_or(TwitchError::NoIdentity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_TWITCH_SCOPES, split_scopes};
    use mockito::Matcher;

    fn client_for(server_url: &str) -> TwitchClient {
        let config = Config {
            database_url: String::new(),
            redis_url: String::new(),
            jwt_secret: "secret".into(),
            jwt_expiration_secs: 3600,
            server_host: "127.0.0.1".into(),
            server_port: 0,
            app_url: "http://localhost:3000".into(),
            twitch_client_id: "cid".into(),
            twitch_client_secret: "csecret".into(),
            twitch_auth_url: format!("{server_url}/oauth2"),
            twitch_api_url: format!("{server_url}/helix"),
            twitch_scopes: split_scopes(DEFAULT_TWITCH_SCOPES),
            twitch_http_timeout_secs: 5,
            rate_limit_window_secs: 60,
            rate_limit_requests: 30,
            trust_proxy_headers: false,
        };
        TwitchClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn exchange_code_posts_form_and_parses_grant() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/oauth2/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("client_id".into(), "cid".into()),
                Matcher::UrlEncoded("client_secret".into(), "csecret".into()),
                Matcher::UrlEncoded("code".into(), "abc123".into()),
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                Matcher::UrlEncoded(
                    "redirect_uri".into(),
                    "http://localhost:3000/api/twitch/auth".into(),
                ),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "access_token": "tok",
                    "refresh_token": "ref",
                    "expires_in": 3600,
                    "scope": ["user:read:email"],
                    "token_type": "bearer"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let grant = client_for(&server.url())
            .exchange_code("abc123")
            .await
            .unwrap();

        assert_eq!(grant.access_token, "tok");
        assert_eq!(grant.refresh_token.as_deref(), Some("ref"));
        assert_eq!(grant.expires_in, 3600);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn exchange_code_keeps_provider_message_on_rejection() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/oauth2/token")
            .with_status(400)
            .with_body(r#"{"status":400,"message":"Invalid authorization code"}"#)
            .create_async()
            .await;

        let err = client_for(&server.url())
            .exchange_code("bad")
            .await
            .unwrap_err();

        assert!(matches!(err, TwitchError::Status { status, .. } if status == StatusCode::BAD_REQUEST));
        assert_eq!(err.provider_message(), Some("Invalid authorization code"));
    }

    #[tokio::test]
    async fn exchange_code_without_access_token_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/oauth2/token")
            .with_status(200)
            .with_body(r#"{"refresh_token":"ref","expires_in":3600}"#)
            .create_async()
            .await;

        let err = client_for(&server.url())
            .exchange_code("abc123")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TwitchError::MissingField {
                field: "access_token",
                ..
            }
        ));
        assert_eq!(err.provider_message(), None);
    }

    #[tokio::test]
    async fn exchange_code_rejects_non_json_success_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/oauth2/token")
            .with_status(200)
            .with_body("<html>oops</html>")
            .create_async()
            .await;

        let err = client_for(&server.url())
            .exchange_code("abc123")
            .await
            .unwrap_err();
        assert!(matches!(err, TwitchError::Malformed(_)));
    }

    #[tokio::test]
    async fn fetch_identity_sends_bearer_and_client_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/helix/users")
            .match_header("authorization", "Bearer tok")
            .match_header("client-id", "cid")
            .with_status(200)
            .with_body(
                r#"{"data":[{"id":"999","login":"streamer1","display_name":"Streamer1"}]}"#,
            )
            .create_async()
            .await;

        let user = client_for(&server.url())
            .fetch_identity("tok")
            .await
            .unwrap();

        assert_eq!(user.login, "streamer1");
        assert_eq!(user.id, "999");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn fetch_identity_with_empty_list_fails() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/helix/users")
            .with_status(200)
            .with_body(r#"{"data":[]}"#)
            .create_async()
            .await;

        let err = client_for(&server.url())
            .fetch_identity("tok")
            .await
            .unwrap_err();
        assert!(matches!(err, TwitchError::NoIdentity));
    }

    #[tokio::test]
    async fn fetch_identity_unauthorized_is_status_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/helix/users")
            .with_status(401)
            .with_body(r#"{"error":"Unauthorized","status":401,"message":"Invalid OAuth token"}"#)
            .create_async()
            .await;

        let err = client_for(&server.url())
            .fetch_identity("tok")
            .await
            .unwrap_err();
        assert_eq!(err.provider_message(), Some("Invalid OAuth token"));
    }

    #[test]
    fn authorize_url_carries_redirect_and_scopes() {
        let client = client_for("https://id.example.com");
        let url = client.authorize_url().unwrap();

        assert_eq!(url.path(), "/oauth2/authorize");
        let params: std::collections::HashMap<_, _> = url.query_pairs().collect();
        assert_eq!(params["client_id"], "cid");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["redirect_uri"], client.redirect_uri());
        assert_eq!(
            params["scope"],
            "user:read:email channel:read:subscriptions moderator:read:followers"
        );
    }
}
