use reqwest::{Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use huddle_types::api::{ChatRef, SearchHit};
use huddle_types::models::{Channel, Message, ReactionMap, UserProfile};

use crate::error::ClientError;

/// Extra attempts after the first, for read operations only. Mutations are
/// never auto-retried: a duplicate send is worse than a surfaced error.
const READ_RETRIES: u32 = 2;

/// Typed access to the chat HTTP API with the client-side retry policy
/// baked in.
pub struct ChatApi {
    base: String,
    token: String,
    http: reqwest::Client,
}

impl ChatApi {
    pub fn new(base: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            token: token.into(),
            http: reqwest::Client::new(),
        }
    }

    /// WebSocket endpoint for the push channel, token attached at upgrade.
    pub fn gateway_url(&self) -> String {
        let ws_base = if let Some(rest) = self.base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.base.clone()
        };
        format!("{ws_base}/gateway?token={}", self.token)
    }

    // -- Reads (retried) --

    pub async fn list_messages(&self, context: &ChatRef) -> Result<Vec<Message>, ClientError> {
        self.get_with_retry(&format!(
            "/conversations/{}/{}/messages",
            context.kind.as_str(),
            context.id
        ))
        .await
    }

    pub async fn unread_channel_ids(&self) -> Result<Vec<String>, ClientError> {
        self.get_with_retry("/reads/unread").await
    }

    /// Named channels the caller belongs to, for sidebar navigation.
    pub async fn list_channels(&self) -> Result<Vec<Channel>, ClientError> {
        self.get_with_retry("/channels").await
    }

    /// Every other user, the navigation source for starting DMs.
    pub async fn list_users(&self) -> Result<Vec<UserProfile>, ClientError> {
        self.get_with_retry("/users").await
    }

    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ClientError> {
        let mut attempt = 0;
        loop {
            let result = async {
                let resp = self
                    .http
                    .get(format!("{}/search", self.base))
                    .query(&[("q", query)])
                    .bearer_auth(&self.token)
                    .send()
                    .await?;
                decode(resp).await
            }
            .await;

            match result {
                Err(e) if should_retry(&e, attempt) => {
                    attempt += 1;
                    debug!("retrying search (attempt {}): {}", attempt + 1, e);
                }
                other => return other,
            }
        }
    }

    // -- Mutations (never retried) --

    pub async fn create_channel(&self, name: &str) -> Result<Channel, ClientError> {
        self.post_json("/channels", &serde_json::json!({ "name": name }))
            .await
    }

    pub async fn post_message(
        &self,
        context: &ChatRef,
        text: &str,
    ) -> Result<Message, ClientError> {
        self.post_json(
            &format!(
                "/conversations/{}/{}/messages",
                context.kind.as_str(),
                context.id
            ),
            &serde_json::json!({ "text": text }),
        )
        .await
    }

    pub async fn toggle_reaction(
        &self,
        message_id: &str,
        emoji: &str,
    ) -> Result<ReactionMap, ClientError> {
        self.post_json(
            &format!("/messages/{message_id}/reactions"),
            &serde_json::json!({ "emoji": emoji }),
        )
        .await
    }

    pub async fn send_typing(&self, context: &ChatRef) -> Result<(), ClientError> {
        let _: serde_json::Value = self
            .post_json(
                &format!(
                    "/conversations/{}/{}/typing",
                    context.kind.as_str(),
                    context.id
                ),
                &serde_json::json!({}),
            )
            .await?;
        Ok(())
    }

    pub async fn mark_read(&self, channel_id: &str) -> Result<(), ClientError> {
        let _: serde_json::Value = self
            .post_json(&format!("/reads/{channel_id}"), &serde_json::json!({}))
            .await?;
        Ok(())
    }

    // -- Plumbing --

    async fn get_with_retry<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let mut attempt = 0;
        loop {
            match self.get_once(path).await {
                Err(e) if should_retry(&e, attempt) => {
                    attempt += 1;
                    debug!("retrying GET {} (attempt {}): {}", path, attempt + 1, e);
                }
                other => return other,
            }
        }
    }

    async fn get_once<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let resp = self
            .http
            .get(format!("{}{}", self.base, path))
            .bearer_auth(&self.token)
            .send()
            .await?;
        decode(resp).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let resp = self
            .http
            .post(format!("{}{}", self.base, path))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        decode(resp).await
    }
}

/// Whether a failed *read* attempt gets another try. Reads are the only
/// callers; mutations surface their first error untouched.
fn should_retry(e: &ClientError, attempts_used: u32) -> bool {
    e.is_transient() && attempts_used < READ_RETRIES
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json().await?);
    }

    Err(match status {
        StatusCode::UNAUTHORIZED => ClientError::Unauthorized,
        StatusCode::FORBIDDEN => ClientError::Forbidden,
        StatusCode::NOT_FOUND => ClientError::NotFound,
        other => ClientError::Rejected {
            status: other.as_u16(),
            message: resp.text().await.unwrap_or_default(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(status: u16) -> ClientError {
        ClientError::Rejected {
            status,
            message: String::new(),
        }
    }

    #[test]
    fn only_server_side_failures_are_transient() {
        assert!(rejected(500).is_transient());
        assert!(rejected(503).is_transient());

        assert!(!rejected(400).is_transient());
        assert!(!rejected(404).is_transient());
        assert!(!rejected(429).is_transient());
        assert!(!ClientError::Unauthorized.is_transient());
        assert!(!ClientError::Forbidden.is_transient());
        assert!(!ClientError::NotFound.is_transient());
    }

    #[test]
    fn reads_retry_twice_then_give_up() {
        let err = rejected(503);
        assert!(should_retry(&err, 0));
        assert!(should_retry(&err, 1));
        assert!(!should_retry(&err, 2));
    }

    #[test]
    fn any_denial_stops_a_read_immediately() {
        assert!(!should_retry(&ClientError::Forbidden, 0));
        assert!(!should_retry(&ClientError::Unauthorized, 0));
        assert!(!should_retry(&rejected(404), 0));
    }

    #[test]
    fn gateway_url_swaps_scheme_and_carries_the_token() {
        let api = ChatApi::new("http://chat.local:3000/", "tok");
        assert_eq!(api.gateway_url(), "ws://chat.local:3000/gateway?token=tok");

        let tls = ChatApi::new("https://chat.local", "tok");
        assert_eq!(tls.gateway_url(), "wss://chat.local/gateway?token=tok");
    }
}
