//! Slack Web API client for the calls the bot consumes: the RTM handshake,
//! identity lookup, user lookup, and reaction add.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use scribe_core::SlackRpc;

use crate::http_helpers::{
    is_retryable_slack_status, is_retryable_transport_error, parse_retry_after, retry_delay,
    truncate_for_error,
};

/// Production Slack Web API endpoint. Tests point at an httpmock server.
pub const DEFAULT_API_BASE: &str = "https://slack.com/api";

#[derive(Debug, Clone, Deserialize)]
struct SlackRtmConnectResponse {
    ok: bool,
    url: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackAuthTestResponse {
    ok: bool,
    user_id: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackUsersInfoResponse {
    ok: bool,
    user: Option<SlackUserInfo>,
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackUserInfo {
    name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackReactionsAddResponse {
    ok: bool,
    error: Option<String>,
}

#[derive(Clone)]
pub struct SlackApiClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

impl SlackApiClient {
    pub fn new(
        api_base: String,
        token: String,
        request_timeout_ms: u64,
        retry_max_attempts: usize,
        retry_base_delay_ms: u64,
    ) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("scribe-bot"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()
            .context("failed to create slack api client")?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.trim().to_string(),
            retry_max_attempts: retry_max_attempts.max(1),
            retry_base_delay_ms: retry_base_delay_ms.max(1),
        })
    }

    /// Opens an RTM session and returns the websocket URL to connect to.
    pub async fn rtm_connect(&self) -> Result<String> {
        let response: SlackRtmConnectResponse = self
            .request_json("rtm.connect", || {
                self.http
                    .post(format!("{}/rtm.connect", self.api_base))
                    .bearer_auth(&self.token)
            })
            .await?;
        if !response.ok {
            bail!(
                "slack rtm.connect failed: {}",
                response
                    .error
                    .unwrap_or_else(|| "unknown error".to_string())
            );
        }
        response
            .url
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| anyhow!("slack rtm.connect did not return url"))
    }

    /// Resolves the bot's own user id via `auth.test`.
    pub async fn resolve_bot_user_id(&self) -> Result<String> {
        let response: SlackAuthTestResponse = self
            .request_json("auth.test", || {
                self.http
                    .post(format!("{}/auth.test", self.api_base))
                    .bearer_auth(&self.token)
            })
            .await?;
        if !response.ok {
            bail!(
                "slack auth.test failed: {}",
                response
                    .error
                    .unwrap_or_else(|| "unknown error".to_string())
            );
        }
        response
            .user_id
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| anyhow!("slack auth.test did not return user_id"))
    }

    async fn request_json<T, F>(&self, operation: &str, mut builder: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = builder()
                .header("x-scribe-retry-attempt", attempt.saturating_sub(1).to_string())
                .send()
                .await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let parsed = response
                            .json::<T>()
                            .await
                            .with_context(|| format!("failed to decode slack {operation}"))?;
                        return Ok(parsed);
                    }

                    let retry_after = parse_retry_after(response.headers());
                    let body = response.text().await.unwrap_or_default();
                    if attempt < self.retry_max_attempts
                        && is_retryable_slack_status(status.as_u16())
                    {
                        tokio::time::sleep(retry_delay(
                            self.retry_base_delay_ms,
                            attempt,
                            retry_after,
                        ))
                        .await;
                        continue;
                    }

                    bail!(
                        "slack api {operation} failed with status {}: {}",
                        status.as_u16(),
                        truncate_for_error(&body, 800)
                    );
                }
                Err(error) => {
                    if attempt < self.retry_max_attempts && is_retryable_transport_error(&error) {
                        tokio::time::sleep(retry_delay(self.retry_base_delay_ms, attempt, None))
                            .await;
                        continue;
                    }
                    return Err(error)
                        .with_context(|| format!("slack api {operation} request failed"));
                }
            }
        }
    }
}

#[async_trait]
impl SlackRpc for SlackApiClient {
    async fn user_display_name(&self, user_id: &str) -> Result<String> {
        let response: SlackUsersInfoResponse = self
            .request_json("users.info", || {
                self.http
                    .get(format!("{}/users.info", self.api_base))
                    .bearer_auth(&self.token)
                    .query(&[("user", user_id)])
            })
            .await?;
        if !response.ok {
            bail!(
                "slack users.info failed for {user_id}: {}",
                response
                    .error
                    .unwrap_or_else(|| "unknown error".to_string())
            );
        }
        response
            .user
            .and_then(|user| user.name)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| anyhow!("slack users.info returned no name for {user_id}"))
    }

    async fn add_reaction(&self, name: &str, channel: &str, timestamp: &str) -> Result<()> {
        let payload = json!({
            "name": name,
            "channel": channel,
            "timestamp": timestamp,
        });
        let response: SlackReactionsAddResponse = self
            .request_json("reactions.add", || {
                self.http
                    .post(format!("{}/reactions.add", self.api_base))
                    .bearer_auth(&self.token)
                    .json(&payload)
            })
            .await?;
        if !response.ok {
            bail!(
                "slack reactions.add failed: {}",
                response
                    .error
                    .unwrap_or_else(|| "unknown error".to_string())
            );
        }
        Ok(())
    }
}
