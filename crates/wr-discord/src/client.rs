//! Discord REST client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};
use wr_core::{Attachment, ChannelId, ChatClient, ChatError, DiscordConfig, Embed, UserId};

use crate::error::DiscordError;
use crate::model::{
    AttachmentPayload, ChannelResponse, CreateDm, CreateMessage, EmbedPayload, RateLimitResponse,
};

/// How many times a rate-limited request is retried.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Longest wait we accept from a rate-limit response.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Sends messages through the Discord HTTP API.
///
/// Cloning is cheap; clones share one connection pool.
#[derive(Clone)]
pub struct DiscordClient {
    http: reqwest::Client,
    api_base: String,
    authorization: String,
}

impl std::fmt::Debug for DiscordClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordClient")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl DiscordClient {
    /// Creates a client authenticated as the configured bot.
    pub fn new(config: &DiscordConfig) -> Result<Self, DiscordError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("watch-relay/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_owned(),
            authorization: format!("Bot {}", config.token),
        })
    }

    /// Posts a JSON message body to `channel`.
    pub async fn create_message(
        &self,
        channel: &ChannelId,
        body: &CreateMessage<'_>,
    ) -> Result<(), DiscordError> {
        let url = self.url(&format!("/channels/{channel}/messages"));
        self.send(|| self.http.post(&url).json(body)).await?;
        Ok(())
    }

    /// Uploads one file to `channel` with `content` as the message text.
    pub async fn upload(
        &self,
        channel: &ChannelId,
        content: &str,
        attachment: &Attachment,
    ) -> Result<(), DiscordError> {
        let url = self.url(&format!("/channels/{channel}/messages"));
        let payload = serde_json::to_string(&CreateMessage {
            content: Some(content),
            attachments: vec![AttachmentPayload {
                id: 0,
                filename: &attachment.name,
            }],
            ..CreateMessage::default()
        })?;

        // Multipart forms are consumed by sending, so each attempt builds its own.
        self.send(|| {
            let file = Part::bytes(attachment.bytes.clone()).file_name(attachment.name.clone());
            let form = Form::new()
                .text("payload_json", payload.clone())
                .part("files[0]", file);
            self.http.post(&url).multipart(form)
        })
        .await?;
        Ok(())
    }

    /// Opens the DM channel with `user`.
    pub async fn create_dm(&self, user: &UserId) -> Result<ChannelId, DiscordError> {
        let url = self.url("/users/@me/channels");
        let body = CreateDm {
            recipient_id: user.as_str(),
        };
        let response = self.send(|| self.http.post(&url).json(&body)).await?;
        let channel: ChannelResponse = serde_json::from_slice(&response.bytes().await?)?;
        Ok(channel.id)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_base)
    }

    /// Sends the request built by `build`, retrying while rate limited.
    async fn send<F>(&self, build: F) -> Result<Response, DiscordError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            let response = build()
                .header(reqwest::header::AUTHORIZATION, &self.authorization)
                .send()
                .await?;
            let status = response.status();

            if status.is_success() {
                return Ok(response);
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = retry_after(response).await;
                if attempt < MAX_RATE_LIMIT_RETRIES && retry_after <= MAX_RETRY_AFTER {
                    attempt += 1;
                    debug!(attempt, wait_ms = retry_after.as_millis(), "rate limited, retrying");
                    tokio::time::sleep(retry_after).await;
                    continue;
                }
                warn!(attempt, "rate limited, giving up");
                return Err(DiscordError::RateLimited {
                    retry_after_secs: retry_after.as_secs_f64(),
                });
            }

            let body = response.text().await.unwrap_or_default();
            return Err(DiscordError::Status {
                status: status.as_u16(),
                body,
            });
        }
    }
}

async fn retry_after(response: Response) -> Duration {
    let header = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<f64>().ok());
    let body = response
        .bytes()
        .await
        .ok()
        .and_then(|b| serde_json::from_slice::<RateLimitResponse>(&b).ok())
        .map(|r| r.retry_after);

    body.or(header)
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| secs.min(3600.0))
        .map_or(Duration::from_secs(1), Duration::from_secs_f64)
}

#[async_trait]
impl ChatClient for DiscordClient {
    async fn send_embed(&self, channel: &ChannelId, embed: &Embed) -> Result<(), ChatError> {
        let body = CreateMessage {
            embeds: vec![EmbedPayload::from(embed)],
            ..CreateMessage::default()
        };
        Ok(self.create_message(channel, &body).await?)
    }

    async fn send_file(
        &self,
        channel: &ChannelId,
        content: &str,
        attachment: &Attachment,
    ) -> Result<(), ChatError> {
        Ok(self.upload(channel, content, attachment).await?)
    }

    async fn send_text(&self, channel: &ChannelId, text: &str) -> Result<(), ChatError> {
        let body = CreateMessage {
            content: Some(text),
            ..CreateMessage::default()
        };
        Ok(self.create_message(channel, &body).await?)
    }

    async fn open_direct_channel(&self, user: &UserId) -> Result<ChannelId, ChatError> {
        Ok(self.create_dm(user).await?)
    }
}
