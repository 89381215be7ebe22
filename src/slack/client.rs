//! Slack chat adapter: bot API with threading, or an incoming webhook.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use slack_morphism::errors::SlackClientError;
use slack_morphism::prelude::{
    SlackApiChatPostMessageRequest, SlackApiChatUpdateRequest, SlackApiToken, SlackApiTokenType,
    SlackApiTokenValue, SlackChannelId, SlackClient, SlackClientHyperHttpsConnector,
    SlackMessageContent, SlackTs,
};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::SlackConfig;
use crate::gateway::{ChatGateway, GatewayFuture};
use crate::models::thread::ChatThreadRef;
use crate::{AppError, Result};

const MAX_ATTEMPTS: u32 = 4;
const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(1);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

type HyperClient = SlackClient<SlackClientHyperHttpsConnector>;

enum Transport {
    Bot {
        client: Arc<HyperClient>,
        token: SlackApiToken,
        channel: SlackChannelId,
    },
    Webhook {
        http: reqwest::Client,
        url: String,
    },
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
}

/// Notification channel for ticket threads.
pub struct SlackChat {
    transport: Transport,
    timeout: Duration,
}

fn content(text: &str) -> SlackMessageContent {
    SlackMessageContent {
        text: Some(text.to_owned()),
        markdown_text: None,
        blocks: None,
        attachments: None,
        upload: None,
        files: None,
        reactions: None,
        metadata: None,
    }
}

fn post_request(
    channel: SlackChannelId,
    text: &str,
    thread_ts: Option<SlackTs>,
) -> SlackApiChatPostMessageRequest {
    SlackApiChatPostMessageRequest {
        channel,
        content: content(text),
        as_user: None,
        icon_emoji: None,
        icon_url: None,
        link_names: Some(true),
        parse: None,
        thread_ts,
        username: None,
        reply_broadcast: None,
        unfurl_links: None,
        unfurl_media: None,
    }
}

impl SlackChat {
    /// Build the adapter from config.
    ///
    /// A bot token plus channel enables threaded posting; otherwise a
    /// webhook URL enables top-level posts only. Returns `None` when chat
    /// is not configured at all.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` if the HTTPS connector cannot be created.
    pub fn from_config(config: &SlackConfig, timeout: Duration) -> Result<Option<Self>> {
        if !config.bot_token.is_empty() && !config.channel_id.is_empty() {
            let connector = SlackClientHyperHttpsConnector::new()
                .map_err(|err| AppError::Slack(format!("failed to init slack connector: {err}")))?;
            let token = SlackApiToken {
                token_value: SlackApiTokenValue(config.bot_token.clone()),
                cookie: None,
                team_id: None,
                scope: None,
                token_type: Some(SlackApiTokenType::Bot),
            };
            info!(channel = %config.channel_id, "slack bot transport enabled");
            return Ok(Some(Self {
                transport: Transport::Bot {
                    client: Arc::new(SlackClient::new(connector)),
                    token,
                    channel: SlackChannelId(config.channel_id.clone()),
                },
                timeout,
            }));
        }

        if !config.webhook_url.is_empty() {
            let http = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|err| AppError::Slack(format!("failed to build webhook client: {err}")))?;
            info!("slack webhook transport enabled, threads disabled");
            return Ok(Some(Self {
                transport: Transport::Webhook {
                    http,
                    url: config.webhook_url.clone(),
                },
                timeout,
            }));
        }

        debug!("slack not configured");
        Ok(None)
    }

    /// Run a Slack API call, backing off on rate limits and transient
    /// failures.
    async fn with_retry<T, F, Fut>(&self, what: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, SlackClientError>>,
    {
        let mut backoff = INITIAL_RETRY_DELAY;
        let mut attempt = 1;
        loop {
            let error = match tokio::time::timeout(self.timeout, call()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(error)) => error,
                Err(_) => {
                    return Err(AppError::Slack(format!(
                        "{what} timed out after {}s",
                        self.timeout.as_secs()
                    )))
                }
            };
            let delay = match &error {
                SlackClientError::RateLimitError(rate) => rate.retry_after.unwrap_or(backoff),
                SlackClientError::ApiError(_) => {
                    return Err(AppError::Slack(format!("{what} failed: {error}")))
                }
                _ => backoff,
            };
            if attempt >= MAX_ATTEMPTS {
                return Err(AppError::Slack(format!(
                    "{what} failed after {attempt} attempts: {error}"
                )));
            }
            warn!(?error, delay = ?delay, attempt, "{what} failed; retrying");
            sleep(delay).await;
            backoff = (backoff * 2).min(MAX_RETRY_DELAY);
            attempt += 1;
        }
    }

    async fn post_bot(
        &self,
        client: &HyperClient,
        token: &SlackApiToken,
        request: SlackApiChatPostMessageRequest,
    ) -> Result<ChatThreadRef> {
        let session = client.open_session(token);
        let response = self
            .with_retry("chat.postMessage", || session.chat_post_message(&request))
            .await?;
        Ok(ChatThreadRef::new(response.channel.0, response.ts.0))
    }

    async fn post_webhook(&self, http: &reqwest::Client, url: &str, text: &str) -> Result<()> {
        let response = http
            .post(url)
            .json(&WebhookPayload { text })
            .send()
            .await
            .map_err(|err| AppError::Slack(format!("webhook post failed: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Slack(format!("webhook returned http {status}")));
        }
        Ok(())
    }
}

impl ChatGateway for SlackChat {
    fn post_new<'a>(&'a self, text: &'a str) -> GatewayFuture<'a, Option<ChatThreadRef>> {
        Box::pin(async move {
            match &self.transport {
                Transport::Bot {
                    client,
                    token,
                    channel,
                } => {
                    let request = post_request(channel.clone(), text, None);
                    let thread = self.post_bot(client, token, request).await?;
                    debug!(ts = %thread.ts, "posted ticket head message");
                    Ok(Some(thread))
                }
                Transport::Webhook { http, url } => {
                    self.post_webhook(http, url, text).await?;
                    Ok(None)
                }
            }
        })
    }

    fn post_to_thread<'a>(
        &'a self,
        thread: &'a ChatThreadRef,
        text: &'a str,
    ) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            match &self.transport {
                Transport::Bot { client, token, .. } => {
                    let request = post_request(
                        SlackChannelId(thread.channel.clone()),
                        text,
                        Some(SlackTs(thread.ts.clone())),
                    );
                    self.post_bot(client, token, request).await?;
                    Ok(())
                }
                Transport::Webhook { .. } => {
                    debug!("webhook transport cannot reply in threads");
                    Ok(())
                }
            }
        })
    }

    fn update_message<'a>(
        &'a self,
        thread: &'a ChatThreadRef,
        text: &'a str,
    ) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            match &self.transport {
                Transport::Bot { client, token, .. } => {
                    let request = SlackApiChatUpdateRequest::new(
                        SlackChannelId(thread.channel.clone()),
                        content(text),
                        SlackTs(thread.ts.clone()),
                    );
                    let session = client.open_session(token);
                    self.with_retry("chat.update", || session.chat_update(&request))
                        .await?;
                    Ok(())
                }
                Transport::Webhook { .. } => {
                    debug!("webhook transport cannot edit messages");
                    Ok(())
                }
            }
        })
    }
}
