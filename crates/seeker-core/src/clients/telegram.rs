//! Telegram Bot API notifier.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::ConversationId;
use crate::domain::messages::truncate_chars;
use crate::error::ClientError;
use crate::ports::Notifier;

/// Telegram message size limit, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a ConversationId,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
}

pub struct TelegramNotifier {
    bot_token: Secret<String>,
    base_url: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(
        bot_token: Secret<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            bot_token,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    async fn send(
        &self,
        destination: &ConversationId,
        text: &str,
        parse_mode: Option<&'static str>,
    ) -> Result<(), ClientError> {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.base_url,
            self.bot_token.expose_secret()
        );

        let http_resp = self
            .client
            .post(&url)
            .json(&SendMessage {
                chat_id: destination,
                text,
                parse_mode,
            })
            .send()
            .await
            // the URL embeds the token; keep it out of error messages
            .map_err(|e| ClientError::Http(e.without_url()))?;

        let status = http_resp.status();
        if !status.is_success() {
            let body = http_resp.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Telegram rejected the markup rather than the message.
fn is_markup_error(err: &ClientError) -> bool {
    matches!(
        err,
        ClientError::Status { status: 400, body } if body.contains("can't parse entities")
    )
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, destination: &ConversationId, text: &str) -> Result<(), ClientError> {
        let text = truncate_chars(text, MAX_MESSAGE_CHARS);

        let result = match self.send(destination, text, Some("Markdown")).await {
            Err(e) if is_markup_error(&e) => {
                warn!(error = %e, %destination, "markdown send failed, retrying as plain text");
                self.send(destination, text, None).await
            }
            other => other,
        };

        match &result {
            Ok(()) => debug!(%destination, "message sent"),
            Err(e) => warn!(error = %e, %destination, "telegram API error"),
        }
        result
    }
}
