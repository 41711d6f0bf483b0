//! Gemini `generateContent` translator.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use tracing::{debug, trace, warn};

use super::prompt::PromptTemplate;
use crate::domain::Translation;
use crate::error::ClientError;
use crate::ports::Translator;

pub struct GeminiTranslator {
    api_key: Secret<String>,
    model: String,
    base_url: String,
    template: PromptTemplate,
    client: reqwest::Client,
}

impl GeminiTranslator {
    pub fn new(
        api_key: Secret<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            api_key,
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            template: PromptTemplate::default(),
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    async fn generate(&self, prompt: &str) -> Result<String, ClientError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": 0.0 },
        });

        let http_resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = http_resp.status();
        if !status.is_success() {
            let body = http_resp.text().await.unwrap_or_default();
            warn!(%status, %body, "gemini API error");
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let resp = http_resp.json::<serde_json::Value>().await?;
        trace!(response = %resp, "gemini raw response");

        let parts = resp["candidates"][0]["content"]["parts"]
            .as_array()
            .ok_or_else(|| ClientError::Response("no candidates in model response".into()))?;

        Ok(parts
            .iter()
            .filter_map(|part| part["text"].as_str())
            .collect())
    }
}

#[async_trait]
impl Translator for GeminiTranslator {
    async fn translate(&self, request: &str) -> Translation {
        debug!(model = %self.model, "translating request");
        match self.generate(&self.template.render(request)).await {
            Ok(raw) => Translation::from_model_output(&raw),
            Err(e) => Translation::failed(e.to_string()),
        }
    }
}
