//! Pipeline - 1 メッセージ分の状態機械（translate → search → notify）
//!
//! Every stage failure becomes a user-facing message; nothing propagates out of
//! [`Pipeline::run`]. The final notification is attempted exactly once.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::domain::messages::{self, NOT_UNDERSTOOD, PROCESSING_ERROR, SEARCHING};
use crate::domain::{
    ConversationId, FileItem, Outcome, PipelineReport, PipelineState, Translation,
};
use crate::error::ClientError;
use crate::ports::{Notifier, SearchProvider, Translator};

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Collection the search is restricted to, if any.
    pub scope: Option<String>,

    /// Maximum number of result lines in the final message.
    pub page_size: usize,

    /// Send a "searching" notice before the search call.
    pub interim_notice: bool,

    /// Upper bound for each external call, on top of the clients' own timeouts.
    pub stage_timeout: Option<Duration>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            scope: None,
            page_size: 10,
            interim_notice: true,
            stage_timeout: None,
        }
    }
}

pub struct Pipeline {
    translator: Arc<dyn Translator>,
    search: Arc<dyn SearchProvider>,
    notifier: Arc<dyn Notifier>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        translator: Arc<dyn Translator>,
        search: Arc<dyn SearchProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            translator,
            search,
            notifier,
            settings: PipelineSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run one request to its terminal state.
    pub async fn run(&self, destination: &ConversationId, request: &str) -> PipelineReport {
        let mut path = vec![PipelineState::Received, PipelineState::Translating];

        let (outcome, reply) = match self.translate(request).await {
            Translation::Failed(detail) => {
                warn!(error = %detail, "translation failed");
                path.push(PipelineState::TranslationFailed);
                (Outcome::TranslationFailed, PROCESSING_ERROR.to_string())
            }
            Translation::Invalid => {
                info!("request is not a file search");
                path.push(PipelineState::TranslationInvalid);
                (Outcome::NotUnderstood, NOT_UNDERSTOOD.to_string())
            }
            Translation::Query(predicate) => {
                path.push(PipelineState::Translated);
                debug!(%predicate, "translated request");

                if self.settings.interim_notice {
                    // best-effort; the outcome does not depend on it
                    self.deliver(destination, SEARCHING).await;
                }

                path.push(PipelineState::Searching);
                match self.search(&predicate).await {
                    Err(e) => {
                        warn!(error = %e, "search failed");
                        path.push(PipelineState::SearchFailed);
                        (Outcome::SearchFailed, messages::search_failed(&e.to_string()))
                    }
                    Ok(items) => {
                        path.push(PipelineState::ResultsReady);
                        let count = items.len().min(self.settings.page_size);
                        let outcome = if count == 0 {
                            Outcome::NothingFound
                        } else {
                            Outcome::Results { count }
                        };
                        (outcome, messages::format_results(&items, self.settings.page_size))
                    }
                }
            }
        };

        debug_assert!(path.last().is_some_and(|state| state.is_outcome()));
        let delivered = self.deliver(destination, &reply).await;
        path.push(PipelineState::Notified);

        let report = PipelineReport {
            path,
            outcome,
            delivered,
        };
        debug_assert!(report.final_state().is_some_and(PipelineState::is_terminal));
        report
    }

    async fn translate(&self, request: &str) -> Translation {
        match self.bounded(self.translator.translate(request)).await {
            Some(translation) => translation,
            None => Translation::failed(format!(
                "translator timed out after {:?}",
                self.settings.stage_timeout.unwrap_or_default()
            )),
        }
    }

    async fn search(&self, predicate: &str) -> Result<Vec<FileItem>, ClientError> {
        let scope = self.settings.scope.as_deref();
        match self.bounded(self.search.search(predicate, scope)).await {
            Some(result) => result,
            None => Err(ClientError::Timeout(
                self.settings.stage_timeout.unwrap_or_default(),
            )),
        }
    }

    /// Returns whether the notifier accepted the message. Failures are logged only.
    async fn deliver(&self, destination: &ConversationId, text: &str) -> bool {
        let result = match self.bounded(self.notifier.notify(destination, text)).await {
            Some(result) => result,
            None => Err(ClientError::Timeout(
                self.settings.stage_timeout.unwrap_or_default(),
            )),
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, %destination, "notification failed");
                false
            }
        }
    }

    async fn bounded<T>(&self, call: impl Future<Output = T>) -> Option<T> {
        match self.settings.stage_timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.ok(),
            None => Some(call.await),
        }
    }
}
