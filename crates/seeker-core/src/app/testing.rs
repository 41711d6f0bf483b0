//! Recording stubs for the ports, shared by the app-layer tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{ConversationId, FileItem, Translation};
use crate::error::{ClientError, QueueError};
use crate::ports::{Notifier, SearchProvider, Translator};
use crate::queue::{Broker, QueueConnection};

pub struct StubTranslator {
    reply: Translation,
    delay: Option<Duration>,
    pub calls: Mutex<Vec<String>>,
}

impl StubTranslator {
    pub fn new(reply: Translation) -> Self {
        Self {
            reply,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn query(q: &str) -> Self {
        Self::new(Translation::Query(q.to_string()))
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Translator for StubTranslator {
    async fn translate(&self, request: &str) -> Translation {
        self.calls.lock().unwrap().push(request.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.clone()
    }
}

/// Panics on every call; the consumer must survive it.
pub struct PanickingTranslator;

#[async_trait]
impl Translator for PanickingTranslator {
    async fn translate(&self, _request: &str) -> Translation {
        panic!("translator blew up");
    }
}

pub struct StubSearch {
    result: Result<Vec<FileItem>, String>,
    pub calls: Mutex<Vec<(String, Option<String>)>>,
}

impl StubSearch {
    pub fn returning(items: Vec<FileItem>) -> Self {
        Self {
            result: Ok(items),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(detail: &str) -> Self {
        Self {
            result: Err(detail.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, Option<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for StubSearch {
    async fn search(
        &self,
        predicate: &str,
        scope: Option<&str>,
    ) -> Result<Vec<FileItem>, ClientError> {
        self.calls
            .lock()
            .unwrap()
            .push((predicate.to_string(), scope.map(str::to_string)));
        self.result.clone().map_err(|detail| ClientError::Status {
            status: 500,
            body: detail,
        })
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    fail: bool,
    pub sent: Mutex<Vec<(ConversationId, String)>>,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<(ConversationId, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|(_, text)| text).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, destination: &ConversationId, text: &str) -> Result<(), ClientError> {
        self.sent
            .lock()
            .unwrap()
            .push((destination.clone(), text.to_string()));
        if self.fail {
            return Err(ClientError::Response("notifier down".to_string()));
        }
        Ok(())
    }
}

/// A broker whose host never answers: every connect hangs.
pub struct UnreachableBroker;

#[async_trait]
impl Broker for UnreachableBroker {
    async fn connect(&self) -> Result<Box<dyn QueueConnection>, QueueError> {
        std::future::pending().await
    }

    fn queue_name(&self) -> &str {
        "tasks"
    }
}
