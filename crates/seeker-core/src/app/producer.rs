//! Producer - envelope を durable queue に投入する
//!
//! Fire-and-forget: a broker outage is logged and the envelope dropped; the
//! caller always gets a status, never an error.
//!
//! Request handlers do not publish directly. They hand envelopes to a single
//! publishing task through a bounded channel ([`PublishHandle`]); when the
//! backlog is full the envelope is dropped instead of queued in memory.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::domain::TaskEnvelope;
use crate::queue::{Broker, QueueClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStatus {
    Published,
    Dropped,
}

/// Owns one lazily (re)created connection, used by one publish at a time.
pub struct Producer {
    client: Mutex<QueueClient>,
}

impl Producer {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self {
            client: Mutex::new(QueueClient::new(broker)),
        }
    }

    /// Bound each (re)connect made while publishing.
    pub fn with_connect_timeout(self, timeout: Duration) -> Self {
        Self {
            client: Mutex::new(self.client.into_inner().with_connect_timeout(timeout)),
        }
    }

    pub async fn publish(&self, envelope: &TaskEnvelope) -> PublishStatus {
        let body = match envelope.encode() {
            Ok(body) => body,
            Err(e) => {
                error!(error = %e, "could not encode envelope");
                return PublishStatus::Dropped;
            }
        };

        let mut client = self.client.lock().await;
        match client.publish(&body).await {
            Ok(()) => {
                info!(
                    chat_id = ?envelope.chat_id(),
                    queue = %client.queue_name(),
                    "envelope published"
                );
                PublishStatus::Published
            }
            Err(e) => {
                error!(
                    error = %e,
                    chat_id = ?envelope.chat_id(),
                    "broker unavailable, envelope dropped"
                );
                PublishStatus::Dropped
            }
        }
    }

    pub async fn close(&self) {
        if let Err(e) = self.client.lock().await.close().await {
            warn!(error = %e, "closing producer connection failed");
        }
    }

    /// Start the publishing task.
    ///
    /// At most `backlog` envelopes wait behind the one being published. The
    /// task ends, closing the connection, once every handle is dropped.
    pub fn spawn_publisher(self: Arc<Self>, backlog: usize) -> (PublishHandle, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<TaskEnvelope>(backlog.max(1));
        let task = tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                self.publish(&envelope).await;
            }
            self.close().await;
        });
        (PublishHandle { tx }, task)
    }
}

/// Non-blocking entry point to the publishing task.
#[derive(Clone)]
pub struct PublishHandle {
    tx: mpsc::Sender<TaskEnvelope>,
}

impl PublishHandle {
    /// Returns `false` when the envelope was dropped (backlog full or publisher gone).
    pub fn enqueue(&self, envelope: TaskEnvelope) -> bool {
        match self.tx.try_send(envelope) {
            Ok(()) => true,
            Err(TrySendError::Full(envelope)) => {
                warn!(chat_id = ?envelope.chat_id(), "publish backlog full, envelope dropped");
                false
            }
            Err(TrySendError::Closed(envelope)) => {
                error!(chat_id = ?envelope.chat_id(), "publisher stopped, envelope dropped");
                false
            }
        }
    }
}
