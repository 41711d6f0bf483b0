use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info};

use super::consumer::ConsumerLoop;
use super::pipeline::Pipeline;
use crate::error::ConsumerError;
use crate::queue::{Broker, ConnectRetry};

/// Worker group handle.
/// - 各ワーカーは自分専用の接続を持つ独立した ConsumerLoop（competing consumers）
/// - `shutdown_tx` を drop するとワーカー全体が止まる
/// - 1 本でも fatal で落ちたら残りも止める（プロセス終了扱い）
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: JoinSet<Result<(), ConsumerError>>,
}

impl WorkerGroup {
    /// Spawn `n` consumer loops (at least one).
    pub fn spawn(
        n: usize,
        broker: Arc<dyn Broker>,
        pipeline: Arc<Pipeline>,
        retry: ConnectRetry,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = JoinSet::new();
        for worker_id in 0..n.max(1) {
            let consumer = ConsumerLoop::new(Arc::clone(&broker), Arc::clone(&pipeline))
                .with_retry(retry.clone())
                .with_worker_id(worker_id)
                .with_shutdown(shutdown_rx.clone());
            joins.spawn(consumer.run());
        }
        info!(workers = joins.len(), queue = %broker.queue_name(), "worker group started");

        Self { shutdown_tx, joins }
    }

    /// Request shutdown for all workers.
    /// In-flight envelopes are finished and acknowledged; no new ones are taken.
    pub fn request_shutdown(&self) {
        // ignore send error: receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    /// Wait for all workers, requesting shutdown when `signal` resolves.
    ///
    /// Returns the first fatal error, if any worker hit one.
    pub async fn run_until(
        mut self,
        signal: impl Future<Output = ()>,
    ) -> Result<(), ConsumerError> {
        tokio::pin!(signal);
        let mut stopping = false;
        let mut first_error = None;

        loop {
            tokio::select! {
                _ = &mut signal, if !stopping => {
                    info!("shutdown requested");
                    stopping = true;
                    self.request_shutdown();
                }
                joined = self.joins.join_next() => {
                    let Some(joined) = joined else { break };
                    let failure = match joined {
                        Ok(Ok(())) => None,
                        Ok(Err(e)) => Some(e),
                        Err(e) => Some(ConsumerError::Aborted(e.to_string())),
                    };
                    if let Some(e) = failure {
                        error!(error = %e, "worker stopped");
                        if first_error.is_none() {
                            first_error = Some(e);
                        }
                        stopping = true;
                        self.request_shutdown();
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Shutdown and wait for all workers.
    pub async fn shutdown_and_join(self) -> Result<(), ConsumerError> {
        self.run_until(std::future::ready(())).await
    }
}
