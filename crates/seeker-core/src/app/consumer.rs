//! ConsumerLoop - キューから 1 件ずつ取り出してパイプラインを回す
//!
//! # フロー
//! 1. bounded retry で broker に接続（使い切ったら fatal）
//! 2. next_delivery() で envelope を 1 件受け取る
//! 3. decode → 宛先チェック → Pipeline::run
//! 4. 結果に関係なく ack
//! 5. 接続が切れたら 1 に戻る

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{Instrument, error, field, info, info_span, warn};

use super::pipeline::Pipeline;
use crate::domain::{DeliveryId, PipelineReport, TaskEnvelope};
use crate::error::ConsumerError;
use crate::queue::{Broker, ConnectRetry, Delivery, QueueClient};

/// Why an envelope was acknowledged without running the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Not a valid envelope.
    Undecodable,
    /// Missing or empty `chat_id`: nobody to reply to.
    NoDestination,
}

/// What happened to one delivery. The delivery is acknowledged in every case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Processed(PipelineReport),
    Discarded(DiscardReason),
    /// The pipeline task panicked.
    Aborted(String),
}

/// Handles a single delivery: decode, guard, run the pipeline, ack.
pub struct EnvelopeHandler {
    pipeline: Arc<Pipeline>,
    worker_id: usize,
}

impl EnvelopeHandler {
    pub fn new(pipeline: Arc<Pipeline>, worker_id: usize) -> Self {
        Self {
            pipeline,
            worker_id,
        }
    }

    pub async fn handle(&self, delivery: Box<dyn Delivery>) -> DeliveryOutcome {
        let span = info_span!(
            "delivery",
            id = %DeliveryId::generate(),
            worker = self.worker_id,
            redelivered = delivery.redelivered(),
            chat_id = field::Empty,
        );

        async move {
            let outcome = self.process(delivery.body()).await;

            // 成否に関係なく ack（失敗はユーザーに通知済み、再試行しない）
            if let Err(e) = delivery.ack().await {
                warn!(error = %e, "ack failed; broker will redeliver");
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn process(&self, body: &[u8]) -> DeliveryOutcome {
        let envelope = match TaskEnvelope::decode(body) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "discarding undecodable envelope");
                return DeliveryOutcome::Discarded(DiscardReason::Undecodable);
            }
        };

        let Some(destination) = envelope.destination().cloned() else {
            warn!("discarding envelope without destination");
            return DeliveryOutcome::Discarded(DiscardReason::NoDestination);
        };
        tracing::Span::current().record("chat_id", field::display(&destination));
        info!(text = %envelope.text(), "envelope received");

        // Run on its own task so a panicking collaborator cannot take the loop down.
        let pipeline = Arc::clone(&self.pipeline);
        let text = envelope.text().to_string();
        let task = tokio::spawn(
            async move { pipeline.run(&destination, &text).await }.in_current_span(),
        );

        match task.await {
            Ok(report) => {
                info!(
                    outcome = ?report.outcome,
                    delivered = report.delivered,
                    "envelope processed"
                );
                DeliveryOutcome::Processed(report)
            }
            Err(e) => {
                error!(error = %e, "pipeline aborted");
                DeliveryOutcome::Aborted(e.to_string())
            }
        }
    }
}

/// The consumer process's main loop.
pub struct ConsumerLoop {
    client: QueueClient,
    handler: EnvelopeHandler,
    retry: ConnectRetry,
    shutdown: Option<watch::Receiver<bool>>,
}

impl ConsumerLoop {
    pub fn new(broker: Arc<dyn Broker>, pipeline: Arc<Pipeline>) -> Self {
        Self {
            client: QueueClient::new(broker),
            handler: EnvelopeHandler::new(pipeline, 0),
            retry: ConnectRetry::standard(),
            shutdown: None,
        }
    }

    pub fn with_retry(mut self, retry: ConnectRetry) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_worker_id(mut self, worker_id: usize) -> Self {
        self.handler.worker_id = worker_id;
        self
    }

    /// Stop taking new deliveries once `true` is sent (or the sender is dropped).
    /// An in-flight envelope is always finished and acknowledged first.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Runs until shutdown. Without a shutdown signal this only returns on a
    /// fatal error (connect retries exhausted).
    pub async fn run(mut self) -> Result<(), ConsumerError> {
        let worker = self.handler.worker_id;

        tokio::select! {
            biased;
            _ = shutdown_requested(&mut self.shutdown) => return Ok(()),
            connected = self.client.connect_with_retry(&self.retry) => { connected?; }
        }
        info!(worker, queue = %self.client.queue_name(), "waiting for envelopes");

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown_requested(&mut self.shutdown) => break,
                next = self.client.next_delivery() => next,
            };

            match next {
                Ok(delivery) => {
                    self.handler.handle(delivery).await;
                }
                Err(e) => {
                    warn!(worker, error = %e, "lost broker connection, reconnecting");
                    tokio::select! {
                        biased;
                        _ = shutdown_requested(&mut self.shutdown) => break,
                        connected = self.client.connect_with_retry(&self.retry) => { connected?; }
                    }
                }
            }
        }

        info!(worker, "consumer stopping");
        if let Err(e) = self.client.close().await {
            warn!(worker, error = %e, "closing broker connection failed");
        }
        Ok(())
    }
}

/// Resolves once shutdown is requested; never resolves without a receiver.
async fn shutdown_requested(shutdown: &mut Option<watch::Receiver<bool>>) {
    let Some(rx) = shutdown.as_mut() else {
        return std::future::pending().await;
    };
    // sender dropped counts as shutdown
    let _ = rx.wait_for(|stop| *stop).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::{
        PanickingTranslator, RecordingNotifier, StubSearch, StubTranslator,
    };
    use crate::domain::messages::{NOT_UNDERSTOOD, PROCESSING_ERROR};
    use crate::domain::{ConversationId, FileItem, Outcome, Translation};
    use crate::error::QueueError;
    use crate::ports::Translator;
    use crate::queue::InMemoryBroker;
    use std::time::Duration;

    fn pipeline(
        translator: Arc<dyn Translator>,
        search: Arc<StubSearch>,
        notifier: Arc<RecordingNotifier>,
    ) -> Arc<Pipeline> {
        Arc::new(Pipeline::new(translator, search, notifier))
    }

    async fn deliver_one(
        broker: &InMemoryBroker,
        body: &[u8],
        pipeline: Arc<Pipeline>,
    ) -> DeliveryOutcome {
        broker.inject(body.to_vec());
        let mut client = QueueClient::new(Arc::new(broker.clone()));
        client.connect().await.unwrap();
        let delivery = client.next_delivery().await.unwrap();
        EnvelopeHandler::new(pipeline, 0).handle(delivery).await
    }

    async fn wait_until(mut done: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !done() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn envelope_without_destination_is_acked_and_skipped() {
        let broker = InMemoryBroker::new("tasks");
        let translator = Arc::new(StubTranslator::query("x"));
        let notifier = Arc::new(RecordingNotifier::default());
        let p = pipeline(
            translator.clone(),
            Arc::new(StubSearch::returning(vec![])),
            notifier.clone(),
        );

        let outcome = deliver_one(&broker, br#"{"text": "find x"}"#, p).await;

        assert_eq!(outcome, DeliveryOutcome::Discarded(DiscardReason::NoDestination));
        assert!(translator.calls().is_empty());
        assert!(notifier.sent().is_empty());
        assert_eq!(broker.acked(), 1);
        assert_eq!(broker.unacked(), 0);
    }

    #[tokio::test]
    async fn undecodable_envelope_is_acked_and_skipped() {
        let broker = InMemoryBroker::new("tasks");
        let translator = Arc::new(StubTranslator::query("x"));
        let p = pipeline(
            translator.clone(),
            Arc::new(StubSearch::returning(vec![])),
            Arc::new(RecordingNotifier::default()),
        );

        let outcome = deliver_one(&broker, b"\xff not json", p).await;

        assert_eq!(outcome, DeliveryOutcome::Discarded(DiscardReason::Undecodable));
        assert!(translator.calls().is_empty());
        assert_eq!(broker.acked(), 1);
    }

    #[tokio::test]
    async fn failed_pipeline_is_still_acked() {
        let broker = InMemoryBroker::new("tasks");
        let notifier = Arc::new(RecordingNotifier::default());
        let p = pipeline(
            Arc::new(StubTranslator::new(Translation::failed("down"))),
            Arc::new(StubSearch::returning(vec![])),
            notifier.clone(),
        );

        let outcome = deliver_one(&broker, br#"{"chat_id": 5, "text": "find x"}"#, p).await;

        let DeliveryOutcome::Processed(report) = outcome else {
            panic!("expected processed, got {outcome:?}");
        };
        assert_eq!(report.outcome, Outcome::TranslationFailed);
        assert_eq!(notifier.texts(), vec![PROCESSING_ERROR.to_string()]);
        assert_eq!(broker.acked(), 1);
        assert_eq!(broker.pending(), 0);
    }

    #[tokio::test]
    async fn panicking_collaborator_is_contained_and_acked() {
        let broker = InMemoryBroker::new("tasks");
        let p = pipeline(
            Arc::new(PanickingTranslator),
            Arc::new(StubSearch::returning(vec![])),
            Arc::new(RecordingNotifier::default()),
        );

        let outcome = deliver_one(&broker, br#"{"chat_id": 5, "text": "boom"}"#, p).await;

        assert!(matches!(outcome, DeliveryOutcome::Aborted(_)));
        assert_eq!(broker.acked(), 1);
    }

    #[tokio::test]
    async fn loop_survives_failures_and_processes_next_message() {
        let broker = InMemoryBroker::new("tasks");
        let notifier = Arc::new(RecordingNotifier::failing());
        let search = Arc::new(StubSearch::failing("index unavailable"));
        let p = pipeline(
            Arc::new(StubTranslator::query("name contains 'a'")),
            search.clone(),
            notifier.clone(),
        );

        broker.inject(br#"{"chat_id": 1, "text": "first"}"#.to_vec());
        broker.inject(br#"{"chat_id": 2, "text": "second"}"#.to_vec());

        let (tx, rx) = watch::channel(false);
        let consumer = ConsumerLoop::new(Arc::new(broker.clone()), p)
            .with_retry(ConnectRetry::fixed(3, Duration::from_millis(1)))
            .with_shutdown(rx);
        let running = tokio::spawn(consumer.run());

        wait_until(|| broker.acked() == 2).await;
        assert_eq!(search.calls().len(), 2);
        let destinations: Vec<ConversationId> =
            notifier.sent().into_iter().map(|(to, _)| to).collect();
        assert!(destinations.contains(&ConversationId::from(1)));
        assert!(destinations.contains(&ConversationId::from(2)));

        tx.send(true).unwrap();
        running.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn reconnects_after_broker_outage() {
        let broker = InMemoryBroker::new("tasks");
        let notifier = Arc::new(RecordingNotifier::default());
        let p = pipeline(
            Arc::new(StubTranslator::new(Translation::Invalid)),
            Arc::new(StubSearch::returning(vec![])),
            notifier.clone(),
        );

        let (tx, rx) = watch::channel(false);
        let consumer = ConsumerLoop::new(Arc::new(broker.clone()), p)
            .with_retry(ConnectRetry::fixed(200, Duration::from_millis(5)))
            .with_shutdown(rx);
        let running = tokio::spawn(consumer.run());

        wait_until(|| broker.connect_attempts() == 1).await;
        broker.set_online(false);
        tokio::time::sleep(Duration::from_millis(30)).await;
        broker.set_online(true);

        broker.inject(br#"{"chat_id": 9, "text": "hello"}"#.to_vec());
        wait_until(|| broker.acked() == 1).await;
        assert_eq!(notifier.sent(), vec![(ConversationId::from(9), NOT_UNDERSTOOD.to_string())]);
        assert!(broker.connect_attempts() > 1);

        tx.send(true).unwrap();
        running.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn exhausted_connect_retries_are_fatal() {
        let broker = InMemoryBroker::new("tasks");
        broker.set_online(false);
        let p = pipeline(
            Arc::new(StubTranslator::query("x")),
            Arc::new(StubSearch::returning(vec![FileItem::new("a", "b")])),
            Arc::new(RecordingNotifier::default()),
        );

        let err = ConsumerLoop::new(Arc::new(broker.clone()), p)
            .with_retry(ConnectRetry::fixed(4, Duration::from_millis(1)))
            .run()
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ConsumerError::Queue(QueueError::ConnectExhausted { attempts: 4, .. })
        ));
        assert_eq!(broker.connect_attempts(), 4);
    }

    #[tokio::test]
    async fn dropped_shutdown_sender_stops_the_loop() {
        let broker = InMemoryBroker::new("tasks");
        let p = pipeline(
            Arc::new(StubTranslator::query("x")),
            Arc::new(StubSearch::returning(vec![])),
            Arc::new(RecordingNotifier::default()),
        );

        let (tx, rx) = watch::channel(false);
        let running = tokio::spawn(ConsumerLoop::new(Arc::new(broker), p).with_shutdown(rx).run());
        drop(tx);

        tokio::time::timeout(Duration::from_secs(5), running)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
