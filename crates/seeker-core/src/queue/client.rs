//! QueueClient - 所有・再作成可能な接続オブジェクト
//!
//! Wraps a [`Broker`] and at most one live [`QueueConnection`]. Reconnecting is
//! a method on this object; there is no module-level connection state.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::retry::DEFAULT_CONNECT_TIMEOUT;
use super::{Broker, ConnectRetry, Delivery, QueueConnection};
use crate::error::QueueError;

pub struct QueueClient {
    broker: Arc<dyn Broker>,
    connection: Option<Box<dyn QueueConnection>>,
    connect_timeout: Duration,
}

impl QueueClient {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self {
            broker,
            connection: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Bound for the lazy connects done by [`QueueClient::publish`] and [`QueueClient::connect`].
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn queue_name(&self) -> &str {
        self.broker.queue_name()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Open a fresh connection, discarding the current one.
    pub async fn connect(&mut self) -> Result<(), QueueError> {
        self.connect_within(self.connect_timeout).await
    }

    async fn connect_within(&mut self, limit: Duration) -> Result<(), QueueError> {
        self.connection = None;
        let connection = tokio::time::timeout(limit, self.broker.connect())
            .await
            .map_err(|_| QueueError::Connect(format!("timed out after {limit:?}")))??;
        self.connection = Some(connection);
        Ok(())
    }

    /// Connect with bounded retries.
    ///
    /// Returns the number of attempts used. Exhausting the policy yields
    /// [`QueueError::ConnectExhausted`].
    pub async fn connect_with_retry(&mut self, retry: &ConnectRetry) -> Result<u32, QueueError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.connect_within(retry.attempt_timeout).await {
                Ok(()) => {
                    info!(queue = %self.queue_name(), attempts, "connected to broker");
                    return Ok(attempts);
                }
                Err(e) if retry.is_exhausted(attempts) => {
                    return Err(QueueError::ConnectExhausted {
                        attempts,
                        last_error: e.to_string(),
                    });
                }
                Err(e) => {
                    let delay = retry.next_delay(attempts);
                    warn!(
                        error = %e,
                        attempt = attempts,
                        max_attempts = retry.max_attempts,
                        ?delay,
                        "broker connection failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Publish, (re)connecting lazily.
    ///
    /// A failed publish discards the connection, reconnects once and tries
    /// again; the second failure is returned.
    pub async fn publish(&mut self, body: &[u8]) -> Result<(), QueueError> {
        let first_error = match self.publish_once(body).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        warn!(error = %first_error, "publish failed, reconnecting");
        self.connection = None;
        self.publish_once(body).await
    }

    async fn publish_once(&mut self, body: &[u8]) -> Result<(), QueueError> {
        if self.connection.is_none() {
            self.connect().await?;
        }
        let Some(connection) = self.connection.as_mut() else {
            return Err(QueueError::NotConnected);
        };
        let result = connection.publish(body).await;
        if result.is_err() {
            self.connection = None;
        }
        result
    }

    /// Wait for the next delivery on the current connection.
    ///
    /// A stream that ends or errors drops the connection and returns an error;
    /// the caller decides whether to reconnect.
    pub async fn next_delivery(&mut self) -> Result<Box<dyn Delivery>, QueueError> {
        let Some(connection) = self.connection.as_mut() else {
            return Err(QueueError::NotConnected);
        };
        match connection.next_delivery().await {
            Ok(Some(delivery)) => Ok(delivery),
            Ok(None) => {
                self.connection = None;
                Err(QueueError::ConnectionLost)
            }
            Err(e) => {
                self.connection = None;
                Err(e)
            }
        }
    }

    pub async fn close(&mut self) -> Result<(), QueueError> {
        match self.connection.take() {
            Some(connection) => connection.close().await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::UnreachableBroker;
    use crate::queue::InMemoryBroker;
    use std::time::Duration;

    fn client(broker: &InMemoryBroker) -> QueueClient {
        QueueClient::new(Arc::new(broker.clone()))
    }

    #[tokio::test]
    async fn publish_connects_lazily() {
        let broker = InMemoryBroker::new("tasks");
        let mut client = client(&broker);
        assert!(!client.is_connected());

        client.publish(b"hello").await.unwrap();
        assert!(client.is_connected());
        assert_eq!(broker.pending(), 1);
    }

    #[tokio::test]
    async fn publish_reconnects_after_connection_loss() {
        let broker = InMemoryBroker::new("tasks");
        let mut client = client(&broker);
        client.publish(b"a").await.unwrap();

        // sever the existing connection, broker comes straight back
        broker.set_online(false);
        broker.set_online(true);

        client.publish(b"b").await.unwrap();
        assert_eq!(broker.pending_bodies(), vec![b"a".to_vec(), b"b".to_vec()]);
        assert_eq!(broker.connect_attempts(), 2);
    }

    #[tokio::test]
    async fn publish_fails_while_broker_is_down() {
        let broker = InMemoryBroker::new("tasks");
        broker.set_online(false);
        let mut client = client(&broker);

        assert!(client.publish(b"a").await.is_err());
        assert!(!client.is_connected());
        assert_eq!(broker.pending(), 0);
    }

    #[tokio::test]
    async fn connect_with_retry_gives_up_after_max_attempts() {
        let broker = InMemoryBroker::new("tasks");
        broker.set_online(false);
        let mut client = client(&broker);

        let err = client
            .connect_with_retry(&ConnectRetry::fixed(3, Duration::from_millis(1)))
            .await
            .unwrap_err();

        assert!(matches!(err, QueueError::ConnectExhausted { attempts: 3, .. }));
        assert_eq!(broker.connect_attempts(), 3);
    }

    #[tokio::test]
    async fn connect_with_retry_succeeds_once_broker_is_back() {
        let broker = InMemoryBroker::new("tasks");
        broker.set_online(false);
        let mut client = client(&broker);

        let restorer = broker.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            restorer.set_online(true);
        });

        let attempts = client
            .connect_with_retry(&ConnectRetry::fixed(50, Duration::from_millis(10)))
            .await
            .unwrap();
        assert!(attempts > 1);
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn hanging_connect_is_cut_off() {
        let mut client = QueueClient::new(Arc::new(UnreachableBroker))
            .with_connect_timeout(Duration::from_millis(20));

        let err = tokio::time::timeout(Duration::from_secs(5), client.publish(b"a"))
            .await
            .unwrap()
            .unwrap_err();

        assert!(matches!(err, QueueError::Connect(_)));
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn hanging_connect_counts_as_failed_attempt() {
        let mut client = QueueClient::new(Arc::new(UnreachableBroker));
        let retry = ConnectRetry::fixed(2, Duration::from_millis(1))
            .with_attempt_timeout(Duration::from_millis(10));

        let err = tokio::time::timeout(Duration::from_secs(5), client.connect_with_retry(&retry))
            .await
            .unwrap()
            .unwrap_err();

        assert!(matches!(err, QueueError::ConnectExhausted { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn ended_stream_drops_connection() {
        let broker = InMemoryBroker::new("tasks");
        let mut client = client(&broker);
        client.connect().await.unwrap();

        broker.set_online(false);
        assert!(matches!(
            client.next_delivery().await,
            Err(QueueError::ConnectionLost)
        ));
        assert!(!client.is_connected());
    }
}
