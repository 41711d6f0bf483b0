//! Queue transport: a durable, at-least-once channel between producer and consumer.
//!
//! # 設計原則
//! - channel と message はどちらも persistent（broker 再起動で消えない）
//! - message は `ack` された時点で配送完了。ack 前に接続が切れたら再配送される
//! - 接続オブジェクトは 1 ロールにつき 1 つ、逐次的に使う（スレッド間で共有しない）

mod amqp;
mod client;
mod memory;
mod retry;

pub use amqp::{AmqpBroker, BrokerSettings};
pub use client::QueueClient;
pub use memory::InMemoryBroker;
pub use retry::{ConnectRetry, DEFAULT_CONNECT_TIMEOUT};

use async_trait::async_trait;

use crate::error::QueueError;

/// A delivered message owned by the consumer until it is acknowledged.
///
/// Dropping a delivery without `ack` leaves it unacknowledged; the broker hands
/// it out again once the owning connection goes away.
#[async_trait]
pub trait Delivery: Send {
    fn body(&self) -> &[u8];

    /// Whether the broker has handed this message out before.
    fn redelivered(&self) -> bool;

    /// Mark delivered. The message is removed from the queue.
    async fn ack(self: Box<Self>) -> Result<(), QueueError>;
}

/// One open connection (and channel) to the named queue.
#[async_trait]
pub trait QueueConnection: Send {
    /// Publish a persistent message.
    async fn publish(&mut self, body: &[u8]) -> Result<(), QueueError>;

    /// Wait for the next delivery. `Ok(None)` means the stream ended.
    async fn next_delivery(&mut self) -> Result<Option<Box<dyn Delivery>>, QueueError>;

    async fn close(self: Box<Self>) -> Result<(), QueueError>;
}

/// Connection factory (interface).
/// AMQP in production, in-memory for development and tests.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Open a connection and declare the durable queue.
    async fn connect(&self) -> Result<Box<dyn QueueConnection>, QueueError>;

    fn queue_name(&self) -> &str;
}
