//! In-memory broker for development and tests.
//!
//! Mirrors the broker semantics the consumer relies on: FIFO delivery,
//! unacknowledged messages go back to the head of the queue when their
//! connection goes away, and the broker can be taken offline to simulate an
//! outage.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{Broker, Delivery, QueueConnection};
use crate::error::QueueError;

#[derive(Debug, Clone)]
struct StoredMessage {
    body: Vec<u8>,
    redelivered: bool,
}

struct BrokerState {
    /// Ready queue (FIFO).
    ready: VecDeque<StoredMessage>,

    /// delivery tag -> (connection id, message)
    unacked: HashMap<u64, (u64, StoredMessage)>,

    online: bool,

    /// Bumped whenever the broker goes offline; connections from an older
    /// epoch are dead.
    epoch: u64,

    next_tag: u64,
    next_connection: u64,

    connect_attempts: u32,
    published: usize,
    acked: usize,
}

impl BrokerState {
    fn new() -> Self {
        Self {
            ready: VecDeque::new(),
            unacked: HashMap::new(),
            online: true,
            epoch: 0,
            next_tag: 1,
            next_connection: 1,
            connect_attempts: 0,
            published: 0,
            acked: 0,
        }
    }

    /// Move unacked messages back to the head of the queue, oldest first.
    fn requeue_unacked(&mut self, connection: Option<u64>) {
        let mut tags: Vec<u64> = self
            .unacked
            .iter()
            .filter(|(_, (owner, _))| connection.is_none_or(|c| c == *owner))
            .map(|(tag, _)| *tag)
            .collect();
        tags.sort_unstable();

        for tag in tags.into_iter().rev() {
            if let Some((_, mut message)) = self.unacked.remove(&tag) {
                message.redelivered = true;
                self.ready.push_front(message);
            }
        }
    }
}

struct Shared {
    state: Mutex<BrokerState>,
    notify: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// In-memory broker. Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct InMemoryBroker {
    queue: String,
    shared: Arc<Shared>,
}

impl InMemoryBroker {
    pub fn new(queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            shared: Arc::new(Shared {
                state: Mutex::new(BrokerState::new()),
                notify: Notify::new(),
            }),
        }
    }

    /// Take the broker offline (severing every open connection) or back online.
    pub fn set_online(&self, online: bool) {
        {
            let mut state = self.shared.lock();
            if state.online && !online {
                state.epoch += 1;
                state.requeue_unacked(None);
            }
            state.online = online;
        }
        self.shared.notify.notify_waiters();
    }

    /// Enqueue raw bytes without going through a connection.
    pub fn inject(&self, body: impl Into<Vec<u8>>) {
        {
            let mut state = self.shared.lock();
            state.ready.push_back(StoredMessage {
                body: body.into(),
                redelivered: false,
            });
            state.published += 1;
        }
        self.shared.notify.notify_waiters();
    }

    /// Messages waiting to be delivered.
    pub fn pending(&self) -> usize {
        self.shared.lock().ready.len()
    }

    /// Messages handed out but not yet acknowledged.
    pub fn unacked(&self) -> usize {
        self.shared.lock().unacked.len()
    }

    pub fn acked(&self) -> usize {
        self.shared.lock().acked
    }

    pub fn published(&self) -> usize {
        self.shared.lock().published
    }

    pub fn connect_attempts(&self) -> u32 {
        self.shared.lock().connect_attempts
    }

    /// Bodies of the messages waiting to be delivered, in order.
    pub fn pending_bodies(&self) -> Vec<Vec<u8>> {
        self.shared
            .lock()
            .ready
            .iter()
            .map(|m| m.body.clone())
            .collect()
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn connect(&self) -> Result<Box<dyn QueueConnection>, QueueError> {
        let mut state = self.shared.lock();
        state.connect_attempts += 1;
        if !state.online {
            return Err(QueueError::Connect("broker offline".to_string()));
        }
        let id = state.next_connection;
        state.next_connection += 1;

        Ok(Box::new(InMemoryConnection {
            shared: Arc::clone(&self.shared),
            id,
            epoch: state.epoch,
        }))
    }

    fn queue_name(&self) -> &str {
        &self.queue
    }
}

struct InMemoryConnection {
    shared: Arc<Shared>,
    id: u64,
    epoch: u64,
}

impl InMemoryConnection {
    fn is_alive(&self, state: &BrokerState) -> bool {
        state.online && state.epoch == self.epoch
    }
}

#[async_trait]
impl QueueConnection for InMemoryConnection {
    async fn publish(&mut self, body: &[u8]) -> Result<(), QueueError> {
        {
            let mut state = self.shared.lock();
            if !self.is_alive(&state) {
                return Err(QueueError::Publish("connection lost".to_string()));
            }
            state.ready.push_back(StoredMessage {
                body: body.to_vec(),
                redelivered: false,
            });
            state.published += 1;
        }
        self.shared.notify.notify_waiters();
        Ok(())
    }

    async fn next_delivery(&mut self) -> Result<Option<Box<dyn Delivery>>, QueueError> {
        loop {
            // notified() は作った時点で notify_waiters() を受け取れる
            let notified = self.shared.notify.notified();
            {
                let mut state = self.shared.lock();
                if !self.is_alive(&state) {
                    return Ok(None);
                }
                if let Some(message) = state.ready.pop_front() {
                    let tag = state.next_tag;
                    state.next_tag += 1;
                    state.unacked.insert(tag, (self.id, message.clone()));
                    return Ok(Some(Box::new(InMemoryDelivery {
                        shared: Arc::clone(&self.shared),
                        tag,
                        body: message.body,
                        redelivered: message.redelivered,
                    })));
                }
            }
            notified.await;
        }
    }

    async fn close(self: Box<Self>) -> Result<(), QueueError> {
        // Drop requeues whatever is still unacked.
        Ok(())
    }
}

impl Drop for InMemoryConnection {
    fn drop(&mut self) {
        {
            let mut state = self.shared.lock();
            if self.is_alive(&state) {
                state.requeue_unacked(Some(self.id));
            }
        }
        self.shared.notify.notify_waiters();
    }
}

struct InMemoryDelivery {
    shared: Arc<Shared>,
    tag: u64,
    body: Vec<u8>,
    redelivered: bool,
}

#[async_trait]
impl Delivery for InMemoryDelivery {
    fn body(&self) -> &[u8] {
        &self.body
    }

    fn redelivered(&self) -> bool {
        self.redelivered
    }

    async fn ack(self: Box<Self>) -> Result<(), QueueError> {
        let mut state = self.shared.lock();
        match state.unacked.remove(&self.tag) {
            Some(_) => {
                state.acked += 1;
                Ok(())
            }
            None => Err(QueueError::Ack(format!(
                "unknown delivery tag {} (connection lost?)",
                self.tag
            ))),
        }
    }
}
