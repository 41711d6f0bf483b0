use thiserror::Error;

/// Failures of the queue transport (broker connection, channel, delivery).
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("gave up connecting after {attempts} attempts: {last_error}")]
    ConnectExhausted { attempts: u32, last_error: String },

    #[error("not connected")]
    NotConnected,

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("consume failed: {0}")]
    Consume(String),

    #[error("ack failed: {0}")]
    Ack(String),

    /// The delivery stream ended (connection or channel closed by the broker).
    #[error("connection lost")]
    ConnectionLost,
}

/// Envelope (de)serialization failures.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("envelope json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures talking to an external collaborator over HTTP.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response: {0}")]
    Response(String),

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("type hints file {path}: {reason}")]
    TypeHints { path: String, reason: String },
}

/// Fatal consumer conditions. Anything that reaches the caller ends the process.
#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("worker task aborted: {0}")]
    Aborted(String),
}
