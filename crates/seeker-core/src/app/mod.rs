//! App - アプリケーション層
//!
//! ports と queue を組み合わせて dispatch パイプラインを実装します。
//!
//! # 主要コンポーネント
//! - **Producer**: envelope を queue に投入（fire-and-forget）
//! - **Ingress**: chat webhook → Producer
//! - **Pipeline**: translate → search → notify の状態機械
//! - **ConsumerLoop**: receive → decode → pipeline → ack
//! - **WorkerGroup**: 複数 ConsumerLoop の起動と停止

pub mod consumer;
pub mod ingress;
pub mod pipeline;
pub mod producer;
pub mod worker_group;

#[cfg(test)]
pub(crate) mod testing;

// 主要な型を再エクスポート
pub use self::consumer::{ConsumerLoop, DeliveryOutcome, DiscardReason, EnvelopeHandler};
pub use self::ingress::{extract_task, router};
pub use self::pipeline::{Pipeline, PipelineSettings};
pub use self::producer::{Producer, PublishHandle, PublishStatus};
pub use self::worker_group::WorkerGroup;
