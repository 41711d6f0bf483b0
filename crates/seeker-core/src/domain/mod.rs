//! Domain model (ids, envelope, translation, query, results, pipeline state).

pub mod envelope;
pub mod file;
pub mod ids;
pub mod messages;
pub mod query;
pub mod state;
pub mod translation;

pub use envelope::TaskEnvelope;
pub use file::FileItem;
pub use ids::{ConversationId, DeliveryId};
pub use query::compose_query;
pub use state::{Outcome, PipelineReport, PipelineState};
pub use translation::{INVALID_SENTINEL, Translation};
