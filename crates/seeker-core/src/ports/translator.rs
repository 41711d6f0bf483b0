//! Translator port - 自然文を構造化クエリに変換
//!
//! Implementations fold every transport/provider error into
//! [`Translation::Failed`]; the pipeline never sees an `Err`.

use async_trait::async_trait;

use crate::domain::Translation;

#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate the raw request text. Empty text is passed through unchanged.
    async fn translate(&self, request: &str) -> Translation;
}
