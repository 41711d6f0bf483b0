//! SearchProvider port - ファイルストアの検索

use async_trait::async_trait;

use crate::domain::FileItem;
use crate::error::ClientError;

/// Executes a translated predicate against the remote index.
///
/// # Contract
/// - the standing "not trashed" filter is always applied
/// - `scope`, when given, restricts results to one collection
/// - results come back in provider order, at most one page
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(
        &self,
        predicate: &str,
        scope: Option<&str>,
    ) -> Result<Vec<FileItem>, ClientError>;
}
