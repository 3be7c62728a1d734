//! Store seam shared by the compiler and the finder.

use async_trait::async_trait;
use serde_json::Value;
use viewfind_core::{StoreError, ViewPath, ViewQuery, ViewResult};

/// Client of a view-indexed document store.
///
/// Implementations: [`MemoryStore`](crate::storage::MemoryStore) (tests,
/// embedding) and [`CouchClient`](crate::storage::CouchClient) (HTTP).
/// Implementations must report a missing view or design document as
/// [`StoreError::NotFound`] instead of creating it.
///
/// Used as `Arc<dyn ViewStore>`.
#[async_trait]
pub trait ViewStore: Send + Sync {
    /// Runs a compiled query against `path`.
    async fn query_view(&self, path: &ViewPath, query: &ViewQuery)
        -> Result<ViewResult, StoreError>;

    /// Fetches a document by id.
    async fn get_document(&self, id: &str) -> Result<Value, StoreError>;

    /// Creates or updates a document. An update must carry the current
    /// `_rev`. Returns the new revision.
    async fn save_document(&self, document: &Value) -> Result<String, StoreError>;
}
