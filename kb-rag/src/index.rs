//! Vector index trait and the handle that names one index.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{IndexEntry, MetadataFilter, SearchResult};
use crate::error::Result;

/// Provisioning details of an existing index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexDescription {
    /// Index name.
    pub name: String,
    /// Vector dimensionality the index was created with.
    pub dimensions: usize,
    /// Whether the index is ready to serve reads and writes.
    pub ready: bool,
}

/// A client for an external vector index service.
///
/// Every operation names the index it targets; the client itself holds no
/// notion of a "current" index. Data-plane operations against an index that
/// does not exist fail with [`RagError::IndexNotFound`](crate::RagError::IndexNotFound).
///
/// # Example
///
/// ```rust,ignore
/// use kb_rag::{InMemoryVectorIndex, VectorIndex};
///
/// let index = InMemoryVectorIndex::new();
/// index.create_index("docs", 1536).await?;
/// index.upsert("docs", &entries).await?;
/// let results = index.query("docs", &query_embedding, 5, None).await?;
/// ```
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Look up an index. Returns `None` if it does not exist.
    async fn describe(&self, index: &str) -> Result<Option<IndexDescription>>;

    /// Create an index using cosine similarity. No-op if it already exists.
    async fn create_index(&self, index: &str, dimensions: usize) -> Result<()>;

    /// Insert or overwrite entries keyed by their id.
    ///
    /// No batching is applied; callers split writes the service would reject
    /// as too large.
    async fn upsert(&self, index: &str, entries: &[IndexEntry]) -> Result<()>;

    /// Return up to `top_k` entries most similar to `vector`, ordered by
    /// descending cosine similarity, optionally restricted by `filter`.
    async fn query(
        &self,
        index: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>>;

    /// Short backend name for log output.
    fn backend(&self) -> &str;
}

/// An explicit reference to one index: its name plus the shared client.
///
/// Ingestion and query calls take a handle instead of reading a
/// process-wide setting, so one process can serve several indices. Cloning
/// is cheap and shares the underlying client.
#[derive(Clone)]
pub struct IndexHandle {
    name: String,
    client: Arc<dyn VectorIndex>,
}

impl IndexHandle {
    /// Bind `name` to `client`.
    pub fn new(name: impl Into<String>, client: Arc<dyn VectorIndex>) -> Self {
        Self { name: name.into(), client }
    }

    /// The index name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The shared index client.
    pub fn client(&self) -> &Arc<dyn VectorIndex> {
        &self.client
    }
}

impl fmt::Debug for IndexHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexHandle")
            .field("name", &self.name)
            .field("backend", &self.client.backend())
            .finish()
    }
}
