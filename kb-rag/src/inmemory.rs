//! In-memory vector index using cosine similarity.
//!
//! [`InMemoryVectorIndex`] keeps every index in a `HashMap` behind a
//! `tokio::sync::RwLock`. It is meant for tests, demos and offline runs; it
//! follows the same contract as a remote index, including
//! [`RagError::IndexNotFound`] for unknown names.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::{IndexEntry, MetadataFilter, SearchResult};
use crate::error::{RagError, Result, Service};
use crate::index::{IndexDescription, VectorIndex};

#[derive(Debug, Default)]
struct Collection {
    dimensions: usize,
    /// Bumped on every write; higher means more recently upserted.
    next_seq: u64,
    entries: HashMap<String, (u64, IndexEntry)>,
}

/// An in-memory vector index.
///
/// Equal scores are ordered most-recently-upserted first.
///
/// # Example
///
/// ```rust,ignore
/// use kb_rag::{InMemoryVectorIndex, VectorIndex};
///
/// let index = InMemoryVectorIndex::new();
/// index.create_index("docs", 384).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorIndex {
    /// Create a new index client with no indices.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every entry in `index`, sorted by id.
    pub async fn entries(&self, index: &str) -> Result<Vec<IndexEntry>> {
        let collections = self.collections.read().await;
        let collection = collections.get(index).ok_or_else(|| not_found(index))?;
        let mut entries: Vec<IndexEntry> =
            collection.entries.values().map(|(_, entry)| entry.clone()).collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(entries)
    }

    /// Number of entries stored in `index`.
    pub async fn len(&self, index: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        collections.get(index).map(|c| c.entries.len()).ok_or_else(|| not_found(index))
    }
}

fn not_found(index: &str) -> RagError {
    RagError::IndexNotFound { index: index.to_string() }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn describe(&self, index: &str) -> Result<Option<IndexDescription>> {
        let collections = self.collections.read().await;
        Ok(collections.get(index).map(|c| IndexDescription {
            name: index.to_string(),
            dimensions: c.dimensions,
            ready: true,
        }))
    }

    async fn create_index(&self, index: &str, dimensions: usize) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections
            .entry(index.to_string())
            .or_insert_with(|| Collection { dimensions, ..Collection::default() });
        Ok(())
    }

    async fn upsert(&self, index: &str, entries: &[IndexEntry]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let collection = collections.get_mut(index).ok_or_else(|| not_found(index))?;

        if let Some(entry) = entries.iter().find(|e| e.vector.len() != collection.dimensions) {
            return Err(RagError::permanent(
                Service::VectorIndex,
                format!(
                    "vector for '{}' has {} dimensions, index '{index}' expects {}",
                    entry.id,
                    entry.vector.len(),
                    collection.dimensions
                ),
            ));
        }

        for entry in entries {
            let seq = collection.next_seq;
            collection.next_seq += 1;
            collection.entries.insert(entry.id.clone(), (seq, entry.clone()));
        }
        Ok(())
    }

    async fn query(
        &self,
        index: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>> {
        let collections = self.collections.read().await;
        let collection = collections.get(index).ok_or_else(|| not_found(index))?;

        if vector.len() != collection.dimensions {
            return Err(RagError::permanent(
                Service::VectorIndex,
                format!(
                    "query vector has {} dimensions, index '{index}' expects {}",
                    vector.len(),
                    collection.dimensions
                ),
            ));
        }

        let mut scored: Vec<(f32, u64, &IndexEntry)> = collection
            .entries
            .values()
            .filter(|(_, entry)| filter.is_none_or(|f| f.matches(&entry.metadata)))
            .map(|(seq, entry)| (cosine_similarity(&entry.vector, vector), *seq, entry))
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal).then(b.1.cmp(&a.1))
        });
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(score, _, entry)| SearchResult {
                id: entry.id.clone(),
                score,
                metadata: entry.metadata.clone(),
            })
            .collect())
    }

    fn backend(&self) -> &str {
        "in-memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::EntryMetadata;

    fn entry(id: &str, vector: Vec<f32>, domain: Option<&str>) -> IndexEntry {
        IndexEntry {
            id: id.to_string(),
            vector,
            metadata: EntryMetadata {
                source: format!("{id}.txt"),
                text: format!("text of {id}"),
                domain: domain.map(String::from),
                document_id: id.to_string(),
                chunk_index: 0,
                start: 0,
            },
        }
    }

    #[tokio::test]
    async fn missing_index_is_reported() {
        let index = InMemoryVectorIndex::new();
        assert!(index.describe("nope").await.unwrap().is_none());
        let err = index.query("nope", &[1.0], 3, None).await.unwrap_err();
        assert!(matches!(err, RagError::IndexNotFound { index } if index == "nope"));
        assert!(matches!(
            index.upsert("nope", &[]).await.unwrap_err(),
            RagError::IndexNotFound { .. }
        ));
    }

    #[tokio::test]
    async fn upsert_overwrites_by_id() {
        let index = InMemoryVectorIndex::new();
        index.create_index("kb", 2).await.unwrap();
        index.upsert("kb", &[entry("a", vec![1.0, 0.0], None)]).await.unwrap();
        index.upsert("kb", &[entry("a", vec![0.0, 1.0], None)]).await.unwrap();

        let entries = index.entries("kb").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].vector, vec![0.0, 1.0]);
    }

    #[tokio::test]
    async fn ranks_by_similarity_and_breaks_ties_by_recency() {
        let index = InMemoryVectorIndex::new();
        index.create_index("kb", 2).await.unwrap();
        index
            .upsert(
                "kb",
                &[
                    entry("old", vec![1.0, 0.0], None),
                    entry("far", vec![0.0, 1.0], None),
                    entry("new", vec![2.0, 0.0], None),
                ],
            )
            .await
            .unwrap();

        let results = index.query("kb", &[1.0, 0.0], 3, None).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["new", "old", "far"]);
        assert!((results[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn filter_restricts_candidates() {
        let index = InMemoryVectorIndex::new();
        index.create_index("kb", 2).await.unwrap();
        index
            .upsert(
                "kb",
                &[
                    entry("a", vec![1.0, 0.0], Some("batch")),
                    entry("b", vec![0.9, 0.1], Some("streaming")),
                ],
            )
            .await
            .unwrap();

        let filter = MetadataFilter::domain("streaming");
        let results = index.query("kb", &[1.0, 0.0], 5, Some(&filter)).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "b");
    }

    #[tokio::test]
    async fn wrong_dimension_is_rejected() {
        let index = InMemoryVectorIndex::new();
        index.create_index("kb", 3).await.unwrap();
        let err = index.upsert("kb", &[entry("a", vec![1.0], None)]).await.unwrap_err();
        assert!(matches!(err, RagError::PermanentService { service: Service::VectorIndex, .. }));

        index.upsert("kb", &[entry("b", vec![1.0, 0.0, 0.0], None)]).await.unwrap();
        let err = index.query("kb", &[1.0, 0.0], 3, None).await.unwrap_err();
        assert!(matches!(err, RagError::PermanentService { service: Service::VectorIndex, .. }));
    }

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 1.0], &[2.0, 2.0]) - 1.0).abs() < 1e-6);
    }
}
