//! Embedding provider trait for generating vector embeddings from text.

use async_trait::async_trait;

use crate::error::{RagError, Result, Service};

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap a specific embedding backend behind a unified async
/// interface. The default [`embed_batch`](EmbeddingProvider::embed_batch)
/// implementation calls [`embed`](EmbeddingProvider::embed) sequentially;
/// backends that support native batching should override it.
///
/// Every vector returned has exactly [`dimensions`](EmbeddingProvider::dimensions)
/// components, and a batch of `N` texts yields `N` vectors in input order.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Identifier of the embedding model.
    fn model(&self) -> &str {
        "unknown"
    }
}

/// Reject empty inputs before they reach the service.
///
/// Whitespace-only text is valid: fixed-size windows over a document with
/// long runs of blanks produce such chunks.
pub fn check_inputs(texts: &[&str]) -> Result<()> {
    if let Some(position) = texts.iter().position(|t| t.is_empty()) {
        return Err(RagError::permanent(
            Service::Embedding,
            format!("input {position} is empty; embeddings require non-empty text"),
        ));
    }
    Ok(())
}

/// Verify that a response holds one vector per input, each of `dimensions` components.
pub fn check_outputs(expected: usize, vectors: &[Vec<f32>], dimensions: usize) -> Result<()> {
    if vectors.len() != expected {
        return Err(RagError::permanent(
            Service::Embedding,
            format!("expected {expected} embeddings, received {}", vectors.len()),
        ));
    }
    if let Some((position, vector)) =
        vectors.iter().enumerate().find(|(_, v)| v.len() != dimensions)
    {
        return Err(RagError::permanent(
            Service::Embedding,
            format!(
                "embedding {position} has {} dimensions, expected {dimensions}",
                vector.len()
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_inputs_are_permanent_failures() {
        let err = check_inputs(&["fine", ""]).unwrap_err();
        assert!(matches!(err, RagError::PermanentService { service: Service::Embedding, .. }));
        assert!(check_inputs(&["a", "b"]).is_ok());
    }

    #[test]
    fn whitespace_only_inputs_are_accepted() {
        assert!(check_inputs(&["Kafka partitions", "        "]).is_ok());
    }

    #[test]
    fn output_count_and_dimension_are_enforced() {
        let vectors = vec![vec![0.0; 3], vec![0.0; 3]];
        assert!(check_outputs(2, &vectors, 3).is_ok());
        assert!(check_outputs(3, &vectors, 3).is_err());
        assert!(check_outputs(2, &[vec![0.0; 3], vec![0.0; 2]], 3).is_err());
    }
}
