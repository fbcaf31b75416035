//! Configuration for the ingestion and query pipelines.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::retry::RetryPolicy;

/// Configuration parameters for the pipeline.
///
/// Model names and the index name are not part of this struct: they belong to
/// the embedding/LLM clients and the [`IndexHandle`](crate::IndexHandle).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of top results to return from vector search.
    pub top_k: usize,
    /// Minimum similarity score for results (results below this are dropped).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_threshold: Option<f32>,
    /// Maximum number of entries written per upsert call.
    pub upsert_batch_size: usize,
    /// Deadline applied to every external call.
    pub request_timeout: Duration,
    /// Backoff policy for transient external failures.
    pub retry: RetryPolicy,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 5,
            similarity_threshold: None,
            upsert_batch_size: 100,
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if:
    /// - `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `upsert_batch_size == 0`
    /// - `request_timeout` is zero
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Configuration("chunk_size must be greater than zero".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Configuration(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::Configuration("top_k must be greater than zero".into()));
        }
        if self.upsert_batch_size == 0 {
            return Err(RagError::Configuration(
                "upsert_batch_size must be greater than zero".into(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(RagError::Configuration("request_timeout must be non-zero".into()));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of top results to return from vector search.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the minimum similarity threshold for filtering results.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = Some(threshold);
        self
    }

    /// Set the maximum number of entries per upsert call.
    pub fn upsert_batch_size(mut self, size: usize) -> Self {
        self.config.upsert_batch_size = size;
        self
    }

    /// Set the deadline applied to every external call.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the retry policy for transient failures.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid_and_documented() {
        let config = RagConfig::builder().build().unwrap();
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.chunk_overlap, 200);
        assert_eq!(config.top_k, 5);
        assert_eq!(config.similarity_threshold, None);
    }

    #[test]
    fn overlap_equal_to_size_is_rejected() {
        let err = RagConfig::builder().chunk_size(500).chunk_overlap(500).build().unwrap_err();
        assert!(matches!(err, RagError::Configuration(_)));
    }

    #[test]
    fn zero_values_are_rejected() {
        assert!(RagConfig::builder().chunk_size(0).chunk_overlap(0).build().is_err());
        assert!(RagConfig::builder().top_k(0).build().is_err());
        assert!(RagConfig::builder().upsert_batch_size(0).build().is_err());
        assert!(RagConfig::builder().request_timeout(Duration::ZERO).build().is_err());
    }

    #[test]
    fn round_trips_through_json() {
        let config = RagConfig::builder().similarity_threshold(0.25).build().unwrap();
        let json = serde_json::to_string(&config).unwrap();
        let back: RagConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
