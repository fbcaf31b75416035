//! Error types for the `kb-rag` crate.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::query::QueryStage;

/// The external collaborator a failure originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    /// The embedding service.
    Embedding,
    /// The vector index service.
    VectorIndex,
    /// The language model service.
    LanguageModel,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Embedding => "embedding",
            Self::VectorIndex => "vector index",
            Self::LanguageModel => "language model",
        };
        f.write_str(name)
    }
}

/// Errors that can occur in ingestion and query operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid pipeline parameters. Raised before any I/O.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A retryable service failure (rate limit, server error, network blip).
    #[error("Transient {service} error: {message}")]
    TransientService {
        /// The service that produced the error.
        service: Service,
        /// A description of the failure.
        message: String,
    },

    /// A non-retryable service failure (bad credentials, malformed input or response).
    #[error("Permanent {service} error: {message}")]
    PermanentService {
        /// The service that produced the error.
        service: Service,
        /// A description of the failure.
        message: String,
    },

    /// The backing index does not exist and must be provisioned first.
    #[error("Index '{index}' not found")]
    IndexNotFound {
        /// Name of the missing index.
        index: String,
    },

    /// An external call exceeded its deadline.
    #[error("{service} call timed out after {timeout:?}")]
    Timeout {
        /// The service that did not answer in time.
        service: Service,
        /// The deadline that was exceeded.
        timeout: Duration,
    },

    /// Caller input rejected before any external call.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A document location could not be read.
    #[error("Document source error ({path}): {message}")]
    DocumentSource {
        /// The path that failed.
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// A query aborted at the given stage.
    #[error("Query failed while {stage}: {source}")]
    QueryFailed {
        /// The stage the query was in when it failed.
        stage: QueryStage,
        /// The underlying failure.
        #[source]
        source: Box<RagError>,
    },
}

impl RagError {
    /// Build a [`RagError::TransientService`].
    pub fn transient(service: Service, message: impl Into<String>) -> Self {
        Self::TransientService { service, message: message.into() }
    }

    /// Build a [`RagError::PermanentService`].
    pub fn permanent(service: Service, message: impl Into<String>) -> Self {
        Self::PermanentService { service, message: message.into() }
    }

    /// Whether retrying the same call may succeed.
    ///
    /// Timeouts count as transient.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::TransientService { .. } | Self::Timeout { .. } => true,
            Self::QueryFailed { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    /// The query stage this error was tagged with, if any.
    pub fn stage(&self) -> Option<QueryStage> {
        match self {
            Self::QueryFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// A convenience result type for pipeline operations.
pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_and_transient_failures_are_retryable() {
        assert!(RagError::transient(Service::Embedding, "429").is_transient());
        assert!(
            RagError::Timeout { service: Service::LanguageModel, timeout: Duration::from_secs(1) }
                .is_transient()
        );
        assert!(!RagError::permanent(Service::Embedding, "401").is_transient());
        assert!(!RagError::IndexNotFound { index: "docs".into() }.is_transient());
        assert!(!RagError::Configuration("bad".into()).is_transient());
    }

    #[test]
    fn query_failures_keep_stage_and_classification() {
        let err = RagError::QueryFailed {
            stage: QueryStage::Retrieving,
            source: Box::new(RagError::transient(Service::VectorIndex, "503")),
        };
        assert_eq!(err.stage(), Some(QueryStage::Retrieving));
        assert!(err.is_transient());
        assert!(err.to_string().contains("retrieving"));
    }
}
