//! Pipeline orchestrator.
//!
//! The [`RagPipeline`] composes a [`Chunker`], an [`EmbeddingProvider`] and
//! a [`LanguageModel`]. It holds no index state: every ingestion and query
//! call receives an [`IndexHandle`] naming the index to use, so documents
//! written by one call are visible to the next query on the same handle
//! without any restart or cache refresh.
//!
//! Ingestion lives in [`crate::ingest`], question answering in
//! [`crate::query`].
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kb_rag::{IndexHandle, InMemoryVectorIndex, RagConfig, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .language_model(Arc::new(my_llm))
//!     .build()?;
//!
//! let handle = IndexHandle::new("docs", Arc::new(InMemoryVectorIndex::new()));
//! pipeline.ensure_index(&handle).await?;
//! let report = pipeline.ingest(&handle, &documents).await?;
//! let answer = pipeline.answer(&handle, "What is a data lakehouse?").await?;
//! ```

use std::sync::Arc;

use tracing::{error, info};

use crate::chunking::{Chunker, FixedSizeChunker};
use crate::config::RagConfig;
use crate::embedding::{self, EmbeddingProvider};
use crate::error::{RagError, Result, Service};
use crate::index::{IndexDescription, IndexHandle};
use crate::llm::LanguageModel;
use crate::prompt::PromptTemplate;
use crate::retry::CallPolicy;

/// The ingestion and query orchestrator.
///
/// Construct one via [`RagPipeline::builder()`]. All external calls made
/// through the pipeline are bounded by the configured timeout and retried
/// according to the configured [`RetryPolicy`](crate::RetryPolicy).
pub struct RagPipeline {
    pub(crate) config: RagConfig,
    pub(crate) chunker: Arc<dyn Chunker>,
    pub(crate) embedding_provider: Arc<dyn EmbeddingProvider>,
    pub(crate) language_model: Arc<dyn LanguageModel>,
    pub(crate) prompt: PromptTemplate,
    pub(crate) policy: CallPolicy,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Return a reference to the language model.
    pub fn language_model(&self) -> &Arc<dyn LanguageModel> {
        &self.language_model
    }

    /// The timeout and retry policy applied to external calls.
    pub fn call_policy(&self) -> &CallPolicy {
        &self.policy
    }

    /// Make sure the handle's index exists, creating it with the embedding
    /// provider's dimensionality if it does not.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if the index exists with a
    /// different dimensionality, or the index client's error if the lookup
    /// or creation fails.
    pub async fn ensure_index(&self, handle: &IndexHandle) -> Result<IndexDescription> {
        let dimensions = self.embedding_provider.dimensions();
        let client = handle.client();
        let name = handle.name();

        let existing =
            self.policy.run(Service::VectorIndex, "describe", || client.describe(name)).await?;

        if let Some(description) = existing {
            if description.dimensions != dimensions {
                error!(
                    index = name,
                    index_dimensions = description.dimensions,
                    dimensions,
                    "dimension mismatch"
                );
                return Err(RagError::Configuration(format!(
                    "index '{name}' has {} dimensions but the embedding model produces \
                     {dimensions}",
                    description.dimensions
                )));
            }
            info!(index = name, dimensions, "index already exists");
            return Ok(description);
        }

        self.policy
            .run(Service::VectorIndex, "create_index", || client.create_index(name, dimensions))
            .await
            .inspect_err(|e| error!(index = name, error = %e, "failed to create index"))?;
        info!(index = name, dimensions, backend = client.backend(), "created index");

        // Remote backends may not list a new index straight away.
        let created =
            self.policy.run(Service::VectorIndex, "describe", || client.describe(name)).await?;
        Ok(created.unwrap_or_else(|| IndexDescription {
            name: name.to_string(),
            dimensions,
            ready: false,
        }))
    }

    /// Embed `texts` in one batched call and verify the response shape.
    pub(crate) async fn embed_texts(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let provider = &self.embedding_provider;
        let vectors = self
            .policy
            .run(Service::Embedding, "embed_batch", || provider.embed_batch(texts))
            .await?;
        embedding::check_outputs(texts.len(), &vectors, provider.dimensions())?;
        Ok(vectors)
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `config`, `embedding_provider` and `language_model` are required. The
/// chunker defaults to a [`FixedSizeChunker`] built from the configuration,
/// and the prompt to [`PromptTemplate::default()`].
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .config(RagConfig::default())
///     .embedding_provider(Arc::new(embedder))
///     .language_model(Arc::new(llm))
///     .prompt(PromptTemplate::new("Answer in one paragraph."))  // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    chunker: Option<Arc<dyn Chunker>>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    language_model: Option<Arc<dyn LanguageModel>>,
    prompt: Option<PromptTemplate>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the default fixed-size chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the language model used to generate answers.
    pub fn language_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.language_model = Some(model);
        self
    }

    /// Set the prompt template.
    pub fn prompt(mut self, prompt: PromptTemplate) -> Self {
        self.prompt = Some(prompt);
        self
    }

    /// Build the [`RagPipeline`], validating the configuration and that all
    /// required parts are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if the configuration is invalid or
    /// a required part is missing.
    pub fn build(self) -> Result<RagPipeline> {
        let config =
            self.config.ok_or_else(|| RagError::Configuration("config is required".to_string()))?;
        config.validate()?;

        let embedding_provider = self.embedding_provider.ok_or_else(|| {
            RagError::Configuration("embedding_provider is required".to_string())
        })?;
        let language_model = self
            .language_model
            .ok_or_else(|| RagError::Configuration("language_model is required".to_string()))?;
        let chunker = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(FixedSizeChunker::from_config(&config)?),
        };

        Ok(RagPipeline {
            policy: CallPolicy::from_config(&config),
            config,
            chunker,
            embedding_provider,
            language_model,
            prompt: self.prompt.unwrap_or_default(),
        })
    }
}
