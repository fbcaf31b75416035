//! Connection and pipeline settings, read from flags or the environment.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Args;
use kb_rag::openai::{
    DEFAULT_CHAT_MODEL, DEFAULT_DIMENSIONS, DEFAULT_EMBED_BATCH_SIZE, DEFAULT_EMBEDDING_MODEL,
};
use kb_rag::{
    IndexHandle, OpenAIChatModel, OpenAIEmbeddingProvider, PineconeIndex, RagConfig, RagPipeline,
    RetryPolicy, ServerlessSpec,
};

/// Settings shared by every subcommand.
///
/// Each flag falls back to an environment variable; a `.env` file in the
/// working directory is loaded before parsing.
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    pub openai_api_key: Option<String>,

    /// Pinecone API key
    #[arg(long, env = "PINECONE_API_KEY", hide_env_values = true, global = true)]
    pub pinecone_api_key: Option<String>,

    /// Name of the Pinecone index
    #[arg(long, env = "PINECONE_INDEX_NAME", default_value = "de-knowledge-base", global = true)]
    pub index_name: String,

    /// Pinecone namespace; the index's default namespace when unset
    #[arg(long, env = "PINECONE_NAMESPACE", global = true)]
    pub namespace: Option<String>,

    /// Embedding model
    #[arg(long, env = "EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL, global = true)]
    pub embedding_model: String,

    /// Dimensionality of the embedding model's vectors
    #[arg(long, env = "EMBEDDING_DIMENSIONS", default_value_t = DEFAULT_DIMENSIONS, global = true)]
    pub embedding_dimensions: usize,

    /// Texts sent per embeddings request
    #[arg(
        long,
        env = "EMBED_BATCH_SIZE",
        default_value_t = DEFAULT_EMBED_BATCH_SIZE,
        global = true
    )]
    pub embed_batch_size: usize,

    /// Chat model used to generate answers
    #[arg(long, env = "CHAT_MODEL", default_value = DEFAULT_CHAT_MODEL, global = true)]
    pub chat_model: String,

    /// Chunk size in characters
    #[arg(long, env = "CHUNK_SIZE", default_value_t = 1000, global = true)]
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[arg(long, env = "CHUNK_OVERLAP", default_value_t = 200, global = true)]
    pub chunk_overlap: usize,

    /// Number of passages retrieved per question
    #[arg(long, env = "TOP_K", default_value_t = 5, global = true)]
    pub top_k: usize,

    /// Drop retrieved passages scoring below this similarity
    #[arg(long, env = "SIMILARITY_THRESHOLD", global = true)]
    pub similarity_threshold: Option<f32>,

    /// Cloud provider for new indexes
    #[arg(long, env = "PINECONE_CLOUD", default_value = "aws", global = true)]
    pub cloud: String,

    /// Region for new indexes
    #[arg(long, env = "PINECONE_ENVIRONMENT", default_value = "us-east-1", global = true)]
    pub region: String,

    /// Deadline for each external request, in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30, global = true)]
    pub request_timeout_secs: u64,

    /// Retries after a transient failure
    #[arg(long, env = "MAX_RETRIES", default_value_t = 3, global = true)]
    pub max_retries: u32,
}

fn require(value: &Option<String>, variable: &str) -> Result<String> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => bail!("{variable} is not set; export it or add it to .env"),
    }
}

fn require_name(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        bail!("{what} must not be empty");
    }
    Ok(())
}

impl Settings {
    /// Build and validate the pipeline configuration.
    pub fn rag_config(&self) -> Result<RagConfig> {
        let defaults = RetryPolicy::default();
        let mut builder = RagConfig::builder()
            .chunk_size(self.chunk_size)
            .chunk_overlap(self.chunk_overlap)
            .top_k(self.top_k)
            .request_timeout(Duration::from_secs(self.request_timeout_secs))
            .retry(RetryPolicy::new(
                self.max_retries,
                defaults.initial_backoff_ms,
                defaults.max_backoff_ms,
            ));
        if let Some(threshold) = self.similarity_threshold {
            builder = builder.similarity_threshold(threshold);
        }
        builder.build().context("invalid pipeline configuration")
    }

    /// Connect to the configured Pinecone index.
    pub fn index_handle(&self) -> Result<IndexHandle> {
        require_name(&self.index_name, "index name")?;
        let api_key = require(&self.pinecone_api_key, "PINECONE_API_KEY")?;
        let mut client = PineconeIndex::new(api_key)?.with_serverless_spec(ServerlessSpec {
            cloud: self.cloud.clone(),
            region: self.region.clone(),
        });
        let namespace = self.namespace.as_deref().map(str::trim).filter(|n| !n.is_empty());
        if let Some(namespace) = namespace {
            client = client.with_namespace(namespace);
        }
        Ok(IndexHandle::new(self.index_name.clone(), Arc::new(client)))
    }

    /// Assemble the pipeline with OpenAI clients.
    pub fn pipeline(&self) -> Result<RagPipeline> {
        require_name(&self.embedding_model, "embedding model")?;
        require_name(&self.chat_model, "chat model")?;
        let api_key = require(&self.openai_api_key, "OPENAI_API_KEY")?;

        let mut embedder = OpenAIEmbeddingProvider::new(api_key.clone())?
            .with_model(&self.embedding_model)
            .with_batch_size(self.embed_batch_size);
        if self.embedding_dimensions != DEFAULT_DIMENSIONS {
            embedder = embedder.with_dimensions(self.embedding_dimensions);
        }
        let chat = OpenAIChatModel::new(api_key)?.with_model(&self.chat_model);

        let pipeline = RagPipeline::builder()
            .config(self.rag_config()?)
            .embedding_provider(Arc::new(embedder))
            .language_model(Arc::new(chat))
            .build()?;
        Ok(pipeline)
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        settings: Settings,
    }

    fn parse(args: &[&str]) -> Settings {
        let argv = std::iter::once("kb").chain(args.iter().copied());
        Harness::parse_from(argv).settings
    }

    #[test]
    fn flags_build_a_config() {
        let settings = parse(&[
            "--chunk-size",
            "500",
            "--chunk-overlap",
            "50",
            "--top-k",
            "3",
            "--max-retries",
            "0",
        ]);
        let config = settings.rag_config().unwrap();
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.chunk_overlap, 50);
        assert_eq!(config.top_k, 3);
        assert_eq!(config.retry.max_retries, 0);
    }

    #[test]
    fn equal_size_and_overlap_is_rejected() {
        let settings = parse(&["--chunk-size", "500", "--chunk-overlap", "500"]);
        assert!(settings.rag_config().is_err());
    }

    #[test]
    fn missing_keys_are_reported_by_name() {
        let mut settings = parse(&[]);
        settings.openai_api_key = None;
        settings.pinecone_api_key = Some("  ".into());

        let err = settings.pipeline().err().unwrap();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
        let err = settings.index_handle().err().unwrap();
        assert!(err.to_string().contains("PINECONE_API_KEY"));
    }

    #[test]
    fn namespace_and_batch_size_are_applied() {
        let mut settings = parse(&["--namespace", "team-a", "--embed-batch-size", "25"]);
        settings.openai_api_key = Some("sk-test".into());
        settings.pinecone_api_key = Some("pc-test".into());

        assert_eq!(settings.namespace.as_deref(), Some("team-a"));
        assert_eq!(settings.embed_batch_size, 25);
        assert!(settings.index_handle().is_ok());
        assert!(settings.pipeline().is_ok());
    }

    #[test]
    fn empty_model_name_is_rejected() {
        let mut settings = parse(&[]);
        settings.openai_api_key = Some("sk-test".into());
        settings.chat_model = " ".into();
        assert!(settings.pipeline().err().unwrap().to_string().contains("chat model"));
    }
}
