//! Retrieval-augmented question answering over an external vector index.
//!
//! This crate provides:
//! - Fixed-size overlapping chunking of documents
//! - Embedding, vector index and language model client traits
//! - An ingestion pipeline that chunks, embeds and upserts documents
//! - A query pipeline that retrieves context and generates an answer
//! - Timeout and retry handling for every external call
//!
//! Backends behind feature flags:
//! - `openai`: OpenAI embeddings and chat completions
//! - `pinecone`: Pinecone serverless indexes
//! - `full`: all of the above
//!
//! [`InMemoryVectorIndex`] is always available for tests and offline use.

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod index;
pub mod ingest;
pub mod inmemory;
pub mod llm;
pub mod loader;
pub mod pipeline;
pub mod prompt;
pub mod query;
pub mod retry;

#[cfg(any(feature = "openai", feature = "pinecone"))]
mod http;

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "pinecone")]
pub mod pinecone;

pub use chunking::{Chunker, FixedSizeChunker};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Chunk, Document, EntryMetadata, IndexEntry, MetadataFilter, SearchResult};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result, Service};
pub use index::{IndexDescription, IndexHandle, VectorIndex};
pub use ingest::{DocumentFailure, DocumentOutcome, IngestReport};
pub use inmemory::InMemoryVectorIndex;
pub use llm::LanguageModel;
pub use loader::{load_directory, load_files};
pub use pipeline::{RagPipeline, RagPipelineBuilder};
pub use prompt::{NO_CONTEXT_MARKER, PromptTemplate};
pub use query::{Answer, QueryStage};
pub use retry::{CallPolicy, RetryPolicy};

#[cfg(feature = "openai")]
pub use openai::{OpenAIChatModel, OpenAIEmbeddingProvider};

#[cfg(feature = "pinecone")]
pub use pinecone::{PineconeIndex, ServerlessSpec};
