//! OpenAI embedding and chat clients.
//!
//! This module is only available when the `openai` feature is enabled. Both
//! clients call the REST API directly with `reqwest`; the base URL can be
//! overridden for OpenAI-compatible servers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::embedding::{self, EmbeddingProvider};
use crate::error::{RagError, Result, Service};
use crate::http;
use crate::llm::LanguageModel;

/// The default OpenAI API base URL.
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// The default model for OpenAI embeddings.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// The default dimensionality for `text-embedding-3-small`.
pub const DEFAULT_DIMENSIONS: usize = 1536;

/// The default number of inputs sent per embeddings request.
///
/// The API caps a request at 2048 inputs; larger batches are split.
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 100;

/// The default chat model.
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

fn read_api_key(service: Service) -> Result<String> {
    std::env::var("OPENAI_API_KEY").map_err(|_| {
        RagError::permanent(service, "OPENAI_API_KEY environment variable not set")
    })
}

fn check_api_key(service: Service, api_key: &str) -> Result<()> {
    if api_key.is_empty() {
        return Err(RagError::permanent(service, "API key must not be empty"));
    }
    Ok(())
}

/// An [`EmbeddingProvider`] backed by the OpenAI embeddings API.
///
/// # Configuration
///
/// - `model` – defaults to `text-embedding-3-small`.
/// - `dimensions` – optional Matryoshka dimension override.
/// - `batch_size` – inputs per request, defaults to 100.
/// - `api_key` – from the constructor or the `OPENAI_API_KEY` environment variable.
///
/// # Example
///
/// ```rust,ignore
/// use kb_rag::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::new("sk-...")?;
/// let embedding = provider.embed("hello world").await?;
/// ```
#[derive(Debug, Clone)]
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
    /// If set, passed to the API for Matryoshka dimension truncation.
    request_dimensions: Option<usize>,
    batch_size: usize,
}

impl OpenAIEmbeddingProvider {
    /// Create a new provider with the given API key.
    ///
    /// Uses the default model (`text-embedding-3-small`) and dimensions (1536).
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        check_api_key(Service::Embedding, &api_key)?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: OPENAI_API_BASE.into(),
            model: DEFAULT_EMBEDDING_MODEL.into(),
            dimensions: DEFAULT_DIMENSIONS,
            request_dimensions: None,
            batch_size: DEFAULT_EMBED_BATCH_SIZE,
        })
    }

    /// Create a new provider using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::new(read_api_key(Service::Embedding)?)
    }

    /// Set the model name (e.g. `text-embedding-3-large`).
    ///
    /// Call [`with_dimensions`](Self::with_dimensions) as well when the model's
    /// native dimensionality differs from 1536.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the output dimensions (Matryoshka support).
    ///
    /// When set, the API returns embeddings truncated to this size.
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.request_dimensions = Some(dims);
        self
    }

    /// Set how many inputs go into one request. Values below 1 are raised to 1.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Point the client at a different API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Send one embeddings request and return its vectors in input order.
    async fn request_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let request_body = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.request_dimensions,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| http::request_error(Service::Embedding, e))?;

        if !response.status().is_success() {
            return Err(http::status_error(Service::Embedding, response).await);
        }

        let mut parsed: EmbeddingResponse =
            response.json().await.map_err(|e| http::request_error(Service::Embedding, e))?;
        parsed.data.sort_by_key(|d| d.index);

        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();
        embedding::check_outputs(texts.len(), &vectors, self.dimensions)?;
        Ok(vectors)
    }
}

// ── Embeddings API request/response types ──────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = "OpenAI", text_len = text.len(), "embedding single text");

        let results = self.embed_batch(&[text]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| RagError::permanent(Service::Embedding, "API returned empty response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        embedding::check_inputs(texts)?;

        debug!(
            provider = "OpenAI",
            inputs = texts.len(),
            batch_size = self.batch_size,
            model = %self.model,
            "embedding batch"
        );

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.request_embeddings(batch).await?);
        }
        embedding::check_outputs(texts.len(), &vectors, self.dimensions)?;
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// A [`LanguageModel`] backed by the OpenAI chat completions API.
///
/// The assembled prompt is sent as a single user message and the first
/// choice's content is returned.
///
/// # Example
///
/// ```rust,ignore
/// use kb_rag::openai::OpenAIChatModel;
///
/// let model = OpenAIChatModel::from_env()?.with_model("gpt-4o-mini");
/// let answer = model.generate("Explain partitioning in Kafka.").await?;
/// ```
#[derive(Debug, Clone)]
pub struct OpenAIChatModel {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: Option<f32>,
}

impl OpenAIChatModel {
    /// Create a new chat client using the default model (`gpt-4o-mini`).
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        check_api_key(Service::LanguageModel, &api_key)?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: OPENAI_API_BASE.into(),
            model: DEFAULT_CHAT_MODEL.into(),
            temperature: None,
        })
    }

    /// Create a new chat client using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::new(read_api_key(Service::LanguageModel)?)
    }

    /// Set the chat model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Point the client at a different API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

// ── Chat completions API request/response types ────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[async_trait]
impl LanguageModel for OpenAIChatModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!(
            provider = "OpenAI",
            model = %self.model,
            prompt_len = prompt.len(),
            "chat completion"
        );

        let request_body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage { role: "user", content: prompt }],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| http::request_error(Service::LanguageModel, e))?;

        if !response.status().is_success() {
            return Err(http::status_error(Service::LanguageModel, response).await);
        }

        let parsed: ChatResponse =
            response.json().await.map_err(|e| http::request_error(Service::LanguageModel, e))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                RagError::permanent(Service::LanguageModel, "response contained no message content")
            })
    }

    fn model(&self) -> &str {
        &self.model
    }
}
