//! Question answering over an index.
//!
//! A query moves through a fixed sequence of stages:
//!
//! ```text
//! Received -> Embedding -> Retrieving -> Generating -> Answered
//! ```
//!
//! A failure in any stage aborts the query with
//! [`RagError::QueryFailed`] carrying the stage it happened in. There is no
//! fallback answer: an empty retrieval is not a failure and still produces
//! an answer, flagged as ungrounded.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::document::{MetadataFilter, SearchResult};
use crate::error::{RagError, Result, Service};
use crate::index::IndexHandle;
use crate::pipeline::RagPipeline;

/// The lifecycle stage of a single query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStage {
    /// The question was accepted but not yet validated.
    Received,
    /// The question is being embedded.
    Embedding,
    /// The index is being searched.
    Retrieving,
    /// The language model is producing the answer.
    Generating,
    /// The answer was produced.
    Answered,
}

impl fmt::Display for QueryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "receiving",
            Self::Embedding => "embedding",
            Self::Retrieving => "retrieving",
            Self::Generating => "generating",
            Self::Answered => "answered",
        };
        f.write_str(name)
    }
}

/// A generated answer plus the passages it was grounded on.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    /// The question as asked, trimmed.
    pub question: String,
    /// The language model's output.
    pub text: String,
    /// Retrieved passages in rank order. Empty when nothing matched.
    pub sources: Vec<SearchResult>,
    /// `false` when retrieval returned nothing and the prompt carried the
    /// no-context marker.
    pub grounded: bool,
}

impl Answer {
    /// Distinct source identifiers of the retrieved passages, in rank order.
    pub fn source_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::with_capacity(self.sources.len());
        for result in &self.sources {
            let source = result.source();
            if !names.contains(&source) {
                names.push(source);
            }
        }
        names
    }
}

fn failed(stage: QueryStage, source: RagError) -> RagError {
    warn!(%stage, error = %source, "query failed");
    RagError::QueryFailed { stage, source: Box::new(source) }
}

impl RagPipeline {
    /// Answer `question` from the contents of the handle's index.
    ///
    /// # Errors
    ///
    /// Every error is a [`RagError::QueryFailed`] tagged with the stage that
    /// failed. A blank question fails in the `Received` stage with
    /// [`RagError::InvalidInput`] before any external call.
    pub async fn answer(&self, handle: &IndexHandle, question: &str) -> Result<Answer> {
        self.answer_filtered(handle, question, None).await
    }

    /// Like [`answer`](Self::answer), restricting retrieval to entries
    /// matching `filter`.
    pub async fn answer_filtered(
        &self,
        handle: &IndexHandle,
        question: &str,
        filter: Option<&MetadataFilter>,
    ) -> Result<Answer> {
        let question = question.trim();
        let sources = self.retrieve_filtered(handle, question, filter).await?;

        debug!(stage = %QueryStage::Generating, index = handle.name(), context = sources.len());
        let prompt = self.prompt.render(question, &sources);
        let model = &self.language_model;
        let text = self
            .policy
            .run(Service::LanguageModel, "generate", || model.generate(&prompt))
            .await
            .map_err(|e| failed(QueryStage::Generating, e))?;

        let grounded = !sources.is_empty();
        info!(
            stage = %QueryStage::Answered,
            index = handle.name(),
            grounded,
            sources = sources.len(),
            "answered query"
        );

        Ok(Answer { question: question.to_string(), text, sources, grounded })
    }

    /// Embed `question` and return the most similar passages, best first.
    pub async fn retrieve(
        &self,
        handle: &IndexHandle,
        question: &str,
    ) -> Result<Vec<SearchResult>> {
        self.retrieve_filtered(handle, question, None).await
    }

    /// Like [`retrieve`](Self::retrieve), restricting candidates to entries
    /// matching `filter`.
    ///
    /// At most `top_k` results are returned, and when a similarity threshold
    /// is configured, results scoring below it are dropped. An empty result
    /// is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::QueryFailed`] tagged `Received`, `Embedding` or
    /// `Retrieving`.
    pub async fn retrieve_filtered(
        &self,
        handle: &IndexHandle,
        question: &str,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>> {
        let question = question.trim();
        if question.is_empty() {
            return Err(failed(
                QueryStage::Received,
                RagError::InvalidInput("question must not be empty".to_string()),
            ));
        }
        debug!(stage = %QueryStage::Received, index = handle.name(), question_len = question.len());

        debug!(stage = %QueryStage::Embedding, model = self.embedding_provider.model());
        let vector = self
            .embed_texts(&[question])
            .await
            .and_then(|vectors| {
                vectors.into_iter().next().ok_or_else(|| {
                    RagError::permanent(Service::Embedding, "no embedding returned for question")
                })
            })
            .map_err(|e| failed(QueryStage::Embedding, e))?;

        debug!(stage = %QueryStage::Retrieving, index = handle.name(), top_k = self.config.top_k);
        let client = handle.client();
        let top_k = self.config.top_k;
        let filter = filter.filter(|f| !f.is_empty());
        let mut results = self
            .policy
            .run(Service::VectorIndex, "query", || {
                client.query(handle.name(), &vector, top_k, filter)
            })
            .await
            .map_err(|e| failed(QueryStage::Retrieving, e))?;

        // Ranking and bound hold for every backend.
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(top_k);

        if let Some(threshold) = self.config.similarity_threshold {
            let before = results.len();
            results.retain(|r| r.score >= threshold);
            if results.len() < before {
                debug!(
                    threshold,
                    dropped = before - results.len(),
                    "dropped results below threshold"
                );
            }
        }

        if results.is_empty() {
            info!(index = handle.name(), "no relevant passages found");
        }
        Ok(results)
    }
}
