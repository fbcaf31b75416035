//! Language model trait used by the query pipeline.

use async_trait::async_trait;

use crate::error::Result;

/// A text-generation backend.
///
/// The query pipeline hands it one fully assembled prompt and expects the
/// generated answer text back. Implementations classify failures as
/// transient or permanent the same way the embedding and index clients do.
///
/// # Example
///
/// ```rust,ignore
/// use kb_rag::LanguageModel;
///
/// let answer = model.generate("Context: ...\nQuery: What is a data lake?").await?;
/// ```
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Identifier of the underlying model.
    fn model(&self) -> &str;
}
