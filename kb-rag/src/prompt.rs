//! Prompt assembly for the query pipeline.

use std::fmt::Write;

use crate::document::SearchResult;

/// Placed where the context would go when retrieval found nothing.
pub const NO_CONTEXT_MARKER: &str = "[NO CONTEXT FOUND]";

/// Instruction used when none is configured.
pub const DEFAULT_INSTRUCTION: &str = "You are a knowledge base assistant. Answer the query \
using the context information below rather than prior knowledge, and mention which sources \
you relied on. If the context does not contain the answer, say so.";

const NO_CONTEXT_NOTE: &str = "The knowledge base returned no relevant passages for this query. \
Answer from general knowledge and state clearly that the answer is not grounded in the \
knowledge base.";

const RULE: &str = "---------------------";

/// Builds the text sent to the language model: a fixed instruction, the
/// retrieved passages in rank order (each attributed to its source), then
/// the question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    instruction: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self { instruction: DEFAULT_INSTRUCTION.to_string() }
    }
}

impl PromptTemplate {
    /// Use a custom instruction.
    pub fn new(instruction: impl Into<String>) -> Self {
        Self { instruction: instruction.into() }
    }

    /// The instruction placed at the top of every prompt.
    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    /// Render the prompt for `question` with `context` in the given order.
    pub fn render(&self, question: &str, context: &[SearchResult]) -> String {
        let mut prompt = String::with_capacity(
            self.instruction.len()
                + question.len()
                + context.iter().map(|r| r.text().len() + 32).sum::<usize>()
                + 128,
        );

        prompt.push_str(&self.instruction);
        prompt.push_str("\n\nContext information is below.\n");
        prompt.push_str(RULE);
        prompt.push('\n');

        if context.is_empty() {
            prompt.push_str(NO_CONTEXT_MARKER);
            prompt.push('\n');
            prompt.push_str(NO_CONTEXT_NOTE);
            prompt.push('\n');
        } else {
            for (rank, result) in context.iter().enumerate() {
                if rank > 0 {
                    prompt.push('\n');
                }
                // Writing to a String cannot fail.
                let _ = writeln!(prompt, "[{}] source: {}", rank + 1, result.source());
                prompt.push_str(result.text().trim_end());
                prompt.push('\n');
            }
        }

        prompt.push_str(RULE);
        prompt.push('\n');
        let _ = write!(prompt, "Query: {}\nAnswer: ", question.trim());
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::EntryMetadata;

    fn result(source: &str, text: &str, score: f32) -> SearchResult {
        SearchResult {
            id: format!("{source}#0"),
            score,
            metadata: EntryMetadata {
                source: source.into(),
                text: text.into(),
                domain: None,
                document_id: source.into(),
                chunk_index: 0,
                start: 0,
            },
        }
    }

    #[test]
    fn context_is_attributed_and_ordered() {
        let prompt = PromptTemplate::default().render(
            "What is a lakehouse?",
            &[
                result("lakehouse.txt", "A lakehouse combines...", 0.9),
                result("lake.txt", "A data lake...", 0.7),
            ],
        );

        let first = prompt.find("[1] source: lakehouse.txt").unwrap();
        let second = prompt.find("[2] source: lake.txt").unwrap();
        assert!(first < second);
        assert!(prompt.starts_with(DEFAULT_INSTRUCTION));
        assert!(prompt.ends_with("Query: What is a lakehouse?\nAnswer: "));
        assert!(!prompt.contains(NO_CONTEXT_MARKER));
    }

    #[test]
    fn empty_context_carries_marker() {
        let prompt = PromptTemplate::new("Be brief.").render("anything", &[]);
        assert!(prompt.starts_with("Be brief."));
        assert!(prompt.contains(NO_CONTEXT_MARKER));
        assert!(prompt.contains("Query: anything"));
    }
}
