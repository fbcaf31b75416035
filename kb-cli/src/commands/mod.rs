pub mod ask;
pub mod chat;
pub mod ingest;
pub mod setup;

use kb_rag::Answer;

/// Render an answer followed by the distinct sources it drew on.
pub fn format_answer(answer: &Answer) -> String {
    let mut lines = vec![answer.text.trim().to_string()];
    if answer.grounded {
        lines.push(String::new());
        lines.push("Sources:".to_string());
        for source in answer.source_names() {
            lines.push(format!("  - {source}"));
        }
    } else {
        lines.push(String::new());
        lines.push("(no relevant passages found in the knowledge base)".to_string());
    }
    lines.join("\n")
}
