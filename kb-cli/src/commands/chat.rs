//! `kb chat`

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use kb_rag::MetadataFilter;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::warn;

use super::format_answer;
use crate::settings::Settings;

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Restrict retrieval to one domain tag
    #[arg(long)]
    pub domain: Option<String>,
}

pub async fn execute(settings: &Settings, args: ChatArgs) -> Result<ExitCode> {
    let pipeline = settings.pipeline()?;
    let handle = settings.index_handle()?;
    let filter = args.domain.map(MetadataFilter::domain);

    let mut editor = DefaultEditor::new()?;
    println!("Ask a question about the knowledge base. Ctrl-D or Ctrl-C to quit.");

    loop {
        let line = match editor.readline("kb> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if let Err(err) = editor.add_history_entry(question) {
            warn!(error = %err, "could not record history");
        }

        match pipeline.answer_filtered(&handle, question, filter.as_ref()).await {
            Ok(answer) => println!("\n{}\n", format_answer(&answer)),
            Err(err) => eprintln!("\nError: {err}\n"),
        }
    }

    Ok(ExitCode::SUCCESS)
}
