//! `kb ask`

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use kb_rag::MetadataFilter;

use super::format_answer;
use crate::settings::Settings;

#[derive(Args, Debug)]
pub struct AskArgs {
    /// Restrict retrieval to one domain tag
    #[arg(long)]
    pub domain: Option<String>,

    /// The question to answer
    #[arg(required = true, num_args = 1..)]
    pub question: Vec<String>,
}

pub async fn execute(settings: &Settings, args: AskArgs) -> Result<ExitCode> {
    let pipeline = settings.pipeline()?;
    let handle = settings.index_handle()?;
    let filter = args.domain.map(MetadataFilter::domain);

    let question = args.question.join(" ");
    let answer = pipeline.answer_filtered(&handle, &question, filter.as_ref()).await?;

    println!("{}", format_answer(&answer));
    Ok(ExitCode::SUCCESS)
}
