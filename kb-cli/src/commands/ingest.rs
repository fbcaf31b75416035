//! `kb ingest`

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use kb_rag::{Document, IngestReport, load_directory, load_files};

use crate::settings::Settings;

#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Directory to load documents from
    #[arg(long, default_value = "documents")]
    pub dir: PathBuf,

    /// File extensions to include (repeatable)
    #[arg(long = "ext", default_value = "txt")]
    pub extensions: Vec<String>,

    /// Domain tag stored with every chunk
    #[arg(long)]
    pub domain: Option<String>,

    /// Individual files to ingest instead of the directory
    pub files: Vec<PathBuf>,
}

impl IngestArgs {
    fn load(&self) -> Result<Vec<Document>> {
        let documents = if self.files.is_empty() {
            let extensions: Vec<&str> = self.extensions.iter().map(String::as_str).collect();
            load_directory(&self.dir, &extensions)?
        } else {
            load_files(&self.files)?
        };

        Ok(match &self.domain {
            Some(domain) => documents.into_iter().map(|d| d.with_domain(domain.clone())).collect(),
            None => documents,
        })
    }
}

fn summary(report: &IngestReport) -> String {
    let mut lines = Vec::with_capacity(report.document_count() + 2);
    for outcome in &report.succeeded {
        lines.push(format!("  ok      {} ({} chunks)", outcome.source, outcome.chunk_count));
    }
    for failure in &report.failed {
        lines.push(format!("  failed  {}: {}", failure.source, failure.error));
    }
    lines.push(format!(
        "Ingested {} of {} documents, {} chunks.",
        report.succeeded.len(),
        report.document_count(),
        report.total_chunks()
    ));
    lines.join("\n")
}

pub async fn execute(settings: &Settings, args: IngestArgs) -> Result<ExitCode> {
    let documents = args.load()?;
    let pipeline = settings.pipeline()?;
    let handle = settings.index_handle()?;

    println!("Loaded {} documents.", documents.len());
    let report = pipeline.ingest(&handle, &documents).await.with_context(|| {
        format!("ingestion into '{}' aborted; run `kb setup` first", handle.name())
    })?;

    println!("{}", summary(&report));
    Ok(if report.is_success() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
