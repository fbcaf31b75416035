//! `kb setup`

use std::process::ExitCode;

use anyhow::{Context, Result};

use crate::settings::Settings;

pub async fn execute(settings: &Settings) -> Result<ExitCode> {
    let pipeline = settings.pipeline()?;
    let handle = settings.index_handle()?;

    let description = pipeline
        .ensure_index(&handle)
        .await
        .with_context(|| format!("failed to provision index '{}'", handle.name()))?;

    let state = if description.ready { "ready" } else { "initializing" };
    println!(
        "Index '{}' ({} dimensions, cosine) is {state}.",
        description.name, description.dimensions
    );
    Ok(ExitCode::SUCCESS)
}
