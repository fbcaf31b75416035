//! `kb`: ingest documents into a knowledge base and ask it questions.

mod commands;
mod settings;
mod telemetry;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use crate::commands::{ask, chat, ingest, setup};
use crate::settings::Settings;
use crate::telemetry::LogFormat;

#[derive(Parser, Debug)]
#[command(name = "kb", version, about = "Knowledge base question answering", long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    /// Log at debug level
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the vector index if it does not exist
    Setup,
    /// Load documents and add them to the index
    Ingest(ingest::IngestArgs),
    /// Answer a single question
    Ask(ask::AskArgs),
    /// Ask questions interactively
    Chat(chat::ChatArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine; the environment may already be set.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    telemetry::init_tracing(cli.verbose, cli.log_format);

    let result = match cli.command {
        Command::Setup => setup::execute(&cli.settings).await,
        Command::Ingest(args) => ingest::execute(&cli.settings, args).await,
        Command::Ask(args) => ask::execute(&cli.settings, args).await,
        Command::Chat(args) => chat::execute(&cli.settings, args).await,
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
