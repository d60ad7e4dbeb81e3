//! Hireflow CLI — applicant intake and screening pipeline.
//!
//! Polls a form-response sheet, deduplicates submissions, resolves résumé
//! attachments, and drives LLM question generation and answer scoring.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
