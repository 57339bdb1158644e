//! ExamPaper CLI: syllabus text in, exact-total exam paper out.
//!
//! Generates candidate questions from a syllabus, filters and labels them,
//! and assembles a paper whose marks add up to the requested total.

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
