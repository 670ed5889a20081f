//! Migliora - improve a piece of text with Gemini before sending it.
//!
//! The model is asked to return its rewrite between `<improved_text>` tags
//! and its reasoning between `<explanation>` tags; the reply is split and
//! shown section by section.
//!
//! Architecture:
//! - `serve` runs a local web UI; each browser page keeps its own chat session
//! - `improve` runs one interaction from the terminal
//! - The system prompt is re-read from `prompt.txt` on every interaction

mod cli;
mod config;
mod error;
mod extract;
mod gemini;
mod interaction;
mod models;
mod prompt;
mod server;
mod session;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{execute, Cli};

const DEFAULT_LOG_FILTER: &str = "migliora=info,tower_http=info";

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    execute(cli).await
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
