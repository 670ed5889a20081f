//! CLI argument definitions.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::DEFAULT_PORT;
use crate::gemini::DEFAULT_MODEL;
use crate::prompt::PROMPT_FILE;

/// Migliora - improve Italian text with Gemini before sending it
#[derive(Parser, Debug)]
#[command(name = "migliora")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute (defaults to `serve`)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Options shared by every command that talks to the model or reads the prompt.
#[derive(Args, Debug, Clone)]
pub struct PromptArgs {
    /// File holding the system prompt
    #[arg(long, default_value = PROMPT_FILE)]
    pub prompt_file: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// Gemini model to use
    #[arg(short, long, default_value = DEFAULT_MODEL)]
    pub model: String,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the web UI
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        bind: IpAddr,

        /// Open browser automatically
        #[arg(long)]
        open: bool,

        #[command(flatten)]
        prompt: PromptArgs,

        #[command(flatten)]
        model: ModelArgs,
    },

    /// Improve one text from the terminal
    Improve {
        /// Gemini API key
        #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
        api_key: String,

        #[command(flatten)]
        prompt: PromptArgs,

        #[command(flatten)]
        model: ModelArgs,

        /// Text to improve (read from stdin when omitted)
        #[arg(trailing_var_arg = true)]
        text: Vec<String>,
    },

    /// Print the system prompt in use
    Prompt {
        #[command(flatten)]
        prompt: PromptArgs,
    },
}
