//! CLI command execution.

use std::io::{IsTerminal, Read};

use anyhow::{bail, Context, Result};

use crate::config::ServeConfig;
use crate::gemini::ClientConfig;
use crate::interaction::{handle, Submission};
use crate::prompt::load_system_prompt;
use crate::server;
use crate::session::{GeminiConnector, SessionManager};

use super::args::{Cli, Commands, ModelArgs, PromptArgs};

/// Execute a CLI command.
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        None => server::start_server(ServeConfig::default()).await,
        Some(Commands::Serve {
            port,
            bind,
            open,
            prompt,
            model,
        }) => {
            let config = ServeConfig {
                bind,
                port,
                prompt_path: prompt.prompt_file,
                client: ClientConfig::with_model(model.model),
                open_browser: open,
                ..ServeConfig::default()
            };
            server::start_server(config).await
        }
        Some(Commands::Improve {
            api_key,
            prompt,
            model,
            text,
        }) => run_improve(api_key, &prompt, model, text).await,
        Some(Commands::Prompt { prompt }) => {
            run_prompt(&prompt);
            Ok(())
        }
    }
}

async fn run_improve(
    api_key: String,
    prompt: &PromptArgs,
    model: ModelArgs,
    text: Vec<String>,
) -> Result<()> {
    let text = if text.is_empty() {
        read_stdin()?
    } else {
        text.join(" ")
    };

    let loaded = load_system_prompt(&prompt.prompt_file);
    if let Some(warning) = &loaded.warning {
        eprintln!("Warning: {warning}");
    }

    let mut sessions =
        SessionManager::new(GeminiConnector::new(ClientConfig::with_model(model.model)));
    let submission = Submission {
        api_key,
        system_prompt: loaded.text,
        text,
    };

    let outcome = handle(&mut sessions, &submission).await;
    if !outcome.is_reply() {
        bail!("{outcome}");
    }
    println!("{outcome}");
    Ok(())
}

fn run_prompt(prompt: &PromptArgs) {
    let loaded = load_system_prompt(&prompt.prompt_file);
    if let Some(warning) = &loaded.warning {
        eprintln!("Warning: {warning}");
    }
    println!("{}", loaded.text);
}

fn read_stdin() -> Result<String> {
    let mut stdin = std::io::stdin();
    if stdin.is_terminal() {
        eprintln!("Inserisci il testo da migliorare (Ctrl-D per terminare):");
    }
    let mut buf = String::new();
    stdin
        .read_to_string(&mut buf)
        .context("Failed to read text from stdin")?;
    Ok(buf)
}
