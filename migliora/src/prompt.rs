//! System prompt loading.
//!
//! The prompt lives in a plain UTF-8 text file next to the binary
//! (`prompt.txt` by default). It is re-read on every interaction so edits
//! take effect without a restart. A missing or blank file is not an error:
//! the built-in prompt is used instead and a warning is handed back for the
//! UI to show.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

/// Default prompt file name, relative to the working directory.
pub const PROMPT_FILE: &str = "prompt.txt";

/// Prompt used when the prompt file is missing or blank.
pub const DEFAULT_SYSTEM_PROMPT: &str = "Please improve the following text and explain your improvements. Put the improved text between <improved_text> tags and the explanation between <explanation> tags.";

/// Why the fallback prompt was used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptWarning {
    /// The prompt file does not exist.
    NotFound { file: String },
    /// The prompt file holds only whitespace.
    Empty { file: String },
    /// The prompt file exists but could not be read.
    Unreadable { file: String, reason: String },
}

impl fmt::Display for PromptWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { file } => {
                write!(f, "{file} not found. Using default system prompt.")
            }
            Self::Empty { file } => write!(f, "{file} is empty. Using default system prompt."),
            Self::Unreadable { file, reason } => {
                write!(f, "{file} could not be read ({reason}). Using default system prompt.")
            }
        }
    }
}

impl Serialize for PromptWarning {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Result of one prompt load.
#[derive(Debug, Clone, Serialize)]
pub struct LoadedPrompt {
    /// The prompt text to use as the system instruction.
    #[serde(rename = "system_prompt")]
    pub text: String,
    /// Set when the fallback prompt was used.
    pub warning: Option<PromptWarning>,
}

impl LoadedPrompt {
    fn fallback(warning: PromptWarning) -> Self {
        warn!("{warning}");
        Self {
            text: DEFAULT_SYSTEM_PROMPT.to_string(),
            warning: Some(warning),
        }
    }
}

/// Load the system prompt from `path`, falling back to [`DEFAULT_SYSTEM_PROMPT`].
pub fn load_system_prompt(path: &Path) -> LoadedPrompt {
    let file = display_name(path);

    match std::fs::read_to_string(path) {
        Ok(content) => {
            let trimmed = content.trim();
            if trimmed.is_empty() {
                return LoadedPrompt::fallback(PromptWarning::Empty { file });
            }
            debug!(path = %path.display(), bytes = trimmed.len(), "Loaded system prompt");
            LoadedPrompt {
                text: trimmed.to_string(),
                warning: None,
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            LoadedPrompt::fallback(PromptWarning::NotFound { file })
        }
        Err(e) => LoadedPrompt::fallback(PromptWarning::Unreadable {
            file,
            reason: e.to_string(),
        }),
    }
}

/// Default prompt path in the current directory.
pub fn default_prompt_path() -> PathBuf {
    PathBuf::from(PROMPT_FILE)
}

fn display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}
