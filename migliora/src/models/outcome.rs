//! Result of one user interaction, as shown to the user.

use std::fmt;

use serde::Serialize;

use crate::extract::Extracted;

/// Shown when no API key has been entered.
pub const MISSING_API_KEY: &str = "Inserisci la tua chiave API di google gen ia prima di iniziare";
/// Shown when the trigger is used without text or without a usable session.
pub const MISSING_INPUT: &str = "Inserisci un testo e controlla che la API sia valida";
/// Shown above the raw reply when no tags were found.
pub const NO_TAGS_FOUND: &str = "Non sono stati trovati i tag adatti, verra mostrato il testo nativo";
/// Heading of the improved text section.
pub const IMPROVED_HEADING: &str = "Testo migliorato";
/// Label of the explanation section.
pub const EXPLANATION_HEADING: &str = "Mostra in cosa devi migliorare";

/// How an outcome should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Warning,
    Error,
}

/// What the user sees after pressing the trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// No API key was supplied; nothing else was attempted.
    MissingApiKey { message: String },
    /// A session could not be built for the supplied key and prompt.
    SessionUnavailable { message: String },
    /// The input text was blank.
    MissingInput { message: String },
    /// The remote call failed. Session state is unchanged.
    RequestFailed { message: String },
    /// The model replied.
    Improved {
        /// Content of the `<improved_text>` tags, if any.
        improved_text: Option<String>,
        /// Content of the `<explanation>` tags, if any.
        explanation: Option<String>,
        /// The verbatim reply, only when neither tag pair was found.
        raw: Option<String>,
    },
}

impl Outcome {
    pub fn missing_api_key() -> Self {
        Self::MissingApiKey {
            message: MISSING_API_KEY.to_string(),
        }
    }

    pub fn missing_input() -> Self {
        Self::MissingInput {
            message: MISSING_INPUT.to_string(),
        }
    }

    /// Build the displayable result from a reply and its extracted sections.
    pub fn from_reply(reply: String, extracted: Extracted) -> Self {
        if extracted.is_empty() {
            return Self::Improved {
                improved_text: None,
                explanation: None,
                raw: Some(reply),
            };
        }
        Self::Improved {
            improved_text: non_empty(extracted.improved_text),
            explanation: non_empty(extracted.explanation),
            raw: None,
        }
    }

    pub const fn severity(&self) -> Severity {
        match self {
            Self::MissingApiKey { .. } => Severity::Warning,
            Self::SessionUnavailable { .. }
            | Self::MissingInput { .. }
            | Self::RequestFailed { .. } => Severity::Error,
            Self::Improved { raw: Some(_), .. } => Severity::Warning,
            Self::Improved { .. } => Severity::Success,
        }
    }

    /// True when the model replied.
    pub const fn is_reply(&self) -> bool {
        matches!(self, Self::Improved { .. })
    }
}

fn non_empty(text: String) -> Option<String> {
    (!text.is_empty()).then_some(text)
}

/// Plain-text rendering for the terminal.
impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingApiKey { message }
            | Self::SessionUnavailable { message }
            | Self::MissingInput { message }
            | Self::RequestFailed { message } => write!(f, "{message}"),
            Self::Improved {
                improved_text,
                explanation,
                raw,
            } => {
                let mut sections = Vec::new();
                if let Some(text) = improved_text {
                    sections.push(format!("== {IMPROVED_HEADING} ==\n{text}"));
                }
                if let Some(text) = explanation {
                    sections.push(format!("== {EXPLANATION_HEADING} ==\n{text}"));
                }
                if let Some(text) = raw {
                    sections.push(format!("{NO_TAGS_FOUND}\n\n{text}"));
                }
                write!(f, "{}", sections.join("\n\n"))
            }
        }
    }
}
