//! Tagged-content extraction from model replies.
//!
//! The system prompt asks the model to wrap its output in
//! `<improved_text>...</improved_text>` and `<explanation>...</explanation>`.
//! Each pair is matched independently, non-greedily, across lines. A missing
//! pair yields an empty field rather than an error.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static IMPROVED_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<improved_text>(.*?)</improved_text>").unwrap());

static EXPLANATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<explanation>(.*?)</explanation>").unwrap());

/// The two sections pulled out of one reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Extracted {
    pub improved_text: String,
    pub explanation: String,
}

impl Extracted {
    /// True when neither tag pair was found (or both were blank).
    pub fn is_empty(&self) -> bool {
        self.improved_text.is_empty() && self.explanation.is_empty()
    }
}

/// Split a reply into its improved text and explanation.
pub fn extract(reply: &str) -> Extracted {
    Extracted {
        improved_text: first_capture(&IMPROVED_TEXT, reply),
        explanation: first_capture(&EXPLANATION, reply),
    }
}

fn first_capture(re: &Regex, text: &str) -> String {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}
