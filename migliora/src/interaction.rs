//! Per-action request handler.
//!
//! One call to [`handle`] is one press of the trigger: make sure a session
//! exists for the current key and prompt, send the text, split the reply.
//! Every failure is turned into an [`Outcome`] for display; nothing here
//! returns an error or retries.

use tracing::{info, warn};

use crate::error::SessionError;
use crate::extract::extract;
use crate::models::{Outcome, MISSING_INPUT};
use crate::session::{ChatBackend, Connector, SessionManager};

/// One user action.
#[derive(Debug, Clone)]
pub struct Submission {
    pub api_key: String,
    pub system_prompt: String,
    pub text: String,
}

/// Handle one submission against the user's session cache.
pub async fn handle<C: Connector>(
    sessions: &mut SessionManager<C>,
    submission: &Submission,
) -> Outcome {
    let api_key = submission.api_key.trim();
    if api_key.is_empty() {
        return Outcome::missing_api_key();
    }

    let session = match sessions.ensure_session(api_key, &submission.system_prompt) {
        Ok(session) => session,
        Err(SessionError::Unavailable) => {
            return Outcome::SessionUnavailable {
                message: MISSING_INPUT.to_string(),
            };
        }
        Err(e) => {
            return Outcome::SessionUnavailable {
                message: format!("Errore di inizializzazione di gemini: {e}"),
            };
        }
    };

    if submission.text.trim().is_empty() {
        return Outcome::missing_input();
    }

    info!(bytes = submission.text.len(), "Sending text to model");
    match session.send_message(&submission.text).await {
        Ok(reply) => {
            let extracted = extract(&reply);
            if extracted.is_empty() {
                warn!("Reply contained no tags, showing raw text");
            }
            Outcome::from_reply(reply, extracted)
        }
        Err(e) => {
            warn!("Request failed: {e}");
            Outcome::RequestFailed {
                message: format!("Error processing request: {e}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::testing::{spawn_fake_gemini, BAD_KEY};
    use crate::gemini::ClientConfig;
    use crate::session::GeminiConnector;

    async fn sessions() -> SessionManager<GeminiConnector> {
        let base_url = spawn_fake_gemini().await;
        SessionManager::new(GeminiConnector::new(ClientConfig {
            base_url,
            ..ClientConfig::default()
        }))
    }

    fn submission(api_key: &str, text: &str) -> Submission {
        Submission {
            api_key: api_key.into(),
            system_prompt: "Correggi.".into(),
            text: text.into(),
        }
    }

    #[tokio::test]
    async fn missing_key_short_circuits() {
        let mut sessions = sessions().await;
        let outcome = handle(&mut sessions, &submission("  ", "ciao")).await;
        assert_eq!(outcome, Outcome::missing_api_key());
        assert!(sessions.current().is_none());
    }

    #[tokio::test]
    async fn blank_text_is_rejected_after_session_is_built() {
        let mut sessions = sessions().await;
        let outcome = handle(&mut sessions, &submission("good-key", "   ")).await;
        assert_eq!(outcome, Outcome::missing_input());
        assert!(sessions.current().is_some());
    }

    #[tokio::test]
    async fn tagged_reply_is_split() {
        let mut sessions = sessions().await;
        let outcome = handle(&mut sessions, &submission("good-key", "buongiorno")).await;
        assert_eq!(
            outcome,
            Outcome::Improved {
                improved_text: Some("Buongiorno.".into()),
                explanation: Some("turns=1".into()),
                raw: None,
            }
        );
    }

    #[tokio::test]
    async fn session_is_reused_across_actions() {
        let mut sessions = sessions().await;
        handle(&mut sessions, &submission("good-key", "uno")).await;
        let outcome = handle(&mut sessions, &submission("good-key", "due")).await;
        assert!(matches!(
            outcome,
            Outcome::Improved { explanation: Some(ref e), .. } if e == "turns=3"
        ));

        let outcome = handle(&mut sessions, &submission("other-key", "tre")).await;
        assert!(matches!(
            outcome,
            Outcome::Improved { explanation: Some(ref e), .. } if e == "turns=1"
        ));
    }

    #[tokio::test]
    async fn untagged_reply_is_shown_raw() {
        let mut sessions = sessions().await;
        let outcome = handle(&mut sessions, &submission("good-key", "plain")).await;
        assert_eq!(
            outcome,
            Outcome::Improved {
                improved_text: None,
                explanation: None,
                raw: Some("Just plain text".into()),
            }
        );
    }

    #[tokio::test]
    async fn remote_failure_is_reported_without_changing_state() {
        let mut sessions = sessions().await;
        handle(&mut sessions, &submission("good-key", "uno")).await;

        let outcome = handle(&mut sessions, &submission("good-key", "fail")).await;
        let Outcome::RequestFailed { message } = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert!(message.starts_with("Error processing request: Gemini API HTTP 500"));
        assert_eq!(sessions.current().unwrap().turns(), 2);
    }

    #[tokio::test]
    async fn rejected_key_is_a_request_failure() {
        let mut sessions = sessions().await;
        let outcome = handle(&mut sessions, &submission(BAD_KEY, "ciao")).await;
        assert!(matches!(outcome, Outcome::RequestFailed { .. }));
    }

    #[tokio::test]
    async fn malformed_key_disables_the_session() {
        let mut sessions = sessions().await;
        let first = handle(&mut sessions, &submission("bad\u{7f}key", "ciao")).await;
        let Outcome::SessionUnavailable { message } = first else {
            panic!("expected unavailable session, got {first:?}");
        };
        assert!(message.starts_with("Errore di inizializzazione di gemini"));

        let second = handle(&mut sessions, &submission("bad\u{7f}key", "ciao")).await;
        assert_eq!(
            second,
            Outcome::SessionUnavailable {
                message: MISSING_INPUT.into()
            }
        );
    }
}
