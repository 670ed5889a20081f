//! Cached chat session keyed by credential and system prompt.

use std::fmt;
use std::future::Future;

use tracing::{info, warn};

use crate::error::{GeminiError, SessionError};
use crate::gemini::{ChatSession, ClientConfig, GeminiClient};

/// Something a user message can be sent to.
pub trait ChatBackend {
    /// Send one message and wait for the full reply text.
    fn send_message(&mut self, text: &str)
        -> impl Future<Output = Result<String, GeminiError>> + Send;
}

impl ChatBackend for ChatSession {
    fn send_message(
        &mut self,
        text: &str,
    ) -> impl Future<Output = Result<String, GeminiError>> + Send {
        Self::send_message(self, text)
    }
}

/// Builds sessions for a given credential and system prompt.
pub trait Connector {
    type Session: ChatBackend;

    fn connect(&self, api_key: &str, system_prompt: &str) -> Result<Self::Session, SessionError>;
}

/// Production connector: one [`GeminiClient`] per session.
#[derive(Debug, Clone, Default)]
pub struct GeminiConnector {
    config: ClientConfig,
}

impl GeminiConnector {
    pub const fn new(config: ClientConfig) -> Self {
        Self { config }
    }
}

impl Connector for GeminiConnector {
    type Session = ChatSession;

    fn connect(&self, api_key: &str, system_prompt: &str) -> Result<ChatSession, SessionError> {
        let client = GeminiClient::new(api_key, self.config.clone())?;
        info!(model = client.model(), "Starting chat session");
        Ok(client.start_chat(system_prompt))
    }
}

/// The inputs a session was built from.
#[derive(Clone, PartialEq, Eq)]
struct SessionKey {
    api_key: String,
    system_prompt: String,
}

impl SessionKey {
    fn matches(&self, api_key: &str, system_prompt: &str) -> bool {
        self.api_key == api_key && self.system_prompt == system_prompt
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKey")
            .field("api_key", &"<redacted>")
            .field("system_prompt", &self.system_prompt)
            .finish()
    }
}

struct CachedSession<S> {
    key: SessionKey,
    /// `None` when construction failed for `key`.
    session: Option<S>,
}

/// Holds at most one session for one user.
///
/// A new session is built whenever the API key or system prompt differs from
/// the ones the cached session was built with. A failed build is remembered
/// for its key: the first call reports the construction error and later calls
/// with the same inputs report [`SessionError::Unavailable`] until the inputs
/// change.
pub struct SessionManager<C: Connector> {
    connector: C,
    cached: Option<CachedSession<C::Session>>,
}

impl<C: Connector> SessionManager<C> {
    pub const fn new(connector: C) -> Self {
        Self {
            connector,
            cached: None,
        }
    }

    /// Return the session for `(api_key, system_prompt)`, building it if needed.
    pub fn ensure_session(
        &mut self,
        api_key: &str,
        system_prompt: &str,
    ) -> Result<&mut C::Session, SessionError> {
        let fresh = matches!(&self.cached, Some(c) if c.key.matches(api_key, system_prompt));

        if !fresh {
            let key = SessionKey {
                api_key: api_key.to_string(),
                system_prompt: system_prompt.to_string(),
            };
            match self.connector.connect(api_key, system_prompt) {
                Ok(session) => {
                    self.cached = Some(CachedSession {
                        key,
                        session: Some(session),
                    });
                }
                Err(e) => {
                    warn!("Session construction failed: {e}");
                    self.cached = Some(CachedSession { key, session: None });
                    return Err(e);
                }
            }
        }

        self.cached
            .as_mut()
            .and_then(|c| c.session.as_mut())
            .ok_or(SessionError::Unavailable)
    }

    /// The cached session, if one was built successfully.
    #[cfg(test)]
    pub fn current(&self) -> Option<&C::Session> {
        self.cached.as_ref().and_then(|c| c.session.as_ref())
    }
}
