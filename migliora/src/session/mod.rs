//! Chat session lifecycle for one user.

mod manager;

pub use manager::{ChatBackend, Connector, GeminiConnector, SessionManager};
