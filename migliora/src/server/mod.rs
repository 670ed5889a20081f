//! Web UI and JSON API.
//!
//! Each browser page is one user context with its own chat session. The
//! page asks for a client id on load and sends it with every action.
//!
//! Endpoints:
//! - GET / - Single-page UI
//! - GET /api/client - Issue a client id
//! - GET /api/prompt - Current system prompt (re-read from disk)
//! - POST /api/improve - Send text to the model
//! - GET /api/health - Liveness check

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ServeConfig;
use crate::interaction::{handle, Submission};
use crate::models::Outcome;
use crate::prompt::{load_system_prompt, LoadedPrompt};
use crate::session::{GeminiConnector, SessionManager};

type UserSessions = Arc<Mutex<SessionManager<GeminiConnector>>>;

/// Session cache of one browser page.
struct ClientContext {
    sessions: UserSessions,
    last_used: Instant,
    /// Order of last use; the lowest goes first when the map is full.
    use_seq: u64,
}

/// Shared server state.
pub struct ServerState {
    config: ServeConfig,
    /// One session cache per client id. The inner lock keeps each client to
    /// one outstanding request.
    clients: Mutex<HashMap<Uuid, ClientContext>>,
    next_seq: AtomicU64,
}

impl ServerState {
    pub fn new(config: ServeConfig) -> Self {
        Self {
            config,
            clients: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Session cache for `client_id`, created on first use.
    ///
    /// Contexts idle past `client_idle` are dropped first, then the least
    /// recently used ones while the map is at `max_clients`. A request
    /// already holding an evicted context finishes normally.
    async fn sessions_for(&self, client_id: Uuid) -> UserSessions {
        let mut clients = self.clients.lock().await;
        let now = Instant::now();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);

        let before = clients.len();
        clients.retain(|id, ctx| {
            *id == client_id || now.duration_since(ctx.last_used) <= self.config.client_idle
        });
        let expired = before - clients.len();
        if expired > 0 {
            debug!(expired, "Dropped idle client contexts");
        }

        if !clients.contains_key(&client_id) {
            while clients.len() >= self.config.max_clients.max(1) {
                let Some(oldest) = clients
                    .iter()
                    .min_by_key(|(_, ctx)| ctx.use_seq)
                    .map(|(id, _)| *id)
                else {
                    break;
                };
                debug!(client_id = %oldest, "Evicting least recently used client context");
                clients.remove(&oldest);
            }
        }

        let ctx = clients.entry(client_id).or_insert_with(|| {
            debug!(%client_id, "New client context");
            ClientContext {
                sessions: Arc::new(Mutex::new(SessionManager::new(GeminiConnector::new(
                    self.config.client.clone(),
                )))),
                last_used: now,
                use_seq: seq,
            }
        });
        ctx.last_used = now;
        ctx.use_seq = seq;
        ctx.sessions.clone()
    }

    fn load_prompt(&self) -> LoadedPrompt {
        load_system_prompt(&self.config.prompt_path)
    }
}

// === Request/Response Types ===

#[derive(Debug, Serialize)]
pub struct ClientResponse {
    pub client_id: Uuid,
}

/// One press of the trigger.
#[derive(Deserialize)]
pub struct ImproveRequest {
    pub client_id: Uuid,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ImproveResponse {
    #[serde(flatten)]
    pub outcome: Outcome,
    pub severity: crate::models::Severity,
    /// Set when the built-in prompt was used for this request.
    pub prompt_warning: Option<String>,
}

// === Server Lifecycle ===

/// Build the router over `state`.
pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/client", get(new_client))
        .route("/api/prompt", get(get_prompt))
        .route("/api/improve", post(improve))
        .route("/api/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the server and serve until the process is stopped.
pub async fn start_server(config: ServeConfig) -> Result<()> {
    let open_browser = config.open_browser;
    let listener = tokio::net::TcpListener::bind(config.addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.addr()))?;
    let addr: SocketAddr = listener.local_addr()?;

    info!(prompt = %config.prompt_path.display(), model = %config.client.model, "Configuration");
    let app = build_router(Arc::new(ServerState::new(config)));

    println!("Migliora server starting on http://{addr}");
    if open_browser {
        if let Err(e) = open::that(format!("http://{addr}")) {
            warn!("Could not open browser: {e}");
        }
    }

    axum::serve(listener, app).await.context("Server error")
}

// === Handlers ===

async fn index_handler() -> Html<&'static str> {
    Html(include_str!("ui.html"))
}

async fn new_client() -> Json<ClientResponse> {
    Json(ClientResponse {
        client_id: Uuid::now_v7(),
    })
}

async fn get_prompt(State(state): State<Arc<ServerState>>) -> Json<LoadedPrompt> {
    Json(state.load_prompt())
}

async fn improve(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<ImproveRequest>,
) -> Json<ImproveResponse> {
    let prompt = state.load_prompt();
    let sessions = state.sessions_for(req.client_id).await;
    let mut sessions = sessions.lock().await;

    let submission = Submission {
        api_key: req.api_key,
        system_prompt: prompt.text,
        text: req.text,
    };
    let outcome = handle(&mut *sessions, &submission).await;

    Json(ImproveResponse {
        severity: outcome.severity(),
        outcome,
        prompt_warning: prompt.warning.map(|w| w.to_string()),
    })
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::testing::spawn_fake_gemini;
    use crate::gemini::ClientConfig;
    use crate::prompt::DEFAULT_SYSTEM_PROMPT;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Start the app on a random port against the fake model endpoint.
    async fn spawn_app(prompt: Option<&str>) -> (String, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let prompt_path = dir.path().join("prompt.txt");
        if let Some(text) = prompt {
            std::fs::write(&prompt_path, text).unwrap();
        }

        let config = ServeConfig {
            port: 0,
            prompt_path,
            client: ClientConfig {
                base_url: spawn_fake_gemini().await,
                ..ClientConfig::default()
            },
            ..ServeConfig::default()
        };

        let listener = tokio::net::TcpListener::bind(config.addr()).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = build_router(Arc::new(ServerState::new(config)));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), dir)
    }

    async fn client_id(base: &str) -> String {
        let resp: Value = reqwest::get(format!("{base}/api/client"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        resp["client_id"].as_str().unwrap().to_string()
    }

    async fn improve(base: &str, body: Value) -> Value {
        reqwest::Client::new()
            .post(format!("{base}/api/improve"))
            .json(&body)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn index_serves_page() {
        let (base, _dir) = spawn_app(None).await;
        let resp = reqwest::get(&base).await.unwrap();
        assert_eq!(resp.status(), 200);
        let body = resp.text().await.unwrap();
        assert!(body.contains("Migliora il tuo testo in italiano"));
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (base, _dir) = spawn_app(None).await;
        let json: Value = reqwest::get(format!("{base}/api/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn prompt_endpoint_reports_fallback() {
        let (base, _dir) = spawn_app(None).await;
        let json: Value = reqwest::get(format!("{base}/api/prompt"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(json["system_prompt"], DEFAULT_SYSTEM_PROMPT);
        assert_eq!(
            json["warning"],
            "prompt.txt not found. Using default system prompt."
        );
    }

    #[tokio::test]
    async fn prompt_is_reread_per_request() {
        let (base, dir) = spawn_app(Some("Prima versione")).await;
        let first: Value = reqwest::get(format!("{base}/api/prompt"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(first["system_prompt"], "Prima versione");
        assert!(first["warning"].is_null());

        std::fs::write(dir.path().join("prompt.txt"), "Seconda versione").unwrap();
        let second: Value = reqwest::get(format!("{base}/api/prompt"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(second["system_prompt"], "Seconda versione");
    }

    #[tokio::test]
    async fn improve_returns_sections() {
        let (base, _dir) = spawn_app(Some("Correggi.")).await;
        let id = client_id(&base).await;

        let json = improve(
            &base,
            json!({"client_id": id, "api_key": "good-key", "text": "buongiorno"}),
        )
        .await;
        assert_eq!(json["kind"], "improved");
        assert_eq!(json["severity"], "success");
        assert_eq!(json["improved_text"], "Buongiorno.");
        assert_eq!(json["explanation"], "turns=1");
        assert!(json["raw"].is_null());
        assert!(json["prompt_warning"].is_null());
    }

    #[tokio::test]
    async fn improve_without_key_warns() {
        let (base, _dir) = spawn_app(None).await;
        let id = client_id(&base).await;

        let json = improve(&base, json!({"client_id": id, "text": "ciao"})).await;
        assert_eq!(json["kind"], "missing_api_key");
        assert_eq!(json["severity"], "warning");
        assert_eq!(
            json["prompt_warning"],
            "prompt.txt not found. Using default system prompt."
        );
    }

    #[tokio::test]
    async fn clients_have_separate_sessions() {
        let (base, _dir) = spawn_app(Some("Correggi.")).await;
        let alice = client_id(&base).await;
        let bob = client_id(&base).await;
        assert_ne!(alice, bob);

        let body = |id: &str, text: &str| json!({"client_id": id, "api_key": "good-key", "text": text});
        improve(&base, body(&alice, "uno")).await;
        let second = improve(&base, body(&alice, "due")).await;
        assert_eq!(second["explanation"], "turns=3");

        let other = improve(&base, body(&bob, "tre")).await;
        assert_eq!(other["explanation"], "turns=1");
    }

    #[tokio::test]
    async fn prompt_change_starts_new_session() {
        let (base, dir) = spawn_app(Some("Correggi.")).await;
        let id = client_id(&base).await;
        let body = |text: &str| json!({"client_id": id, "api_key": "good-key", "text": text});

        improve(&base, body("uno")).await;
        std::fs::write(dir.path().join("prompt.txt"), "Riscrivi.").unwrap();
        let json = improve(&base, body("due")).await;
        assert_eq!(json["explanation"], "turns=1");
    }

    fn state_with(client_idle: Duration, max_clients: usize) -> ServerState {
        ServerState::new(ServeConfig {
            client_idle,
            max_clients,
            ..ServeConfig::default()
        })
    }

    #[tokio::test]
    async fn idle_client_context_is_released() {
        let state = state_with(Duration::from_millis(50), 100);
        let idle = Uuid::now_v7();
        let first = state.sessions_for(idle).await;
        tokio::time::sleep(Duration::from_millis(120)).await;

        let active = Uuid::now_v7();
        state.sessions_for(active).await;

        let clients = state.clients.lock().await;
        assert_eq!(clients.len(), 1);
        assert!(clients.contains_key(&active));
        assert!(!clients.contains_key(&idle));
        drop(clients);
        // The handle given out earlier stays usable.
        assert!(first.lock().await.current().is_none());
    }

    #[tokio::test]
    async fn returning_client_keeps_its_context() {
        let state = state_with(Duration::from_secs(60), 100);
        let id = Uuid::now_v7();
        let first = state.sessions_for(id).await;
        let again = state.sessions_for(id).await;
        assert!(Arc::ptr_eq(&first, &again));
    }

    #[tokio::test]
    async fn client_contexts_are_capped() {
        let state = state_with(Duration::from_secs(60), 8);
        let kept = Uuid::now_v7();
        state.sessions_for(kept).await;

        for _ in 0..5000 {
            state.sessions_for(Uuid::now_v7()).await;
            // Touching `kept` keeps it most recently used.
            state.sessions_for(kept).await;
        }

        let clients = state.clients.lock().await;
        assert_eq!(clients.len(), 8);
        assert!(clients.contains_key(&kept));
    }

    #[tokio::test]
    async fn malformed_request_is_rejected() {
        let (base, _dir) = spawn_app(None).await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/api/improve"))
            .json(&json!({"client_id": "not-a-uuid"}))
            .send()
            .await
            .unwrap();
        assert!(resp.status().is_client_error());
    }
}
