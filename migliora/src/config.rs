//! Runtime configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::gemini::ClientConfig;
use crate::prompt::default_prompt_path;

/// Default port for the web UI.
pub const DEFAULT_PORT: u16 = 58232;

/// How long a browser page's context is kept after its last request.
pub const DEFAULT_CLIENT_IDLE: Duration = Duration::from_secs(30 * 60);

/// Most client contexts held at once.
pub const DEFAULT_MAX_CLIENTS: usize = 256;

/// Settings for `migliora serve`.
#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub bind: IpAddr,
    /// `0` picks a free port.
    pub port: u16,
    /// Prompt file, re-read on every request.
    pub prompt_path: PathBuf,
    pub client: ClientConfig,
    /// Open the UI in the default browser once listening.
    pub open_browser: bool,
    /// Contexts idle for longer than this are dropped.
    pub client_idle: Duration,
    /// Past this many contexts the least recently used one is dropped.
    pub max_clients: usize,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            prompt_path: default_prompt_path(),
            client: ClientConfig::default(),
            open_browser: false,
            client_idle: DEFAULT_CLIENT_IDLE,
            max_clients: DEFAULT_MAX_CLIENTS,
        }
    }
}

impl ServeConfig {
    pub const fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}
