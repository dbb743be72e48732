//! Common utilities shared across examples.

#![allow(dead_code)]

use fixgate::prelude::*;
use std::env;
use std::sync::Arc;
use std::time::Duration;

/// Default server port.
pub const DEFAULT_PORT: u16 = 9876;

/// Default server host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Example configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ExampleConfig {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Sender CompID.
    pub sender_comp_id: String,
    /// Target CompID.
    pub target_comp_id: String,
    /// Heartbeat interval in seconds.
    pub heartbeat_interval: u64,
    /// Directory for the file store; in-memory when unset.
    pub store_dir: Option<String>,
    /// Delay between connection attempts.
    pub reconnect_interval: Duration,
}

impl ExampleConfig {
    /// Creates a new configuration for a client.
    #[must_use]
    pub fn client() -> Self {
        Self::from_env("CLIENT", "SERVER")
    }

    /// Creates a new configuration for a server.
    #[must_use]
    pub fn server() -> Self {
        Self::from_env("SERVER", "CLIENT")
    }

    fn from_env(sender: &str, target: &str) -> Self {
        Self {
            host: env::var("FIX_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
            port: env_parse("FIX_PORT").unwrap_or(DEFAULT_PORT),
            sender_comp_id: env::var("FIX_SENDER").unwrap_or_else(|_| sender.to_string()),
            target_comp_id: env::var("FIX_TARGET").unwrap_or_else(|_| target.to_string()),
            heartbeat_interval: env_parse("FIX_HEARTBEAT_SECS").unwrap_or(30),
            store_dir: env::var("FIX_STORE_DIR").ok(),
            reconnect_interval: Duration::from_secs(env_parse("FIX_RECONNECT_SECS").unwrap_or(5)),
        }
    }

    /// Returns the socket address string.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Session configuration for `role`.
    pub fn session(&self, role: Role) -> anyhow::Result<SessionConfig> {
        let sender = CompId::new(&self.sender_comp_id)
            .ok_or_else(|| anyhow::anyhow!("invalid sender comp id {}", self.sender_comp_id))?;
        let target = CompId::new(&self.target_comp_id)
            .ok_or_else(|| anyhow::anyhow!("invalid target comp id {}", self.target_comp_id))?;
        Ok(SessionConfigBuilder::new()
            .sender_comp_id(sender)
            .target_comp_id(target)
            .begin_string("FIX.4.4")
            .role(role)
            .heartbeat_interval(Duration::from_secs(self.heartbeat_interval))
            .build()?)
    }

    /// Opens the configured store.
    pub async fn store(&self, session: &SessionId) -> anyhow::Result<Arc<dyn MessageStore>> {
        Ok(match &self.store_dir {
            Some(dir) => Arc::new(FileStore::open(dir, session).await?),
            None => Arc::new(MemoryStore::new()),
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Initializes logging for examples.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}

/// Logs every session event.
#[derive(Debug, Default)]
pub struct LoggingApplication;

#[async_trait::async_trait]
impl Application for LoggingApplication {
    async fn on_create(&self, session_id: &SessionId) {
        tracing::info!(session = %session_id, "created");
    }

    async fn on_logon(&self, session_id: &SessionId) {
        tracing::info!(session = %session_id, "logon");
    }

    async fn on_logout(&self, session_id: &SessionId) {
        tracing::info!(session = %session_id, "logout");
    }

    async fn on_application_message(
        &self,
        session_id: &SessionId,
        seq: SeqNum,
        message: &FixMessage,
    ) {
        tracing::info!(session = %session_id, seq = seq.value(), "received {message}");
    }
}
