//! Shared router state.

use std::sync::Arc;

use kupfer_models::CapabilityStatement;
use tokio::sync::OnceCell;

use crate::capabilities::GenericBackend;
use crate::config::ServerConfig;
use crate::error::Result;

/// State shared by all request handlers.
///
/// The CapabilityStatement is the only long-lived derived state; it is
/// built from the backend on first use and reused for the process
/// lifetime (the backend's declarations are fixed at construction).
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn GenericBackend>,
    pub config: Arc<ServerConfig>,
    capabilities: Arc<OnceCell<CapabilityStatement>>,
}

impl AppState {
    pub fn new(backend: Arc<dyn GenericBackend>, config: ServerConfig) -> Self {
        Self {
            backend,
            config: Arc::new(config),
            capabilities: Arc::new(OnceCell::new()),
        }
    }

    /// The server's CapabilityStatement, lazily built on first request.
    pub async fn capabilities(&self) -> Result<&CapabilityStatement> {
        self.capabilities
            .get_or_try_init(|| async { self.backend.capability_statement().await })
            .await
    }
}
