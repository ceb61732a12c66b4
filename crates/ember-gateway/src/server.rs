use ember_agents::InactivityWatcher;
use ember_common::Result;
use ember_config::AppConfig;
use tracing::info;

use crate::bootstrap;
use crate::router::build_router;
use crate::state::SharedState;

/// Owns the HTTP listener and the inactivity watcher lifecycle: the
/// watcher starts when the server starts and is stopped on shutdown.
pub struct GatewayServer {
    config: AppConfig,
    state: SharedState,
    watcher: Option<InactivityWatcher>,
}

impl GatewayServer {
    pub fn new(config: AppConfig) -> Result<Self> {
        let (state, watcher) = bootstrap::build_state(&config)?;
        Ok(Self {
            config,
            state,
            watcher: Some(watcher),
        })
    }

    /// Serve until ctrl-c.
    pub async fn run(mut self) -> Result<()> {
        let router = build_router(self.state);

        let addr = format!("{}:{}", self.config.gateway.host, self.config.gateway.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("gateway listening on {addr}");

        let watcher_handle = self.watcher.take().map(InactivityWatcher::start);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        if let Some(handle) = watcher_handle {
            handle.stop().await;
        }
        info!("gateway stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
