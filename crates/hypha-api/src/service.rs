use crate::config::ServiceConfig;
use crate::routes::router;
use crate::state::AppState;
use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

pub struct ApiServiceRunner {
    config: ServiceConfig,
    state: AppState,
}

impl ApiServiceRunner {
    /// Connect to the database and chain and build the application state
    pub async fn new(config: ServiceConfig) -> Result<Self> {
        let state = AppState::from_config(&config).await?;
        Ok(Self { config, state })
    }

    /// Serve the HTTP API until the listener fails
    pub async fn run(self) -> Result<()> {
        let addr = self.config.listen_addr;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding {}", addr))?;
        info!(
            "Hypha API listening on {} ({:?}, {} webhook keys)",
            addr,
            self.config.api.environment,
            self.config.api.webhook_keys.configured()
        );

        axum::serve(listener, router(self.state))
            .await
            .context("HTTP server failed")?;
        Ok(())
    }
}
