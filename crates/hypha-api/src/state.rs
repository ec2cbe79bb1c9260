//! Application state and its composition
//!
//! Every collaborator is built here and passed down as a plain value; the
//! handlers never reach for globals.

use crate::config::{ApiSettings, ServiceConfig};
use crate::pricing::{CachedPriceOracle, HttpPriceOracle, PriceOracle};
use crate::webhook::{EventDispatcher, LogDispatcher, WebhookVerifier};
use anyhow::Context;
use hypha_chain::{
    AlloyChainReader, AlloyLogSource, ChainConfig, ChainReader, Deployment, GovernanceCalls,
    ListenerRegistry, LogSource, ProposalAggregator, ProposalEventWatcher, SpaceAggregator,
    TokenAggregator, DEFAULT_POLL_INTERVAL,
};
use hypha_store::{AuthConfig, Database};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Externally built collaborators
pub struct Components {
    pub reader: Arc<dyn ChainReader>,
    pub log_source: Arc<dyn LogSource>,
    pub db: Database,
    pub dispatcher: Arc<dyn EventDispatcher>,
    pub prices: Option<Arc<dyn PriceOracle>>,
}

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub auth: AuthConfig,
    pub spaces: SpaceAggregator,
    pub proposals: ProposalAggregator,
    pub tokens: TokenAggregator,
    pub watcher: ProposalEventWatcher,
    pub prices: Option<Arc<dyn PriceOracle>>,
    pub webhooks: Arc<WebhookVerifier>,
    pub dispatcher: Arc<dyn EventDispatcher>,
    pub keep_alive: Duration,
    /// Refresh interval of polled SSE views
    pub poll_interval: Duration,
}

impl AppState {
    /// Wire aggregators and the event watcher around the given collaborators
    pub fn compose(settings: &ApiSettings, deployment: Deployment, parts: Components) -> Self {
        let calls = GovernanceCalls::new(deployment);
        Self {
            db: parts.db,
            auth: settings.auth.clone(),
            spaces: SpaceAggregator::new(parts.reader.clone(), calls),
            proposals: ProposalAggregator::new(parts.reader.clone(), calls),
            tokens: TokenAggregator::new(parts.reader),
            watcher: ProposalEventWatcher::new(
                parts.log_source,
                ListenerRegistry::new(),
                deployment.proposals,
            ),
            prices: parts.prices,
            webhooks: Arc::new(WebhookVerifier::new(
                settings.environment,
                settings.webhook_keys.clone(),
            )),
            dispatcher: parts.dispatcher,
            keep_alive: settings.sse_keep_alive,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Build production collaborators from configuration
    pub async fn from_config(config: &ServiceConfig) -> anyhow::Result<Self> {
        let chain = ChainConfig::from_file(&config.chain_config).with_context(|| {
            format!("loading chain config {}", config.chain_config.display())
        })?;
        chain.validate().map_err(anyhow::Error::msg)?;
        let deployment = chain.deployment()?;
        info!(
            "Chain {} ({}) via {}",
            chain.chain_id,
            chain.network().map(|n| n.name.as_str()).unwrap_or("custom"),
            chain.rpc_url
        );

        let reader: Arc<dyn ChainReader> = Arc::new(AlloyChainReader::new(&chain)?);
        let log_source: Arc<dyn LogSource> = Arc::new(AlloyLogSource::new(&chain));
        let db = Database::new(&config.database_url).await?;

        let prices = config.price_api_url.clone().map(|url| {
            info!("Price oracle at {} (cache {:?})", url, config.price_cache_ttl);
            let http: Arc<dyn PriceOracle> = Arc::new(HttpPriceOracle::new(url));
            Arc::new(CachedPriceOracle::new(http, config.price_cache_ttl)) as Arc<dyn PriceOracle>
        });

        let state = Self::compose(
            &config.api,
            deployment,
            Components {
                reader,
                log_source,
                db,
                dispatcher: Arc::new(LogDispatcher),
                prices,
            },
        );
        Ok(Self {
            poll_interval: chain.poll_interval(),
            ..state
        })
    }
}
