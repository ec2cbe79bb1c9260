//! Hypha API server binary

use anyhow::Result;
use clap::Parser;
use dotenvy::dotenv;
use hypha_api::config::{DEFAULT_PRICE_CACHE_TTL, DEFAULT_SSE_KEEP_ALIVE};
use hypha_api::{ApiServiceRunner, ApiSettings, AppEnv, ServiceConfig, WebhookKeys};
use hypha_chain::GovernanceEventKind;
use hypha_store::AuthConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

#[derive(Parser, Debug)]
#[clap(name = "hypha-api")]
#[clap(about = "Hypha governance API - on-chain views, webhooks and proposal event streams")]
struct Args {
    /// Database connection URL
    #[clap(long, env = "DATABASE_URL")]
    database_url: String,

    /// Chain configuration file (TOML)
    #[clap(long, default_value = "chain.toml", env = "CHAIN_CONFIG")]
    chain_config: PathBuf,

    /// Listen address for the HTTP server
    #[clap(long, default_value = "0.0.0.0:8080", env = "LISTEN_ADDR")]
    listen_addr: SocketAddr,

    /// production, staging, development or test
    #[clap(long, default_value = "development", env = "APP_ENV")]
    app_env: AppEnv,

    /// Key used to verify bearer tokens (secret or PEM public key)
    #[clap(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: String,

    #[clap(long, default_value = "HS256", env = "JWT_ALGORITHM")]
    jwt_algorithm: String,

    #[clap(long, env = "WH_SPACE_CREATED_SIGN_KEY", hide_env_values = true)]
    wh_space_created_sign_key: Option<String>,

    #[clap(long, env = "WH_PROPOSAL_CREATED_SIGN_KEY", hide_env_values = true)]
    wh_proposal_created_sign_key: Option<String>,

    #[clap(long, env = "WH_PROPOSAL_EXECUTED_SIGN_KEY", hide_env_values = true)]
    wh_proposal_executed_sign_key: Option<String>,

    #[clap(long, env = "WH_PROPOSAL_REJECTED_SIGN_KEY", hide_env_values = true)]
    wh_proposal_rejected_sign_key: Option<String>,

    /// Base URL of the token price API (prices disabled when unset)
    #[clap(long, env = "PRICE_API_URL")]
    price_api_url: Option<Url>,

    #[clap(long, env = "PRICE_CACHE_TTL_SECS")]
    price_cache_ttl_secs: Option<u64>,

    #[clap(long, env = "SSE_KEEP_ALIVE_SECS")]
    sse_keep_alive_secs: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[clap(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "hypha_api={level},hypha_chain={level},hypha_store={level}",
                    level = args.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Hypha API");
    tracing::info!("Database URL: {}", mask_url(&args.database_url));
    tracing::info!("Chain config: {}", args.chain_config.display());
    tracing::info!("Environment: {:?}", args.app_env);
    match &args.price_api_url {
        Some(url) => tracing::info!("Price API: {}", url),
        None => tracing::warn!("PRICE_API_URL not set - token prices disabled"),
    }

    let webhook_keys = WebhookKeys::new()
        .with_key(GovernanceEventKind::SpaceCreated, args.wh_space_created_sign_key)
        .with_key(GovernanceEventKind::ProposalCreated, args.wh_proposal_created_sign_key)
        .with_key(GovernanceEventKind::ProposalExecuted, args.wh_proposal_executed_sign_key)
        .with_key(GovernanceEventKind::ProposalRejected, args.wh_proposal_rejected_sign_key);
    if args.app_env.is_production() && webhook_keys.configured() < 4 {
        tracing::warn!(
            "Only {} of 4 webhook signing keys configured; unsigned kinds will be refused",
            webhook_keys.configured()
        );
    }

    let config = ServiceConfig {
        database_url: args.database_url,
        chain_config: args.chain_config,
        listen_addr: args.listen_addr,
        price_api_url: args.price_api_url,
        price_cache_ttl: args
            .price_cache_ttl_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_PRICE_CACHE_TTL),
        api: ApiSettings {
            environment: args.app_env,
            auth: AuthConfig::new(args.jwt_secret, &args.jwt_algorithm)?,
            webhook_keys,
            sse_keep_alive: args
                .sse_keep_alive_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_SSE_KEEP_ALIVE),
        },
    };

    let service = ApiServiceRunner::new(config).await?;

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received shutdown signal"),
            Err(e) => {
                tracing::error!("Failed to listen for CTRL+C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        result = service.run() => {
            if let Err(e) = result {
                tracing::error!("Service error: {:#}", e);
                std::process::exit(1);
            }
        }
        _ = shutdown => {
            tracing::info!("Shutting down gracefully");
        }
    }

    tracing::info!("Hypha API stopped");
    Ok(())
}

/// Mask the password of a database URL for logging
fn mask_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => match parsed.password() {
            Some(password) => url.replace(password, "****"),
            None => url.to_string(),
        },
        Err(_) => match url.find('@') {
            Some(at) => match url[..at].rfind(':') {
                Some(colon) => format!("{}:****{}", &url[..colon], &url[at..]),
                None => url.to_string(),
            },
            None => url.to_string(),
        },
    }
}
