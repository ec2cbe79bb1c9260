//! Service configuration

use hypha_chain::GovernanceEventKind;
use hypha_store::AuthConfig;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

pub const DEFAULT_PRICE_CACHE_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_SSE_KEEP_ALIVE: Duration = Duration::from_secs(15);

/// Deployment environment; only production enforces webhook signatures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Production,
    Staging,
    Development,
    Test,
}

impl AppEnv {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl FromStr for AppEnv {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "staging" => Ok(Self::Staging),
            "development" | "dev" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            other => Err(format!("unknown environment: {}", other)),
        }
    }
}

/// HMAC signing key per webhook endpoint
#[derive(Clone, Default)]
pub struct WebhookKeys {
    keys: HashMap<GovernanceEventKind, String>,
}

impl WebhookKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the key for `kind`; empty keys are ignored
    pub fn with_key(mut self, kind: GovernanceEventKind, key: Option<String>) -> Self {
        if let Some(key) = key.filter(|k| !k.is_empty()) {
            self.keys.insert(kind, key);
        }
        self
    }

    pub fn get(&self, kind: GovernanceEventKind) -> Option<&str> {
        self.keys.get(&kind).map(String::as_str)
    }

    pub fn configured(&self) -> usize {
        self.keys.len()
    }
}

impl std::fmt::Debug for WebhookKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&str> = self.keys.keys().map(|k| k.name()).collect();
        kinds.sort_unstable();
        f.debug_struct("WebhookKeys").field("configured", &kinds).finish()
    }
}

/// Settings the HTTP layer needs, independent of how collaborators are built
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub environment: AppEnv,
    pub auth: AuthConfig,
    pub webhook_keys: WebhookKeys,
    pub sse_keep_alive: Duration,
}

/// Everything the binary needs to start
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub database_url: String,
    pub chain_config: PathBuf,
    pub listen_addr: SocketAddr,
    pub price_api_url: Option<Url>,
    pub price_cache_ttl: Duration,
    pub api: ApiSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_env_parsing() {
        assert_eq!("production".parse::<AppEnv>().unwrap(), AppEnv::Production);
        assert_eq!("Dev".parse::<AppEnv>().unwrap(), AppEnv::Development);
        assert!("prod".parse::<AppEnv>().unwrap().is_production());
        assert!(!"test".parse::<AppEnv>().unwrap().is_production());
        assert!("qa".parse::<AppEnv>().is_err());
    }

    #[test]
    fn test_webhook_keys_skip_empty() {
        let keys = WebhookKeys::new()
            .with_key(GovernanceEventKind::SpaceCreated, Some("k1".into()))
            .with_key(GovernanceEventKind::ProposalCreated, Some(String::new()))
            .with_key(GovernanceEventKind::ProposalExecuted, None);
        assert_eq!(keys.get(GovernanceEventKind::SpaceCreated), Some("k1"));
        assert_eq!(keys.get(GovernanceEventKind::ProposalCreated), None);
        assert_eq!(keys.configured(), 1);
        assert!(!format!("{:?}", keys).contains("k1"));
    }
}
