//! USD price lookups for tokens
//!
//! The HTTP client is built once on first use and prices are cached for a
//! fixed TTL.

use crate::cache::{LazyClient, TtlCache};
use alloy::primitives::Address;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, Error)]
pub enum PriceError {
    #[error("price provider rate limited the request")]
    RateLimited,

    #[error("price provider unavailable: {0}")]
    Unavailable(String),
}

/// Source of USD token prices; `None` means the token has no price
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn usd_price(&self, token: Address) -> Result<Option<f64>, PriceError>;
}

#[derive(Deserialize)]
struct PriceResponse {
    price: Option<f64>,
}

/// Price oracle backed by `GET {base}/prices/{token}` returning `{"price": number|null}`
pub struct HttpPriceOracle {
    base_url: Url,
    client: LazyClient<reqwest::Client>,
}

impl HttpPriceOracle {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            client: LazyClient::new(|| async {
                let client = reqwest::Client::builder()
                    .timeout(Duration::from_secs(10))
                    .build()?;
                Ok::<_, anyhow::Error>(client)
            }),
        }
    }

    fn price_url(&self, token: Address) -> Result<Url, PriceError> {
        self.base_url
            .join(&format!("prices/{:#x}", token))
            .map_err(|e| PriceError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl PriceOracle for HttpPriceOracle {
    async fn usd_price(&self, token: Address) -> Result<Option<f64>, PriceError> {
        let client = self
            .client
            .get()
            .await
            .map_err(|e| PriceError::Unavailable(e.to_string()))?;
        let response = client
            .get(self.price_url(token)?)
            .send()
            .await
            .map_err(|e| PriceError::Unavailable(e.to_string()))?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => Err(PriceError::RateLimited),
            StatusCode::NOT_FOUND => Ok(None),
            status if !status.is_success() => {
                Err(PriceError::Unavailable(format!("HTTP {}", status)))
            }
            _ => {
                let body: PriceResponse = response
                    .json()
                    .await
                    .map_err(|e| PriceError::Unavailable(e.to_string()))?;
                Ok(body.price)
            }
        }
    }
}

/// Caches another oracle's answers, including "no price"
pub struct CachedPriceOracle {
    inner: Arc<dyn PriceOracle>,
    cache: TtlCache<Address, Option<f64>>,
}

impl CachedPriceOracle {
    pub fn new(inner: Arc<dyn PriceOracle>, ttl: Duration) -> Self {
        Self {
            inner,
            cache: TtlCache::new(ttl),
        }
    }
}

#[async_trait]
impl PriceOracle for CachedPriceOracle {
    async fn usd_price(&self, token: Address) -> Result<Option<f64>, PriceError> {
        self.cache
            .get_or_try_insert_with(token, || async {
                debug!("Price cache miss for {:#x}", token);
                self.inner.usd_price(token).await
            })
            .await
    }
}
