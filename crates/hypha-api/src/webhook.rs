//! Chain-indexer webhook ingestion
//!
//! Bodies are HMAC-SHA256 signed with a per-endpoint key and carry the
//! indexer's log envelope (`event.data.block.logs`). Verification runs on the
//! raw bytes before anything is parsed.

use crate::config::{AppEnv, WebhookKeys};
use alloy::primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use hmac::{Hmac, Mac};
use hypha_chain::{ChainError, GovernanceEvent, GovernanceEventKind, RawLog};
use hypha_store::StoreError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::Sha256;
use std::str::FromStr;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub const SIGNATURE_HEADER: &str = "x-alchemy-signature";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing signature header")]
    MissingSignature,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("no signing key configured for {0}")]
    MissingSigningKey(&'static str),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("undecodable logs: {0}")]
    Decode(#[from] ChainError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("dispatch failed: {0}")]
    Dispatch(String),
}

impl WebhookError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingSignature | Self::InvalidSignature => StatusCode::UNAUTHORIZED,
            Self::InvalidPayload(_) | Self::Decode(_) => StatusCode::BAD_REQUEST,
            Self::MissingSigningKey(_) | Self::Store(_) | Self::Dispatch(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Self::MissingSignature | Self::InvalidSignature => "Unauthorized",
            Self::InvalidPayload(_) | Self::Decode(_) => "Invalid body",
            Self::MissingSigningKey(_) | Self::Store(_) | Self::Dispatch(_) => {
                "Internal server error"
            }
        };
        if status.is_server_error() {
            error!("Webhook failed: {}", self);
        } else {
            warn!("Webhook rejected: {}", self);
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Hex HMAC-SHA256 of `body` under `key`
pub fn sign(body: &[u8], key: &str) -> String {
    HmacSha256::new_from_slice(key.as_bytes())
        .map(|mut mac| {
            mac.update(body);
            hex::encode(mac.finalize().into_bytes())
        })
        .unwrap_or_default()
}

/// Constant-time check of a hex signature over `body`
pub fn verify_signature(body: &[u8], signature: &str, key: &str) -> bool {
    let Ok(provided) = hex::decode(signature.trim().trim_start_matches("0x")) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(key.as_bytes()) else {
        return false;
    };
    mac.update(body);
    let expected = mac.finalize().into_bytes();
    expected.as_slice().ct_eq(&provided).into()
}

/// Signature policy for the webhook endpoints
#[derive(Debug, Clone)]
pub struct WebhookVerifier {
    environment: AppEnv,
    keys: WebhookKeys,
}

impl WebhookVerifier {
    pub fn new(environment: AppEnv, keys: WebhookKeys) -> Self {
        Self { environment, keys }
    }

    /// Verify the signature of a `kind` webhook.
    ///
    /// Outside production unsigned requests pass.
    pub fn verify(
        &self,
        kind: GovernanceEventKind,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<(), WebhookError> {
        if !self.environment.is_production() {
            debug!("Skipping {} signature check ({:?})", kind.name(), self.environment);
            return Ok(());
        }
        let key = self
            .keys
            .get(kind)
            .ok_or(WebhookError::MissingSigningKey(kind.name()))?;
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(WebhookError::MissingSignature)?;
        if !verify_signature(body, signature, key) {
            return Err(WebhookError::InvalidSignature);
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    event: EnvelopeEvent,
}

#[derive(Debug, Deserialize)]
struct EnvelopeEvent {
    data: EnvelopeData,
}

#[derive(Debug, Deserialize)]
struct EnvelopeData {
    block: EnvelopeBlock,
}

#[derive(Debug, Deserialize)]
struct EnvelopeBlock {
    #[serde(default)]
    number: Option<u64>,
    #[serde(default)]
    logs: Vec<EnvelopeLog>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeLog {
    data: String,
    topics: Vec<String>,
    #[serde(default)]
    transaction: Option<EnvelopeTransaction>,
    #[serde(default)]
    account: Option<EnvelopeAccount>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeTransaction {
    hash: String,
}

#[derive(Debug, Deserialize)]
struct EnvelopeAccount {
    address: String,
}

fn invalid(field: &str, value: &str) -> WebhookError {
    WebhookError::InvalidPayload(format!("bad {}: {}", field, value))
}

impl EnvelopeLog {
    fn into_raw(self, block_number: Option<u64>) -> Result<RawLog, WebhookError> {
        let topics = self
            .topics
            .iter()
            .map(|t| B256::from_str(t).map_err(|_| invalid("topic", t)))
            .collect::<Result<Vec<_>, _>>()?;
        let data = Bytes::from_str(&self.data).map_err(|_| invalid("data", &self.data))?;
        let transaction_hash = self
            .transaction
            .map(|tx| B256::from_str(&tx.hash).map_err(|_| invalid("transaction hash", &tx.hash)))
            .transpose()?;
        let address = self
            .account
            .map(|a| Address::from_str(&a.address).map_err(|_| invalid("address", &a.address)))
            .transpose()?;
        Ok(RawLog {
            address,
            topics,
            data,
            transaction_hash,
            block_number,
        })
    }
}

/// Parse the indexer envelope into raw logs
pub fn parse_logs(body: &[u8]) -> Result<Vec<RawLog>, WebhookError> {
    let envelope: Envelope =
        serde_json::from_slice(body).map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;
    let block = envelope.event.data.block;
    block
        .logs
        .into_iter()
        .map(|log| log.into_raw(block.number))
        .collect()
}

/// A decoded event plus the off-chain slugs it could be matched to
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchedEvent {
    #[serde(flatten)]
    pub event: GovernanceEvent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space_slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator_slug: Option<String>,
}

impl From<GovernanceEvent> for DispatchedEvent {
    fn from(event: GovernanceEvent) -> Self {
        Self {
            event,
            space_slug: None,
            creator_slug: None,
        }
    }
}

/// Receives every verified and decoded webhook event
#[async_trait]
pub trait EventDispatcher: Send + Sync {
    async fn dispatch(&self, event: DispatchedEvent) -> anyhow::Result<()>;
}

/// Dispatcher that only logs
pub struct LogDispatcher;

#[async_trait]
impl EventDispatcher for LogDispatcher {
    async fn dispatch(&self, event: DispatchedEvent) -> anyhow::Result<()> {
        info!(
            "{} event: {}",
            event.event.kind().name(),
            serde_json::to_string(&event)?
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn envelope(topics: &[&str], data: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "webhookId": "wh_1",
            "event": {"data": {"block": {
                "number": 123,
                "logs": [{
                    "data": data,
                    "topics": topics,
                    "transaction": {"hash": format!("0x{}", "ab".repeat(32))},
                    "account": {"address": format!("0x{}", "02".repeat(20))}
                }]
            }}}
        }))
        .unwrap()
    }

    fn verifier(env: AppEnv) -> WebhookVerifier {
        WebhookVerifier::new(
            env,
            WebhookKeys::new().with_key(GovernanceEventKind::SpaceCreated, Some("key".into())),
        )
    }

    #[test]
    fn test_signature_roundtrip_and_tamper() {
        let body = b"{\"event\":{}}";
        let signature = sign(body, "key");
        assert!(verify_signature(body, &signature, "key"));
        assert!(verify_signature(body, &format!("0x{}", signature), "key"));
        assert!(!verify_signature(b"{\"event\":{ }}", &signature, "key"));
        assert!(!verify_signature(body, &signature, "other"));
        assert!(!verify_signature(body, "zz", "key"));
        assert!(!verify_signature(body, &signature[..10], "key"));
    }

    #[test]
    fn test_production_requires_signature() {
        let body = b"{}";
        let verifier = verifier(AppEnv::Production);
        let mut headers = HeaderMap::new();
        assert!(matches!(
            verifier.verify(GovernanceEventKind::SpaceCreated, &headers, body),
            Err(WebhookError::MissingSignature)
        ));

        headers.insert(
            SIGNATURE_HEADER,
            HeaderValue::from_str(&sign(body, "key")).unwrap(),
        );
        assert!(verifier
            .verify(GovernanceEventKind::SpaceCreated, &headers, body)
            .is_ok());
        assert!(matches!(
            verifier.verify(GovernanceEventKind::SpaceCreated, &headers, b"{ }"),
            Err(WebhookError::InvalidSignature)
        ));
        assert!(matches!(
            verifier.verify(GovernanceEventKind::ProposalCreated, &headers, body),
            Err(WebhookError::MissingSigningKey(_))
        ));
    }

    #[test]
    fn test_development_bypasses_signature() {
        assert!(verifier(AppEnv::Development)
            .verify(GovernanceEventKind::SpaceCreated, &HeaderMap::new(), b"x")
            .is_ok());
    }

    #[test]
    fn test_parse_logs() {
        let topic = format!("0x{}", "11".repeat(32));
        let logs = parse_logs(&envelope(&[&topic], "0x0102")).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].topics[0], B256::repeat_byte(0x11));
        assert_eq!(logs[0].data.as_ref(), &[1, 2]);
        assert_eq!(logs[0].block_number, Some(123));
        assert_eq!(logs[0].address, Some(Address::repeat_byte(0x02)));
        assert_eq!(logs[0].transaction_hash, Some(B256::repeat_byte(0xab)));
    }

    #[test]
    fn test_parse_logs_rejects_bad_hex() {
        assert!(matches!(
            parse_logs(&envelope(&["0xnothex"], "0x")),
            Err(WebhookError::InvalidPayload(_))
        ));
        assert!(matches!(
            parse_logs(b"not json"),
            Err(WebhookError::InvalidPayload(_))
        ));
        assert!(matches!(
            parse_logs(b"{\"event\":{}}"),
            Err(WebhookError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_error_responses_do_not_leak_details() {
        let response = WebhookError::Dispatch("smtp password rejected".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            WebhookError::InvalidSignature.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            WebhookError::InvalidPayload("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
