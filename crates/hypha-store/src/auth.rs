//! Bearer JWT verification
//!
//! The verified claims are what a scoped connection hands to row-level
//! security, so they are kept as raw JSON next to the subject.

use crate::error::{Result, StoreError};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Key material and algorithm used to verify bearer tokens
#[derive(Clone)]
pub struct AuthConfig {
    key: String,
    algorithm: Algorithm,
}

impl AuthConfig {
    /// `key` is the shared secret for HS* algorithms, a PEM public key otherwise
    pub fn new(key: impl Into<String>, algorithm: &str) -> Result<Self> {
        let algorithm = Algorithm::from_str(algorithm)
            .map_err(|_| StoreError::validation("jwt algorithm", algorithm.to_string()))?;
        Ok(Self {
            key: key.into(),
            algorithm,
        })
    }

    pub fn hs256(secret: impl Into<String>) -> Self {
        Self {
            key: secret.into(),
            algorithm: Algorithm::HS256,
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    fn decoding_key(&self) -> Result<DecodingKey> {
        let pem = self.key.as_bytes();
        let key = match self.algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                return Ok(DecodingKey::from_secret(pem))
            }
            Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(pem),
            Algorithm::EdDSA => DecodingKey::from_ed_pem(pem),
            _ => DecodingKey::from_rsa_pem(pem),
        };
        key.map_err(|e| StoreError::Unauthorized(format!("Invalid verification key: {}", e)))
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// JWT claims; fields beyond the registered ones are preserved
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: u64,
    #[serde(default)]
    pub iat: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Verified caller identity
#[derive(Debug, Clone)]
pub struct AuthInfo {
    pub user_id: String,
    pub claims: Value,
}

impl AuthInfo {
    /// Claims as the JSON string stored in `request.jwt.claims`
    pub fn claims_json(&self) -> String {
        self.claims.to_string()
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let value = header?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Verify signature and expiry of `token`
pub fn verify_jwt(token: &str, config: &AuthConfig) -> Result<AuthInfo> {
    let key = config.decoding_key()?;
    let validation = Validation::new(config.algorithm);
    let data = decode::<Claims>(token, &key, &validation)
        .map_err(|e| StoreError::Unauthorized(e.to_string()))?;
    let claims = serde_json::to_value(&data.claims)?;
    Ok(AuthInfo {
        user_id: data.claims.sub,
        claims,
    })
}

/// Issue an HS* token (for testing purposes)
pub fn create_jwt(secret: &str, sub: &str, ttl_secs: i64) -> Result<String> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| StoreError::Unauthorized(e.to_string()))?
        .as_secs();
    let claims = Claims {
        sub: sub.to_string(),
        exp: now.saturating_add_signed(ttl_secs),
        iat: now,
        role: Some("authenticated".to_string()),
        extra: Map::new(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| StoreError::Unauthorized(e.to_string()))
}
