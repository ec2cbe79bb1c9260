//! Error types for chain reads, tuple decoding and event ingestion

use alloy::transports::{RpcError, TransportError, TransportErrorKind};
use thiserror::Error;

/// Result type alias for chain operations
pub type Result<T> = std::result::Result<T, ChainError>;

/// Coarse classification of a chain failure.
///
/// Assigned once at the provider boundary so downstream code switches on the
/// tag instead of inspecting messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainErrorKind {
    /// Provider answered with HTTP 429 or a rate-limit JSON-RPC error
    RateLimited,
    /// The contract call executed and reverted
    Reverted,
    /// Transport, timeout or any other unclassified provider failure
    Network,
    /// Returned data did not match the expected ABI shape
    Decode,
    /// Local configuration problem (bad address, unknown chain id)
    Configuration,
}

/// Errors that can occur while talking to the governance contracts
#[derive(Debug, Error)]
pub enum ChainError {
    /// RPC provider rate limited the request
    #[error("RPC rate limit exceeded: {0}")]
    RateLimited(String),

    /// Contract call reverted
    #[error("Contract call {call} reverted: {reason}")]
    Reverted {
        /// `target::function` of the failing call
        call: String,
        /// Revert reason or raw error text
        reason: String,
    },

    /// RPC connection or network error
    #[error("RPC error: {0}")]
    Network(String),

    /// A strict multicall element failed
    #[error("Multicall element {index} ({call}) failed: {source}")]
    MulticallElement {
        /// Position of the failing call in the batch
        index: usize,
        /// `target::function` of the failing call
        call: String,
        /// Underlying failure
        #[source]
        source: Box<ChainError>,
    },

    /// Provider returned a different number of results than requested
    #[error("Multicall returned {actual} results for {expected} calls")]
    LengthMismatch {
        /// Number of calls sent
        expected: usize,
        /// Number of results received
        actual: usize,
    },

    /// Tuple did not have the expected number of fields
    #[error("{context}: expected {expected} fields, got {actual}")]
    Arity {
        /// Decoder name
        context: &'static str,
        /// Expected tuple arity
        expected: usize,
        /// Received tuple arity
        actual: usize,
    },

    /// Tuple field had an unexpected type or out-of-range value
    #[error("{context}: {message}")]
    Decode {
        /// Decoder name
        context: &'static str,
        /// What went wrong
        message: String,
    },

    /// ABI encoding/decoding error
    #[error("ABI error: {0}")]
    Abi(String),

    /// Contract event parsing error
    #[error("Failed to parse contract event: {0}")]
    EventParse(String),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid Ethereum address format
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

impl ChainError {
    /// Classification tag for this error
    pub fn kind(&self) -> ChainErrorKind {
        match self {
            Self::RateLimited(_) => ChainErrorKind::RateLimited,
            Self::Reverted { .. } => ChainErrorKind::Reverted,
            Self::Network(_) | Self::LengthMismatch { .. } => ChainErrorKind::Network,
            Self::MulticallElement { source, .. } => source.kind(),
            Self::Arity { .. } | Self::Decode { .. } | Self::Abi(_) | Self::EventParse(_) => {
                ChainErrorKind::Decode
            }
            Self::Configuration(_) | Self::InvalidAddress(_) => ChainErrorKind::Configuration,
        }
    }

    /// Check if this error is retriable
    ///
    /// Rate limits and transport failures are transient; reverts and decode
    /// errors will fail the same way on retry.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self.kind(),
            ChainErrorKind::RateLimited | ChainErrorKind::Network
        )
    }

    /// Check if the provider rate limited this request
    pub fn is_rate_limited(&self) -> bool {
        self.kind() == ChainErrorKind::RateLimited
    }

    /// Check if this error indicates a configuration problem
    pub fn is_configuration_error(&self) -> bool {
        self.kind() == ChainErrorKind::Configuration
    }

    /// Build a decode error for the named decoder
    pub fn decode(context: &'static str, message: impl Into<String>) -> Self {
        Self::Decode {
            context,
            message: message.into(),
        }
    }
}

/// Classify a transport error returned by the provider.
///
/// `call` names the contract call (`target::function`) for revert messages.
pub fn classify_transport_error(err: &TransportError, call: &str) -> ChainError {
    match err {
        RpcError::Transport(TransportErrorKind::HttpError(http)) if http.status == 429 => {
            ChainError::RateLimited(format!("HTTP 429 from provider: {}", http.body))
        }
        RpcError::ErrorResp(payload) => {
            let message = payload.message.to_string();
            if payload.code == 429 || is_rate_limit_message(&message) {
                ChainError::RateLimited(message)
            } else if payload.code == 3 || message.to_ascii_lowercase().contains("revert") {
                ChainError::Reverted {
                    call: call.to_string(),
                    reason: message,
                }
            } else {
                ChainError::Network(format!("JSON-RPC error {}: {}", payload.code, message))
            }
        }
        other => {
            let message = other.to_string();
            if is_rate_limit_message(&message) {
                ChainError::RateLimited(message)
            } else {
                ChainError::Network(message)
            }
        }
    }
}

fn is_rate_limit_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("rate limit") || lower.contains("too many requests")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            ChainError::RateLimited("429".to_string()).kind(),
            ChainErrorKind::RateLimited
        );
        assert_eq!(
            ChainError::Reverted {
                call: "0x01::getSpaceDetails".to_string(),
                reason: "execution reverted".to_string()
            }
            .kind(),
            ChainErrorKind::Reverted
        );
        assert_eq!(
            ChainError::Network("connection refused".to_string()).kind(),
            ChainErrorKind::Network
        );
        assert_eq!(
            ChainError::Arity {
                context: "getSpaceDetails",
                expected: 10,
                actual: 9
            }
            .kind(),
            ChainErrorKind::Decode
        );
    }

    #[test]
    fn test_multicall_element_inherits_kind() {
        let err = ChainError::MulticallElement {
            index: 2,
            call: "0x01::getSpaceProposals".to_string(),
            source: Box::new(ChainError::RateLimited("slow down".to_string())),
        };
        assert!(err.is_rate_limited());
        assert!(err.is_retriable());
    }

    #[test]
    fn test_is_retriable() {
        assert!(ChainError::Network("timeout".to_string()).is_retriable());
        assert!(ChainError::RateLimited("429".to_string()).is_retriable());
        assert!(!ChainError::Configuration("bad".to_string()).is_retriable());
        assert!(!ChainError::decode("getProposalCore", "bad bool").is_retriable());
    }

    #[test]
    fn test_is_configuration_error() {
        assert!(ChainError::InvalidAddress("0x12".to_string()).is_configuration_error());
        assert!(!ChainError::Network("test".to_string()).is_configuration_error());
    }

    #[test]
    fn test_rate_limit_message_detection() {
        assert!(is_rate_limit_message("Your app has exceeded its Rate Limit"));
        assert!(is_rate_limit_message("429 Too Many Requests"));
        assert!(!is_rate_limit_message("execution reverted"));
    }

    #[test]
    fn test_error_display() {
        let err = ChainError::LengthMismatch {
            expected: 3,
            actual: 2,
        };
        assert_eq!(err.to_string(), "Multicall returned 2 results for 3 calls");

        let err = ChainError::Arity {
            context: "getSpacePayments",
            expected: 2,
            actual: 3,
        };
        assert_eq!(err.to_string(), "getSpacePayments: expected 2 fields, got 3");
    }
}
