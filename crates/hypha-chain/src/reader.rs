//! Chain reader for single contract calls and Multicall3 batches
//!
//! [`ChainReader`] is the seam between the aggregators and the JSON-RPC
//! provider. [`AlloyChainReader`] talks to a real node; tests substitute an
//! in-memory implementation.

use crate::abi::multicall::IMulticall3;
use crate::config::ChainConfig;
use crate::conversions::helpers::address_to_string;
use crate::error::{classify_transport_error, ChainError, Result};
use alloy::dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt};
use alloy::json_abi::Function;
use alloy::primitives::{Address, Bytes};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionInput, TransactionRequest};
use alloy::sol_types::{decode_revert_reason, SolCall};
use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// One read-only contract call
#[derive(Debug, Clone)]
pub struct ContractCall {
    /// Contract address
    pub target: Address,
    /// Parsed function signature including outputs
    pub function: Function,
    /// Positional arguments
    pub args: Vec<DynSolValue>,
}

impl ContractCall {
    /// Build a call from a human-readable signature such as
    /// `function decimals() view returns (uint8)`
    pub fn new(target: Address, signature: &str, args: Vec<DynSolValue>) -> Result<Self> {
        let function = Function::parse(signature)
            .map_err(|e| ChainError::Abi(format!("invalid signature '{}': {}", signature, e)))?;
        Ok(Self {
            target,
            function,
            args,
        })
    }

    /// `0x…::functionName`, used in logs and error messages
    pub fn label(&self) -> String {
        format!("{}::{}", address_to_string(self.target), self.function.name)
    }

    /// ABI-encoded calldata (selector + arguments)
    pub fn calldata(&self) -> Result<Bytes> {
        self.function
            .abi_encode_input(&self.args)
            .map(Bytes::from)
            .map_err(|e| ChainError::Abi(format!("{}: {}", self.label(), e)))
    }

    /// Decode raw return data into the function's output tuple
    pub fn decode_output(&self, data: &[u8]) -> Result<Vec<DynSolValue>> {
        self.function
            .abi_decode_output(data)
            .map_err(|e| ChainError::Abi(format!("{}: {}", self.label(), e)))
    }
}

/// Result of one element of a multicall batch
#[derive(Debug)]
pub enum CallOutcome {
    /// Decoded output tuple
    Success(Vec<DynSolValue>),
    /// The element failed independently of the rest of the batch
    Failure(ChainError),
}

impl CallOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn into_result(self) -> Result<Vec<DynSolValue>> {
        match self {
            Self::Success(values) => Ok(values),
            Self::Failure(err) => Err(err),
        }
    }
}

/// Read access to EVM contracts
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Issue one contract call and decode its output tuple
    async fn read(&self, call: &ContractCall) -> Result<Vec<DynSolValue>>;

    /// Issue a batch of calls in one round trip.
    ///
    /// With `allow_failure = false` the first failing element aborts the whole
    /// batch with an error naming that element. With `allow_failure = true`
    /// every element resolves on its own.
    async fn multicall(
        &self,
        calls: &[ContractCall],
        allow_failure: bool,
    ) -> Result<Vec<CallOutcome>>;

    /// Strict multicall returning bare output tuples
    async fn multicall_strict(&self, calls: &[ContractCall]) -> Result<Vec<Vec<DynSolValue>>> {
        let outcomes = self.multicall(calls, false).await?;
        settle(calls, outcomes, false)?
            .into_iter()
            .map(CallOutcome::into_result)
            .collect()
    }
}

/// Enforce the batch contract on raw per-element outcomes.
///
/// The response length must match the request length regardless of mode.
pub fn settle(
    calls: &[ContractCall],
    outcomes: Vec<CallOutcome>,
    allow_failure: bool,
) -> Result<Vec<CallOutcome>> {
    if outcomes.len() != calls.len() {
        return Err(ChainError::LengthMismatch {
            expected: calls.len(),
            actual: outcomes.len(),
        });
    }

    if allow_failure {
        return Ok(outcomes);
    }

    let mut settled = Vec::with_capacity(outcomes.len());
    for (index, (outcome, call)) in outcomes.into_iter().zip(calls).enumerate() {
        match outcome {
            CallOutcome::Failure(source) => {
                return Err(ChainError::MulticallElement {
                    index,
                    call: call.label(),
                    source: Box::new(source),
                });
            }
            success => settled.push(success),
        }
    }
    Ok(settled)
}

/// [`ChainReader`] backed by an alloy HTTP provider and Multicall3
pub struct AlloyChainReader {
    rpc_url: String,
    multicall_address: Address,
    provider: OnceCell<DynProvider>,
}

impl AlloyChainReader {
    /// Create a reader; the provider is connected lazily on first use
    pub fn new(config: &ChainConfig) -> Result<Self> {
        let multicall_address = crate::config::parse_address(&config.multicall_address)?;
        Ok(Self {
            rpc_url: config.rpc_url.clone(),
            multicall_address,
            provider: OnceCell::new(),
        })
    }

    async fn provider(&self) -> Result<&DynProvider> {
        self.provider
            .get_or_try_init(|| async {
                let rpc_url = self
                    .rpc_url
                    .parse()
                    .map_err(|e| ChainError::Configuration(format!("Invalid RPC URL: {}", e)))?;
                debug!("Connecting chain reader to {}", self.rpc_url);
                Ok(ProviderBuilder::new().connect_http(rpc_url).erased())
            })
            .await
    }

    async fn eth_call(&self, target: Address, data: Bytes, label: &str) -> Result<Bytes> {
        let provider = self.provider().await?;
        let tx = TransactionRequest::default()
            .to(target)
            .input(TransactionInput::new(data));

        provider.call(tx).await.map_err(|e| {
            let err = classify_transport_error(&e, label);
            warn!("eth_call {} failed ({:?}): {}", label, err.kind(), err);
            err
        })
    }
}

#[async_trait]
impl ChainReader for AlloyChainReader {
    async fn read(&self, call: &ContractCall) -> Result<Vec<DynSolValue>> {
        let label = call.label();
        debug!("Reading {}", label);
        let raw = self.eth_call(call.target, call.calldata()?, &label).await?;
        call.decode_output(&raw)
    }

    async fn multicall(
        &self,
        calls: &[ContractCall],
        allow_failure: bool,
    ) -> Result<Vec<CallOutcome>> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }

        // Elements are always sent with allowFailure=true so a strict batch can
        // still name the element that failed.
        let mut encoded = Vec::with_capacity(calls.len());
        for call in calls {
            encoded.push(IMulticall3::Call3 {
                target: call.target,
                allowFailure: true,
                callData: call.calldata()?,
            });
        }

        debug!(
            "Multicall of {} calls (allow_failure={})",
            calls.len(),
            allow_failure
        );
        let data = IMulticall3::aggregate3Call { calls: encoded }.abi_encode();
        let raw = self
            .eth_call(self.multicall_address, data.into(), "multicall3::aggregate3")
            .await?;
        let results = IMulticall3::aggregate3Call::abi_decode_returns(&raw)
            .map_err(|e| ChainError::Abi(format!("aggregate3 returns: {}", e)))?;

        if results.len() != calls.len() {
            return Err(ChainError::LengthMismatch {
                expected: calls.len(),
                actual: results.len(),
            });
        }

        let outcomes = results
            .into_iter()
            .zip(calls)
            .map(|(result, call)| {
                if result.success {
                    match call.decode_output(&result.returnData) {
                        Ok(values) => CallOutcome::Success(values),
                        Err(err) => CallOutcome::Failure(err),
                    }
                } else {
                    let reason = decode_revert_reason(&result.returnData)
                        .unwrap_or_else(|| format!("0x{}", hex::encode(&result.returnData)));
                    CallOutcome::Failure(ChainError::Reverted {
                        call: call.label(),
                        reason,
                    })
                }
            })
            .collect::<Vec<_>>();

        settle(calls, outcomes, allow_failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, U256};

    fn decimals_call() -> ContractCall {
        ContractCall::new(
            address!("0000000000000000000000000000000000000abc"),
            "function decimals() view returns (uint8)",
            vec![],
        )
        .unwrap()
    }

    #[test]
    fn test_contract_call_label() {
        assert_eq!(
            decimals_call().label(),
            "0x0000000000000000000000000000000000000abc::decimals"
        );
    }

    #[test]
    fn test_calldata_starts_with_selector() {
        let call = ContractCall::new(
            Address::ZERO,
            "function getSpacePayments(uint256 spaceId) view returns (uint256 expiryTime, bool freeTrialUsed)",
            vec![DynSolValue::Uint(U256::from(42), 256)],
        )
        .unwrap();
        let data = call.calldata().unwrap();
        assert_eq!(data.len(), 4 + 32);
        assert_eq!(&data[..4], call.function.selector().as_slice());
    }

    #[test]
    fn test_invalid_signature() {
        let err = ContractCall::new(Address::ZERO, "not a function", vec![]).unwrap_err();
        assert!(matches!(err, ChainError::Abi(_)));
    }

    #[test]
    fn test_settle_strict_names_failing_element() {
        let calls = vec![decimals_call(), decimals_call()];
        let outcomes = vec![
            CallOutcome::Success(vec![DynSolValue::Uint(U256::from(18), 8)]),
            CallOutcome::Failure(ChainError::Reverted {
                call: calls[1].label(),
                reason: "boom".to_string(),
            }),
        ];
        let err = settle(&calls, outcomes, false).unwrap_err();
        match err {
            ChainError::MulticallElement { index, call, .. } => {
                assert_eq!(index, 1);
                assert!(call.ends_with("::decimals"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_settle_allow_failure_keeps_successes() {
        let calls = vec![decimals_call(), decimals_call()];
        let outcomes = vec![
            CallOutcome::Failure(ChainError::Network("reset".to_string())),
            CallOutcome::Success(vec![DynSolValue::Uint(U256::from(6), 8)]),
        ];
        let settled = settle(&calls, outcomes, true).unwrap();
        assert!(!settled[0].is_success());
        assert!(settled[1].is_success());
    }

    #[test]
    fn test_settle_length_mismatch() {
        let calls = vec![decimals_call(), decimals_call()];
        let outcomes = vec![CallOutcome::Success(vec![])];
        assert!(matches!(
            settle(&calls, outcomes, true),
            Err(ChainError::LengthMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_reader_rejects_bad_multicall_address() {
        let config = ChainConfig {
            multicall_address: "0xnothex".to_string(),
            ..ChainConfig::default()
        };
        assert!(AlloyChainReader::new(&config).is_err());
    }
}
