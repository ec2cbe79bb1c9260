//! ERC-20 supply reads

use crate::abi::GovernanceCalls;
use crate::conversions::helpers::format_units;
use crate::conversions::{decode_decimals, decode_single_uint, decode_string};
use crate::error::{ChainError, Result};
use crate::reader::{CallOutcome, ChainReader};
use alloy::primitives::{Address, U256};
use std::sync::Arc;
use tracing::debug;

/// Supply of one token; `symbol` is optional in ERC-20
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSupply {
    pub token: Address,
    pub total_supply: U256,
    pub decimals: u8,
    pub symbol: Option<String>,
}

impl TokenSupply {
    /// Supply in whole tokens, narrowed for display
    pub fn formatted(&self) -> f64 {
        format_units(self.total_supply, self.decimals)
    }
}

#[derive(Clone)]
pub struct TokenAggregator {
    reader: Arc<dyn ChainReader>,
}

impl TokenAggregator {
    pub fn new(reader: Arc<dyn ChainReader>) -> Self {
        Self { reader }
    }

    /// `totalSupply`, `decimals` and `symbol` in one batch.
    ///
    /// Supply and decimals are required; a missing symbol is tolerated.
    pub async fn supply(&self, token: Address) -> Result<TokenSupply> {
        let calls = [
            GovernanceCalls::total_supply(token)?,
            GovernanceCalls::decimals(token)?,
            GovernanceCalls::symbol(token)?,
        ];
        let outcomes = self.reader.multicall(&calls, true).await?;
        let [supply, decimals, symbol]: [CallOutcome; 3] =
            outcomes
                .try_into()
                .map_err(|v: Vec<CallOutcome>| ChainError::LengthMismatch {
                    expected: 3,
                    actual: v.len(),
                })?;

        let total_supply = decode_single_uint("totalSupply", &supply.into_result()?)?;
        let decimals = decode_decimals(&decimals.into_result()?)?;
        let symbol = match symbol
            .into_result()
            .and_then(|values| decode_string("symbol", &values))
        {
            Ok(symbol) => Some(symbol),
            Err(e) => {
                debug!("Token {} has no readable symbol: {}", token, e);
                None
            }
        };

        Ok(TokenSupply {
            token,
            total_supply,
            decimals,
            symbol,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversions::space::fixtures::uint;
    use crate::testing::{MockChainReader, MockResponse};
    use alloy::dyn_abi::DynSolValue;

    fn token() -> Address {
        Address::repeat_byte(0x77)
    }

    #[tokio::test]
    async fn test_supply_with_symbol() {
        let reader = Arc::new(MockChainReader::new());
        reader.returns(
            &GovernanceCalls::total_supply(token()).unwrap(),
            vec![DynSolValue::Uint(
                U256::from(1_500_000u64) * U256::from(10u64).pow(U256::from(18)),
                256,
            )],
        );
        reader.returns(&GovernanceCalls::decimals(token()).unwrap(), vec![uint(18)]);
        reader.returns(
            &GovernanceCalls::symbol(token()).unwrap(),
            vec![DynSolValue::String("HYP".to_string())],
        );

        let supply = TokenAggregator::new(reader.clone())
            .supply(token())
            .await
            .unwrap();
        assert_eq!(supply.decimals, 18);
        assert_eq!(supply.symbol.as_deref(), Some("HYP"));
        assert!((supply.formatted() - 1_500_000.0).abs() < 1e-6);
        assert_eq!(reader.multicall_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_symbol_tolerated_missing_supply_not() {
        let reader = Arc::new(MockChainReader::new());
        reader.returns(&GovernanceCalls::total_supply(token()).unwrap(), vec![uint(10)]);
        reader.returns(&GovernanceCalls::decimals(token()).unwrap(), vec![uint(0)]);
        reader.on(
            &GovernanceCalls::symbol(token()).unwrap(),
            MockResponse::Revert("no symbol".to_string()),
        );
        let aggregator = TokenAggregator::new(reader.clone());
        assert_eq!(aggregator.supply(token()).await.unwrap().symbol, None);

        reader.on(
            &GovernanceCalls::total_supply(token()).unwrap(),
            MockResponse::Revert("not a token".to_string()),
        );
        assert!(aggregator.supply(token()).await.is_err());
    }
}
