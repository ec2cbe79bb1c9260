//! Helper functions for pulling typed fields out of decoded ABI tuples

use crate::error::{ChainError, Result};
use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, Bytes, U256};

/// Convert Alloy Address to hex string with 0x prefix
pub fn address_to_string(addr: Address) -> String {
    format!("0x{:x}", addr)
}

/// Convert Solidity timestamp (U256) to u64
/// Safely handles overflow by capping at u64::MAX
pub fn timestamp_to_u64(timestamp: U256) -> u64 {
    if timestamp > U256::from(u64::MAX) {
        u64::MAX
    } else {
        timestamp.to::<u64>()
    }
}

/// Narrow a token amount to a display float, scaled by `decimals`.
///
/// Only for presentation; arithmetic stays on `U256`.
pub fn format_units(amount: U256, decimals: u8) -> f64 {
    let divisor = U256::from(10u64).pow(U256::from(decimals));
    let whole = amount / divisor;
    let fraction = amount % divisor;
    u256_to_f64(whole) + u256_to_f64(fraction) / u256_to_f64(divisor)
}

/// Lossy conversion used at the display boundary
pub fn u256_to_f64(value: U256) -> f64 {
    value.to_string().parse::<f64>().unwrap_or(f64::MAX)
}

/// Fail unless the tuple has exactly `expected` fields
pub fn expect_arity(context: &'static str, values: &[DynSolValue], expected: usize) -> Result<()> {
    if values.len() != expected {
        return Err(ChainError::Arity {
            context,
            expected,
            actual: values.len(),
        });
    }
    Ok(())
}

pub fn as_uint(context: &'static str, field: &str, value: &DynSolValue) -> Result<U256> {
    value
        .as_uint()
        .map(|(v, _)| v)
        .ok_or_else(|| type_error(context, field, "uint", value))
}

pub fn as_bool(context: &'static str, field: &str, value: &DynSolValue) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| type_error(context, field, "bool", value))
}

pub fn as_address(context: &'static str, field: &str, value: &DynSolValue) -> Result<Address> {
    value
        .as_address()
        .ok_or_else(|| type_error(context, field, "address", value))
}

pub fn as_bytes(context: &'static str, field: &str, value: &DynSolValue) -> Result<Bytes> {
    value
        .as_bytes()
        .map(|b| Bytes::copy_from_slice(b))
        .ok_or_else(|| type_error(context, field, "bytes", value))
}

pub fn as_array<'a>(
    context: &'static str,
    field: &str,
    value: &'a DynSolValue,
) -> Result<&'a [DynSolValue]> {
    value
        .as_array()
        .or_else(|| value.as_fixed_array())
        .ok_or_else(|| type_error(context, field, "array", value))
}

pub fn as_address_array(
    context: &'static str,
    field: &str,
    value: &DynSolValue,
) -> Result<Vec<Address>> {
    as_array(context, field, value)?
        .iter()
        .map(|item| as_address(context, field, item))
        .collect()
}

pub fn as_uint_array(context: &'static str, field: &str, value: &DynSolValue) -> Result<Vec<U256>> {
    as_array(context, field, value)?
        .iter()
        .map(|item| as_uint(context, field, item))
        .collect()
}

/// Percent field that must lie in [0, 100]
pub fn as_percent(context: &'static str, field: &str, value: &DynSolValue) -> Result<u8> {
    let raw = as_uint(context, field, value)?;
    if raw > U256::from(100u8) {
        return Err(ChainError::decode(
            context,
            format!("{} out of range: {}", field, raw),
        ));
    }
    Ok(raw.to::<u8>())
}

pub(crate) fn type_error(context: &'static str, field: &str, expected: &str, got: &DynSolValue) -> ChainError {
    ChainError::decode(
        context,
        format!(
            "field {} expected {}, got {:?}",
            field,
            expected,
            got.as_type()
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_to_u64_caps() {
        assert_eq!(timestamp_to_u64(U256::from(1_700_000_000u64)), 1_700_000_000);
        assert_eq!(timestamp_to_u64(U256::MAX), u64::MAX);
    }

    #[test]
    fn test_format_units() {
        let amount = U256::from(1_500_000_000_000_000_000u128);
        assert_eq!(format_units(amount, 18), 1.5);
        assert_eq!(format_units(U256::from(2_500_000u64), 6), 2.5);
        assert_eq!(format_units(U256::from(7u64), 0), 7.0);
    }

    #[test]
    fn test_format_units_keeps_precision_of_large_values() {
        // 10^30 wei; converting to f64 before dividing would still be close,
        // but the integer part must be exact here
        let amount = U256::from(10u64).pow(U256::from(30u64));
        assert_eq!(format_units(amount, 18), 1_000_000_000_000.0);
    }

    #[test]
    fn test_expect_arity() {
        let values = vec![DynSolValue::Bool(true)];
        assert!(expect_arity("test", &values, 1).is_ok());
        let err = expect_arity("test", &values, 2).unwrap_err();
        assert!(matches!(
            err,
            ChainError::Arity {
                expected: 2,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_as_percent_range() {
        let ok = DynSolValue::Uint(U256::from(51), 256);
        assert_eq!(as_percent("space", "quorum", &ok).unwrap(), 51);
        let bad = DynSolValue::Uint(U256::from(101), 256);
        assert!(as_percent("space", "quorum", &bad).is_err());
    }

    #[test]
    fn test_type_mismatch_is_decode_error() {
        let value = DynSolValue::Bool(false);
        let err = as_address("getDelegate", "delegate", &value).unwrap_err();
        assert_eq!(err.kind(), crate::error::ChainErrorKind::Decode);
        assert!(err.to_string().contains("delegate"));
    }

    #[test]
    fn test_address_to_string_is_lowercase() {
        let addr = Address::repeat_byte(0xAB);
        assert_eq!(
            address_to_string(addr),
            "0xabababababababababababababababababababab"
        );
    }
}
