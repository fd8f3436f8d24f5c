//! Common utility and helper functions that are used across the project

use std::str::FromStr;

use alloy_primitives::{Address, U256};
use candid::Nat;
use num_bigint::BigUint;

use crate::constants::scale;

use super::error::*;

/// Returns Err if the `caller` is not one of the `allowed` roles
pub fn only_roles(caller: Address, allowed: &[Address]) -> StrategyResult<()> {
    if !allowed.contains(&caller) {
        return Err(StrategyError::Unauthorized);
    }
    Ok(())
}

/// Converts String to Address and returns StrategyError on failure
pub fn string_to_address(input: String) -> StrategyResult<Address> {
    Address::from_str(&input).map_err(|err| StrategyError::DecodingError(format!("{:#?}", err)))
}

/// Converts values of type `Nat` to `U256`
pub fn nat_to_u256(n: &Nat) -> StrategyResult<U256> {
    let be_bytes = n.0.to_bytes_be();
    if be_bytes.len() > 32 {
        return Err(StrategyError::DecodingError("The `Nat` input length exceedes 32 bytes when converted to big-endian bytes representation.".to_string()));
    }
    // Ensure the byte array is exactly 32 bytes long
    let mut padded_bytes = [0u8; 32];
    let start_pos = 32 - be_bytes.len();
    padded_bytes[start_pos..].copy_from_slice(&be_bytes);

    Ok(U256::from_be_bytes(padded_bytes))
}

/// Converts values of type `U256` to `Nat`
pub fn u256_to_nat(value: &U256) -> Nat {
    Nat(BigUint::from_bytes_be(&value.to_be_bytes::<32>()))
}

/// `a * b / denominator`, rounded down
pub fn mul_div_down(a: U256, b: U256, denominator: U256) -> StrategyResult<U256> {
    if denominator.is_zero() {
        return Err(arithmetic_err("Division by zero."));
    }
    let product = a
        .checked_mul(b)
        .ok_or_else(|| arithmetic_err("Multiplication overflowed."))?;
    Ok(product / denominator)
}

/// `a * b / denominator`, rounded up
pub fn mul_div_up(a: U256, b: U256, denominator: U256) -> StrategyResult<U256> {
    if denominator.is_zero() {
        return Err(arithmetic_err("Division by zero."));
    }
    let product = a
        .checked_mul(b)
        .ok_or_else(|| arithmetic_err("Multiplication overflowed."))?;
    let quotient = product / denominator;
    if (product % denominator).is_zero() {
        Ok(quotient)
    } else {
        Ok(quotient + U256::from(1))
    }
}

/// Value of `shares` at `price_per_share` (e18), rounded down
pub fn shares_to_value(shares: U256, price_per_share: U256) -> StrategyResult<U256> {
    mul_div_down(shares, price_per_share, scale())
}

/// Shares worth at most `value` at `price_per_share` (e18)
pub fn value_to_shares_down(value: U256, price_per_share: U256) -> StrategyResult<U256> {
    mul_div_down(value, scale(), price_per_share)
}

/// Shares worth at least `value` at `price_per_share` (e18)
pub fn value_to_shares_up(value: U256, price_per_share: U256) -> StrategyResult<U256> {
    mul_div_up(value, scale(), price_per_share)
}
