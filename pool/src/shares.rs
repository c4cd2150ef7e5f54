//! Elastic share pricing.
//!
//! A share is worth `holdings / total_shares` staked-asset units, where
//! `holdings` is whatever the staked ledger says the pool owns *right now*.
//! Deposits round the minted shares down and withdrawals round the burned
//! shares up, so rounding dust always stays with the pool.

use crate::error::PoolError;
use stakepool_types::{mul_div_ceil, mul_div_floor};

/// Staked-asset value of `shares` at the live price. Zero for an empty pool.
pub fn value_of(shares: u128, total_shares: u128, holdings: u128) -> Result<u128, PoolError> {
    if total_shares == 0 {
        return Ok(0);
    }
    mul_div_floor(shares, holdings, total_shares).ok_or(PoolError::Overflow)
}

/// Shares minted for `credited` units deposited into a pool that held
/// `holdings_before` before the deposit arrived.
///
/// The first depositor mints 1:1.
pub fn shares_for_deposit(
    credited: u128,
    total_shares: u128,
    holdings_before: u128,
) -> Result<u128, PoolError> {
    if total_shares == 0 {
        return Ok(credited);
    }
    if holdings_before == 0 {
        return Err(PoolError::DivisionByZeroGuarded);
    }
    mul_div_floor(credited, total_shares, holdings_before).ok_or(PoolError::Overflow)
}

/// Shares burned to release `amount` units from a pool holding `holdings`.
pub fn shares_for_withdrawal(
    amount: u128,
    total_shares: u128,
    holdings: u128,
) -> Result<u128, PoolError> {
    if holdings == 0 {
        return Err(PoolError::DivisionByZeroGuarded);
    }
    mul_div_ceil(amount, total_shares, holdings).ok_or(PoolError::Overflow)
}
