//! Asset ledger trait.

use crate::LedgerError;
use stakepool_types::AccountAddress;

/// A fungible asset ledger as seen from the pool.
///
/// Methods take `&self`: a ledger is shared between the pool and whoever else
/// moves funds on it, so implementations use interior mutability.
///
/// Each pool entry point brackets its ledger calls with [`begin`], then
/// exactly one of [`commit`] or [`rollback`]. A rollback must restore every
/// balance and allowance touched since the matching `begin`. Brackets may
/// nest when the staked and reward asset are the same ledger.
///
/// [`begin`]: AssetLedger::begin
/// [`commit`]: AssetLedger::commit
/// [`rollback`]: AssetLedger::rollback
pub trait AssetLedger {
    /// Current balance of `account`.
    fn balance_of(&self, account: &AccountAddress) -> u128;

    /// Move `amount` from `from` to `to`, all or nothing.
    fn transfer(
        &self,
        from: &AccountAddress,
        to: &AccountAddress,
        amount: u128,
    ) -> Result<(), LedgerError>;

    /// Move `amount` from `from` to `to` on behalf of `spender`, consuming
    /// allowance granted by `from`.
    fn transfer_from(
        &self,
        spender: &AccountAddress,
        from: &AccountAddress,
        to: &AccountAddress,
        amount: u128,
    ) -> Result<(), LedgerError>;

    /// Open an atomic section.
    fn begin(&self);

    /// Keep everything done since the matching [`AssetLedger::begin`].
    fn commit(&self);

    /// Undo everything done since the matching [`AssetLedger::begin`].
    fn rollback(&self);
}
