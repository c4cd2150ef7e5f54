//! Nullable asset ledger: an in-memory token that can misbehave on demand.
//!
//! Beyond plain balances and allowances it can:
//! - grow or shrink any balance out of band (`mint`, `burn`), the way a
//!   rebasing asset changes holders' balances without a transfer;
//! - charge a fee on transfers and reflect it to every other holder, the way
//!   a fee-redistributing asset does;
//! - reject transfers to chosen recipients;
//! - run a hook after each transfer, which is how tests re-enter the pool from
//!   inside a ledger call.

use stakepool_token::{AssetLedger, LedgerError};
use stakepool_types::{mul_div_floor, AccountAddress};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};

/// Basis-point denominator for transfer fees.
const BPS: u128 = 10_000;

/// A completed transfer as seen by the post-transfer hook.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferRecord {
    pub from: AccountAddress,
    pub to: AccountAddress,
    /// Amount debited from `from`.
    pub amount: u128,
    /// Amount credited to `to` after fees.
    pub received: u128,
}

/// Called after every successful transfer.
pub type TransferHook = Box<dyn FnMut(&TransferRecord)>;

#[derive(Clone, Debug, Default)]
struct Books {
    balances: BTreeMap<AccountAddress, u128>,
    allowances: BTreeMap<(AccountAddress, AccountAddress), u128>,
}

impl Books {
    fn balance(&self, account: &AccountAddress) -> u128 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn set_balance(&mut self, account: &AccountAddress, amount: u128) {
        if amount == 0 {
            self.balances.remove(account);
        } else {
            self.balances.insert(account.clone(), amount);
        }
    }

    /// Spread `fee` over every holder except `from` and `to`, pro rata.
    /// Whatever rounds away is burned.
    fn reflect(&mut self, fee: u128, from: &AccountAddress, to: &AccountAddress) {
        let eligible: u128 = self
            .balances
            .iter()
            .filter(|(holder, _)| *holder != from && *holder != to)
            .map(|(_, balance)| *balance)
            .sum();
        if eligible == 0 {
            return;
        }
        for (holder, balance) in self.balances.iter_mut() {
            if holder == from || holder == to {
                continue;
            }
            let cut = mul_div_floor(fee, *balance, eligible).unwrap_or(0);
            *balance = balance.saturating_add(cut);
        }
    }
}

#[derive(Default)]
pub struct NullLedger {
    books: RefCell<Books>,
    journal: RefCell<Vec<Books>>,
    fee_bps: Cell<u16>,
    fee_exempt: RefCell<BTreeSet<AccountAddress>>,
    rejecting: RefCell<BTreeSet<AccountAddress>>,
    hook: RefCell<Option<TransferHook>>,
    attempts: Cell<usize>,
}

impl NullLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `amount` out of thin air in `account`.
    pub fn mint(&self, account: &AccountAddress, amount: u128) {
        let mut books = self.books.borrow_mut();
        let balance = books.balance(account).saturating_add(amount);
        books.set_balance(account, balance);
    }

    /// Destroy up to `amount` held by `account`.
    pub fn burn(&self, account: &AccountAddress, amount: u128) {
        let mut books = self.books.borrow_mut();
        let balance = books.balance(account).saturating_sub(amount);
        books.set_balance(account, balance);
    }

    pub fn approve(&self, owner: &AccountAddress, spender: &AccountAddress, amount: u128) {
        self.books
            .borrow_mut()
            .allowances
            .insert((owner.clone(), spender.clone()), amount);
    }

    pub fn allowance(&self, owner: &AccountAddress, spender: &AccountAddress) -> u128 {
        self.books
            .borrow()
            .allowances
            .get(&(owner.clone(), spender.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Sum of all balances.
    pub fn total_supply(&self) -> u128 {
        self.books.borrow().balances.values().sum()
    }

    /// Charge `bps` basis points on every transfer not touching an exempt
    /// account, reflected to the other holders.
    pub fn set_fee_bps(&self, bps: u16) {
        self.fee_bps.set(bps);
    }

    pub fn exempt_from_fee(&self, account: &AccountAddress) {
        self.fee_exempt.borrow_mut().insert(account.clone());
    }

    pub fn include_in_fee(&self, account: &AccountAddress) {
        self.fee_exempt.borrow_mut().remove(account);
    }

    /// Make every transfer to `recipient` fail until [`NullLedger::accept_transfers_to`].
    pub fn reject_transfers_to(&self, recipient: &AccountAddress) {
        self.rejecting.borrow_mut().insert(recipient.clone());
    }

    pub fn accept_transfers_to(&self, recipient: &AccountAddress) {
        self.rejecting.borrow_mut().remove(recipient);
    }

    /// Install a hook run after each successful transfer, replacing any
    /// previous one.
    pub fn on_transfer(&self, hook: impl FnMut(&TransferRecord) + 'static) {
        *self.hook.borrow_mut() = Some(Box::new(hook));
    }

    pub fn clear_hook(&self) {
        self.hook.borrow_mut().take();
    }

    /// Number of `transfer`/`transfer_from` calls made, successful or not.
    pub fn transfer_count(&self) -> usize {
        self.attempts.get()
    }

    /// Open atomic sections.
    pub fn journal_depth(&self) -> usize {
        self.journal.borrow().len()
    }

    fn move_funds(
        &self,
        from: &AccountAddress,
        to: &AccountAddress,
        amount: u128,
    ) -> Result<TransferRecord, LedgerError> {
        if self.rejecting.borrow().contains(to) {
            return Err(LedgerError::Rejected(format!("recipient {to} refuses transfers")));
        }

        let exempt = {
            let exempt = self.fee_exempt.borrow();
            exempt.contains(from) || exempt.contains(to)
        };
        let fee = if exempt {
            0
        } else {
            mul_div_floor(amount, self.fee_bps.get() as u128, BPS).unwrap_or(0)
        };

        let mut books = self.books.borrow_mut();
        let available = books.balance(from);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                needed: amount,
                available,
            });
        }
        let received = amount - fee;
        books.set_balance(from, available - amount);
        let to_balance = books.balance(to).saturating_add(received);
        books.set_balance(to, to_balance);
        if fee > 0 {
            books.reflect(fee, from, to);
        }
        tracing::trace!(%from, %to, amount, fee, "null ledger transfer");

        Ok(TransferRecord {
            from: from.clone(),
            to: to.clone(),
            amount,
            received,
        })
    }

    fn run_hook(&self, record: &TransferRecord) {
        // Taken out for the call so the hook may itself transfer on this ledger.
        let hook = self.hook.borrow_mut().take();
        if let Some(mut hook) = hook {
            hook(record);
            let mut slot = self.hook.borrow_mut();
            if slot.is_none() {
                *slot = Some(hook);
            }
        }
    }
}

impl AssetLedger for NullLedger {
    fn balance_of(&self, account: &AccountAddress) -> u128 {
        self.books.borrow().balance(account)
    }

    fn transfer(
        &self,
        from: &AccountAddress,
        to: &AccountAddress,
        amount: u128,
    ) -> Result<(), LedgerError> {
        self.attempts.set(self.attempts.get() + 1);
        let record = self.move_funds(from, to, amount)?;
        self.run_hook(&record);
        Ok(())
    }

    fn transfer_from(
        &self,
        spender: &AccountAddress,
        from: &AccountAddress,
        to: &AccountAddress,
        amount: u128,
    ) -> Result<(), LedgerError> {
        self.attempts.set(self.attempts.get() + 1);
        let approved = self.allowance(from, spender);
        if approved < amount {
            return Err(LedgerError::InsufficientAllowance {
                needed: amount,
                approved,
            });
        }
        let record = self.move_funds(from, to, amount)?;
        self.approve(from, spender, approved - amount);
        self.run_hook(&record);
        Ok(())
    }

    fn begin(&self) {
        let snapshot = self.books.borrow().clone();
        self.journal.borrow_mut().push(snapshot);
    }

    fn commit(&self) {
        self.journal.borrow_mut().pop();
    }

    fn rollback(&self) {
        if let Some(snapshot) = self.journal.borrow_mut().pop() {
            *self.books.borrow_mut() = snapshot;
        }
    }
}
