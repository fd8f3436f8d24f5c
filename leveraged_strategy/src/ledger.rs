//! Position ledger
//!
//! Bookkeeping of the balances one strategy instance holds across the want token,
//! the lending market, the secondary yield vault and the parent vault.
//! The ledger never talks to collaborators: callers record a change only after the
//! matching collaborator call succeeded.

use alloy_primitives::U256;
use candid::{CandidType, Nat};

use crate::utils::{
    common::u256_to_nat,
    error::{StrategyError, StrategyResult},
};

/// Balances of a single strategy instance
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PositionLedger {
    /// Want idle in the strategy
    want_balance: U256,
    /// Want posted as collateral in the lending market
    collateral_amount: U256,
    /// Stablecoin owed to the lending market
    borrowed_amount: U256,
    /// Shares of the secondary yield vault
    invested_shares: U256,
    /// Stablecoin cost basis of `invested_shares`
    invested_basis: U256,
    /// Want owed to the parent vault
    total_debt_to_parent: U256,
}

/// Immutable view of the ledger
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub want_balance: U256,
    pub collateral_amount: U256,
    pub borrowed_amount: U256,
    pub invested_shares: U256,
    pub invested_basis: U256,
    pub total_debt_to_parent: U256,
}

impl LedgerSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }
}

impl PositionLedger {
    /// A ledger with every balance at zero
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns `true` if every balance is zero
    pub fn is_empty(&self) -> bool {
        self.snapshot() == LedgerSnapshot::empty()
    }

    /// Returns a read-only copy of the balances
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            want_balance: self.want_balance,
            collateral_amount: self.collateral_amount,
            borrowed_amount: self.borrowed_amount,
            invested_shares: self.invested_shares,
            invested_basis: self.invested_basis,
            total_debt_to_parent: self.total_debt_to_parent,
        }
    }

    /// Moves the whole content out, leaving an empty ledger behind
    pub fn take(&mut self) -> PositionLedger {
        std::mem::take(self)
    }

    pub fn want_balance(&self) -> U256 {
        self.want_balance
    }

    pub fn collateral_amount(&self) -> U256 {
        self.collateral_amount
    }

    pub fn borrowed_amount(&self) -> U256 {
        self.borrowed_amount
    }

    pub fn invested_shares(&self) -> U256 {
        self.invested_shares
    }

    pub fn invested_basis(&self) -> U256 {
        self.invested_basis
    }

    pub fn total_debt_to_parent(&self) -> U256 {
        self.total_debt_to_parent
    }

    /// Want held either idle or as collateral
    pub fn primary_total(&self) -> U256 {
        self.want_balance.saturating_add(self.collateral_amount)
    }

    /// Records want received by the strategy
    pub fn record_deposit(&mut self, amount: U256) -> &mut Self {
        self.want_balance = self.want_balance.saturating_add(amount);
        self
    }

    /// Records want leaving the strategy
    pub fn record_withdrawal(&mut self, amount: U256) -> StrategyResult<&mut Self> {
        self.want_balance = self
            .want_balance
            .checked_sub(amount)
            .ok_or(StrategyError::InsufficientWant)?;
        Ok(self)
    }

    /// Moves idle want into the collateral position
    pub fn move_to_collateral(&mut self, amount: U256) -> StrategyResult<&mut Self> {
        self.want_balance = self
            .want_balance
            .checked_sub(amount)
            .ok_or(StrategyError::InsufficientWant)?;
        self.collateral_amount = self.collateral_amount.saturating_add(amount);
        Ok(self)
    }

    /// Moves collateral back into idle want
    pub fn release_collateral(&mut self, amount: U256) -> StrategyResult<&mut Self> {
        self.collateral_amount = self
            .collateral_amount
            .checked_sub(amount)
            .ok_or(StrategyError::InsufficientCollateral)?;
        self.want_balance = self.want_balance.saturating_add(amount);
        Ok(self)
    }

    pub fn record_borrow(&mut self, amount: U256) -> &mut Self {
        self.borrowed_amount = self.borrowed_amount.saturating_add(amount);
        self
    }

    pub fn record_repay(&mut self, amount: U256) -> StrategyResult<&mut Self> {
        self.borrowed_amount = self
            .borrowed_amount
            .checked_sub(amount)
            .ok_or(StrategyError::InsufficientCollateral)?;
        Ok(self)
    }

    pub fn record_investment(&mut self, shares: U256) -> &mut Self {
        self.invested_shares = self.invested_shares.saturating_add(shares);
        self
    }

    pub fn record_divestment(&mut self, shares: U256) -> StrategyResult<&mut Self> {
        self.invested_shares = self
            .invested_shares
            .checked_sub(shares)
            .ok_or(StrategyError::InsufficientShares)?;
        Ok(self)
    }

    /// Sets the cost basis of the investment
    pub fn mark_basis(&mut self, basis: U256) -> &mut Self {
        self.invested_basis = basis;
        self
    }

    /// Records want lent by the parent vault
    pub fn record_parent_credit(&mut self, amount: U256) -> &mut Self {
        self.total_debt_to_parent = self.total_debt_to_parent.saturating_add(amount);
        self
    }

    /// Records a debt payment and a realized loss against the parent vault
    pub fn settle_parent_debt(&mut self, payment: U256, loss: U256) -> &mut Self {
        self.total_debt_to_parent = self
            .total_debt_to_parent
            .saturating_sub(payment)
            .saturating_sub(loss);
        self
    }

    /// Replaces the cached lending market and yield vault balances with the
    /// collaborators' records
    pub fn sync_external(
        &mut self,
        collateral_amount: U256,
        borrowed_amount: U256,
        invested_shares: U256,
    ) -> &mut Self {
        self.collateral_amount = collateral_amount;
        self.borrowed_amount = borrowed_amount;
        self.invested_shares = invested_shares;
        self
    }
}

impl From<LedgerSnapshot> for PositionLedger {
    fn from(value: LedgerSnapshot) -> Self {
        Self {
            want_balance: value.want_balance,
            collateral_amount: value.collateral_amount,
            borrowed_amount: value.borrowed_amount,
            invested_shares: value.invested_shares,
            invested_basis: value.invested_basis,
            total_debt_to_parent: value.total_debt_to_parent,
        }
    }
}

/// Candid view of the ledger
#[derive(Clone, Default, CandidType)]
pub struct LedgerQuery {
    pub want_balance: Nat,
    pub collateral_amount: Nat,
    pub borrowed_amount: Nat,
    pub invested_shares: Nat,
    pub invested_basis: Nat,
    pub total_debt_to_parent: Nat,
}

impl From<LedgerSnapshot> for LedgerQuery {
    fn from(value: LedgerSnapshot) -> Self {
        Self {
            want_balance: u256_to_nat(&value.want_balance),
            collateral_amount: u256_to_nat(&value.collateral_amount),
            borrowed_amount: u256_to_nat(&value.borrowed_amount),
            invested_shares: u256_to_nat(&value.invested_shares),
            invested_basis: u256_to_nat(&value.invested_basis),
            total_debt_to_parent: u256_to_nat(&value.total_debt_to_parent),
        }
    }
}
