//! Collaborator adapters
//!
//! Typed interfaces of the external systems a strategy talks to. Every call is
//! synchronous and may fail; failures are returned as [`AdapterError`] and wrapped
//! into `StrategyError::AdapterFailure` by the core.
//! Lending market and yield vault calls are scoped by the strategy's own address.

pub mod health;
pub mod memory;

use alloy_primitives::{Address, U256};
use candid::CandidType;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

/// Adapter Result
pub type AdapterResult<T> = Result<T, AdapterError>;

/// The external system an adapter wraps
#[derive(Clone, Copy, CandidType, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub enum Collaborator {
    ParentVault,
    LendingMarket,
    YieldVault,
    SwapRoute,
    HealthCheck,
}

/// Error raised by a collaborator, carrying its own message
#[derive(Clone, CandidType, Debug, Deserialize, PartialEq, Serialize)]
pub struct AdapterError {
    pub collaborator: Collaborator,
    pub message: String,
}

impl AdapterError {
    pub fn new<S: AsRef<str>>(collaborator: Collaborator, message: S) -> Self {
        Self {
            collaborator,
            message: message.as_ref().to_string(),
        }
    }
}

/// Parent accounting vault lending want to the strategy
#[cfg_attr(test, automock)]
pub trait ParentVault {
    /// Address of the vault
    fn address(&self) -> Address;
    /// Governance of the vault, also governing its strategies
    fn governance(&self) -> Address;
    /// Want the vault expects back from `strategy`
    fn debt_outstanding(&self, strategy: Address) -> AdapterResult<U256>;
    /// Reports a harvest. The vault pulls `profit + debt_payment` want from the strategy
    /// and returns the debt still outstanding.
    fn report(
        &mut self,
        strategy: Address,
        profit: U256,
        loss: U256,
        debt_payment: U256,
    ) -> AdapterResult<U256>;
}

/// Lending market custodying the collateral and issuing the stablecoin debt
#[cfg_attr(test, automock)]
pub trait LendingMarket {
    fn address(&self) -> Address;
    fn post_collateral(&mut self, account: Address, amount: U256) -> AdapterResult<()>;
    fn withdraw_collateral(&mut self, account: Address, amount: U256) -> AdapterResult<()>;
    /// Borrows `amount` stablecoin and returns the amount received
    fn borrow(&mut self, account: Address, amount: U256) -> AdapterResult<U256>;
    fn repay(&mut self, account: Address, amount: U256) -> AdapterResult<()>;
    /// Stablecoin value of the account's collateral
    fn current_collateral_value(&self, account: Address) -> AdapterResult<U256>;
    /// Stablecoin debt of the account, interest included
    fn current_debt(&self, account: Address) -> AdapterResult<U256>;
    /// Want posted by the account
    fn collateral_balance(&self, account: Address) -> AdapterResult<U256>;
    /// Stablecoin value of `amount` want at the market's price
    fn quote_collateral_value(&self, amount: U256) -> AdapterResult<U256>;
    /// Collateral the account can withdraw before hitting the market's own loan to value
    fn withdrawable_collateral(&self, account: Address) -> AdapterResult<U256>;
    /// Moves collateral and debt of `from` to `to` in one step
    fn transfer_position(&mut self, from: Address, to: Address) -> AdapterResult<()>;
}

/// Secondary yield vault the borrowed stablecoin is deposited into
#[cfg_attr(test, automock)]
pub trait YieldVault {
    fn address(&self) -> Address;
    /// Deposits `amount` stablecoin and returns the shares minted
    fn deposit(&mut self, account: Address, amount: U256) -> AdapterResult<U256>;
    /// Burns `shares` and returns the stablecoin received
    fn withdraw(&mut self, account: Address, shares: U256) -> AdapterResult<U256>;
    /// Stablecoin per share, scaled by 1e18
    fn price_per_share(&self) -> AdapterResult<U256>;
    fn total_assets(&self) -> AdapterResult<U256>;
    fn balance_of(&self, account: Address) -> AdapterResult<U256>;
    fn transfer_shares(&mut self, from: Address, to: Address, shares: U256) -> AdapterResult<()>;
}

/// Route between the stablecoin and want, both ways.
/// Harvested stablecoin is converted into want; want is sold for stablecoin when the
/// investment alone cannot repay the lending market.
#[cfg_attr(test, automock)]
pub trait SwapRoute {
    /// Want received for `amount` stablecoin, without executing the swap
    fn quote_stable_to_want(&self, amount: U256) -> AdapterResult<U256>;
    /// Swaps `amount` stablecoin and returns the want received
    fn swap_stable_for_want(&mut self, account: Address, amount: U256) -> AdapterResult<U256>;
    /// Stablecoin received for `amount` want, without executing the swap
    fn quote_want_to_stable(&self, amount: U256) -> AdapterResult<U256>;
    /// Swaps `amount` want and returns the stablecoin received
    fn swap_want_for_stable(&mut self, account: Address, amount: U256) -> AdapterResult<U256>;
}

/// Guard consulted before a harvest is committed
#[cfg_attr(test, automock)]
pub trait HealthCheck {
    fn check(&self, profit: U256, loss: U256, total_assets: U256) -> bool;
}

/// Collaborators a strategy instance is bound to at construction time
pub struct Collaborators {
    pub vault: Box<dyn ParentVault>,
    pub market: Box<dyn LendingMarket>,
    pub yield_vault: Box<dyn YieldVault>,
    pub swap: Box<dyn SwapRoute>,
    pub health_check: Option<Box<dyn HealthCheck>>,
}

impl Collaborators {
    pub fn new(
        vault: Box<dyn ParentVault>,
        market: Box<dyn LendingMarket>,
        yield_vault: Box<dyn YieldVault>,
        swap: Box<dyn SwapRoute>,
    ) -> Self {
        Self {
            vault,
            market,
            yield_vault,
            swap,
            health_check: None,
        }
    }

    /// Sets the health check guard
    pub fn health_check(mut self, health_check: Box<dyn HealthCheck>) -> Self {
        self.health_check = Some(health_check);
        self
    }
}
