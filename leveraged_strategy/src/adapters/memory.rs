//! In-memory collaborators
//!
//! Minimal models of the parent vault, the lending market, the yield vault and the
//! swap route. Handles are cheap to clone and share the same simulated state, the
//! way several strategies address the same external contracts.

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use alloy_primitives::{Address, U256};

use crate::{
    constants::{max_bps, ratio_precision, scale},
    strategy::Strategy,
    utils::error::StrategyResult,
};

use super::{
    AdapterError, AdapterResult, Collaborator, LendingMarket, ParentVault, SwapRoute, YieldVault,
};

fn mul_div(a: U256, b: U256, denominator: U256) -> U256 {
    if denominator.is_zero() {
        return U256::ZERO;
    }
    a.saturating_mul(b) / denominator
}

fn mul_div_up(a: U256, b: U256, denominator: U256) -> U256 {
    if denominator.is_zero() {
        return U256::ZERO;
    }
    let product = a.saturating_mul(b);
    let quotient = product / denominator;
    if (product % denominator).is_zero() {
        quotient
    } else {
        quotient.saturating_add(U256::from(1u64))
    }
}

/// Parameters of a strategy registered in the vault
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StrategyRecord {
    pub debt_ratio_bps: u64,
    /// Debt ceiling
    pub max_debt: U256,
    pub total_debt: U256,
    pub total_gain: U256,
    pub total_loss: U256,
}

struct VaultState {
    address: Address,
    governance: Address,
    total_idle: U256,
    strategies: HashMap<Address, StrategyRecord>,
}

/// Parent vault keeping per-strategy debt records
#[derive(Clone)]
pub struct MemoryVault {
    inner: Rc<RefCell<VaultState>>,
}

impl MemoryVault {
    pub fn new(address: Address, governance: Address) -> Self {
        Self {
            inner: Rc::new(RefCell::new(VaultState {
                address,
                governance,
                total_idle: U256::ZERO,
                strategies: HashMap::new(),
            })),
        }
    }

    /// Registers a strategy with a debt ratio and a debt ceiling
    pub fn add_strategy(&self, strategy: Address, debt_ratio_bps: u64, max_debt: U256) {
        self.inner.borrow_mut().strategies.insert(
            strategy,
            StrategyRecord {
                debt_ratio_bps,
                max_debt,
                ..Default::default()
            },
        );
    }

    pub fn update_debt_ratio(&self, strategy: Address, debt_ratio_bps: u64) {
        if let Some(params) = self.inner.borrow_mut().strategies.get_mut(&strategy) {
            params.debt_ratio_bps = debt_ratio_bps;
        }
    }

    /// Asks the strategy to return all of its debt on the next harvest
    pub fn revoke_strategy(&self, strategy: Address) {
        self.update_debt_ratio(strategy, 0);
    }

    /// Want deposited by vault users
    pub fn deposit(&self, amount: U256) {
        let mut state = self.inner.borrow_mut();
        state.total_idle = state.total_idle.saturating_add(amount);
    }

    pub fn record(&self, strategy: Address) -> Option<StrategyRecord> {
        self.inner.borrow().strategies.get(&strategy).cloned()
    }

    pub fn total_idle(&self) -> U256 {
        self.inner.borrow().total_idle
    }

    pub fn total_assets(&self) -> U256 {
        let state = self.inner.borrow();
        state
            .strategies
            .values()
            .fold(state.total_idle, |total, params| {
                total.saturating_add(params.total_debt)
            })
    }

    /// Want the strategy may still receive under its debt ratio and ceiling
    pub fn credit_available(&self, strategy: Address) -> U256 {
        let total_assets = self.total_assets();
        let state = self.inner.borrow();
        match state.strategies.get(&strategy) {
            Some(params) => {
                let limit = mul_div(total_assets, U256::from(params.debt_ratio_bps), max_bps())
                    .min(params.max_debt);
                limit
                    .saturating_sub(params.total_debt)
                    .min(state.total_idle)
            }
            None => U256::ZERO,
        }
    }

    /// Lends idle want to a registered strategy, within its available credit
    pub fn fund(&self, strategy: &mut Strategy, amount: U256) -> StrategyResult<()> {
        let address = strategy.address();
        if amount > self.credit_available(address) {
            return Err(AdapterError::new(
                Collaborator::ParentVault,
                "Amount exceeds the strategy's available credit.",
            )
            .into());
        }
        let vault = self.inner.borrow().address;
        strategy.deposit(vault, amount)?;

        let mut state = self.inner.borrow_mut();
        state.total_idle -= amount;
        if let Some(params) = state.strategies.get_mut(&address) {
            params.total_debt = params.total_debt.saturating_add(amount);
        }
        Ok(())
    }

    /// Pulls want back from a strategy outside of a harvest
    pub fn withdraw_from(&self, strategy: &mut Strategy, amount: U256) -> StrategyResult<U256> {
        let vault = self.inner.borrow().address;
        let freed = strategy.withdraw(vault, amount)?;

        let mut state = self.inner.borrow_mut();
        state.total_idle = state.total_idle.saturating_add(freed);
        if let Some(params) = state.strategies.get_mut(&strategy.address()) {
            params.total_debt = params.total_debt.saturating_sub(freed);
        }
        Ok(freed)
    }

    /// Migrates `old` into `new` and moves its debt record
    pub fn migrate_strategy(&self, old: &mut Strategy, new: &mut Strategy) -> StrategyResult<()> {
        let vault = self.inner.borrow().address;
        old.migrate(vault, new)?;

        let mut state = self.inner.borrow_mut();
        let moved = state.strategies.remove(&old.address()).unwrap_or_default();
        state.strategies.insert(old.address(), StrategyRecord::default());
        state.strategies.insert(new.address(), moved);
        Ok(())
    }

    fn outstanding(state: &VaultState, total_assets: U256, strategy: Address) -> AdapterResult<U256> {
        let params = state.strategies.get(&strategy).ok_or_else(|| {
            AdapterError::new(Collaborator::ParentVault, "Strategy is not registered.")
        })?;
        let limit = mul_div(total_assets, U256::from(params.debt_ratio_bps), max_bps())
            .min(params.max_debt);
        Ok(params.total_debt.saturating_sub(limit))
    }
}

impl ParentVault for MemoryVault {
    fn address(&self) -> Address {
        self.inner.borrow().address
    }

    fn governance(&self) -> Address {
        self.inner.borrow().governance
    }

    fn debt_outstanding(&self, strategy: Address) -> AdapterResult<U256> {
        let total_assets = self.total_assets();
        Self::outstanding(&self.inner.borrow(), total_assets, strategy)
    }

    fn report(
        &mut self,
        strategy: Address,
        profit: U256,
        loss: U256,
        debt_payment: U256,
    ) -> AdapterResult<U256> {
        {
            let mut state = self.inner.borrow_mut();
            let params = state.strategies.get_mut(&strategy).ok_or_else(|| {
                AdapterError::new(Collaborator::ParentVault, "Strategy is not registered.")
            })?;
            params.total_gain = params.total_gain.saturating_add(profit);
            params.total_loss = params.total_loss.saturating_add(loss);
            params.total_debt = params
                .total_debt
                .saturating_sub(loss)
                .saturating_sub(debt_payment);
            state.total_idle = state
                .total_idle
                .saturating_add(profit)
                .saturating_add(debt_payment);
        }
        self.debt_outstanding(strategy)
    }
}

/// Collateral and debt of one market account
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MarketAccount {
    pub collateral: U256,
    pub debt: U256,
}

struct MarketState {
    address: Address,
    /// Stablecoin per want, scaled by 1e18
    price: U256,
    /// Maximum debt against collateral value, in basis points of 100_000
    max_ltv_bps: u64,
    accounts: HashMap<Address, MarketAccount>,
}

/// Lending market pricing want with a settable oracle price
#[derive(Clone)]
pub struct MemoryMarket {
    inner: Rc<RefCell<MarketState>>,
}

impl MemoryMarket {
    pub fn new(address: Address, price: U256, max_ltv_bps: u64) -> Self {
        Self {
            inner: Rc::new(RefCell::new(MarketState {
                address,
                price,
                max_ltv_bps,
                accounts: HashMap::new(),
            })),
        }
    }

    pub fn price(&self) -> U256 {
        self.inner.borrow().price
    }

    pub fn set_price(&self, price: U256) {
        self.inner.borrow_mut().price = price;
    }

    /// Adds interest to an account's debt
    pub fn accrue_interest(&self, account: Address, amount: U256) {
        let mut state = self.inner.borrow_mut();
        let entry = state.accounts.entry(account).or_default();
        entry.debt = entry.debt.saturating_add(amount);
    }

    pub fn account(&self, account: Address) -> MarketAccount {
        self.inner
            .borrow()
            .accounts
            .get(&account)
            .copied()
            .unwrap_or_default()
    }

    fn value_of(state: &MarketState, amount: U256) -> U256 {
        mul_div(amount, state.price, scale())
    }

    fn is_healthy(state: &MarketState, collateral: U256, debt: U256) -> bool {
        debt.saturating_mul(ratio_precision())
            <= Self::value_of(state, collateral).saturating_mul(U256::from(state.max_ltv_bps))
    }
}

impl LendingMarket for MemoryMarket {
    fn address(&self) -> Address {
        self.inner.borrow().address
    }

    fn post_collateral(&mut self, account: Address, amount: U256) -> AdapterResult<()> {
        let mut state = self.inner.borrow_mut();
        let entry = state.accounts.entry(account).or_default();
        entry.collateral = entry.collateral.saturating_add(amount);
        Ok(())
    }

    fn withdraw_collateral(&mut self, account: Address, amount: U256) -> AdapterResult<()> {
        let mut state = self.inner.borrow_mut();
        let current = state.accounts.get(&account).copied().unwrap_or_default();
        let remaining = current.collateral.checked_sub(amount).ok_or_else(|| {
            AdapterError::new(Collaborator::LendingMarket, "Not enough collateral.")
        })?;
        if !Self::is_healthy(&state, remaining, current.debt) {
            return Err(AdapterError::new(
                Collaborator::LendingMarket,
                "Withdrawal would leave the account insolvent.",
            ));
        }
        state.accounts.entry(account).or_default().collateral = remaining;
        Ok(())
    }

    fn borrow(&mut self, account: Address, amount: U256) -> AdapterResult<U256> {
        let mut state = self.inner.borrow_mut();
        let current = state.accounts.get(&account).copied().unwrap_or_default();
        let debt = current.debt.saturating_add(amount);
        if !Self::is_healthy(&state, current.collateral, debt) {
            return Err(AdapterError::new(
                Collaborator::LendingMarket,
                "Borrow exceeds the maximum loan to value.",
            ));
        }
        state.accounts.entry(account).or_default().debt = debt;
        Ok(amount)
    }

    fn repay(&mut self, account: Address, amount: U256) -> AdapterResult<()> {
        let mut state = self.inner.borrow_mut();
        let entry = state.accounts.entry(account).or_default();
        entry.debt = entry
            .debt
            .checked_sub(amount)
            .ok_or_else(|| AdapterError::new(Collaborator::LendingMarket, "Repay exceeds debt."))?;
        Ok(())
    }

    fn current_collateral_value(&self, account: Address) -> AdapterResult<U256> {
        let state = self.inner.borrow();
        let collateral = state
            .accounts
            .get(&account)
            .map(|entry| entry.collateral)
            .unwrap_or_default();
        Ok(Self::value_of(&state, collateral))
    }

    fn current_debt(&self, account: Address) -> AdapterResult<U256> {
        Ok(self.account(account).debt)
    }

    fn collateral_balance(&self, account: Address) -> AdapterResult<U256> {
        Ok(self.account(account).collateral)
    }

    fn quote_collateral_value(&self, amount: U256) -> AdapterResult<U256> {
        Ok(Self::value_of(&self.inner.borrow(), amount))
    }

    fn withdrawable_collateral(&self, account: Address) -> AdapterResult<U256> {
        let state = self.inner.borrow();
        let current = state.accounts.get(&account).copied().unwrap_or_default();
        if current.debt.is_zero() {
            return Ok(current.collateral);
        }
        if state.price.is_zero() || state.max_ltv_bps == 0 {
            return Ok(U256::ZERO);
        }
        let required_value = mul_div_up(
            current.debt,
            ratio_precision(),
            U256::from(state.max_ltv_bps),
        );
        let required = mul_div_up(required_value, scale(), state.price);
        Ok(current.collateral.saturating_sub(required))
    }

    fn transfer_position(&mut self, from: Address, to: Address) -> AdapterResult<()> {
        let mut state = self.inner.borrow_mut();
        if state
            .accounts
            .get(&to)
            .is_some_and(|entry| *entry != MarketAccount::default())
        {
            return Err(AdapterError::new(
                Collaborator::LendingMarket,
                "Receiving account already holds a position.",
            ));
        }
        let moved = state.accounts.remove(&from).unwrap_or_default();
        state.accounts.insert(to, moved);
        Ok(())
    }
}

struct YieldState {
    address: Address,
    total_shares: U256,
    total_assets: U256,
    balances: HashMap<Address, U256>,
}

/// Share-based yield vault
#[derive(Clone)]
pub struct MemoryYieldVault {
    inner: Rc<RefCell<YieldState>>,
}

impl MemoryYieldVault {
    pub fn new(address: Address) -> Self {
        Self {
            inner: Rc::new(RefCell::new(YieldState {
                address,
                total_shares: U256::ZERO,
                total_assets: U256::ZERO,
                balances: HashMap::new(),
            })),
        }
    }

    /// Stablecoin sent to the vault without minting shares
    pub fn gift(&self, amount: U256) {
        let mut state = self.inner.borrow_mut();
        state.total_assets = state.total_assets.saturating_add(amount);
    }

    /// Stablecoin lost by the vault
    pub fn slash(&self, amount: U256) {
        let mut state = self.inner.borrow_mut();
        state.total_assets = state.total_assets.saturating_sub(amount);
    }

    fn pps(state: &YieldState) -> U256 {
        if state.total_shares.is_zero() {
            scale()
        } else {
            mul_div(state.total_assets, scale(), state.total_shares)
        }
    }
}

impl YieldVault for MemoryYieldVault {
    fn address(&self) -> Address {
        self.inner.borrow().address
    }

    fn deposit(&mut self, account: Address, amount: U256) -> AdapterResult<U256> {
        let mut state = self.inner.borrow_mut();
        let pps = Self::pps(&state);
        if pps.is_zero() {
            return Err(AdapterError::new(
                Collaborator::YieldVault,
                "Vault has no assets backing its shares.",
            ));
        }
        let shares = mul_div(amount, scale(), pps);
        state.total_shares = state.total_shares.saturating_add(shares);
        state.total_assets = state.total_assets.saturating_add(amount);
        let balance = state.balances.entry(account).or_default();
        *balance = balance.saturating_add(shares);
        Ok(shares)
    }

    fn withdraw(&mut self, account: Address, shares: U256) -> AdapterResult<U256> {
        let mut state = self.inner.borrow_mut();
        let balance = state.balances.get(&account).copied().unwrap_or_default();
        if shares > balance {
            return Err(AdapterError::new(
                Collaborator::YieldVault,
                "Not enough shares.",
            ));
        }
        // The last shares out take whatever is left
        let amount = if shares == state.total_shares {
            state.total_assets
        } else {
            mul_div(shares, Self::pps(&state), scale()).min(state.total_assets)
        };
        state.total_shares -= shares;
        state.total_assets -= amount;
        state.balances.insert(account, balance - shares);
        Ok(amount)
    }

    fn price_per_share(&self) -> AdapterResult<U256> {
        Ok(Self::pps(&self.inner.borrow()))
    }

    fn total_assets(&self) -> AdapterResult<U256> {
        Ok(self.inner.borrow().total_assets)
    }

    fn balance_of(&self, account: Address) -> AdapterResult<U256> {
        Ok(self
            .inner
            .borrow()
            .balances
            .get(&account)
            .copied()
            .unwrap_or_default())
    }

    fn transfer_shares(&mut self, from: Address, to: Address, shares: U256) -> AdapterResult<()> {
        let mut state = self.inner.borrow_mut();
        let balance = state.balances.get(&from).copied().unwrap_or_default();
        if shares > balance {
            return Err(AdapterError::new(
                Collaborator::YieldVault,
                "Not enough shares.",
            ));
        }
        state.balances.insert(from, balance - shares);
        let receiver = state.balances.entry(to).or_default();
        *receiver = receiver.saturating_add(shares);
        Ok(())
    }
}

/// Swap route filling at the market's oracle price
#[derive(Clone)]
pub struct MemorySwap {
    market: MemoryMarket,
}

impl MemorySwap {
    pub fn new(market: MemoryMarket) -> Self {
        Self { market }
    }
}

impl SwapRoute for MemorySwap {
    fn quote_stable_to_want(&self, amount: U256) -> AdapterResult<U256> {
        let price = self.market.price();
        if price.is_zero() {
            return Err(AdapterError::new(Collaborator::SwapRoute, "No price."));
        }
        Ok(mul_div(amount, scale(), price))
    }

    fn swap_stable_for_want(&mut self, _account: Address, amount: U256) -> AdapterResult<U256> {
        self.quote_stable_to_want(amount)
    }

    fn quote_want_to_stable(&self, amount: U256) -> AdapterResult<U256> {
        Ok(mul_div(amount, self.market.price(), scale()))
    }

    fn swap_want_for_stable(&mut self, _account: Address, amount: U256) -> AdapterResult<U256> {
        self.quote_want_to_stable(amount)
    }
}
