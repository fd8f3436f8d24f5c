//! Settlement primitives
//!
//! Each primitive calls a collaborator first and records the change on the staged
//! ledger only once the call succeeded. A failing call leaves the ledger describing
//! exactly what was settled so far.
//!
//! Debt is repaid from the investment first. Once the investment is exhausted,
//! collateral is sold for stablecoin.
//!
//! The investment's cost basis follows the stablecoin moved in and out of the yield
//! vault: deposits raise it, divestments lower it by the amount received.

use alloy_primitives::{Address, U256};

use crate::{
    adapters::{Collaborators, SwapRoute},
    constants::MAX_UNWIND_STEPS,
    ledger::PositionLedger,
    ratio::{CollateralRatioConfig, RatioController},
    utils::{
        common::{mul_div_down, value_to_shares_down, value_to_shares_up},
        error::{StrategyError, StrategyResult},
    },
};

/// Want value of the position: idle want and collateral, plus the investment's
/// surplus over the debt, minus its deficit
pub(crate) fn net_assets(
    want_balance: U256,
    collateral_amount: U256,
    investment_value: U256,
    borrowed_amount: U256,
    swap: &dyn SwapRoute,
) -> StrategyResult<U256> {
    let primary = want_balance.saturating_add(collateral_amount);
    if investment_value >= borrowed_amount {
        let surplus = swap.quote_stable_to_want(investment_value - borrowed_amount)?;
        Ok(primary.saturating_add(surplus))
    } else {
        let deficit = swap.quote_stable_to_want(borrowed_amount - investment_value)?;
        Ok(primary.saturating_sub(deficit))
    }
}

/// Staged position of one strategy instance
pub(crate) struct Position<'a> {
    account: Address,
    config: CollateralRatioConfig,
    ledger: &'a mut PositionLedger,
    collaborators: &'a mut Collaborators,
}

impl<'a> Position<'a> {
    pub fn new(
        account: Address,
        config: CollateralRatioConfig,
        ledger: &'a mut PositionLedger,
        collaborators: &'a mut Collaborators,
    ) -> Self {
        Self {
            account,
            config,
            ledger,
            collaborators,
        }
    }

    pub fn ledger(&self) -> &PositionLedger {
        self.ledger
    }

    /// Posts idle want as collateral
    pub fn post_collateral(&mut self, amount: U256) -> StrategyResult<()> {
        if amount.is_zero() {
            return Ok(());
        }
        if amount > self.ledger.want_balance() {
            return Err(StrategyError::InsufficientWant);
        }
        self.collaborators
            .market
            .post_collateral(self.account, amount)?;
        self.ledger.move_to_collateral(amount)?;
        Ok(())
    }

    /// Divests shares worth at most `value` and swaps the proceeds into want.
    /// Returns the want received.
    pub fn realize_profit(&mut self, value: U256) -> StrategyResult<U256> {
        if value.is_zero() {
            return Ok(U256::ZERO);
        }
        let price_per_share = self.collaborators.yield_vault.price_per_share()?;
        if price_per_share.is_zero() {
            return Ok(U256::ZERO);
        }
        let shares = value_to_shares_down(value, price_per_share)?.min(self.ledger.invested_shares());
        let received = self.divest(shares)?;
        self.swap_to_want(received)
    }

    /// Brings the position back into the ratio band. Only repays when `repay_only` is set.
    pub fn rebalance(&mut self, repay_only: bool) -> StrategyResult<()> {
        let collateral_value = self
            .collaborators
            .market
            .current_collateral_value(self.account)?;
        let adjustment = RatioController::compute_adjustment(
            collateral_value,
            self.ledger.borrowed_amount(),
            &self.config,
        )?;

        if !adjustment.repay_amount.is_zero() {
            self.repay_from_investment(adjustment.repay_amount)?;
        } else if !adjustment.borrow_more.is_zero() && !repay_only {
            self.lever(adjustment.borrow_more)?;
        }
        Ok(())
    }

    /// Withdraws collateral until `amount` want is idle, or the collateral is exhausted.
    /// Debt is repaid from the investment before any collateral is released so the
    /// ratio never ends above the band.
    pub fn free_want(&mut self, amount: U256) -> StrategyResult<()> {
        let want = self.ledger.want_balance();
        if want >= amount {
            return Ok(());
        }
        let collateral = self.ledger.collateral_amount();
        let take = (amount - want).min(collateral);
        if take.is_zero() {
            return Ok(());
        }

        let remaining_value = self
            .collaborators
            .market
            .quote_collateral_value(collateral - take)?;
        let adjustment = RatioController::compute_adjustment(
            remaining_value,
            self.ledger.borrowed_amount(),
            &self.config,
        )?;
        if !adjustment.repay_amount.is_zero() {
            self.repay_from_investment(adjustment.repay_amount)?;
        }
        // the investment is gone, the rest of the debt is repaid with collateral
        if self.ledger.invested_shares().is_zero() && !self.ledger.borrowed_amount().is_zero() {
            self.repay_from_collateral()?;
        }

        let want = self.ledger.want_balance();
        if want >= amount {
            return Ok(());
        }
        let take = (amount - want)
            .min(self.ledger.collateral_amount())
            .min(self.max_withdrawable()?);
        if take.is_zero() {
            return Ok(());
        }
        self.collaborators
            .market
            .withdraw_collateral(self.account, take)?;
        self.ledger.release_collateral(take)?;
        Ok(())
    }

    /// Collateral that can be released without the debt exceeding the maximum ratio
    fn max_withdrawable(&self) -> StrategyResult<U256> {
        let collateral = self.ledger.collateral_amount();
        let debt = self.ledger.borrowed_amount();
        if debt.is_zero() {
            return Ok(collateral);
        }
        let value = self
            .collaborators
            .market
            .quote_collateral_value(collateral)?;
        let required = RatioController::required_collateral_value(debt, &self.config)?;
        if value <= required {
            return Ok(U256::ZERO);
        }
        mul_div_down(collateral, value - required, value)
    }

    /// Borrows stablecoin and deposits it into the yield vault
    fn lever(&mut self, amount: U256) -> StrategyResult<()> {
        let borrowed = self.collaborators.market.borrow(self.account, amount)?;
        self.ledger.record_borrow(borrowed);
        self.invest(borrowed)
    }

    fn invest(&mut self, amount: U256) -> StrategyResult<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let shares = self
            .collaborators
            .yield_vault
            .deposit(self.account, amount)?;
        let basis = self.ledger.invested_basis().saturating_add(amount);
        self.ledger.record_investment(shares).mark_basis(basis);
        Ok(())
    }

    /// Divests shares worth at least `amount` and repays the debt with the proceeds.
    /// Proceeds above the debt are invested again.
    fn repay_from_investment(&mut self, amount: U256) -> StrategyResult<()> {
        let amount = amount.min(self.ledger.borrowed_amount());
        if amount.is_zero() {
            return Ok(());
        }
        let held = self.ledger.invested_shares();
        let price_per_share = self.collaborators.yield_vault.price_per_share()?;
        let shares = if price_per_share.is_zero() {
            held
        } else {
            value_to_shares_up(amount, price_per_share)?.min(held)
        };

        let received = self.divest(shares)?;
        let payment = received.min(self.ledger.borrowed_amount());
        if !payment.is_zero() {
            self.collaborators.market.repay(self.account, payment)?;
            self.ledger.record_repay(payment)?;
        }
        self.invest(received - payment)
    }

    /// Sells want for stablecoin until the debt is repaid. Each step releases at most
    /// what the band or the market allows, the repayment making room for the next one.
    fn repay_from_collateral(&mut self) -> StrategyResult<()> {
        for _ in 0..MAX_UNWIND_STEPS {
            let debt = self.ledger.borrowed_amount();
            if debt.is_zero() {
                break;
            }
            let needed = self.want_for_stable(debt)?;
            let want = self.ledger.want_balance();
            if want < needed {
                let limit = self.max_withdrawable()?.max(
                    self.collaborators
                        .market
                        .withdrawable_collateral(self.account)?,
                );
                let release = (needed - want).min(limit);
                if !release.is_zero() {
                    self.collaborators
                        .market
                        .withdraw_collateral(self.account, release)?;
                    self.ledger.release_collateral(release)?;
                }
            }

            let sell = needed.min(self.ledger.want_balance());
            if sell.is_zero() {
                break;
            }
            let received = self.swap_to_stable(sell)?;
            let payment = received.min(debt);
            if !payment.is_zero() {
                self.collaborators.market.repay(self.account, payment)?;
                self.ledger.record_repay(payment)?;
            }
            self.swap_to_want(received - payment)?;
        }
        Ok(())
    }

    /// Want to sell for at least `amount` stablecoin
    fn want_for_stable(&self, amount: U256) -> StrategyResult<U256> {
        let swap = &self.collaborators.swap;
        let want = swap.quote_stable_to_want(amount)?;
        if swap.quote_want_to_stable(want)? < amount {
            return Ok(want.saturating_add(U256::from(1u64)));
        }
        Ok(want)
    }

    fn swap_to_stable(&mut self, amount: U256) -> StrategyResult<U256> {
        let received = self
            .collaborators
            .swap
            .swap_want_for_stable(self.account, amount)?;
        self.ledger.record_withdrawal(amount)?;
        Ok(received)
    }

    /// Burns shares and returns the stablecoin received
    fn divest(&mut self, shares: U256) -> StrategyResult<U256> {
        if shares.is_zero() {
            return Ok(U256::ZERO);
        }
        if shares > self.ledger.invested_shares() {
            return Err(StrategyError::InsufficientShares);
        }
        let received = self
            .collaborators
            .yield_vault
            .withdraw(self.account, shares)?;
        let basis = self.ledger.invested_basis().saturating_sub(received);
        self.ledger.record_divestment(shares)?.mark_basis(basis);
        Ok(received)
    }

    fn swap_to_want(&mut self, amount: U256) -> StrategyResult<U256> {
        if amount.is_zero() {
            return Ok(U256::ZERO);
        }
        let received = self
            .collaborators
            .swap
            .swap_stable_for_want(self.account, amount)?;
        self.ledger.record_deposit(received);
        Ok(received)
    }
}
