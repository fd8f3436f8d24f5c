//! Harvest cycle
//!
//! ```plain
//!  Idle ──► Valuing ──► Reconciling ──► Rebalancing ──► Reporting ──► Idle
//!              │             │               │               │
//!              └─────────────┴──── error ────┴───────────────┴─────► Idle
//! ```
//!
//! Valuing and Reconciling only read from collaborators: an error there leaves the
//! strategy untouched. Rebalancing and Reporting work on a staged copy of the ledger;
//! on error the sub-steps already settled are committed and nothing is reported.
//! The cycle is a guard on the strategy that returns it to `Idle` when dropped.

use alloy_primitives::{Address, U256};

use crate::{
    events::{self, Harvested},
    journal::{JournalCollection, LogType},
    ledger::PositionLedger,
    ratio::RatioController,
    types::{HarvestReport, HarvestResult},
    utils::{
        common::{only_roles, shares_to_value},
        error::{StrategyError, StrategyResult},
    },
};

use super::{
    data::HarvestState,
    position::{net_assets, Position},
    Strategy,
};

/// Collaborator readings taken at the start of a harvest
struct Valuation {
    debt_outstanding: U256,
    collateral_amount: U256,
    collateral_value: U256,
    borrowed_amount: U256,
    invested_shares: U256,
    investment_value: U256,
    /// Cost basis of the investment, including interest accrued since the last harvest
    basis: U256,
}

struct HarvestCycle<'a> {
    strategy: &'a mut Strategy,
}

impl<'a> HarvestCycle<'a> {
    fn begin(strategy: &'a mut Strategy) -> StrategyResult<Self> {
        if strategy.data.harvest_state != HarvestState::Idle {
            return Err(StrategyError::Custom(
                "A harvest is already running.".to_string(),
            ));
        }
        strategy.data.harvest_state(HarvestState::Valuing);
        Ok(Self { strategy })
    }

    fn enter(&mut self, state: HarvestState) {
        self.strategy.data.harvest_state(state);
    }

    fn run(mut self, epoch: u64, journal: &mut JournalCollection) -> StrategyResult<HarvestReport> {
        let emergency_exit = self.strategy.data.emergency_exit;

        let valuation = self.value()?;
        let mut staged = self.strategy.ledger.clone();
        staged
            .sync_external(
                valuation.collateral_amount,
                valuation.borrowed_amount,
                valuation.invested_shares,
            )
            .mark_basis(valuation.basis);

        self.enter(HarvestState::Reconciling);
        let (profit_value, loss_value) = if valuation.investment_value >= valuation.basis {
            (valuation.investment_value - valuation.basis, U256::ZERO)
        } else {
            (U256::ZERO, valuation.basis - valuation.investment_value)
        };
        let swap = &*self.strategy.collaborators.swap;
        let expected_profit = swap.quote_stable_to_want(profit_value)?;
        let loss = swap.quote_stable_to_want(loss_value)?;
        let total_assets = net_assets(
            staged.want_balance(),
            valuation.collateral_amount,
            valuation.investment_value,
            valuation.borrowed_amount,
            swap,
        )?;
        journal.append_note(
            Ok(()),
            LogType::Info,
            format!(
                "Valued the position: investment {}, basis {}, debt {}, collateral value {}, debt outstanding {}.",
                valuation.investment_value,
                valuation.basis,
                valuation.borrowed_amount,
                valuation.collateral_value,
                valuation.debt_outstanding
            ),
        );
        self.check_health(expected_profit, loss, total_assets)?;

        self.enter(HarvestState::Rebalancing);
        let profit = match self.rebalance(
            &mut staged,
            profit_value,
            valuation.debt_outstanding,
            emergency_exit,
        ) {
            Ok(profit) => profit,
            Err(err) => {
                self.strategy.ledger = staged;
                return Err(err);
            }
        };

        self.enter(HarvestState::Reporting);
        match self.report(&mut staged, profit, loss, valuation.debt_outstanding, epoch) {
            Ok(report) => {
                self.strategy.ledger = staged;
                self.strategy
                    .data
                    .record_harvest(report.result.profit, report.result.loss)
                    .last_report(epoch);
                self.strategy.settings.do_health_check(true);
                Ok(report)
            }
            Err(err) => {
                self.strategy.ledger = staged;
                Err(err)
            }
        }
    }

    fn value(&self) -> StrategyResult<Valuation> {
        let strategy = &*self.strategy;
        let account = strategy.address;
        let collaborators = &strategy.collaborators;

        let debt_outstanding = if strategy.data.emergency_exit {
            strategy.ledger.total_debt_to_parent()
        } else {
            collaborators.vault.debt_outstanding(account)?
        };
        let collateral_amount = collaborators.market.collateral_balance(account)?;
        let borrowed_amount = collaborators.market.current_debt(account)?;
        let collateral_value = collaborators.market.current_collateral_value(account)?;
        let invested_shares = collaborators.yield_vault.balance_of(account)?;
        let price_per_share = collaborators.yield_vault.price_per_share()?;
        let investment_value = shares_to_value(invested_shares, price_per_share)?;

        // interest accrued by the market since the last harvest raises the basis
        let basis = strategy
            .ledger
            .invested_basis()
            .saturating_add(borrowed_amount)
            .saturating_sub(strategy.ledger.borrowed_amount());

        Ok(Valuation {
            debt_outstanding,
            collateral_amount,
            collateral_value,
            borrowed_amount,
            invested_shares,
            investment_value,
            basis,
        })
    }

    fn check_health(&self, profit: U256, loss: U256, total_assets: U256) -> StrategyResult<()> {
        if !self.strategy.settings.do_health_check {
            return Ok(());
        }
        match &self.strategy.collaborators.health_check {
            Some(guard) if !guard.check(profit, loss, total_assets) => {
                Err(StrategyError::HealthCheckRejected(format!(
                    "Profit {} and loss {} are out of bounds for total assets {}.",
                    profit, loss, total_assets
                )))
            }
            _ => Ok(()),
        }
    }

    /// Realizes the profit, frees or posts want and brings the ratio back into the band.
    /// Returns the realized profit in want.
    fn rebalance(
        &mut self,
        staged: &mut PositionLedger,
        profit_value: U256,
        debt_outstanding: U256,
        emergency_exit: bool,
    ) -> StrategyResult<U256> {
        let strategy = &mut *self.strategy;
        let mut position = Position::new(
            strategy.address,
            strategy.settings.ratio,
            staged,
            &mut strategy.collaborators,
        );

        let profit = position.realize_profit(profit_value)?;
        let needed = debt_outstanding.saturating_add(profit);
        let want = position.ledger().want_balance();
        if want < needed {
            position.free_want(needed)?;
        } else if !emergency_exit && !position.ledger().total_debt_to_parent().is_zero() {
            position.post_collateral(want - needed)?;
        }
        position.rebalance(emergency_exit)?;
        Ok(profit)
    }

    fn report(
        &mut self,
        staged: &mut PositionLedger,
        profit: U256,
        loss: U256,
        debt_outstanding: U256,
        epoch: u64,
    ) -> StrategyResult<HarvestReport> {
        let strategy = &mut *self.strategy;
        let account = strategy.address;

        let want = staged.want_balance();
        let profit = profit.min(want);
        let debt_repayment = (want - profit).min(debt_outstanding);

        // once nothing but want is left, parent debt it cannot cover is a loss
        let unwound = staged.collateral_amount().is_zero()
            && staged.borrowed_amount().is_zero()
            && staged.invested_shares().is_zero();
        let loss = if unwound {
            let owed = staged
                .total_debt_to_parent()
                .saturating_sub(debt_repayment);
            let left = want - profit - debt_repayment;
            loss.max(owed.saturating_sub(left))
        } else {
            loss
        };
        let price_per_share = strategy.collaborators.yield_vault.price_per_share()?;
        let basis = shares_to_value(staged.invested_shares(), price_per_share)?;

        let debt_outstanding =
            strategy
                .collaborators
                .vault
                .report(account, profit, loss, debt_repayment)?;

        staged
            .record_withdrawal(profit.saturating_add(debt_repayment))?
            .settle_parent_debt(debt_repayment, loss)
            .mark_basis(basis);

        events::emit(
            account,
            &Harvested {
                strategy: account,
                profit,
                loss,
                debtPayment: debt_repayment,
                debtOutstanding: debt_outstanding,
            },
            &[account],
        );

        Ok(HarvestReport {
            result: HarvestResult {
                profit,
                loss,
                debt_repayment,
            },
            debt_outstanding,
            epoch,
        })
    }
}

impl Drop for HarvestCycle<'_> {
    /// Returns the strategy to `Idle` whichever way the cycle ended
    fn drop(&mut self) {
        self.strategy.data.harvest_state(HarvestState::Idle);
    }
}

impl Strategy {
    /// Runs one harvest cycle: values the position, reports profit or loss to the
    /// parent vault, repays what it asks for and re-levers the rest.
    pub fn harvest(&mut self, caller: Address, epoch: u64) -> StrategyResult<HarvestReport> {
        self.ensure_initialized()?;
        only_roles(caller, &self.keepers())?;

        let mut journal = JournalCollection::open(Some(self.address), Some(epoch));
        let result = HarvestCycle::begin(self)?.run(epoch, &mut journal);

        match &result {
            Ok(report) => journal.append_note(
                Ok(()),
                LogType::HarvestResult,
                format!(
                    "Harvested: profit {}, loss {}, debt repayment {}, debt outstanding {}.",
                    report.result.profit,
                    report.result.loss,
                    report.result.debt_repayment,
                    report.debt_outstanding
                ),
            ),
            Err(err @ StrategyError::HealthCheckRejected(_)) => journal.append_note(
                Err(err.clone()),
                LogType::Rejection,
                "The health check rejected the harvest. Nothing was changed.",
            ),
            Err(err) => journal.append_note(
                Err(err.clone()),
                LogType::HarvestResult,
                "Harvest failed. Settled steps were kept and nothing was reported.",
            ),
        };
        result
    }

    /// Returns `true` if a keeper should call `harvest` at `epoch`
    pub fn harvest_trigger(&self, epoch: u64) -> StrategyResult<bool> {
        self.ensure_initialized()?;
        if self.data.migrated_to.is_some() {
            return Ok(false);
        }

        let elapsed = epoch.saturating_sub(self.data.last_report);
        let min_delay = u64::try_from(self.settings.min_report_delay.num_seconds()).unwrap_or(0);
        let max_delay = u64::try_from(self.settings.max_report_delay.num_seconds()).unwrap_or(0);
        if elapsed < min_delay {
            return Ok(false);
        }
        if elapsed >= max_delay {
            return Ok(true);
        }

        let threshold = self.settings.debt_threshold;
        if self.collaborators.vault.debt_outstanding(self.address)? > threshold {
            return Ok(true);
        }

        // a loss is waiting to be reported
        if self.estimated_total_assets()?.saturating_add(threshold)
            < self.ledger.total_debt_to_parent()
        {
            return Ok(true);
        }

        let market = &self.collaborators.market;
        let in_band = RatioController::is_within_band(
            market.current_collateral_value(self.address)?,
            market.current_debt(self.address)?,
            &self.settings.ratio,
        )?;
        Ok(!in_band)
    }
}
