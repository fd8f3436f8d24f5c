//! Strategy instance
//!
//! A [`Strategy`] owns its settings, its mutable data, its position ledger and the
//! collaborators it is bound to. Every mutating entry point takes the caller's
//! address and checks it against the roles below.
//!
//! | Role       | Source                       | May call                              |
//! |------------|------------------------------|---------------------------------------|
//! | vault      | bound parent vault           | deposit, withdraw, migrate            |
//! | governance | the parent vault's governance| everything but deposit/withdraw       |
//! | strategist | `initialize`, setters        | harvest, configuration, emergency exit|
//! | keeper     | `initialize`, setters        | harvest                               |

pub mod data;
pub mod harvest;
pub mod lifecycle;
pub(crate) mod position;
pub mod settings;

use alloy_primitives::{Address, U256};
use chrono::Duration;

use crate::{
    adapters::{Collaborators, HealthCheck},
    events::{self, EmergencyExitEnabled},
    journal::{JournalCollection, LogType},
    ledger::{LedgerSnapshot, PositionLedger},
    ratio::{CollateralRatioConfig, RatioController},
    types::StrategyQuery,
    utils::{
        common::{only_roles, shares_to_value, u256_to_nat},
        error::{StrategyError, StrategyResult},
    },
};

use self::{
    data::{HarvestState, StrategyData},
    position::{net_assets, Position},
    settings::{StrategySettings, StrategySettingsQuery},
};

pub struct Strategy {
    /// Identity of this instance at every collaborator
    address: Address,
    pub(crate) settings: StrategySettings,
    pub(crate) data: StrategyData,
    pub(crate) ledger: PositionLedger,
    pub(crate) collaborators: Collaborators,
}

impl Strategy {
    /// Creates an uninitialized instance bound to `collaborators`
    pub fn new(address: Address, collaborators: Collaborators) -> Self {
        let mut settings = StrategySettings::default();
        settings
            .vault(collaborators.vault.address())
            .lending_market(collaborators.market.address())
            .yield_vault(collaborators.yield_vault.address());

        Self {
            address,
            settings,
            data: StrategyData::default(),
            ledger: PositionLedger::empty(),
            collaborators,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn settings(&self) -> &StrategySettings {
        &self.settings
    }

    pub fn data(&self) -> &StrategyData {
        &self.data
    }

    pub fn is_initialized(&self) -> bool {
        self.data.initialized
    }

    pub fn harvest_state(&self) -> HarvestState {
        self.data.harvest_state
    }

    pub fn governance(&self) -> Address {
        self.collaborators.vault.governance()
    }

    pub(crate) fn ensure_initialized(&self) -> StrategyResult<()> {
        if !self.data.initialized {
            return Err(StrategyError::NotInitialized);
        }
        Ok(())
    }

    /// Strategist and governance
    fn authorized(&self) -> [Address; 2] {
        [self.settings.strategist, self.governance()]
    }

    /// Keeper, strategist and governance
    fn keepers(&self) -> [Address; 3] {
        [
            self.settings.keeper,
            self.settings.strategist,
            self.governance(),
        ]
    }

    /// Records want lent by the parent vault
    pub fn deposit(&mut self, caller: Address, amount: U256) -> StrategyResult<()> {
        self.ensure_initialized()?;
        only_roles(caller, &[self.settings.vault])?;
        if let Some(successor) = self.data.migrated_to {
            return Err(StrategyError::Custom(format!(
                "Strategy was migrated to {}.",
                successor
            )));
        }

        self.ledger.record_deposit(amount).record_parent_credit(amount);
        Ok(())
    }

    /// Releases up to `amount` want to the parent vault, unwinding collateral if the
    /// idle want is not enough. Returns the want released.
    pub fn withdraw(&mut self, caller: Address, amount: U256) -> StrategyResult<U256> {
        self.ensure_initialized()?;
        only_roles(caller, &[self.settings.vault])?;
        let mut journal = JournalCollection::open(Some(self.address), None);

        let mut staged = self.ledger.clone();
        let freed = Position::new(
            self.address,
            self.settings.ratio,
            &mut staged,
            &mut self.collaborators,
        )
        .free_want(amount);

        if let Err(err) = freed {
            self.ledger = staged;
            journal.append_note(
                Err(err.clone()),
                LogType::Info,
                "Could not free the want requested by the vault.",
            );
            return Err(err);
        }

        let released = staged.want_balance().min(amount);
        staged
            .record_withdrawal(released)?
            .settle_parent_debt(released, U256::ZERO);
        self.ledger = staged;

        journal.append_note(
            Ok(()),
            LogType::Info,
            format!("Released {} want of the {} requested.", released, amount),
        );
        Ok(released)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.ledger.snapshot()
    }

    pub fn balance_of_want(&self) -> U256 {
        self.ledger.want_balance()
    }

    /// Stablecoin value of the yield vault shares held
    pub fn value_of_investment(&self) -> StrategyResult<U256> {
        let yield_vault = &self.collaborators.yield_vault;
        let shares = yield_vault.balance_of(self.address)?;
        shares_to_value(shares, yield_vault.price_per_share()?)
    }

    /// Want value of everything the strategy holds, net of its debt
    pub fn estimated_total_assets(&self) -> StrategyResult<U256> {
        let market = &self.collaborators.market;
        net_assets(
            self.ledger.want_balance(),
            market.collateral_balance(self.address)?,
            self.value_of_investment()?,
            market.current_debt(self.address)?,
            &*self.collaborators.swap,
        )
    }

    /// Current collateral ratio at the lending market
    pub fn collateral_ratio_bps(&self) -> StrategyResult<U256> {
        let market = &self.collaborators.market;
        RatioController::ratio_bps(
            market.current_debt(self.address)?,
            market.current_collateral_value(self.address)?,
        )
    }

    pub fn query(&self) -> StrategyResult<StrategyQuery> {
        Ok(StrategyQuery {
            address: self.address.to_string(),
            name: self.settings.name.clone(),
            initialized: self.data.initialized,
            harvest_state: self.data.harvest_state,
            emergency_exit: self.data.emergency_exit,
            migrated_to: self.data.migrated_to.map(|address| address.to_string()),
            last_report: self.data.last_report,
            harvest_count: self.data.harvest_count,
            total_gain: u256_to_nat(&self.data.total_gain),
            total_loss: u256_to_nat(&self.data.total_loss),
            estimated_total_assets: u256_to_nat(&self.estimated_total_assets()?),
            collateral_ratio_bps: u256_to_nat(&self.collateral_ratio_bps()?),
            ledger: self.ledger.snapshot().into(),
        })
    }

    pub fn settings_query(&self) -> StrategySettingsQuery {
        self.settings.clone().into()
    }

    pub fn set_collateral_ratio(
        &mut self,
        caller: Address,
        min_ratio_bps: u64,
        max_ratio_bps: u64,
    ) -> StrategyResult<()> {
        self.ensure_initialized()?;
        only_roles(caller, &self.authorized())?;
        let ratio = CollateralRatioConfig::new(min_ratio_bps, max_ratio_bps)?;
        self.settings.ratio(ratio);
        Ok(())
    }

    pub fn set_strategist(&mut self, caller: Address, strategist: Address) -> StrategyResult<()> {
        self.ensure_initialized()?;
        only_roles(caller, &self.authorized())?;
        if strategist == Address::ZERO {
            return Err(StrategyError::InvalidConfig(
                "Strategist cannot be the zero address.".to_string(),
            ));
        }
        self.settings.strategist(strategist);
        Ok(())
    }

    pub fn set_keeper(&mut self, caller: Address, keeper: Address) -> StrategyResult<()> {
        self.ensure_initialized()?;
        only_roles(caller, &self.authorized())?;
        self.settings.keeper(keeper);
        Ok(())
    }

    /// Only the strategist may redirect its rewards
    pub fn set_rewards(&mut self, caller: Address, rewards: Address) -> StrategyResult<()> {
        self.ensure_initialized()?;
        only_roles(caller, &[self.settings.strategist])?;
        if rewards == Address::ZERO {
            return Err(StrategyError::InvalidConfig(
                "Rewards cannot be the zero address.".to_string(),
            ));
        }
        self.settings.rewards(rewards);
        Ok(())
    }

    pub fn set_min_report_delay(&mut self, caller: Address, delay: Duration) -> StrategyResult<()> {
        self.ensure_initialized()?;
        only_roles(caller, &self.authorized())?;
        self.settings.min_report_delay(delay);
        Ok(())
    }

    pub fn set_max_report_delay(&mut self, caller: Address, delay: Duration) -> StrategyResult<()> {
        self.ensure_initialized()?;
        only_roles(caller, &self.authorized())?;
        self.settings.max_report_delay(delay);
        Ok(())
    }

    pub fn set_debt_threshold(&mut self, caller: Address, threshold: U256) -> StrategyResult<()> {
        self.ensure_initialized()?;
        only_roles(caller, &self.authorized())?;
        self.settings.debt_threshold(threshold);
        Ok(())
    }

    /// Replaces the health check guard. `None` disables it.
    pub fn set_health_check(
        &mut self,
        caller: Address,
        health_check: Option<Box<dyn HealthCheck>>,
    ) -> StrategyResult<()> {
        self.ensure_initialized()?;
        only_roles(caller, &[self.governance()])?;
        self.collaborators.health_check = health_check;
        Ok(())
    }

    /// Skips the guard on the next harvest when set to `false`
    pub fn set_do_health_check(
        &mut self,
        caller: Address,
        do_health_check: bool,
    ) -> StrategyResult<()> {
        self.ensure_initialized()?;
        only_roles(caller, &[self.governance()])?;
        self.settings.do_health_check(do_health_check);
        Ok(())
    }

    /// From now on every harvest repays the parent vault in full and nothing is redeployed
    pub fn set_emergency_exit(&mut self, caller: Address) -> StrategyResult<()> {
        self.ensure_initialized()?;
        only_roles(caller, &self.authorized())?;
        if self.data.emergency_exit {
            return Ok(());
        }
        self.data.emergency_exit(true);

        events::emit(
            self.address,
            &EmergencyExitEnabled {
                strategy: self.address,
            },
            &[self.address],
        );
        JournalCollection::open(Some(self.address), None).append_note(
            Ok(()),
            LogType::Lifecycle,
            "Emergency exit enabled.",
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        adapters::health::CommonHealthCheck,
        state::get_events,
        testing::{e18, World},
    };

    #[test]
    fn test_uninitialized_strategy_rejects_operations() {
        let world = World::new();
        let mut strategy = Strategy::new(Address::repeat_byte(0xa1), world.collaborators());

        assert_eq!(
            strategy.deposit(world.vault_address(), e18(1)),
            Err(StrategyError::NotInitialized)
        );
        assert_eq!(
            strategy.set_keeper(world.governance, Address::repeat_byte(0x01)),
            Err(StrategyError::NotInitialized)
        );
        assert_eq!(
            strategy.harvest(world.keeper, 1).err(),
            Some(StrategyError::NotInitialized)
        );
    }

    #[test]
    fn test_deposit_only_from_vault() {
        let world = World::new();
        let mut strategy = world.strategy(Address::repeat_byte(0xa1));

        assert_eq!(
            strategy.deposit(world.keeper, e18(1)),
            Err(StrategyError::Unauthorized)
        );
        strategy.deposit(world.vault_address(), e18(5)).unwrap();
        assert_eq!(strategy.balance_of_want(), e18(5));
        assert_eq!(strategy.snapshot().total_debt_to_parent, e18(5));
    }

    #[test]
    fn test_withdraw_unwinds_position() {
        let world = World::new();
        let mut strategy = world.strategy(Address::repeat_byte(0xa1));
        world.fund(&mut strategy, e18(10_000));
        strategy.harvest(world.keeper, 1).unwrap();
        assert_eq!(strategy.balance_of_want(), U256::ZERO);

        assert_eq!(
            strategy.withdraw(world.keeper, e18(1)),
            Err(StrategyError::Unauthorized)
        );
        let freed = world.vault.withdraw_from(&mut strategy, e18(4_000)).unwrap();

        assert_eq!(freed, e18(4_000));
        let snapshot = strategy.snapshot();
        assert_eq!(snapshot.want_balance, U256::ZERO);
        assert_eq!(snapshot.collateral_amount, e18(6_000));
        assert_eq!(snapshot.borrowed_amount, e18(9_000));
        assert_eq!(snapshot.total_debt_to_parent, e18(6_000));
        assert_eq!(world.vault.total_idle(), e18(4_000));
        assert_eq!(strategy.collateral_ratio_bps().unwrap(), U256::from(75_000u64));
    }

    #[test]
    fn test_queries() {
        let world = World::new();
        let mut strategy = world.strategy(Address::repeat_byte(0xa1));
        world.fund(&mut strategy, e18(10_000));
        strategy.harvest(world.keeper, 1).unwrap();

        assert_eq!(strategy.value_of_investment().unwrap(), e18(13_000));
        assert_eq!(strategy.estimated_total_assets().unwrap(), e18(10_000));
        assert_eq!(strategy.collateral_ratio_bps().unwrap(), U256::from(65_000u64));

        let query = strategy.query().unwrap();
        assert_eq!(query.name, "StrategyLeveragedWant");
        assert_eq!(query.harvest_count, 1);
        assert_eq!(query.ledger.borrowed_amount, u256_to_nat(&e18(13_000)));

        let settings = strategy.settings_query();
        assert_eq!(settings.keeper, world.keeper.to_string());
        assert_eq!(settings.min_ratio_bps, 65_000);
    }

    #[test]
    fn test_setters_enforce_roles() {
        let world = World::new();
        let mut strategy = world.strategy(Address::repeat_byte(0xa1));
        let stranger = Address::repeat_byte(0xee);

        assert_eq!(
            strategy.set_collateral_ratio(world.keeper, 50_000, 60_000),
            Err(StrategyError::Unauthorized)
        );
        strategy
            .set_collateral_ratio(world.strategist, 50_000, 60_000)
            .unwrap();
        assert_eq!(strategy.settings().ratio.max_ratio_bps, 60_000);
        assert!(matches!(
            strategy.set_collateral_ratio(world.governance, 70_000, 60_000),
            Err(StrategyError::InvalidConfig(_))
        ));

        strategy.set_keeper(world.governance, stranger).unwrap();
        assert_eq!(strategy.settings().keeper, stranger);

        assert_eq!(
            strategy.set_rewards(world.governance, stranger),
            Err(StrategyError::Unauthorized)
        );
        strategy.set_rewards(world.strategist, stranger).unwrap();

        assert_eq!(
            strategy.set_health_check(world.strategist, None),
            Err(StrategyError::Unauthorized)
        );
        strategy
            .set_health_check(world.governance, Some(Box::new(CommonHealthCheck::default())))
            .unwrap();
        strategy.set_do_health_check(world.governance, false).unwrap();
        assert!(!strategy.settings().do_health_check);

        strategy
            .set_min_report_delay(world.strategist, Duration::hours(1))
            .unwrap();
        strategy
            .set_max_report_delay(world.strategist, Duration::days(1))
            .unwrap();
        strategy
            .set_debt_threshold(world.strategist, e18(1))
            .unwrap();
        assert_eq!(strategy.settings().debt_threshold, e18(1));

        assert!(matches!(
            strategy.set_strategist(world.strategist, Address::ZERO),
            Err(StrategyError::InvalidConfig(_))
        ));
        strategy.set_strategist(world.strategist, stranger).unwrap();
        assert_eq!(
            strategy.set_keeper(world.strategist, world.keeper),
            Err(StrategyError::Unauthorized)
        );
    }

    #[test]
    fn test_emergency_exit_emits_once() {
        let world = World::new();
        let mut strategy = world.strategy(Address::repeat_byte(0xa1));

        assert_eq!(
            strategy.set_emergency_exit(world.keeper),
            Err(StrategyError::Unauthorized)
        );
        strategy.set_emergency_exit(world.strategist).unwrap();
        strategy.set_emergency_exit(world.governance).unwrap();

        assert!(strategy.data().emergency_exit);
        let events = get_events()
            .into_iter()
            .filter(|event| event.is::<EmergencyExitEnabled>())
            .count();
        assert_eq!(events, 1);
    }
}
