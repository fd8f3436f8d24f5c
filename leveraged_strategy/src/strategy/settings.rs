//! Strategy settings

use alloy_primitives::{Address, U256};
use candid::{CandidType, Nat};
use chrono::Duration;

use crate::{
    constants::{DEFAULT_MAX_REPORT_DELAY, DEFAULT_MIN_REPORT_DELAY},
    ratio::CollateralRatioConfig,
    utils::common::u256_to_nat,
};

/// Settings of a strategy instance.
/// Collaborator identities are bound at construction, the rest is set by
/// `initialize` and the privileged setters.
#[derive(Clone)]
pub struct StrategySettings {
    pub name: String,
    /// Parent vault lending want to this strategy
    pub vault: Address,
    /// Lending market holding the collateral
    pub lending_market: Address,
    /// Secondary vault holding the borrowed stablecoin
    pub yield_vault: Address,
    pub strategist: Address,
    pub keeper: Address,
    /// Receiver of the strategist's rewards
    pub rewards: Address,
    pub ratio: CollateralRatioConfig,
    /// Minimum delay between two harvests
    pub min_report_delay: Duration,
    /// A harvest is due once this delay elapsed
    pub max_report_delay: Duration,
    /// Debt outstanding above this amount makes a harvest due
    pub debt_threshold: U256,
    /// Consults the health check guard on the next harvest
    pub do_health_check: bool,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            vault: Address::ZERO,
            lending_market: Address::ZERO,
            yield_vault: Address::ZERO,
            strategist: Address::ZERO,
            keeper: Address::ZERO,
            rewards: Address::ZERO,
            ratio: CollateralRatioConfig::default(),
            min_report_delay: Duration::seconds(DEFAULT_MIN_REPORT_DELAY),
            max_report_delay: Duration::seconds(DEFAULT_MAX_REPORT_DELAY),
            debt_threshold: U256::ZERO,
            do_health_check: true,
        }
    }
}

impl StrategySettings {
    pub fn name<S: AsRef<str>>(&mut self, name: S) -> &mut Self {
        self.name = name.as_ref().to_string();
        self
    }

    pub fn vault(&mut self, vault: Address) -> &mut Self {
        self.vault = vault;
        self
    }

    pub fn lending_market(&mut self, lending_market: Address) -> &mut Self {
        self.lending_market = lending_market;
        self
    }

    pub fn yield_vault(&mut self, yield_vault: Address) -> &mut Self {
        self.yield_vault = yield_vault;
        self
    }

    pub fn strategist(&mut self, strategist: Address) -> &mut Self {
        self.strategist = strategist;
        self
    }

    pub fn keeper(&mut self, keeper: Address) -> &mut Self {
        self.keeper = keeper;
        self
    }

    pub fn rewards(&mut self, rewards: Address) -> &mut Self {
        self.rewards = rewards;
        self
    }

    pub fn ratio(&mut self, ratio: CollateralRatioConfig) -> &mut Self {
        self.ratio = ratio;
        self
    }

    pub fn min_report_delay(&mut self, min_report_delay: Duration) -> &mut Self {
        self.min_report_delay = min_report_delay;
        self
    }

    pub fn max_report_delay(&mut self, max_report_delay: Duration) -> &mut Self {
        self.max_report_delay = max_report_delay;
        self
    }

    pub fn debt_threshold(&mut self, debt_threshold: U256) -> &mut Self {
        self.debt_threshold = debt_threshold;
        self
    }

    pub fn do_health_check(&mut self, do_health_check: bool) -> &mut Self {
        self.do_health_check = do_health_check;
        self
    }
}

/// Candid view of the settings
#[derive(Clone, Default, CandidType)]
pub struct StrategySettingsQuery {
    pub name: String,
    pub vault: String,
    pub lending_market: String,
    pub yield_vault: String,
    pub strategist: String,
    pub keeper: String,
    pub rewards: String,
    pub min_ratio_bps: u64,
    pub max_ratio_bps: u64,
    /// Seconds
    pub min_report_delay: i64,
    /// Seconds
    pub max_report_delay: i64,
    pub debt_threshold: Nat,
    pub do_health_check: bool,
}

impl From<StrategySettings> for StrategySettingsQuery {
    fn from(value: StrategySettings) -> Self {
        Self {
            name: value.name,
            vault: value.vault.to_string(),
            lending_market: value.lending_market.to_string(),
            yield_vault: value.yield_vault.to_string(),
            strategist: value.strategist.to_string(),
            keeper: value.keeper.to_string(),
            rewards: value.rewards.to_string(),
            min_ratio_bps: value.ratio.min_ratio_bps,
            max_ratio_bps: value.ratio.max_ratio_bps,
            min_report_delay: value.min_report_delay.num_seconds(),
            max_report_delay: value.max_report_delay.num_seconds(),
            debt_threshold: u256_to_nat(&value.debt_threshold),
            do_health_check: value.do_health_check,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_strategy_settings_setters() {
        let mut settings = StrategySettings::default();

        let vault = Address::repeat_byte(0x11);
        let lending_market = Address::repeat_byte(0x22);
        let yield_vault = Address::repeat_byte(0x33);
        let strategist = Address::repeat_byte(0x44);
        let keeper = Address::repeat_byte(0x55);
        let rewards = Address::repeat_byte(0x66);
        let ratio = CollateralRatioConfig::new(50_000, 60_000).unwrap();

        settings
            .name("StrategyLeveragedWant")
            .vault(vault)
            .lending_market(lending_market)
            .yield_vault(yield_vault)
            .strategist(strategist)
            .keeper(keeper)
            .rewards(rewards)
            .ratio(ratio)
            .min_report_delay(Duration::hours(6))
            .max_report_delay(Duration::days(2))
            .debt_threshold(U256::from(1_000u64))
            .do_health_check(false);

        assert_eq!(settings.name, "StrategyLeveragedWant");
        assert_eq!(settings.vault, vault);
        assert_eq!(settings.lending_market, lending_market);
        assert_eq!(settings.yield_vault, yield_vault);
        assert_eq!(settings.strategist, strategist);
        assert_eq!(settings.keeper, keeper);
        assert_eq!(settings.rewards, rewards);
        assert_eq!(settings.ratio, ratio);
        assert_eq!(settings.min_report_delay, Duration::hours(6));
        assert_eq!(settings.max_report_delay, Duration::days(2));
        assert_eq!(settings.debt_threshold, U256::from(1_000u64));
        assert!(!settings.do_health_check);
    }

    #[test]
    fn test_default_settings() {
        let settings = StrategySettings::default();
        assert!(settings.do_health_check);
        assert_eq!(settings.max_report_delay, Duration::days(30));
        assert_eq!(settings.ratio, CollateralRatioConfig::default());
    }

    proptest! {
        #[test]
        fn test_settings_query_conversion(
            min_delay in 0i64..1_000_000,
            max_delay in 0i64..100_000_000,
            threshold in any::<u128>(),
        ) {
            let mut settings = StrategySettings::default();
            settings
                .vault(Address::repeat_byte(0x01))
                .min_report_delay(Duration::seconds(min_delay))
                .max_report_delay(Duration::seconds(max_delay))
                .debt_threshold(U256::from(threshold));

            let query = StrategySettingsQuery::from(settings.clone());
            prop_assert_eq!(query.vault, settings.vault.to_string());
            prop_assert_eq!(query.min_report_delay, min_delay);
            prop_assert_eq!(query.max_report_delay, max_delay);
            prop_assert_eq!(query.debt_threshold, u256_to_nat(&settings.debt_threshold));
        }
    }
}
