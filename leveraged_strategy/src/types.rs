use alloy_primitives::{Address, U256};
use candid::{CandidType, Nat};
use serde::{Deserialize, Serialize};

use crate::{
    ledger::LedgerQuery,
    ratio::CollateralRatioConfig,
    strategy::data::HarvestState,
    utils::{
        common::string_to_address,
        error::StrategyError,
    },
};

/// Initialization arguments of a strategy instance
#[derive(Clone, CandidType, Debug, Deserialize, Serialize)]
pub struct InitArgs {
    pub name: String,
    pub strategist: String,
    pub keeper: String,
    pub rewards: String,
    pub min_ratio_bps: u64,
    pub max_ratio_bps: u64,
}

/// Validated initialization arguments
#[derive(Clone, Debug, PartialEq)]
pub struct StrategyParams {
    pub name: String,
    pub strategist: Address,
    pub keeper: Address,
    pub rewards: Address,
    pub ratio: CollateralRatioConfig,
}

impl TryFrom<InitArgs> for StrategyParams {
    type Error = StrategyError;

    fn try_from(value: InitArgs) -> Result<Self, Self::Error> {
        let strategist = string_to_address(value.strategist)?;
        let keeper = string_to_address(value.keeper)?;
        let rewards = string_to_address(value.rewards)?;
        let ratio = CollateralRatioConfig::new(value.min_ratio_bps, value.max_ratio_bps)?;

        if strategist == Address::ZERO {
            return Err(StrategyError::InvalidConfig(
                "Strategist cannot be the zero address.".to_string(),
            ));
        }

        Ok(Self {
            name: value.name,
            strategist,
            keeper,
            rewards,
            ratio,
        })
    }
}

/// Outcome of one harvest, in want units
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HarvestResult {
    pub profit: U256,
    pub loss: U256,
    pub debt_repayment: U256,
}

/// Committed harvest
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HarvestReport {
    pub result: HarvestResult,
    /// Debt the parent vault still expects back after the report
    pub debt_outstanding: U256,
    pub epoch: u64,
}

/// Candid view of a strategy instance
#[derive(Clone, CandidType)]
pub struct StrategyQuery {
    pub address: String,
    pub name: String,
    pub initialized: bool,
    pub harvest_state: HarvestState,
    pub emergency_exit: bool,
    pub migrated_to: Option<String>,
    pub last_report: u64,
    pub harvest_count: u64,
    pub total_gain: Nat,
    pub total_loss: Nat,
    pub estimated_total_assets: Nat,
    pub collateral_ratio_bps: Nat,
    pub ledger: LedgerQuery,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> InitArgs {
        InitArgs {
            name: "StrategyLeveragedWant".to_string(),
            strategist: Address::repeat_byte(0x01).to_string(),
            keeper: Address::repeat_byte(0x02).to_string(),
            rewards: Address::repeat_byte(0x03).to_string(),
            min_ratio_bps: 65_000,
            max_ratio_bps: 75_000,
        }
    }

    #[test]
    fn test_init_args_conversion() {
        let params = StrategyParams::try_from(args()).unwrap();
        assert_eq!(params.strategist, Address::repeat_byte(0x01));
        assert_eq!(params.keeper, Address::repeat_byte(0x02));
        assert_eq!(params.ratio, CollateralRatioConfig::default());
    }

    #[test]
    fn test_init_args_rejects_bad_input() {
        let mut bad_address = args();
        bad_address.keeper = "0x1234".to_string();
        assert!(matches!(
            StrategyParams::try_from(bad_address),
            Err(StrategyError::DecodingError(_))
        ));

        let mut bad_band = args();
        bad_band.min_ratio_bps = 80_000;
        assert!(matches!(
            StrategyParams::try_from(bad_band),
            Err(StrategyError::InvalidConfig(_))
        ));

        let mut zero_strategist = args();
        zero_strategist.strategist = Address::ZERO.to_string();
        assert!(matches!(
            StrategyParams::try_from(zero_strategist),
            Err(StrategyError::InvalidConfig(_))
        ));
    }
}
