//! Mutable strategy data

use alloy_primitives::{Address, U256};
use candid::CandidType;
use serde::{Deserialize, Serialize};

/// Stage of the harvest cycle
#[derive(Clone, Copy, CandidType, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
pub enum HarvestState {
    #[default]
    Idle,
    Valuing,
    Reconciling,
    Rebalancing,
    Reporting,
}

/// Struct containing the mutable non-ledger state of a strategy
#[derive(Clone, Default)]
pub struct StrategyData {
    /// Set once by `initialize`
    pub initialized: bool,
    pub harvest_state: HarvestState,
    /// Epoch of the last committed harvest, in seconds
    pub last_report: u64,
    /// Unwinds the position on every harvest and stops redeploying want
    pub emergency_exit: bool,
    /// Successor that received the position
    pub migrated_to: Option<Address>,
    /// Cumulative profit reported to the parent vault, in want
    pub total_gain: U256,
    /// Cumulative loss reported to the parent vault, in want
    pub total_loss: U256,
    pub harvest_count: u64,
}

impl StrategyData {
    pub fn initialized(&mut self, initialized: bool) -> &mut Self {
        self.initialized = initialized;
        self
    }

    pub fn harvest_state(&mut self, harvest_state: HarvestState) -> &mut Self {
        self.harvest_state = harvest_state;
        self
    }

    pub fn last_report(&mut self, last_report: u64) -> &mut Self {
        self.last_report = last_report;
        self
    }

    pub fn emergency_exit(&mut self, emergency_exit: bool) -> &mut Self {
        self.emergency_exit = emergency_exit;
        self
    }

    pub fn migrated_to(&mut self, migrated_to: Option<Address>) -> &mut Self {
        self.migrated_to = migrated_to;
        self
    }

    /// Accumulates the outcome of a committed harvest
    pub fn record_harvest(&mut self, profit: U256, loss: U256) -> &mut Self {
        self.total_gain = self.total_gain.saturating_add(profit);
        self.total_loss = self.total_loss.saturating_add(loss);
        self.harvest_count += 1;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_harvest_accumulates() {
        let mut data = StrategyData::default();
        data.record_harvest(U256::from(10), U256::ZERO)
            .record_harvest(U256::ZERO, U256::from(3))
            .last_report(42);

        assert_eq!(data.total_gain, U256::from(10));
        assert_eq!(data.total_loss, U256::from(3));
        assert_eq!(data.harvest_count, 2);
        assert_eq!(data.last_report, 42);
        assert_eq!(data.harvest_state, HarvestState::Idle);
    }
}
