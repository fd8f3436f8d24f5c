//! Profit and loss limits guarding harvests

use alloy_primitives::U256;

use crate::constants::{max_bps, DEFAULT_LOSS_LIMIT_BPS, DEFAULT_PROFIT_LIMIT_BPS};

use super::HealthCheck;

/// Rejects harvests whose profit or loss exceeds a fraction of the total assets
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommonHealthCheck {
    /// Maximum profit, in basis points of the total assets
    pub profit_limit_bps: u64,
    /// Maximum loss, in basis points of the total assets
    pub loss_limit_bps: u64,
}

impl Default for CommonHealthCheck {
    fn default() -> Self {
        Self {
            profit_limit_bps: DEFAULT_PROFIT_LIMIT_BPS,
            loss_limit_bps: DEFAULT_LOSS_LIMIT_BPS,
        }
    }
}

impl CommonHealthCheck {
    pub fn profit_limit_bps(mut self, profit_limit_bps: u64) -> Self {
        self.profit_limit_bps = profit_limit_bps;
        self
    }

    pub fn loss_limit_bps(mut self, loss_limit_bps: u64) -> Self {
        self.loss_limit_bps = loss_limit_bps;
        self
    }

    /// `amount <= total_assets * limit_bps / MAX_BPS`, without rounding
    fn within(amount: U256, total_assets: U256, limit_bps: u64) -> bool {
        match (
            amount.checked_mul(max_bps()),
            total_assets.checked_mul(U256::from(limit_bps)),
        ) {
            (Some(scaled_amount), Some(scaled_limit)) => scaled_amount <= scaled_limit,
            _ => false,
        }
    }
}

impl HealthCheck for CommonHealthCheck {
    fn check(&self, profit: U256, loss: U256, total_assets: U256) -> bool {
        Self::within(profit, total_assets, self.profit_limit_bps)
            && Self::within(loss, total_assets, self.loss_limit_bps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits() {
        let guard = CommonHealthCheck::default()
            .profit_limit_bps(500)
            .loss_limit_bps(100);
        let total_assets = U256::from(10_000u64);

        assert!(guard.check(U256::from(500u64), U256::ZERO, total_assets));
        assert!(!guard.check(U256::from(501u64), U256::ZERO, total_assets));
        assert!(guard.check(U256::ZERO, U256::from(100u64), total_assets));
        assert!(!guard.check(U256::ZERO, U256::from(101u64), total_assets));
    }

    #[test]
    fn test_zero_total_assets_only_accepts_zero() {
        let guard = CommonHealthCheck::default();
        assert!(guard.check(U256::ZERO, U256::ZERO, U256::ZERO));
        assert!(!guard.check(U256::from(1u64), U256::ZERO, U256::ZERO));
    }
}
