//! Strategy constants

use alloy_primitives::U256;

/// Scale used for fixed point arithmetic (price per share, prices)
pub const SCALE: u128 = 1_000_000_000_000_000_000; // e18
pub fn scale() -> U256 {
    U256::from(SCALE)
}

/// Precision of the collateral ratio, in basis points of 100_000
pub const RATIO_PRECISION: u64 = 100_000;
pub fn ratio_precision() -> U256 {
    U256::from(RATIO_PRECISION)
}

/// Default lower bound of the collateral ratio band
pub const DEFAULT_MIN_RATIO_BPS: u64 = 65_000;

/// Default upper bound of the collateral ratio band
pub const DEFAULT_MAX_RATIO_BPS: u64 = 75_000;

/// Basis points used by the parent vault's debt ratios and the health check limits
pub const MAX_BPS: u64 = 10_000;
pub fn max_bps() -> U256 {
    U256::from(MAX_BPS)
}

/// Default profit limit of the health check (100% of total assets)
pub const DEFAULT_PROFIT_LIMIT_BPS: u64 = 10_000;

/// Default loss limit of the health check (1% of total assets)
pub const DEFAULT_LOSS_LIMIT_BPS: u64 = 100;

/// Default minimum delay between two harvests, in seconds
pub const DEFAULT_MIN_REPORT_DELAY: i64 = 0;

/// Default maximum delay between two harvests, in seconds (30 days)
pub const DEFAULT_MAX_REPORT_DELAY: i64 = 30 * 24 * 3600;

/// Maximum number of collateral sales when repaying debt the investment cannot cover
pub const MAX_UNWIND_STEPS: usize = 16;

/// Number of journal entries kept in memory
pub const MAX_JOURNAL_ENTRIES: usize = 300;
