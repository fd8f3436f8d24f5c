//! Collateral ratio control
//!
//! The collateral ratio is `borrowed / collateral_value`, both in stablecoin units,
//! expressed in basis points of [`RATIO_PRECISION`].
//!
//! ```plain
//!  0 ──────── min ════════ max ──────── 100_000
//!     borrow up to min  │ hold │  repay down to max
//! ```

use alloy_primitives::U256;
use candid::CandidType;
use serde::{Deserialize, Serialize};

use crate::{
    constants::{ratio_precision, DEFAULT_MAX_RATIO_BPS, DEFAULT_MIN_RATIO_BPS, RATIO_PRECISION},
    utils::{
        common::{mul_div_down, mul_div_up},
        error::{arithmetic_err, StrategyError, StrategyResult},
    },
};

/// Collateral ratio band of a strategy instance
#[derive(Clone, Copy, Debug, PartialEq, Eq, CandidType, Serialize, Deserialize)]
pub struct CollateralRatioConfig {
    pub min_ratio_bps: u64,
    pub max_ratio_bps: u64,
}

impl Default for CollateralRatioConfig {
    fn default() -> Self {
        Self {
            min_ratio_bps: DEFAULT_MIN_RATIO_BPS,
            max_ratio_bps: DEFAULT_MAX_RATIO_BPS,
        }
    }
}

impl CollateralRatioConfig {
    pub fn new(min_ratio_bps: u64, max_ratio_bps: u64) -> StrategyResult<Self> {
        let config = Self {
            min_ratio_bps,
            max_ratio_bps,
        };
        config.validate()?;
        Ok(config)
    }

    /// The band must be ordered and stay below a 100% ratio.
    pub fn validate(&self) -> StrategyResult<()> {
        if self.min_ratio_bps > self.max_ratio_bps {
            return Err(StrategyError::InvalidConfig(format!(
                "Minimum ratio {} is above the maximum ratio {}.",
                self.min_ratio_bps, self.max_ratio_bps
            )));
        }
        if self.max_ratio_bps >= RATIO_PRECISION {
            return Err(StrategyError::InvalidConfig(format!(
                "Maximum ratio {} must be below {}.",
                self.max_ratio_bps, RATIO_PRECISION
            )));
        }
        Ok(())
    }
}

/// Leverage change requested by the controller.
/// At most one of the two fields is non-zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Adjustment {
    pub borrow_more: U256,
    pub repay_amount: U256,
}

impl Adjustment {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_none(&self) -> bool {
        self.borrow_more.is_zero() && self.repay_amount.is_zero()
    }
}

/// Stateless controller keeping a position inside its ratio band
pub struct RatioController;

impl RatioController {
    /// Computes the borrow or repay delta that brings the position back into the band.
    ///
    /// Above `max_ratio_bps` the debt is repaid down to exactly the maximum: the target
    /// debt is rounded down, so the repay amount is rounded up.
    /// Below `min_ratio_bps` the debt is raised to exactly the minimum, rounded down.
    /// With no collateral value the only adjustment is a full repay.
    pub fn compute_adjustment(
        collateral_value: U256,
        borrowed_amount: U256,
        config: &CollateralRatioConfig,
    ) -> StrategyResult<Adjustment> {
        if collateral_value.is_zero() {
            return Ok(Adjustment {
                borrow_more: U256::ZERO,
                repay_amount: borrowed_amount,
            });
        }

        let scaled_debt = borrowed_amount
            .checked_mul(ratio_precision())
            .ok_or_else(|| arithmetic_err("Scaled debt overflowed."))?;

        let max_scaled = collateral_value
            .checked_mul(U256::from(config.max_ratio_bps))
            .ok_or_else(|| arithmetic_err("Scaled collateral value overflowed."))?;
        if scaled_debt > max_scaled {
            let target_debt = max_scaled / ratio_precision();
            return Ok(Adjustment {
                borrow_more: U256::ZERO,
                repay_amount: borrowed_amount - target_debt,
            });
        }

        let min_scaled = collateral_value
            .checked_mul(U256::from(config.min_ratio_bps))
            .ok_or_else(|| arithmetic_err("Scaled collateral value overflowed."))?;
        if scaled_debt < min_scaled {
            let target_debt = min_scaled / ratio_precision();
            return Ok(Adjustment {
                borrow_more: target_debt.saturating_sub(borrowed_amount),
                repay_amount: U256::ZERO,
            });
        }

        Ok(Adjustment::none())
    }

    /// Maximum additional debt allowed before the ratio exceeds `max_ratio_bps`.
    /// Borrowing needs collateral: a zero collateral value is rejected.
    pub fn max_borrow(
        collateral_value: U256,
        borrowed_amount: U256,
        config: &CollateralRatioConfig,
    ) -> StrategyResult<U256> {
        if collateral_value.is_zero() {
            return Err(StrategyError::NoCollateral);
        }
        let ceiling = mul_div_down(
            collateral_value,
            U256::from(config.max_ratio_bps),
            ratio_precision(),
        )?;
        Ok(ceiling.saturating_sub(borrowed_amount))
    }

    /// Current ratio in basis points, rounded up. Zero collateral with debt reports
    /// the full precision.
    pub fn ratio_bps(borrowed_amount: U256, collateral_value: U256) -> StrategyResult<U256> {
        if collateral_value.is_zero() {
            return Ok(if borrowed_amount.is_zero() {
                U256::ZERO
            } else {
                ratio_precision()
            });
        }
        mul_div_up(borrowed_amount, ratio_precision(), collateral_value)
    }

    /// Minimum collateral value that keeps `borrowed_amount` at or below the maximum ratio
    pub fn required_collateral_value(
        borrowed_amount: U256,
        config: &CollateralRatioConfig,
    ) -> StrategyResult<U256> {
        if borrowed_amount.is_zero() {
            return Ok(U256::ZERO);
        }
        if config.max_ratio_bps == 0 {
            return Err(StrategyError::InvalidConfig(
                "A zero maximum ratio cannot carry debt.".to_string(),
            ));
        }
        mul_div_up(
            borrowed_amount,
            ratio_precision(),
            U256::from(config.max_ratio_bps),
        )
    }

    /// Returns `true` if applying the controller would not change the position
    pub fn is_within_band(
        collateral_value: U256,
        borrowed_amount: U256,
        config: &CollateralRatioConfig,
    ) -> StrategyResult<bool> {
        Ok(Self::compute_adjustment(collateral_value, borrowed_amount, config)?.is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn band() -> CollateralRatioConfig {
        CollateralRatioConfig::new(65_000, 75_000).unwrap()
    }

    fn apply(debt: U256, adjustment: Adjustment) -> U256 {
        debt + adjustment.borrow_more - adjustment.repay_amount
    }

    #[test]
    fn test_config_validation() {
        assert!(CollateralRatioConfig::new(60_000, 75_000).is_ok());
        assert!(CollateralRatioConfig::new(75_000, 75_000).is_ok());
        assert!(matches!(
            CollateralRatioConfig::new(75_001, 75_000),
            Err(StrategyError::InvalidConfig(_))
        ));
        assert!(matches!(
            CollateralRatioConfig::new(0, RATIO_PRECISION),
            Err(StrategyError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_borrow_to_min_from_empty_position() {
        let adjustment =
            RatioController::compute_adjustment(U256::from(20_000u64), U256::ZERO, &band())
                .unwrap();
        assert_eq!(adjustment.borrow_more, U256::from(13_000u64));
        assert_eq!(adjustment.repay_amount, U256::ZERO);
    }

    #[test]
    fn test_repay_to_max_rounds_up() {
        // 801 against 1_001 is above 75%; the target of 750.75 rounds down to 750
        let adjustment =
            RatioController::compute_adjustment(U256::from(1_001u64), U256::from(801u64), &band())
                .unwrap();
        assert_eq!(adjustment.repay_amount, U256::from(51u64));
        assert_eq!(adjustment.borrow_more, U256::ZERO);
    }

    #[test]
    fn test_inside_band_is_untouched() {
        let adjustment =
            RatioController::compute_adjustment(U256::from(1_000u64), U256::from(700u64), &band())
                .unwrap();
        assert!(adjustment.is_none());
        assert!(
            RatioController::is_within_band(U256::from(1_000u64), U256::from(700u64), &band())
                .unwrap()
        );
    }

    #[test]
    fn test_zero_collateral_repays_everything() {
        let adjustment =
            RatioController::compute_adjustment(U256::ZERO, U256::from(42u64), &band()).unwrap();
        assert_eq!(adjustment.repay_amount, U256::from(42u64));
        assert_eq!(adjustment.borrow_more, U256::ZERO);

        assert_eq!(
            RatioController::max_borrow(U256::ZERO, U256::ZERO, &band()),
            Err(StrategyError::NoCollateral)
        );
    }

    #[test]
    fn test_ratio_bps() {
        assert_eq!(
            RatioController::ratio_bps(U256::from(13_000u64), U256::from(20_000u64)).unwrap(),
            U256::from(65_000u64)
        );
        assert_eq!(
            RatioController::ratio_bps(U256::ZERO, U256::ZERO).unwrap(),
            U256::ZERO
        );
    }

    #[test]
    fn test_required_collateral_value() {
        assert_eq!(
            RatioController::required_collateral_value(U256::from(750u64), &band()).unwrap(),
            U256::from(1_000u64)
        );
        assert_eq!(
            RatioController::required_collateral_value(U256::from(751u64), &band()).unwrap(),
            U256::from(1_002u64)
        );
    }

    proptest! {
        #[test]
        fn test_adjustment_is_idempotent(
            value in 0u128..(1u128 << 100),
            debt in 0u128..(1u128 << 100),
            min in 0u64..RATIO_PRECISION,
            spread in 0u64..RATIO_PRECISION,
        ) {
            let max = (min + spread).min(RATIO_PRECISION - 1);
            let config = CollateralRatioConfig::new(min.min(max), max).unwrap();
            let value = U256::from(value);
            let debt = U256::from(debt);

            let first = RatioController::compute_adjustment(value, debt, &config).unwrap();
            prop_assert!(first.borrow_more.is_zero() || first.repay_amount.is_zero());

            let adjusted = apply(debt, first);
            let second = RatioController::compute_adjustment(value, adjusted, &config).unwrap();
            prop_assert!(second.is_none());
        }

        #[test]
        fn test_adjustment_never_exceeds_max(
            value in 1u128..(1u128 << 100),
            debt in 0u128..(1u128 << 100),
        ) {
            let config = band();
            let value = U256::from(value);
            let debt = U256::from(debt);
            let adjusted = apply(debt, RatioController::compute_adjustment(value, debt, &config).unwrap());

            prop_assert!(adjusted * ratio_precision() <= value * U256::from(config.max_ratio_bps));
        }
    }
}
