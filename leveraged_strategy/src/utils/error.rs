use candid::CandidType;
use serde::{Deserialize, Serialize};

use crate::adapters::AdapterError;

/// Strategy Result
pub type StrategyResult<T> = Result<T, StrategyError>;

/// Strategy Errors
#[derive(Clone, CandidType, Debug, Deserialize, PartialEq, Serialize)]
pub enum StrategyError {
    /// `initialize` was called on an instance that is already initialized
    AlreadyInitialized,
    /// The instance has not been initialized yet
    NotInitialized,
    /// Unauthorized access
    Unauthorized,
    /// Requested want decrement exceeds the idle want balance
    InsufficientWant,
    /// Requested collateral or debt decrement exceeds the recorded balance
    InsufficientCollateral,
    /// Requested share decrement exceeds the recorded shares
    InsufficientShares,
    /// Borrowing was attempted against zero collateral value
    NoCollateral,
    /// A migration step could not complete. The origin is left unchanged.
    MigrationFailed(String),
    /// The health check guard rejected the computed harvest
    HealthCheckRejected(String),
    /// A collaborator call failed
    AdapterFailure(AdapterError),
    /// Invalid configuration value
    InvalidConfig(String),
    /// Decoding issue
    DecodingError(String),
    /// Arithmetic error
    Arithmetic(String),
    /// Unknown/Custom error
    Custom(String),
}

impl From<AdapterError> for StrategyError {
    fn from(value: AdapterError) -> Self {
        StrategyError::AdapterFailure(value)
    }
}

pub fn arithmetic_err<S: AsRef<str>>(s: S) -> StrategyError {
    StrategyError::Arithmetic(format!("{:#?}", s.as_ref()))
}
