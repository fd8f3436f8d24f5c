pub mod adapters;
pub mod constants;
pub mod events;
pub mod journal;
pub mod ledger;
pub mod ratio;
pub mod state;
pub mod strategy;
pub mod types;
pub mod utils;

#[cfg(test)]
mod testing;

pub use adapters::{AdapterError, AdapterResult, Collaborator, Collaborators};
pub use ledger::{LedgerSnapshot, PositionLedger};
pub use strategy::{lifecycle::StrategyFactory, Strategy};
pub use types::{HarvestReport, HarvestResult, InitArgs};
pub use utils::error::{StrategyError, StrategyResult};
