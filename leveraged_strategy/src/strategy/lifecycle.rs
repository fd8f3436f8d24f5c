//! Initialization, cloning and migration

use alloy_primitives::{keccak256, Address};

use crate::{
    adapters::Collaborators,
    events::{self, Cloned, Migrated},
    journal::{JournalCollection, LogType},
    types::{InitArgs, StrategyParams},
    utils::{
        common::only_roles,
        error::{StrategyError, StrategyResult},
    },
};

use super::Strategy;

impl Strategy {
    /// Sets the name, roles and ratio band. Can only succeed once per instance.
    pub fn initialize(&mut self, args: InitArgs) -> StrategyResult<()> {
        if self.data.initialized {
            return Err(StrategyError::AlreadyInitialized);
        }
        let params = StrategyParams::try_from(args)?;

        self.settings
            .name(&params.name)
            .strategist(params.strategist)
            .keeper(params.keeper)
            .rewards(params.rewards)
            .ratio(params.ratio);
        self.data.initialized(true);

        JournalCollection::open(Some(self.address), None).append_note(
            Ok(()),
            LogType::Lifecycle,
            format!(
                "Initialized {} with a ratio band of {}-{}.",
                params.name, params.ratio.min_ratio_bps, params.ratio.max_ratio_bps
            ),
        );
        Ok(())
    }

    /// Moves the whole position to `successor`.
    ///
    /// Yield vault shares move first, then the lending market position. If the market
    /// refuses, the shares are sent back and the origin is left as it was.
    pub fn migrate(&mut self, caller: Address, successor: &mut Strategy) -> StrategyResult<()> {
        self.ensure_initialized()?;
        only_roles(caller, &[self.settings.vault, self.governance()])?;

        if !successor.data.initialized {
            return Err(StrategyError::MigrationFailed(
                "Successor is not initialized.".to_string(),
            ));
        }
        if successor.address == self.address {
            return Err(StrategyError::MigrationFailed(
                "Cannot migrate a strategy into itself.".to_string(),
            ));
        }
        if successor.settings.vault != self.settings.vault {
            return Err(StrategyError::MigrationFailed(
                "Successor belongs to another vault.".to_string(),
            ));
        }
        if !successor.ledger.is_empty() {
            return Err(StrategyError::MigrationFailed(
                "Successor already holds a position.".to_string(),
            ));
        }

        let yield_vault = &mut self.collaborators.yield_vault;
        let held = yield_vault
            .balance_of(successor.address)
            .map_err(|err| StrategyError::MigrationFailed(err.message))?;
        if !held.is_zero() {
            return Err(StrategyError::MigrationFailed(
                "Successor already holds yield vault shares.".to_string(),
            ));
        }

        let mut journal = JournalCollection::open(Some(self.address), None);
        let shares = yield_vault
            .balance_of(self.address)
            .map_err(|err| StrategyError::MigrationFailed(err.message))?;
        if !shares.is_zero() {
            yield_vault
                .transfer_shares(self.address, successor.address, shares)
                .map_err(|err| StrategyError::MigrationFailed(err.message))?;
        }

        if let Err(err) = self
            .collaborators
            .market
            .transfer_position(self.address, successor.address)
        {
            let mut reason = format!("Lending market refused the transfer: {}", err.message);
            if !shares.is_zero() {
                if let Err(undo) = self.collaborators.yield_vault.transfer_shares(
                    successor.address,
                    self.address,
                    shares,
                ) {
                    reason = format!("{} Returning the shares failed: {}", reason, undo.message);
                }
            }
            let failure = StrategyError::MigrationFailed(reason);
            journal.append_note(
                Err(failure.clone()),
                LogType::Lifecycle,
                "Migration was rolled back.",
            );
            return Err(failure);
        }

        successor.ledger = self.ledger.take();
        self.data.migrated_to(Some(successor.address));

        events::emit(
            self.address,
            &Migrated {
                origin: self.address,
                successor: successor.address,
            },
            &[self.address, successor.address],
        );
        journal.append_note(
            Ok(()),
            LogType::Lifecycle,
            format!("Migrated the position to {}.", successor.address),
        );
        Ok(())
    }
}

/// Factory of independent strategy instances.
/// Clone identities derive from the origin address and a nonce.
pub struct StrategyFactory {
    origin: Address,
    nonce: u64,
}

impl StrategyFactory {
    pub fn new(origin: Address) -> Self {
        Self { origin, nonce: 0 }
    }

    /// Identity of the next clone
    pub fn next_address(&self) -> Address {
        let mut preimage = self.origin.to_vec();
        preimage.extend_from_slice(&self.nonce.to_be_bytes());
        Address::from_slice(&keccak256(preimage)[12..])
    }

    /// Creates and initializes a new instance bound to `collaborators`
    pub fn clone_strategy(
        &mut self,
        collaborators: Collaborators,
        args: InitArgs,
    ) -> StrategyResult<(Strategy, Cloned)> {
        let address = self.next_address();
        let mut strategy = Strategy::new(address, collaborators);
        strategy.initialize(args)?;
        self.nonce += 1;

        let record = Cloned {
            clone: address,
            origin: self.origin,
        };
        events::emit(self.origin, &record, &[address, self.origin]);
        Ok((strategy, record))
    }
}
