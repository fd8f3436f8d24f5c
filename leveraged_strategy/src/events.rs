//! Strategy events
//!
//! Events keep the ABI layout of their on-chain counterparts: the first topic is the
//! event signature hash, indexed addresses follow, the remaining fields are the
//! ABI-encoded data.

use alloy_primitives::{Address, Bytes, B256};
use alloy_sol_types::{sol, SolEvent};

use crate::state::insert_event;

sol! {
    event Harvested(address indexed strategy, uint256 profit, uint256 loss, uint256 debtPayment, uint256 debtOutstanding);
    event Cloned(address indexed clone, address indexed origin);
    event Migrated(address indexed origin, address indexed successor);
    event EmergencyExitEnabled(address indexed strategy);
}

/// Emitted event
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventRecord {
    pub emitter: Address,
    pub signature: &'static str,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

impl EventRecord {
    pub fn is<E: SolEvent>(&self) -> bool {
        self.topics.first() == Some(&E::SIGNATURE_HASH)
    }
}

/// Records `event` in the event log. `indexed` lists the indexed fields in order.
pub fn emit<E: SolEvent>(emitter: Address, event: &E, indexed: &[Address]) {
    let mut topics = vec![E::SIGNATURE_HASH];
    topics.extend(indexed.iter().map(|address| address.into_word()));

    insert_event(EventRecord {
        emitter,
        signature: E::SIGNATURE,
        topics,
        data: event.encode_data().into(),
    });
}
