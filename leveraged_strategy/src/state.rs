use std::cell::RefCell;

use crate::{events::EventRecord, journal::JournalRecord};

thread_local! {
    /// Operation journal, most recent collections last
    pub static JOURNAL: RefCell<Vec<JournalRecord>> = const { RefCell::new(Vec::new()) };
    /// Events emitted by every strategy and factory of this thread
    pub static EVENT_LOG: RefCell<Vec<EventRecord>> = const { RefCell::new(Vec::new()) };
}

pub fn insert_journal_collection(collection: JournalRecord) {
    JOURNAL.with(|journal| journal.borrow_mut().push(collection));
}

pub fn insert_event(record: EventRecord) {
    EVENT_LOG.with(|events| events.borrow_mut().push(record));
}

/// Returns a copy of the journal
pub fn get_journal() -> Vec<JournalRecord> {
    JOURNAL.with(|journal| journal.borrow().clone())
}

/// Returns a copy of the event log
pub fn get_events() -> Vec<EventRecord> {
    EVENT_LOG.with(|events| events.borrow().clone())
}
