//! Operation journal
//!
//! Every strategy operation opens a [`JournalCollection`], appends notes while it
//! runs and commits the collection to `state::JOURNAL` when it goes out of scope.
//! Notes are mirrored to the `log` facade.

use alloy_primitives::Address;
use candid::CandidType;
use serde::{Deserialize, Serialize};

use crate::{
    constants::MAX_JOURNAL_ENTRIES,
    state::{insert_journal_collection, JOURNAL},
    utils::error::{StrategyError, StrategyResult},
};

/// Kind of a journal entry
#[derive(Clone, Copy, CandidType, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub enum LogType {
    Info,
    HarvestResult,
    Lifecycle,
    Rejection,
}

/// Journal entry
#[derive(Clone, CandidType, Debug, Deserialize, Serialize)]
pub struct JournalEntry {
    pub epoch: Option<u64>,
    pub entry: StrategyResult<()>,
    pub log_type: LogType,
    pub note: Option<String>,
}

/// Builder for journal entries
impl JournalEntry {
    pub fn new(entry: StrategyResult<()>, log_type: LogType) -> Self {
        Self {
            epoch: None,
            entry,
            log_type,
            note: None,
        }
    }

    /// Fills the `epoch` field of the entry
    pub fn epoch(&mut self, epoch: Option<u64>) -> &mut Self {
        self.epoch = epoch;
        self
    }

    /// Fills the `note` field of the entry
    pub fn note<S: AsRef<str>>(&mut self, text: S) -> &mut Self {
        self.note = Some(text.as_ref().to_string());
        self
    }

    pub fn is_error(&self) -> bool {
        self.entry.is_err()
    }
}

/// Entries of one strategy operation, as stored in the journal
#[derive(Clone, CandidType, Debug, Deserialize, Serialize)]
pub struct JournalRecord {
    pub epoch: Option<u64>,
    pub strategy: Option<String>,
    pub entries: Vec<JournalEntry>,
}

/// Collection being filled by a running operation
pub struct JournalCollection {
    epoch: Option<u64>,
    strategy: Option<String>,
    entries: Vec<JournalEntry>,
}

impl JournalCollection {
    /// Opens an empty collection. It is committed to the journal on drop.
    pub fn open(strategy: Option<Address>, epoch: Option<u64>) -> Self {
        Self {
            epoch,
            strategy: strategy.map(|address| address.to_string()),
            entries: vec![],
        }
    }

    /// Appends a note to the collection
    pub fn append_note<S: AsRef<str>>(
        &mut self,
        result: StrategyResult<()>,
        log_type: LogType,
        note: S,
    ) -> &mut Self {
        let strategy = self.strategy.as_deref().unwrap_or("-");
        match &result {
            Ok(()) => log::info!("[{}] {:?}: {}", strategy, log_type, note.as_ref()),
            Err(err) => log::warn!(
                "[{}] {:?}: {} ({:?})",
                strategy,
                log_type,
                note.as_ref(),
                err
            ),
        }

        let mut entry = JournalEntry::new(result, log_type);
        entry.epoch(self.epoch).note(note);
        self.entries.push(entry);
        self
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(JournalEntry::is_error)
    }
}

impl Drop for JournalCollection {
    fn drop(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        insert_journal_collection(JournalRecord {
            epoch: self.epoch,
            strategy: self.strategy.take(),
            entries: std::mem::take(&mut self.entries),
        });
        journal_cleanup();
    }
}

/// Trims the journal to the most recent `MAX_JOURNAL_ENTRIES` collections
pub fn journal_cleanup() {
    JOURNAL.with(|journal| {
        let mut binding = journal.borrow_mut();
        let len = binding.len();
        if len > MAX_JOURNAL_ENTRIES {
            binding.drain(..len - MAX_JOURNAL_ENTRIES);
        }
    });
}

/// Serializes the journal as JSON
pub fn export_json() -> StrategyResult<String> {
    JOURNAL.with(|journal| {
        serde_json::to_string(&*journal.borrow())
            .map_err(|err| StrategyError::DecodingError(format!("{:#?}", err)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::get_journal;

    #[test]
    fn test_collection_is_committed_on_drop() {
        let strategy = Address::repeat_byte(0x01);
        {
            let mut journal = JournalCollection::open(Some(strategy), Some(7));
            journal
                .append_note(Ok(()), LogType::Info, "first")
                .append_note(Err(StrategyError::Unauthorized), LogType::Rejection, "second");
            assert!(journal.has_errors());
        }

        let collections = get_journal();
        assert_eq!(collections.len(), 1);
        assert_eq!(collections[0].strategy, Some(strategy.to_string()));
        assert_eq!(collections[0].entries.len(), 2);
        assert_eq!(collections[0].entries[1].epoch, Some(7));
        assert_eq!(collections[0].entries[1].note.as_deref(), Some("second"));
    }

    #[test]
    fn test_empty_collection_is_not_committed() {
        drop(JournalCollection::open(None, None));
        assert!(get_journal().is_empty());
    }

    #[test]
    fn test_journal_is_pruned() {
        for index in 0..MAX_JOURNAL_ENTRIES + 5 {
            JournalCollection::open(None, Some(index as u64)).append_note(
                Ok(()),
                LogType::Info,
                "tick",
            );
        }

        let collections = get_journal();
        assert_eq!(collections.len(), MAX_JOURNAL_ENTRIES);
        assert_eq!(collections[0].epoch, Some(5));
    }

    #[test]
    fn test_export_json() {
        JournalCollection::open(None, Some(1)).append_note(Ok(()), LogType::Lifecycle, "exported");
        let json = export_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["entries"][0]["note"], "exported");
        assert_eq!(value[0]["entries"][0]["log_type"], "Lifecycle");
    }
}
