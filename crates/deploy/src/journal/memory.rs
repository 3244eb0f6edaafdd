use std::collections::BTreeMap;

use super::{Journal, JournalEntry};
use crate::{ActionId, Result};

/// Journal kept in process memory. Used for dry runs and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryJournal {
    entries: BTreeMap<ActionId, JournalEntry>,
}

impl InMemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Journal for InMemoryJournal {
    fn get(&self, action: &ActionId) -> Option<JournalEntry> {
        self.entries.get(action).cloned()
    }

    fn put(&mut self, entry: JournalEntry) -> Result<()> {
        self.entries.insert(entry.action.clone(), entry);
        Ok(())
    }

    fn all(&self) -> Vec<JournalEntry> {
        self.entries.values().cloned().collect()
    }

    fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }
}
