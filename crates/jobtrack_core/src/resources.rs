use crate::{IngestScope, ResourceState, ResourceStatus};

/// Per-reference ingest states of the selected target, in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResourceBook {
    entries: Vec<ResourceState>,
    /// Set once a snapshot delivered the authoritative reference list.
    known: bool,
}

impl ResourceBook {
    pub fn get(&self, id: &str) -> Option<&ResourceState> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceState> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the entries came from a snapshot rather than from push frames alone.
    pub fn is_known(&self) -> bool {
        self.known
    }

    pub fn has_pending(&self) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.status == ResourceStatus::Pending)
    }

    /// Applies a pushed status. A terminal status is never replaced by a
    /// non-terminal one from the push side.
    pub fn apply_push(&mut self, update: &ResourceState) -> bool {
        match self.entries.iter_mut().find(|entry| entry.id == update.id) {
            Some(entry) => {
                if entry.status.is_terminal() && !update.status.is_terminal() {
                    return false;
                }
                if entry == update {
                    return false;
                }
                *entry = update.clone();
                true
            }
            None => {
                self.entries.push(update.clone());
                true
            }
        }
    }

    /// Authoritative replace from a snapshot.
    pub fn replace_all(&mut self, references: &[ResourceState]) -> bool {
        self.known = true;
        if self.entries == references {
            return false;
        }
        self.entries = references.to_vec();
        true
    }

    pub(crate) fn reset(&mut self, id: &str) {
        if let Some(entry) = self.entries.iter_mut().find(|entry| entry.id == id) {
            entry.status = ResourceStatus::Pending;
            entry.status_message.clear();
        }
    }

    /// Whether every reference in scope has reached a terminal status.
    /// A list built only from push frames is never settled.
    pub fn is_settled(&self, scope: &IngestScope) -> bool {
        self.known && settled(&self.entries, scope)
    }

    /// Share of references in scope that reached a terminal status, 0..=100.
    pub fn percent_settled(&self, scope: &IngestScope) -> i32 {
        let in_scope: Vec<&ResourceState> = match scope {
            IngestScope::All => self.entries.iter().collect(),
            IngestScope::Single(id) => self.entries.iter().filter(|e| &e.id == id).collect(),
        };
        if in_scope.is_empty() {
            return 0;
        }
        let done = in_scope.iter().filter(|e| e.status.is_terminal()).count();
        (done * 100 / in_scope.len()) as i32
    }
}

/// Non-empty and nothing left pending or processing.
pub(crate) fn settled(references: &[ResourceState], scope: &IngestScope) -> bool {
    match scope {
        IngestScope::All => {
            !references.is_empty() && references.iter().all(|r| r.status.is_terminal())
        }
        IngestScope::Single(id) => references
            .iter()
            .any(|r| &r.id == id && r.status.is_terminal()),
    }
}
