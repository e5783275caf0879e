//! Section reconciliation: merges partial results into the in-memory document.
//!
//! Push frames carry one section at a time. Each entry remembers the progress
//! value of the frame that last wrote it, so a re-ordered frame with a lower
//! value cannot overwrite newer content and duplicates change nothing.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub content: String,
    pub open: bool,
    revision: i32,
    editing: bool,
}

impl Section {
    fn new(content: String, revision: i32) -> Self {
        Self {
            content,
            open: true,
            revision,
            editing: false,
        }
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }
}

/// Insertion-ordered mapping from section name to [`Section`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DocumentSections {
    entries: Vec<(String, Section)>,
}

impl DocumentSections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Section> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, section)| section)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut Section> {
        self.entries
            .iter_mut()
            .find(|(key, _)| key == name)
            .map(|(_, section)| section)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Section)> {
        self.entries
            .iter()
            .map(|(name, section)| (name.as_str(), section))
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_pending_edits(&self) -> bool {
        self.entries.iter().any(|(_, section)| section.editing)
    }

    /// Replaces or inserts a section from a push frame. Returns whether the
    /// document changed. The `open` flag of an existing entry is preserved.
    pub fn apply(&mut self, name: &str, content: &str, revision: i32) -> bool {
        match self.get_mut(name) {
            Some(section) => {
                if revision < section.revision {
                    return false;
                }
                section.revision = revision;
                if section.content == content {
                    return false;
                }
                section.content = content.to_owned();
                true
            }
            None => {
                self.entries
                    .push((name.to_owned(), Section::new(content.to_owned(), revision)));
                true
            }
        }
    }

    /// Loads an authoritative document. The wholesale replace only happens
    /// when `allow_wholesale` is set and nothing is under edit; otherwise the
    /// sections are merged key by key and sections under edit are skipped.
    pub fn load(&mut self, sections: &[(String, String)], allow_wholesale: bool) -> bool {
        if allow_wholesale && !self.has_pending_edits() {
            let next: Vec<(String, Section)> = sections
                .iter()
                .map(|(name, content)| {
                    let open = self.get(name).map_or(true, |section| section.open);
                    let mut section = Section::new(content.clone(), 0);
                    section.open = open;
                    (name.clone(), section)
                })
                .collect();
            let changed = next != self.entries;
            self.entries = next;
            return changed;
        }

        let mut changed = false;
        for (name, content) in sections {
            match self.get_mut(name) {
                Some(section) if section.editing => {}
                Some(section) => {
                    if section.content != *content {
                        section.content = content.clone();
                        changed = true;
                    }
                }
                None => {
                    self.entries
                        .push((name.clone(), Section::new(content.clone(), 0)));
                    changed = true;
                }
            }
        }
        changed
    }

    pub fn begin_edit(&mut self, name: &str) -> bool {
        match self.get_mut(name) {
            Some(section) if !section.editing => {
                section.editing = true;
                true
            }
            _ => false,
        }
    }

    /// An explicit user save always wins and ends the edit.
    pub fn save_edit(&mut self, name: &str, content: &str) -> bool {
        match self.get_mut(name) {
            Some(section) => {
                section.editing = false;
                section.content = content.to_owned();
                true
            }
            None => {
                self.entries
                    .push((name.to_owned(), Section::new(content.to_owned(), 0)));
                true
            }
        }
    }

    pub fn cancel_edit(&mut self, name: &str) -> bool {
        match self.get_mut(name) {
            Some(section) if section.editing => {
                section.editing = false;
                true
            }
            _ => false,
        }
    }

    pub fn toggle(&mut self, name: &str) -> bool {
        match self.get_mut(name) {
            Some(section) => {
                section.open = !section.open;
                true
            }
            None => false,
        }
    }
}
