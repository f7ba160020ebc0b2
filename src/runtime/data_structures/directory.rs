use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// What the directory knows about a composite word.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionEntry {
    /// Index of the word's header cell in the program store.
    pub start: usize,

    /// Text captured between `""` markers while the definition was open.
    pub doc: String,
}

impl DefinitionEntry {
    pub fn new(start: usize) -> DefinitionEntry {
        DefinitionEntry {
            start,
            doc: String::new(),
        }
    }
}

/// The composite-word directory.  Names are global, the last definition of a name wins for new
/// lookups while cells compiled earlier keep pointing at whatever index they were compiled
/// against.
///
/// Insertion order is kept for listings, redefining a name keeps its original position.
/// `dellast` goes by store position instead, the entry with the highest header is the newest.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Directory {
    words: IndexMap<String, DefinitionEntry>,
}

impl Directory {
    pub fn new() -> Directory {
        Directory {
            words: IndexMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&DefinitionEntry> {
        self.words.get(name)
    }

    /// The live start index for the name.
    pub fn start_of(&self, name: &str) -> Option<usize> {
        self.words.get(name).map(|entry| entry.start)
    }

    /// Point the name at a new header, returning the entry it replaced.
    pub fn define(&mut self, name: &str, start: usize) -> Option<DefinitionEntry> {
        self.words.insert(name.to_string(), DefinitionEntry::new(start))
    }

    /// Put a saved entry back, or remove the name if there was none.  Used to undo a cycle.
    pub fn restore(&mut self, name: &str, entry: Option<DefinitionEntry>) {
        match entry {
            Some(entry) => {
                let _ = self.words.insert(name.to_string(), entry);
            }
            None => {
                let _ = self.words.shift_remove(name);
            }
        }
    }

    /// Attach documentation to a word.  Returns false if the name is unknown.
    pub fn set_doc(&mut self, name: &str, doc: &str) -> bool {
        match self.words.get_mut(name) {
            Some(entry) => {
                entry.doc = doc.to_string();
                true
            }
            None => false,
        }
    }

    /// Forget a name.  The cells stay in the store.
    pub fn remove(&mut self, name: &str) -> Option<DefinitionEntry> {
        self.words.shift_remove(name)
    }

    /// Forget the name whose header is highest in the store, the definition compiled last.
    pub fn pop_newest(&mut self) -> Option<(String, DefinitionEntry)> {
        let index = self
            .words
            .values()
            .enumerate()
            .max_by_key(|(_, entry)| entry.start)
            .map(|(index, _)| index)?;

        self.words.shift_remove_index(index)
    }

    /// Drop every entry whose header is at or beyond the index, returning the dropped names.
    pub fn retain_below(&mut self, len: usize) -> Vec<String> {
        let dropped: Vec<String> = self
            .words
            .iter()
            .filter(|(_, entry)| entry.start >= len)
            .map(|(name, _)| name.clone())
            .collect();

        self.words.retain(|_, entry| entry.start < len);
        dropped
    }

    /// Walk the entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &DefinitionEntry)> {
        self.words.iter()
    }

    /// The name whose live entry starts at the index.
    pub fn name_at(&self, start: usize) -> Option<&str> {
        self.words
            .iter()
            .find(|(_, entry)| entry.start == start)
            .map(|(name, _)| name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redefinition_keeps_position_and_replaces_start() {
        let mut directory = Directory::new();

        let _ = directory.define("a", 0);
        let _ = directory.define("b", 3);
        let previous = directory.define("a", 7);

        assert_eq!(previous, Some(DefinitionEntry::new(0)));
        assert_eq!(directory.start_of("a"), Some(7));
        assert_eq!(
            directory.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        assert_eq!(directory.pop_newest().map(|(name, _)| name), Some("a".to_string()));
        assert_eq!(directory.pop_newest().map(|(name, _)| name), Some("b".to_string()));
    }

    #[test]
    fn restore_undoes_a_definition() {
        let mut directory = Directory::new();

        let previous = directory.define("w", 4);
        directory.restore("w", previous);

        assert!(directory.is_empty());
    }
}
