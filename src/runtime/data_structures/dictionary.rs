use crate::lang::source_buffer::SourceLocation;
use std::{
    collections::HashMap,
    fmt::{self, Display, Formatter},
};

/// The information stored in the primitive dictionary for each native word.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct WordInfo {
    /// The location in the Rust source where the word was registered.
    pub location: SourceLocation,

    /// The name of the word.
    pub name: String,

    /// A simple description of the word.
    pub description: String,

    /// The stack signature of the word.
    pub signature: String,

    /// The index of the actual handler for the word in the interpreter's handler list.
    pub handler_index: usize,
}

impl WordInfo {
    /// Create a new WordInfo with default values.
    pub fn new(location: SourceLocation) -> WordInfo {
        WordInfo {
            location,
            name: String::new(),
            description: String::new(),
            signature: String::new(),
            handler_index: 0,
        }
    }
}

/// The primitive dictionary.  Filled once at start up by the `register_*` functions and read-only
/// afterwards.  Composite words live in the separate definition directory.
#[derive(Default)]
pub struct Dictionary {
    words: HashMap<String, WordInfo>,

    /// Names in registration order, for listings.
    order: Vec<String>,
}

impl Dictionary {
    pub fn new() -> Dictionary {
        Dictionary {
            words: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Insert a word.  Registering a name twice replaces the earlier word.
    pub fn insert(&mut self, name: String, info: WordInfo) {
        if self.words.insert(name.clone(), info).is_none() {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<&WordInfo> {
        self.words.get(name)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Words in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &WordInfo> {
        self.order.iter().filter_map(|name| self.words.get(name))
    }
}

/// Pretty print the dictionary the way `pkern` shows it, one word per line.
impl Display for Dictionary {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let max = self.order.iter().map(|name| name.len()).max().unwrap_or(0);

        for info in self.iter() {
            writeln!(
                f,
                "  {:width$}  ( {} ) {}",
                info.name,
                info.signature,
                info.description,
                width = max
            )?;
        }

        write!(f, "\n  Primitive words: {}", self.len())
    }
}
