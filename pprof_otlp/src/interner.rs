//! String table interning.

use crate::translate::{Result, table_index};
use indexmap::IndexSet;

/// Create-or-get mapping from strings to their string table index.
///
/// Index 0 always holds the empty string. Entries keep insertion order, so
/// the index handed out for a string is its final position in the table.
#[derive(Debug, Clone)]
pub struct StringInterner {
    strings: IndexSet<String>,
}

impl StringInterner {
    pub fn new() -> Self {
        let mut strings = IndexSet::new();
        strings.insert(String::new());
        Self { strings }
    }

    /// Return the index of `value`, appending it if it is not present yet.
    ///
    /// The empty string is always 0 and never appended.
    pub fn intern(&mut self, value: &str) -> Result<i32> {
        if value.is_empty() {
            return Ok(0);
        }
        if let Some(existing) = self.strings.get_index_of(value) {
            return table_index(existing, "string");
        }
        let index = table_index(self.strings.len(), "string")?;
        self.strings.insert(value.to_owned());
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Consume the interner, producing the string table in index order.
    pub fn into_table(self) -> Vec<String> {
        self.strings.into_iter().collect()
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}
