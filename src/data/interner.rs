//! Shared storage for tag strings.
//!
//! OSM files repeat the same few thousand keys and values millions of times
//! (`highway`, `yes`, `residential`...). Each distinct text is allocated once
//! and handed out as an `Arc<str>`.

use std::{collections::BTreeSet, sync::Arc};

/// Deduplicating string table.
///
/// Owned by an [`OsmStore`](crate::OsmStore); move it between stores with
/// [`OsmStore::with_interner`](crate::OsmStore::with_interner) and
/// [`OsmStore::into_interner`](crate::OsmStore::into_interner) to share
/// strings across loads. Entries are never removed.
#[derive(Debug, Default, Clone)]
pub struct Interner {
    strings: BTreeSet<Arc<str>>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored copy of `text`, adding it on first sight.
    pub fn intern(&mut self, text: &str) -> Arc<str> {
        if let Some(existing) = self.strings.get(text) {
            return Arc::clone(existing);
        }
        let stored: Arc<str> = Arc::from(text);
        self.strings.insert(Arc::clone(&stored));
        stored
    }

    pub fn get(&self, text: &str) -> Option<&Arc<str>> {
        self.strings.get(text)
    }

    /// Number of distinct strings.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn interner() -> Interner {
        Interner::new()
    }

    #[rstest]
    fn same_text_yields_same_allocation(mut interner: Interner) {
        let first = interner.intern("highway");
        let second = interner.intern(&String::from("highway"));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(interner.len(), 1);
    }

    #[rstest]
    fn one_entry_per_distinct_text(mut interner: Interner) {
        let words = ["yes", "no", "yes", "residential", "no", "yes", ""];
        for word in words {
            interner.intern(word);
        }
        assert_eq!(interner.len(), 4);
        assert!(interner.get("residential").is_some());
        assert!(interner.get("primary").is_none());
    }

    #[rstest]
    fn comparison_is_bytewise(mut interner: Interner) {
        let upper = interner.intern("Yes");
        let lower = interner.intern("yes");
        assert!(!Arc::ptr_eq(&upper, &lower));
        assert_eq!(interner.len(), 2);
    }
}
