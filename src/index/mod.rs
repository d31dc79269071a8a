//! In-memory indexes, one family per data kind.
//!
//! The string index maps keys to record locators in an ordered skip list so
//! prefix and range scans walk keys in lexicographic order. The remaining
//! four kinds hold their values fully in memory and are rebuilt from the
//! log on startup.

pub mod hash;
pub mod list;
pub mod set;
pub mod zset;

pub use hash::HashIndex;
pub use list::{InsertOption, ListIndex};
pub use set::SetIndex;
pub use zset::ZSetIndex;

use crossbeam_skiplist::SkipMap;
use std::ops::Bound;

/// Locator for a string record: enough to read the value back from its
/// segment, plus the value itself when the index runs in key-value mode.
#[derive(Clone, Debug, PartialEq)]
pub struct Indexer {
    pub file_id: u32,
    pub entry_size: u32,
    pub offset: u64,
    /// Present only in `KeyValueRam` mode.
    pub value: Option<Vec<u8>>,
}

/// The ordered string index.
pub struct StrIndex {
    map: SkipMap<Vec<u8>, Indexer>,
}

impl Default for StrIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl StrIndex {
    pub fn new() -> Self {
        Self {
            map: SkipMap::new(),
        }
    }

    pub fn put(&self, key: Vec<u8>, idx: Indexer) {
        self.map.insert(key, idx);
    }

    pub fn get(&self, key: &[u8]) -> Option<Indexer> {
        self.map.get(key).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, key: &[u8]) -> bool {
        self.map.remove(key).is_some()
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Repoints a key's locator after its record moved during compaction.
    pub fn relocate(&self, key: &[u8], file_id: u32, offset: u64) {
        if let Some(entry) = self.map.get(key) {
            let mut idx = entry.value().clone();
            idx.file_id = file_id;
            idx.offset = offset;
            self.map.insert(entry.key().clone(), idx);
        }
    }

    /// Walks keys in lexicographic order starting at the first key >= `start`.
    pub fn range_from<'a>(
        &'a self,
        start: &'a [u8],
    ) -> impl Iterator<Item = (Vec<u8>, Indexer)> + 'a {
        self.map
            .range::<[u8], _>((Bound::Included(start), Bound::Unbounded))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locator(file_id: u32, offset: u64) -> Indexer {
        Indexer {
            file_id,
            entry_size: 32,
            offset,
            value: None,
        }
    }

    #[test]
    fn test_put_get_remove() {
        let index = StrIndex::new();
        index.put(b"alpha".to_vec(), locator(0, 0));
        index.put(b"beta".to_vec(), locator(0, 32));

        assert_eq!(index.get(b"alpha"), Some(locator(0, 0)));
        assert!(index.contains(b"beta"));
        assert_eq!(index.get(b"gamma"), None);

        // Overwrites replace the locator.
        index.put(b"alpha".to_vec(), locator(1, 64));
        assert_eq!(index.get(b"alpha"), Some(locator(1, 64)));

        assert!(index.remove(b"alpha"));
        assert!(!index.remove(b"alpha"));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_range_is_ordered() {
        let index = StrIndex::new();
        for key in [b"cherry".as_slice(), b"apple", b"banana", b"apricot"] {
            index.put(key.to_vec(), locator(0, 0));
        }

        let keys: Vec<Vec<u8>> = index.range_from(b"ap").map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![
                b"apple".to_vec(),
                b"apricot".to_vec(),
                b"banana".to_vec(),
                b"cherry".to_vec()
            ]
        );
    }

    #[test]
    fn test_relocate() {
        let index = StrIndex::new();
        index.put(
            b"key".to_vec(),
            Indexer {
                file_id: 3,
                entry_size: 40,
                offset: 120,
                value: Some(b"v".to_vec()),
            },
        );

        index.relocate(b"key", 0, 16);
        let idx = index.get(b"key").unwrap();
        assert_eq!(idx.file_id, 0);
        assert_eq!(idx.offset, 16);
        assert_eq!(idx.entry_size, 40);
        assert_eq!(idx.value, Some(b"v".to_vec()));
    }
}
