//! Hash operations. The field travels in the record's extra slot.

use crate::error::Result;
use crate::storage::entry::{Entry, EntryKind, HashMark};
use crate::store::KilnDb;

impl KilnDb {
    /// Sets `field` to `value` in the hash at `key`. Returns whether the
    /// field was newly created.
    pub fn h_set(&self, key: &[u8], field: &[u8], value: &[u8]) -> Result<bool> {
        self.check_key_value(key, &[value])?;
        let mut inner = self.write_guard();

        let entry = Entry::new(
            EntryKind::Hash(HashMark::HSet),
            key.to_vec(),
            value.to_vec(),
            field.to_vec(),
        );
        inner.store(&self.config, &entry)?;
        Ok(inner.idx.hashes.hset(key, field, value.to_vec()))
    }

    /// Sets `field` only when it is absent. Returns whether the set
    /// happened.
    pub fn h_set_nx(&self, key: &[u8], field: &[u8], value: &[u8]) -> Result<bool> {
        self.check_key_value(key, &[value])?;
        let mut inner = self.write_guard();
        if inner.idx.hashes.hexists(key, field) {
            return Ok(false);
        }

        let entry = Entry::new(
            EntryKind::Hash(HashMark::HSet),
            key.to_vec(),
            value.to_vec(),
            field.to_vec(),
        );
        inner.store(&self.config, &entry)?;
        inner.idx.hashes.hset(key, field, value.to_vec());
        Ok(true)
    }

    pub fn h_get(&self, key: &[u8], field: &[u8]) -> Option<Vec<u8>> {
        let inner = self.read_guard();
        inner.idx.hashes.hget(key, field)
    }

    /// All field/value pairs of the hash at `key`.
    pub fn h_get_all(&self, key: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        let inner = self.read_guard();
        inner.idx.hashes.hgetall(key)
    }

    /// Deletes `field` from the hash. Returns whether it existed.
    pub fn h_del(&self, key: &[u8], field: &[u8]) -> Result<bool> {
        self.check_key_value(key, &[])?;
        let mut inner = self.write_guard();
        if !inner.idx.hashes.hdel(key, field) {
            return Ok(false);
        }

        let entry = Entry::new(
            EntryKind::Hash(HashMark::HDel),
            key.to_vec(),
            Vec::new(),
            field.to_vec(),
        );
        inner.store(&self.config, &entry)?;
        Ok(true)
    }

    pub fn h_exists(&self, key: &[u8], field: &[u8]) -> bool {
        let inner = self.read_guard();
        inner.idx.hashes.hexists(key, field)
    }

    pub fn h_len(&self, key: &[u8]) -> usize {
        let inner = self.read_guard();
        inner.idx.hashes.hlen(key)
    }

    pub fn h_keys(&self, key: &[u8]) -> Vec<Vec<u8>> {
        let inner = self.read_guard();
        inner.idx.hashes.hkeys(key)
    }

    pub fn h_vals(&self, key: &[u8]) -> Vec<Vec<u8>> {
        let inner = self.read_guard();
        inner.idx.hashes.hvals(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;
    use tempfile::TempDir;

    fn create_test_db(temp_dir: &TempDir) -> KilnDb {
        KilnDb::open(Config::new(temp_dir.path())).expect("Failed to open database")
    }

    #[test]
    fn test_set_get_del() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db = create_test_db(&temp_dir);

        assert!(db.h_set(b"H", b"f", b"1").unwrap());
        assert!(!db.h_set(b"H", b"f", b"2").unwrap());
        assert_eq!(db.h_get(b"H", b"f"), Some(b"2".to_vec()));

        assert!(db.h_del(b"H", b"f").unwrap());
        assert!(!db.h_del(b"H", b"f").unwrap());
        assert_eq!(db.h_get(b"H", b"f"), None);
    }

    #[test]
    fn test_h_set_nx() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db = create_test_db(&temp_dir);

        assert!(db.h_set_nx(b"H", b"f", b"first").unwrap());
        assert!(!db.h_set_nx(b"H", b"f", b"second").unwrap());
        assert_eq!(db.h_get(b"H", b"f"), Some(b"first".to_vec()));
    }

    #[test]
    fn test_introspection() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db = create_test_db(&temp_dir);

        db.h_set(b"H", b"a", b"1").unwrap();
        db.h_set(b"H", b"b", b"2").unwrap();

        assert!(db.h_exists(b"H", b"a"));
        assert!(!db.h_exists(b"H", b"z"));
        assert_eq!(db.h_len(b"H"), 2);

        let mut keys = db.h_keys(b"H");
        keys.sort();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec()]);

        let mut all = db.h_get_all(b"H");
        all.sort();
        assert_eq!(
            all,
            vec![(b"a".to_vec(), b"1".to_vec()), (b"b".to_vec(), b"2".to_vec())]
        );
    }

    #[test]
    fn test_overwrite_then_delete_survives_restart() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db = create_test_db(&temp_dir);

        db.h_set(b"H", b"f", b"1").unwrap();
        db.h_set(b"H", b"f", b"2").unwrap();
        db.h_del(b"H", b"f").unwrap();
        assert_eq!(db.h_get(b"H", b"f"), None);

        db.close().expect("Failed to close");
        let db = KilnDb::reopen(temp_dir.path()).expect("Failed to reopen");
        assert_eq!(db.h_get(b"H", b"f"), None);
        assert_eq!(db.h_len(b"H"), 0);
    }
}
