//! List operations.
//!
//! List records replay positionally, so a mutation is only logged when the
//! in-memory operation actually took effect: a pop that found a value, a
//! removal that dropped at least one element, an insert whose pivot exists.
//! Logging no-ops would desynchronize replay from the state it rebuilds.

use crate::error::Result;
use crate::index::list::InsertOption;
use crate::storage::entry::{Entry, EntryKind, ListMark, EXTRA_SEPARATOR};
use crate::store::KilnDb;
use crate::Error;

impl KilnDb {
    /// Prepends values to the list, returning its length afterwards.
    pub fn l_push(&self, key: &[u8], values: &[&[u8]]) -> Result<usize> {
        self.check_key_value(key, values)?;
        let mut inner = self.write_guard();
        let mut len = inner.idx.lists.llen(key);
        for value in values {
            let entry = Entry::without_extra(
                EntryKind::List(ListMark::LPush),
                key.to_vec(),
                value.to_vec(),
            );
            inner.store(&self.config, &entry)?;
            len = inner.idx.lists.lpush(key, value.to_vec());
        }
        Ok(len)
    }

    /// Appends values to the list, returning its length afterwards.
    pub fn r_push(&self, key: &[u8], values: &[&[u8]]) -> Result<usize> {
        self.check_key_value(key, values)?;
        let mut inner = self.write_guard();
        let mut len = inner.idx.lists.llen(key);
        for value in values {
            let entry = Entry::without_extra(
                EntryKind::List(ListMark::RPush),
                key.to_vec(),
                value.to_vec(),
            );
            inner.store(&self.config, &entry)?;
            len = inner.idx.lists.rpush(key, value.to_vec());
        }
        Ok(len)
    }

    /// Removes and returns the head of the list.
    pub fn l_pop(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.check_key_value(key, &[])?;
        let mut inner = self.write_guard();
        let Some(value) = inner.idx.lists.lpop(key) else {
            return Ok(None);
        };
        let entry =
            Entry::without_extra(EntryKind::List(ListMark::LPop), key.to_vec(), value.clone());
        inner.store(&self.config, &entry)?;
        Ok(Some(value))
    }

    /// Removes and returns the tail of the list.
    pub fn r_pop(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.check_key_value(key, &[])?;
        let mut inner = self.write_guard();
        let Some(value) = inner.idx.lists.rpop(key) else {
            return Ok(None);
        };
        let entry =
            Entry::without_extra(EntryKind::List(ListMark::RPop), key.to_vec(), value.clone());
        inner.store(&self.config, &entry)?;
        Ok(Some(value))
    }

    /// The value at `index`; negative indices count from the tail.
    pub fn l_index(&self, key: &[u8], index: i64) -> Option<Vec<u8>> {
        let inner = self.read_guard();
        inner.idx.lists.lindex(key, index)
    }

    /// Removes elements equal to `value` per the sign convention of `count`
    /// (head-first, tail-first, or all). Returns how many were removed.
    pub fn l_rem(&self, key: &[u8], value: &[u8], count: i64) -> Result<usize> {
        self.check_key_value(key, &[value])?;
        let mut inner = self.write_guard();
        let removed = inner.idx.lists.lrem(key, value, count);
        if removed > 0 {
            let entry = Entry::new(
                EntryKind::List(ListMark::LRem),
                key.to_vec(),
                value.to_vec(),
                count.to_string().into_bytes(),
            );
            inner.store(&self.config, &entry)?;
        }
        Ok(removed)
    }

    /// Inserts `value` before or after the first occurrence of `pivot`.
    /// Returns the new length, or -1 when the pivot is absent. The pivot is
    /// persisted in the record's extra slot and therefore must not contain
    /// the reserved separator.
    pub fn l_insert(
        &self,
        key: &[u8],
        option: InsertOption,
        pivot: &[u8],
        value: &[u8],
    ) -> Result<i64> {
        self.check_key_value(key, &[value])?;
        if pivot
            .windows(EXTRA_SEPARATOR.len())
            .any(|window| window == EXTRA_SEPARATOR)
        {
            return Err(Error::ExtraContainsSeparator);
        }

        let mut inner = self.write_guard();
        let len = inner.idx.lists.linsert(key, option, pivot, value.to_vec());
        if len != -1 {
            let mut extra = Vec::with_capacity(pivot.len() + EXTRA_SEPARATOR.len() + 1);
            extra.extend_from_slice(pivot);
            extra.extend_from_slice(EXTRA_SEPARATOR);
            extra.push(b'0' + option.code());

            let entry = Entry::new(
                EntryKind::List(ListMark::LInsert),
                key.to_vec(),
                value.to_vec(),
                extra,
            );
            inner.store(&self.config, &entry)?;
        }
        Ok(len)
    }

    /// Overwrites the element at `index`. Returns whether the index was
    /// valid.
    pub fn l_set(&self, key: &[u8], index: i64, value: &[u8]) -> Result<bool> {
        self.check_key_value(key, &[value])?;
        let mut inner = self.write_guard();
        if !inner.idx.lists.lset(key, index, value.to_vec()) {
            return Ok(false);
        }
        let entry = Entry::new(
            EntryKind::List(ListMark::LSet),
            key.to_vec(),
            value.to_vec(),
            index.to_string().into_bytes(),
        );
        inner.store(&self.config, &entry)?;
        Ok(true)
    }

    /// Trims the list to the inclusive range `[start, end]`.
    pub fn l_trim(&self, key: &[u8], start: i64, end: i64) -> Result<()> {
        self.check_key_value(key, &[])?;
        let mut inner = self.write_guard();
        if inner.idx.lists.ltrim(key, start, end) {
            let mut extra = start.to_string().into_bytes();
            extra.extend_from_slice(EXTRA_SEPARATOR);
            extra.extend_from_slice(end.to_string().as_bytes());

            let entry = Entry::new(
                EntryKind::List(ListMark::LTrim),
                key.to_vec(),
                Vec::new(),
                extra,
            );
            inner.store(&self.config, &entry)?;
        }
        Ok(())
    }

    /// The elements in the inclusive range `[start, end]`; negative offsets
    /// count from the tail.
    pub fn l_range(&self, key: &[u8], start: i64, end: i64) -> Result<Vec<Vec<u8>>> {
        self.check_key_value(key, &[])?;
        let inner = self.read_guard();
        Ok(inner.idx.lists.lrange(key, start, end))
    }

    /// The number of elements in the list.
    pub fn l_len(&self, key: &[u8]) -> usize {
        let inner = self.read_guard();
        inner.idx.lists.llen(key)
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
    fn test_push_pop() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db = create_test_db(&temp_dir);

        assert_eq!(db.l_push(b"L", &[b"b", b"a"]).unwrap(), 2);
        assert_eq!(db.r_push(b"L", &[b"c"]).unwrap(), 3);
        assert_eq!(db.l_len(b"L"), 3);

        assert_eq!(db.l_pop(b"L").unwrap(), Some(b"a".to_vec()));
        assert_eq!(db.r_pop(b"L").unwrap(), Some(b"c".to_vec()));
        assert_eq!(db.l_pop(b"empty").unwrap(), None);
    }

    #[test]
    fn test_l_insert_separator_rejected() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db = create_test_db(&temp_dir);

        db.r_push(b"L", &[b"a"]).unwrap();
        assert_eq!(
            db.l_insert(b"L", InsertOption::After, b"piv\\0ot", b"v"),
            Err(Error::ExtraContainsSeparator)
        );
        assert_eq!(
            db.l_insert(b"L", InsertOption::After, b"missing", b"v").unwrap(),
            -1
        );
        assert_eq!(
            db.l_insert(b"L", InsertOption::After, b"a", b"v").unwrap(),
            2
        );
    }

    #[test]
    fn test_list_survives_restart() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db = create_test_db(&temp_dir);

        db.r_push(b"L", &[b"a", b"b", b"c", b"d"]).unwrap();
        db.l_set(b"L", 1, b"B").unwrap();
        db.l_rem(b"L", b"c", 0).unwrap();
        db.l_pop(b"L").unwrap();

        let before = db.l_range(b"L", 0, -1).unwrap();
        assert_eq!(before, vec![b"B".to_vec(), b"d".to_vec()]);

        db.close().expect("Failed to close");
        let db = KilnDb::reopen(temp_dir.path()).expect("Failed to reopen");
        assert_eq!(db.l_range(b"L", 0, -1).unwrap(), before);
        assert_eq!(db.l_index(b"L", -1), Some(b"d".to_vec()));
    }

    #[test]
    fn test_trim_survives_restart() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db = create_test_db(&temp_dir);

        db.r_push(b"L", &[b"a", b"b", b"c", b"d", b"e"]).unwrap();
        db.l_trim(b"L", 1, 3).unwrap();
        assert_eq!(
            db.l_range(b"L", 0, -1).unwrap(),
            vec![b"b".to_vec(), b"c".to_vec(), b"d".to_vec()]
        );

        db.close().expect("Failed to close");
        let db = KilnDb::reopen(temp_dir.path()).expect("Failed to reopen");
        assert_eq!(
            db.l_range(b"L", 0, -1).unwrap(),
            vec![b"b".to_vec(), b"c".to_vec(), b"d".to_vec()]
        );
    }
}
