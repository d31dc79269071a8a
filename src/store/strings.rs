//! String operations.
//!
//! Strings are the only kind whose index can run in locator-only mode, so
//! reads here may touch disk. They are also the only kind the expiry table
//! applies to: a key whose deadline has passed is treated as absent
//! everywhere, and its record is dropped by the next compaction.

use crate::error::Result;
use crate::index::Indexer;
use crate::storage::entry::{Entry, EntryKind, StrMark, ENTRY_HEADER_SIZE};
use crate::store::{unix_now, Inner, KilnDb};
use crate::{Error, IndexMode};

impl KilnDb {
    /// Associates `value` with `key`, overwriting any previous value.
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_key_value(key, &[value])?;
        let mut inner = self.write_guard();
        self.set_locked(&mut inner, key, value)
    }

    /// Sets `key` only when it does not exist yet. Returns whether the set
    /// happened.
    pub fn set_nx(&self, key: &[u8], value: &[u8]) -> Result<bool> {
        self.check_key_value(key, &[value])?;
        let mut inner = self.write_guard();
        if inner.idx.strs.contains(key) && !inner.expires.is_expired(key, unix_now()) {
            return Ok(false);
        }
        self.set_locked(&mut inner, key, value)?;
        Ok(true)
    }

    /// Returns the value stored at `key`, failing with `KeyNotExist` when
    /// the key is absent or expired.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.check_key_value(key, &[])?;
        let inner = self.read_guard();
        self.get_locked(&inner, key)
    }

    /// Sets `key` to `value` and returns the previous value.
    ///
    /// The get and the set acquire the lock separately, so another writer
    /// may slip between them; no combined atomicity is promised.
    pub fn get_set(&self, key: &[u8], value: &[u8]) -> Result<Vec<u8>> {
        let old = self.get(key)?;
        self.set(key, value)?;
        Ok(old)
    }

    /// Appends `value` to the value stored at `key`, or behaves as `set`
    /// when the key is absent.
    pub fn append(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_key_value(key, &[value])?;
        let mut appended = match self.get(key) {
            Ok(old) => old,
            Err(Error::KeyNotExist) => Vec::new(),
            Err(err) => return Err(err),
        };
        appended.extend_from_slice(value);
        self.set(key, &appended)
    }

    /// The length in bytes of the value stored at `key`, or 0 when absent.
    pub fn str_len(&self, key: &[u8]) -> usize {
        if self.check_key_value(key, &[]).is_err() {
            return 0;
        }
        let inner = self.read_guard();
        if inner.expires.is_expired(key, unix_now()) {
            return 0;
        }
        match inner.idx.strs.get(key) {
            Some(idx) => match &idx.value {
                Some(value) => value.len(),
                None => idx.entry_size as usize - ENTRY_HEADER_SIZE as usize - key.len(),
            },
            None => 0,
        }
    }

    /// Whether `key` holds a live (non-expired) string value.
    pub fn str_exists(&self, key: &[u8]) -> bool {
        if self.check_key_value(key, &[]).is_err() {
            return false;
        }
        let inner = self.read_guard();
        inner.idx.strs.contains(key) && !inner.expires.is_expired(key, unix_now())
    }

    /// Removes `key` and its value. Removing an absent key is a no-op.
    pub fn str_rem(&self, key: &[u8]) -> Result<()> {
        self.check_key_value(key, &[])?;
        let mut inner = self.write_guard();
        if inner.idx.strs.remove(key) {
            inner.expires.remove(key);
            let entry =
                Entry::without_extra(EntryKind::Str(StrMark::Rem), key.to_vec(), Vec::new());
            inner.store(&self.config, &entry)?;
        }
        Ok(())
    }

    /// Values of the keys starting with `prefix`, in lexicographic key
    /// order. `offset` matching keys are skipped first, then up to `limit`
    /// values are returned; a negative `limit` returns them all and a zero
    /// `limit` none.
    pub fn prefix_scan(&self, prefix: &[u8], limit: i64, offset: i64) -> Result<Vec<Vec<u8>>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.check_key_value(prefix, &[])?;

        let now = unix_now();
        let mut skip = offset.max(0);
        let mut remaining = limit;
        let mut values = Vec::new();

        let inner = self.read_guard();
        for (key, idx) in inner.idx.strs.range_from(prefix) {
            if !key.starts_with(prefix) || remaining == 0 {
                break;
            }
            if inner.expires.is_expired(&key, now) {
                continue;
            }
            if skip > 0 {
                skip -= 1;
                continue;
            }
            values.push(inner.read_value(&idx)?);
            if remaining > 0 {
                remaining -= 1;
            }
        }
        Ok(values)
    }

    /// Values of the keys between `start` and `end` inclusive, in key
    /// order. The scan is anchored: it fails with `KeyNotExist` when
    /// `start` itself is not present.
    pub fn range_scan(&self, start: &[u8], end: &[u8]) -> Result<Vec<Vec<u8>>> {
        let inner = self.read_guard();
        if inner.idx.strs.get(start).is_none() {
            return Err(Error::KeyNotExist);
        }

        let now = unix_now();
        let mut values = Vec::new();
        for (key, idx) in inner.idx.strs.range_from(start) {
            if key.as_slice() > end {
                break;
            }
            if inner.expires.is_expired(&key, now) {
                continue;
            }
            values.push(inner.read_value(&idx)?);
        }
        Ok(values)
    }

    /// Sets `key` to expire `seconds` from now. Fails with `InvalidTTL` for
    /// a zero duration and `KeyNotExist` when the key is absent.
    pub fn expire(&self, key: &[u8], seconds: u32) -> Result<()> {
        if seconds == 0 {
            return Err(Error::InvalidTTL);
        }
        let mut inner = self.write_guard();
        let now = unix_now();
        if !inner.idx.strs.contains(key) || inner.expires.is_expired(key, now) {
            return Err(Error::KeyNotExist);
        }
        inner.expires.set(key.to_vec(), now + seconds);
        Ok(())
    }

    /// Clears any expiry deadline on `key`.
    pub fn persist(&self, key: &[u8]) {
        let mut inner = self.write_guard();
        inner.expires.remove(key);
    }

    /// Seconds until `key` expires; 0 when no deadline is set or the key
    /// already expired.
    pub fn ttl(&self, key: &[u8]) -> u32 {
        let inner = self.read_guard();
        let now = unix_now();
        match inner.expires.deadline(key) {
            Some(deadline) if deadline > now => deadline - now,
            _ => 0,
        }
    }

    pub(crate) fn set_locked(&self, inner: &mut Inner, key: &[u8], value: &[u8]) -> Result<()> {
        let entry =
            Entry::without_extra(EntryKind::Str(StrMark::Set), key.to_vec(), value.to_vec());
        let (file_id, offset) = inner.store(&self.config, &entry)?;

        let idx = Indexer {
            file_id,
            entry_size: entry.size() as u32,
            offset,
            value: (self.config.idx_mode == IndexMode::KeyValueRam).then(|| value.to_vec()),
        };
        inner.idx.strs.put(key.to_vec(), idx);
        Ok(())
    }

    pub(crate) fn get_locked(&self, inner: &Inner, key: &[u8]) -> Result<Vec<u8>> {
        if inner.expires.is_expired(key, unix_now()) {
            return Err(Error::KeyNotExist);
        }
        let idx = inner.idx.strs.get(key).ok_or(Error::KeyNotExist)?;
        inner.read_value(&idx)
    }
}
