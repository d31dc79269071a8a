//! The persistent expiry table.
//!
//! Maps a key to its deadline in seconds since the epoch. The table is held
//! in memory, consulted lazily on access, and persisted to `db.expires` on
//! close as concatenated binary records:
//!
//! ```text
//! +----------+----------+-----+
//! | key_size | deadline | key |
//! +----------+----------+-----+
//! | 4 bytes  | 8 bytes  | var |
//! +----------+----------+-----+
//! ```
//!
//! Integers are big-endian. Deadlines apply to the string kind only.

use crate::error::Result;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

const EXPIRE_HEADER_SIZE: usize = 12;

/// Key to deadline mapping. A key that is absent has no expiry.
#[derive(Debug, Default)]
pub struct Expires {
    table: HashMap<Vec<u8>, u32>,
}

impl Expires {
    /// Loads the expiry table. A missing file yields an empty table; a
    /// truncated trailing record is dropped with a warning.
    pub fn load(path: &Path) -> Expires {
        let mut expires = Expires::default();
        let Ok(bytes) = std::fs::read(path) else {
            return expires;
        };

        let mut cursor = Cursor::new(bytes.as_slice());
        while (cursor.position() as usize) < bytes.len() {
            let Some((key, deadline)) = read_record(&mut cursor) else {
                tracing::warn!(path = %path.display(), "truncated expiry record, dropping tail");
                break;
            };
            expires.table.insert(key, deadline);
        }
        expires
    }

    /// Persists the expiry table, replacing any previous file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut buf = Vec::new();
        for (key, deadline) in &self.table {
            buf.write_u32::<BigEndian>(key.len() as u32)?;
            buf.write_u64::<BigEndian>(*deadline as u64)?;
            buf.extend_from_slice(key);
        }
        std::fs::write(path, buf)?;
        Ok(())
    }

    pub fn deadline(&self, key: &[u8]) -> Option<u32> {
        self.table.get(key).copied()
    }

    pub fn set(&mut self, key: Vec<u8>, deadline: u32) {
        self.table.insert(key, deadline);
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<u32> {
        self.table.remove(key)
    }

    /// Whether the key has a deadline at or before `now`.
    pub fn is_expired(&self, key: &[u8], now: u32) -> bool {
        matches!(self.table.get(key), Some(deadline) if *deadline <= now)
    }
}

fn read_record(cursor: &mut Cursor<&[u8]>) -> Option<(Vec<u8>, u32)> {
    let key_size = cursor.read_u32::<BigEndian>().ok()? as usize;
    let deadline = cursor.read_u64::<BigEndian>().ok()?;

    let start = cursor.position() as usize;
    let data = *cursor.get_ref();
    if start + key_size > data.len() {
        return None;
    }
    let key = data[start..start + key_size].to_vec();
    cursor.set_position((start + key_size) as u64);

    Some((key, deadline as u32))
}
