//! Log entry definition and codec.
//!
//! Every mutation is persisted as one self-describing entry:
//!
//! ```text
//! +--------+----------+------------+------------+------+------+-----+-------+-------+
//! | crc32  | key_size | value_size | extra_size | type | mark | key | value | extra |
//! +--------+----------+------------+------------+------+------+-----+-------+-------+
//! | 4 bytes| 4 bytes  | 4 bytes    | 4 bytes    | 2 B  | 2 B  | var | var   | var   |
//! +--------+----------+------------+------------+------+------+-----+-------+-------+
//! ```
//!
//! - All multi-byte integers use big-endian encoding for portability.
//! - The CRC-32 (IEEE) checksum covers the value bytes only, not the key,
//!   extra, or header. Recovery and compaction depend on this exact scope.
//! - A valid entry always has a non-empty key; an all-zero header therefore
//!   doubles as the end-of-data sentinel in pre-sized (mmap) segments.

use crate::error::Result;
use crate::{errdata, Error};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use crc::{Crc, CRC_32_ISO_HDLC};
use std::io::Cursor;

pub const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Fixed header size: crc32 + three u32 lengths + type + mark.
pub const ENTRY_HEADER_SIZE: u64 = 20;

/// Separator between fields packed into an entry's extra slot. This is the
/// two-byte literal `\0` (backslash, zero), so user-supplied fields that
/// land next to a separator must not contain it.
pub const EXTRA_SEPARATOR: &[u8] = b"\\0";

/// The data kind an entry belongs to. Each kind has its own segment files
/// and its own in-memory index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataKind {
    Str,
    List,
    Hash,
    Set,
    ZSet,
}

impl DataKind {
    pub const ALL: [DataKind; 5] = [
        DataKind::Str,
        DataKind::List,
        DataKind::Hash,
        DataKind::Set,
        DataKind::ZSet,
    ];

    /// The on-disk type tag.
    pub fn code(self) -> u16 {
        match self {
            DataKind::Str => 0,
            DataKind::List => 1,
            DataKind::Hash => 2,
            DataKind::Set => 3,
            DataKind::ZSet => 4,
        }
    }

    /// The segment filename suffix for this kind.
    pub fn suffix(self) -> &'static str {
        match self {
            DataKind::Str => "str",
            DataKind::List => "list",
            DataKind::Hash => "hash",
            DataKind::Set => "set",
            DataKind::ZSet => "zset",
        }
    }

    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.suffix() == suffix)
    }

    /// Canonical segment filename for the given id, e.g. `000000007.data.str`.
    pub fn file_name(self, id: u32) -> String {
        format!("{:09}.data.{}", id, self.suffix())
    }
}

/// String operation marks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrMark {
    Set,
    Rem,
}

/// List operation marks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListMark {
    LPush,
    RPush,
    LPop,
    RPop,
    LRem,
    LInsert,
    LSet,
    LTrim,
}

/// Hash operation marks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashMark {
    HSet,
    HDel,
}

/// Set operation marks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetMark {
    SAdd,
    SRem,
    SMove,
}

/// Sorted set operation marks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZSetMark {
    ZAdd,
    ZRem,
}

/// The typed (type, mark) tag of an entry. Each variant carries exactly the
/// mark space of its kind, so dispatch over a decoded entry is exhaustive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Str(StrMark),
    List(ListMark),
    Hash(HashMark),
    Set(SetMark),
    ZSet(ZSetMark),
}

impl EntryKind {
    pub fn kind(self) -> DataKind {
        match self {
            EntryKind::Str(_) => DataKind::Str,
            EntryKind::List(_) => DataKind::List,
            EntryKind::Hash(_) => DataKind::Hash,
            EntryKind::Set(_) => DataKind::Set,
            EntryKind::ZSet(_) => DataKind::ZSet,
        }
    }

    /// The on-disk (type, mark) tag pair.
    pub fn codes(self) -> (u16, u16) {
        let mark = match self {
            EntryKind::Str(m) => m as u16,
            EntryKind::List(m) => m as u16,
            EntryKind::Hash(m) => m as u16,
            EntryKind::Set(m) => m as u16,
            EntryKind::ZSet(m) => m as u16,
        };
        (self.kind().code(), mark)
    }

    pub fn from_codes(kind: u16, mark: u16) -> Result<Self> {
        let entry_kind = match (kind, mark) {
            (0, 0) => EntryKind::Str(StrMark::Set),
            (0, 1) => EntryKind::Str(StrMark::Rem),
            (1, 0) => EntryKind::List(ListMark::LPush),
            (1, 1) => EntryKind::List(ListMark::RPush),
            (1, 2) => EntryKind::List(ListMark::LPop),
            (1, 3) => EntryKind::List(ListMark::RPop),
            (1, 4) => EntryKind::List(ListMark::LRem),
            (1, 5) => EntryKind::List(ListMark::LInsert),
            (1, 6) => EntryKind::List(ListMark::LSet),
            (1, 7) => EntryKind::List(ListMark::LTrim),
            (2, 0) => EntryKind::Hash(HashMark::HSet),
            (2, 1) => EntryKind::Hash(HashMark::HDel),
            (3, 0) => EntryKind::Set(SetMark::SAdd),
            (3, 1) => EntryKind::Set(SetMark::SRem),
            (3, 2) => EntryKind::Set(SetMark::SMove),
            (4, 0) => EntryKind::ZSet(ZSetMark::ZAdd),
            (4, 1) => EntryKind::ZSet(ZSetMark::ZRem),
            (t, m) => return errdata!("unknown entry tag: type={t} mark={m}"),
        };
        Ok(entry_kind)
    }
}

/// A single log entry: the atomic unit of persistence.
#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    pub kind: EntryKind,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    /// Operation-specific side data, e.g. a hash field, an LInsert pivot, a
    /// destination set name, or a zset score as decimal text.
    pub extra: Vec<u8>,
}

impl Entry {
    pub fn new(kind: EntryKind, key: Vec<u8>, value: Vec<u8>, extra: Vec<u8>) -> Self {
        Self {
            kind,
            key,
            value,
            extra,
        }
    }

    pub fn without_extra(kind: EntryKind, key: Vec<u8>, value: Vec<u8>) -> Self {
        Self::new(kind, key, value, Vec::new())
    }

    /// Total on-disk size of this entry, header included.
    pub fn size(&self) -> u64 {
        ENTRY_HEADER_SIZE + (self.key.len() + self.value.len() + self.extra.len()) as u64
    }

    /// Encodes the entry into its on-disk representation.
    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.key.is_empty() {
            return Err(Error::InvalidEntry);
        }

        let mut buf = Vec::with_capacity(self.size() as usize);
        let (kind, mark) = self.kind.codes();

        buf.write_u32::<BigEndian>(CRC32.checksum(&self.value))?;
        buf.write_u32::<BigEndian>(self.key.len() as u32)?;
        buf.write_u32::<BigEndian>(self.value.len() as u32)?;
        buf.write_u32::<BigEndian>(self.extra.len() as u32)?;
        buf.write_u16::<BigEndian>(kind)?;
        buf.write_u16::<BigEndian>(mark)?;
        buf.extend_from_slice(&self.key);
        buf.extend_from_slice(&self.value);
        buf.extend_from_slice(&self.extra);

        Ok(buf)
    }
}

/// A decoded entry header. Payload slices are read separately by the segment
/// file, which verifies the checksum once the value bytes are in hand.
#[derive(Debug)]
pub struct EntryHeader {
    pub crc32: u32,
    pub key_size: u32,
    pub value_size: u32,
    pub extra_size: u32,
    pub kind_code: u16,
    pub mark_code: u16,
}

impl EntryHeader {
    /// Decodes the fixed-size header. Checksum validation is deferred until
    /// the payload has been read.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(buf);
        Ok(Self {
            crc32: cursor.read_u32::<BigEndian>()?,
            key_size: cursor.read_u32::<BigEndian>()?,
            value_size: cursor.read_u32::<BigEndian>()?,
            extra_size: cursor.read_u32::<BigEndian>()?,
            kind_code: cursor.read_u16::<BigEndian>()?,
            mark_code: cursor.read_u16::<BigEndian>()?,
        })
    }

    pub fn size(&self) -> u64 {
        ENTRY_HEADER_SIZE + (self.key_size + self.value_size + self.extra_size) as u64
    }
}

/// Splits an extra slot on the reserved separator.
pub fn split_extra(extra: &[u8]) -> Vec<&[u8]> {
    let mut parts = Vec::new();
    let mut rest = extra;
    while let Some(pos) = rest
        .windows(EXTRA_SEPARATOR.len())
        .position(|w| w == EXTRA_SEPARATOR)
    {
        parts.push(&rest[..pos]);
        rest = &rest[pos + EXTRA_SEPARATOR.len()..];
    }
    parts.push(rest);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_round_trip() {
        let entry = Entry::new(
            EntryKind::Hash(HashMark::HSet),
            b"user:1".to_vec(),
            b"alice".to_vec(),
            b"name".to_vec(),
        );

        let buf = entry.encode().expect("Failed to encode");
        assert_eq!(buf.len() as u64, entry.size());

        let header = EntryHeader::decode(&buf).expect("Failed to decode header");
        assert_eq!(header.key_size, 6);
        assert_eq!(header.value_size, 5);
        assert_eq!(header.extra_size, 4);
        assert_eq!(header.kind_code, 2);
        assert_eq!(header.mark_code, 0);
        assert_eq!(header.size(), entry.size());

        let kind = EntryKind::from_codes(header.kind_code, header.mark_code)
            .expect("Failed to resolve entry kind");
        assert_eq!(kind, entry.kind);

        let payload = &buf[ENTRY_HEADER_SIZE as usize..];
        assert_eq!(&payload[..6], b"user:1");
        assert_eq!(&payload[6..11], b"alice");
        assert_eq!(&payload[11..], b"name");
        assert_eq!(header.crc32, CRC32.checksum(b"alice"));
    }

    #[test]
    fn test_crc_covers_value_only() {
        let a = Entry::without_extra(
            EntryKind::Str(StrMark::Set),
            b"k1".to_vec(),
            b"same".to_vec(),
        );
        let b = Entry::without_extra(
            EntryKind::Str(StrMark::Set),
            b"k2".to_vec(),
            b"same".to_vec(),
        );

        let crc_a = EntryHeader::decode(&a.encode().unwrap()).unwrap().crc32;
        let crc_b = EntryHeader::decode(&b.encode().unwrap()).unwrap().crc32;
        assert_eq!(crc_a, crc_b, "CRC must not depend on the key");
    }

    #[test]
    fn test_encode_empty_key() {
        let entry = Entry::without_extra(
            EntryKind::Str(StrMark::Set),
            Vec::new(),
            b"value".to_vec(),
        );
        assert_eq!(entry.encode(), Err(Error::InvalidEntry));
    }

    #[test]
    fn test_unknown_tag() {
        assert!(EntryKind::from_codes(5, 0).is_err());
        assert!(EntryKind::from_codes(0, 2).is_err());
        assert!(EntryKind::from_codes(1, 8).is_err());
    }

    #[test]
    fn test_split_extra() {
        let mut extra = Vec::new();
        extra.extend_from_slice(b"pivot");
        extra.extend_from_slice(EXTRA_SEPARATOR);
        extra.extend_from_slice(b"1");

        let parts = split_extra(&extra);
        assert_eq!(parts, vec![b"pivot".as_slice(), b"1".as_slice()]);

        assert_eq!(split_extra(b"42"), vec![b"42".as_slice()]);
    }
}
