//! Segment files: the on-disk unit of the append-only log.
//!
//! Each data kind writes to its own chain of segment files named
//! `NNNNNNNNN.data.<suffix>` where the zero-padded id orders the chain and
//! the suffix names the kind. The file with the greatest id is the active
//! segment; all others are archived and only ever read (until compaction
//! rewrites them). Records are laid out back to back from offset 0 with no
//! padding; the next append offset is tracked in memory and persisted in
//! the database metadata on close.
//!
//! Two backends are supported. `FileIo` issues positional reads and writes
//! against the file descriptor. `Mmap` truncates the file to its capacity
//! up front and maps it read-write; reads past the written region observe
//! the zero-filled tail, which decodes as an entry with `key_size == 0`
//! and is surfaced as `EndOfFile`.

use crate::config::IoMethod;
use crate::error::Result;
use crate::storage::entry::{Entry, EntryHeader, EntryKind, DataKind, CRC32, ENTRY_HEADER_SIZE};
use crate::Error;

use memmap2::MmapMut;
use std::collections::{BTreeMap, HashMap};
use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

enum Backend {
    FileIo(File),
    Mmap(MmapMut),
}

/// One segment file, either active (appendable) or archived (read-only).
pub struct DataFile {
    pub id: u32,
    path: PathBuf,
    backend: Backend,
    /// Next append offset. Restored from the database metadata on open.
    pub offset: u64,
}

impl DataFile {
    /// Opens or creates the segment with the given id and kind under `dir`.
    pub fn new(
        dir: &Path,
        id: u32,
        method: IoMethod,
        block_size: u64,
        kind: DataKind,
    ) -> Result<Self> {
        let path = dir.join(kind.file_name(id));
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;

        let backend = match method {
            IoMethod::FileIo => Backend::FileIo(file),
            IoMethod::Mmap => {
                file.set_len(block_size)?;
                let map = unsafe { MmapMut::map_mut(&file)? };
                Backend::Mmap(map)
            }
        };

        Ok(Self {
            id,
            path,
            backend,
            offset: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the entry starting at `offset`.
    ///
    /// Returns `EndOfFile` when the header cannot be read in full or when
    /// it decodes with an empty key (the zero-tail sentinel of mmap-backed
    /// segments), and `InvalidCrc` when the stored checksum does not match
    /// the value bytes.
    pub fn read(&self, offset: u64) -> Result<Entry> {
        let buf = self.read_buf(offset, ENTRY_HEADER_SIZE as usize)?;
        let header = EntryHeader::decode(&buf)?;
        if header.key_size == 0 {
            return Err(Error::EndOfFile);
        }
        let kind = EntryKind::from_codes(header.kind_code, header.mark_code)?;

        let mut offset = offset + ENTRY_HEADER_SIZE;
        let key = self.read_buf(offset, header.key_size as usize)?;
        offset += header.key_size as u64;
        let value = self.read_buf(offset, header.value_size as usize)?;
        offset += header.value_size as u64;
        let extra = self.read_buf(offset, header.extra_size as usize)?;

        if CRC32.checksum(&value) != header.crc32 {
            return Err(Error::InvalidCrc);
        }

        Ok(Entry::new(kind, key, value, extra))
    }

    fn read_buf(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        match &self.backend {
            Backend::FileIo(file) => {
                file.read_exact_at(&mut buf, offset).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::UnexpectedEof {
                        Error::EndOfFile
                    } else {
                        e.into()
                    }
                })?;
            }
            Backend::Mmap(map) => {
                // Reads past the mapped region observe the zero-filled tail.
                let start = (offset as usize).min(map.len());
                let end = (start + len).min(map.len());
                buf[..end - start].copy_from_slice(&map[start..end]);
            }
        }
        Ok(buf)
    }

    /// Appends the entry at the current offset and advances it. Capacity is
    /// not checked here; the engine rotates before a record would overflow.
    pub fn write(&mut self, entry: &Entry) -> Result<()> {
        if entry.key.is_empty() {
            return Err(Error::EmptyEntry);
        }

        let buf = entry.encode()?;
        match &mut self.backend {
            Backend::FileIo(file) => file.write_all_at(&buf, self.offset)?,
            Backend::Mmap(map) => {
                let start = self.offset as usize;
                map[start..start + buf.len()].copy_from_slice(&buf);
            }
        }

        self.offset += entry.size();
        Ok(())
    }

    /// Forces written data down to disk.
    pub fn sync(&self) -> Result<()> {
        match &self.backend {
            Backend::FileIo(file) => file.sync_all()?,
            Backend::Mmap(map) => map.flush()?,
        }
        Ok(())
    }

    /// Moves the underlying file to a new path, keeping the open handle.
    pub fn rename(&mut self, dest: &Path) -> Result<()> {
        std::fs::rename(&self.path, dest)?;
        self.path = dest.to_path_buf();
        Ok(())
    }

    /// Closes the segment, optionally syncing first.
    pub fn close(self, sync: bool) -> Result<()> {
        if sync {
            self.sync()?;
        }
        Ok(())
    }
}

/// Scans `dir` for segment files and groups them by kind.
///
/// Returns the archived segments (id-ordered per kind, opened eagerly) and
/// the active id per kind (the greatest id found, or 0 when the kind has no
/// segments yet). The active segment itself is opened by the engine, which
/// also restores its write offset from the persisted metadata.
pub fn build(
    dir: &Path,
    method: IoMethod,
    block_size: u64,
) -> Result<(
    HashMap<DataKind, BTreeMap<u32, DataFile>>,
    HashMap<DataKind, u32>,
)> {
    let mut ids_by_kind: HashMap<DataKind, Vec<u32>> = HashMap::new();
    for dir_entry in std::fs::read_dir(dir)? {
        let name = dir_entry?.file_name();
        let name = name.to_string_lossy();
        if !name.contains(".data.") {
            continue;
        }

        let parts: Vec<&str> = name.split('.').collect();
        if parts.len() != 3 {
            continue;
        }
        let (Ok(id), Some(kind)) = (parts[0].parse::<u32>(), DataKind::from_suffix(parts[2]))
        else {
            continue;
        };
        ids_by_kind.entry(kind).or_default().push(id);
    }

    let mut archived = HashMap::new();
    let mut active_ids = HashMap::new();
    for kind in DataKind::ALL {
        let mut ids = ids_by_kind.remove(&kind).unwrap_or_default();
        ids.sort_unstable();

        let mut files = BTreeMap::new();
        let mut active_id = 0;
        if let Some((&last, rest)) = ids.split_last() {
            active_id = last;
            for &id in rest {
                files.insert(id, DataFile::new(dir, id, method, block_size, kind)?);
            }
        }
        archived.insert(kind, files);
        active_ids.insert(kind, active_id);
    }
    Ok((archived, active_ids))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::entry::StrMark;
    use std::io::{Seek, SeekFrom, Write};
    use tempfile::TempDir;

    fn create_temp_dir() -> TempDir {
        TempDir::new().expect("Failed to create temporary directory")
    }

    fn str_entry(key: &[u8], value: &[u8]) -> Entry {
        Entry::without_extra(EntryKind::Str(StrMark::Set), key.to_vec(), value.to_vec())
    }

    #[test]
    fn test_write_and_read_file_io() {
        let temp_dir = create_temp_dir();
        let mut file = DataFile::new(temp_dir.path(), 0, IoMethod::FileIo, 4096, DataKind::Str)
            .expect("Failed to create data file");

        let first = str_entry(b"key1", b"value1");
        let second = str_entry(b"key2", b"value2");
        file.write(&first).expect("Failed to write");
        file.write(&second).expect("Failed to write");
        assert_eq!(file.offset, first.size() + second.size());

        assert_eq!(file.read(0).expect("Failed to read"), first);
        assert_eq!(file.read(first.size()).expect("Failed to read"), second);
    }

    #[test]
    fn test_write_and_read_mmap() {
        let temp_dir = create_temp_dir();
        let mut file = DataFile::new(temp_dir.path(), 0, IoMethod::Mmap, 4096, DataKind::List)
            .expect("Failed to create data file");

        let entry = str_entry(b"key1", b"value1");
        file.write(&entry).expect("Failed to write");
        file.sync().expect("Failed to sync");

        assert_eq!(file.read(0).expect("Failed to read"), entry);

        // The zero-filled tail past the written region reads as end of data.
        assert_eq!(file.read(entry.size()), Err(Error::EndOfFile));
    }

    #[test]
    fn test_read_past_end() {
        let temp_dir = create_temp_dir();
        let mut file = DataFile::new(temp_dir.path(), 0, IoMethod::FileIo, 4096, DataKind::Str)
            .expect("Failed to create data file");

        let entry = str_entry(b"key1", b"value1");
        file.write(&entry).expect("Failed to write");

        assert_eq!(file.read(entry.size()), Err(Error::EndOfFile));
    }

    #[test]
    fn test_empty_entry_rejected() {
        let temp_dir = create_temp_dir();
        let mut file = DataFile::new(temp_dir.path(), 0, IoMethod::FileIo, 4096, DataKind::Str)
            .expect("Failed to create data file");

        let entry = str_entry(b"", b"value");
        assert_eq!(file.write(&entry), Err(Error::EmptyEntry));
    }

    #[test]
    fn test_corrupted_value_detected() {
        let temp_dir = create_temp_dir();
        let mut file = DataFile::new(temp_dir.path(), 0, IoMethod::FileIo, 4096, DataKind::Str)
            .expect("Failed to create data file");

        let entry = str_entry(b"key1", b"value1");
        file.write(&entry).expect("Failed to write");
        let path = file.path().to_path_buf();
        file.close(true).expect("Failed to close");

        // Flip a byte inside the value region.
        let mut raw = OpenOptions::new()
            .write(true)
            .open(&path)
            .expect("Failed to reopen");
        raw.seek(SeekFrom::Start(ENTRY_HEADER_SIZE + 4))
            .expect("Failed to seek");
        raw.write_all(b"X").expect("Failed to corrupt");
        drop(raw);

        let file = DataFile::new(temp_dir.path(), 0, IoMethod::FileIo, 4096, DataKind::Str)
            .expect("Failed to reopen data file");
        assert_eq!(file.read(0), Err(Error::InvalidCrc));
    }

    #[test]
    fn test_build_discovery() {
        let temp_dir = create_temp_dir();

        for id in 0..3 {
            let mut file =
                DataFile::new(temp_dir.path(), id, IoMethod::FileIo, 4096, DataKind::Str)
                    .expect("Failed to create data file");
            file.write(&str_entry(b"key", b"value"))
                .expect("Failed to write");
        }
        DataFile::new(temp_dir.path(), 7, IoMethod::FileIo, 4096, DataKind::Hash)
            .expect("Failed to create data file");

        // Unrelated files are ignored.
        std::fs::write(temp_dir.path().join("db.meta"), b"{}").unwrap();
        std::fs::write(temp_dir.path().join("junk.data.txt"), b"").unwrap();

        let (archived, active_ids) =
            build(temp_dir.path(), IoMethod::FileIo, 4096).expect("Failed to build");

        assert_eq!(active_ids[&DataKind::Str], 2);
        assert_eq!(
            archived[&DataKind::Str].keys().copied().collect::<Vec<_>>(),
            vec![0, 1]
        );
        assert_eq!(active_ids[&DataKind::Hash], 7);
        assert!(archived[&DataKind::Hash].is_empty());
        assert_eq!(active_ids[&DataKind::ZSet], 0);
    }
}
