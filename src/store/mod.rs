//! The database engine.
//!
//! `KilnDb` orchestrates the write path (append to the active segment,
//! rotating when full, then mutate the matching in-memory index), the read
//! path (index lookup, then at most one positional segment read), recovery
//! (replaying every segment in id order to rebuild the indexes), and
//! compaction (rewriting live records from archived segments into fresh
//! ones).
//!
//! Concurrency follows a single engine-wide reader/writer lock: mutating
//! operations hold the write lock for their whole append-then-index
//! sequence, readers hold the read lock across the index access and any
//! segment read. All disk IO happens under the lock, so writers are
//! serialized across every data kind. `reclaim` holds the write lock for
//! its full duration and blocks all other work until it finishes.

pub mod hashes;
pub mod lists;
pub mod sets;
pub mod strings;
pub mod zsets;

use crate::config::{Config, IndexMode};
use crate::error::Result;
use crate::flock::FileLock;
use crate::index::{HashIndex, Indexer, ListIndex, SetIndex, StrIndex, ZSetIndex};
use crate::index::list::InsertOption;
use crate::storage::entry::{
    split_extra, DataKind, Entry, EntryKind, HashMark, ListMark, SetMark, StrMark, ZSetMark,
};
use crate::storage::{self, DataFile, Expires, Meta};
use crate::Error;

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{SystemTime, UNIX_EPOCH};

const CONFIG_FILE: &str = "db.cfg";
const META_FILE: &str = "db.meta";
const EXPIRES_FILE: &str = "db.expires";
const LOCK_FILE: &str = "db.lock";
const RECLAIM_DIR: &str = "kilndb_reclaim";

/// An embedded multi-structure key-value store.
///
/// The handle is safe to share across threads; every operation takes `&self`
/// and coordinates through the internal lock. Multiple instances may coexist
/// as long as they use distinct data directories.
pub struct KilnDb {
    config: Config,
    lock: FileLock,
    inner: RwLock<Inner>,
}

impl std::fmt::Debug for KilnDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KilnDb").finish_non_exhaustive()
    }
}

/// Point-in-time engine counters for monitoring and debugging.
#[derive(Debug, Clone)]
pub struct Stats {
    /// Number of live keys in the string index.
    pub string_keys: usize,
    /// Archived segment count per data kind.
    pub archived_segments: HashMap<DataKind, usize>,
    /// Id of the active segment per data kind.
    pub active_segment_ids: HashMap<DataKind, u32>,
}

pub(crate) struct Inner {
    pub(crate) files: FileSet,
    pub(crate) idx: IndexSet,
    pub(crate) expires: Expires,
    pub(crate) meta: Meta,
}

/// The segment files of every data kind: one active (appendable) file per
/// kind plus its id-ordered archived predecessors.
pub(crate) struct FileSet {
    pub(crate) active: HashMap<DataKind, DataFile>,
    pub(crate) active_ids: HashMap<DataKind, u32>,
    pub(crate) archived: HashMap<DataKind, BTreeMap<u32, DataFile>>,
}

/// The five in-memory index families.
#[derive(Default)]
pub(crate) struct IndexSet {
    pub(crate) strs: StrIndex,
    pub(crate) lists: ListIndex,
    pub(crate) hashes: HashIndex,
    pub(crate) sets: SetIndex,
    pub(crate) zsets: ZSetIndex,
}

impl KilnDb {
    /// Opens (or creates) a database in the configured directory and
    /// rebuilds the in-memory indexes from the segment files.
    pub fn open(config: Config) -> Result<KilnDb> {
        fs::create_dir_all(&config.dir_path)?;

        // One engine per directory; a second open fails until this one
        // closes.
        let lock = FileLock::lock(config.dir_path.join(LOCK_FILE))?;

        let (archived, active_ids) =
            storage::build(&config.dir_path, config.rw_method, config.block_size)?;

        let mut active = HashMap::new();
        for kind in DataKind::ALL {
            let file = DataFile::new(
                &config.dir_path,
                active_ids[&kind],
                config.rw_method,
                config.block_size,
                kind,
            )?;
            active.insert(kind, file);
        }

        let expires = Expires::load(&config.dir_path.join(EXPIRES_FILE));
        let meta = Meta::load(&config.dir_path.join(META_FILE));

        let mut inner = Inner {
            files: FileSet {
                active,
                active_ids,
                archived,
            },
            idx: IndexSet::default(),
            expires,
            meta,
        };

        for kind in DataKind::ALL {
            let offset = inner.meta.write_off(kind);
            inner.files.active.get_mut(&kind).unwrap().offset = offset;
        }

        inner.load_indexes(&config)?;
        tracing::info!(dir = %config.dir_path.display(), "opened database");

        Ok(KilnDb {
            config,
            lock,
            inner: RwLock::new(inner),
        })
    }

    /// Reopens a database from the config snapshot saved by a prior close.
    pub fn reopen(dir: impl AsRef<Path>) -> Result<KilnDb> {
        let path = dir.as_ref().join(CONFIG_FILE);
        if !path.exists() {
            return Err(Error::CfgNotExist);
        }
        let config: Config = serde_json::from_slice(&fs::read(path)?)?;
        Self::open(config)
    }

    /// Closes the database: saves the config snapshot, the metadata, and the
    /// expiry table, then syncs and closes every segment file. A failed close
    /// leaves the on-disk state potentially behind the in-memory state and
    /// should be treated as fatal.
    pub fn close(self) -> Result<()> {
        let inner = self.inner.into_inner().unwrap();
        let dir = &self.config.dir_path;

        fs::write(dir.join(CONFIG_FILE), serde_json::to_vec(&self.config)?)?;
        inner.meta.store(&dir.join(META_FILE))?;
        inner.expires.save(&dir.join(EXPIRES_FILE))?;

        for (_, file) in inner.files.active {
            file.close(true)?;
        }
        for (_, files) in inner.files.archived {
            for (_, file) in files {
                file.close(true)?;
            }
        }

        let _ = self.lock.unlock();
        Ok(())
    }

    /// Snapshot of the engine's segment and index counters.
    pub fn stats(&self) -> Stats {
        let inner = self.read_guard();
        Stats {
            string_keys: inner.idx.strs.len(),
            archived_segments: inner
                .files
                .archived
                .iter()
                .map(|(kind, files)| (*kind, files.len()))
                .collect(),
            active_segment_ids: inner.files.active_ids.clone(),
        }
    }

    /// Forces all active segments down to disk.
    pub fn sync(&self) -> Result<()> {
        let inner = self.read_guard();
        for file in inner.files.active.values() {
            file.sync()?;
        }
        Ok(())
    }

    /// Copies the whole data directory to `dir` for a backup.
    pub fn backup(&self, dir: impl AsRef<Path>) -> Result<()> {
        // Hold the read lock so no writer moves files mid-copy.
        let _inner = self.read_guard();
        copy_dir(&self.config.dir_path, dir.as_ref())
    }

    /// Garbage-collects archived segments: for every data kind with at least
    /// `reclaim_threshold` archived segments, rewrites the records that are
    /// still live into fresh segments and deletes the rest.
    ///
    /// Runs under the write lock, so all reads and writes block until it
    /// completes. Fails with `ReclaimUnreached` when no kind qualifies.
    pub fn reclaim(&self) -> Result<()> {
        let mut inner = self.write_guard();

        let reclaimable = DataKind::ALL
            .iter()
            .any(|kind| inner.files.archived[kind].len() >= self.config.reclaim_threshold);
        if !reclaimable {
            return Err(Error::ReclaimUnreached);
        }

        let scratch = self.config.dir_path.join(RECLAIM_DIR);
        fs::create_dir_all(&scratch)?;
        let result = reclaim_kinds(&mut inner, &self.config, &scratch);
        let _ = fs::remove_dir_all(&scratch);
        result
    }

    /// Validates a key and the values that will be written with it.
    pub(crate) fn check_key_value(&self, key: &[u8], values: &[&[u8]]) -> Result<()> {
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }
        if key.len() as u64 > self.config.max_key_size as u64 {
            return Err(Error::KeyTooLarge);
        }
        for value in values {
            if value.len() as u64 > self.config.max_value_size as u64 {
                return Err(Error::ValueTooLarge);
            }
        }
        Ok(())
    }

    pub(crate) fn read_guard(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap()
    }

    pub(crate) fn write_guard(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap()
    }
}

impl Inner {
    /// Appends an entry to the active segment of its kind, rotating first
    /// when the record would overflow the segment capacity. Returns the
    /// (file id, offset) the entry was written at.
    pub(crate) fn store(&mut self, config: &Config, entry: &Entry) -> Result<(u32, u64)> {
        let kind = entry.kind.kind();

        if self.files.active[&kind].offset + entry.size() > config.block_size {
            self.rotate(config, kind)?;
        }

        let file = self.files.active.get_mut(&kind).unwrap();
        let offset = file.offset;
        file.write(entry)?;
        self.meta.set_write_off(kind, file.offset);

        if config.sync {
            file.sync()?;
        }

        Ok((self.files.active_ids[&kind], offset))
    }

    fn rotate(&mut self, config: &Config, kind: DataKind) -> Result<()> {
        self.files.active[&kind].sync()?;

        let old_id = self.files.active_ids[&kind];
        let new_id = old_id + 1;
        let file = DataFile::new(
            &config.dir_path,
            new_id,
            config.rw_method,
            config.block_size,
            kind,
        )?;

        let old = self.files.active.insert(kind, file).unwrap();
        self.files.archived.get_mut(&kind).unwrap().insert(old_id, old);
        self.files.active_ids.insert(kind, new_id);
        self.meta.set_write_off(kind, 0);

        tracing::debug!(kind = kind.suffix(), id = new_id, "rotated active segment");
        Ok(())
    }

    /// Rebuilds every index by replaying each kind's segments in ascending
    /// id order, archived first, active last. Replaying in write order makes
    /// the indexes converge to exactly the state the last writer left.
    fn load_indexes(&mut self, config: &Config) -> Result<()> {
        let now = unix_now();
        for kind in DataKind::ALL {
            let mut ids: Vec<u32> = self.files.archived[&kind].keys().copied().collect();
            ids.push(self.files.active_ids[&kind]);

            for id in ids {
                let file = if id == self.files.active_ids[&kind] {
                    &self.files.active[&kind]
                } else {
                    &self.files.archived[&kind][&id]
                };

                let mut offset = 0;
                loop {
                    let entry = match file.read(offset) {
                        Ok(entry) => entry,
                        Err(Error::EndOfFile) => break,
                        Err(err) => return Err(err),
                    };

                    let size = entry.size();
                    let value = (config.idx_mode == IndexMode::KeyValueRam
                        && kind == DataKind::Str)
                        .then(|| entry.value.clone());
                    let idx = Indexer {
                        file_id: id,
                        entry_size: size as u32,
                        offset,
                        value,
                    };
                    self.idx.apply(&entry, idx, &self.expires, now);
                    offset += size;
                }
            }
        }
        tracing::info!(strings = self.idx.strs.len(), "rebuilt indexes from segments");
        Ok(())
    }

    /// Resolves a string locator to its value: inline in key-value mode,
    /// otherwise one positional read from the owning segment.
    pub(crate) fn read_value(&self, idx: &Indexer) -> Result<Vec<u8>> {
        if let Some(value) = &idx.value {
            return Ok(value.clone());
        }

        let kind = DataKind::Str;
        let file = if idx.file_id == self.files.active_ids[&kind] {
            &self.files.active[&kind]
        } else {
            self.files.archived[&kind]
                .get(&idx.file_id)
                .ok_or_else(|| Error::InvalidData(format!("missing segment {}", idx.file_id)))?
        };
        Ok(file.read(idx.offset)?.value)
    }
}

impl IndexSet {
    /// Replays one entry into the index family of its kind. This is the same
    /// dispatch the write path uses, so recovery reproduces its effects
    /// record by record. String entries whose key has already expired are
    /// skipped.
    pub(crate) fn apply(&mut self, entry: &Entry, idx: Indexer, expires: &Expires, now: u32) {
        match entry.kind {
            EntryKind::Str(mark) => {
                if expires.is_expired(&entry.key, now) {
                    return;
                }
                match mark {
                    StrMark::Set => self.strs.put(entry.key.clone(), idx),
                    StrMark::Rem => {
                        self.strs.remove(&entry.key);
                    }
                }
            }
            EntryKind::List(mark) => match mark {
                ListMark::LPush => {
                    self.lists.lpush(&entry.key, entry.value.clone());
                }
                ListMark::RPush => {
                    self.lists.rpush(&entry.key, entry.value.clone());
                }
                ListMark::LPop => {
                    self.lists.lpop(&entry.key);
                }
                ListMark::RPop => {
                    self.lists.rpop(&entry.key);
                }
                ListMark::LRem => {
                    if let Some(count) = parse_i64(&entry.extra) {
                        self.lists.lrem(&entry.key, &entry.value, count);
                    }
                }
                ListMark::LInsert => {
                    let parts = split_extra(&entry.extra);
                    if parts.len() == 2 {
                        let option = parse_i64(parts[1])
                            .and_then(|code| InsertOption::from_code(code as u8));
                        if let Some(option) = option {
                            self.lists
                                .linsert(&entry.key, option, parts[0], entry.value.clone());
                        }
                    }
                }
                ListMark::LSet => {
                    if let Some(index) = parse_i64(&entry.extra) {
                        self.lists.lset(&entry.key, index, entry.value.clone());
                    }
                }
                ListMark::LTrim => {
                    let parts = split_extra(&entry.extra);
                    if parts.len() == 2 {
                        if let (Some(start), Some(end)) =
                            (parse_i64(parts[0]), parse_i64(parts[1]))
                        {
                            self.lists.ltrim(&entry.key, start, end);
                        }
                    }
                }
            },
            EntryKind::Hash(mark) => match mark {
                HashMark::HSet => {
                    self.hashes.hset(&entry.key, &entry.extra, entry.value.clone());
                }
                HashMark::HDel => {
                    self.hashes.hdel(&entry.key, &entry.extra);
                }
            },
            EntryKind::Set(mark) => match mark {
                SetMark::SAdd => {
                    self.sets.sadd(&entry.key, entry.value.clone());
                }
                SetMark::SRem => {
                    self.sets.srem(&entry.key, &entry.value);
                }
                SetMark::SMove => {
                    self.sets.smove(&entry.key, &entry.extra, &entry.value);
                }
            },
            EntryKind::ZSet(mark) => match mark {
                ZSetMark::ZAdd => {
                    if let Some(score) = parse_f64(&entry.extra) {
                        self.zsets.zadd(&entry.key, score, entry.value.clone());
                    }
                }
                ZSetMark::ZRem => {
                    self.zsets.zrem(&entry.key, &entry.value);
                }
            },
        }
    }

    /// The per-kind liveness test compaction applies to a record found at
    /// `(file_id, offset)` in an archived segment. Deletion marks are never
    /// live. List liveness is conservative: a push or insert record is kept
    /// whenever its value is still anywhere in the list.
    pub(crate) fn is_live(
        &self,
        entry: &Entry,
        file_id: u32,
        offset: u64,
        expires: &Expires,
        now: u32,
    ) -> bool {
        match entry.kind {
            EntryKind::Str(StrMark::Set) => {
                if expires.is_expired(&entry.key, now) {
                    return false;
                }
                self.strs
                    .get(&entry.key)
                    .is_some_and(|idx| idx.file_id == file_id && idx.offset == offset)
            }
            EntryKind::List(
                ListMark::LPush | ListMark::RPush | ListMark::LInsert | ListMark::LSet,
            ) => self.lists.val_exists(&entry.key, &entry.value),
            EntryKind::Hash(HashMark::HSet) => self
                .hashes
                .hget(&entry.key, &entry.extra)
                .is_some_and(|value| value == entry.value),
            EntryKind::Set(SetMark::SAdd) => self.sets.sismember(&entry.key, &entry.value),
            EntryKind::Set(SetMark::SMove) => self.sets.sismember(&entry.extra, &entry.value),
            EntryKind::ZSet(ZSetMark::ZAdd) => parse_f64(&entry.extra)
                .is_some_and(|score| self.zsets.zscore(&entry.key, &entry.value) == Some(score)),
            _ => false,
        }
    }
}

fn reclaim_kinds(inner: &mut Inner, config: &Config, scratch: &Path) -> Result<()> {
    let now = unix_now();
    for kind in DataKind::ALL {
        if inner.files.archived[&kind].len() < config.reclaim_threshold {
            continue;
        }

        // Walk the archived segments in id order and collect live records.
        let mut live: Vec<Entry> = Vec::new();
        for (id, file) in &inner.files.archived[&kind] {
            let mut offset = 0;
            loop {
                let entry = match file.read(offset) {
                    Ok(entry) => entry,
                    Err(Error::EndOfFile) => break,
                    Err(err) => return Err(err),
                };
                let size = entry.size();
                if inner.idx.is_live(&entry, *id, offset, &inner.expires, now) {
                    live.push(entry);
                }
                offset += size;
            }
        }

        // Rewrite them into fresh segments, rotating at the capacity and
        // assigning new ids from 0. Relocated string records repoint their
        // in-memory locators.
        let mut rewritten: BTreeMap<u32, DataFile> = BTreeMap::new();
        let mut current = 0;
        let mut next_id = 0;
        for entry in &live {
            let needs_new = match rewritten.get(&current) {
                None => true,
                Some(file) => file.offset + entry.size() > config.block_size,
            };
            if needs_new {
                let file =
                    DataFile::new(scratch, next_id, config.rw_method, config.block_size, kind)?;
                current = next_id;
                rewritten.insert(current, file);
                next_id += 1;
            }

            let file = rewritten.get_mut(&current).unwrap();
            file.write(entry)?;
            if entry.kind == EntryKind::Str(StrMark::Set) {
                inner
                    .idx
                    .strs
                    .relocate(&entry.key, file.id, file.offset - entry.size());
            }
        }

        // Delete the superseded segments and move the rewritten ones into
        // the data directory under their canonical names.
        let old = std::mem::take(inner.files.archived.get_mut(&kind).unwrap());
        let old_count = old.len();
        for (_, file) in old {
            let path = file.path().to_path_buf();
            drop(file);
            fs::remove_file(&path)?;
        }

        let mut swapped = BTreeMap::new();
        for (id, mut file) in rewritten {
            file.sync()?;
            file.rename(&config.dir_path.join(kind.file_name(id)))?;
            swapped.insert(id, file);
        }

        tracing::info!(
            kind = kind.suffix(),
            before = old_count,
            after = swapped.len(),
            live_records = live.len(),
            "reclaimed archived segments"
        );
        *inner.files.archived.get_mut(&kind).unwrap() = swapped;
    }
    Ok(())
}

pub(crate) fn parse_i64(bytes: &[u8]) -> Option<i64> {
    std::str::from_utf8(bytes).ok()?.parse().ok()
}

pub(crate) fn parse_f64(bytes: &[u8]) -> Option<f64> {
    std::str::from_utf8(bytes).ok()?.parse().ok()
}

/// Seconds since the Unix epoch.
pub(crate) fn unix_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as u32
}

fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;
    for dir_entry in fs::read_dir(src)? {
        let dir_entry = dir_entry?;
        let dest = dst.join(dir_entry.file_name());
        if dir_entry.file_type()?.is_dir() {
            copy_dir(&dir_entry.path(), &dest)?;
        } else {
            fs::copy(dir_entry.path(), &dest)?;
        }
    }
    Ok(())
}
