use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How segment files perform their reads and writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IoMethod {
    /// Positional reads and writes through standard file IO.
    FileIo,
    /// The segment is truncated to its capacity and memory-mapped read-write.
    Mmap,
}

/// What the string index keeps in memory for each key.
///
/// The other data kinds always hold their values in memory; this mode only
/// affects strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexMode {
    /// Key and value both live in the index; reads never touch disk.
    KeyValueRam,
    /// Only the record locator lives in the index; reads go to the segment.
    KeyOnlyRam,
}

/// Configuration for a KilnDB instance.
///
/// The config is snapshotted to `db.cfg` (JSON) on close so that
/// [`KilnDb::reopen`](crate::KilnDb::reopen) can restore the instance
/// without the caller repeating it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Directory for all data files.
    pub dir_path: PathBuf,

    /// Segment read/write backend.
    pub rw_method: IoMethod,

    /// Logical capacity of a single segment file, in bytes. The active
    /// segment rotates when the next record would not fit.
    pub block_size: u64,

    /// Maximum accepted key length, in bytes.
    pub max_key_size: u32,

    /// Maximum accepted value length, in bytes.
    pub max_value_size: u32,

    /// String index mode.
    pub idx_mode: IndexMode,

    /// Fsync the active segment after every write.
    pub sync: bool,

    /// Minimum archived-segment count (per data kind) before compaction
    /// is allowed to run.
    pub reclaim_threshold: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dir_path: PathBuf::from("./kilndb"),
            rw_method: IoMethod::FileIo,
            block_size: 16 * 1024 * 1024, // 16MB
            max_key_size: 1024,
            max_value_size: 8 * 1024 * 1024, // 8MB
            idx_mode: IndexMode::KeyOnlyRam,
            sync: false,
            reclaim_threshold: 4,
        }
    }
}

impl Config {
    /// Create a new config with the given data directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir_path: dir.into(),
            ..Default::default()
        }
    }

    /// Set the segment IO backend.
    pub fn rw_method(mut self, method: IoMethod) -> Self {
        self.rw_method = method;
        self
    }

    /// Set the segment capacity.
    pub fn block_size(mut self, size: u64) -> Self {
        self.block_size = size;
        self
    }

    /// Set the maximum key length.
    pub fn max_key_size(mut self, size: u32) -> Self {
        self.max_key_size = size;
        self
    }

    /// Set the maximum value length.
    pub fn max_value_size(mut self, size: u32) -> Self {
        self.max_value_size = size;
        self
    }

    /// Set the string index mode.
    pub fn idx_mode(mut self, mode: IndexMode) -> Self {
        self.idx_mode = mode;
        self
    }

    /// Fsync after every write.
    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    /// Set the compaction threshold.
    pub fn reclaim_threshold(mut self, threshold: usize) -> Self {
        self.reclaim_threshold = threshold;
        self
    }
}
