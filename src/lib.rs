//! KilnDB is an embedded, single-process key-value store with a Redis-style
//! vocabulary over five data kinds: strings, lists, hashes, sets, and sorted
//! sets. Every mutation is appended as a self-describing, CRC-checked record
//! to a fixed-capacity segment file for its kind; in-memory indexes map keys
//! to record locations so reads cost at most one positional disk read.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                       KilnDb                            │
//! │            (single reader/writer lock)                  │
//! └───────┬───────────────────────────────────┬─────────────┘
//!         │ writes                            │ reads
//! ┌───────▼───────────┐              ┌────────▼────────────┐
//! │  Active segments  │              │    Typed indexes    │
//! │  (append + rotate)│              │ str/list/hash/set/  │
//! └───────┬───────────┘              │        zset         │
//!         │ rotation                 └────────┬────────────┘
//! ┌───────▼───────────┐                       │ KeyOnlyRam
//! │ Archived segments │◄──────────────────────┘
//! │ (read-only, id-   │   positional reads
//! │  ordered, compact)│
//! └───────────────────┘
//! ```
//!
//! On startup the indexes are rebuilt by replaying every segment in id
//! order. Space held by superseded or deleted records is reclaimed by an
//! explicit compaction pass that rewrites live records into fresh segments.

pub mod config;
pub mod error;
pub mod flock;
pub mod index;
pub mod storage;
pub mod store;

pub use config::{Config, IndexMode, IoMethod};
pub use error::{Error, Result};
pub use index::list::InsertOption;
pub use storage::entry::DataKind;
pub use store::{KilnDb, Stats};
