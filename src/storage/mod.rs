//! On-disk persistence: the record codec, segment files, and the side
//! tables (metadata and expiry) that accompany them.

pub mod data_file;
pub mod entry;
pub mod expires;
pub mod meta;

pub use data_file::{build, DataFile};
pub use entry::{DataKind, Entry, EntryKind};
pub use expires::Expires;
pub use meta::Meta;
