use std::fmt::Display;

/// KilnDB errors.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// The key is empty.
    EmptyKey,
    /// The key exceeds the configured maximum length.
    KeyTooLarge,
    /// A value exceeds the configured maximum length.
    ValueTooLarge,
    /// A write was attempted with an entry whose key is empty.
    EmptyEntry,
    /// An entry with an empty key was passed to the codec.
    InvalidEntry,
    /// The key does not exist.
    KeyNotExist,
    /// The stored checksum does not match the value bytes.
    InvalidCrc,
    /// A read reached the end of a segment file.
    EndOfFile,
    /// A user-supplied field contains the reserved extra separator.
    ExtraContainsSeparator,
    /// The time-to-live is zero or otherwise unusable.
    InvalidTTL,
    /// The key exists but its deadline has passed.
    KeyExpired,
    /// Reopen was attempted on a directory without a saved config file.
    CfgNotExist,
    /// No data kind has enough archived segments to make compaction worthwhile.
    ReclaimUnreached,
    /// Invalid data, typically decoding errors, corruption, or unexpected internal values.
    InvalidData(String),
    /// An IO error.
    Io(String),
}

impl std::error::Error for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::EmptyKey => write!(f, "the key is empty"),
            Error::KeyTooLarge => write!(f, "key exceeded the max length"),
            Error::ValueTooLarge => write!(f, "value exceeded the max length"),
            Error::EmptyEntry => write!(f, "entry or the key of entry is empty"),
            Error::InvalidEntry => write!(f, "invalid entry"),
            Error::KeyNotExist => write!(f, "key not exist"),
            Error::InvalidCrc => write!(f, "invalid crc"),
            Error::EndOfFile => write!(f, "end of file"),
            Error::ExtraContainsSeparator => write!(f, "extra contains separator \\0"),
            Error::InvalidTTL => write!(f, "invalid ttl"),
            Error::KeyExpired => write!(f, "key is expired"),
            Error::CfgNotExist => write!(f, "the config file not exist"),
            Error::ReclaimUnreached => write!(f, "unused space not reach the threshold"),
            Error::InvalidData(msg) => write!(f, "invalid data: {msg}"),
            Error::Io(msg) => write!(f, "io error: {msg}"),
        }
    }
}

/// Constructs an Error::InvalidData for the given format string.
#[macro_export]
macro_rules! errdata {
    ($($args:tt)*) => { $crate::error::Error::InvalidData(format!($($args)*)).into() };
}

/// A KilnDB Result returning Error.
pub type Result<T> = std::result::Result<T, Error>;

impl<T> From<Error> for Result<T> {
    fn from(error: Error) -> Self {
        Err(error)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidData(err.to_string())
    }
}
