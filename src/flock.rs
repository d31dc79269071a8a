//! Advisory file lock guarding a data directory.
//!
//! Two engine instances appending to the same segment files would corrupt
//! them, so `open` takes an exclusive lock on a well-known file inside the
//! directory and holds it until the database closes. The lock file itself
//! is left behind; only the OS-level lock is released.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

pub struct FileLock {
    _file: File,
    path: PathBuf,
}

impl FileLock {
    /// Creates the lock file (overwriting any stale one) and acquires an
    /// exclusive, non-blocking lock on it. The file records the owning
    /// process id for debugging.
    pub fn lock(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;

        Self::try_lock(&file)?;

        writeln!(file, "{}", std::process::id())?;
        file.flush()?;

        Ok(Self { _file: file, path })
    }

    #[cfg(unix)]
    fn try_lock(file: &File) -> io::Result<()> {
        use libc::{flock, LOCK_EX, LOCK_NB};

        let result = unsafe { flock(file.as_raw_fd(), LOCK_EX | LOCK_NB) };
        if result != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn try_lock(_file: &File) -> io::Result<()> {
        Ok(())
    }

    /// Releases the lock. Dropping the guard has the same effect; the lock
    /// file stays on disk to avoid unlink races with a waiting opener.
    pub fn unlock(self) -> io::Result<()> {
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_records_pid() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("db.lock");

        let lock = FileLock::lock(&path).expect("Failed to acquire lock");
        assert_eq!(lock.path(), path);

        let content = std::fs::read_to_string(&path).expect("Failed to read lock file");
        assert_eq!(content.trim(), std::process::id().to_string());

        lock.unlock().expect("Failed to release lock");
    }

    #[cfg(unix)]
    #[test]
    fn test_second_lock_fails() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("db.lock");

        let held = FileLock::lock(&path).expect("Failed to acquire first lock");
        assert!(FileLock::lock(&path).is_err(), "second lock must fail");

        drop(held);
        FileLock::lock(&path).expect("Lock must be available again after drop");
    }
}
