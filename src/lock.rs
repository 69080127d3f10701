//! Advisory file locking around score store updates.
//!
//! Every read-modify-write of the store runs under an exclusive `flock()` on
//! a sibling `.lock` file, so two processes recording the same pair cannot
//! interleave.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

/// Lock file guarding `store_path`.
pub fn lock_path_for(store_path: &Path) -> PathBuf {
    let mut name = store_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    store_path.with_file_name(name)
}

/// A held file lock that releases on drop
pub struct FileLock {
    #[allow(dead_code)]
    file: File,
}

impl FileLock {
    fn open(lock_path: &Path) -> io::Result<File> {
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)
    }

    /// Acquire an exclusive lock, blocking until available.
    pub fn acquire_blocking(lock_path: &Path) -> io::Result<Self> {
        let file = Self::open(lock_path)?;
        Self::lock_exclusive(&file)?;
        Ok(FileLock { file })
    }

    #[cfg(unix)]
    fn lock_exclusive(file: &File) -> io::Result<()> {
        let fd = file.as_raw_fd();
        let result = unsafe { libc::flock(fd, libc::LOCK_EX) };
        if result != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    // TODO: LockFileEx on windows; only the in-process guard applies there
    #[cfg(not(unix))]
    fn lock_exclusive(_file: &File) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(unix)]
impl Drop for FileLock {
    fn drop(&mut self) {
        let fd = self.file.as_raw_fd();
        // Release the lock - ignore errors on drop
        unsafe { libc::flock(fd, libc::LOCK_UN) };
    }
}
