//! Advisory locking of the on-disk indexes.
//!
//! Uses flock() on a lock file in the base directory. Commands that write
//! index files hold the lock for the whole load-modify-save cycle; read-only
//! commands and the daemon's searches do not take it.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

/// Lock file name placed in the base directory
const LOCK_FILE_NAME: &str = "wander.lock";

/// A held index lock that releases on drop
pub struct IndexLock {
    #[allow(dead_code)]
    file: File,
}

impl IndexLock {
    /// Try to take the lock without waiting.
    /// Fails with `WouldBlock` if another process holds it.
    pub fn try_acquire(base_path: &Path) -> io::Result<Self> {
        let file = Self::open(base_path)?;
        Self::try_lock_exclusive(&file)?;
        Ok(IndexLock { file })
    }

    /// Take the lock, waiting for the current holder to release it.
    pub fn acquire_blocking(base_path: &Path) -> io::Result<Self> {
        let file = Self::open(base_path)?;
        Self::lock_exclusive(&file)?;
        Ok(IndexLock { file })
    }

    fn open(base_path: &Path) -> io::Result<File> {
        std::fs::create_dir_all(base_path)?;
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(base_path.join(LOCK_FILE_NAME))
    }

    #[cfg(unix)]
    fn try_lock_exclusive(file: &File) -> io::Result<()> {
        let fd = file.as_raw_fd();
        let result = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
        if result != 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::WouldBlock
                || err.raw_os_error() == Some(libc::EWOULDBLOCK)
                || err.raw_os_error() == Some(libc::EAGAIN)
            {
                return Err(io::Error::new(
                    io::ErrorKind::WouldBlock,
                    "Indexes are locked by another wander process",
                ));
            }
            return Err(err);
        }
        Ok(())
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

    // No locking outside unix.
    #[cfg(not(unix))]
    fn try_lock_exclusive(_file: &File) -> io::Result<()> {
        Ok(())
    }

    #[cfg(not(unix))]
    fn lock_exclusive(_file: &File) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(unix)]
impl Drop for IndexLock {
    fn drop(&mut self) {
        let fd = self.file.as_raw_fd();
        unsafe { libc::flock(fd, libc::LOCK_UN) };
    }
}
