//! Advisory `flock` locks on open log files
//!
//! Locks are non-blocking: a lock held by another process is reported as
//! [`LockError::Held`] instead of waiting for it.

use std::fs::File;
use std::io;
use std::os::unix::io::AsRawFd;

/// Outcome of a failed lock attempt
#[derive(Debug)]
pub enum LockError {
    /// Someone else holds the lock
    Held,
    /// The flock call itself failed
    Io(io::Error),
}

/// Take an exclusive advisory lock without blocking
pub fn try_lock_exclusive(file: &File) -> Result<(), LockError> {
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        return Ok(());
    }

    let err = io::Error::last_os_error();
    if err.kind() == io::ErrorKind::WouldBlock {
        Err(LockError::Held)
    } else {
        Err(LockError::Io(err))
    }
}

/// Release a lock taken with [`try_lock_exclusive`]
pub fn unlock(file: &File) -> io::Result<()> {
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_UN) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}
