//! Lock Coordinator: per-key exclusive advisory locking
//!
//! Every mutating queue operation runs inside an exclusive lock on the
//! key's control file. Acquisition is always a non-blocking attempt
//! (`LOCK_EX | LOCK_NB`); on contention the caller sleeps a short random
//! interval and tries again, unbounded by default. Under sustained
//! contention this is a busy-wait, not a queue-fair lock.
//!
//! flock scope is the open file description: two processes (or two queue
//! instances in one process) holding separate descriptors for the same
//! control file contend; two threads sharing one instance are already
//! serialized by `&mut self` on the engine.

use crate::errors::{FileQueueError, Result};
use rand::Rng;
use std::fs::File;
use std::ops::RangeInclusive;
use std::time::Duration;
use tracing::debug;

/// Retry behavior for one lock acquisition loop.
///
/// The sleep ranges mirror the observed defaults: pushes retry fast
/// (10..=500 us), pops back off harder (1000..=2000 us). `max_attempts`
/// is `None` by default, matching the retry-forever semantics; tests and
/// latency-sensitive callers can cap it.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub sleep_micros: RangeInclusive<u64>,
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    /// Default policy for push: short sleeps, retry forever.
    pub fn push_default() -> Self {
        Self {
            sleep_micros: 10..=500,
            max_attempts: None,
        }
    }

    /// Default policy for pop: longer sleeps, retry forever.
    pub fn pop_default() -> Self {
        Self {
            sleep_micros: 1000..=2000,
            max_attempts: None,
        }
    }

    /// Same sleep range, but give up after `max_attempts` failures.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

/// Run `critical_section` under an exclusive lock on `file`.
///
/// The lock is released before returning on both the `Ok` and `Err` path
/// of the critical section. A panic inside the critical section skips the
/// explicit unlock; the descriptor's eventual close releases it.
pub fn with_exclusive_lock<T>(
    file: &mut File,
    policy: &RetryPolicy,
    critical_section: impl FnOnce(&mut File) -> Result<T>,
) -> Result<T> {
    acquire(file, policy)?;
    let result = critical_section(file);
    unlock(file);
    result
}

/// Retry non-blocking lock attempts until one succeeds or the policy's
/// attempt cap is exhausted.
fn acquire(file: &File, policy: &RetryPolicy) -> Result<()> {
    let mut attempts: u32 = 0;
    loop {
        if try_lock_exclusive(file)? {
            return Ok(());
        }

        attempts += 1;
        if let Some(max) = policy.max_attempts {
            if attempts >= max {
                return Err(FileQueueError::LockExhausted(attempts));
            }
        }

        let micros = rand::thread_rng().gen_range(policy.sleep_micros.clone());
        debug!(attempts, sleep_micros = micros, "lock contention, retrying");
        std::thread::sleep(Duration::from_micros(micros));
    }
}

/// One non-blocking exclusive lock attempt.
///
/// Returns `Ok(false)` when another holder has the lock, `Err` for any
/// other flock failure.
#[cfg(unix)]
fn try_lock_exclusive(file: &File) -> Result<bool> {
    use std::os::unix::io::AsRawFd;

    let fd = file.as_raw_fd();
    // SAFETY: fd is a valid open descriptor owned by `file`
    let rc = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        return Ok(true);
    }

    let err = std::io::Error::last_os_error();
    if err.kind() == std::io::ErrorKind::WouldBlock {
        Ok(false)
    } else {
        Err(FileQueueError::Lock(format!(
            "flock failed: {}",
            err
        )))
    }
}

#[cfg(unix)]
fn unlock(file: &File) {
    use std::os::unix::io::AsRawFd;

    // SAFETY: fd is a valid open descriptor owned by `file`
    unsafe {
        libc::flock(file.as_raw_fd(), libc::LOCK_UN);
    }
}

// Non-Unix fallback: no advisory locking, attempts always succeed.
#[cfg(not(unix))]
fn try_lock_exclusive(_file: &File) -> Result<bool> {
    Ok(true)
}

#[cfg(not(unix))]
fn unlock(_file: &File) {}
