//! Advisory cross-process lock via an exclusively-created lock file.
//!
//! Acquisition loops with randomized 25–60 ms backoff until the deadline.
//! A lock file whose mtime is older than `stale_ms`, or whose recorded PID
//! is no longer running, is treated as abandoned and unlinked. Release is
//! RAII — the guard removes the file on drop, including error paths.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rand::Rng;
use thiserror::Error;

#[derive(Debug, Clone, Copy)]
pub struct LockOptions {
    pub timeout_ms: u64,
    pub stale_ms: u64,
}

impl LockOptions {
    pub fn new(timeout_ms: u64, stale_ms: u64) -> Self {
        LockOptions {
            timeout_ms,
            stale_ms,
        }
    }
}

impl Default for LockOptions {
    fn default() -> Self {
        // Matches the state-store defaults; the nonce coordinator and the
        // mention gate override these per spec'd tunables.
        LockOptions::new(5_000, 15_000)
    }
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock on {path} not acquired within {timeout_ms}ms")]
    Timeout { path: PathBuf, timeout_ms: u64 },

    #[error("lock file io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Held lock. Dropping it unlinks the lock file.
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
}

impl FileLock {
    pub fn acquire(path: &Path, opts: &LockOptions) -> Result<FileLock, LockError> {
        let deadline = Instant::now() + Duration::from_millis(opts.timeout_ms);

        loop {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|source| LockError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
            }

            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    // PID lets a later claimant distinguish crashed holders
                    // from live ones before the mtime staleness kicks in.
                    let _ = writeln!(file, "{}", std::process::id());
                    let _ = file.sync_all();
                    return Ok(FileLock {
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if is_stale(path, opts.stale_ms) {
                        let _ = std::fs::remove_file(path);
                        continue;
                    }
                    if Instant::now() >= deadline {
                        return Err(LockError::Timeout {
                            path: path.to_path_buf(),
                            timeout_ms: opts.timeout_ms,
                        });
                    }
                    let backoff = rand::rng().random_range(25..=60);
                    std::thread::sleep(Duration::from_millis(backoff));
                }
                Err(source) => {
                    return Err(LockError::Io {
                        path: path.to_path_buf(),
                        source,
                    });
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn is_stale(path: &Path, stale_ms: u64) -> bool {
    let mtime_stale = path
        .metadata()
        .ok()
        .and_then(|m| m.modified().ok())
        .and_then(|t| t.elapsed().ok())
        .map(|age| age > Duration::from_millis(stale_ms))
        .unwrap_or(false);
    if mtime_stale {
        return true;
    }

    // A lock whose holder died is stale regardless of age.
    match read_pid(path) {
        Some(pid) if pid != std::process::id() => !is_process_running(pid),
        _ => false,
    }
}

fn read_pid(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse().ok())
}

fn is_process_running(pid: u32) -> bool {
    // kill(pid, 0) probes existence without delivering a signal
    unsafe { libc::kill(pid as i32, 0) == 0 }
}
