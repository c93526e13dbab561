//! Per-interface lock files
//!
//! Two hotplug events for the same interface can start two processes at
//! once. Both would pass the "not yet configured" check before either
//! engine run writes its artifact. An exclusive advisory lock on
//! `<dir>/<interface>.lock` lets only one of them through; the other exits
//! as a no-op.
//!
//! The lock belongs to the open file, so the kernel releases it when the
//! owner exits, however it exits. The file itself is never removed:
//! unlinking a locked file would let a later process lock a fresh inode
//! while an earlier one still holds the old.

use crate::BootError;
use fs2::FileExt;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tracing::{debug, warn};

/// Result of a lock attempt
#[derive(Debug)]
pub enum LockAttempt {
    Acquired(InterfaceLock),
    /// Another process holds the lock
    Held { owner: Option<u32> },
}

/// Held per-interface lock, released on drop
#[derive(Debug)]
pub struct InterfaceLock {
    path: PathBuf,
    file: File,
}

impl InterfaceLock {
    /// Try to take the lock for `interface` in `dir` without waiting
    pub async fn acquire(dir: &Path, interface: &str) -> Result<LockAttempt, BootError> {
        let fail = |e: std::io::Error| BootError::lock(interface, e.to_string());

        fs::create_dir_all(dir)
            .await
            .map_err(|e| BootError::lock(interface, format!("{}: {}", dir.display(), e)))?;

        let path = dir.join(format!("{interface}.lock"));
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .await
            .map_err(fail)?
            .into_std()
            .await;

        if let Err(e) = file.try_lock_exclusive() {
            if e.kind() == fs2::lock_contended_error().kind() {
                return Ok(LockAttempt::Held {
                    owner: read_owner(&path).await,
                });
            }
            return Err(fail(e));
        }

        // Owner pid, for the log line of whoever finds the lock held
        let mut lock = Self { path, file };
        lock.record_owner().map_err(fail)?;
        debug!("Acquired lock {}", lock.path.display());
        Ok(LockAttempt::Acquired(lock))
    }

    fn record_owner(&mut self) -> std::io::Result<()> {
        self.file.set_len(0)?;
        writeln!(self.file, "{}", std::process::id())?;
        self.file.flush()
    }
}

impl Drop for InterfaceLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.set_len(0) {
            debug!("Failed to clear {}: {}", self.path.display(), e);
        }
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("Failed to release lock {}: {}", self.path.display(), e);
        }
    }
}

async fn read_owner(path: &Path) -> Option<u32> {
    fs::read_to_string(path).await.ok()?.trim().parse().ok()
}
