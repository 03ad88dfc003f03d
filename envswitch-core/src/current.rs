/*!
Current-environment pointer and the cross-process switch lock.

The pointer is a single file whose whole content is the active environment's
name. Switches serialize on an advisory lock held on a separate lock file.
*/

use crate::{fsutil, EnvSwitchError, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Reads and writes the active environment name
#[derive(Debug, Clone)]
pub struct CurrentPointer {
    path: PathBuf,
}

impl CurrentPointer {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Active environment name, or `None` when unset or empty
    pub fn get(&self) -> Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => {
                let name = text.trim();
                Ok((!name.is_empty()).then(|| name.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn set(&self, name: &str) -> Result<()> {
        fsutil::write_atomic(&self.path, name.as_bytes())
    }

    pub fn clear(&self) -> Result<()> {
        fsutil::remove_path(&self.path)
    }
}

/// Exclusive advisory lock held for the duration of a switch
///
/// Released when dropped.
#[derive(Debug)]
pub struct SwitchLock {
    file: File,
    path: PathBuf,
}

impl SwitchLock {
    /// Acquire the lock, polling until `timeout` elapses
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self> {
        fsutil::ensure_parent_dir(path)?;
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        let started = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!("Acquired switch lock {}", path.display());
                    return Ok(Self {
                        file,
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if is_contended(&e) => {
                    if started.elapsed() >= timeout {
                        return Err(EnvSwitchError::LockTimeout {
                            path: path.to_path_buf(),
                            waited_secs: timeout.as_secs(),
                        });
                    }
                    thread::sleep(LOCK_POLL_INTERVAL);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn is_contended(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

impl Drop for SwitchLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        debug!("Released switch lock {}", self.path.display());
    }
}
