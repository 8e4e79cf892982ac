//! cs persistence: home-relative default paths, an advisory lock taken
//! before a kubeconfig rewrite, and atomic file replacement.

#![forbid(unsafe_code)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use metrics::histogram;
use tracing::debug;

const LOCK_SUFFIX: &str = "cs-lock";

fn home_dir() -> PathBuf {
    // no home: resolve relative to the working directory
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// `$HOME/.kube/config`
pub fn default_kubeconfig_path() -> PathBuf {
    home_dir().join(".kube").join("config")
}

/// `$HOME/.ao.json`
pub fn default_registry_path() -> PathBuf {
    home_dir().join(".ao.json")
}

/// Sidecar lock file next to `target`. Not `config.lock`: kubectl creates that one exclusively.
pub fn lock_path_for(target: &Path) -> PathBuf {
    let mut name = target.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(LOCK_SUFFIX);
    target.with_file_name(name)
}

/// Exclusive advisory lock held for the lifetime of the value.
#[derive(Debug)]
pub struct FileLock {
    file: File,
}

impl FileLock {
    /// Block until the sidecar lock for `target` is held.
    pub fn acquire(target: &Path) -> io::Result<Self> {
        let path = lock_path_for(target);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;
        let started = std::time::Instant::now();
        file.lock_exclusive()?;
        histogram!("persist_lock_wait_ms", started.elapsed().as_secs_f64() * 1000.0);
        debug!(path = %path.display(), "lock acquired");
        Ok(Self { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Replace `path` with `bytes` via a temp file in the same directory and a rename.
/// A symlinked target is followed; an existing file's permissions are kept.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let started = std::time::Instant::now();
    let target = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let dir = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let previous = fs::metadata(&target).ok().map(|m| m.permissions());

    let mut temp = tempfile::NamedTempFile::new_in(&dir)?;
    temp.write_all(bytes)?;
    if let Some(perms) = previous {
        fs::set_permissions(temp.path(), perms)?;
    }
    temp.as_file().sync_all()?;
    temp.persist(&target).map_err(|e| e.error)?;
    histogram!("persist_save_ms", started.elapsed().as_secs_f64() * 1000.0);
    debug!(path = %target.display(), bytes = bytes.len(), "file replaced");
    Ok(())
}
