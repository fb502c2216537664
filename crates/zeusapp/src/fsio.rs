//! File I/O primitives: atomic writes and advisory sidecar locks.
//!
//! Writes go to a sibling temp file, are fsynced, then renamed over the
//! target; readers therefore see a pre-write or post-write file, never a
//! torn one. Every write to a named file is guarded by a `<file>.lock`
//! sidecar created with exclusive-create semantics. Reads take no locks.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Result, ZeusError};

/// Locks whose sidecar has not been touched for this long are presumed
/// abandoned and may be reclaimed.
pub const STALE_LOCK_AGE: Duration = Duration::from_secs(5 * 60);

/// Advisory per-file lock. The sidecar `<file>.lock` records the holder's
/// PID; dropping the guard removes the sidecar on every exit path.
#[derive(Debug)]
pub struct FileLock {
    lock_path: PathBuf,
    released: bool,
}

impl FileLock {
    /// Acquire the lock guarding `target`. Fails immediately with `Locked`
    /// when another live holder exists; a stale sidecar is reclaimed once.
    pub fn acquire(target: &Path) -> Result<FileLock> {
        let lock_path = Self::lock_path_for(target);
        match Self::try_create(&lock_path) {
            Ok(lock) => Ok(lock),
            Err(ZeusError::Locked { path, holder }) => {
                if Self::is_stale(&path) {
                    warn!(lock = %path.display(), "reclaiming stale lock");
                    // Best effort: a racing reclaimer may have removed it first.
                    let _ = fs::remove_file(&path);
                    Self::try_create(&path)
                } else {
                    Err(ZeusError::Locked { path, holder })
                }
            }
            Err(other) => Err(other),
        }
    }

    fn lock_path_for(target: &Path) -> PathBuf {
        let mut name = target
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        target.with_file_name(name)
    }

    fn try_create(lock_path: &Path) -> Result<FileLock> {
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent)?;
        }
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(lock_path)
        {
            Ok(mut file) => {
                let _ = write!(file, "{}", std::process::id());
                debug!(lock = %lock_path.display(), "acquired");
                Ok(FileLock {
                    lock_path: lock_path.to_path_buf(),
                    released: false,
                })
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Err(ZeusError::Locked {
                path: lock_path.to_path_buf(),
                holder: Self::read_holder(lock_path),
            }),
            Err(err) => Err(err.into()),
        }
    }

    fn read_holder(lock_path: &Path) -> Option<u32> {
        let mut buf = String::new();
        File::open(lock_path)
            .ok()?
            .read_to_string(&mut buf)
            .ok()?;
        buf.trim().parse().ok()
    }

    fn is_stale(lock_path: &Path) -> bool {
        let Ok(meta) = fs::metadata(lock_path) else {
            // Gone already: the previous holder released between our probe
            // and this check.
            return true;
        };
        let Ok(mtime) = meta.modified() else {
            return false;
        };
        SystemTime::now()
            .duration_since(mtime)
            .map(|age| age > STALE_LOCK_AGE)
            .unwrap_or(false)
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            if let Err(err) = fs::remove_file(&self.lock_path) {
                if err.kind() != ErrorKind::NotFound {
                    warn!(lock = %self.lock_path.display(), %err, "failed to release lock");
                }
            }
        }
    }
}

/// Acquire locks for several files in canonical (lexicographic, absolute
/// path) order so concurrent multi-file mutations cannot deadlock.
pub fn lock_all(targets: &[PathBuf]) -> Result<Vec<FileLock>> {
    let mut sorted: Vec<&PathBuf> = targets.iter().collect();
    sorted.sort();
    sorted.dedup();
    let mut locks = Vec::with_capacity(sorted.len());
    for target in sorted {
        locks.push(FileLock::acquire(target)?);
    }
    Ok(locks)
}

/// Write `content` to `path` atomically: sibling temp file, fsync, rename,
/// then fsync the directory so the rename itself is durable.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| ZeusError::Internal(format!("no parent for {}", path.display())))?;
    fs::create_dir_all(parent)?;

    let tmp = parent.join(format!(
        ".{}.{}.tmp",
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        Uuid::new_v4().simple()
    ));
    let mut file = File::create(&tmp)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;
    drop(file);

    if let Err(err) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(err.into());
    }

    #[cfg(unix)]
    {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}

/// Serialize as YAML (UTF-8, LF, trailing newline) and write atomically.
pub fn write_yaml<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    let mut content = serde_yaml::to_string(record)?;
    if !content.ends_with('\n') {
        content.push('\n');
    }
    write_atomic(path, &content)
}

/// Read and parse a YAML file. `NotFound` carries the path.
pub fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = read_to_string(path)?;
    Ok(serde_yaml::from_str(&content)?)
}

/// Read a YAML file that may legitimately not exist yet.
pub fn read_yaml_opt<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(serde_yaml::from_str(&content)?)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|err| {
        if err.kind() == ErrorKind::NotFound {
            ZeusError::NotFound(path.display().to_string())
        } else {
            err.into()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("vision.yaml");
        write_atomic(&target, "title: hello\n").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "title: hello\n");

        for entry in fs::read_dir(dir.path()).unwrap() {
            let name = entry.unwrap().file_name();
            let name = name.to_string_lossy();
            assert!(!name.ends_with(".tmp"), "leftover temp file {name}");
        }
    }

    #[test]
    fn yaml_round_trip_is_stable() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("actors.yaml");
        let mut record = BTreeMap::new();
        record.insert("title", "Operator");
        write_yaml(&target, &record).unwrap();
        let first = fs::read_to_string(&target).unwrap();

        let loaded: BTreeMap<String, String> = read_yaml(&target).unwrap();
        write_yaml(&target, &loaded).unwrap();
        let second = fs::read_to_string(&target).unwrap();
        assert_eq!(first, second);
        assert!(first.ends_with('\n'));
    }

    #[test]
    fn second_lock_on_same_file_fails() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("zeus.yaml");
        let _held = FileLock::acquire(&target).unwrap();
        let err = FileLock::acquire(&target).unwrap_err();
        match err {
            ZeusError::Locked { holder, .. } => {
                assert_eq!(holder, Some(std::process::id()));
            }
            other => panic!("expected Locked, got {other}"),
        }
    }

    #[test]
    fn lock_released_on_drop() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("zeus.yaml");
        {
            let _held = FileLock::acquire(&target).unwrap();
        }
        let _again = FileLock::acquire(&target).unwrap();
    }

    #[test]
    fn stale_lock_is_reclaimed() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("zeus.yaml");
        let lock_path = dir.path().join("zeus.yaml.lock");
        fs::write(&lock_path, "99999").unwrap();
        let old = SystemTime::now() - STALE_LOCK_AGE - Duration::from_secs(60);
        let file = File::options().write(true).open(&lock_path).unwrap();
        file.set_modified(old).unwrap();
        drop(file);

        let _lock = FileLock::acquire(&target).unwrap();
    }

    #[test]
    fn lock_all_orders_lexicographically() {
        let dir = TempDir::new().unwrap();
        let b = dir.path().join("b.yaml");
        let a = dir.path().join("a.yaml");
        let locks = lock_all(&[b.clone(), a.clone(), b]).unwrap();
        assert_eq!(locks.len(), 2);
        assert!(locks[0].path() < locks[1].path());
    }
}
