//! Snapshots: point-in-time copies of the whole `.zeus/` tree.
//!
//! A snapshot is a directory under `state/snapshots/` named after its
//! timestamp (RFC 3339 with `:` replaced by `-` so the name is portable),
//! holding a full copy of the tree minus `state/snapshots/` itself plus a
//! `manifest.yaml`. Snapshots are immutable once written.
//!
//! Restore is an atomic directory swap: the snapshot is materialised into a
//! temporary sibling of `.zeus/`, the live tree is moved aside and the new
//! tree renamed into place. The displaced tree is kept as a snapshot
//! labelled `pre-restore auto-backup`, so nothing is ever silently lost. Any
//! failure before the final rename removes the partial tree and leaves the
//! project untouched.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use crate::ctx::OpCtx;
use crate::error::{Result, ZeusError};
use crate::events::EventKind;
use crate::fsio::{self, FileLock};
use crate::logs::{self, ChangeEntry};
use crate::state::CurrentState;
use crate::store::Store;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotInfo {
    /// Directory name under `state/snapshots/`.
    pub name: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

fn dir_name_for(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace(':', "-")
}

/// Copy `src` into `dst`, skipping `skip` (one absolute directory) and
/// transient files (`.lock`, `.tmp`).
fn copy_tree(ctx: &OpCtx, src: &Path, dst: &Path, skip: Option<&Path>) -> Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        ctx.check()?;
        let entry = entry?;
        let path = entry.path();
        if Some(path.as_path()) == skip {
            continue;
        }
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        if name_str.ends_with(".lock") || name_str.ends_with(".tmp") {
            continue;
        }
        let target = dst.join(&name);
        if entry.file_type()?.is_dir() {
            copy_tree(ctx, &path, &target, skip)?;
        } else {
            fs::copy(&path, &target)?;
        }
    }
    Ok(())
}

/// Create a snapshot of the current tree.
pub fn create(store: &Store, ctx: &OpCtx, label: Option<&str>) -> Result<SnapshotInfo> {
    ctx.check()?;
    let paths = store.paths();
    let _write = FileLock::acquire(&paths.project_lock_target())?;
    ctx.check()?;

    // Millisecond timestamps collide when snapshots land back to back; the
    // name is the identity, so nudge forward until it is free.
    let mut timestamp = Utc::now();
    let mut name = dir_name_for(timestamp);
    while paths.snapshots_dir().join(&name).exists() {
        timestamp += chrono::Duration::milliseconds(1);
        name = dir_name_for(timestamp);
    }
    let snapshot_dir = paths.snapshots_dir().join(&name);

    let snapshots_dir = paths.snapshots_dir();
    let result = (|| -> Result<()> {
        copy_tree(ctx, paths.root(), &snapshot_dir, Some(snapshots_dir.as_path()))?;
        let manifest = Manifest {
            timestamp,
            label: label.map(str::to_string),
        };
        fsio::write_yaml(&snapshot_dir.join("manifest.yaml"), &manifest)?;
        Ok(())
    })();
    if let Err(err) = result {
        let _ = fs::remove_dir_all(&snapshot_dir);
        return Err(err);
    }

    let mut state = CurrentState::load_or_default(paths);
    state.last_snapshot = Some(timestamp);
    state.save(paths)?;

    let entry = ChangeEntry::now("snapshot_created").with_detail(name.clone());
    if let Err(err) = logs::append(paths, &entry) {
        tracing::warn!(%err, "change log append failed");
    }
    store.bus().publish(
        ctx,
        EventKind::Status {
            message: format!("snapshot {name} created"),
        },
    )?;

    info!(snapshot = %name, "snapshot created");
    Ok(SnapshotInfo {
        name,
        timestamp,
        label: label.map(str::to_string),
    })
}

/// Snapshots newest-first.
pub fn list(store: &Store, ctx: &OpCtx) -> Result<Vec<SnapshotInfo>> {
    ctx.check()?;
    let dir = store.paths().snapshots_dir();
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut snapshots = Vec::new();
    for entry in fs::read_dir(&dir)? {
        ctx.check()?;
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let manifest: Option<Manifest> =
            fsio::read_yaml_opt(&entry.path().join("manifest.yaml"))?;
        let Some(manifest) = manifest else {
            // A half-written or foreign directory; not a snapshot.
            continue;
        };
        snapshots.push(SnapshotInfo {
            name,
            timestamp: manifest.timestamp,
            label: manifest.label,
        });
    }
    snapshots.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(snapshots)
}

fn find(store: &Store, ctx: &OpCtx, selector: &str) -> Result<SnapshotInfo> {
    list(store, ctx)?
        .into_iter()
        .find(|s| {
            s.name == selector
                || s.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true) == selector
                || s.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true) == selector
        })
        .ok_or_else(|| ZeusError::NotFound(format!("snapshot {selector}")))
}

/// Restore a snapshot by name or RFC 3339 timestamp.
pub fn restore(store: &Store, ctx: &OpCtx, selector: &str) -> Result<SnapshotInfo> {
    ctx.check()?;
    let paths = store.paths();
    let snapshot = find(store, ctx, selector)?;
    let snapshot_dir = paths.snapshots_dir().join(&snapshot.name);

    let _write = FileLock::acquire(&paths.project_lock_target())?;
    ctx.check()?;

    let parent = paths
        .root()
        .parent()
        .ok_or_else(|| ZeusError::Internal("project root has no parent".into()))?
        .to_path_buf();
    let token = Uuid::new_v4().simple().to_string();
    let staging = parent.join(format!(".zeus.restore-{token}.tmp"));
    let displaced = parent.join(format!(".zeus.old-{token}.tmp"));

    // Stage the snapshot as a full tree.
    let staged = (|| -> Result<()> {
        copy_tree(ctx, &snapshot_dir, &staging, None)?;
        // The manifest belongs to the snapshot, not to the live tree.
        let _ = fs::remove_file(staging.join("manifest.yaml"));
        fs::create_dir_all(staging.join("state"))?;
        // Carry the snapshot collection over into the new tree.
        fs::rename(paths.snapshots_dir(), staging.join("state").join("snapshots"))?;
        Ok(())
    })();
    if let Err(err) = staged {
        // Undo: put the snapshot collection back if it was already moved.
        let moved = staging.join("state").join("snapshots");
        if moved.is_dir() && !paths.snapshots_dir().exists() {
            let _ = fs::rename(&moved, paths.snapshots_dir());
        }
        let _ = fs::remove_dir_all(&staging);
        return Err(err);
    }

    // Commit point: two renames. After the second one the new tree is live.
    if let Err(err) = fs::rename(paths.root(), &displaced) {
        let moved = staging.join("state").join("snapshots");
        if moved.is_dir() {
            let _ = fs::rename(&moved, paths.snapshots_dir());
        }
        let _ = fs::remove_dir_all(&staging);
        return Err(err.into());
    }
    if let Err(err) = fs::rename(&staging, paths.root()) {
        // Put the original tree back; the project must never be left
        // headless and the snapshot collection must survive.
        let _ = fs::rename(&displaced, paths.root());
        let moved = staging.join("state").join("snapshots");
        if moved.is_dir() {
            let _ = fs::rename(&moved, paths.snapshots_dir());
        }
        let _ = fs::remove_dir_all(&staging);
        return Err(err.into());
    }

    // Keep the displaced tree as a labelled snapshot.
    let now = Utc::now();
    let backup_name = dir_name_for(now);
    let backup_dir = paths.snapshots_dir().join(&backup_name);
    let _ = fs::remove_dir_all(displaced.join("state").join("snapshots"));
    if fs::rename(&displaced, &backup_dir).is_ok() {
        let manifest = Manifest {
            timestamp: now,
            label: Some("pre-restore auto-backup".to_string()),
        };
        let _ = fsio::write_yaml(&backup_dir.join("manifest.yaml"), &manifest);
    }

    let mut state = CurrentState::load_or_default(paths);
    state.last_restore = Some(now);
    state.save(paths)?;

    let entry = ChangeEntry::now("snapshot_restored").with_detail(snapshot.name.clone());
    if let Err(err) = logs::append(paths, &entry) {
        tracing::warn!(%err, "change log append failed");
    }
    store.bus().publish(
        ctx,
        EventKind::Status {
            message: format!("snapshot {} restored", snapshot.name),
        },
    )?;

    info!(snapshot = %snapshot.name, "snapshot restored");
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctx::OpCtx;
    use crate::init;
    use crate::model::Kind;
    use crate::store::{FieldMap, ListFilter};
    use tempfile::TempDir;

    fn store() -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        let paths = init::initialize(dir.path(), Some("test")).unwrap();
        (dir, Store::open(paths).unwrap())
    }

    fn title(value: &str) -> FieldMap {
        let mut map = FieldMap::new();
        map.insert("title".into(), value.into());
        map
    }

    #[test]
    fn create_excludes_the_snapshot_collection_itself() {
        let (_dir, store) = store();
        let ctx = OpCtx::background();
        store.add(&ctx, Kind::Objective, title("Goal")).unwrap();

        let first = create(&store, &ctx, Some("one")).unwrap();
        let second = create(&store, &ctx, Some("two")).unwrap();

        let second_dir = store.paths().snapshots_dir().join(&second.name);
        assert!(second_dir.join("zeus.yaml").is_file());
        assert!(second_dir.join("objectives").is_dir());
        // The first snapshot must not be nested inside the second.
        assert!(!second_dir.join("state").join("snapshots").join(&first.name).exists());
    }

    #[test]
    fn list_is_newest_first() {
        let (_dir, store) = store();
        let ctx = OpCtx::background();
        create(&store, &ctx, Some("one")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        create(&store, &ctx, Some("two")).unwrap();

        let all = list(&store, &ctx).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].label.as_deref(), Some("two"));
        assert_eq!(all[1].label.as_deref(), Some("one"));
    }

    #[test]
    fn restore_brings_deleted_entities_back() {
        let (_dir, store) = store();
        let ctx = OpCtx::background();
        let obj = store.add(&ctx, Kind::Objective, title("Keep me")).unwrap();
        let snap = create(&store, &ctx, Some("pre-release")).unwrap();

        store.delete(&ctx, obj.id()).unwrap();
        assert!(store
            .list(&ctx, Kind::Objective, &ListFilter::default())
            .unwrap()
            .is_empty());

        restore(&store, &ctx, &snap.name).unwrap();

        let objectives = store
            .list(&ctx, Kind::Objective, &ListFilter::default())
            .unwrap();
        assert_eq!(objectives.len(), 1);
        assert_eq!(objectives[0].title(), "Keep me");
        assert_eq!(objectives[0].id(), obj.id());
    }

    #[test]
    fn restore_keeps_the_displaced_tree_as_backup() {
        let (_dir, store) = store();
        let ctx = OpCtx::background();
        let snap = create(&store, &ctx, None).unwrap();
        store.add(&ctx, Kind::Objective, title("Post-snapshot")).unwrap();

        restore(&store, &ctx, &snap.name).unwrap();

        let snapshots = list(&store, &ctx).unwrap();
        let backup = snapshots
            .iter()
            .find(|s| s.label.as_deref() == Some("pre-restore auto-backup"))
            .expect("backup snapshot missing");
        // The backup holds the tree as it was just before the restore.
        let backup_objectives = store
            .paths()
            .snapshots_dir()
            .join(&backup.name)
            .join("objectives");
        assert_eq!(std::fs::read_dir(backup_objectives).unwrap().count(), 1);
    }

    #[test]
    fn restore_unknown_snapshot_is_not_found() {
        let (_dir, store) = store();
        let ctx = OpCtx::background();
        let err = restore(&store, &ctx, "2020-01-01T00-00-00.000Z").unwrap_err();
        assert!(matches!(err, ZeusError::NotFound(_)));
    }

    #[test]
    fn restore_by_rfc3339_timestamp() {
        let (_dir, store) = store();
        let ctx = OpCtx::background();
        let snap = create(&store, &ctx, None).unwrap();
        let ts = snap.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true);
        restore(&store, &ctx, &ts).unwrap();
    }

    #[test]
    fn snapshot_then_restore_then_snapshot_is_stable() {
        let (_dir, store) = store();
        let ctx = OpCtx::background();
        store.add(&ctx, Kind::Objective, title("Stable")).unwrap();
        let snap = create(&store, &ctx, None).unwrap();
        restore(&store, &ctx, &snap.name).unwrap();
        let after = create(&store, &ctx, None).unwrap();

        let before_dir = store.paths().snapshots_dir().join(&snap.name);
        let after_dir = store.paths().snapshots_dir().join(&after.name);
        let read = |dir: &std::path::Path| {
            let mut names: Vec<String> = std::fs::read_dir(dir.join("objectives"))
                .unwrap()
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect();
            names.sort();
            names
        };
        assert_eq!(read(&before_dir), read(&after_dir));
    }
}
