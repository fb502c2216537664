//! Diagnostics: audit the project's health and script repairs for the
//! defects that are safe to heal.
//!
//! Only "file missing" / "default structure missing" classes are
//! auto-repairable. Integrity errors (dangling references, cycles) are
//! reported but never touched.

use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::info;

use crate::config::ZeusConfig;
use crate::ctx::OpCtx;
use crate::error::Result;
use crate::fsio::FileLock;
use crate::init;
use crate::integrity;
use crate::snapshot;
use crate::store::Store;

#[derive(Debug, Clone, Serialize)]
pub struct Check {
    pub name: &'static str,
    pub ok: bool,
    pub detail: String,
    /// What a repair would do, when one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repair: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DoctorReport {
    pub checks: Vec<Check>,
}

impl DoctorReport {
    pub fn healthy(&self) -> bool {
        self.checks.iter().all(|c| c.ok)
    }

    pub fn repairable(&self) -> impl Iterator<Item = &Check> {
        self.checks.iter().filter(|c| !c.ok && c.repair.is_some())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RepairAction {
    pub description: String,
    /// False in dry-run mode.
    pub applied: bool,
}

/// Run every audit. Read-only.
pub fn diagnose(store: &Store, ctx: &OpCtx) -> Result<DoctorReport> {
    ctx.check()?;
    let paths = store.paths();
    let mut report = DoctorReport::default();

    let config_ok = ZeusConfig::load(&paths.config_file());
    report.checks.push(match config_ok {
        Ok(_) => Check {
            name: "config",
            ok: true,
            detail: "zeus.yaml present and parseable".into(),
            repair: None,
        },
        Err(err) => {
            let missing = !paths.config_file().exists();
            Check {
                name: "config",
                ok: false,
                detail: err.to_string(),
                repair: missing.then(|| "recreate zeus.yaml with defaults".to_string()),
            }
        }
    });

    let missing_dirs: Vec<String> = paths
        .expected_dirs()
        .iter()
        .filter(|d| !d.is_dir())
        .map(|d| {
            d.strip_prefix(paths.root())
                .unwrap_or(d)
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    report.checks.push(Check {
        name: "layout",
        ok: missing_dirs.is_empty(),
        detail: if missing_dirs.is_empty() {
            "all directories present".into()
        } else {
            format!("missing: {}", missing_dirs.join(", "))
        },
        repair: (!missing_dirs.is_empty()).then(|| "create missing directories".to_string()),
    });

    let mut missing_files = Vec::new();
    for file in [
        paths.root().join("vision.yaml"),
        paths.root().join("actors.yaml"),
        paths.root().join("subsystems.yaml"),
        paths.root().join("constraints.yaml"),
        paths.current_state_file(),
        paths.change_log_file(),
    ] {
        if !file.is_file() {
            missing_files.push(
                file.strip_prefix(paths.root())
                    .unwrap_or(&file)
                    .to_string_lossy()
                    .into_owned(),
            );
        }
    }
    report.checks.push(Check {
        name: "defaults",
        ok: missing_files.is_empty(),
        detail: if missing_files.is_empty() {
            "default files present".into()
        } else {
            format!("missing: {}", missing_files.join(", "))
        },
        repair: (!missing_files.is_empty()).then(|| "recreate default files".to_string()),
    });

    match integrity::check_all(store, ctx) {
        Ok(integrity_report) => {
            let errors = integrity_report.error_count();
            let warnings = integrity_report.warning_count();
            report.checks.push(Check {
                name: "integrity",
                ok: errors == 0,
                detail: if errors == 0 && warnings == 0 {
                    "no issues".into()
                } else {
                    format!("{errors} error(s), {warnings} warning(s)")
                },
                // Integrity errors are never auto-recovered.
                repair: None,
            });
        }
        Err(err) => report.checks.push(Check {
            name: "integrity",
            ok: false,
            detail: format!("check failed: {err}"),
            repair: None,
        }),
    }

    let snapshots = snapshot::list(store, ctx)?;
    let recent = snapshots
        .first()
        .map(|s| Utc::now() - s.timestamp < Duration::days(30))
        .unwrap_or(false);
    report.checks.push(Check {
        name: "snapshots",
        ok: recent,
        detail: match snapshots.first() {
            Some(latest) => format!("latest snapshot {}", latest.name),
            None => "no snapshots yet".into(),
        },
        repair: (!recent).then(|| "take a fresh snapshot".to_string()),
    });

    Ok(report)
}

/// Apply (or, with `dry_run`, merely list) the scripted repairs for every
/// failing repairable check.
pub fn repair(store: &Store, ctx: &OpCtx, dry_run: bool) -> Result<Vec<RepairAction>> {
    ctx.check()?;
    let report = diagnose(store, ctx)?;
    let mut actions = Vec::new();

    let todo: Vec<&Check> = report.repairable().collect();
    if todo.is_empty() {
        return Ok(actions);
    }
    if dry_run {
        for check in todo {
            actions.push(RepairAction {
                description: check.repair.clone().unwrap_or_default(),
                applied: false,
            });
        }
        return Ok(actions);
    }

    let mut needs_snapshot = false;
    {
        let _write = FileLock::acquire(&store.paths().project_lock_target())?;
        for check in &todo {
            ctx.check()?;
            match check.name {
                "config" => {
                    let project = store
                        .paths()
                        .root()
                        .parent()
                        .and_then(|p| p.file_name())
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "project".into());
                    ZeusConfig::new(project).save(&store.paths().config_file())?;
                }
                "layout" | "defaults" => {
                    init::ensure_layout(store.paths())?;
                }
                "snapshots" => {
                    // Takes the project lock itself; deferred until release.
                    needs_snapshot = true;
                    continue;
                }
                other => {
                    tracing::warn!(check = other, "no repair routine");
                    continue;
                }
            }
            info!(check = check.name, "repaired");
            actions.push(RepairAction {
                description: check.repair.clone().unwrap_or_default(),
                applied: true,
            });
        }
    }
    if needs_snapshot {
        snapshot::create(store, ctx, Some("doctor"))?;
        actions.push(RepairAction {
            description: "take a fresh snapshot".into(),
            applied: true,
        });
    }

    Ok(actions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init;
    use tempfile::TempDir;

    fn store() -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        let paths = init::initialize(dir.path(), Some("test")).unwrap();
        (dir, Store::open(paths).unwrap())
    }

    #[test]
    fn fresh_project_fails_only_the_snapshot_check() {
        let (_dir, store) = store();
        let ctx = OpCtx::background();
        let report = diagnose(&store, &ctx).unwrap();
        let failing: Vec<_> = report.checks.iter().filter(|c| !c.ok).collect();
        assert_eq!(failing.len(), 1);
        assert_eq!(failing[0].name, "snapshots");
    }

    #[test]
    fn dry_run_reports_without_touching_disk() {
        let (_dir, store) = store();
        let ctx = OpCtx::background();
        std::fs::remove_dir_all(store.paths().root().join("risks")).unwrap();

        let actions = repair(&store, &ctx, true).unwrap();
        assert!(actions.iter().all(|a| !a.applied));
        assert!(!store.paths().root().join("risks").is_dir());
    }

    #[test]
    fn repair_recreates_missing_structure() {
        let (_dir, store) = store();
        let ctx = OpCtx::background();
        std::fs::remove_dir_all(store.paths().root().join("risks")).unwrap();
        std::fs::remove_file(store.paths().root().join("actors.yaml")).unwrap();

        let actions = repair(&store, &ctx, false).unwrap();
        assert!(actions.iter().any(|a| a.applied));
        assert!(store.paths().root().join("risks").is_dir());
        assert!(store.paths().root().join("actors.yaml").is_file());

        // After repair plus a snapshot, everything is green.
        let report = diagnose(&store, &ctx).unwrap();
        assert!(report.healthy());
    }

    #[test]
    fn integrity_problems_are_reported_but_not_repairable() {
        let (_dir, store) = store();
        let ctx = OpCtx::background();
        // Break a reference behind the store's back.
        std::fs::write(
            store.paths().root().join("usecases/uc-deadbeef.yaml"),
            "id: uc-deadbeef\ntitle: Broken\nobjective_id: obj-deadbeef\n\
             created_at: 2024-01-01T00:00:00Z\nupdated_at: 2024-01-01T00:00:00Z\n",
        )
        .unwrap();

        let report = diagnose(&store, &ctx).unwrap();
        let check = report
            .checks
            .iter()
            .find(|c| c.name == "integrity")
            .unwrap();
        assert!(!check.ok);
        assert!(check.repair.is_none());
    }
}
