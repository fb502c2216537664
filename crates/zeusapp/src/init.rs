//! Project initialization: create the default `.zeus/` tree.
//!
//! `initialize` is what `zeus init` runs; `ensure_layout` is the shared
//! repair routine the doctor also uses to recreate missing directories and
//! default files without touching anything that already exists.

use chrono::Utc;
use std::fs;
use std::path::Path;

use crate::config::ZeusConfig;
use crate::error::{Result, ZeusError};
use crate::fsio;
use crate::ids;
use crate::model::{Entity, EntityStatus, Kind, Layout, Vision};
use crate::paths::ZeusPaths;
use crate::state::CurrentState;

/// Create `.zeus/` in `project_dir`. Fails with `AlreadyExists` when the
/// directory is already initialized.
pub fn initialize(project_dir: &Path, project_name: Option<&str>) -> Result<ZeusPaths> {
    let paths = ZeusPaths::at(project_dir);
    if paths.config_file().exists() {
        return Err(ZeusError::AlreadyExists(format!(
            "{} is already initialized",
            paths.root().display()
        )));
    }

    let name = match project_name {
        Some(name) => name.to_string(),
        None => project_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string()),
    };

    fs::create_dir_all(paths.root())?;
    ZeusConfig::new(name).save(&paths.config_file())?;
    ensure_layout(&paths)?;
    Ok(paths)
}

/// Create whatever parts of the default tree are missing. Existing files are
/// left untouched. Returns the relative locations that were created.
pub fn ensure_layout(paths: &ZeusPaths) -> Result<Vec<String>> {
    let mut created = Vec::new();

    for dir in paths.expected_dirs() {
        if !dir.is_dir() {
            fs::create_dir_all(&dir)?;
            created.push(rel_name(paths, &dir));
        }
    }

    // Singleton and list files start out with defaults.
    for kind in Kind::ALL {
        match kind.layout() {
            Layout::Singleton(_) => {
                let file = paths.kind_container(kind);
                if !file.exists() {
                    let vision = default_vision()?;
                    fsio::write_yaml(&file, &vision.to_value()?)?;
                    created.push(rel_name(paths, &file));
                }
            }
            Layout::ListFile(_) => {
                let file = paths.kind_container(kind);
                if !file.exists() {
                    fsio::write_atomic(&file, "[]\n")?;
                    created.push(rel_name(paths, &file));
                }
            }
            Layout::Directory(_) => {}
        }
    }

    let state_file = paths.current_state_file();
    if !state_file.exists() {
        CurrentState::new().save(paths)?;
        created.push(rel_name(paths, &state_file));
    }

    let log_file = paths.change_log_file();
    if !log_file.exists() {
        fsio::write_atomic(&log_file, "")?;
        created.push(rel_name(paths, &log_file));
    }

    Ok(created)
}

fn default_vision() -> Result<Entity> {
    let now = Utc::now();
    Ok(Entity::Vision(Vision {
        id: ids::mint(Kind::Vision, |_| false)?,
        title: "Vision".to_string(),
        description: String::new(),
        status: EntityStatus::Draft,
        created_at: now,
        updated_at: now,
    }))
}

fn rel_name(paths: &ZeusPaths, path: &Path) -> String {
    path.strip_prefix(paths.root())
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}
