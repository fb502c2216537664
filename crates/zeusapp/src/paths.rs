//! Location of everything under `.zeus/`.
//!
//! All concrete paths funnel through [`ZeusPaths`]; relative locations are
//! resolved via the path guard, so nothing outside the root is reachable
//! even if an id or file name is attacker-shaped.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::guard;
use crate::model::{EntityId, Kind, Layout};

pub const ZEUS_DIR: &str = ".zeus";

#[derive(Debug, Clone)]
pub struct ZeusPaths {
    root: PathBuf,
}

impl ZeusPaths {
    /// The `.zeus/` directory inside `project_dir`.
    pub fn at(project_dir: &Path) -> ZeusPaths {
        ZeusPaths {
            root: project_dir.join(ZEUS_DIR),
        }
    }

    /// Walk up from `cwd` looking for an initialized `.zeus/` directory.
    pub fn discover(cwd: &Path) -> Option<ZeusPaths> {
        let mut dir = Some(cwd);
        while let Some(current) = dir {
            let candidate = current.join(ZEUS_DIR);
            if candidate.is_dir() {
                return Some(ZeusPaths { root: candidate });
            }
            dir = current.parent();
        }
        None
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }

    /// Guard-checked resolution of a relative location under the root.
    pub fn resolve(&self, rel: &str) -> Result<PathBuf> {
        guard::resolve(&self.root, rel)
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("zeus.yaml")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join("state")
    }

    pub fn current_state_file(&self) -> PathBuf {
        self.state_dir().join("current.yaml")
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        self.state_dir().join("snapshots")
    }

    pub fn approvals_dir(&self) -> PathBuf {
        self.root.join("approvals")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn change_log_file(&self) -> PathBuf {
        self.logs_dir().join("changes.jsonl")
    }

    /// Target whose sidecar lock is the coarse project write lock.
    pub fn project_lock_target(&self) -> PathBuf {
        self.state_dir().join("project")
    }

    /// The directory or file holding records of `kind`.
    pub fn kind_container(&self, kind: Kind) -> PathBuf {
        match kind.layout() {
            Layout::Singleton(file) | Layout::ListFile(file) => self.root.join(file),
            Layout::Directory(dir) => self.root.join(dir),
        }
    }

    /// The file an entity with this id lives in.
    pub fn entity_file(&self, id: &EntityId) -> Result<PathBuf> {
        self.resolve(&guard::entity_rel_path(id))
    }

    /// Every directory an initialized project is expected to have.
    pub fn expected_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = vec![
            self.root.clone(),
            self.state_dir(),
            self.snapshots_dir(),
            self.logs_dir(),
            self.approvals_dir().join("pending"),
            self.approvals_dir().join("approved"),
            self.approvals_dir().join("rejected"),
        ];
        for kind in Kind::ALL {
            if let Layout::Directory(dir) = kind.layout() {
                dirs.push(self.root.join(dir));
            }
        }
        dirs
    }
}
