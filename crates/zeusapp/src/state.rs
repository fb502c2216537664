//! Project runtime state (`state/current.yaml`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fsio;
use crate::paths::ZeusPaths;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentState {
    pub schema_version: u32,
    pub initialized_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_snapshot: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_restore: Option<DateTime<Utc>>,
}

impl CurrentState {
    pub fn new() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            initialized_at: Utc::now(),
            last_snapshot: None,
            last_restore: None,
        }
    }

    pub fn load(paths: &ZeusPaths) -> Result<CurrentState> {
        fsio::read_yaml(&paths.current_state_file())
    }

    pub fn load_or_default(paths: &ZeusPaths) -> CurrentState {
        fsio::read_yaml_opt(&paths.current_state_file())
            .ok()
            .flatten()
            .unwrap_or_else(CurrentState::new)
    }

    pub fn save(&self, paths: &ZeusPaths) -> Result<()> {
        let file = paths.current_state_file();
        let _lock = crate::fsio::FileLock::acquire(&file)?;
        fsio::write_yaml(&file, self)
    }
}

impl Default for CurrentState {
    fn default() -> Self {
        Self::new()
    }
}
