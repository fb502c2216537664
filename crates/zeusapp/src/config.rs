//! Project configuration (`zeus.yaml`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::error::{Result, ZeusError};
use crate::fsio;

/// How mutations are routed through the approval engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AutomationLevel {
    /// Execute immediately, nothing persisted besides the change log.
    #[default]
    Auto,
    /// Execute immediately, record a completed proposal and a notification.
    Notify,
    /// Stage as a pending proposal; a human decides.
    Approve,
}

impl AutomationLevel {
    pub fn name(self) -> &'static str {
        match self {
            AutomationLevel::Auto => "auto",
            AutomationLevel::Notify => "notify",
            AutomationLevel::Approve => "approve",
        }
    }
}

impl FromStr for AutomationLevel {
    type Err = ZeusError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(AutomationLevel::Auto),
            "notify" => Ok(AutomationLevel::Notify),
            "approve" => Ok(AutomationLevel::Approve),
            other => Err(ZeusError::Conflict(format!(
                "unknown automation level '{other}' (expected auto, notify or approve)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZeusConfig {
    pub project: String,
    #[serde(default)]
    pub automation_level: AutomationLevel,
    pub created_at: DateTime<Utc>,
}

impl ZeusConfig {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            automation_level: AutomationLevel::Auto,
            created_at: Utc::now(),
        }
    }

    pub fn load(path: &Path) -> Result<ZeusConfig> {
        fsio::read_yaml(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fsio::write_yaml(path, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn config_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("zeus.yaml");
        let mut config = ZeusConfig::new("demo");
        config.automation_level = AutomationLevel::Approve;
        config.save(&path).unwrap();

        let loaded = ZeusConfig::load(&path).unwrap();
        assert_eq!(loaded.project, "demo");
        assert_eq!(loaded.automation_level, AutomationLevel::Approve);
    }

    #[test]
    fn automation_level_parses() {
        assert_eq!(
            "notify".parse::<AutomationLevel>().unwrap(),
            AutomationLevel::Notify
        );
        assert!("yolo".parse::<AutomationLevel>().is_err());
    }
}
