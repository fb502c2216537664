//! Append-only change log (`logs/changes.jsonl`).
//!
//! One JSON object per line. The log is informational: `zeus history` reads
//! it newest-first and skips lines it cannot parse, so format drift never
//! breaks the tool.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;

use crate::error::Result;
use crate::fsio::FileLock;
use crate::model::Kind;
use crate::paths::ZeusPaths;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEntry {
    pub ts: DateTime<Utc>,
    pub op: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<Kind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposal_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ChangeEntry {
    pub fn now(op: impl Into<String>) -> Self {
        Self {
            ts: Utc::now(),
            op: op.into(),
            kind: None,
            id: None,
            title: None,
            proposal_id: None,
            detail: None,
        }
    }

    pub fn entity(op: impl Into<String>, kind: Kind, id: &str, title: &str) -> Self {
        let mut entry = Self::now(op);
        entry.kind = Some(kind);
        entry.id = Some(id.to_string());
        entry.title = Some(title.to_string());
        entry
    }

    pub fn proposal(op: impl Into<String>, kind: Kind, proposal_id: &str) -> Self {
        let mut entry = Self::now(op);
        entry.kind = Some(kind);
        entry.proposal_id = Some(proposal_id.to_string());
        entry
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Append one entry under the log's file lock.
pub fn append(paths: &ZeusPaths, entry: &ChangeEntry) -> Result<()> {
    let path = paths.change_log_file();
    let _lock = FileLock::acquire(&path)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut line = serde_json::to_string(entry)?;
    line.push('\n');
    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    file.write_all(line.as_bytes())?;
    file.flush()?;
    Ok(())
}

/// Newest-first entries, at most `limit`. Unparseable lines are skipped.
pub fn read_recent(paths: &ZeusPaths, limit: usize) -> Result<Vec<ChangeEntry>> {
    let path = paths.change_log_file();
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };
    let mut entries: Vec<ChangeEntry> = content
        .lines()
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect();
    entries.reverse();
    entries.truncate(limit);
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn append_and_read_back_newest_first() {
        let dir = TempDir::new().unwrap();
        let paths = ZeusPaths::at(dir.path());
        std::fs::create_dir_all(paths.logs_dir()).unwrap();

        append(
            &paths,
            &ChangeEntry::entity("added", Kind::Activity, "act-00000001", "First"),
        )
        .unwrap();
        append(
            &paths,
            &ChangeEntry::entity("deleted", Kind::Activity, "act-00000001", "First"),
        )
        .unwrap();

        let entries = read_recent(&paths, 10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].op, "deleted");
        assert_eq!(entries[1].op, "added");
    }

    #[test]
    fn junk_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let paths = ZeusPaths::at(dir.path());
        std::fs::create_dir_all(paths.logs_dir()).unwrap();
        std::fs::write(
            paths.change_log_file(),
            "not json\n{\"ts\":\"2024-01-01T00:00:00Z\",\"op\":\"added\"}\n",
        )
        .unwrap();

        let entries = read_recent(&paths, 10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].op, "added");
    }
}
