use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ZeusError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("{0} is immutable")]
    Immutable(String),

    #[error("{id} is still referenced by {}", referrers.join(", "))]
    StillReferenced { id: String, referrers: Vec<String> },

    #[error("Reference error: {from}.{field} -> {target}: {problem}")]
    Reference {
        from: String,
        field: String,
        target: String,
        problem: String,
    },

    #[error("Cycle detected: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("Path escapes the project root: {0}")]
    PathEscape(String),

    #[error("Path contains a forbidden character: {0:?}")]
    BadRune(String),

    #[error("Malformed id: {0}")]
    BadShape(String),

    #[error("Locked: {}", path.display())]
    Locked { path: PathBuf, holder: Option<u32> },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ZeusError {
    /// Process exit code for the CLI: 0 success, 2 user error, 3 integrity
    /// error, 4 conflict, 5 internal failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            ZeusError::NotFound(_)
            | ZeusError::AlreadyExists(_)
            | ZeusError::BadShape(_)
            | ZeusError::PathEscape(_)
            | ZeusError::BadRune(_) => 2,
            ZeusError::Reference { .. }
            | ZeusError::Cycle { .. }
            | ZeusError::StillReferenced { .. } => 3,
            ZeusError::Immutable(_)
            | ZeusError::Locked { .. }
            | ZeusError::Conflict(_)
            | ZeusError::Cancelled => 4,
            ZeusError::Io(_)
            | ZeusError::Yaml(_)
            | ZeusError::Json(_)
            | ZeusError::Internal(_) => 5,
        }
    }

    /// HTTP status for the dashboard: 400 malformed, 404 unknown, 409
    /// locked/immutable/conflict, 422 integrity violation, 500 internal.
    pub fn http_status(&self) -> u16 {
        match self {
            ZeusError::NotFound(_) => 404,
            ZeusError::AlreadyExists(_)
            | ZeusError::BadShape(_)
            | ZeusError::PathEscape(_)
            | ZeusError::BadRune(_) => 400,
            ZeusError::Reference { .. }
            | ZeusError::Cycle { .. }
            | ZeusError::StillReferenced { .. } => 422,
            ZeusError::Immutable(_)
            | ZeusError::Locked { .. }
            | ZeusError::Conflict(_)
            | ZeusError::Cancelled => 409,
            ZeusError::Io(_)
            | ZeusError::Yaml(_)
            | ZeusError::Json(_)
            | ZeusError::Internal(_) => 500,
        }
    }

    /// Stable machine-readable tag, used in HTTP error bodies.
    pub fn tag(&self) -> &'static str {
        match self {
            ZeusError::NotFound(_) => "not_found",
            ZeusError::AlreadyExists(_) => "already_exists",
            ZeusError::Immutable(_) => "immutable",
            ZeusError::StillReferenced { .. } => "still_referenced",
            ZeusError::Reference { .. } => "reference_error",
            ZeusError::Cycle { .. } => "cycle_error",
            ZeusError::PathEscape(_) => "path_escape",
            ZeusError::BadRune(_) => "bad_rune",
            ZeusError::BadShape(_) => "bad_shape",
            ZeusError::Locked { .. } => "locked",
            ZeusError::Conflict(_) => "conflict",
            ZeusError::Cancelled => "cancelled",
            ZeusError::Io(_) => "io",
            ZeusError::Yaml(_) | ZeusError::Json(_) => "serialization",
            ZeusError::Internal(_) => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, ZeusError>;
