//! # Zeus Data Model
//!
//! The project model is a four-layer hierarchy (Vision → Objective → UseCase
//! → Activity) plus cross-cutting kinds (Actor, Subsystem, Consideration,
//! Decision, Risk, Problem, Assumption, Constraint, Quality).
//!
//! Every entity is a file-backed record with a stable [`EntityId`] of the
//! shape `<prefix>-<8 hex>`. The kind of an id is recoverable from its
//! prefix, so ids double as routing keys: given `uc-3fa9c1d2` the store knows
//! to look in `usecases/`.
//!
//! ## Storage layouts
//!
//! Kinds map to one of three on-disk layouts (see [`Layout`]):
//!
//! - **Singleton**: one well-known file (`vision.yaml`).
//! - **Directory**: one file per entity (`objectives/obj-*.yaml`).
//! - **ListFile**: all entities of the kind in one file (`actors.yaml`).
//!
//! The layout is a fixed property of the kind, never derived from user
//! input.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, ZeusError};

mod entities;

pub use entities::*;

/// Every entity kind Zeus knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Vision,
    Objective,
    UseCase,
    Activity,
    Actor,
    Subsystem,
    Consideration,
    Decision,
    Risk,
    Problem,
    Assumption,
    Constraint,
    Quality,
}

/// Where records of a kind live under `.zeus/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// A single well-known file holding one record.
    Singleton(&'static str),
    /// A directory with one file per entity, named `<id>.yaml`.
    Directory(&'static str),
    /// A single well-known file holding a list of records.
    ListFile(&'static str),
}

impl Kind {
    pub const ALL: [Kind; 13] = [
        Kind::Vision,
        Kind::Objective,
        Kind::UseCase,
        Kind::Activity,
        Kind::Actor,
        Kind::Subsystem,
        Kind::Consideration,
        Kind::Decision,
        Kind::Risk,
        Kind::Problem,
        Kind::Assumption,
        Kind::Constraint,
        Kind::Quality,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            Kind::Vision => "vision",
            Kind::Objective => "obj",
            Kind::UseCase => "uc",
            Kind::Activity => "act",
            Kind::Actor => "actor",
            Kind::Subsystem => "sub",
            Kind::Consideration => "cons",
            Kind::Decision => "dec",
            Kind::Risk => "risk",
            Kind::Problem => "prob",
            Kind::Assumption => "assum",
            Kind::Constraint => "const",
            Kind::Quality => "qual",
        }
    }

    pub fn layout(self) -> Layout {
        match self {
            Kind::Vision => Layout::Singleton("vision.yaml"),
            Kind::Objective => Layout::Directory("objectives"),
            Kind::UseCase => Layout::Directory("usecases"),
            Kind::Activity => Layout::Directory("activities"),
            Kind::Actor => Layout::ListFile("actors.yaml"),
            Kind::Subsystem => Layout::ListFile("subsystems.yaml"),
            Kind::Consideration => Layout::Directory("considerations"),
            Kind::Decision => Layout::Directory("decisions"),
            Kind::Risk => Layout::Directory("risks"),
            Kind::Problem => Layout::Directory("problems"),
            Kind::Assumption => Layout::Directory("assumptions"),
            Kind::Constraint => Layout::ListFile("constraints.yaml"),
            Kind::Quality => Layout::Directory("quality"),
        }
    }

    /// Kind name as used on the command line and in payloads.
    pub fn name(self) -> &'static str {
        match self {
            Kind::Vision => "vision",
            Kind::Objective => "objective",
            Kind::UseCase => "usecase",
            Kind::Activity => "activity",
            Kind::Actor => "actor",
            Kind::Subsystem => "subsystem",
            Kind::Consideration => "consideration",
            Kind::Decision => "decision",
            Kind::Risk => "risk",
            Kind::Problem => "problem",
            Kind::Assumption => "assumption",
            Kind::Constraint => "constraint",
            Kind::Quality => "quality",
        }
    }

    pub fn from_name(name: &str) -> Option<Kind> {
        Kind::ALL.iter().copied().find(|k| k.name() == name)
    }

    fn from_prefix(prefix: &str) -> Option<Kind> {
        Kind::ALL.iter().copied().find(|k| k.prefix() == prefix)
    }

    /// Decisions never change after creation.
    pub fn immutable(self) -> bool {
        matches!(self, Kind::Decision)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A validated entity id: `<prefix>-<8 lowercase hex/digit chars>`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn parse(raw: &str) -> Result<EntityId> {
        let (prefix, suffix) = raw
            .split_once('-')
            .ok_or_else(|| ZeusError::BadShape(raw.to_string()))?;
        if Kind::from_prefix(prefix).is_none()
            || suffix.len() != 8
            || !suffix
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(ZeusError::BadShape(raw.to_string()));
        }
        Ok(EntityId(raw.to_string()))
    }

    /// Build an id from a kind and a fresh 8-char suffix. The suffix shape is
    /// the minter's responsibility.
    pub(crate) fn assemble(kind: Kind, suffix: &str) -> EntityId {
        EntityId(format!("{}-{}", kind.prefix(), suffix))
    }

    pub fn kind(&self) -> Kind {
        let prefix = self.0.split_once('-').map(|(p, _)| p).unwrap_or_default();
        // The constructor guarantees a known prefix.
        Kind::from_prefix(prefix).unwrap_or(Kind::Vision)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        EntityId::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Workflow status shared by all kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    #[default]
    Draft,
    InProgress,
    Completed,
}

impl EntityStatus {
    pub fn name(self) -> &'static str {
        match self {
            EntityStatus::Draft => "draft",
            EntityStatus::InProgress => "in_progress",
            EntityStatus::Completed => "completed",
        }
    }
}
