//! Approval engine: staged mutations.
//!
//! A mutation is a typed proposal `{kind, operation, entity_id?, fields}`.
//! The project's `automation_level` decides its route:
//!
//! - `auto`: execute immediately, nothing persisted beyond the change log.
//! - `notify`: execute immediately, keep a completed record under
//!   `approvals/approved/` and a notification in the change log.
//! - `approve`: persist under `approvals/pending/` and wait for a human.
//!
//! Lifecycle transitions (`approve`, `reject`) hold the proposal's own file
//! lock so two reviewers cannot decide the same proposal twice; execution
//! itself runs under the project write lock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

use crate::config::AutomationLevel;
use crate::ctx::OpCtx;
use crate::error::{Result, ZeusError};
use crate::events::{ApprovalOp, EventKind};
use crate::fsio::{self, FileLock};
use crate::logs::{self, ChangeEntry};
use crate::model::{Entity, EntityId, Kind};
use crate::store::{FieldMap, Store};

pub const PROPOSAL_PREFIX: &str = "prop";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalOp {
    Add,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ProposalStatus {
    fn dir(self) -> &'static str {
        match self {
            ProposalStatus::Pending => "pending",
            ProposalStatus::Approved => "approved",
            ProposalStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub id: String,
    pub kind: Kind,
    pub operation: ProposalOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "FieldMap::is_empty")]
    pub fields: FieldMap,
    pub status: ProposalStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// What a submitted mutation turned into.
#[derive(Debug, Clone)]
pub enum MutationOutcome {
    /// Executed immediately (`auto` / `notify`).
    Executed(Entity),
    /// A delete executed immediately.
    Deleted(EntityId),
    /// Staged; carries the proposal id.
    Pending(String),
}

fn mint_proposal_id() -> String {
    format!(
        "{PROPOSAL_PREFIX}-{}",
        &Uuid::new_v4().simple().to_string()[..8]
    )
}

fn validate_proposal_id(id: &str) -> Result<()> {
    match id.split_once('-') {
        Some((PROPOSAL_PREFIX, suffix))
            if suffix.len() == 8
                && suffix
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()) =>
        {
            Ok(())
        }
        _ => Err(ZeusError::BadShape(id.to_string())),
    }
}

fn proposal_file(store: &Store, status: ProposalStatus, id: &str) -> Result<PathBuf> {
    validate_proposal_id(id)?;
    store
        .paths()
        .resolve(&format!("approvals/{}/{id}.yaml", status.dir()))
}

fn write_proposal(store: &Store, proposal: &Proposal) -> Result<()> {
    let path = proposal_file(store, proposal.status, &proposal.id)?;
    fsio::write_yaml(&path, proposal)
}

fn execute(store: &Store, ctx: &OpCtx, proposal: &Proposal) -> Result<MutationOutcome> {
    match proposal.operation {
        ProposalOp::Add => {
            let entity = store.add(ctx, proposal.kind, proposal.fields.clone())?;
            Ok(MutationOutcome::Executed(entity))
        }
        ProposalOp::Update => {
            let id = proposal
                .entity_id
                .as_ref()
                .ok_or_else(|| ZeusError::BadShape("update proposal without entity_id".into()))?;
            let entity = store.update(ctx, id, proposal.fields.clone())?;
            Ok(MutationOutcome::Executed(entity))
        }
        ProposalOp::Delete => {
            let id = proposal
                .entity_id
                .as_ref()
                .ok_or_else(|| ZeusError::BadShape("delete proposal without entity_id".into()))?;
            store.delete(ctx, id)?;
            Ok(MutationOutcome::Deleted(id.clone()))
        }
    }
}

/// Route a mutation according to the project's automation level.
pub fn submit(
    store: &Store,
    ctx: &OpCtx,
    kind: Kind,
    operation: ProposalOp,
    entity_id: Option<EntityId>,
    fields: FieldMap,
) -> Result<MutationOutcome> {
    ctx.check()?;
    let level = store.config()?.automation_level;
    let proposal = Proposal {
        id: mint_proposal_id(),
        kind,
        operation,
        entity_id,
        fields,
        status: ProposalStatus::Pending,
        created_at: Utc::now(),
        decided_at: None,
        reason: None,
    };

    match level {
        AutomationLevel::Auto => execute(store, ctx, &proposal),
        AutomationLevel::Notify => {
            let outcome = execute(store, ctx, &proposal)?;
            let mut record = proposal;
            record.status = ProposalStatus::Approved;
            record.decided_at = Some(Utc::now());
            write_proposal(store, &record)?;
            let entry = ChangeEntry::proposal("notify", kind, &record.id)
                .with_detail(format!("{:?} executed without review", record.operation));
            if let Err(err) = logs::append(store.paths(), &entry) {
                tracing::warn!(%err, "change log append failed");
            }
            Ok(outcome)
        }
        AutomationLevel::Approve => {
            write_proposal(store, &proposal)?;
            let entry = ChangeEntry::proposal("proposed", kind, &proposal.id);
            if let Err(err) = logs::append(store.paths(), &entry) {
                tracing::warn!(%err, "change log append failed");
            }
            store.bus().publish(
                ctx,
                EventKind::Approval {
                    op: ApprovalOp::Submitted,
                    proposal_id: proposal.id.clone(),
                    kind,
                },
            )?;
            info!(proposal = %proposal.id, "mutation staged for approval");
            Ok(MutationOutcome::Pending(proposal.id))
        }
    }
}

/// Pending proposals, oldest first.
pub fn pending(store: &Store, ctx: &OpCtx) -> Result<Vec<Proposal>> {
    list(store, ctx, ProposalStatus::Pending)
}

pub fn list(store: &Store, ctx: &OpCtx, status: ProposalStatus) -> Result<Vec<Proposal>> {
    ctx.check()?;
    let dir = store.paths().approvals_dir().join(status.dir());
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut proposals = Vec::new();
    for entry in fs::read_dir(&dir)? {
        ctx.check()?;
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.ends_with(".yaml") {
            continue;
        }
        if let Some(proposal) = fsio::read_yaml_opt::<Proposal>(&entry.path())? {
            proposals.push(proposal);
        }
    }
    proposals.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    Ok(proposals)
}

pub fn get(store: &Store, ctx: &OpCtx, id: &str) -> Result<Proposal> {
    ctx.check()?;
    validate_proposal_id(id)?;
    for status in [
        ProposalStatus::Pending,
        ProposalStatus::Approved,
        ProposalStatus::Rejected,
    ] {
        let path = proposal_file(store, status, id)?;
        if let Some(proposal) = fsio::read_yaml_opt::<Proposal>(&path)? {
            return Ok(proposal);
        }
    }
    Err(ZeusError::NotFound(id.to_string()))
}

/// Approve a pending proposal: move it to `approved/`, then execute the
/// mutation under the project write lock. Approving the same proposal twice
/// yields `Conflict`.
pub fn approve(store: &Store, ctx: &OpCtx, id: &str) -> Result<MutationOutcome> {
    ctx.check()?;
    let pending_path = proposal_file(store, ProposalStatus::Pending, id)?;
    let _lifecycle = FileLock::acquire(&pending_path)?;
    ctx.check()?;

    let Some(mut proposal) = fsio::read_yaml_opt::<Proposal>(&pending_path)? else {
        // Decided already, or never existed.
        return match get(store, ctx, id) {
            Ok(decided) => Err(ZeusError::Conflict(format!(
                "{id} was already {}",
                match decided.status {
                    ProposalStatus::Approved => "approved",
                    ProposalStatus::Rejected => "rejected",
                    ProposalStatus::Pending => "decided",
                }
            ))),
            Err(err) => Err(err),
        };
    };

    let _write = FileLock::acquire(&store.paths().project_lock_target())?;
    ctx.check()?;

    proposal.status = ProposalStatus::Approved;
    proposal.decided_at = Some(Utc::now());
    write_proposal(store, &proposal)?;
    fs::remove_file(&pending_path)?;

    let outcome = execute(store, ctx, &proposal);
    if let Err(err) = &outcome {
        // The decision stands; record why the execution failed.
        proposal.reason = Some(err.to_string());
        write_proposal(store, &proposal)?;
    }

    let entry = ChangeEntry::proposal("approved", proposal.kind, &proposal.id);
    if let Err(err) = logs::append(store.paths(), &entry) {
        tracing::warn!(%err, "change log append failed");
    }
    store.bus().publish(
        ctx,
        EventKind::Approval {
            op: ApprovalOp::Approved,
            proposal_id: proposal.id.clone(),
            kind: proposal.kind,
        },
    )?;
    info!(proposal = %proposal.id, "proposal approved");
    outcome
}

/// Reject a pending proposal. Never executes anything.
pub fn reject(store: &Store, ctx: &OpCtx, id: &str, reason: Option<&str>) -> Result<Proposal> {
    ctx.check()?;
    let pending_path = proposal_file(store, ProposalStatus::Pending, id)?;
    let _lifecycle = FileLock::acquire(&pending_path)?;
    ctx.check()?;

    let Some(mut proposal) = fsio::read_yaml_opt::<Proposal>(&pending_path)? else {
        return match get(store, ctx, id) {
            Ok(_) => Err(ZeusError::Conflict(format!("{id} was already decided"))),
            Err(err) => Err(err),
        };
    };

    proposal.status = ProposalStatus::Rejected;
    proposal.decided_at = Some(Utc::now());
    proposal.reason = reason.map(str::to_string);
    write_proposal(store, &proposal)?;
    fs::remove_file(&pending_path)?;

    let entry = ChangeEntry::proposal("rejected", proposal.kind, &proposal.id);
    if let Err(err) = logs::append(store.paths(), &entry) {
        tracing::warn!(%err, "change log append failed");
    }
    store.bus().publish(
        ctx,
        EventKind::Approval {
            op: ApprovalOp::Rejected,
            proposal_id: proposal.id.clone(),
            kind: proposal.kind,
        },
    )?;
    Ok(proposal)
}
