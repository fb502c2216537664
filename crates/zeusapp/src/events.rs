//! Process-local event bus.
//!
//! Producers are the entity store (entity changes), the snapshot engine and
//! the approval engine. Subscribers are dashboard clients. Fan-out uses a
//! bounded broadcast channel: a subscriber that falls more than the channel
//! capacity behind is lagged out by the channel rather than ever blocking a
//! producer; the server turns that lag into a disconnect with a lost marker.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

use crate::ctx::OpCtx;
use crate::error::Result;
use crate::model::Kind;

/// Per-subscriber queue bound.
pub const BUS_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Added,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalOp {
    Submitted,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    Entity {
        op: ChangeOp,
        kind: Kind,
        id: String,
        title: String,
    },
    Approval {
        op: ApprovalOp,
        proposal_id: String,
        kind: Kind,
    },
    Status {
        message: String,
    },
}

impl EventKind {
    /// SSE event name on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Entity { .. } => "entity",
            EventKind::Approval { .. } => "approval",
            EventKind::Status { .. } => "status",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BusEvent {
    pub seq: u64,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<BusEvent>,
    seq: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self {
            tx,
            seq: AtomicU64::new(0),
        }
    }

    /// Publish after the mutation committed. Cancellation is honoured before
    /// the publish so a cancelled operation emits nothing.
    pub fn publish(&self, ctx: &OpCtx, kind: EventKind) -> Result<u64> {
        ctx.check()?;
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let event = BusEvent {
            seq,
            at: Utc::now(),
            kind,
        };
        // No receivers is fine; the store does not care whether the
        // dashboard is running.
        let _ = self.tx.send(event);
        Ok(seq)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
