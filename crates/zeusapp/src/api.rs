//! # API facade
//!
//! `ZeusApi` is the single entry point every client (CLI, dashboard server)
//! goes through. It is a thin dispatch layer: mutations are routed through
//! the approval engine, reads go straight to the store, analysis calls fan
//! out to the graph modules. No terminal or HTTP concerns live here.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::approval::{self, MutationOutcome, Proposal, ProposalOp};
use crate::config::AutomationLevel;
use crate::ctx::OpCtx;
use crate::doctor::{self, DoctorReport, RepairAction};
use crate::error::{Result, ZeusError};
use crate::events::EventBus;
use crate::graph::{self, layout, route, EntityGraph, GraphFilter};
use crate::integrity;
use crate::logs::{self, ChangeEntry};
use crate::model::{
    ActivityNode, ActivityTransition, Entity, EntityId, Kind, UseCaseRelation,
};
use crate::paths::ZeusPaths;
use crate::snapshot::{self, SnapshotInfo};
use crate::state::CurrentState;
use crate::store::{FieldMap, ListFilter, Store};

pub struct ZeusApi {
    store: Store,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub project: String,
    pub automation_level: AutomationLevel,
    pub counts: BTreeMap<&'static str, usize>,
    pub pending_proposals: usize,
    /// `ok`, `warnings` or `errors`.
    pub health: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_snapshot: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnifiedGraph {
    pub nodes: Vec<graph::GraphNode>,
    pub edges: Vec<graph::GraphEdge>,
    pub layout: layout::GraphLayout,
    pub routes: Vec<route::EdgeRoute>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UmlActor {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UmlUseCase {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subsystem_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UmlBoundary {
    pub subsystem_id: String,
    pub title: String,
    pub usecase_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UmlActorLink {
    pub actor_id: String,
    pub usecase_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UmlRelation {
    pub from: String,
    pub to: String,
    pub relation: UseCaseRelation,
}

#[derive(Debug, Clone, Serialize)]
pub struct UseCaseDiagram {
    pub actors: Vec<UmlActor>,
    pub usecases: Vec<UmlUseCase>,
    pub boundaries: Vec<UmlBoundary>,
    pub links: Vec<UmlActorLink>,
    pub relations: Vec<UmlRelation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityDiagram {
    pub id: String,
    pub title: String,
    pub nodes: Vec<ActivityNode>,
    pub transitions: Vec<ActivityTransition>,
}

impl ZeusApi {
    pub fn open(paths: ZeusPaths) -> Result<ZeusApi> {
        Ok(ZeusApi {
            store: Store::open(paths)?,
        })
    }

    /// Walk up from `cwd` to the nearest initialized project.
    pub fn discover(cwd: &Path) -> Result<ZeusApi> {
        let paths = ZeusPaths::discover(cwd).ok_or_else(|| {
            ZeusError::NotFound("no .zeus directory here or above (run `zeus init`)".into())
        })?;
        ZeusApi::open(paths)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn bus(&self) -> &EventBus {
        self.store.bus()
    }

    pub fn paths(&self) -> &ZeusPaths {
        self.store.paths()
    }

    // --- status ---

    pub fn status(&self, ctx: &OpCtx) -> Result<StatusReport> {
        let config = self.store.config()?;
        let mut counts = BTreeMap::new();
        for kind in Kind::ALL {
            counts.insert(kind.name(), self.store.count(ctx, kind)?);
        }
        let report = integrity::check_all(&self.store, ctx)?;
        let health = if report.error_count() > 0 {
            "errors"
        } else if report.warning_count() > 0 {
            "warnings"
        } else {
            "ok"
        };
        Ok(StatusReport {
            project: config.project,
            automation_level: config.automation_level,
            counts,
            pending_proposals: approval::pending(&self.store, ctx)?.len(),
            health: health.to_string(),
            last_snapshot: CurrentState::load_or_default(self.paths()).last_snapshot,
        })
    }

    // --- entity CRUD (mutations routed through the approval engine) ---

    pub fn add(&self, ctx: &OpCtx, kind: Kind, fields: FieldMap) -> Result<MutationOutcome> {
        approval::submit(&self.store, ctx, kind, ProposalOp::Add, None, fields)
    }

    pub fn update(&self, ctx: &OpCtx, id: &EntityId, patch: FieldMap) -> Result<MutationOutcome> {
        approval::submit(
            &self.store,
            ctx,
            id.kind(),
            ProposalOp::Update,
            Some(id.clone()),
            patch,
        )
    }

    pub fn delete(&self, ctx: &OpCtx, id: &EntityId) -> Result<MutationOutcome> {
        approval::submit(
            &self.store,
            ctx,
            id.kind(),
            ProposalOp::Delete,
            Some(id.clone()),
            FieldMap::new(),
        )
    }

    pub fn list(&self, ctx: &OpCtx, kind: Kind, filter: &ListFilter) -> Result<Vec<Entity>> {
        self.store.list(ctx, kind, filter)
    }

    pub fn get(&self, ctx: &OpCtx, id: &EntityId) -> Result<Entity> {
        self.store.get(ctx, id)
    }

    pub fn vision(&self, ctx: &OpCtx) -> Result<Entity> {
        self.store
            .list(ctx, Kind::Vision, &ListFilter::default())?
            .into_iter()
            .next()
            .ok_or_else(|| ZeusError::NotFound("vision".into()))
    }

    // --- approvals ---

    pub fn pending(&self, ctx: &OpCtx) -> Result<Vec<Proposal>> {
        approval::pending(&self.store, ctx)
    }

    pub fn approve(&self, ctx: &OpCtx, proposal_id: &str) -> Result<MutationOutcome> {
        approval::approve(&self.store, ctx, proposal_id)
    }

    pub fn reject(&self, ctx: &OpCtx, proposal_id: &str, reason: Option<&str>) -> Result<Proposal> {
        approval::reject(&self.store, ctx, proposal_id, reason)
    }

    // --- snapshots / history ---

    pub fn snapshot_create(&self, ctx: &OpCtx, label: Option<&str>) -> Result<SnapshotInfo> {
        snapshot::create(&self.store, ctx, label)
    }

    pub fn snapshot_list(&self, ctx: &OpCtx) -> Result<Vec<SnapshotInfo>> {
        snapshot::list(&self.store, ctx)
    }

    pub fn snapshot_restore(&self, ctx: &OpCtx, selector: &str) -> Result<SnapshotInfo> {
        snapshot::restore(&self.store, ctx, selector)
    }

    pub fn history(&self, _ctx: &OpCtx, limit: usize) -> Result<Vec<ChangeEntry>> {
        logs::read_recent(self.paths(), limit)
    }

    // --- diagnostics ---

    pub fn doctor(&self, ctx: &OpCtx) -> Result<DoctorReport> {
        doctor::diagnose(&self.store, ctx)
    }

    pub fn fix(&self, ctx: &OpCtx, dry_run: bool) -> Result<Vec<RepairAction>> {
        doctor::repair(&self.store, ctx, dry_run)
    }

    // --- analysis ---

    pub fn graph(&self, ctx: &OpCtx, filter: &GraphFilter) -> Result<EntityGraph> {
        let full = graph::build(&self.store, ctx)?;
        graph::apply_filter(&full, filter)
    }

    pub fn unified_graph(&self, ctx: &OpCtx, filter: &GraphFilter) -> Result<UnifiedGraph> {
        let graph = self.graph(ctx, filter)?;
        let layout = layout::layout(&graph);
        let routes = route::route(&graph, &layout);
        Ok(UnifiedGraph {
            nodes: graph.nodes,
            edges: graph.edges,
            layout,
            routes,
        })
    }

    pub fn uml_usecase(&self, ctx: &OpCtx) -> Result<UseCaseDiagram> {
        let actors = self.store.list(ctx, Kind::Actor, &ListFilter::default())?;
        let subsystems = self.store.list(ctx, Kind::Subsystem, &ListFilter::default())?;
        let usecases = self.store.list(ctx, Kind::UseCase, &ListFilter::default())?;

        let mut diagram = UseCaseDiagram {
            actors: actors
                .iter()
                .map(|a| UmlActor {
                    id: a.id().to_string(),
                    title: a.title().to_string(),
                })
                .collect(),
            usecases: Vec::new(),
            boundaries: Vec::new(),
            links: Vec::new(),
            relations: Vec::new(),
        };

        let mut by_subsystem: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for entity in &usecases {
            let Entity::UseCase(uc) = entity else {
                continue;
            };
            diagram.usecases.push(UmlUseCase {
                id: uc.id.to_string(),
                title: uc.title.clone(),
                subsystem_id: uc.subsystem_id.as_ref().map(|s| s.to_string()),
            });
            if let Some(subsystem) = &uc.subsystem_id {
                by_subsystem
                    .entry(subsystem.to_string())
                    .or_default()
                    .push(uc.id.to_string());
            }
            for actor in &uc.actor_ids {
                diagram.links.push(UmlActorLink {
                    actor_id: actor.to_string(),
                    usecase_id: uc.id.to_string(),
                });
            }
            for link in &uc.relations {
                diagram.relations.push(UmlRelation {
                    from: uc.id.to_string(),
                    to: link.target.to_string(),
                    relation: link.relation,
                });
            }
        }
        for entity in &subsystems {
            if let Some(ids) = by_subsystem.get(entity.id().as_str()) {
                diagram.boundaries.push(UmlBoundary {
                    subsystem_id: entity.id().to_string(),
                    title: entity.title().to_string(),
                    usecase_ids: ids.clone(),
                });
            }
        }
        Ok(diagram)
    }

    pub fn uml_activity(&self, ctx: &OpCtx, id: &EntityId) -> Result<ActivityDiagram> {
        match self.store.get(ctx, id)? {
            Entity::Activity(act) => Ok(ActivityDiagram {
                id: act.id.to_string(),
                title: act.title,
                nodes: act.nodes,
                transitions: act.transitions,
            }),
            other => Err(ZeusError::BadShape(format!(
                "{} is a {}, not an activity",
                other.id(),
                other.kind()
            ))),
        }
    }
}
