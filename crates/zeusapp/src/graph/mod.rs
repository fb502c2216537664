//! # Graph analysis
//!
//! Builds a typed two-layer graph over Objectives, UseCases and Activities:
//!
//! - **Structural** edges shape the hierarchy, child → parent:
//!   Objective→Objective (`parent`), UseCase→Objective (`contributes`),
//!   Activity→UseCase (`implements`).
//! - **Reference** edges are cross-cutting: Activity→Activity
//!   (`depends_on`).
//!
//! Structural depth is recursive: roots are 0, children one more than their
//! parent. Mixed-kind chains are expected (an Activity under a UseCase under
//! an Objective sits at depth 2).
//!
//! Everything downstream (layout, routing, rendering) is deterministic given
//! the same input; ties always break by id.

use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};

use crate::ctx::OpCtx;
use crate::error::{Result, ZeusError};
use crate::model::{Entity, EntityId, EntityStatus, Kind};
use crate::store::{ListFilter, Store};

pub mod layout;
pub mod render;
pub mod route;

pub const DEFAULT_FOCUS_DEPTH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeLayer {
    Structural,
    Reference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeRelation {
    Parent,
    Contributes,
    Implements,
    DependsOn,
}

impl EdgeRelation {
    pub fn layer(self) -> EdgeLayer {
        match self {
            EdgeRelation::Parent | EdgeRelation::Contributes | EdgeRelation::Implements => {
                EdgeLayer::Structural
            }
            EdgeRelation::DependsOn => EdgeLayer::Reference,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub kind: Kind,
    pub title: String,
    pub status: EntityStatus,
    pub structural_depth: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub relation: EdgeRelation,
    pub layer: EdgeLayer,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EntityGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl EntityGraph {
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// View filters, all optional.
#[derive(Debug, Clone)]
pub struct GraphFilter {
    pub focus: Option<EntityId>,
    pub depth: usize,
    pub layers: Option<Vec<EdgeLayer>>,
    pub relations: Option<Vec<EdgeRelation>>,
    pub hide_completed: bool,
    pub hide_draft: bool,
}

impl Default for GraphFilter {
    fn default() -> Self {
        Self {
            focus: None,
            depth: DEFAULT_FOCUS_DEPTH,
            layers: None,
            relations: None,
            hide_completed: false,
            hide_draft: false,
        }
    }
}

/// Collect the three hierarchical kinds into a graph.
pub fn build(store: &Store, ctx: &OpCtx) -> Result<EntityGraph> {
    let mut entities = Vec::new();
    for kind in [Kind::Objective, Kind::UseCase, Kind::Activity] {
        ctx.check()?;
        entities.extend(store.list(ctx, kind, &ListFilter::default())?);
    }

    let ids: HashSet<&str> = entities.iter().map(|e| e.id().as_str()).collect();
    let mut edges = Vec::new();
    for entity in &entities {
        ctx.check()?;
        match entity {
            Entity::Objective(obj) => {
                if let Some(parent) = &obj.parent_id {
                    if ids.contains(parent.as_str()) {
                        edges.push(edge(&obj.id, parent, EdgeRelation::Parent));
                    }
                }
            }
            Entity::UseCase(uc) => {
                if ids.contains(uc.objective_id.as_str()) {
                    edges.push(edge(&uc.id, &uc.objective_id, EdgeRelation::Contributes));
                }
            }
            Entity::Activity(act) => {
                if let Some(uc) = &act.usecase_id {
                    if ids.contains(uc.as_str()) {
                        edges.push(edge(&act.id, uc, EdgeRelation::Implements));
                    }
                }
                for dep in &act.dependencies {
                    if ids.contains(dep.as_str()) {
                        edges.push(edge(&act.id, dep, EdgeRelation::DependsOn));
                    }
                }
            }
            _ => {}
        }
    }

    let depths = structural_depths(&entities, &edges);
    let mut nodes: Vec<GraphNode> = entities
        .iter()
        .map(|e| GraphNode {
            id: e.id().to_string(),
            kind: e.kind(),
            title: e.title().to_string(),
            status: e.status(),
            structural_depth: depths.get(e.id().as_str()).copied().unwrap_or(0),
        })
        .collect();

    nodes.sort_by(|a, b| a.id.cmp(&b.id));
    edges.sort_by(|a, b| {
        a.from
            .cmp(&b.from)
            .then_with(|| a.to.cmp(&b.to))
            .then_with(|| format!("{:?}", a.relation).cmp(&format!("{:?}", b.relation)))
    });
    Ok(EntityGraph { nodes, edges })
}

fn edge(from: &EntityId, to: &EntityId, relation: EdgeRelation) -> GraphEdge {
    GraphEdge {
        from: from.to_string(),
        to: to.to_string(),
        relation,
        layer: relation.layer(),
    }
}

/// Depth along structural child→parent edges. Roots are 0. A parent cycle
/// (already an integrity error) terminates at the revisited node.
fn structural_depths(entities: &[Entity], edges: &[GraphEdge]) -> HashMap<String, usize> {
    let parent_of: HashMap<&str, &str> = edges
        .iter()
        .filter(|e| e.layer == EdgeLayer::Structural)
        .map(|e| (e.from.as_str(), e.to.as_str()))
        .collect();

    let mut depths: HashMap<String, usize> = HashMap::new();
    for entity in entities {
        let mut chain = Vec::new();
        let mut current = entity.id().as_str();
        let mut seen = HashSet::new();
        while let Some(&parent) = parent_of.get(current) {
            if depths.contains_key(current) || !seen.insert(current) {
                break;
            }
            chain.push(current);
            current = parent;
        }
        let mut depth = depths.get(current).copied().unwrap_or(0);
        for node in chain.into_iter().rev() {
            depth += 1;
            depths.insert(node.to_string(), depth);
        }
        depths.entry(entity.id().to_string()).or_insert(0);
    }
    depths
}

/// Apply view filters. Unknown focus ids fail with `NotFound`.
pub fn apply_filter(graph: &EntityGraph, filter: &GraphFilter) -> Result<EntityGraph> {
    let mut edges: Vec<GraphEdge> = graph
        .edges
        .iter()
        .filter(|e| {
            filter
                .layers
                .as_ref()
                .map_or(true, |layers| layers.contains(&e.layer))
                && filter
                    .relations
                    .as_ref()
                    .map_or(true, |rels| rels.contains(&e.relation))
        })
        .cloned()
        .collect();

    let mut keep: HashSet<String> = graph
        .nodes
        .iter()
        .filter(|n| {
            !(filter.hide_completed && n.status == EntityStatus::Completed)
                && !(filter.hide_draft && n.status == EntityStatus::Draft)
        })
        .map(|n| n.id.clone())
        .collect();

    if let Some(focus) = &filter.focus {
        if graph.node(focus.as_str()).is_none() {
            return Err(ZeusError::NotFound(focus.to_string()));
        }
        let depth = filter.depth.max(1);
        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        for e in &edges {
            adjacency.entry(e.from.as_str()).or_default().push(e.to.as_str());
            adjacency.entry(e.to.as_str()).or_default().push(e.from.as_str());
        }

        let mut within: HashSet<String> = HashSet::new();
        let mut queue = VecDeque::new();
        within.insert(focus.to_string());
        queue.push_back((focus.to_string(), 0usize));
        while let Some((node, hops)) = queue.pop_front() {
            if hops == depth {
                continue;
            }
            for next in adjacency.get(node.as_str()).into_iter().flatten() {
                if within.insert((*next).to_string()) {
                    queue.push_back(((*next).to_string(), hops + 1));
                }
            }
        }
        keep.retain(|id| within.contains(id));
        // The focus itself survives status filters.
        keep.insert(focus.to_string());
    }

    edges.retain(|e| keep.contains(&e.from) && keep.contains(&e.to));
    let nodes = graph
        .nodes
        .iter()
        .filter(|n| keep.contains(&n.id))
        .cloned()
        .collect();
    Ok(EntityGraph { nodes, edges })
}
