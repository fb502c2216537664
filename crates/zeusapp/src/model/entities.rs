//! Per-kind record types and the [`Entity`] sum type the store hands out.
//!
//! On disk every record is the bare struct serialized as YAML; the kind is
//! implied by the file's location, never stored as a tag. Legacy fields from
//! older project files (`progress`, `estimate_hours`, deliverable links) are
//! ignored on read and never written back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EntityId, EntityStatus, Kind};
use crate::error::{Result, ZeusError};

/// Severity / likelihood / confidence scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    #[default]
    Human,
    System,
}

/// Typed relation between two use cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UseCaseRelation {
    Include,
    Extend,
    Generalize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UseCaseLink {
    pub relation: UseCaseRelation,
    pub target: EntityId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityNodeType {
    Start,
    End,
    Action,
    Decision,
    Merge,
}

/// A node inside an activity's UML-style graph. Node ids are plain strings,
/// unique within the owning activity only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityNode {
    pub id: String,
    pub node_type: ActivityNodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityTransition {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guard: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vision {
    pub id: EntityId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: EntityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Objective {
    pub id: EntityId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub success_criteria: Vec<String>,
    #[serde(default)]
    pub status: EntityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UseCase {
    pub id: EntityId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub objective_id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subsystem_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actor_ids: Vec<EntityId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<UseCaseLink>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preconditions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub postconditions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub main_flow: Vec<String>,
    #[serde(default)]
    pub status: EntityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: EntityId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usecase_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<EntityId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<ActivityNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transitions: Vec<ActivityTransition>,
    #[serde(default)]
    pub status: EntityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: EntityId,
    pub title: String,
    #[serde(default)]
    pub role: ActorRole,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: EntityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subsystem {
    pub id: EntityId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: EntityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consideration {
    pub id: EntityId,
    pub title: String,
    #[serde(default)]
    pub context: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default)]
    pub status: EntityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub id: EntityId,
    pub title: String,
    pub consideration_id: EntityId,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub status: EntityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Risk {
    pub id: EntityId,
    pub title: String,
    #[serde(default)]
    pub severity: Level,
    #[serde(default)]
    pub likelihood: Level,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mitigation: Option<String>,
    #[serde(default)]
    pub status: EntityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    pub id: EntityId,
    pub title: String,
    #[serde(default)]
    pub impact: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective_id: Option<EntityId>,
    #[serde(default)]
    pub status: EntityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assumption {
    pub id: EntityId,
    pub title: String,
    #[serde(default)]
    pub confidence: Level,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective_id: Option<EntityId>,
    #[serde(default)]
    pub status: EntityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraint {
    pub id: EntityId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: EntityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quality {
    pub id: EntityId,
    pub title: String,
    #[serde(default)]
    pub metric: String,
    #[serde(default)]
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective_id: Option<EntityId>,
    #[serde(default)]
    pub status: EntityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An outbound reference held by an entity, used by the integrity checker
/// and by delete-time inbound scans.
#[derive(Debug, Clone)]
pub struct Reference {
    pub field: &'static str,
    pub target: EntityId,
    pub expected: Kind,
    pub required: bool,
}

/// Sum type over all entity kinds. The store hands these out; handlers know
/// the concrete kind from the id prefix or the file location.
#[derive(Debug, Clone)]
pub enum Entity {
    Vision(Vision),
    Objective(Objective),
    UseCase(UseCase),
    Activity(Activity),
    Actor(Actor),
    Subsystem(Subsystem),
    Consideration(Consideration),
    Decision(Decision),
    Risk(Risk),
    Problem(Problem),
    Assumption(Assumption),
    Constraint(Constraint),
    Quality(Quality),
}

impl Entity {
    pub fn kind(&self) -> Kind {
        match self {
            Entity::Vision(_) => Kind::Vision,
            Entity::Objective(_) => Kind::Objective,
            Entity::UseCase(_) => Kind::UseCase,
            Entity::Activity(_) => Kind::Activity,
            Entity::Actor(_) => Kind::Actor,
            Entity::Subsystem(_) => Kind::Subsystem,
            Entity::Consideration(_) => Kind::Consideration,
            Entity::Decision(_) => Kind::Decision,
            Entity::Risk(_) => Kind::Risk,
            Entity::Problem(_) => Kind::Problem,
            Entity::Assumption(_) => Kind::Assumption,
            Entity::Constraint(_) => Kind::Constraint,
            Entity::Quality(_) => Kind::Quality,
        }
    }

    pub fn id(&self) -> &EntityId {
        match self {
            Entity::Vision(e) => &e.id,
            Entity::Objective(e) => &e.id,
            Entity::UseCase(e) => &e.id,
            Entity::Activity(e) => &e.id,
            Entity::Actor(e) => &e.id,
            Entity::Subsystem(e) => &e.id,
            Entity::Consideration(e) => &e.id,
            Entity::Decision(e) => &e.id,
            Entity::Risk(e) => &e.id,
            Entity::Problem(e) => &e.id,
            Entity::Assumption(e) => &e.id,
            Entity::Constraint(e) => &e.id,
            Entity::Quality(e) => &e.id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Entity::Vision(e) => &e.title,
            Entity::Objective(e) => &e.title,
            Entity::UseCase(e) => &e.title,
            Entity::Activity(e) => &e.title,
            Entity::Actor(e) => &e.title,
            Entity::Subsystem(e) => &e.title,
            Entity::Consideration(e) => &e.title,
            Entity::Decision(e) => &e.title,
            Entity::Risk(e) => &e.title,
            Entity::Problem(e) => &e.title,
            Entity::Assumption(e) => &e.title,
            Entity::Constraint(e) => &e.title,
            Entity::Quality(e) => &e.title,
        }
    }

    pub fn status(&self) -> EntityStatus {
        match self {
            Entity::Vision(e) => e.status,
            Entity::Objective(e) => e.status,
            Entity::UseCase(e) => e.status,
            Entity::Activity(e) => e.status,
            Entity::Actor(e) => e.status,
            Entity::Subsystem(e) => e.status,
            Entity::Consideration(e) => e.status,
            Entity::Decision(e) => e.status,
            Entity::Risk(e) => e.status,
            Entity::Problem(e) => e.status,
            Entity::Assumption(e) => e.status,
            Entity::Constraint(e) => e.status,
            Entity::Quality(e) => e.status,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Entity::Vision(e) => e.created_at,
            Entity::Objective(e) => e.created_at,
            Entity::UseCase(e) => e.created_at,
            Entity::Activity(e) => e.created_at,
            Entity::Actor(e) => e.created_at,
            Entity::Subsystem(e) => e.created_at,
            Entity::Consideration(e) => e.created_at,
            Entity::Decision(e) => e.created_at,
            Entity::Risk(e) => e.created_at,
            Entity::Problem(e) => e.created_at,
            Entity::Assumption(e) => e.created_at,
            Entity::Constraint(e) => e.created_at,
            Entity::Quality(e) => e.created_at,
        }
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        match self {
            Entity::Vision(e) => e.updated_at,
            Entity::Objective(e) => e.updated_at,
            Entity::UseCase(e) => e.updated_at,
            Entity::Activity(e) => e.updated_at,
            Entity::Actor(e) => e.updated_at,
            Entity::Subsystem(e) => e.updated_at,
            Entity::Consideration(e) => e.updated_at,
            Entity::Decision(e) => e.updated_at,
            Entity::Risk(e) => e.updated_at,
            Entity::Problem(e) => e.updated_at,
            Entity::Assumption(e) => e.updated_at,
            Entity::Constraint(e) => e.updated_at,
            Entity::Quality(e) => e.updated_at,
        }
    }

    /// Serialize the inner record, without a kind tag.
    pub fn to_value(&self) -> Result<serde_yaml::Value> {
        let value = match self {
            Entity::Vision(e) => serde_yaml::to_value(e),
            Entity::Objective(e) => serde_yaml::to_value(e),
            Entity::UseCase(e) => serde_yaml::to_value(e),
            Entity::Activity(e) => serde_yaml::to_value(e),
            Entity::Actor(e) => serde_yaml::to_value(e),
            Entity::Subsystem(e) => serde_yaml::to_value(e),
            Entity::Consideration(e) => serde_yaml::to_value(e),
            Entity::Decision(e) => serde_yaml::to_value(e),
            Entity::Risk(e) => serde_yaml::to_value(e),
            Entity::Problem(e) => serde_yaml::to_value(e),
            Entity::Assumption(e) => serde_yaml::to_value(e),
            Entity::Constraint(e) => serde_yaml::to_value(e),
            Entity::Quality(e) => serde_yaml::to_value(e),
        };
        Ok(value?)
    }

    /// Deserialize a record of a known kind.
    pub fn from_value(kind: Kind, value: serde_yaml::Value) -> Result<Entity> {
        let entity = match kind {
            Kind::Vision => Entity::Vision(serde_yaml::from_value(value)?),
            Kind::Objective => Entity::Objective(serde_yaml::from_value(value)?),
            Kind::UseCase => Entity::UseCase(serde_yaml::from_value(value)?),
            Kind::Activity => Entity::Activity(serde_yaml::from_value(value)?),
            Kind::Actor => Entity::Actor(serde_yaml::from_value(value)?),
            Kind::Subsystem => Entity::Subsystem(serde_yaml::from_value(value)?),
            Kind::Consideration => Entity::Consideration(serde_yaml::from_value(value)?),
            Kind::Decision => Entity::Decision(serde_yaml::from_value(value)?),
            Kind::Risk => Entity::Risk(serde_yaml::from_value(value)?),
            Kind::Problem => Entity::Problem(serde_yaml::from_value(value)?),
            Kind::Assumption => Entity::Assumption(serde_yaml::from_value(value)?),
            Kind::Constraint => Entity::Constraint(serde_yaml::from_value(value)?),
            Kind::Quality => Entity::Quality(serde_yaml::from_value(value)?),
        };
        Ok(entity)
    }

    /// All outbound references this entity holds.
    pub fn references(&self) -> Vec<Reference> {
        let mut refs = Vec::new();
        let mut push = |field: &'static str, target: &EntityId, expected: Kind, required: bool| {
            refs.push(Reference {
                field,
                target: target.clone(),
                expected,
                required,
            });
        };
        match self {
            Entity::Objective(e) => {
                if let Some(parent) = &e.parent_id {
                    push("parent_id", parent, Kind::Objective, false);
                }
            }
            Entity::UseCase(e) => {
                push("objective_id", &e.objective_id, Kind::Objective, true);
                if let Some(sub) = &e.subsystem_id {
                    push("subsystem_id", sub, Kind::Subsystem, false);
                }
                for actor in &e.actor_ids {
                    push("actor_ids", actor, Kind::Actor, true);
                }
                for link in &e.relations {
                    push("relations", &link.target, Kind::UseCase, true);
                }
            }
            Entity::Activity(e) => {
                if let Some(uc) = &e.usecase_id {
                    push("usecase_id", uc, Kind::UseCase, false);
                }
                for dep in &e.dependencies {
                    push("dependencies", dep, Kind::Activity, true);
                }
            }
            Entity::Decision(e) => {
                push(
                    "consideration_id",
                    &e.consideration_id,
                    Kind::Consideration,
                    true,
                );
            }
            Entity::Risk(e) => {
                if let Some(obj) = &e.objective_id {
                    push("objective_id", obj, Kind::Objective, false);
                }
            }
            Entity::Problem(e) => {
                if let Some(obj) = &e.objective_id {
                    push("objective_id", obj, Kind::Objective, false);
                }
            }
            Entity::Assumption(e) => {
                if let Some(obj) = &e.objective_id {
                    push("objective_id", obj, Kind::Objective, false);
                }
            }
            Entity::Quality(e) => {
                if let Some(obj) = &e.objective_id {
                    push("objective_id", obj, Kind::Objective, false);
                }
            }
            Entity::Vision(_)
            | Entity::Actor(_)
            | Entity::Subsystem(_)
            | Entity::Consideration(_)
            | Entity::Constraint(_) => {}
        }
        refs
    }

    /// Kind-local shape checks that need no other entities: activity graphs
    /// must only wire declared nodes, and node ids must be unique.
    pub fn validate_shape(&self) -> Result<()> {
        if let Entity::Activity(act) = self {
            let mut seen = std::collections::HashSet::new();
            for node in &act.nodes {
                if !seen.insert(node.id.as_str()) {
                    return Err(ZeusError::Conflict(format!(
                        "{}: duplicate activity node '{}'",
                        act.id, node.id
                    )));
                }
            }
            for tr in &act.transitions {
                for end in [&tr.from, &tr.to] {
                    if !seen.contains(end.as_str()) {
                        return Err(ZeusError::Reference {
                            from: act.id.to_string(),
                            field: "transitions".into(),
                            target: end.clone(),
                            problem: "transition endpoint is not a declared node".into(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        match self {
            Entity::Vision(e) => e.updated_at = now,
            Entity::Objective(e) => e.updated_at = now,
            Entity::UseCase(e) => e.updated_at = now,
            Entity::Activity(e) => e.updated_at = now,
            Entity::Actor(e) => e.updated_at = now,
            Entity::Subsystem(e) => e.updated_at = now,
            Entity::Consideration(e) => e.updated_at = now,
            Entity::Decision(e) => e.updated_at = now,
            Entity::Risk(e) => e.updated_at = now,
            Entity::Problem(e) => e.updated_at = now,
            Entity::Assumption(e) => e.updated_at = now,
            Entity::Constraint(e) => e.updated_at = now,
            Entity::Quality(e) => e.updated_at = now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activity(nodes: Vec<ActivityNode>, transitions: Vec<ActivityTransition>) -> Entity {
        let now = Utc::now();
        Entity::Activity(Activity {
            id: EntityId::parse("act-00000001").unwrap(),
            title: "Ship".into(),
            description: String::new(),
            usecase_id: None,
            dependencies: vec![],
            nodes,
            transitions,
            status: EntityStatus::Draft,
            created_at: now,
            updated_at: now,
        })
    }

    fn node(id: &str, node_type: ActivityNodeType) -> ActivityNode {
        ActivityNode {
            id: id.into(),
            node_type,
            label: None,
        }
    }

    #[test]
    fn activity_shape_accepts_wired_graph() {
        let act = activity(
            vec![
                node("start", ActivityNodeType::Start),
                node("build", ActivityNodeType::Action),
                node("end", ActivityNodeType::End),
            ],
            vec![
                ActivityTransition {
                    from: "start".into(),
                    to: "build".into(),
                    guard: None,
                },
                ActivityTransition {
                    from: "build".into(),
                    to: "end".into(),
                    guard: Some("tests pass".into()),
                },
            ],
        );
        act.validate_shape().unwrap();
    }

    #[test]
    fn activity_shape_rejects_dangling_transition() {
        let act = activity(
            vec![node("start", ActivityNodeType::Start)],
            vec![ActivityTransition {
                from: "start".into(),
                to: "ghost".into(),
                guard: None,
            }],
        );
        let err = act.validate_shape().unwrap_err();
        assert!(matches!(err, ZeusError::Reference { .. }));
    }

    #[test]
    fn legacy_fields_are_ignored_on_read() {
        let yaml = "\
id: obj-00000001
title: Legacy
description: carried over
progress: 40
estimate_hours: 12
created_at: 2024-01-01T00:00:00Z
updated_at: 2024-01-01T00:00:00Z
";
        let value: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
        let entity = Entity::from_value(Kind::Objective, value).unwrap();
        let out = serde_yaml::to_string(&entity.to_value().unwrap()).unwrap();
        assert!(!out.contains("progress"));
        assert!(!out.contains("estimate_hours"));
    }

    #[test]
    fn usecase_references_include_required_objective() {
        let now = Utc::now();
        let uc = Entity::UseCase(UseCase {
            id: EntityId::parse("uc-00000001").unwrap(),
            title: "Login".into(),
            description: String::new(),
            objective_id: EntityId::parse("obj-00000001").unwrap(),
            subsystem_id: Some(EntityId::parse("sub-00000001").unwrap()),
            actor_ids: vec![EntityId::parse("actor-0000001a").unwrap()],
            relations: vec![],
            preconditions: vec![],
            postconditions: vec![],
            main_flow: vec![],
            status: EntityStatus::Draft,
            created_at: now,
            updated_at: now,
        });
        let refs = uc.references();
        let obj = refs.iter().find(|r| r.field == "objective_id").unwrap();
        assert!(obj.required);
        let sub = refs.iter().find(|r| r.field == "subsystem_id").unwrap();
        assert!(!sub.required);
    }
}
