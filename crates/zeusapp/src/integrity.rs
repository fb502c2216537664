//! Cross-entity integrity: reference validation and cycle detection.
//!
//! One tri-colour depth-first traversal serves both cycle classes (Objective
//! parenting and UseCase relations). Traversal state is per invocation, so
//! concurrent readers can run checks independently.
//!
//! Integrity errors are never auto-fixed; the doctor only reports them.

use std::collections::HashMap;

use serde::Serialize;

use crate::ctx::OpCtx;
use crate::error::{Result, ZeusError};
use crate::model::{Entity, EntityId, Kind};
use crate::store::{ListFilter, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum IssueDetail {
    MissingReference {
        from: String,
        field: String,
        target: String,
    },
    WrongKind {
        from: String,
        field: String,
        target: String,
        expected: Kind,
    },
    Cycle {
        path: Vec<String>,
    },
    MissingOptionalReference {
        from: String,
        field: String,
        target: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct Issue {
    pub severity: Severity,
    #[serde(flatten)]
    pub detail: IssueDetail,
}

impl Issue {
    pub fn message(&self) -> String {
        match &self.detail {
            IssueDetail::MissingReference {
                from,
                field,
                target,
            } => format!("{from}.{field} references missing {target}"),
            IssueDetail::WrongKind {
                from,
                field,
                target,
                expected,
            } => format!("{from}.{field} references {target}, expected a {expected}"),
            IssueDetail::Cycle { path } => format!("cycle: {}", path.join(" -> ")),
            IssueDetail::MissingOptionalReference {
                from,
                field,
                target,
            } => format!("{from}.{field} references missing {target} (optional)"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IntegrityReport {
    pub issues: Vec<Issue>,
}

impl IntegrityReport {
    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    pub fn is_clean(&self) -> bool {
        self.error_count() == 0
    }
}

/// Full project check: every reference, both cycle classes.
pub fn check_all(store: &Store, ctx: &OpCtx) -> Result<IntegrityReport> {
    let entities = store.all_entities(ctx)?;
    let mut report = IntegrityReport::default();

    let by_id: HashMap<&EntityId, &Entity> =
        entities.iter().map(|e| (e.id(), e)).collect();

    for entity in &entities {
        ctx.check()?;
        for reference in entity.references() {
            if reference.target.kind() != reference.expected {
                report.issues.push(Issue {
                    severity: Severity::Error,
                    detail: IssueDetail::WrongKind {
                        from: entity.id().to_string(),
                        field: reference.field.to_string(),
                        target: reference.target.to_string(),
                        expected: reference.expected,
                    },
                });
                continue;
            }
            if by_id.contains_key(&reference.target) {
                continue;
            }
            let detail_from = entity.id().to_string();
            if reference.required {
                report.issues.push(Issue {
                    severity: Severity::Error,
                    detail: IssueDetail::MissingReference {
                        from: detail_from,
                        field: reference.field.to_string(),
                        target: reference.target.to_string(),
                    },
                });
            } else {
                report.issues.push(Issue {
                    severity: Severity::Warning,
                    detail: IssueDetail::MissingOptionalReference {
                        from: detail_from,
                        field: reference.field.to_string(),
                        target: reference.target.to_string(),
                    },
                });
            }
        }
    }

    for path in all_cycles(&objective_adjacency(&entities)) {
        report.issues.push(Issue {
            severity: Severity::Error,
            detail: IssueDetail::Cycle {
                path: path.iter().map(|id| id.to_string()).collect(),
            },
        });
    }
    for path in all_cycles(&usecase_adjacency(&entities)) {
        report.issues.push(Issue {
            severity: Severity::Error,
            detail: IssueDetail::Cycle {
                path: path.iter().map(|id| id.to_string()).collect(),
            },
        });
    }

    Ok(report)
}

/// Pre-write validation for one candidate entity: required references must
/// resolve to the right kind, and the write must not introduce a cycle.
/// Missing optional targets are tolerated here (they are warnings, not write
/// blockers).
pub fn validate_entity(store: &Store, ctx: &OpCtx, candidate: &Entity) -> Result<()> {
    for reference in candidate.references() {
        ctx.check()?;
        if reference.target.kind() != reference.expected {
            return Err(ZeusError::Reference {
                from: candidate.id().to_string(),
                field: reference.field.to_string(),
                target: reference.target.to_string(),
                problem: format!("expected a {}", reference.expected),
            });
        }
        if reference.target == *candidate.id() {
            return Err(ZeusError::Cycle {
                path: vec![candidate.id().to_string(), candidate.id().to_string()],
            });
        }
        match store.get(ctx, &reference.target) {
            Ok(_) => {}
            Err(ZeusError::NotFound(_)) if !reference.required => {}
            Err(ZeusError::NotFound(_)) => {
                return Err(ZeusError::Reference {
                    from: candidate.id().to_string(),
                    field: reference.field.to_string(),
                    target: reference.target.to_string(),
                    problem: "target does not exist".into(),
                });
            }
            Err(other) => return Err(other),
        }
    }

    match candidate.kind() {
        Kind::Objective => {
            let peers = store.list(ctx, Kind::Objective, &ListFilter::default())?;
            let mut adj = objective_adjacency(&peers);
            adj.insert(
                candidate.id().clone(),
                candidate.references().iter().map(|r| r.target.clone()).collect(),
            );
            if let Some(path) = cycle_from(candidate.id(), &adj) {
                return Err(ZeusError::Cycle {
                    path: path.iter().map(|id| id.to_string()).collect(),
                });
            }
        }
        Kind::UseCase => {
            let peers = store.list(ctx, Kind::UseCase, &ListFilter::default())?;
            let mut adj = usecase_adjacency(&peers);
            if let Entity::UseCase(uc) = candidate {
                adj.insert(
                    candidate.id().clone(),
                    uc.relations.iter().map(|l| l.target.clone()).collect(),
                );
            }
            if let Some(path) = cycle_from(candidate.id(), &adj) {
                return Err(ZeusError::Cycle {
                    path: path.iter().map(|id| id.to_string()).collect(),
                });
            }
        }
        _ => {}
    }
    Ok(())
}

/// All entities whose references point at `target`.
pub fn inbound_references(store: &Store, ctx: &OpCtx, target: &EntityId) -> Result<Vec<EntityId>> {
    let mut referrers = Vec::new();
    for entity in store.all_entities(ctx)? {
        ctx.check()?;
        if entity
            .references()
            .iter()
            .any(|r| r.target == *target)
        {
            referrers.push(entity.id().clone());
        }
    }
    Ok(referrers)
}

fn objective_adjacency(entities: &[Entity]) -> HashMap<EntityId, Vec<EntityId>> {
    entities
        .iter()
        .filter_map(|e| match e {
            Entity::Objective(obj) => Some((
                obj.id.clone(),
                obj.parent_id.iter().cloned().collect::<Vec<_>>(),
            )),
            _ => None,
        })
        .collect()
}

fn usecase_adjacency(entities: &[Entity]) -> HashMap<EntityId, Vec<EntityId>> {
    entities
        .iter()
        .filter_map(|e| match e {
            Entity::UseCase(uc) => Some((
                uc.id.clone(),
                uc.relations.iter().map(|l| l.target.clone()).collect(),
            )),
            _ => None,
        })
        .collect()
}

#[derive(Clone, Copy, PartialEq)]
enum Colour {
    White,
    Grey,
    Black,
}

/// Cycle reachable from `start`, as an ordered path with the entry node
/// repeated at the end (`[a, b, a]`).
fn cycle_from(start: &EntityId, adj: &HashMap<EntityId, Vec<EntityId>>) -> Option<Vec<EntityId>> {
    let mut colours: HashMap<&EntityId, Colour> =
        adj.keys().map(|id| (id, Colour::White)).collect();
    let mut stack = Vec::new();
    dfs(start, adj, &mut colours, &mut stack)
}

/// Cycles anywhere in the graph, one per strongly-entangled region.
fn all_cycles(adj: &HashMap<EntityId, Vec<EntityId>>) -> Vec<Vec<EntityId>> {
    let mut colours: HashMap<&EntityId, Colour> =
        adj.keys().map(|id| (id, Colour::White)).collect();
    let mut found = Vec::new();
    let mut roots: Vec<&EntityId> = adj.keys().collect();
    roots.sort();
    for root in roots {
        if colours.get(root) == Some(&Colour::White) {
            let mut stack = Vec::new();
            if let Some(path) = dfs(root, adj, &mut colours, &mut stack) {
                found.push(path);
            }
        }
    }
    found
}

fn dfs<'a>(
    node: &'a EntityId,
    adj: &'a HashMap<EntityId, Vec<EntityId>>,
    colours: &mut HashMap<&'a EntityId, Colour>,
    stack: &mut Vec<&'a EntityId>,
) -> Option<Vec<EntityId>> {
    colours.insert(node, Colour::Grey);
    stack.push(node);

    if let Some(nexts) = adj.get(node) {
        for next in nexts {
            match colours.get(next).copied() {
                // Targets outside the adjacency map (missing entities) are a
                // reference problem, not a cycle problem.
                None => continue,
                Some(Colour::White) => {
                    if let Some(path) = dfs(next, adj, colours, stack) {
                        return Some(path);
                    }
                }
                Some(Colour::Grey) => {
                    let pos = stack.iter().position(|n| *n == next).unwrap_or(0);
                    let mut path: Vec<EntityId> =
                        stack[pos..].iter().map(|n| (*n).clone()).collect();
                    path.push((*next).clone());
                    return Some(path);
                }
                Some(Colour::Black) => {}
            }
        }
    }

    stack.pop();
    colours.insert(node, Colour::Black);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init;
    use crate::store::FieldMap;
    use tempfile::TempDir;

    fn store() -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        let paths = init::initialize(dir.path(), Some("test")).unwrap();
        (dir, Store::open(paths).unwrap())
    }

    fn fields(pairs: &[(&str, &str)]) -> FieldMap {
        let mut map = FieldMap::new();
        for (k, v) in pairs {
            map.insert(
                serde_yaml::Value::String(k.to_string()),
                serde_yaml::Value::String(v.to_string()),
            );
        }
        map
    }

    #[test]
    fn objective_parent_cycle_is_rejected_with_ordered_path() {
        let (_dir, store) = store();
        let ctx = OpCtx::background();
        let o1 = store
            .add(&ctx, Kind::Objective, fields(&[("title", "O1")]))
            .unwrap();
        let o2 = store
            .add(
                &ctx,
                Kind::Objective,
                fields(&[("title", "O2"), ("parent_id", o1.id().as_str())]),
            )
            .unwrap();

        let before = std::fs::read_to_string(
            store.paths().entity_file(o1.id()).unwrap(),
        )
        .unwrap();

        let err = store
            .update(&ctx, o1.id(), fields(&[("parent_id", o2.id().as_str())]))
            .unwrap_err();
        match err {
            ZeusError::Cycle { path } => {
                assert_eq!(
                    path,
                    vec![
                        o1.id().to_string(),
                        o2.id().to_string(),
                        o1.id().to_string()
                    ]
                );
            }
            other => panic!("expected Cycle, got {other}"),
        }

        // Nothing was rewritten.
        let after = std::fs::read_to_string(
            store.paths().entity_file(o1.id()).unwrap(),
        )
        .unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn self_parent_is_a_cycle() {
        let (_dir, store) = store();
        let ctx = OpCtx::background();
        let o1 = store
            .add(&ctx, Kind::Objective, fields(&[("title", "O1")]))
            .unwrap();
        let err = store
            .update(&ctx, o1.id(), fields(&[("parent_id", o1.id().as_str())]))
            .unwrap_err();
        assert!(matches!(err, ZeusError::Cycle { .. }));
    }

    #[test]
    fn usecase_relation_cycle_is_rejected() {
        let (_dir, store) = store();
        let ctx = OpCtx::background();
        let obj = store
            .add(&ctx, Kind::Objective, fields(&[("title", "Goal")]))
            .unwrap();
        let a = store
            .add(
                &ctx,
                Kind::UseCase,
                fields(&[("title", "A"), ("objective_id", obj.id().as_str())]),
            )
            .unwrap();
        let b = store
            .add(
                &ctx,
                Kind::UseCase,
                fields(&[("title", "B"), ("objective_id", obj.id().as_str())]),
            )
            .unwrap();

        let mut patch = FieldMap::new();
        patch.insert(
            "relations".into(),
            serde_yaml::from_str(&format!(
                "[{{relation: include, target: {}}}]",
                b.id()
            ))
            .unwrap(),
        );
        store.update(&ctx, a.id(), patch).unwrap();

        let mut patch = FieldMap::new();
        patch.insert(
            "relations".into(),
            serde_yaml::from_str(&format!(
                "[{{relation: extend, target: {}}}]",
                a.id()
            ))
            .unwrap(),
        );
        let err = store.update(&ctx, b.id(), patch).unwrap_err();
        assert!(matches!(err, ZeusError::Cycle { .. }));
    }

    #[test]
    fn missing_subsystem_is_a_warning_not_an_error() {
        let (_dir, store) = store();
        let ctx = OpCtx::background();
        let obj = store
            .add(&ctx, Kind::Objective, fields(&[("title", "Goal")]))
            .unwrap();
        store
            .add(
                &ctx,
                Kind::UseCase,
                fields(&[
                    ("title", "Login"),
                    ("objective_id", obj.id().as_str()),
                    ("subsystem_id", "sub-deadbeef"),
                ]),
            )
            .unwrap();

        let report = check_all(&store, &ctx).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.warning_count(), 1);
    }

    #[test]
    fn wrong_kind_reference_is_an_error() {
        let (_dir, store) = store();
        let ctx = OpCtx::background();
        let obj = store
            .add(&ctx, Kind::Objective, fields(&[("title", "Goal")]))
            .unwrap();
        // An activity id where a usecase id belongs.
        let err = store
            .add(
                &ctx,
                Kind::UseCase,
                fields(&[
                    ("title", "Login"),
                    ("objective_id", obj.id().as_str()),
                    ("subsystem_id", "act-deadbeef"),
                ]),
            )
            .unwrap_err();
        assert!(matches!(err, ZeusError::Reference { .. }));
    }

    #[test]
    fn clean_project_reports_clean() {
        let (_dir, store) = store();
        let ctx = OpCtx::background();
        store
            .add(&ctx, Kind::Objective, fields(&[("title", "Goal")]))
            .unwrap();
        let report = check_all(&store, &ctx).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.warning_count(), 0);
    }
}
