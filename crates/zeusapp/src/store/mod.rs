//! # Entity store
//!
//! Uniform CRUD over every entity kind, routed through a handler registry
//! keyed by [`Kind`]. Adding a kind means registering one more handler; the
//! store itself never branches on concrete kinds except for two quirks that
//! live here (Decision immutability, the Vision singleton).
//!
//! ## Write semantics
//!
//! Every mutation validates references first, then acquires the entity's
//! file lock, writes through an atomic rename, appends to the change log and
//! finally publishes an event. Reads take no locks: they see a pre-write or
//! a post-write file, never a torn one.
//!
//! ## Retired ids
//!
//! Deleted ids are recorded in `state/retired.yaml` and the minter checks
//! both live and retired ids, so an id is never re-issued after a delete.

use std::collections::BTreeMap;

use crate::config::ZeusConfig;
use crate::ctx::OpCtx;
use crate::error::{Result, ZeusError};
use crate::events::{ChangeOp, EventBus, EventKind};
use crate::fsio::{self, FileLock};
use crate::ids;
use crate::integrity;
use crate::logs::{self, ChangeEntry};
use crate::model::{Entity, EntityId, EntityStatus, Kind};
use crate::paths::ZeusPaths;

mod handlers;

pub use handlers::KindHandler;

/// Patch / field bag for add and update. Top-level keys are field names.
pub type FieldMap = serde_yaml::Mapping;

const PROTECTED_FIELDS: [&str; 3] = ["id", "created_at", "updated_at"];

#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub status: Option<EntityStatus>,
}

pub struct Store {
    paths: ZeusPaths,
    registry: BTreeMap<Kind, Box<dyn KindHandler>>,
    bus: EventBus,
}

impl Store {
    /// Open an initialized project. The handler registry is populated here
    /// and read-only afterwards.
    pub fn open(paths: ZeusPaths) -> Result<Store> {
        if !paths.config_file().is_file() {
            return Err(ZeusError::NotFound(format!(
                "{} is not a zeus project (run `zeus init`)",
                paths.root().display()
            )));
        }
        let registry = handlers::registry()
            .into_iter()
            .map(|handler| (handler.kind(), handler))
            .collect();
        Ok(Store {
            paths,
            registry,
            bus: EventBus::new(),
        })
    }

    pub fn paths(&self) -> &ZeusPaths {
        &self.paths
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn config(&self) -> Result<ZeusConfig> {
        ZeusConfig::load(&self.paths.config_file())
    }

    fn handler(&self, kind: Kind) -> &dyn KindHandler {
        self.registry
            .get(&kind)
            .map(|h| h.as_ref())
            .unwrap_or_else(|| unreachable!("registry covers every kind"))
    }

    /// Create a new entity of `kind` from user-supplied fields. The id is
    /// minted here; `id`/timestamps in `fields` are rejected.
    pub fn add(&self, ctx: &OpCtx, kind: Kind, fields: FieldMap) -> Result<Entity> {
        ctx.check()?;
        if kind == Kind::Vision {
            return Err(ZeusError::AlreadyExists(
                "vision is a singleton created at init; update it instead".into(),
            ));
        }
        for key in PROTECTED_FIELDS {
            if fields.contains_key(&serde_yaml::Value::from(key)) {
                return Err(ZeusError::BadShape(format!(
                    "field '{key}' cannot be supplied on add"
                )));
            }
        }

        let retired = self.retired_ids()?;
        let id = ids::mint(kind, |candidate| {
            retired.iter().any(|r| r == candidate.as_str())
                || self.get(ctx, candidate).is_ok()
        })?;

        let now = chrono::Utc::now();
        let mut merged = FieldMap::new();
        merged.insert("id".into(), serde_yaml::Value::String(id.to_string()));
        merged.insert(
            "created_at".into(),
            serde_yaml::to_value(now).map_err(ZeusError::Yaml)?,
        );
        merged.insert(
            "updated_at".into(),
            serde_yaml::to_value(now).map_err(ZeusError::Yaml)?,
        );
        for (key, value) in fields {
            merged.insert(key, value);
        }

        let entity = Entity::from_value(kind, serde_yaml::Value::Mapping(merged))
            .map_err(|err| ZeusError::BadShape(format!("{}: {err}", kind.name())))?;
        entity.validate_shape()?;
        integrity::validate_entity(self, ctx, &entity)?;

        self.handler(kind).persist(&self.paths, ctx, &entity)?;
        self.log_entity("added", &entity);
        self.publish_entity(ctx, ChangeOp::Added, &entity)?;
        Ok(entity)
    }

    /// Entities of one kind. Finite and safe to re-invoke; ordering is
    /// deterministic (creation time, then id).
    pub fn list(&self, ctx: &OpCtx, kind: Kind, filter: &ListFilter) -> Result<Vec<Entity>> {
        ctx.check()?;
        let mut entities = self.handler(kind).load_all(&self.paths, ctx)?;
        if let Some(status) = filter.status {
            entities.retain(|e| e.status() == status);
        }
        entities.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        Ok(entities)
    }

    pub fn get(&self, ctx: &OpCtx, id: &EntityId) -> Result<Entity> {
        self.handler(id.kind()).load(&self.paths, ctx, id)
    }

    pub fn count(&self, ctx: &OpCtx, kind: Kind) -> Result<usize> {
        Ok(self.handler(kind).load_all(&self.paths, ctx)?.len())
    }

    /// Every entity of every kind, for whole-project passes (integrity,
    /// graph building, snapshots of counters).
    pub fn all_entities(&self, ctx: &OpCtx) -> Result<Vec<Entity>> {
        let mut all = Vec::new();
        for kind in Kind::ALL {
            ctx.check()?;
            all.extend(self.handler(kind).load_all(&self.paths, ctx)?);
        }
        Ok(all)
    }

    /// Apply a field patch. Protected fields and Decisions are immutable.
    pub fn update(&self, ctx: &OpCtx, id: &EntityId, patch: FieldMap) -> Result<Entity> {
        ctx.check()?;
        let kind = id.kind();
        if kind.immutable() {
            return Err(ZeusError::Immutable(id.to_string()));
        }
        for key in PROTECTED_FIELDS {
            if patch.contains_key(&serde_yaml::Value::from(key)) {
                return Err(ZeusError::Immutable(format!("{id}.{key}")));
            }
        }

        let current = self.get(ctx, id)?;
        let mut merged = match current.to_value()? {
            serde_yaml::Value::Mapping(map) => map,
            _ => return Err(ZeusError::Internal(format!("{id}: record is not a map"))),
        };
        for (key, value) in patch {
            merged.insert(key, value);
        }

        let mut updated = Entity::from_value(kind, serde_yaml::Value::Mapping(merged))
            .map_err(|err| ZeusError::BadShape(format!("{id}: {err}")))?;
        updated.touch(chrono::Utc::now());
        if updated.id() != id {
            return Err(ZeusError::Immutable(format!("{id}.id")));
        }
        updated.validate_shape()?;
        integrity::validate_entity(self, ctx, &updated)?;

        self.handler(kind).persist(&self.paths, ctx, &updated)?;
        self.log_entity("updated", &updated);
        self.publish_entity(ctx, ChangeOp::Updated, &updated)?;
        Ok(updated)
    }

    /// Delete an entity. Decisions are immutable; anything still referenced
    /// stays put.
    pub fn delete(&self, ctx: &OpCtx, id: &EntityId) -> Result<()> {
        ctx.check()?;
        let kind = id.kind();
        if kind.immutable() {
            return Err(ZeusError::Immutable(id.to_string()));
        }
        let entity = self.get(ctx, id)?;

        let referrers = integrity::inbound_references(self, ctx, id)?;
        if !referrers.is_empty() {
            return Err(ZeusError::StillReferenced {
                id: id.to_string(),
                referrers: referrers.iter().map(|r| r.to_string()).collect(),
            });
        }

        self.handler(kind).remove(&self.paths, ctx, id)?;
        self.retire_id(id)?;
        self.log_entity("deleted", &entity);
        self.publish_entity(ctx, ChangeOp::Deleted, &entity)?;
        Ok(())
    }

    fn publish_entity(&self, ctx: &OpCtx, op: ChangeOp, entity: &Entity) -> Result<()> {
        self.bus.publish(
            ctx,
            EventKind::Entity {
                op,
                kind: entity.kind(),
                id: entity.id().to_string(),
                title: entity.title().to_string(),
            },
        )?;
        Ok(())
    }

    fn log_entity(&self, op: &str, entity: &Entity) {
        // The change log is informational; a failed append never rolls back
        // a committed write.
        let entry = ChangeEntry::entity(op, entity.kind(), entity.id().as_str(), entity.title());
        if let Err(err) = logs::append(&self.paths, &entry) {
            tracing::warn!(%err, "change log append failed");
        }
    }

    fn retired_file(&self) -> std::path::PathBuf {
        self.paths.state_dir().join("retired.yaml")
    }

    fn retired_ids(&self) -> Result<Vec<String>> {
        Ok(fsio::read_yaml_opt(&self.retired_file())?.unwrap_or_default())
    }

    fn retire_id(&self, id: &EntityId) -> Result<()> {
        let file = self.retired_file();
        let _lock = FileLock::acquire(&file)?;
        let mut retired: Vec<String> = fsio::read_yaml_opt(&file)?.unwrap_or_default();
        if !retired.iter().any(|r| r == id.as_str()) {
            retired.push(id.to_string());
            fsio::write_yaml(&file, &retired)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init;
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
    fn add_get_round_trip() {
        let (_dir, store) = store();
        let ctx = OpCtx::background();

        let obj = store
            .add(&ctx, Kind::Objective, fields(&[("title", "Ship v1")]))
            .unwrap();
        assert_eq!(obj.kind(), Kind::Objective);

        let loaded = store.get(&ctx, obj.id()).unwrap();
        assert_eq!(loaded.title(), "Ship v1");
        assert_eq!(loaded.id(), obj.id());
    }

    #[test]
    fn add_requires_a_title() {
        let (_dir, store) = store();
        let ctx = OpCtx::background();
        let err = store.add(&ctx, Kind::Objective, FieldMap::new()).unwrap_err();
        assert!(matches!(err, ZeusError::BadShape(_)));
    }

    #[test]
    fn add_rejects_supplied_ids() {
        let (_dir, store) = store();
        let ctx = OpCtx::background();
        let err = store
            .add(
                &ctx,
                Kind::Objective,
                fields(&[("title", "x"), ("id", "obj-12345678")]),
            )
            .unwrap_err();
        assert!(matches!(err, ZeusError::BadShape(_)));
    }

    #[test]
    fn usecase_requires_existing_objective() {
        let (_dir, store) = store();
        let ctx = OpCtx::background();
        let err = store
            .add(
                &ctx,
                Kind::UseCase,
                fields(&[("title", "Login"), ("objective_id", "obj-deadbeef")]),
            )
            .unwrap_err();
        assert!(matches!(err, ZeusError::Reference { .. }));
    }

    #[test]
    fn update_patches_fields_and_bumps_updated_at() {
        let (_dir, store) = store();
        let ctx = OpCtx::background();
        let obj = store
            .add(&ctx, Kind::Objective, fields(&[("title", "Before")]))
            .unwrap();

        let updated = store
            .update(&ctx, obj.id(), fields(&[("title", "After")]))
            .unwrap();
        assert_eq!(updated.title(), "After");
        assert_eq!(updated.created_at(), obj.created_at());
        assert!(updated.updated_at() >= obj.updated_at());
    }

    #[test]
    fn decisions_are_immutable() {
        let (_dir, store) = store();
        let ctx = OpCtx::background();
        let consideration = store
            .add(&ctx, Kind::Consideration, fields(&[("title", "Storage")]))
            .unwrap();
        let decision = store
            .add(
                &ctx,
                Kind::Decision,
                fields(&[
                    ("title", "Use YAML"),
                    ("consideration_id", consideration.id().as_str()),
                ]),
            )
            .unwrap();

        let err = store
            .update(&ctx, decision.id(), fields(&[("title", "Use JSON")]))
            .unwrap_err();
        assert!(matches!(err, ZeusError::Immutable(_)));

        let err = store.delete(&ctx, decision.id()).unwrap_err();
        assert!(matches!(err, ZeusError::Immutable(_)));
    }

    #[test]
    fn delete_refuses_referenced_entities() {
        let (_dir, store) = store();
        let ctx = OpCtx::background();
        let obj = store
            .add(&ctx, Kind::Objective, fields(&[("title", "Goal")]))
            .unwrap();
        let _uc = store
            .add(
                &ctx,
                Kind::UseCase,
                fields(&[("title", "Login"), ("objective_id", obj.id().as_str())]),
            )
            .unwrap();

        let err = store.delete(&ctx, obj.id()).unwrap_err();
        match err {
            ZeusError::StillReferenced { referrers, .. } => assert_eq!(referrers.len(), 1),
            other => panic!("expected StillReferenced, got {other}"),
        }
    }

    #[test]
    fn deleted_ids_are_never_reissued() {
        let (_dir, store) = store();
        let ctx = OpCtx::background();
        let obj = store
            .add(&ctx, Kind::Objective, fields(&[("title", "Gone")]))
            .unwrap();
        let gone = obj.id().clone();
        store.delete(&ctx, &gone).unwrap();

        for _ in 0..10 {
            let fresh = store
                .add(&ctx, Kind::Objective, fields(&[("title", "New")]))
                .unwrap();
            assert_ne!(fresh.id(), &gone);
            store.delete(&ctx, fresh.id()).unwrap();
        }
    }

    #[test]
    fn list_filters_by_status() {
        let (_dir, store) = store();
        let ctx = OpCtx::background();
        store
            .add(&ctx, Kind::Activity, fields(&[("title", "One")]))
            .unwrap();
        let two = store
            .add(&ctx, Kind::Activity, fields(&[("title", "Two")]))
            .unwrap();
        store
            .update(&ctx, two.id(), fields(&[("status", "completed")]))
            .unwrap();

        let all = store
            .list(&ctx, Kind::Activity, &ListFilter::default())
            .unwrap();
        assert_eq!(all.len(), 2);

        let completed = store
            .list(
                &ctx,
                Kind::Activity,
                &ListFilter {
                    status: Some(EntityStatus::Completed),
                },
            )
            .unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].title(), "Two");
    }

    #[test]
    fn actors_share_one_file() {
        let (_dir, store) = store();
        let ctx = OpCtx::background();
        let a = store
            .add(&ctx, Kind::Actor, fields(&[("title", "Operator")]))
            .unwrap();
        let b = store
            .add(&ctx, Kind::Actor, fields(&[("title", "Agent")]))
            .unwrap();

        assert!(store.paths().root().join("actors.yaml").is_file());
        assert_eq!(store.count(&ctx, Kind::Actor).unwrap(), 2);

        store.delete(&ctx, a.id()).unwrap();
        let left = store.list(&ctx, Kind::Actor, &ListFilter::default()).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id(), b.id());
    }

    #[test]
    fn vision_cannot_be_added_or_deleted() {
        let (_dir, store) = store();
        let ctx = OpCtx::background();
        let err = store
            .add(&ctx, Kind::Vision, fields(&[("title", "Another")]))
            .unwrap_err();
        assert!(matches!(err, ZeusError::AlreadyExists(_)));

        let vision = &store
            .list(&ctx, Kind::Vision, &ListFilter::default())
            .unwrap()[0];
        let err = store.delete(&ctx, vision.id()).unwrap_err();
        assert!(matches!(err, ZeusError::Conflict(_)));
    }

    #[test]
    fn cancelled_context_stops_mutations() {
        let (_dir, store) = store();
        let token = tokio_util::sync::CancellationToken::new();
        token.cancel();
        let ctx = OpCtx::new(token);
        let err = store
            .add(&ctx, Kind::Objective, fields(&[("title", "nope")]))
            .unwrap_err();
        assert!(matches!(err, ZeusError::Cancelled));
    }
}
