//! Per-layout kind handlers.
//!
//! The store is kind-agnostic; everything layout-specific lives behind
//! [`KindHandler`]. Three implementations cover the whole model:
//!
//! - [`DirHandler`]: one `<id>.yaml` per entity in the kind's directory.
//! - [`ListHandler`]: all records of the kind in one list file.
//! - [`SingletonHandler`]: one well-known file holding one record.
//!
//! Handlers only do file-level work (guarded paths, per-file lock, atomic
//! write). Reference validation, events and the change log are the store's
//! job.

use std::fs;
use std::path::PathBuf;

use crate::ctx::OpCtx;
use crate::error::{Result, ZeusError};
use crate::fsio::{self, FileLock};
use crate::model::{Entity, EntityId, Kind, Layout};
use crate::paths::ZeusPaths;

pub trait KindHandler: Send + Sync {
    fn kind(&self) -> Kind;

    /// All entities of the kind, in deterministic (id) order.
    fn load_all(&self, paths: &ZeusPaths, ctx: &OpCtx) -> Result<Vec<Entity>>;

    fn load(&self, paths: &ZeusPaths, ctx: &OpCtx, id: &EntityId) -> Result<Entity>;

    /// Write one entity under its file lock. Creates or replaces.
    fn persist(&self, paths: &ZeusPaths, ctx: &OpCtx, entity: &Entity) -> Result<()>;

    fn remove(&self, paths: &ZeusPaths, ctx: &OpCtx, id: &EntityId) -> Result<()>;
}

/// Build the full registry. Called once at store open; read-only afterwards.
pub fn registry() -> Vec<Box<dyn KindHandler>> {
    Kind::ALL
        .iter()
        .map(|&kind| -> Box<dyn KindHandler> {
            match kind.layout() {
                Layout::Directory(_) => Box::new(DirHandler { kind }),
                Layout::ListFile(_) => Box::new(ListHandler { kind }),
                Layout::Singleton(_) => Box::new(SingletonHandler { kind }),
            }
        })
        .collect()
}

pub struct DirHandler {
    kind: Kind,
}

impl DirHandler {
    fn entity_path(&self, paths: &ZeusPaths, id: &EntityId) -> Result<PathBuf> {
        if id.kind() != self.kind {
            return Err(ZeusError::BadShape(id.to_string()));
        }
        paths.entity_file(id)
    }
}

impl KindHandler for DirHandler {
    fn kind(&self) -> Kind {
        self.kind
    }

    fn load_all(&self, paths: &ZeusPaths, ctx: &OpCtx) -> Result<Vec<Entity>> {
        let dir = paths.kind_container(self.kind);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut names: Vec<String> = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(stem) = name.strip_suffix(".yaml") {
                if EntityId::parse(stem).map_or(false, |id| id.kind() == self.kind) {
                    names.push(name);
                }
            }
        }
        names.sort();

        let mut entities = Vec::with_capacity(names.len());
        for name in names {
            ctx.check()?;
            let value: serde_yaml::Value = fsio::read_yaml(&dir.join(&name))?;
            entities.push(Entity::from_value(self.kind, value)?);
        }
        Ok(entities)
    }

    fn load(&self, paths: &ZeusPaths, ctx: &OpCtx, id: &EntityId) -> Result<Entity> {
        ctx.check()?;
        let path = self.entity_path(paths, id)?;
        let value: Option<serde_yaml::Value> = fsio::read_yaml_opt(&path)?;
        match value {
            Some(value) => Entity::from_value(self.kind, value),
            None => Err(ZeusError::NotFound(id.to_string())),
        }
    }

    fn persist(&self, paths: &ZeusPaths, ctx: &OpCtx, entity: &Entity) -> Result<()> {
        let path = self.entity_path(paths, entity.id())?;
        ctx.check()?;
        let _lock = FileLock::acquire(&path)?;
        ctx.check()?;
        fsio::write_yaml(&path, &entity.to_value()?)
    }

    fn remove(&self, paths: &ZeusPaths, ctx: &OpCtx, id: &EntityId) -> Result<()> {
        let path = self.entity_path(paths, id)?;
        ctx.check()?;
        let _lock = FileLock::acquire(&path)?;
        ctx.check()?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(ZeusError::NotFound(id.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }
}

pub struct ListHandler {
    kind: Kind,
}

impl ListHandler {
    fn file(&self, paths: &ZeusPaths) -> PathBuf {
        paths.kind_container(self.kind)
    }

    fn read_list(&self, paths: &ZeusPaths) -> Result<Vec<serde_yaml::Value>> {
        Ok(fsio::read_yaml_opt(&self.file(paths))?.unwrap_or_default())
    }

    fn write_list(&self, paths: &ZeusPaths, list: &[serde_yaml::Value]) -> Result<()> {
        fsio::write_yaml(&self.file(paths), &list)
    }

    fn value_id(value: &serde_yaml::Value) -> Option<&str> {
        value.get("id").and_then(|v| v.as_str())
    }
}

impl KindHandler for ListHandler {
    fn kind(&self) -> Kind {
        self.kind
    }

    fn load_all(&self, paths: &ZeusPaths, ctx: &OpCtx) -> Result<Vec<Entity>> {
        ctx.check()?;
        let mut entities = Vec::new();
        for value in self.read_list(paths)? {
            ctx.check()?;
            entities.push(Entity::from_value(self.kind, value)?);
        }
        Ok(entities)
    }

    fn load(&self, paths: &ZeusPaths, ctx: &OpCtx, id: &EntityId) -> Result<Entity> {
        ctx.check()?;
        for value in self.read_list(paths)? {
            if Self::value_id(&value) == Some(id.as_str()) {
                return Entity::from_value(self.kind, value);
            }
        }
        Err(ZeusError::NotFound(id.to_string()))
    }

    fn persist(&self, paths: &ZeusPaths, ctx: &OpCtx, entity: &Entity) -> Result<()> {
        let file = self.file(paths);
        ctx.check()?;
        let _lock = FileLock::acquire(&file)?;
        ctx.check()?;

        let mut list = self.read_list(paths)?;
        let value = entity.to_value()?;
        let id = entity.id().as_str();
        match list
            .iter_mut()
            .find(|existing| Self::value_id(existing) == Some(id))
        {
            Some(slot) => *slot = value,
            None => list.push(value),
        }
        self.write_list(paths, &list)
    }

    fn remove(&self, paths: &ZeusPaths, ctx: &OpCtx, id: &EntityId) -> Result<()> {
        let file = self.file(paths);
        ctx.check()?;
        let _lock = FileLock::acquire(&file)?;
        ctx.check()?;

        let mut list = self.read_list(paths)?;
        let before = list.len();
        list.retain(|value| Self::value_id(value) != Some(id.as_str()));
        if list.len() == before {
            return Err(ZeusError::NotFound(id.to_string()));
        }
        self.write_list(paths, &list)
    }
}

pub struct SingletonHandler {
    kind: Kind,
}

impl SingletonHandler {
    fn file(&self, paths: &ZeusPaths) -> PathBuf {
        paths.kind_container(self.kind)
    }
}

impl KindHandler for SingletonHandler {
    fn kind(&self) -> Kind {
        self.kind
    }

    fn load_all(&self, paths: &ZeusPaths, ctx: &OpCtx) -> Result<Vec<Entity>> {
        ctx.check()?;
        match fsio::read_yaml_opt::<serde_yaml::Value>(&self.file(paths))? {
            Some(value) => Ok(vec![Entity::from_value(self.kind, value)?]),
            None => Ok(Vec::new()),
        }
    }

    fn load(&self, paths: &ZeusPaths, ctx: &OpCtx, id: &EntityId) -> Result<Entity> {
        let mut all = self.load_all(paths, ctx)?;
        match all.pop() {
            Some(entity) if entity.id() == id => Ok(entity),
            _ => Err(ZeusError::NotFound(id.to_string())),
        }
    }

    fn persist(&self, paths: &ZeusPaths, ctx: &OpCtx, entity: &Entity) -> Result<()> {
        let file = self.file(paths);
        ctx.check()?;
        let _lock = FileLock::acquire(&file)?;
        ctx.check()?;
        fsio::write_yaml(&file, &entity.to_value()?)
    }

    fn remove(&self, _paths: &ZeusPaths, _ctx: &OpCtx, id: &EntityId) -> Result<()> {
        Err(ZeusError::Conflict(format!(
            "{id} is a singleton and cannot be deleted"
        )))
    }
}
