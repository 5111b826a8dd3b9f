// world.rs - ECS World with entity management and component storage

use crate::ecs::{
    Component, ComponentColumn, ComponentId, ComponentMeta, ComponentRegistry, Entity,
    EntityAllocator, EntityBuilder, RegistryError,
};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorldError {
    #[error("entity {0} is not alive")]
    DeadEntity(Entity),

    #[error("component id {0} is not registered")]
    UnknownComponent(ComponentId),

    #[error("entity {entity} has no component {component}")]
    MissingComponent {
        entity: Entity,
        component: ComponentId,
    },

    #[error("component id {component} expects {expected} bytes but received {actual} bytes")]
    SizeMismatch {
        component: ComponentId,
        expected: usize,
        actual: usize,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// The native entity/component store.
///
/// Component memory lives here and nowhere else; callers only ever receive
/// copies of it or write through `write_raw`/`set`.
#[derive(Debug, Default)]
pub struct World {
    entities: EntityAllocator,
    registry: ComponentRegistry,
    columns: BTreeMap<ComponentId, ComponentColumn>,
}

impl World {
    /// Create a new empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a Rust-defined component type.
    pub fn register<T: Component>(&mut self) -> Result<ComponentId, WorldError> {
        Ok(self.registry.register_type::<T>()?)
    }

    /// Register a component layout that has no Rust type behind it.
    pub fn register_meta(&mut self, meta: ComponentMeta) -> Result<ComponentId, WorldError> {
        Ok(self.registry.register(meta)?)
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Spawn an entity from a builder.
    ///
    /// Every payload is validated before the entity is allocated, so a failed
    /// spawn leaves the world untouched.
    pub fn spawn(&mut self, builder: EntityBuilder) -> Result<Entity, WorldError> {
        for (id, bytes) in builder.components() {
            self.check_payload(id, bytes)?;
        }

        let entity = self.entities.alloc();
        for (id, bytes) in builder.components() {
            self.column_mut(id)?.insert(entity.index(), bytes);
        }
        tracing::trace!(%entity, "spawned entity");
        Ok(entity)
    }

    /// Despawn an entity.
    ///
    /// The slot's generation is bumped, invalidating any handle to the old entity.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        if !self.entities.free(entity) {
            return false;
        }
        for column in self.columns.values_mut() {
            column.remove(entity.index());
        }
        tracing::trace!(%entity, "despawned entity");
        true
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Live entities in slot order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.iter()
    }

    pub fn live_entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Attach (or overwrite) a component from raw bytes.
    pub fn insert_raw(
        &mut self,
        entity: Entity,
        id: ComponentId,
        bytes: &[u8],
    ) -> Result<(), WorldError> {
        self.ensure_alive(entity)?;
        self.check_payload(id, bytes)?;
        self.column_mut(id)?.insert(entity.index(), bytes);
        Ok(())
    }

    pub fn insert<T: Component>(&mut self, entity: Entity, value: T) -> Result<(), WorldError> {
        self.insert_raw(entity, T::ID, bytemuck::bytes_of(&value))
    }

    /// Detach a component. Returns whether it was present.
    pub fn remove(&mut self, entity: Entity, id: ComponentId) -> Result<bool, WorldError> {
        self.ensure_alive(entity)?;
        Ok(self
            .columns
            .get_mut(&id)
            .is_some_and(|column| column.remove(entity.index())))
    }

    /// Never fails: dead entities simply have no components.
    pub fn has_component(&self, entity: Entity, id: ComponentId) -> bool {
        self.is_alive(entity)
            && self
                .columns
                .get(&id)
                .is_some_and(|column| column.contains(entity.index()))
    }

    /// Borrow a component's raw bytes.
    pub fn read_raw(&self, entity: Entity, id: ComponentId) -> Result<&[u8], WorldError> {
        self.ensure_alive(entity)?;
        self.columns
            .get(&id)
            .and_then(|column| column.get(entity.index()))
            .ok_or(WorldError::MissingComponent {
                entity,
                component: id,
            })
    }

    /// Overwrite a component's raw bytes in place.
    pub fn write_raw(
        &mut self,
        entity: Entity,
        id: ComponentId,
        bytes: &[u8],
    ) -> Result<(), WorldError> {
        self.ensure_alive(entity)?;
        self.check_payload(id, bytes)?;
        let row = self
            .columns
            .get_mut(&id)
            .and_then(|column| column.get_mut(entity.index()))
            .ok_or(WorldError::MissingComponent {
                entity,
                component: id,
            })?;
        row.copy_from_slice(bytes);
        Ok(())
    }

    /// Copy a typed component out of storage.
    pub fn get<T: Component>(&self, entity: Entity) -> Result<T, WorldError> {
        self.read_raw(entity, T::ID)
            .map(bytemuck::pod_read_unaligned::<T>)
    }

    pub fn set<T: Component>(&mut self, entity: Entity, value: T) -> Result<(), WorldError> {
        self.write_raw(entity, T::ID, bytemuck::bytes_of(&value))
    }

    fn ensure_alive(&self, entity: Entity) -> Result<(), WorldError> {
        if self.is_alive(entity) {
            Ok(())
        } else {
            Err(WorldError::DeadEntity(entity))
        }
    }

    fn check_payload(&self, id: ComponentId, bytes: &[u8]) -> Result<(), WorldError> {
        let meta = self
            .registry
            .meta(id)
            .ok_or(WorldError::UnknownComponent(id))?;
        if bytes.len() != meta.size {
            return Err(WorldError::SizeMismatch {
                component: id,
                expected: meta.size,
                actual: bytes.len(),
            });
        }
        Ok(())
    }

    fn column_mut(&mut self, id: ComponentId) -> Result<&mut ComponentColumn, WorldError> {
        let meta = self
            .registry
            .meta(id)
            .ok_or(WorldError::UnknownComponent(id))?
            .clone();
        Ok(self
            .columns
            .entry(id)
            .or_insert_with(|| ComponentColumn::new(meta)))
    }
}
