//! Opaque entity handles held by scripts

use latch_core::ecs::Entity;
use std::fmt;

/// Opaque handle for script access.
///
/// Wraps the entity's generation-tagged bits. Holding one grants nothing by
/// itself: every use is re-validated against the native allocator.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityHandle(u64);

impl EntityHandle {
    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub fn to_bits(self) -> u64 {
        self.0
    }

    pub fn entity(self) -> Entity {
        Entity::from_bits(self.0)
    }
}

impl From<Entity> for EntityHandle {
    fn from(entity: Entity) -> Self {
        EntityHandle(entity.to_bits())
    }
}

impl From<EntityHandle> for Entity {
    fn from(handle: EntityHandle) -> Self {
        Entity::from_bits(handle.0)
    }
}

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.entity())
    }
}
