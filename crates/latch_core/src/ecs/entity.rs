//! Entity handle with generational index
//!
//! Entities are lightweight handles (8 bytes) that reference data in the World.
//! The generation counter prevents use-after-free bugs.

use serde::{Deserialize, Serialize};
use std::fmt;

pub type EntityIndex = u32;
pub type Generation = u32;

/// Entity handle (generation-indexed for safety)
///
/// Format: [32-bit generation | 32-bit index]
/// - Index: Slot in the allocator's metadata arrays
/// - Generation: Bumped on destruction, so stale handles never match a new occupant
///
/// Generations start at 1, which keeps the all-zero bit pattern invalid forever.
///
/// Example:
/// ```ignore
/// let entity = world.spawn(EntityBuilder::new())?;
/// world.despawn(entity);
/// assert!(!world.is_alive(entity)); // generation mismatch
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity {
    index: EntityIndex,
    generation: Generation,
}

impl Entity {
    pub(crate) const fn new(index: EntityIndex, generation: Generation) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> EntityIndex {
        self.index
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Serialize to 64-bit integer (the opaque ID handed to scripts)
    pub fn to_bits(&self) -> u64 {
        ((self.generation as u64) << 32) | (self.index as u64)
    }

    /// Deserialize from 64-bit integer
    pub fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Hands out entity IDs and tracks which ones are alive.
///
/// Freed slots are recycled, but only after their generation is bumped, so an
/// ID is never handed out twice while either holder could still be alive.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    generations: Vec<Generation>,
    alive: Vec<bool>,
    free: Vec<EntityIndex>,
    live: usize,
}

impl EntityAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh entity, reusing a freed slot when one is available.
    pub fn alloc(&mut self) -> Entity {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = index as usize;
            self.alive[slot] = true;
            return Entity::new(index, self.generations[slot]);
        }

        let index = self.generations.len() as EntityIndex;
        self.generations.push(1);
        self.alive.push(true);
        Entity::new(index, 1)
    }

    /// Release an entity. Returns `false` if the handle was already stale.
    pub fn free(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let slot = entity.index as usize;
        self.alive[slot] = false;
        self.generations[slot] = next_generation(self.generations[slot]);
        self.free.push(entity.index);
        self.live -= 1;
        true
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        let slot = entity.index as usize;
        slot < self.generations.len()
            && self.alive[slot]
            && self.generations[slot] == entity.generation
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Iterate live entities in slot order.
    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.alive
            .iter()
            .enumerate()
            .filter(|(_, alive)| **alive)
            .map(|(slot, _)| Entity::new(slot as EntityIndex, self.generations[slot]))
    }
}

// Generation 0 is reserved so that zeroed IDs never validate.
fn next_generation(generation: Generation) -> Generation {
    match generation.wrapping_add(1) {
        0 => 1,
        next => next,
    }
}
