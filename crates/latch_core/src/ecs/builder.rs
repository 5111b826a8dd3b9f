use crate::ecs::{Component, ComponentId};
use std::collections::BTreeMap;

/// Builder collecting components (typed or raw) before spawning.
///
/// Validation against the registry happens in `World::spawn`, so a builder
/// can be assembled before every component type is known.
#[derive(Debug, Default)]
pub struct EntityBuilder {
    components: BTreeMap<ComponentId, Box<[u8]>>,
}

impl EntityBuilder {
    /// Create a new empty builder.
    pub fn new() -> Self {
        Self {
            components: BTreeMap::new(),
        }
    }

    /// Add a Rust-typed component by value.
    pub fn with<T: Component>(mut self, value: T) -> Self {
        self.components
            .insert(T::ID, bytemuck::bytes_of(&value).into());
        self
    }

    /// Add a component by raw bytes (scripting, serialization, etc.).
    pub fn with_raw(mut self, component_id: ComponentId, bytes: Vec<u8>) -> Self {
        self.components
            .insert(component_id, bytes.into_boxed_slice());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Component payloads in ascending ID order.
    pub fn components(&self) -> impl Iterator<Item = (ComponentId, &[u8])> {
        self.components.iter().map(|(id, bytes)| (*id, &bytes[..]))
    }
}
