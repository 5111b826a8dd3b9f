//! Entity Component System core types.
//!
//! The native side of the script bridge: entities are generation-tagged
//! handles, components are plain bytes described by a runtime registry, and
//! the `World` is the only owner of component memory.

mod builder;
mod component;
mod entity;
mod storage;
mod world;

pub use builder::EntityBuilder;
pub use component::{
    layout_fields, Component, ComponentId, ComponentMeta, ComponentRegistry, FieldKind,
    FieldMeta, RegistryError,
};
pub use entity::{Entity, EntityAllocator, EntityIndex, Generation};
pub use storage::ComponentColumn;
pub use world::{World, WorldError};
