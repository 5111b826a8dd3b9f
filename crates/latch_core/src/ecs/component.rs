// component.rs - Runtime component registration
//
// Components are identified by u32 IDs, not Rust TypeIds.
// This lets script-declared layouts be checked against Rust-defined ones.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::mem::{align_of, size_of};
use thiserror::Error;

pub type ComponentId = u32;

/// Primitive field kinds a component (or any marshalled value) may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    F32,
    F64,
    I32,
    U32,
    I64,
    U64,
}

impl FieldKind {
    /// Size in bytes. Alignment equals size for every kind.
    pub const fn size(self) -> usize {
        match self {
            FieldKind::F32 | FieldKind::I32 | FieldKind::U32 => 4,
            FieldKind::F64 | FieldKind::I64 | FieldKind::U64 => 8,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            FieldKind::F32 => "f32",
            FieldKind::F64 => "f64",
            FieldKind::I32 => "i32",
            FieldKind::U32 => "u32",
            FieldKind::I64 => "i64",
            FieldKind::U64 => "u64",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single named field at a fixed byte offset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMeta {
    pub name: String,
    pub kind: FieldKind,
    pub offset: usize,
}

/// Lay out fields with C rules: each field aligned to its own size, total size
/// rounded up to the widest alignment. Returns `(fields, size, align)`.
pub fn layout_fields(fields: &[(&str, FieldKind)]) -> (Vec<FieldMeta>, usize, usize) {
    let mut offset = 0usize;
    let mut align = 1usize;
    let mut out = Vec::with_capacity(fields.len());
    for (name, kind) in fields {
        let field_align = kind.size();
        offset = offset.next_multiple_of(field_align);
        out.push(FieldMeta {
            name: (*name).to_string(),
            kind: *kind,
            offset,
        });
        offset += kind.size();
        align = align.max(field_align);
    }
    (out, offset.next_multiple_of(align), align)
}

/// Metadata describing a component's memory layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentMeta {
    pub id: ComponentId,
    pub name: String,
    pub size: usize,
    pub align: usize,
    pub fields: Vec<FieldMeta>,
}

impl ComponentMeta {
    /// Build metadata from an ordered field list.
    pub fn from_fields(id: ComponentId, name: &str, fields: &[(&str, FieldKind)]) -> Self {
        let (fields, size, align) = layout_fields(fields);
        Self {
            id,
            name: name.to_string(),
            size,
            align,
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldMeta> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("component {id} ('{name}') re-registered with a different layout")]
    LayoutMismatch { id: ComponentId, name: String },

    #[error("component name '{name}' already used by id {existing}, cannot bind it to id {requested}")]
    NameTaken {
        name: String,
        existing: ComponentId,
        requested: ComponentId,
    },

    #[error("component '{name}' declares {declared} bytes of fields but the Rust type is {actual} bytes")]
    SizeMismatch {
        name: String,
        declared: usize,
        actual: usize,
    },
}

/// Explicit registry mapping component tags to their field layouts.
///
/// Re-registering an identical layout is a no-op; a different layout under
/// the same ID is rejected.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    by_id: HashMap<ComponentId, ComponentMeta>,
    by_name: HashMap<String, ComponentId>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component's metadata.
    pub fn register(&mut self, meta: ComponentMeta) -> Result<ComponentId, RegistryError> {
        if let Some(prev) = self.by_id.get(&meta.id) {
            if *prev != meta {
                return Err(RegistryError::LayoutMismatch {
                    id: meta.id,
                    name: meta.name,
                });
            }
            return Ok(meta.id);
        }
        if let Some(&existing) = self.by_name.get(&meta.name) {
            return Err(RegistryError::NameTaken {
                name: meta.name,
                existing,
                requested: meta.id,
            });
        }

        tracing::debug!(id = meta.id, name = %meta.name, size = meta.size, "registered component");
        let id = meta.id;
        self.by_name.insert(meta.name.clone(), id);
        self.by_id.insert(id, meta);
        Ok(id)
    }

    /// Register a Rust-defined component, checking its declared fields against its real size.
    pub fn register_type<T: Component>(&mut self) -> Result<ComponentId, RegistryError> {
        let meta = T::meta();
        if meta.size != size_of::<T>() || meta.align != align_of::<T>() {
            return Err(RegistryError::SizeMismatch {
                name: meta.name,
                declared: meta.size,
                actual: size_of::<T>(),
            });
        }
        self.register(meta)
    }

    /// Look up component metadata by ID.
    pub fn meta(&self, id: ComponentId) -> Option<&ComponentMeta> {
        self.by_id.get(&id)
    }

    pub fn id_of(&self, name: &str) -> Option<ComponentId> {
        self.by_name.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentMeta> {
        self.by_id.values()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Trait for Rust-defined POD components.
///
/// `FIELDS` lists the fields in declaration order; it must describe the
/// `#[repr(C)]` layout of `Self` exactly, which `register_type` verifies.
pub trait Component: bytemuck::Pod + Send + Sync + 'static {
    /// Globally unique component ID.
    const ID: ComponentId;

    /// Human-readable name, also the name scripts use.
    const NAME: &'static str;

    /// Ordered field descriptor.
    const FIELDS: &'static [(&'static str, FieldKind)];

    fn meta() -> ComponentMeta {
        ComponentMeta::from_fields(Self::ID, Self::NAME, Self::FIELDS)
    }
}

/// Helper macro to implement the Component trait.
///
/// # Example
/// ```ignore
/// #[repr(C)]
/// #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
/// struct Translation { x: f32, y: f32 }
///
/// define_component!(Translation, 1, "Translation", { x: F32, y: F32 });
/// ```
#[macro_export]
macro_rules! define_component {
    ($ty:ty, $id:expr, $name:expr, { $($field:ident : $kind:ident),* $(,)? }) => {
        impl $crate::ecs::Component for $ty {
            const ID: $crate::ecs::ComponentId = $id;
            const NAME: &'static str = $name;
            const FIELDS: &'static [(&'static str, $crate::ecs::FieldKind)] = &[
                $((stringify!($field), $crate::ecs::FieldKind::$kind)),*
            ];
        }
    };
}
