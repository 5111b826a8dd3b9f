//! Managed-side type registry
//!
//! Maps component type tags to the layouts scripts believe they have, plus
//! any standalone value layouts (`Vector2`). Validated against the native
//! component registry when the domain loads.

use crate::error::MarshallingError;
use crate::marshal::{ValueLayout, ValueMarshaller};
use latch_core::ecs::{ComponentId, ComponentRegistry};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

/// A component type visible to scripts.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentBinding {
    pub id: ComponentId,
    pub layout: Rc<ValueLayout>,
}

impl ComponentBinding {
    pub fn name(&self) -> &str {
        self.layout.name()
    }
}

#[derive(Debug, Default)]
pub struct TypeRegistry {
    layouts: HashMap<String, Rc<ValueLayout>>,
    components: BTreeMap<ComponentId, ComponentBinding>,
    component_names: HashMap<String, ComponentId>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the engine's value layouts.
    pub fn with_builtins() -> Self {
        let mut types = Self::new();
        types
            .layouts
            .insert("Vector2".to_string(), Rc::new(ValueLayout::vector2()));
        types
    }

    /// Define a named value layout. Redefining it identically is a no-op.
    pub fn define_layout(&mut self, layout: ValueLayout) -> Result<Rc<ValueLayout>, MarshallingError> {
        if let Some(existing) = self.layouts.get(layout.name()) {
            if **existing != layout {
                return Err(MarshallingError::SchemaDrift {
                    name: layout.name().to_string(),
                    detail: "layout redefined with a different shape".to_string(),
                });
            }
            return Ok(existing.clone());
        }
        let layout = Rc::new(layout);
        self.layouts.insert(layout.name().to_string(), layout.clone());
        Ok(layout)
    }

    pub fn layout(&self, name: &str) -> Option<Rc<ValueLayout>> {
        self.layouts.get(name).cloned()
    }

    /// Declare the managed view of component `id`.
    pub fn declare_component(&mut self, id: ComponentId, layout: ValueLayout) -> Result<(), MarshallingError> {
        if let Some(existing) = self.components.get(&id) {
            if *existing.layout != layout {
                return Err(MarshallingError::SchemaDrift {
                    name: layout.name().to_string(),
                    detail: format!("component {id} declared twice with different layouts"),
                });
            }
            return Ok(());
        }
        if let Some(other) = self.component_names.get(layout.name()) {
            return Err(MarshallingError::SchemaDrift {
                name: layout.name().to_string(),
                detail: format!("name already declared for component {other}"),
            });
        }
        self.component_names.insert(layout.name().to_string(), id);
        self.components.insert(
            id,
            ComponentBinding {
                id,
                layout: Rc::new(layout),
            },
        );
        Ok(())
    }

    /// Check every declared component against the native registry.
    pub fn validate(&self, native: &ComponentRegistry) -> Result<(), MarshallingError> {
        for binding in self.components.values() {
            let meta = native.meta(binding.id).ok_or_else(|| MarshallingError::SchemaDrift {
                name: binding.name().to_string(),
                detail: format!("no native component with id {}", binding.id),
            })?;
            if meta.name != binding.name() {
                return Err(MarshallingError::SchemaDrift {
                    name: binding.name().to_string(),
                    detail: format!("native component {} is named '{}'", binding.id, meta.name),
                });
            }
            ValueMarshaller::check_compatible(&binding.layout, meta)?;
        }
        Ok(())
    }

    pub fn component(&self, id: ComponentId) -> Option<&ComponentBinding> {
        self.components.get(&id)
    }

    pub fn component_by_name(&self, name: &str) -> Option<&ComponentBinding> {
        self.component_names
            .get(name)
            .and_then(|id| self.components.get(id))
    }

    pub fn components(&self) -> impl Iterator<Item = &ComponentBinding> {
        self.components.values()
    }
}
