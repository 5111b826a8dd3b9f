//! Typed access to native-owned component data

use crate::api::ScriptApi;
use crate::error::{BridgeResult, MarshallingError};
use crate::handle::EntityHandle;
use crate::marshal::{Marshal, Value, ValueLayout, ValueType};
use crate::types::ComponentBinding;
use latch_core::ecs::ComponentId;

/// Bound to one (entity, component type) pair.
///
/// Holds no copy of the data. Every `get`/`set` is a full marshalling round
/// trip against native storage, and fails with `InvalidHandle` once the
/// entity is gone.
#[derive(Clone)]
pub struct ComponentAccessor {
    api: ScriptApi,
    handle: EntityHandle,
    binding: ComponentBinding,
}

impl ComponentAccessor {
    pub(crate) fn new(api: ScriptApi, handle: EntityHandle, binding: ComponentBinding) -> Self {
        Self {
            api,
            handle,
            binding,
        }
    }

    pub fn handle(&self) -> EntityHandle {
        self.handle
    }

    pub fn component_id(&self) -> ComponentId {
        self.binding.id
    }

    pub fn component_name(&self) -> &str {
        self.binding.name()
    }

    pub fn layout(&self) -> &ValueLayout {
        &self.binding.layout
    }

    pub fn load(&self) -> BridgeResult<Value> {
        self.api.read_component(self.handle, &self.binding)
    }

    pub fn store(&self, value: &Value) -> BridgeResult<()> {
        self.api.write_component(self.handle, &self.binding, value)
    }

    pub fn get(&self, field: &str) -> BridgeResult<Value> {
        let (index, _) = self.layout().field(field)?;
        match self.load()? {
            Value::Struct(mut fields) if index < fields.len() => Ok(fields.swap_remove(index)),
            other => Err(MarshallingError::TypeMismatch {
                expected: self.component_name().to_string(),
                actual: format!("{other:?}"),
            }
            .into()),
        }
    }

    /// Read-modify-write of a single field. The value must match the
    /// field's kind exactly.
    pub fn set(&self, field: &str, value: impl Into<Value>) -> BridgeResult<()> {
        let value = value.into();
        let (index, meta) = self.layout().field(field)?;
        ValueType::Prim(meta.kind).ensure_accepts(&value_type_of(&value))?;
        let mut current = self.load()?;
        if let Value::Struct(fields) = &mut current {
            if let Some(slot) = fields.get_mut(index) {
                *slot = value;
            }
        }
        self.store(&current)
    }

    pub fn load_as<T: Marshal>(&self) -> BridgeResult<T> {
        T::value_type().ensure_accepts(&ValueType::Struct(self.binding.layout.clone()))?;
        Ok(T::from_value(self.load()?)?)
    }

    pub fn store_as<T: Marshal>(&self, value: T) -> BridgeResult<()> {
        ValueType::Struct(self.binding.layout.clone()).ensure_accepts(&T::value_type())?;
        self.store(&value.into_value())
    }
}

fn value_type_of(value: &Value) -> ValueType {
    match value {
        Value::Unit => ValueType::Unit,
        Value::Str(_) => ValueType::Str,
        Value::Struct(_) => ValueType::layout(ValueLayout::new("struct", &[])),
        other => other.kind().map(ValueType::Prim).unwrap_or_default(),
    }
}
