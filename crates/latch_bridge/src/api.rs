//! The surface scripts call into
//!
//! `ScriptApi` is a cheap clone over the frozen call table, the type
//! registry and the native host. Each method borrows the host for exactly
//! one operation, so a script can never hold native state across calls.

use crate::accessor::ComponentAccessor;
use crate::calls::{NativeCallTable, NativeCallable};
use crate::error::{BridgeError, BridgeResult};
use crate::handle::EntityHandle;
use crate::host::NativeHost;
use crate::log::LogLevel;
use crate::marshal::{Value, ValueMarshaller, ValueType};
use crate::types::{ComponentBinding, TypeRegistry};
use latch_core::ecs::{Component, ComponentId, Entity, WorldError};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Clone)]
pub struct ScriptApi {
    calls: Rc<NativeCallTable>,
    types: Rc<TypeRegistry>,
    host: Rc<RefCell<NativeHost>>,
}

impl ScriptApi {
    pub(crate) fn new(
        calls: Rc<NativeCallTable>,
        types: Rc<TypeRegistry>,
        host: Rc<RefCell<NativeHost>>,
    ) -> Self {
        Self { calls, types, host }
    }

    pub(crate) fn host(&self) -> &Rc<RefCell<NativeHost>> {
        &self.host
    }

    pub fn calls(&self) -> &NativeCallTable {
        &self.calls
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn resolve(&self, name: &str) -> BridgeResult<NativeCallable> {
        Ok(self.calls.resolve(name)?)
    }

    /// Synchronous native call by name. Ref and out results land in `args`.
    pub fn call(&self, name: &str, args: &mut [Value]) -> BridgeResult<Value> {
        let callable = self.resolve(name)?;
        self.invoke(&callable, args)
    }

    pub fn invoke(&self, callable: &NativeCallable, args: &mut [Value]) -> BridgeResult<Value> {
        let mut host = self.host.borrow_mut();
        callable.invoke(&mut host, args)
    }

    pub fn is_valid(&self, handle: EntityHandle) -> bool {
        self.host.borrow().world().is_alive(handle.entity())
    }

    pub(crate) fn ensure_valid(&self, handle: EntityHandle) -> BridgeResult<Entity> {
        if self.is_valid(handle) {
            Ok(handle.entity())
        } else {
            Err(BridgeError::InvalidHandle(handle))
        }
    }

    pub fn has_component<T: Component>(&self, handle: EntityHandle) -> bool {
        self.has_component_by_id(handle, T::ID)
    }

    /// Never fails: dead handles and unknown types are simply `false`.
    pub fn has_component_by_id(&self, handle: EntityHandle, id: ComponentId) -> bool {
        self.types.component(id).is_some()
            && self.host.borrow().world().has_component(handle.entity(), id)
    }

    pub fn has_component_by_name(&self, handle: EntityHandle, name: &str) -> bool {
        self.types
            .component_by_name(name)
            .is_some_and(|binding| self.has_component_by_id(handle, binding.id))
    }

    pub fn get_component<T: Component>(&self, handle: EntityHandle) -> BridgeResult<ComponentAccessor> {
        self.get_component_by_id(handle, T::ID)
    }

    pub fn get_component_by_name(&self, handle: EntityHandle, name: &str) -> BridgeResult<ComponentAccessor> {
        let binding = self
            .types
            .component_by_name(name)
            .ok_or_else(|| BridgeError::UnknownComponentType(name.to_string()))?;
        self.accessor(handle, binding.clone())
    }

    pub fn get_component_by_id(&self, handle: EntityHandle, id: ComponentId) -> BridgeResult<ComponentAccessor> {
        let binding = self
            .types
            .component(id)
            .ok_or_else(|| BridgeError::UnknownComponentType(id.to_string()))?;
        self.accessor(handle, binding.clone())
    }

    fn accessor(&self, handle: EntityHandle, binding: ComponentBinding) -> BridgeResult<ComponentAccessor> {
        let entity = self.ensure_valid(handle)?;
        if !self.host.borrow().world().has_component(entity, binding.id) {
            return Err(BridgeError::ComponentNotFound {
                handle,
                component: binding.name().to_string(),
            });
        }
        Ok(ComponentAccessor::new(self.clone(), handle, binding))
    }

    /// One fresh copy of the component, straight from native storage.
    pub(crate) fn read_component(&self, handle: EntityHandle, binding: &ComponentBinding) -> BridgeResult<Value> {
        let entity = self.ensure_valid(handle)?;
        let host = self.host.borrow();
        let bytes = host
            .world()
            .read_raw(entity, binding.id)
            .map_err(|err| world_error(handle, binding, err))?;
        Ok(ValueMarshaller::unpack(&ValueType::Struct(binding.layout.clone()), bytes)?)
    }

    pub(crate) fn write_component(
        &self,
        handle: EntityHandle,
        binding: &ComponentBinding,
        value: &Value,
    ) -> BridgeResult<()> {
        let entity = self.ensure_valid(handle)?;
        let bytes = ValueMarshaller::pack(&ValueType::Struct(binding.layout.clone()), value)?;
        self.host
            .borrow_mut()
            .world_mut()
            .write_raw(entity, binding.id, &bytes)
            .map_err(|err| world_error(handle, binding, err))
    }

    pub fn key_down(&self, code: u32) -> BridgeResult<bool> {
        Ok(self.host.borrow().query().key_down(code)?)
    }

    /// Write to the native log channel on behalf of a script.
    pub fn log(&self, level: LogLevel, source: &str, message: impl Into<String>) {
        self.host.borrow_mut().log_message(level, source, message);
    }

    /// Destroy the entity behind `handle`. The dispatcher notices before
    /// that entity's next callback.
    pub fn destroy(&self, handle: EntityHandle) -> BridgeResult<()> {
        if self.host.borrow_mut().world_mut().despawn(handle.entity()) {
            tracing::debug!(entity = %handle, "entity destroyed by script");
            Ok(())
        } else {
            Err(BridgeError::InvalidHandle(handle))
        }
    }

    pub fn frame(&self) -> u64 {
        self.host.borrow().frame()
    }
}

fn world_error(handle: EntityHandle, binding: &ComponentBinding, err: WorldError) -> BridgeError {
    match err {
        WorldError::DeadEntity(_) => BridgeError::InvalidHandle(handle),
        WorldError::MissingComponent { .. } => BridgeError::ComponentNotFound {
            handle,
            component: binding.name().to_string(),
        },
        other => BridgeError::World(other),
    }
}
