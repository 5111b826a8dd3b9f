//! Script domain: load-time binding and the per-frame entry point
//!
//! `DomainBuilder` collects natives, component bindings and classes.
//! `load` freezes the call table, validates every component binding against
//! native metadata and resolves every class import. Any failure there returns
//! an error and no domain exists; nothing half-initialised can tick.

use crate::api::ScriptApi;
use crate::calls::{CallId, NativeCallTable, NativeFn};
use crate::error::{BindingError, BridgeError, BridgeResult, MarshallingError};
use crate::handle::EntityHandle;
use crate::host::NativeHost;
use crate::lifecycle::{DispatchStats, FailurePolicy, LifecycleDispatcher, LifecycleState};
use crate::marshal::ValueLayout;
use crate::natives;
use crate::script::ScriptClass;
use crate::signature::Signature;
use crate::types::TypeRegistry;
use latch_core::ecs::{Component, ComponentId, EntityBuilder, World};
use latch_services::{InputState, InputTimeline, KeyCode};
use std::cell::{Ref, RefCell, RefMut};
use std::collections::BTreeMap;
use std::rc::Rc;

pub struct DomainBuilder {
    host: NativeHost,
    calls: NativeCallTable,
    types: TypeRegistry,
    classes: BTreeMap<String, Rc<dyn ScriptClass>>,
    policy: FailurePolicy,
}

impl DomainBuilder {
    pub fn new(world: World) -> Self {
        Self::with_host(NativeHost::new(world))
    }

    pub fn with_host(host: NativeHost) -> Self {
        Self {
            host,
            calls: NativeCallTable::new(),
            types: TypeRegistry::with_builtins(),
            classes: BTreeMap::new(),
            policy: FailurePolicy::default(),
        }
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn native(&mut self, name: &str, signature: Signature, func: NativeFn) -> Result<CallId, BindingError> {
        self.calls.register(name, signature, func)
    }

    pub fn engine_natives(&mut self) -> Result<(), BindingError> {
        natives::register_engine_natives(&mut self.calls)
    }

    pub fn define_layout(&mut self, layout: ValueLayout) -> Result<Rc<ValueLayout>, MarshallingError> {
        self.types.define_layout(layout)
    }

    /// Register `T` natively and make it visible to scripts under its own layout.
    pub fn expose_component<T: Component>(&mut self) -> BridgeResult<ComponentId> {
        let id = self.host.world_mut().register::<T>()?;
        self.types
            .declare_component(id, ValueLayout::from_component(&T::meta()))?;
        Ok(id)
    }

    /// Declare the managed view of a component. Checked against the native
    /// registry at load.
    pub fn declare_component(&mut self, id: ComponentId, layout: ValueLayout) -> Result<(), MarshallingError> {
        self.types.declare_component(id, layout)
    }

    pub fn class(&mut self, class: impl ScriptClass + 'static) -> Result<(), BindingError> {
        self.class_rc(Rc::new(class))
    }

    pub fn class_rc(&mut self, class: Rc<dyn ScriptClass>) -> Result<(), BindingError> {
        let name = class.name().to_string();
        if self.classes.contains_key(&name) {
            return Err(BindingError::DuplicateClass(name));
        }
        self.classes.insert(name, class);
        Ok(())
    }

    pub fn world_mut(&mut self) -> &mut World {
        self.host.world_mut()
    }

    pub fn load(self) -> BridgeResult<ScriptDomain> {
        let DomainBuilder {
            mut host,
            mut calls,
            types,
            classes,
            policy,
        } = self;

        calls.freeze();
        types.validate(host.world().registry()).inspect_err(|err| {
            tracing::error!(%err, "component binding failed validation");
        })?;

        for class in classes.values() {
            for import in class.imports() {
                let resolved = match &import.signature {
                    Some(expected) => calls.resolve_checked(&import.name, expected),
                    None => calls.resolve(&import.name),
                };
                resolved
                    .map_err(|err| match err {
                        BindingError::Unresolved { name } => BindingError::UnresolvedImport {
                            class: class.name().to_string(),
                            name,
                        },
                        other => other,
                    })
                    .inspect_err(|err| tracing::error!(%err, "script domain failed to bind"))?;
            }
        }

        host.expose_components(types.components().map(|binding| binding.id));
        let native_count = calls.len();
        let api = ScriptApi::new(Rc::new(calls), Rc::new(types), Rc::new(RefCell::new(host)));
        for class in classes.values() {
            class.bind(&api)?;
        }

        tracing::info!(
            natives = native_count,
            classes = classes.len(),
            ?policy,
            "script domain loaded"
        );
        Ok(ScriptDomain {
            api,
            classes,
            dispatcher: LifecycleDispatcher::new(policy),
        })
    }
}

pub struct ScriptDomain {
    api: ScriptApi,
    classes: BTreeMap<String, Rc<dyn ScriptClass>>,
    dispatcher: LifecycleDispatcher,
}

impl ScriptDomain {
    pub fn api(&self) -> &ScriptApi {
        &self.api
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    fn class(&self, name: &str) -> Result<Rc<dyn ScriptClass>, BindingError> {
        self.classes
            .get(name)
            .cloned()
            .ok_or_else(|| BindingError::UnknownClass(name.to_string()))
    }

    /// Create an entity and its script instance. If the instance cannot be
    /// created the entity is removed again.
    pub fn spawn(&mut self, builder: EntityBuilder, class: &str) -> BridgeResult<EntityHandle> {
        let class = self.class(class)?;
        let handle = self.spawn_native(builder)?;
        if let Err(err) = self.dispatcher.attach(&self.api, handle, class.as_ref()) {
            self.api
                .host()
                .borrow_mut()
                .world_mut()
                .despawn(handle.entity());
            tracing::warn!(entity = %handle, class = class.name(), %err, "spawn rolled back");
            return Err(err);
        }
        Ok(handle)
    }

    /// Create an entity with no script attached.
    pub fn spawn_native(&mut self, builder: EntityBuilder) -> BridgeResult<EntityHandle> {
        let entity = self.api.host().borrow_mut().world_mut().spawn(builder)?;
        Ok(EntityHandle::from(entity))
    }

    /// Attach a script instance to an existing entity.
    pub fn attach(&mut self, handle: EntityHandle, class: &str) -> BridgeResult<()> {
        let class = self.class(class)?;
        self.dispatcher.attach(&self.api, handle, class.as_ref())
    }

    pub fn destroy(&mut self, handle: EntityHandle) -> BridgeResult<()> {
        let removed = self
            .api
            .host()
            .borrow_mut()
            .world_mut()
            .despawn(handle.entity());
        self.dispatcher.destroyed(handle);
        if removed {
            Ok(())
        } else {
            Err(BridgeError::InvalidHandle(handle))
        }
    }

    /// Capture the input snapshot for the next frame.
    pub fn capture_input(&mut self, keys: impl IntoIterator<Item = KeyCode>) {
        let mut host = self.api.host().borrow_mut();
        let next = host.frame() + 1;
        host.set_input(InputState::capture(next, keys));
    }

    pub fn replay_input(&mut self, timeline: &InputTimeline) {
        let mut host = self.api.host().borrow_mut();
        let next = host.frame() + 1;
        host.set_input(timeline.snapshot(next));
    }

    /// Advance the native frame and run the script-update phase.
    pub fn tick(&mut self, dt: f32) -> DispatchStats {
        let frame = self.api.host().borrow_mut().advance_frame(dt);
        tracing::trace!(frame, dt, "script update phase");
        self.dispatcher.tick(&self.api, dt)
    }

    pub fn state(&self, handle: EntityHandle) -> Option<LifecycleState> {
        self.dispatcher.state(handle)
    }

    pub fn instances(&self) -> impl Iterator<Item = EntityHandle> + '_ {
        self.dispatcher.handles()
    }

    pub fn host(&self) -> Ref<'_, NativeHost> {
        self.api.host().borrow()
    }

    pub fn host_mut(&self) -> RefMut<'_, NativeHost> {
        self.api.host().borrow_mut()
    }
}
