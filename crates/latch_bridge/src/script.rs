//! Script classes and instances
//!
//! A class declares which lifecycle callbacks it implements and which native
//! calls it imports; the domain resolves the imports before anything runs.

use crate::api::ScriptApi;
use crate::error::BridgeResult;
use crate::handle::EntityHandle;
use crate::signature::Signature;

/// Lifecycle callbacks a class implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub on_create: bool,
    pub on_update: bool,
}

impl Capabilities {
    pub const NONE: Self = Self::new(false, false);
    pub const CREATE: Self = Self::new(true, false);
    pub const UPDATE: Self = Self::new(false, true);
    pub const ALL: Self = Self::new(true, true);

    pub const fn new(on_create: bool, on_update: bool) -> Self {
        Self {
            on_create,
            on_update,
        }
    }
}

/// A native call a class depends on. With a signature, the caller's view is
/// checked against the native one at load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeImport {
    pub name: String,
    pub signature: Option<Signature>,
}

impl NativeImport {
    pub fn new(name: &str, signature: Signature) -> Self {
        Self {
            name: name.to_string(),
            signature: Some(signature),
        }
    }

    pub fn unchecked(name: &str) -> Self {
        Self {
            name: name.to_string(),
            signature: None,
        }
    }
}

/// Per-entity script state.
pub trait ScriptInstance {
    fn on_create(&mut self, _api: &ScriptApi) -> BridgeResult<()> {
        Ok(())
    }

    fn on_update(&mut self, _api: &ScriptApi, _dt: f32) -> BridgeResult<()> {
        Ok(())
    }
}

pub trait ScriptClass {
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    fn imports(&self) -> Vec<NativeImport> {
        Vec::new()
    }

    /// Called once when the domain finishes loading.
    fn bind(&self, _api: &ScriptApi) -> BridgeResult<()> {
        Ok(())
    }

    fn instantiate(&self, api: &ScriptApi, handle: EntityHandle) -> BridgeResult<Box<dyn ScriptInstance>>;
}

type Factory = Box<dyn Fn(EntityHandle) -> Box<dyn ScriptInstance>>;

/// A Rust-defined script class built from a factory closure.
pub struct ClassDef {
    name: String,
    capabilities: Capabilities,
    imports: Vec<NativeImport>,
    factory: Factory,
}

impl ClassDef {
    pub fn new<F, I>(name: &str, capabilities: Capabilities, factory: F) -> Self
    where
        F: Fn(EntityHandle) -> I + 'static,
        I: ScriptInstance + 'static,
    {
        Self {
            name: name.to_string(),
            capabilities,
            imports: Vec::new(),
            factory: Box::new(move |handle| Box::new(factory(handle))),
        }
    }

    pub fn import(mut self, import: NativeImport) -> Self {
        self.imports.push(import);
        self
    }
}

impl ScriptClass for ClassDef {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn imports(&self) -> Vec<NativeImport> {
        self.imports.clone()
    }

    fn instantiate(&self, _api: &ScriptApi, handle: EntityHandle) -> BridgeResult<Box<dyn ScriptInstance>> {
        Ok((self.factory)(handle))
    }
}
