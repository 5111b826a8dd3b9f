//! Latch Script Bridge
//!
//! Lets managed scripts call into the native engine and lets the engine
//! drive script lifecycle callbacks.
//!
//! ## Architecture
//!
//! - **Calls:** an explicit `NativeCallTable` of function pointers, frozen
//!   when the `ScriptDomain` loads
//! - **Data:** components stay in the native `World`; scripts go through
//!   `ComponentAccessor`, which marshals on every access
//! - **Lifecycle:** `LifecycleDispatcher` runs OnCreate/OnUpdate in creation
//!   order and isolates failures per entity
//! - **Scripts:** Rust classes (`ClassDef`) or JavaScript classes via QuickJS
//!   (`JsRuntime`)

pub mod accessor;
pub mod api;
pub mod calls;
pub mod domain;
pub mod error;
pub mod handle;
pub mod host;
pub mod js;
pub mod lifecycle;
pub mod log;
pub mod marshal;
pub mod natives;
pub mod script;
pub mod signature;
pub mod types;

pub use accessor::ComponentAccessor;
pub use api::ScriptApi;
pub use calls::{native_error, CallId, NativeArgs, NativeCallTable, NativeCallable, NativeFn};
pub use domain::{DomainBuilder, ScriptDomain};
pub use error::{BindingError, BridgeError, BridgeResult, MarshallingError};
pub use handle::EntityHandle;
pub use host::NativeHost;
pub use js::{JsClass, JsRuntime};
pub use lifecycle::{DispatchStats, FailurePolicy, LifecycleDispatcher, LifecycleState};
pub use log::{LogLevel, LogRecord, NativeLog};
pub use marshal::{Marshal, Value, ValueLayout, ValueMarshaller, ValueType};
pub use script::{Capabilities, ClassDef, NativeImport, ScriptClass, ScriptInstance};
pub use signature::{Param, PassMode, Signature};
pub use types::{ComponentBinding, TypeRegistry};

pub use rquickjs;
