//! Bridge error taxonomy

use crate::handle::EntityHandle;
use latch_core::ecs::WorldError;
use latch_services::InputError;
use thiserror::Error;

pub type BridgeResult<T> = Result<T, BridgeError>;

/// Unresolved or mismatched native calls. Fatal at domain load.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindingError {
    #[error("native call '{name}' is not registered")]
    Unresolved { name: String },

    #[error("native call '{name}' is bound as {existing}, cannot rebind it as {requested}")]
    Conflict {
        name: String,
        existing: String,
        requested: String,
    },

    #[error("native call '{name}' is already bound to a different implementation")]
    DuplicateImpl { name: String },

    #[error("native call '{name}' is declared as {expected} but the native signature is {actual}")]
    SignatureMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("native call table is frozen, cannot register '{name}'")]
    Frozen { name: String },

    #[error("script class '{class}' imports unresolved native call '{name}'")]
    UnresolvedImport { class: String, name: String },

    #[error("script class '{0}' is already defined")]
    DuplicateClass(String),

    #[error("script class '{0}' is not defined")]
    UnknownClass(String),
}

/// Layout disagreements between the managed and native representations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MarshallingError {
    #[error("'{layout}' expects {expected} fields but received {actual}")]
    FieldCount {
        layout: String,
        expected: usize,
        actual: usize,
    },

    #[error("'{layout}' expects {expected} bytes but the buffer holds {actual}")]
    BufferSize {
        layout: String,
        expected: usize,
        actual: usize,
    },

    #[error("expected {expected} but received {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("schema drift on '{name}': {detail}")]
    SchemaDrift { name: String, detail: String },

    #[error("call expects {expected} arguments but received {actual}")]
    Arity { expected: usize, actual: usize },

    #[error("argument {index} does not exist")]
    NoSuchArgument { index: usize },

    #[error("argument {index} is an out parameter and cannot be read")]
    ReadFromOut { index: usize },

    #[error("argument {index} is passed by value and cannot be written")]
    WriteToByValue { index: usize },

    #[error("'{layout}' has no field '{field}'")]
    UnknownField { layout: String, field: String },
}

#[derive(Debug, Error, PartialEq)]
pub enum BridgeError {
    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error(transparent)]
    Marshalling(#[from] MarshallingError),

    #[error("entity {handle} has no component '{component}'")]
    ComponentNotFound {
        handle: EntityHandle,
        component: String,
    },

    #[error("handle {0} refers to a destroyed entity")]
    InvalidHandle(EntityHandle),

    #[error("unknown input code {0}")]
    UnknownInputCode(u32),

    #[error("component type '{0}' is not exposed to scripts")]
    UnknownComponentType(String),

    #[error("native call '{call}' failed: {message}")]
    Native { call: String, message: String },

    #[error("script '{class}' failed: {message}")]
    Script { class: String, message: String },

    #[error(transparent)]
    World(#[from] WorldError),
}

impl From<InputError> for BridgeError {
    fn from(err: InputError) -> Self {
        match err {
            InputError::UnknownCode(code) => BridgeError::UnknownInputCode(code),
        }
    }
}

impl BridgeError {
    /// Errors that indicate build skew between native and managed code.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BridgeError::Binding(_) | BridgeError::Marshalling(_))
    }
}
