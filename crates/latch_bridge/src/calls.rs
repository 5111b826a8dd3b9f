//! Native call table
//!
//! Bindings are registered explicitly at startup, checked for conflicts, and
//! frozen before any script runs. After `freeze` the table is read-only and
//! shared behind an `Rc`.

use crate::error::{BindingError, BridgeError, BridgeResult, MarshallingError};
use crate::host::NativeHost;
use crate::marshal::{Marshal, Value, ValueMarshaller, ValueType};
use crate::signature::{PassMode, Signature};
use std::collections::HashMap;
use std::rc::Rc;

/// Native implementation. Identity is the function pointer itself.
pub type NativeFn = fn(&mut NativeHost, &mut NativeArgs) -> BridgeResult<Value>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CallId(u32);

impl CallId {
    pub fn index(self) -> u32 {
        self.0
    }
}

pub struct NativeBinding {
    id: CallId,
    name: String,
    signature: Signature,
    func: NativeFn,
}

/// A resolved binding, cheap to clone.
#[derive(Clone)]
pub struct NativeCallable(Rc<NativeBinding>);

impl std::fmt::Debug for NativeCallable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NativeCallable({} {})", self.0.name, self.0.signature)
    }
}

impl NativeCallable {
    pub fn id(&self) -> CallId {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn signature(&self) -> &Signature {
        &self.0.signature
    }

    /// Marshal `args` in, run the native implementation, marshal ref and out
    /// slots back into `args`. The call is synchronous.
    pub fn invoke(&self, host: &mut NativeHost, args: &mut [Value]) -> BridgeResult<Value> {
        let binding = &self.0;
        let params = binding.signature.params();
        if args.len() != params.len() {
            return Err(MarshallingError::Arity {
                expected: params.len(),
                actual: args.len(),
            }
            .into());
        }

        let mut slots = Vec::with_capacity(params.len());
        for (param, arg) in params.iter().zip(args.iter()) {
            let bytes = match param.mode {
                PassMode::Out => vec![0u8; param.ty.size().unwrap_or(0)],
                PassMode::ByValue | PassMode::Ref => ValueMarshaller::pack(&param.ty, arg)?,
            };
            slots.push(ArgSlot {
                mode: param.mode,
                ty: param.ty.clone(),
                bytes,
            });
        }

        let mut native_args = NativeArgs { slots };
        tracing::trace!(call = %binding.name, signature = %binding.signature, "native call");
        let ret = (binding.func)(host, &mut native_args)?;
        let ret_bytes = ValueMarshaller::pack(binding.signature.ret(), &ret)?;
        let ret = ValueMarshaller::unpack(binding.signature.ret(), &ret_bytes)?;

        for (arg, slot) in args.iter_mut().zip(native_args.slots) {
            if slot.mode != PassMode::ByValue {
                *arg = ValueMarshaller::unpack(&slot.ty, &slot.bytes)?;
            }
        }
        Ok(ret)
    }
}

struct ArgSlot {
    mode: PassMode,
    ty: ValueType,
    bytes: Vec<u8>,
}

/// Native-side view of the marshalled arguments.
pub struct NativeArgs {
    slots: Vec<ArgSlot>,
}

impl NativeArgs {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn slot(&self, index: usize) -> Result<&ArgSlot, MarshallingError> {
        self.slots
            .get(index)
            .ok_or(MarshallingError::NoSuchArgument { index })
    }

    /// Unpack argument `index`. Out slots cannot be read.
    pub fn value(&self, index: usize) -> BridgeResult<Value> {
        let slot = self.slot(index)?;
        if slot.mode == PassMode::Out {
            return Err(MarshallingError::ReadFromOut { index }.into());
        }
        Ok(ValueMarshaller::unpack(&slot.ty, &slot.bytes)?)
    }

    pub fn read<T: Marshal>(&self, index: usize) -> BridgeResult<T> {
        self.slot(index)?.ty.ensure_accepts(&T::value_type())?;
        Ok(T::from_value(self.value(index)?)?)
    }

    pub fn str(&self, index: usize) -> BridgeResult<String> {
        self.read::<String>(index)
    }

    /// Overwrite a ref or out slot.
    pub fn set_value(&mut self, index: usize, value: &Value) -> BridgeResult<()> {
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(MarshallingError::NoSuchArgument { index })?;
        if slot.mode == PassMode::ByValue {
            return Err(MarshallingError::WriteToByValue { index }.into());
        }
        slot.bytes = ValueMarshaller::pack(&slot.ty, value)?;
        Ok(())
    }

    pub fn write<T: Marshal>(&mut self, index: usize, value: T) -> BridgeResult<()> {
        self.slot(index)?.ty.ensure_accepts(&T::value_type())?;
        self.set_value(index, &value.into_value())
    }
}

/// Registry of native calls by symbolic name.
#[derive(Default)]
pub struct NativeCallTable {
    bindings: Vec<NativeCallable>,
    name_lookup: HashMap<String, CallId>,
    frozen: bool,
}

impl NativeCallTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `func`. Re-registering the identical triple returns the
    /// existing id; anything else under the same name is a conflict.
    pub fn register(
        &mut self,
        name: &str,
        signature: Signature,
        func: NativeFn,
    ) -> Result<CallId, BindingError> {
        if let Some(&id) = self.name_lookup.get(name) {
            let existing = &self.bindings[id.0 as usize].0;
            if existing.signature != signature {
                return Err(BindingError::Conflict {
                    name: name.to_string(),
                    existing: existing.signature.to_string(),
                    requested: signature.to_string(),
                });
            }
            if existing.func as usize != func as usize {
                return Err(BindingError::DuplicateImpl {
                    name: name.to_string(),
                });
            }
            tracing::trace!(call = name, "duplicate registration collapsed");
            return Ok(id);
        }

        if self.frozen {
            return Err(BindingError::Frozen {
                name: name.to_string(),
            });
        }

        let id = CallId(self.bindings.len() as u32);
        tracing::debug!(call = name, %signature, "registered native call");
        self.bindings.push(NativeCallable(Rc::new(NativeBinding {
            id,
            name: name.to_string(),
            signature,
            func,
        })));
        self.name_lookup.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn resolve(&self, name: &str) -> Result<NativeCallable, BindingError> {
        self.name_lookup
            .get(name)
            .and_then(|id| self.bindings.get(id.0 as usize))
            .cloned()
            .ok_or_else(|| BindingError::Unresolved {
                name: name.to_string(),
            })
    }

    /// Resolve and verify the caller's view of the signature.
    pub fn resolve_checked(
        &self,
        name: &str,
        expected: &Signature,
    ) -> Result<NativeCallable, BindingError> {
        let callable = self.resolve(name)?;
        if !callable.signature().matches(expected) {
            return Err(BindingError::SignatureMismatch {
                name: name.to_string(),
                expected: expected.to_string(),
                actual: callable.signature().to_string(),
            });
        }
        Ok(callable)
    }

    pub fn get(&self, id: CallId) -> Option<&NativeCallable> {
        self.bindings.get(id.0 as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NativeCallable> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Shorthand for natives reporting their own failures.
pub fn native_error(call: &str, message: impl Into<String>) -> BridgeError {
    BridgeError::Native {
        call: call.to_string(),
        message: message.into(),
    }
}
