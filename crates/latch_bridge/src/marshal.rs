//! Value marshalling across the script boundary
//!
//! Managed code sees [`Value`] trees; native code sees little-endian byte
//! buffers laid out with C rules. [`ValueMarshaller`] converts between the
//! two given a [`ValueType`], and refuses anything that does not match the
//! layout exactly: a short buffer or a missing field is schema drift, never
//! a truncation.

use crate::error::MarshallingError;
use latch_core::ecs::{layout_fields, ComponentMeta, FieldKind, FieldMeta};
use latch_core::math::Vec2;
use std::fmt;
use std::rc::Rc;

/// Ordered, C-laid-out field descriptor for a struct value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueLayout {
    name: String,
    fields: Vec<FieldMeta>,
    size: usize,
    align: usize,
}

impl ValueLayout {
    pub fn new(name: &str, fields: &[(&str, FieldKind)]) -> Self {
        let (fields, size, align) = layout_fields(fields);
        Self {
            name: name.to_string(),
            fields,
            size,
            align,
        }
    }

    /// The managed view of a native component layout.
    pub fn from_component(meta: &ComponentMeta) -> Self {
        Self {
            name: meta.name.clone(),
            fields: meta.fields.clone(),
            size: meta.size,
            align: meta.align,
        }
    }

    /// Two `f32` fields `x`, `y`.
    pub fn vector2() -> Self {
        Self::new("Vector2", &[("x", FieldKind::F32), ("y", FieldKind::F32)])
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldMeta] {
        &self.fields
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn align(&self) -> usize {
        self.align
    }

    /// Position and metadata of a named field.
    pub fn field(&self, name: &str) -> Result<(usize, &FieldMeta), MarshallingError> {
        self.fields
            .iter()
            .enumerate()
            .find(|(_, f)| f.name == name)
            .ok_or_else(|| MarshallingError::UnknownField {
                layout: self.name.clone(),
                field: name.to_string(),
            })
    }

    /// Same shape in memory: kinds, offsets and size agree. Names are ignored.
    pub fn same_shape(&self, other: &ValueLayout) -> bool {
        self.size == other.size
            && self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(&other.fields)
                .all(|(a, b)| a.kind == b.kind && a.offset == b.offset)
    }
}

/// Shape of a value crossing the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ValueType {
    #[default]
    Unit,
    Prim(FieldKind),
    Str,
    Struct(Rc<ValueLayout>),
}

impl ValueType {
    pub fn layout(layout: ValueLayout) -> Self {
        ValueType::Struct(Rc::new(layout))
    }

    /// Fixed byte size, `None` for strings.
    pub fn size(&self) -> Option<usize> {
        match self {
            ValueType::Unit => Some(0),
            ValueType::Prim(kind) => Some(kind.size()),
            ValueType::Str => None,
            ValueType::Struct(layout) => Some(layout.size()),
        }
    }

    /// Whether values of `other` can be read as `self`.
    pub fn accepts(&self, other: &ValueType) -> bool {
        match (self, other) {
            (ValueType::Struct(a), ValueType::Struct(b)) => a.same_shape(b),
            (a, b) => a == b,
        }
    }

    pub fn ensure_accepts(&self, other: &ValueType) -> Result<(), MarshallingError> {
        if self.accepts(other) {
            Ok(())
        } else {
            Err(MarshallingError::TypeMismatch {
                expected: self.to_string(),
                actual: other.to_string(),
            })
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Unit => f.write_str("void"),
            ValueType::Prim(kind) => write!(f, "{kind}"),
            ValueType::Str => f.write_str("string"),
            ValueType::Struct(layout) => f.write_str(layout.name()),
        }
    }
}

/// A managed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Unit,
    F32(f32),
    F64(f64),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    Str(String),
    Struct(Vec<Value>),
}

impl Value {
    /// Zero value of a type, as seen by a native out slot.
    pub fn zeroed(ty: &ValueType) -> Value {
        match ty {
            ValueType::Unit => Value::Unit,
            ValueType::Prim(kind) => Value::zero(*kind),
            ValueType::Str => Value::Str(String::new()),
            ValueType::Struct(layout) => {
                Value::Struct(layout.fields().iter().map(|f| Value::zero(f.kind)).collect())
            }
        }
    }

    fn zero(kind: FieldKind) -> Value {
        match kind {
            FieldKind::F32 => Value::F32(0.0),
            FieldKind::F64 => Value::F64(0.0),
            FieldKind::I32 => Value::I32(0),
            FieldKind::U32 => Value::U32(0),
            FieldKind::I64 => Value::I64(0),
            FieldKind::U64 => Value::U64(0),
        }
    }

    /// Convert a script number into a primitive of the given kind.
    ///
    /// Integer kinds take only integral values inside their range. `f32`
    /// rounds to nearest but rejects finite values it cannot hold.
    pub fn from_number(kind: FieldKind, n: f64) -> Result<Value, MarshallingError> {
        let integral = |min: f64, end: f64| n.fract() == 0.0 && n >= min && n < end;
        let value = match kind {
            FieldKind::F32 if !(n.is_finite() && (n as f32).is_infinite()) => Value::F32(n as f32),
            FieldKind::F64 => Value::F64(n),
            FieldKind::I32 if integral(-2f64.powi(31), 2f64.powi(31)) => Value::I32(n as i32),
            FieldKind::U32 if integral(0.0, 2f64.powi(32)) => Value::U32(n as u32),
            FieldKind::I64 if integral(-2f64.powi(63), 2f64.powi(63)) => Value::I64(n as i64),
            FieldKind::U64 if integral(0.0, 2f64.powi(64)) => Value::U64(n as u64),
            _ => {
                return Err(MarshallingError::TypeMismatch {
                    expected: kind.name().to_string(),
                    actual: n.to_string(),
                })
            }
        };
        Ok(value)
    }

    /// Parse a decimal integer (a script bigint) into an integer kind.
    pub fn from_integer_text(kind: FieldKind, text: &str) -> Result<Value, MarshallingError> {
        let parsed = match kind {
            FieldKind::I32 => text.parse().ok().map(Value::I32),
            FieldKind::U32 => text.parse().ok().map(Value::U32),
            FieldKind::I64 => text.parse().ok().map(Value::I64),
            FieldKind::U64 => text.parse().ok().map(Value::U64),
            FieldKind::F32 | FieldKind::F64 => None,
        };
        parsed.ok_or_else(|| MarshallingError::TypeMismatch {
            expected: kind.name().to_string(),
            actual: format!("{text}n"),
        })
    }

    pub fn to_number(&self) -> Option<f64> {
        match *self {
            Value::F32(v) => Some(f64::from(v)),
            Value::F64(v) => Some(v),
            Value::I32(v) => Some(f64::from(v)),
            Value::U32(v) => Some(f64::from(v)),
            Value::I64(v) => Some(v as f64),
            Value::U64(v) => Some(v as f64),
            _ => None,
        }
    }

    pub fn kind(&self) -> Option<FieldKind> {
        match self {
            Value::F32(_) => Some(FieldKind::F32),
            Value::F64(_) => Some(FieldKind::F64),
            Value::I32(_) => Some(FieldKind::I32),
            Value::U32(_) => Some(FieldKind::U32),
            Value::I64(_) => Some(FieldKind::I64),
            Value::U64(_) => Some(FieldKind::U64),
            _ => None,
        }
    }

    fn describe(&self) -> String {
        match self {
            Value::Unit => "void".to_string(),
            Value::Str(_) => "string".to_string(),
            Value::Struct(fields) => format!("struct of {} fields", fields.len()),
            other => other.kind().map(FieldKind::name).unwrap_or("?").to_string(),
        }
    }

    /// Equality that compares floats by bit pattern.
    pub fn bit_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::F32(a), Value::F32(b)) => a.to_bits() == b.to_bits(),
            (Value::F64(a), Value::F64(b)) => a.to_bits() == b.to_bits(),
            (Value::Struct(a), Value::Struct(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(a, b)| a.bit_eq(b))
            }
            (a, b) => a == b,
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        })*
    };
}

value_from!(f32 => F32, f64 => F64, i32 => I32, u32 => U32, i64 => I64, u64 => U64, String => Str);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

/// Packs and unpacks values against their declared types.
pub struct ValueMarshaller;

impl ValueMarshaller {
    pub fn pack(ty: &ValueType, value: &Value) -> Result<Vec<u8>, MarshallingError> {
        match (ty, value) {
            (ValueType::Unit, Value::Unit) => Ok(Vec::new()),
            (ValueType::Prim(kind), value) => {
                let mut out = vec![0u8; kind.size()];
                write_prim(*kind, value, &mut out)?;
                Ok(out)
            }
            (ValueType::Str, Value::Str(s)) => Ok(s.as_bytes().to_vec()),
            (ValueType::Struct(layout), Value::Struct(fields)) => Self::pack_struct(layout, fields),
            (ty, value) => Err(mismatch(ty, value)),
        }
    }

    pub fn unpack(ty: &ValueType, bytes: &[u8]) -> Result<Value, MarshallingError> {
        match ty {
            ValueType::Unit => {
                expect_len(ty, 0, bytes)?;
                Ok(Value::Unit)
            }
            ValueType::Prim(kind) => {
                expect_len(ty, kind.size(), bytes)?;
                Ok(read_prim(*kind, bytes))
            }
            ValueType::Str => String::from_utf8(bytes.to_vec())
                .map(Value::Str)
                .map_err(|_| MarshallingError::TypeMismatch {
                    expected: "string".to_string(),
                    actual: "non-utf8 bytes".to_string(),
                }),
            ValueType::Struct(layout) => Self::unpack_struct(layout, bytes).map(Value::Struct),
        }
    }

    pub fn pack_struct(layout: &ValueLayout, fields: &[Value]) -> Result<Vec<u8>, MarshallingError> {
        if fields.len() != layout.fields().len() {
            return Err(MarshallingError::FieldCount {
                layout: layout.name().to_string(),
                expected: layout.fields().len(),
                actual: fields.len(),
            });
        }
        let mut out = vec![0u8; layout.size()];
        for (meta, value) in layout.fields().iter().zip(fields) {
            write_prim(meta.kind, value, &mut out[meta.offset..meta.offset + meta.kind.size()])?;
        }
        Ok(out)
    }

    pub fn unpack_struct(layout: &ValueLayout, bytes: &[u8]) -> Result<Vec<Value>, MarshallingError> {
        if bytes.len() != layout.size() {
            return Err(MarshallingError::BufferSize {
                layout: layout.name().to_string(),
                expected: layout.size(),
                actual: bytes.len(),
            });
        }
        Ok(layout
            .fields()
            .iter()
            .map(|meta| read_prim(meta.kind, &bytes[meta.offset..meta.offset + meta.kind.size()]))
            .collect())
    }

    /// Bind-time check of a managed declaration against native metadata.
    pub fn check_compatible(managed: &ValueLayout, native: &ComponentMeta) -> Result<(), MarshallingError> {
        let drift = |detail: String| MarshallingError::SchemaDrift {
            name: native.name.clone(),
            detail,
        };
        if managed.fields().len() != native.fields.len() {
            return Err(drift(format!(
                "managed side declares {} fields, native side has {}",
                managed.fields().len(),
                native.fields.len()
            )));
        }
        for (m, n) in managed.fields().iter().zip(&native.fields) {
            if m.kind != n.kind || m.offset != n.offset {
                return Err(drift(format!(
                    "field '{}' is {} at offset {} on the managed side but '{}' is {} at offset {} natively",
                    m.name, m.kind, m.offset, n.name, n.kind, n.offset
                )));
            }
        }
        if managed.size() != native.size {
            return Err(drift(format!(
                "managed size {} differs from native size {}",
                managed.size(),
                native.size
            )));
        }
        Ok(())
    }
}

fn mismatch(ty: &ValueType, value: &Value) -> MarshallingError {
    MarshallingError::TypeMismatch {
        expected: ty.to_string(),
        actual: value.describe(),
    }
}

fn expect_len(ty: &ValueType, expected: usize, bytes: &[u8]) -> Result<(), MarshallingError> {
    if bytes.len() == expected {
        Ok(())
    } else {
        Err(MarshallingError::BufferSize {
            layout: ty.to_string(),
            expected,
            actual: bytes.len(),
        })
    }
}

fn write_prim(kind: FieldKind, value: &Value, out: &mut [u8]) -> Result<(), MarshallingError> {
    match (kind, value) {
        (FieldKind::F32, Value::F32(v)) => out.copy_from_slice(&v.to_le_bytes()),
        (FieldKind::F64, Value::F64(v)) => out.copy_from_slice(&v.to_le_bytes()),
        (FieldKind::I32, Value::I32(v)) => out.copy_from_slice(&v.to_le_bytes()),
        (FieldKind::U32, Value::U32(v)) => out.copy_from_slice(&v.to_le_bytes()),
        (FieldKind::I64, Value::I64(v)) => out.copy_from_slice(&v.to_le_bytes()),
        (FieldKind::U64, Value::U64(v)) => out.copy_from_slice(&v.to_le_bytes()),
        (kind, value) => return Err(mismatch(&ValueType::Prim(kind), value)),
    }
    Ok(())
}

// Callers guarantee `bytes.len() == kind.size()`.
fn read_prim(kind: FieldKind, bytes: &[u8]) -> Value {
    let mut four = [0u8; 4];
    let mut eight = [0u8; 8];
    match kind {
        FieldKind::F32 | FieldKind::I32 | FieldKind::U32 => four.copy_from_slice(bytes),
        FieldKind::F64 | FieldKind::I64 | FieldKind::U64 => eight.copy_from_slice(bytes),
    }
    match kind {
        FieldKind::F32 => Value::F32(f32::from_le_bytes(four)),
        FieldKind::I32 => Value::I32(i32::from_le_bytes(four)),
        FieldKind::U32 => Value::U32(u32::from_le_bytes(four)),
        FieldKind::F64 => Value::F64(f64::from_le_bytes(eight)),
        FieldKind::I64 => Value::I64(i64::from_le_bytes(eight)),
        FieldKind::U64 => Value::U64(u64::from_le_bytes(eight)),
    }
}

/// Rust types that cross the boundary.
pub trait Marshal: Sized {
    fn value_type() -> ValueType;
    fn into_value(self) -> Value;
    fn from_value(value: Value) -> Result<Self, MarshallingError>;
}

macro_rules! marshal_prim {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl Marshal for $ty {
            fn value_type() -> ValueType {
                ValueType::Prim(FieldKind::$variant)
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: Value) -> Result<Self, MarshallingError> {
                match value {
                    Value::$variant(v) => Ok(v),
                    other => Err(mismatch(&Self::value_type(), &other)),
                }
            }
        })*
    };
}

marshal_prim!(f32 => F32, f64 => F64, i32 => I32, u32 => U32, i64 => I64, u64 => U64);

impl Marshal for () {
    fn value_type() -> ValueType {
        ValueType::Unit
    }

    fn into_value(self) -> Value {
        Value::Unit
    }

    fn from_value(value: Value) -> Result<Self, MarshallingError> {
        match value {
            Value::Unit => Ok(()),
            other => Err(mismatch(&ValueType::Unit, &other)),
        }
    }
}

impl Marshal for String {
    fn value_type() -> ValueType {
        ValueType::Str
    }

    fn into_value(self) -> Value {
        Value::Str(self)
    }

    fn from_value(value: Value) -> Result<Self, MarshallingError> {
        match value {
            Value::Str(s) => Ok(s),
            other => Err(mismatch(&ValueType::Str, &other)),
        }
    }
}

impl Marshal for Vec2 {
    fn value_type() -> ValueType {
        ValueType::layout(ValueLayout::vector2())
    }

    fn into_value(self) -> Value {
        Value::Struct(vec![Value::F32(self.x), Value::F32(self.y)])
    }

    fn from_value(value: Value) -> Result<Self, MarshallingError> {
        match value {
            Value::Struct(fields) => match fields.as_slice() {
                [Value::F32(x), Value::F32(y)] => Ok(Vec2::new(*x, *y)),
                _ => Err(MarshallingError::FieldCount {
                    layout: "Vector2".to_string(),
                    expected: 2,
                    actual: fields.len(),
                }),
            },
            other => Err(mismatch(&Self::value_type(), &other)),
        }
    }
}
