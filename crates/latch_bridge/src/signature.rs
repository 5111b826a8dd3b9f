//! Native call signatures

use crate::marshal::{Marshal, ValueType};
use std::fmt;

/// How an argument crosses the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassMode {
    /// Copied in once; native writes are rejected.
    ByValue,
    /// Copied in, may be mutated, copied back before the call returns.
    Ref,
    /// Native sees a zeroed slot and produces the value.
    Out,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub mode: PassMode,
    pub ty: ValueType,
}

impl Param {
    pub fn by_value(ty: ValueType) -> Self {
        Self {
            mode: PassMode::ByValue,
            ty,
        }
    }

    pub fn by_ref(ty: ValueType) -> Self {
        Self {
            mode: PassMode::Ref,
            ty,
        }
    }

    pub fn out(ty: ValueType) -> Self {
        Self {
            mode: PassMode::Out,
            ty,
        }
    }

    pub fn of<T: Marshal>() -> Self {
        Self::by_value(T::value_type())
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            PassMode::ByValue => write!(f, "{}", self.ty),
            PassMode::Ref => write!(f, "ref {}", self.ty),
            PassMode::Out => write!(f, "out {}", self.ty),
        }
    }
}

/// Parameter list plus return type.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Signature {
    params: Vec<Param>,
    ret: ValueType,
}

impl Signature {
    pub fn new(params: Vec<Param>, ret: ValueType) -> Self {
        Self { params, ret }
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn ret(&self) -> &ValueType {
        &self.ret
    }

    /// Exact agreement, including layout names.
    pub fn matches(&self, other: &Signature) -> bool {
        self == other
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{param}")?;
        }
        write!(f, ") -> {}", self.ret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use latch_core::ecs::FieldKind;
    use latch_core::math::Vec2;

    #[test]
    fn test_display() {
        let sig = Signature::new(
            vec![Param::by_ref(Vec2::value_type()), Param::out(Vec2::value_type())],
            ValueType::Unit,
        );
        assert_eq!(sig.to_string(), "(ref Vector2, out Vector2) -> void");

        let sig = Signature::new(vec![Param::of::<String>(), Param::of::<i32>()], ValueType::Unit);
        assert_eq!(sig.to_string(), "(string, i32) -> void");
    }

    #[test]
    fn test_matches_is_exact() {
        let a = Signature::new(vec![Param::of::<u32>()], ValueType::Prim(FieldKind::U32));
        let b = Signature::new(vec![Param::by_ref(u32::value_type())], ValueType::Prim(FieldKind::U32));
        assert!(a.matches(&a.clone()));
        assert!(!a.matches(&b));
        assert_eq!(Signature::default().to_string(), "() -> void");
    }
}
