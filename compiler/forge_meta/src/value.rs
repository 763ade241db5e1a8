//! Constant values and attribute specs.
//!
//! Constants appear in three places: literal expression nodes, parameter
//! default values, and attribute arguments. They share one representation.

use std::fmt;

use crate::TypeId;

/// A compile-time constant.
///
/// Floats are stored as raw bits so the enum keeps `Eq` and `Hash`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum ConstValue {
    /// Null reference; typed as `object`.
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F64(u64),
    Str(Box<str>),
}

impl ConstValue {
    /// Build a float constant.
    #[inline]
    pub fn f64(value: f64) -> Self {
        ConstValue::F64(value.to_bits())
    }

    /// Build a string constant.
    #[inline]
    pub fn str(value: &str) -> Self {
        ConstValue::Str(value.into())
    }

    /// The type a constant loads as.
    pub const fn ty(&self) -> TypeId {
        match self {
            ConstValue::Null => TypeId::OBJECT,
            ConstValue::Bool(_) => TypeId::BOOL,
            ConstValue::I32(_) => TypeId::I32,
            ConstValue::I64(_) => TypeId::I64,
            ConstValue::F64(_) => TypeId::F64,
            ConstValue::Str(_) => TypeId::STRING,
        }
    }

    /// Zero value for `ty`: `false`, `0`, `0.0`, or null for reference types.
    ///
    /// Returns `None` for `void`, which has no value.
    pub fn default_for(ty: TypeId) -> Option<Self> {
        match ty {
            TypeId::VOID => None,
            TypeId::BOOL => Some(ConstValue::Bool(false)),
            TypeId::I32 => Some(ConstValue::I32(0)),
            TypeId::I64 => Some(ConstValue::I64(0)),
            TypeId::F64 => Some(ConstValue::f64(0.0)),
            _ => Some(ConstValue::Null),
        }
    }

    /// Whether a constant of this kind may initialize a slot of type `ty`.
    ///
    /// Null fits any reference type.
    pub fn fits(&self, ty: TypeId) -> bool {
        match self {
            ConstValue::Null => !ty.is_value_type() && !ty.is_void(),
            other => other.ty() == ty,
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Null => f.write_str("null"),
            ConstValue::Bool(b) => write!(f, "{b}"),
            ConstValue::I32(n) => write!(f, "{n}"),
            ConstValue::I64(n) => write!(f, "{n}L"),
            ConstValue::F64(bits) => write!(f, "{:?}", f64::from_bits(*bits)),
            ConstValue::Str(s) => write!(f, "{s:?}"),
        }
    }
}

/// A metadata tag attached to a parameter, member, or type.
///
/// Mirrors a custom attribute application: the attribute's name, its
/// positional arguments, and its named arguments, all kept in source order.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct AttributeSpec {
    pub name: String,
    pub args: Vec<ConstValue>,
    pub named: Vec<(String, ConstValue)>,
}

impl AttributeSpec {
    /// A tag with no arguments.
    pub fn marker(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            named: Vec::new(),
        }
    }

    /// Add a positional argument.
    #[must_use]
    pub fn with_arg(mut self, value: ConstValue) -> Self {
        self.args.push(value);
        self
    }

    /// Add a named argument.
    #[must_use]
    pub fn with_named(mut self, key: impl Into<String>, value: ConstValue) -> Self {
        self.named.push((key.into(), value));
        self
    }
}

impl fmt::Display for AttributeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}", self.name)?;
        if self.args.is_empty() && self.named.is_empty() {
            return f.write_str("]");
        }
        f.write_str("(")?;
        let mut first = true;
        for arg in &self.args {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{arg}")?;
            first = false;
        }
        for (key, value) in &self.named {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{key} = {value}")?;
            first = false;
        }
        f.write_str(")]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_report_their_type() {
        assert_eq!(ConstValue::I32(1).ty(), TypeId::I32);
        assert_eq!(ConstValue::str("x").ty(), TypeId::STRING);
        assert_eq!(ConstValue::Null.ty(), TypeId::OBJECT);
    }

    #[test]
    fn null_fits_reference_types_only() {
        assert!(ConstValue::Null.fits(TypeId::STRING));
        assert!(ConstValue::Null.fits(TypeId::from_raw(99)));
        assert!(!ConstValue::Null.fits(TypeId::I32));
        assert!(!ConstValue::Null.fits(TypeId::VOID));
        assert!(!ConstValue::I64(1).fits(TypeId::I32));
    }

    #[test]
    fn default_for_void_is_none() {
        assert_eq!(ConstValue::default_for(TypeId::VOID), None);
        assert_eq!(ConstValue::default_for(TypeId::I64), Some(ConstValue::I64(0)));
        assert_eq!(
            ConstValue::default_for(TypeId::STRING),
            Some(ConstValue::Null)
        );
    }

    #[test]
    fn attribute_display() {
        let spec = AttributeSpec::marker("Range")
            .with_arg(ConstValue::I32(1))
            .with_named("Max", ConstValue::I32(9));
        assert_eq!(spec.to_string(), "[Range(1, Max = 9)]");
        assert_eq!(AttributeSpec::marker("X").to_string(), "[X]");
    }
}
