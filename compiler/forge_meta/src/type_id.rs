//! Type handles.
//!
//! `TypeId` is the only way the engine refers to a type. Builtin types have
//! fixed ids; every other id is handed out by a [`MetadataRegistry`] when a
//! type is registered or reserved for emission.
//!
//! [`MetadataRegistry`]: crate::MetadataRegistry

use std::fmt;

/// A 32-bit type handle.
///
/// Equality is id equality. Ids are never reused within a registry.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct TypeId(u32);

impl TypeId {
    // === Builtin Types (ids 0-7) ===

    /// No value. Result type of pure statements; also the "absent type" marker.
    pub const VOID: Self = Self(0);
    /// Root of the class hierarchy. Has a public parameterless constructor.
    pub const OBJECT: Self = Self(1);
    /// `bool`.
    pub const BOOL: Self = Self(2);
    /// 32-bit signed integer.
    pub const I32: Self = Self(3);
    /// 64-bit signed integer.
    pub const I64: Self = Self(4);
    /// 64-bit float.
    pub const F64: Self = Self(5);
    /// Immutable UTF-8 string.
    pub const STRING: Self = Self(6);

    /// First id handed out for registered (non-builtin) types.
    pub const FIRST_DYNAMIC: u32 = 16;

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_void(self) -> bool {
        self.0 == Self::VOID.0
    }

    #[inline]
    pub const fn is_builtin(self) -> bool {
        self.0 < Self::FIRST_DYNAMIC
    }

    /// Value types are passed by value and cannot be null.
    #[inline]
    pub const fn is_value_type(self) -> bool {
        matches!(self.0, 2..=5)
    }

    /// Name of a builtin type, `None` for registered types.
    pub const fn builtin_name(self) -> Option<&'static str> {
        match self.0 {
            0 => Some("void"),
            1 => Some("object"),
            2 => Some("bool"),
            3 => Some("i32"),
            4 => Some("i64"),
            5 => Some("f64"),
            6 => Some("string"),
            _ => None,
        }
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.builtin_name() {
            Some(name) => write!(f, "TypeId::{name}"),
            None => write!(f, "TypeId({})", self.0),
        }
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.builtin_name() {
            Some(name) => f.write_str(name),
            None => write!(f, "type#{}", self.0),
        }
    }
}

const _: () = assert!(std::mem::size_of::<TypeId>() == 4);
