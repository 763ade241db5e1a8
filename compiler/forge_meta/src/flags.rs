//! Flag sets for types, members, and parameters.

use bitflags::bitflags;

bitflags! {
    /// Directionality and optionality of a formal parameter.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
    #[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
    pub struct ParamAttributes: u16 {
        const IN = 1 << 0;
        const OUT = 1 << 1;
        const RETVAL = 1 << 3;
        const OPTIONAL = 1 << 4;
        /// Set when a default value is recorded for the parameter.
        const HAS_DEFAULT = 1 << 12;
    }
}

impl Default for ParamAttributes {
    fn default() -> Self {
        Self::empty()
    }
}

impl ParamAttributes {
    #[inline]
    pub const fn is_optional(self) -> bool {
        self.contains(Self::OPTIONAL)
    }
}

bitflags! {
    /// Visibility and contract flags shared by constructors, methods, and fields.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
    #[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
    pub struct MemberAttributes: u32 {
        // === Visibility (bits 0-3) ===
        const PRIVATE = 1 << 0;
        /// Visible to derived types.
        const FAMILY = 1 << 1;
        /// Visible inside the defining module.
        const ASSEMBLY = 1 << 2;
        const PUBLIC = 1 << 3;

        // === Contract (bits 8-15) ===
        const STATIC = 1 << 8;
        const VIRTUAL = 1 << 9;
        const FINAL = 1 << 10;
        const ABSTRACT = 1 << 11;
        const HIDE_BY_SIG = 1 << 12;
        const SPECIAL_NAME = 1 << 13;
        /// Field value is a compile-time constant.
        const LITERAL = 1 << 14;
        const INIT_ONLY = 1 << 15;
    }
}

impl Default for MemberAttributes {
    fn default() -> Self {
        Self::empty()
    }
}

impl MemberAttributes {
    /// Mask covering every visibility bit.
    pub const VISIBILITY_MASK: Self = Self::from_bits_truncate(
        Self::PRIVATE.bits() | Self::FAMILY.bits() | Self::ASSEMBLY.bits() | Self::PUBLIC.bits(),
    );

    #[inline]
    pub const fn is_public(self) -> bool {
        self.contains(Self::PUBLIC)
    }

    #[inline]
    pub const fn is_static(self) -> bool {
        self.contains(Self::STATIC)
    }

    #[inline]
    pub const fn is_abstract(self) -> bool {
        self.contains(Self::ABSTRACT)
    }

    /// Whether calls through this member dispatch on the receiver's runtime type.
    #[inline]
    pub const fn is_overridable(self) -> bool {
        self.intersects(Self::VIRTUAL.union(Self::ABSTRACT))
    }

    /// Whether a member with these flags is visible to a lookup with `binding`.
    pub const fn matches(self, binding: BindingFlags) -> bool {
        let scope_ok = if self.is_static() {
            binding.contains(BindingFlags::STATIC)
        } else {
            binding.contains(BindingFlags::INSTANCE)
        };
        let visibility_ok = if self.is_public() {
            binding.contains(BindingFlags::PUBLIC)
        } else {
            binding.contains(BindingFlags::NON_PUBLIC)
        };
        scope_ok && visibility_ok
    }
}

bitflags! {
    /// Filter for member lookups.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
    pub struct BindingFlags: u8 {
        const INSTANCE = 1 << 0;
        const STATIC = 1 << 1;
        const PUBLIC = 1 << 2;
        const NON_PUBLIC = 1 << 3;
    }
}

impl Default for BindingFlags {
    fn default() -> Self {
        Self::empty()
    }
}

impl BindingFlags {
    /// Instance members at any visibility.
    pub const ANY_INSTANCE: Self = Self::from_bits_truncate(
        Self::INSTANCE.bits() | Self::PUBLIC.bits() | Self::NON_PUBLIC.bits(),
    );
}

bitflags! {
    /// Calling convention of a constructor or method.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
    #[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
    pub struct CallingConventions: u8 {
        const STANDARD = 1 << 0;
        const VAR_ARGS = 1 << 1;
        const HAS_THIS = 1 << 5;
        const EXPLICIT_THIS = 1 << 6;
    }
}

impl Default for CallingConventions {
    fn default() -> Self {
        Self::STANDARD
    }
}

bitflags! {
    /// Kind and visibility of a type.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
    #[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
    pub struct TypeAttributes: u16 {
        const PUBLIC = 1 << 0;
        const INTERFACE = 1 << 5;
        const ABSTRACT = 1 << 7;
        const SEALED = 1 << 8;
    }
}

impl Default for TypeAttributes {
    fn default() -> Self {
        Self::empty()
    }
}

impl TypeAttributes {
    #[inline]
    pub const fn is_interface(self) -> bool {
        self.contains(Self::INTERFACE)
    }
}

/// Who supplies a member's body.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum ImplPolicy {
    /// Body is the instruction stream written by the emitter.
    #[default]
    Instructions,
    /// Body is native code bound by the host.
    Native,
    /// Body is synthesized by the host runtime itself.
    Runtime,
}

impl ImplPolicy {
    /// True when the host supplies the body and no instructions may be written.
    #[inline]
    pub const fn is_host_supplied(self) -> bool {
        !matches!(self, ImplPolicy::Instructions)
    }
}
