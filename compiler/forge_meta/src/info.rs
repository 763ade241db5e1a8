//! Reflective descriptions of types and their members.
//!
//! These are the records a metadata provider hands out. Member handles
//! (`ConstructorRef`, `MethodRef`, `FieldRef`) are small `Copy` values that
//! name a member by declaring type and declaration index; the full record is
//! looked up through [`MetadataProvider`](crate::MetadataProvider) when needed.

use crate::{
    AttributeSpec, CallingConventions, ConstValue, MemberAttributes, ParamAttributes,
    TypeAttributes, TypeId,
};

// ── Member handles ──────────────────────────────────────────────────

macro_rules! member_ref {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name {
            pub declaring_type: TypeId,
            pub index: u32,
        }

        impl $name {
            #[inline]
            pub const fn new(declaring_type: TypeId, index: u32) -> Self {
                Self { declaring_type, index }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}::{}", self.declaring_type, self.index)
            }
        }
    };
}

member_ref!(
    /// A constructor, by declaring type and declaration index.
    ConstructorRef
);
member_ref!(
    /// A method, by declaring type and declaration index.
    MethodRef
);
member_ref!(
    /// A field, by declaring type and declaration index.
    FieldRef
);

// ── Parameters ──────────────────────────────────────────────────────

/// One formal parameter of a reflected constructor or method.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct ParameterInfo {
    /// 1-based; position 0 is the receiver and never described.
    pub position: u16,
    pub name: String,
    pub ty: TypeId,
    pub attributes: ParamAttributes,
    pub default_value: Option<ConstValue>,
    /// Attached tags in source order.
    pub custom_attributes: Vec<AttributeSpec>,
}

impl ParameterInfo {
    pub fn new(position: u16, name: impl Into<String>, ty: TypeId) -> Self {
        Self {
            position,
            name: name.into(),
            ty,
            attributes: ParamAttributes::empty(),
            default_value: None,
            custom_attributes: Vec::new(),
        }
    }

    /// Mark optional with a default value.
    #[must_use]
    pub fn with_default(mut self, value: ConstValue) -> Self {
        self.attributes |= ParamAttributes::OPTIONAL | ParamAttributes::HAS_DEFAULT;
        self.default_value = Some(value);
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, spec: AttributeSpec) -> Self {
        self.custom_attributes.push(spec);
        self
    }

    #[inline]
    pub fn is_optional(&self) -> bool {
        self.attributes.is_optional()
    }

    #[inline]
    pub fn has_default_value(&self) -> bool {
        self.default_value.is_some()
    }
}

// ── Members ─────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct ConstructorInfo {
    pub handle: ConstructorRef,
    pub attributes: MemberAttributes,
    pub conventions: CallingConventions,
    pub parameters: Vec<ParameterInfo>,
}

impl ConstructorInfo {
    #[inline]
    pub fn arity(&self) -> usize {
        self.parameters.len()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct MethodInfo {
    pub handle: MethodRef,
    pub name: String,
    pub attributes: MemberAttributes,
    pub return_type: TypeId,
    pub parameters: Vec<ParameterInfo>,
}

impl MethodInfo {
    #[inline]
    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    #[inline]
    pub fn is_static(&self) -> bool {
        self.attributes.is_static()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldInfo {
    pub handle: FieldRef,
    pub name: String,
    pub ty: TypeId,
    pub attributes: MemberAttributes,
    pub constant: Option<ConstValue>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct PropertyInfo {
    pub name: String,
    pub ty: TypeId,
    pub getter: Option<MethodRef>,
    pub setter: Option<MethodRef>,
}

// ── Types ───────────────────────────────────────────────────────────

/// Structural kind of a type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum TypeKind {
    /// One of the fixed builtin types.
    Builtin,
    Class,
    Interface,
    /// A generic type definition with its parameter placeholders.
    GenericDefinition { params: Vec<TypeId> },
    /// An unbound placeholder standing for `definition`'s type argument.
    GenericParameter { definition: TypeId, position: u16 },
}

/// Full reflective record for one type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct TypeInfo {
    pub id: TypeId,
    pub name: String,
    pub attributes: TypeAttributes,
    pub kind: TypeKind,
    pub base: Option<TypeId>,
    pub interfaces: Vec<TypeId>,
    pub constructors: Vec<ConstructorInfo>,
    pub methods: Vec<MethodInfo>,
    pub fields: Vec<FieldInfo>,
    pub properties: Vec<PropertyInfo>,
}

impl TypeInfo {
    /// A type record with no members. `id` is assigned on registration.
    pub fn new(name: impl Into<String>, kind: TypeKind, base: Option<TypeId>) -> Self {
        Self {
            id: TypeId::VOID,
            name: name.into(),
            attributes: TypeAttributes::PUBLIC,
            kind,
            base,
            interfaces: Vec::new(),
            constructors: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
            properties: Vec::new(),
        }
    }

    /// A public class deriving from `base`.
    pub fn class(name: impl Into<String>, base: TypeId) -> Self {
        Self::new(name, TypeKind::Class, Some(base))
    }

    /// Append a constructor; its handle is fixed up on registration.
    #[must_use]
    pub fn with_constructor(
        mut self,
        attributes: MemberAttributes,
        parameters: Vec<ParameterInfo>,
    ) -> Self {
        let index = self.next_index(self.constructors.len());
        self.constructors.push(ConstructorInfo {
            handle: ConstructorRef::new(self.id, index),
            attributes,
            conventions: CallingConventions::STANDARD,
            parameters,
        });
        self
    }

    /// Append a method; its handle is fixed up on registration.
    #[must_use]
    pub fn with_method(
        mut self,
        name: impl Into<String>,
        attributes: MemberAttributes,
        return_type: TypeId,
        parameters: Vec<ParameterInfo>,
    ) -> Self {
        let index = self.next_index(self.methods.len());
        self.methods.push(MethodInfo {
            handle: MethodRef::new(self.id, index),
            name: name.into(),
            attributes,
            return_type,
            parameters,
        });
        self
    }

    /// Append a field; its handle is fixed up on registration.
    #[must_use]
    pub fn with_field(
        mut self,
        name: impl Into<String>,
        ty: TypeId,
        attributes: MemberAttributes,
    ) -> Self {
        let index = self.next_index(self.fields.len());
        self.fields.push(FieldInfo {
            handle: FieldRef::new(self.id, index),
            name: name.into(),
            ty,
            attributes,
            constant: None,
        });
        self
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "member counts never exceed u32"
    )]
    fn next_index(&self, len: usize) -> u32 {
        debug_assert!(u32::try_from(len).is_ok(), "member table overflow in {}", self.name);
        len as u32
    }

    /// Rewrite the id and every member handle to point at `id`.
    pub fn assign_id(&mut self, id: TypeId) {
        self.id = id;
        for ctor in &mut self.constructors {
            ctor.handle.declaring_type = id;
        }
        for method in &mut self.methods {
            method.handle.declaring_type = id;
        }
        for field in &mut self.fields {
            field.handle.declaring_type = id;
        }
        for property in &mut self.properties {
            for accessor in [&mut property.getter, &mut property.setter].into_iter().flatten() {
                accessor.declaring_type = id;
            }
        }
    }

    #[inline]
    pub fn is_generic_parameter(&self) -> bool {
        matches!(self.kind, TypeKind::GenericParameter { .. })
    }

    pub fn constructor(&self, handle: ConstructorRef) -> Option<&ConstructorInfo> {
        if handle.declaring_type != self.id {
            return None;
        }
        self.constructors.get(handle.index as usize)
    }

    pub fn method(&self, handle: MethodRef) -> Option<&MethodInfo> {
        if handle.declaring_type != self.id {
            return None;
        }
        self.methods.get(handle.index as usize)
    }

    pub fn field(&self, handle: FieldRef) -> Option<&FieldInfo> {
        if handle.declaring_type != self.id {
            return None;
        }
        self.fields.get(handle.index as usize)
    }

    pub fn method_named(&self, name: &str) -> Option<&MethodInfo> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn field_named(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn property_named(&self, name: &str) -> Option<&PropertyInfo> {
        self.properties.iter().find(|p| p.name == name)
    }
}
