//! Reflective metadata for the Forge type construction engine.
//!
//! This crate is the engine's view of the outside world's types:
//!
//! - [`TypeId`]: 32-bit type handle, builtins at fixed ids
//! - [`ConstValue`] and [`AttributeSpec`]: constants and metadata tags
//! - flag sets ([`ParamAttributes`], [`MemberAttributes`], [`BindingFlags`],
//!   [`CallingConventions`], [`TypeAttributes`]) and [`ImplPolicy`]
//! - reflective records ([`TypeInfo`], [`ConstructorInfo`], [`MethodInfo`],
//!   [`FieldInfo`], [`ParameterInfo`]) and `Copy` member handles
//! - [`MetadataProvider`], the narrow read-only interface the emitters use,
//!   and [`MetadataRegistry`], a thread-safe implementation of it
//! - [`resolve_constructor`], base-constructor lookup with the explicit
//!   generic-placeholder substitution step
//!
//! # Crate Dependencies
//!
//! Leaf crate. `forge_ir`, `forge_emit` and `forge_vm` all build on it.

mod flags;
mod info;
mod registry;
mod resolve;
mod type_id;
mod value;

pub use flags::{
    BindingFlags, CallingConventions, ImplPolicy, MemberAttributes, ParamAttributes,
    TypeAttributes,
};
pub use info::{
    ConstructorInfo, ConstructorRef, FieldInfo, FieldRef, MethodInfo, MethodRef, ParameterInfo,
    PropertyInfo, TypeInfo, TypeKind,
};
pub use registry::{MetadataProvider, MetadataRegistry, RegistryError, SharedRegistry};
pub use resolve::{lookup_target, resolve_constructor};
pub use type_id::TypeId;
pub use value::{AttributeSpec, ConstValue};
