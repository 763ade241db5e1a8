//! Target backend abstraction.
//!
//! The emitters never assume a code format. A backend exposes three things:
//!
//! - [`TargetBackend`]: type definition, member slots, and the final commit
//! - [`MemberSlot`]: one constructor or method being defined; owns its
//!   parameter slots and an [`InstructionStream`] for the body
//! - [`FieldSlot`] / [`PropertySlot`]: data members
//!
//! Slots are handed out as `&mut` borrows of the backend, one at a time, in
//! the order the type emitter finalizes its members.

use std::sync::Arc;

use forge_ir::InstructionStream;
use forge_meta::{
    AttributeSpec, CallingConventions, ConstValue, ConstructorRef, FieldRef, ImplPolicy,
    MemberAttributes, MetadataProvider, MethodRef, ParamAttributes, TypeAttributes, TypeId,
};

use crate::BackendError;

/// Declaration data handed to the backend when a member slot is opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemberDecl<'a> {
    pub name: &'a str,
    pub attributes: MemberAttributes,
    pub conventions: CallingConventions,
    /// Requested implementation policy; the slot reports the effective one.
    pub policy: ImplPolicy,
    /// `void` for constructors.
    pub return_type: TypeId,
}

/// Declaration data for a field slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldDecl<'a> {
    pub name: &'a str,
    pub ty: TypeId,
    pub attributes: MemberAttributes,
}

/// One formal parameter as defined on a member slot.
pub trait ParameterSlot {
    fn set_constant(&mut self, value: &ConstValue) -> Result<(), BackendError>;

    fn set_attribute(&mut self, spec: &AttributeSpec) -> Result<(), BackendError>;
}

/// A constructor or method under definition.
pub trait MemberSlot {
    type Parameter: ParameterSlot;

    /// Whether the body is written as instructions or supplied by the host.
    fn impl_policy(&self) -> ImplPolicy;

    fn define_parameter(
        &mut self,
        position: u16,
        ty: TypeId,
        attributes: ParamAttributes,
        name: &str,
    ) -> Result<&mut Self::Parameter, BackendError>;

    fn set_attribute(&mut self, spec: &AttributeSpec) -> Result<(), BackendError>;

    /// Instruction sink for the body.
    fn stream(&mut self) -> &mut dyn InstructionStream;
}

pub trait FieldSlot {
    fn set_constant(&mut self, value: &ConstValue) -> Result<(), BackendError>;

    fn set_attribute(&mut self, spec: &AttributeSpec) -> Result<(), BackendError>;
}

pub trait PropertySlot {
    fn set_getter(&mut self, getter: MethodRef) -> Result<(), BackendError>;

    fn set_setter(&mut self, setter: MethodRef) -> Result<(), BackendError>;

    fn set_attribute(&mut self, spec: &AttributeSpec) -> Result<(), BackendError>;
}

/// A host that can define, fill in, and commit new types.
pub trait TargetBackend {
    /// Slot type shared by constructors and methods.
    type Member: MemberSlot;
    type Field: FieldSlot;
    type Property: PropertySlot;

    /// The metadata service the backend publishes committed types into.
    fn metadata(&self) -> Arc<dyn MetadataProvider>;

    /// Reserve a new type and return its id. Nothing is visible through
    /// [`metadata`](Self::metadata) until [`commit_type`](Self::commit_type).
    fn define_type(
        &mut self,
        name: &str,
        attributes: TypeAttributes,
        base: TypeId,
    ) -> Result<TypeId, BackendError>;

    fn add_interface(&mut self, ty: TypeId, interface: TypeId) -> Result<(), BackendError>;

    fn constructor_slot(
        &mut self,
        handle: ConstructorRef,
        decl: MemberDecl<'_>,
    ) -> Result<&mut Self::Member, BackendError>;

    fn method_slot(
        &mut self,
        handle: MethodRef,
        decl: MemberDecl<'_>,
    ) -> Result<&mut Self::Member, BackendError>;

    fn field_slot(
        &mut self,
        handle: FieldRef,
        decl: FieldDecl<'_>,
    ) -> Result<&mut Self::Field, BackendError>;

    fn property_slot(
        &mut self,
        ty: TypeId,
        name: &str,
        property_type: TypeId,
    ) -> Result<&mut Self::Property, BackendError>;

    /// Make the type permanent. A second commit of the same type fails with
    /// [`BackendError::AlreadyCommitted`].
    fn commit_type(&mut self, ty: TypeId) -> Result<(), BackendError>;

    /// Drop a type that was defined but never committed, with every slot
    /// opened for it. Returns `false` for committed or unknown types, which
    /// are left alone.
    fn discard_type(&mut self, ty: TypeId) -> bool;
}
