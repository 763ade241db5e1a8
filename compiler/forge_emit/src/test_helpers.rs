//! Shared test utilities for emitter tests.
//!
//! [`RecordingBackend`] keeps every slot write in plain vectors so tests can
//! assert on exactly what finalization produced. Only compiled in test builds.

use std::sync::Arc;

use forge_ir::{InstrBuffer, InstructionStream};
use forge_meta::{
    AttributeSpec, ConstValue, ConstructorRef, FieldRef, ImplPolicy, MemberAttributes,
    MetadataProvider, MetadataRegistry, MethodRef, ParamAttributes, SharedRegistry, TypeAttributes,
    TypeId,
};
use rustc_hash::FxHashMap;

use crate::backend::{
    FieldDecl, FieldSlot, MemberDecl, MemberSlot, ParameterSlot, PropertySlot, TargetBackend,
};
use crate::{BackendError, ModuleEmitter};

#[derive(Debug)]
pub(crate) struct RecordedParam {
    pub(crate) position: u16,
    pub(crate) ty: TypeId,
    pub(crate) attributes: ParamAttributes,
    pub(crate) name: String,
    pub(crate) constant: Option<ConstValue>,
    pub(crate) tags: Vec<AttributeSpec>,
}

impl ParameterSlot for RecordedParam {
    fn set_constant(&mut self, value: &ConstValue) -> Result<(), BackendError> {
        self.constant = Some(value.clone());
        Ok(())
    }

    fn set_attribute(&mut self, spec: &AttributeSpec) -> Result<(), BackendError> {
        self.tags.push(spec.clone());
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct RecordedMember {
    pub(crate) name: String,
    pub(crate) attributes: MemberAttributes,
    pub(crate) policy: ImplPolicy,
    pub(crate) params: Vec<RecordedParam>,
    pub(crate) tags: Vec<AttributeSpec>,
    pub(crate) code: InstrBuffer,
}

impl RecordedMember {
    pub(crate) fn new(decl: MemberDecl<'_>, policy: ImplPolicy) -> Self {
        Self {
            name: decl.name.to_owned(),
            attributes: decl.attributes,
            policy,
            params: Vec::new(),
            tags: Vec::new(),
            code: InstrBuffer::new(),
        }
    }

    /// Nothing at all was written into the slot.
    pub(crate) fn is_untouched(&self) -> bool {
        self.params.is_empty() && self.tags.is_empty() && self.code.is_empty()
    }
}

impl MemberSlot for RecordedMember {
    type Parameter = RecordedParam;

    fn impl_policy(&self) -> ImplPolicy {
        self.policy
    }

    fn define_parameter(
        &mut self,
        position: u16,
        ty: TypeId,
        attributes: ParamAttributes,
        name: &str,
    ) -> Result<&mut RecordedParam, BackendError> {
        let index = self.params.len();
        self.params.push(RecordedParam {
            position,
            ty,
            attributes,
            name: name.to_owned(),
            constant: None,
            tags: Vec::new(),
        });
        Ok(&mut self.params[index])
    }

    fn set_attribute(&mut self, spec: &AttributeSpec) -> Result<(), BackendError> {
        self.tags.push(spec.clone());
        Ok(())
    }

    fn stream(&mut self) -> &mut dyn InstructionStream {
        &mut self.code
    }
}

#[derive(Debug)]
pub(crate) struct RecordedField {
    pub(crate) name: String,
    pub(crate) ty: TypeId,
    pub(crate) constant: Option<ConstValue>,
    pub(crate) tags: Vec<AttributeSpec>,
}

impl FieldSlot for RecordedField {
    fn set_constant(&mut self, value: &ConstValue) -> Result<(), BackendError> {
        self.constant = Some(value.clone());
        Ok(())
    }

    fn set_attribute(&mut self, spec: &AttributeSpec) -> Result<(), BackendError> {
        self.tags.push(spec.clone());
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct RecordedProperty {
    pub(crate) name: String,
    pub(crate) ty: TypeId,
    pub(crate) getter: Option<MethodRef>,
    pub(crate) setter: Option<MethodRef>,
    pub(crate) tags: Vec<AttributeSpec>,
}

impl PropertySlot for RecordedProperty {
    fn set_getter(&mut self, getter: MethodRef) -> Result<(), BackendError> {
        self.getter = Some(getter);
        Ok(())
    }

    fn set_setter(&mut self, setter: MethodRef) -> Result<(), BackendError> {
        self.setter = Some(setter);
        Ok(())
    }

    fn set_attribute(&mut self, spec: &AttributeSpec) -> Result<(), BackendError> {
        self.tags.push(spec.clone());
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct RecordedType {
    pub(crate) name: String,
    pub(crate) base: TypeId,
    pub(crate) attributes: TypeAttributes,
    pub(crate) interfaces: Vec<TypeId>,
    pub(crate) constructors: Vec<(ConstructorRef, RecordedMember)>,
    pub(crate) methods: Vec<(MethodRef, RecordedMember)>,
    pub(crate) fields: Vec<(FieldRef, RecordedField)>,
    pub(crate) properties: Vec<RecordedProperty>,
    pub(crate) committed: bool,
}

impl RecordedType {
    pub(crate) fn constructor(&self, index: usize) -> &RecordedMember {
        &self.constructors[index].1
    }

    pub(crate) fn method(&self, index: usize) -> &RecordedMember {
        &self.methods[index].1
    }
}

/// Backend that records writes instead of producing code.
pub(crate) struct RecordingBackend {
    pub(crate) registry: SharedRegistry,
    pub(crate) types: FxHashMap<TypeId, RecordedType>,
    /// When set, every member slot reports this policy regardless of request.
    pub(crate) forced_policy: Option<ImplPolicy>,
    /// Slot openings and commits, in call order.
    pub(crate) events: Vec<String>,
}

impl RecordingBackend {
    pub(crate) fn new(registry: SharedRegistry) -> Self {
        Self {
            registry,
            types: FxHashMap::default(),
            forced_policy: None,
            events: Vec::new(),
        }
    }

    pub(crate) fn ty(&self, id: TypeId) -> &RecordedType {
        &self.types[&id]
    }

    fn open(&mut self, ty: TypeId) -> Result<&mut RecordedType, BackendError> {
        let record = self
            .types
            .get_mut(&ty)
            .ok_or(BackendError::UnknownType(ty))?;
        if record.committed {
            return Err(BackendError::AlreadyCommitted(ty));
        }
        Ok(record)
    }

    fn policy(&self, decl: &MemberDecl<'_>) -> ImplPolicy {
        self.forced_policy.unwrap_or(decl.policy)
    }
}

impl TargetBackend for RecordingBackend {
    type Member = RecordedMember;
    type Field = RecordedField;
    type Property = RecordedProperty;

    fn metadata(&self) -> Arc<dyn MetadataProvider> {
        Arc::clone(&self.registry) as Arc<dyn MetadataProvider>
    }

    fn define_type(
        &mut self,
        name: &str,
        attributes: TypeAttributes,
        base: TypeId,
    ) -> Result<TypeId, BackendError> {
        let id = self.registry.reserve();
        self.types.insert(
            id,
            RecordedType {
                name: name.to_owned(),
                base,
                attributes,
                interfaces: Vec::new(),
                constructors: Vec::new(),
                methods: Vec::new(),
                fields: Vec::new(),
                properties: Vec::new(),
                committed: false,
            },
        );
        Ok(id)
    }

    fn add_interface(&mut self, ty: TypeId, interface: TypeId) -> Result<(), BackendError> {
        self.open(ty)?.interfaces.push(interface);
        Ok(())
    }

    fn constructor_slot(
        &mut self,
        handle: ConstructorRef,
        decl: MemberDecl<'_>,
    ) -> Result<&mut RecordedMember, BackendError> {
        let member = RecordedMember::new(decl, self.policy(&decl));
        self.events.push(format!("ctor {}", handle.index));
        let record = self.open(handle.declaring_type)?;
        record.constructors.push((handle, member));
        let index = record.constructors.len() - 1;
        Ok(&mut record.constructors[index].1)
    }

    fn method_slot(
        &mut self,
        handle: MethodRef,
        decl: MemberDecl<'_>,
    ) -> Result<&mut RecordedMember, BackendError> {
        let member = RecordedMember::new(decl, self.policy(&decl));
        self.events.push(format!("method {}", decl.name));
        let record = self.open(handle.declaring_type)?;
        record.methods.push((handle, member));
        let index = record.methods.len() - 1;
        Ok(&mut record.methods[index].1)
    }

    fn field_slot(
        &mut self,
        handle: FieldRef,
        decl: FieldDecl<'_>,
    ) -> Result<&mut RecordedField, BackendError> {
        self.events.push(format!("field {}", decl.name));
        let record = self.open(handle.declaring_type)?;
        record.fields.push((
            handle,
            RecordedField {
                name: decl.name.to_owned(),
                ty: decl.ty,
                constant: None,
                tags: Vec::new(),
            },
        ));
        let index = record.fields.len() - 1;
        Ok(&mut record.fields[index].1)
    }

    fn property_slot(
        &mut self,
        ty: TypeId,
        name: &str,
        property_type: TypeId,
    ) -> Result<&mut RecordedProperty, BackendError> {
        self.events.push(format!("property {name}"));
        let record = self.open(ty)?;
        record.properties.push(RecordedProperty {
            name: name.to_owned(),
            ty: property_type,
            getter: None,
            setter: None,
            tags: Vec::new(),
        });
        let index = record.properties.len() - 1;
        Ok(&mut record.properties[index])
    }

    fn commit_type(&mut self, ty: TypeId) -> Result<(), BackendError> {
        self.open(ty)?.committed = true;
        self.events.push("commit".to_owned());
        Ok(())
    }

    fn discard_type(&mut self, ty: TypeId) -> bool {
        if self.types.get(&ty).is_some_and(|record| !record.committed) {
            self.types.remove(&ty);
            self.events.push("discard".to_owned());
            true
        } else {
            false
        }
    }
}

/// A module over a fresh registry and recording backend.
pub(crate) fn module() -> ModuleEmitter<RecordingBackend> {
    ModuleEmitter::new("test", RecordingBackend::new(MetadataRegistry::shared()))
}
