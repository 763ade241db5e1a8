//! The reference [`TargetBackend`]: buffers each type until commit, verifies
//! its bodies, then publishes metadata to the registry and code to the
//! [`CodeStore`].

use std::sync::Arc;

use forge_emit::{
    BackendError, FieldDecl, FieldSlot, MemberDecl, MemberSlot, ParameterSlot, PropertySlot,
    TargetBackend,
};
use forge_ir::{InstrBuffer, InstructionStream};
use forge_meta::{
    lookup_target, AttributeSpec, CallingConventions, ConstValue, ConstructorInfo,
    ConstructorRef, FieldInfo, FieldRef, ImplPolicy, MemberAttributes, MetadataProvider,
    MethodInfo, MethodRef, ParamAttributes, ParameterInfo, PropertyInfo, RegistryError,
    SharedRegistry, TypeAttributes, TypeId, TypeInfo, TypeKind,
};
use rustc_hash::FxHashMap;

use crate::code::{CodeStore, CompiledBody, MemberKey};
use crate::verify::{verify_body, verify_chain, BodyShape, Signature, SignatureSource};
use crate::VmConfig;

// ── Slots ───────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct VmParam {
    info: ParameterInfo,
}

impl VmParam {
    pub fn info(&self) -> &ParameterInfo {
        &self.info
    }
}

impl ParameterSlot for VmParam {
    fn set_constant(&mut self, value: &ConstValue) -> Result<(), BackendError> {
        self.info.attributes |= ParamAttributes::HAS_DEFAULT;
        self.info.default_value = Some(value.clone());
        Ok(())
    }

    fn set_attribute(&mut self, spec: &AttributeSpec) -> Result<(), BackendError> {
        self.info.custom_attributes.push(spec.clone());
        Ok(())
    }
}

/// A constructor or method slot.
#[derive(Debug)]
pub struct VmMember {
    name: String,
    attributes: MemberAttributes,
    conventions: CallingConventions,
    policy: ImplPolicy,
    return_type: TypeId,
    params: Vec<VmParam>,
    tags: Vec<AttributeSpec>,
    code: InstrBuffer,
}

impl VmMember {
    fn new(decl: MemberDecl<'_>) -> Self {
        Self {
            name: decl.name.to_owned(),
            attributes: decl.attributes,
            conventions: decl.conventions,
            policy: decl.policy,
            return_type: decl.return_type,
            params: Vec::new(),
            tags: Vec::new(),
            code: InstrBuffer::new(),
        }
    }

    fn signature(&self) -> Signature {
        Signature {
            arity: self.params.len(),
            has_this: !self.attributes.is_static(),
            returns_value: !self.return_type.is_void(),
        }
    }

    /// Whether commit should verify and publish instructions for this member.
    fn has_instructions(&self) -> bool {
        !self.policy.is_host_supplied() && !self.attributes.is_abstract()
    }

    fn parameter_infos(&self) -> Vec<ParameterInfo> {
        self.params.iter().map(|p| p.info.clone()).collect()
    }

    fn compile(self) -> CompiledBody {
        let signature = self.signature();
        CompiledBody {
            policy: self.policy,
            arity: signature.arity,
            has_this: signature.has_this,
            return_type: self.return_type,
            tags: self.tags,
            code: self.code,
        }
    }
}

impl MemberSlot for VmMember {
    type Parameter = VmParam;

    fn impl_policy(&self) -> ImplPolicy {
        self.policy
    }

    fn define_parameter(
        &mut self,
        position: u16,
        ty: TypeId,
        attributes: ParamAttributes,
        name: &str,
    ) -> Result<&mut VmParam, BackendError> {
        let expected = self.params.len() + 1;
        if usize::from(position) != expected {
            return Err(BackendError::Rejected {
                member: self.name.clone(),
                reason: format!("parameter {name} defined at {position}, expected {expected}"),
            });
        }
        let mut info = ParameterInfo::new(position, name, ty);
        info.attributes = attributes;
        self.params.push(VmParam { info });
        let index = self.params.len() - 1;
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
pub struct VmField {
    info: FieldInfo,
    tags: Vec<AttributeSpec>,
}

impl FieldSlot for VmField {
    fn set_constant(&mut self, value: &ConstValue) -> Result<(), BackendError> {
        self.info.constant = Some(value.clone());
        Ok(())
    }

    fn set_attribute(&mut self, spec: &AttributeSpec) -> Result<(), BackendError> {
        self.tags.push(spec.clone());
        Ok(())
    }
}

#[derive(Debug)]
pub struct VmProperty {
    info: PropertyInfo,
    tags: Vec<AttributeSpec>,
}

impl PropertySlot for VmProperty {
    fn set_getter(&mut self, getter: MethodRef) -> Result<(), BackendError> {
        self.info.getter = Some(getter);
        Ok(())
    }

    fn set_setter(&mut self, setter: MethodRef) -> Result<(), BackendError> {
        self.info.setter = Some(setter);
        Ok(())
    }

    fn set_attribute(&mut self, spec: &AttributeSpec) -> Result<(), BackendError> {
        self.tags.push(spec.clone());
        Ok(())
    }
}

// ── Pending types ───────────────────────────────────────────────────

/// A defined, not yet committed type.
#[derive(Debug)]
struct PendingType {
    name: String,
    attributes: TypeAttributes,
    base: TypeId,
    interfaces: Vec<TypeId>,
    constructors: Vec<(ConstructorRef, VmMember)>,
    methods: Vec<(MethodRef, VmMember)>,
    fields: Vec<(FieldRef, VmField)>,
    properties: Vec<VmProperty>,
}

impl PendingType {
    fn constructor(&self, handle: ConstructorRef) -> Option<&VmMember> {
        self.constructors
            .iter()
            .find(|(h, _)| *h == handle)
            .map(|(_, m)| m)
    }

    fn method(&self, handle: MethodRef) -> Option<&VmMember> {
        self.methods
            .iter()
            .find(|(h, _)| *h == handle)
            .map(|(_, m)| m)
    }
}

/// Callee signatures from the type under commit, then the registry.
struct CommitSignatures<'a> {
    ty: TypeId,
    pending: &'a PendingType,
    registry: &'a dyn MetadataProvider,
}

impl SignatureSource for CommitSignatures<'_> {
    fn method(&self, method: MethodRef) -> Option<Signature> {
        if method.declaring_type == self.ty {
            return self.pending.method(method).map(VmMember::signature);
        }
        let info = self.registry.method_info(method)?;
        Some(Signature {
            arity: info.arity(),
            has_this: !info.is_static(),
            returns_value: !info.return_type.is_void(),
        })
    }

    fn constructor(&self, ctor: ConstructorRef) -> Option<usize> {
        if ctor.declaring_type == self.ty {
            return self
                .pending
                .constructor(ctor)
                .map(|member| member.params.len());
        }
        self.registry.constructor_info(ctor).map(|info| info.arity())
    }
}

// ── Backend ─────────────────────────────────────────────────────────

/// Backend whose committed types run on [`Vm`](crate::Vm).
pub struct VmBackend {
    registry: SharedRegistry,
    config: VmConfig,
    pending: FxHashMap<TypeId, PendingType>,
    code: Arc<CodeStore>,
    field_tags: FxHashMap<FieldRef, Vec<AttributeSpec>>,
    /// Keyed by owner and property name.
    property_tags: FxHashMap<(TypeId, String), Vec<AttributeSpec>>,
}

impl VmBackend {
    /// A backend publishing into `registry`, configured from the environment.
    pub fn new(registry: SharedRegistry) -> Self {
        Self::with_config(registry, VmConfig::from_env())
    }

    pub fn with_config(registry: SharedRegistry, config: VmConfig) -> Self {
        Self {
            registry,
            config,
            pending: FxHashMap::default(),
            code: Arc::new(CodeStore::default()),
            field_tags: FxHashMap::default(),
            property_tags: FxHashMap::default(),
        }
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn code(&self) -> &Arc<CodeStore> {
        &self.code
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Tags attached to a committed field.
    pub fn field_tags(&self, field: FieldRef) -> &[AttributeSpec] {
        self.field_tags.get(&field).map_or(&[], Vec::as_slice)
    }

    /// Tags attached to a committed property.
    pub fn property_tags(&self, ty: TypeId, name: &str) -> &[AttributeSpec] {
        self.property_tags
            .get(&(ty, name.to_owned()))
            .map_or(&[], Vec::as_slice)
    }

    fn open(&mut self, ty: TypeId) -> Result<&mut PendingType, BackendError> {
        match self.pending.get_mut(&ty) {
            Some(pending) => Ok(pending),
            None if self.registry.contains(ty) => Err(BackendError::AlreadyCommitted(ty)),
            None => Err(BackendError::UnknownType(ty)),
        }
    }

    fn verify(&self, ty: TypeId, pending: &PendingType) -> Result<(), BackendError> {
        let sigs = CommitSignatures {
            ty,
            pending,
            registry: &*self.registry,
        };
        let chain_targets = [
            ty,
            pending.base,
            lookup_target(&*self.registry, pending.base),
        ];

        let reject = |member: &VmMember, err: crate::VerifyError| BackendError::Rejected {
            member: format!("{}::{}", pending.name, member.name),
            reason: err.to_string(),
        };

        for (_, ctor) in &pending.constructors {
            if !ctor.has_instructions() {
                continue;
            }
            let shape = BodyShape {
                code: &ctor.code,
                signature: ctor.signature(),
            };
            verify_body(&shape, &sigs).map_err(|e| reject(ctor, e))?;
            verify_chain(&ctor.code, &chain_targets).map_err(|e| reject(ctor, e))?;
        }
        for (_, method) in &pending.methods {
            if !method.has_instructions() {
                continue;
            }
            let shape = BodyShape {
                code: &method.code,
                signature: method.signature(),
            };
            verify_body(&shape, &sigs).map_err(|e| reject(method, e))?;
        }
        tracing::trace!(ty = %ty, name = %pending.name, "verified type");
        Ok(())
    }
}

/// Assemble the published record. Member tables are ordered by handle index
/// so that handle lookups on the record resolve.
fn type_info(ty: TypeId, pending: &mut PendingType) -> TypeInfo {
    let kind = if pending.attributes.is_interface() {
        TypeKind::Interface
    } else {
        TypeKind::Class
    };
    let base = (!pending.attributes.is_interface()).then_some(pending.base);

    pending.constructors.sort_by_key(|(h, _)| h.index);
    pending.methods.sort_by_key(|(h, _)| h.index);
    pending.fields.sort_by_key(|(h, _)| h.index);

    let mut info = TypeInfo::new(pending.name.clone(), kind, base);
    info.attributes = pending.attributes;
    info.interfaces.clone_from(&pending.interfaces);
    info.constructors = pending
        .constructors
        .iter()
        .map(|(handle, member)| ConstructorInfo {
            handle: *handle,
            attributes: member.attributes,
            conventions: member.conventions,
            parameters: member.parameter_infos(),
        })
        .collect();
    info.methods = pending
        .methods
        .iter()
        .map(|(handle, member)| MethodInfo {
            handle: *handle,
            name: member.name.clone(),
            attributes: member.attributes,
            return_type: member.return_type,
            parameters: member.parameter_infos(),
        })
        .collect();
    info.fields = pending
        .fields
        .iter()
        .map(|(_, field)| field.info.clone())
        .collect();
    info.properties = pending
        .properties
        .iter()
        .map(|property| property.info.clone())
        .collect();
    info.assign_id(ty);
    info
}

impl TargetBackend for VmBackend {
    type Member = VmMember;
    type Field = VmField;
    type Property = VmProperty;

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
        self.pending.insert(
            id,
            PendingType {
                name: name.to_owned(),
                attributes,
                base,
                interfaces: Vec::new(),
                constructors: Vec::new(),
                methods: Vec::new(),
                fields: Vec::new(),
                properties: Vec::new(),
            },
        );
        tracing::debug!(ty = %id, name, "defined type");
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
    ) -> Result<&mut VmMember, BackendError> {
        let pending = self.open(handle.declaring_type)?;
        pending.constructors.push((handle, VmMember::new(decl)));
        let index = pending.constructors.len() - 1;
        Ok(&mut pending.constructors[index].1)
    }

    fn method_slot(
        &mut self,
        handle: MethodRef,
        decl: MemberDecl<'_>,
    ) -> Result<&mut VmMember, BackendError> {
        let pending = self.open(handle.declaring_type)?;
        pending.methods.push((handle, VmMember::new(decl)));
        let index = pending.methods.len() - 1;
        Ok(&mut pending.methods[index].1)
    }

    fn field_slot(
        &mut self,
        handle: FieldRef,
        decl: FieldDecl<'_>,
    ) -> Result<&mut VmField, BackendError> {
        let pending = self.open(handle.declaring_type)?;
        pending.fields.push((
            handle,
            VmField {
                info: FieldInfo {
                    handle,
                    name: decl.name.to_owned(),
                    ty: decl.ty,
                    attributes: decl.attributes,
                    constant: None,
                },
                tags: Vec::new(),
            },
        ));
        let index = pending.fields.len() - 1;
        Ok(&mut pending.fields[index].1)
    }

    fn property_slot(
        &mut self,
        ty: TypeId,
        name: &str,
        property_type: TypeId,
    ) -> Result<&mut VmProperty, BackendError> {
        let pending = self.open(ty)?;
        pending.properties.push(VmProperty {
            info: PropertyInfo {
                name: name.to_owned(),
                ty: property_type,
                getter: None,
                setter: None,
            },
            tags: Vec::new(),
        });
        let index = pending.properties.len() - 1;
        Ok(&mut pending.properties[index])
    }

    fn commit_type(&mut self, ty: TypeId) -> Result<(), BackendError> {
        self.open(ty)?;
        if self.config.verify {
            if let Some(pending) = self.pending.get(&ty) {
                self.verify(ty, pending)?;
            }
        }
        let Some(mut pending) = self.pending.remove(&ty) else {
            return Err(BackendError::UnknownType(ty));
        };

        let info = type_info(ty, &mut pending);
        self.registry.insert(info, ty).map_err(|err| match err {
            RegistryError::Duplicate(id) => BackendError::AlreadyCommitted(id),
            RegistryError::NotReserved(id) => BackendError::UnknownType(id),
        })?;

        for (handle, field) in pending.fields {
            if !field.tags.is_empty() {
                self.field_tags.insert(handle, field.tags);
            }
        }
        for property in pending.properties {
            if !property.tags.is_empty() {
                self.property_tags.insert((ty, property.info.name), property.tags);
            }
        }

        let dump = self.config.dump_il;
        let bodies = pending
            .constructors
            .into_iter()
            .map(|(handle, member)| (MemberKey::Constructor(handle), member))
            .chain(
                pending
                    .methods
                    .into_iter()
                    .map(|(handle, member)| (MemberKey::Method(handle), member)),
            )
            .map(|(key, member)| {
                if dump && !member.code.is_empty() {
                    tracing::debug!(member = %key, name = %member.name, "\n{}", member.code.listing());
                }
                (key, member.compile())
            });
        self.code.publish(bodies);

        tracing::debug!(ty = %ty, name = %pending.name, "committed type");
        Ok(())
    }

    fn discard_type(&mut self, ty: TypeId) -> bool {
        match self.pending.remove(&ty) {
            Some(pending) => {
                tracing::debug!(ty = %ty, name = %pending.name, "discarded type");
                true
            }
            None => false,
        }
    }
}
