//! Type emitter: owns the members of one type and commits them together.
//!
//! Member handles are assigned when a member is defined, so bodies can refer
//! to siblings (constructor chaining, calls, field access) before anything is
//! written to the backend. Commit finalizes members in a fixed order: fields,
//! constructors, methods, properties.

use std::sync::Arc;

use forge_ir::Expr;
use forge_meta::{
    CallingConventions, ConstructorRef, MemberAttributes, MetadataProvider, MethodRef,
    ParamAttributes, TypeAttributes, TypeId, TypeInfo, TypeKind,
};
use smallvec::SmallVec;

use crate::backend::TargetBackend;
use crate::owner::OwnerInfo;
use crate::{ConstructorEmitter, EmitError, FieldEmitter, MethodEmitter, PropertyEmitter};

/// Builds one type. Consumed by [`commit`](TypeEmitter::commit).
#[derive(Debug)]
pub struct TypeEmitter {
    owner: Arc<OwnerInfo>,
    interfaces: SmallVec<[TypeId; 4]>,
    fields: Vec<FieldEmitter>,
    constructors: Vec<ConstructorEmitter>,
    methods: Vec<MethodEmitter>,
    properties: Vec<PropertyEmitter>,
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "member counts never approach u32::MAX"
)]
fn next_index(len: usize) -> u32 {
    len as u32
}

impl TypeEmitter {
    pub(crate) fn new(
        ty: TypeId,
        name: &str,
        attributes: TypeAttributes,
        base: TypeId,
        metadata: Arc<dyn MetadataProvider>,
    ) -> Self {
        let owner = OwnerInfo {
            ty,
            name: name.to_owned(),
            attributes,
            base,
            metadata,
        };
        Self {
            owner: Arc::new(owner),
            interfaces: SmallVec::new(),
            fields: Vec::new(),
            constructors: Vec::new(),
            methods: Vec::new(),
            properties: Vec::new(),
        }
    }

    // ── Accessors ───────────────────────────────────────────────────

    #[inline]
    pub fn ty(&self) -> TypeId {
        self.owner.ty()
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.owner.name()
    }

    #[inline]
    pub fn base(&self) -> TypeId {
        self.owner.base()
    }

    #[inline]
    pub fn owner(&self) -> &Arc<OwnerInfo> {
        &self.owner
    }

    #[inline]
    pub fn interfaces(&self) -> &[TypeId] {
        &self.interfaces
    }

    #[inline]
    pub fn constructors(&self) -> &[ConstructorEmitter] {
        &self.constructors
    }

    #[inline]
    pub fn methods(&self) -> &[MethodEmitter] {
        &self.methods
    }

    #[inline]
    pub fn fields(&self) -> &[FieldEmitter] {
        &self.fields
    }

    #[inline]
    pub fn properties(&self) -> &[PropertyEmitter] {
        &self.properties
    }

    pub fn constructor_mut(&mut self, handle: ConstructorRef) -> Option<&mut ConstructorEmitter> {
        self.constructors.iter_mut().find(|c| c.handle() == handle)
    }

    pub fn method_mut(&mut self, handle: MethodRef) -> Option<&mut MethodEmitter> {
        self.methods.iter_mut().find(|m| m.handle() == handle)
    }

    fn method(&self, handle: MethodRef) -> Option<&MethodEmitter> {
        self.methods.iter().find(|m| m.handle() == handle)
    }

    fn is_interface(&self) -> bool {
        self.owner.attributes().is_interface()
    }

    /// Reflective record of the type as currently declared.
    pub fn info(&self) -> TypeInfo {
        let kind = if self.is_interface() {
            TypeKind::Interface
        } else {
            TypeKind::Class
        };
        let base = (!self.is_interface()).then_some(self.owner.base());
        let mut info = TypeInfo::new(self.owner.name(), kind, base);
        info.id = self.owner.ty();
        info.attributes = self.owner.attributes();
        info.interfaces = self.interfaces.to_vec();
        info.constructors = self
            .constructors
            .iter()
            .map(ConstructorEmitter::info)
            .collect();
        info.methods = self.methods.iter().map(MethodEmitter::info).collect();
        info.fields = self.fields.iter().map(FieldEmitter::info).collect();
        info.properties = self.properties.iter().map(PropertyEmitter::info).collect();
        info
    }

    // ── Definition ──────────────────────────────────────────────────

    /// Record an implemented interface.
    pub fn implement(&mut self, interface: TypeId) -> Result<&mut Self, EmitError> {
        let known = self.owner.metadata().type_info(interface);
        if !known.is_some_and(|info| info.attributes.is_interface()) {
            return Err(EmitError::invalid(format!(
                "{interface} is not an interface type"
            )));
        }
        if !self.interfaces.contains(&interface) {
            self.interfaces.push(interface);
        }
        Ok(self)
    }

    pub fn define_constructor(
        &mut self,
        attributes: MemberAttributes,
    ) -> Result<&mut ConstructorEmitter, EmitError> {
        if self.is_interface() {
            return Err(EmitError::invalid(format!(
                "interface {} cannot declare constructors",
                self.name()
            )));
        }
        if attributes.is_static() || attributes.is_abstract() {
            return Err(EmitError::invalid(
                "constructors must be concrete instance members",
            ));
        }
        let index = next_index(self.constructors.len());
        let ctor = ConstructorEmitter::new(
            Arc::clone(&self.owner),
            index,
            attributes,
            CallingConventions::STANDARD | CallingConventions::HAS_THIS,
        );
        tracing::trace!(ctor = %ctor.handle(), owner = self.name(), "defined constructor");
        self.constructors.push(ctor);
        Ok(&mut self.constructors[index as usize])
    }

    pub fn define_method(
        &mut self,
        name: &str,
        attributes: MemberAttributes,
        return_type: TypeId,
    ) -> Result<&mut MethodEmitter, EmitError> {
        if name.is_empty() {
            return Err(EmitError::invalid("method name is empty"));
        }
        let abstract_allowed =
            self.is_interface() || self.owner.attributes().contains(TypeAttributes::ABSTRACT);
        if attributes.is_abstract() && !abstract_allowed {
            return Err(EmitError::invalid(format!(
                "abstract method `{name}` on concrete type {}",
                self.name()
            )));
        }
        if self.is_interface() && !attributes.is_abstract() && !attributes.is_static() {
            return Err(EmitError::invalid(format!(
                "interface method `{name}` must be abstract"
            )));
        }
        let index = next_index(self.methods.len());
        let method = MethodEmitter::new(
            Arc::clone(&self.owner),
            index,
            name,
            attributes,
            return_type,
        );
        tracing::trace!(method = name, owner = self.name(), "defined method");
        self.methods.push(method);
        Ok(&mut self.methods[index as usize])
    }

    pub fn define_field(
        &mut self,
        name: &str,
        ty: TypeId,
        attributes: MemberAttributes,
    ) -> Result<&mut FieldEmitter, EmitError> {
        if name.is_empty() || ty.is_void() {
            return Err(EmitError::invalid(format!(
                "field `{name}` needs a name and a non-void type"
            )));
        }
        if self.fields.iter().any(|f| f.name() == name) {
            return Err(EmitError::invalid(format!(
                "field `{name}` is already defined on {}",
                self.name()
            )));
        }
        if self.is_interface() && !attributes.is_static() {
            return Err(EmitError::invalid(format!(
                "interface {} cannot declare instance field `{name}`",
                self.name()
            )));
        }
        let index = next_index(self.fields.len());
        let field = FieldEmitter::new(Arc::clone(&self.owner), index, name, ty, attributes);
        tracing::trace!(field = name, owner = self.name(), "defined field");
        self.fields.push(field);
        Ok(&mut self.fields[index as usize])
    }

    pub fn define_property(
        &mut self,
        name: &str,
        ty: TypeId,
    ) -> Result<&mut PropertyEmitter, EmitError> {
        self.check_property_name(name, ty)?;
        let index = self.properties.len();
        self.properties
            .push(PropertyEmitter::new(Arc::clone(&self.owner), name, ty));
        Ok(&mut self.properties[index])
    }

    /// Define a property backed by a private field, with a getter returning
    /// the field and a setter storing its single argument into it.
    pub fn define_auto_property(
        &mut self,
        name: &str,
        ty: TypeId,
        attributes: MemberAttributes,
    ) -> Result<&mut PropertyEmitter, EmitError> {
        self.check_property_name(name, ty)?;
        if attributes.is_abstract() {
            return Err(EmitError::invalid(format!("auto property `{name}` cannot be abstract")));
        }

        let field_attributes =
            MemberAttributes::PRIVATE | (attributes & MemberAttributes::STATIC);
        let field = self
            .define_field(&format!("<{name}>k__BackingField"), ty, field_attributes)?
            .handle();
        let accessor_attributes =
            attributes | MemberAttributes::SPECIAL_NAME | MemberAttributes::HIDE_BY_SIG;

        let getter = self.define_method(&format!("get_{name}"), accessor_attributes, ty)?;
        let receiver = getter.this();
        getter.append(Expr::ret(Some(Expr::field(receiver, field, ty))))?;
        let getter = getter.handle();

        let setter = self.define_method(&format!("set_{name}"), accessor_attributes, TypeId::VOID)?;
        setter.define_parameter(ty, ParamAttributes::empty(), "value")?;
        let receiver = setter.this();
        setter.append(Expr::store_field(receiver, field, Expr::param(1, ty)))?;
        let setter = setter.handle();

        let property = self.define_property(name, ty)?;
        property.set_getter(getter)?.set_setter(setter)?;
        Ok(property)
    }

    fn check_property_name(&self, name: &str, ty: TypeId) -> Result<(), EmitError> {
        if name.is_empty() || ty.is_void() {
            return Err(EmitError::invalid(format!(
                "property `{name}` needs a name and a non-void type"
            )));
        }
        if self.properties.iter().any(|p| p.name() == name) {
            return Err(EmitError::invalid(format!(
                "property `{name}` is already defined on {}",
                self.name()
            )));
        }
        Ok(())
    }

    fn check_accessors(&self, property: &PropertyEmitter) -> Result<(), EmitError> {
        let mismatch = |role: &str, accessor: MethodRef| {
            EmitError::invalid(format!(
                "{role} {accessor} does not match property `{}` of type {}",
                property.name(),
                property.ty()
            ))
        };
        if let Some(getter) = property.getter() {
            let method = self.method(getter).ok_or_else(|| mismatch("getter", getter))?;
            if method.return_type() != property.ty() || !method.parameters().is_empty() {
                return Err(mismatch("getter", getter));
            }
        }
        if let Some(setter) = property.setter() {
            let method = self.method(setter).ok_or_else(|| mismatch("setter", setter))?;
            let takes_value = matches!(method.parameters(), [p] if p.ty() == property.ty());
            if !method.return_type().is_void() || !takes_value {
                return Err(mismatch("setter", setter));
            }
        }
        Ok(())
    }

    // ── Commit ──────────────────────────────────────────────────────

    /// Finalize every member into `backend` and commit the type.
    ///
    /// A type without constructors (other than an interface) first receives a
    /// public parameterless constructor whose body is the implicit base chain.
    pub fn commit<B: TargetBackend>(mut self, backend: &mut B) -> Result<TypeId, EmitError> {
        let ty = self.ty();
        for property in &self.properties {
            self.check_accessors(property)?;
        }
        if self.constructors.is_empty() && !self.is_interface() {
            tracing::trace!(owner = self.name(), "adding default constructor");
            self.define_constructor(MemberAttributes::PUBLIC)?;
        }

        for &interface in &self.interfaces {
            backend.add_interface(ty, interface)?;
        }
        for field in &mut self.fields {
            let slot = backend.field_slot(field.handle(), field.decl())?;
            field.finalize(slot)?;
        }
        for ctor in &mut self.constructors {
            let slot = backend.constructor_slot(ctor.handle(), ctor.decl())?;
            ctor.finalize(slot)?;
        }
        for method in &mut self.methods {
            let slot = backend.method_slot(method.handle(), method.decl())?;
            method.finalize(slot)?;
        }
        for property in &mut self.properties {
            let slot = backend.property_slot(ty, property.name(), property.ty())?;
            property.finalize(slot)?;
        }

        backend.commit_type(ty)?;
        tracing::debug!(
            ty = %ty,
            name = self.name(),
            fields = self.fields.len(),
            constructors = self.constructors.len(),
            methods = self.methods.len(),
            properties = self.properties.len(),
            "committed type"
        );
        Ok(ty)
    }
}
