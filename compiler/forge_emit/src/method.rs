//! Method emitter.

use std::sync::Arc;

use forge_ir::{Body, Expr, Local};
use forge_meta::{
    AttributeSpec, CallingConventions, ConstValue, ImplPolicy, MemberAttributes, MethodInfo,
    MethodRef, ParamAttributes, ParameterInfo, TypeId,
};

use crate::backend::{MemberDecl, MemberSlot};
use crate::owner::{OwnerInfo, Phase};
use crate::parameter::{ParameterEmitter, ParameterList};
use crate::EmitError;

/// Builds one method of a type under construction.
#[derive(Debug)]
pub struct MethodEmitter {
    owner: Arc<OwnerInfo>,
    handle: MethodRef,
    name: String,
    attributes: MemberAttributes,
    return_type: TypeId,
    policy: ImplPolicy,
    params: ParameterList,
    body: Body,
    tags: Vec<AttributeSpec>,
    phase: Phase,
}

impl MethodEmitter {
    pub(crate) fn new(
        owner: Arc<OwnerInfo>,
        index: u32,
        name: &str,
        attributes: MemberAttributes,
        return_type: TypeId,
    ) -> Self {
        let handle = MethodRef::new(owner.ty(), index);
        Self {
            owner,
            handle,
            name: name.to_owned(),
            attributes,
            return_type,
            policy: ImplPolicy::Instructions,
            params: ParameterList::default(),
            body: Body::new(),
            tags: Vec::new(),
            phase: Phase::Open,
        }
    }

    #[inline]
    pub fn handle(&self) -> MethodRef {
        self.handle
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn attributes(&self) -> MemberAttributes {
        self.attributes
    }

    #[inline]
    pub fn return_type(&self) -> TypeId {
        self.return_type
    }

    #[inline]
    pub fn parameters(&self) -> &[ParameterEmitter] {
        self.params.as_slice()
    }

    #[inline]
    pub fn body(&self) -> &Body {
        &self.body
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn info(&self) -> MethodInfo {
        MethodInfo {
            handle: self.handle,
            name: self.name.clone(),
            attributes: self.attributes,
            return_type: self.return_type,
            parameters: self.params.infos(),
        }
    }

    /// The receiver, or `None` for static methods.
    pub fn this(&self) -> Option<Expr> {
        (!self.attributes.is_static()).then(|| Expr::this(self.owner.ty()))
    }

    pub fn param(&self, position: u16) -> Option<Expr> {
        self.params
            .type_at(position)
            .map(|ty| Expr::param(position, ty))
    }

    pub fn set_impl_policy(&mut self, policy: ImplPolicy) -> Result<&mut Self, EmitError> {
        self.ensure_open()?;
        self.policy = policy;
        Ok(self)
    }

    pub fn add_attribute(&mut self, spec: AttributeSpec) -> Result<&mut Self, EmitError> {
        self.ensure_open()?;
        self.tags.push(spec);
        Ok(self)
    }

    pub fn define_parameter(
        &mut self,
        ty: TypeId,
        attributes: ParamAttributes,
        name: &str,
    ) -> Result<&mut ParameterEmitter, EmitError> {
        self.ensure_open()?;
        self.params.define(ty, attributes, name)
    }

    pub fn define_parameter_from(
        &mut self,
        source: &ParameterInfo,
    ) -> Result<&mut ParameterEmitter, EmitError> {
        self.ensure_open()?;
        self.params.define_from(source)
    }

    pub fn declare_local(&mut self, ty: TypeId) -> Result<Local, EmitError> {
        self.ensure_open()?;
        Ok(self.body.declare_local(ty))
    }

    /// Append a statement. Abstract methods have no body.
    pub fn append(&mut self, node: Expr) -> Result<(), EmitError> {
        self.ensure_open()?;
        if self.attributes.is_abstract() {
            return Err(EmitError::invalid(format!(
                "abstract method `{}` cannot have a body",
                self.name
            )));
        }
        self.body.append(node);
        Ok(())
    }

    pub(crate) fn decl(&self) -> MemberDecl<'_> {
        let conventions = if self.attributes.is_static() {
            CallingConventions::STANDARD
        } else {
            CallingConventions::STANDARD | CallingConventions::HAS_THIS
        };
        MemberDecl {
            name: &self.name,
            attributes: self.attributes,
            conventions,
            policy: self.policy,
            return_type: self.return_type,
        }
    }

    /// Write the method into `slot`. Runs once.
    ///
    /// An empty body returns the zero value of the return type.
    pub fn finalize<S: MemberSlot>(&mut self, slot: &mut S) -> Result<(), EmitError> {
        self.ensure_open()?;
        self.phase = Phase::Finalizing;

        if slot.impl_policy().is_host_supplied() {
            tracing::warn!(
                method = %self.name,
                owner = self.owner.name(),
                "method body is host-supplied; nothing emitted"
            );
            self.phase = Phase::Committed;
            return Ok(());
        }

        self.params.write_all(slot)?;
        for tag in &self.tags {
            slot.set_attribute(tag)?;
        }

        if !self.attributes.is_abstract() {
            let stream = slot.stream();
            if self.body.is_empty() {
                if let Some(zero) = ConstValue::default_for(self.return_type) {
                    stream.load_const(&zero);
                }
                stream.ret();
            } else {
                self.body.lower(stream)?;
                if !self.body.ends_with_return() {
                    stream.ret();
                }
            }
        }

        self.phase = Phase::Committed;
        tracing::debug!(
            method = %self.name,
            handle = %self.handle,
            owner = self.owner.name(),
            params = self.params.len(),
            statements = self.body.len(),
            "finalized method"
        );
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), EmitError> {
        self.phase.ensure_open(|| self.describe())
    }

    fn describe(&self) -> String {
        format!("method `{}` of {}", self.name, self.owner.name())
    }
}
