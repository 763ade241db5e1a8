//! Constructor emitter.
//!
//! A constructor's body must chain to another constructor before it returns:
//! either one on the base type or a sibling on the same type. Callers may
//! write that chain explicitly with [`ConstructorEmitter::invoke_base_constructor`]
//! or [`ConstructorEmitter::invoke_constructor`]. When nothing at all has been
//! appended by finalization time, the emitter synthesizes a parameterless base
//! chain itself.
//!
//! The check for "nothing appended" is literal: a body holding any statement,
//! even one that does not chain, gets no implicit chain. Backends that verify
//! bodies (such as `forge_vm`) reject such constructors at commit.

use std::sync::Arc;

use forge_ir::{Body, Expr, Local};
use forge_meta::{
    resolve_constructor, AttributeSpec, CallingConventions, ConstructorInfo, ConstructorRef,
    ImplPolicy, MemberAttributes, ParamAttributes, ParameterInfo, TypeId,
};

use crate::backend::{MemberDecl, MemberSlot};
use crate::owner::{OwnerInfo, Phase};
use crate::parameter::{ParameterEmitter, ParameterList};
use crate::EmitError;

/// Name constructors are declared under.
pub const CONSTRUCTOR_NAME: &str = ".ctor";

/// Builds one constructor of a type under construction.
#[derive(Debug)]
pub struct ConstructorEmitter {
    owner: Arc<OwnerInfo>,
    handle: ConstructorRef,
    attributes: MemberAttributes,
    conventions: CallingConventions,
    policy: ImplPolicy,
    params: ParameterList,
    body: Body,
    tags: Vec<AttributeSpec>,
    phase: Phase,
}

impl ConstructorEmitter {
    pub(crate) fn new(
        owner: Arc<OwnerInfo>,
        index: u32,
        attributes: MemberAttributes,
        conventions: CallingConventions,
    ) -> Self {
        let handle = ConstructorRef::new(owner.ty(), index);
        Self {
            owner,
            handle,
            attributes: attributes | MemberAttributes::SPECIAL_NAME,
            conventions,
            policy: ImplPolicy::Instructions,
            params: ParameterList::default(),
            body: Body::new(),
            tags: Vec::new(),
            phase: Phase::Open,
        }
    }

    // ── Accessors ───────────────────────────────────────────────────

    #[inline]
    pub fn handle(&self) -> ConstructorRef {
        self.handle
    }

    #[inline]
    pub fn attributes(&self) -> MemberAttributes {
        self.attributes
    }

    #[inline]
    pub fn conventions(&self) -> CallingConventions {
        self.conventions
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

    /// Reflective record of the constructor as currently declared.
    pub fn info(&self) -> ConstructorInfo {
        ConstructorInfo {
            handle: self.handle,
            attributes: self.attributes,
            conventions: self.conventions,
            parameters: self.params.infos(),
        }
    }

    /// The receiver, as an expression.
    pub fn this(&self) -> Expr {
        Expr::this(self.owner.ty())
    }

    /// The parameter at 1-based `position`, as an expression.
    pub fn param(&self, position: u16) -> Option<Expr> {
        self.params
            .type_at(position)
            .map(|ty| Expr::param(position, ty))
    }

    // ── Declaration ─────────────────────────────────────────────────

    /// Request a host-supplied body instead of instructions.
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

    /// Define the next parameter from scratch.
    pub fn define_parameter(
        &mut self,
        ty: TypeId,
        attributes: ParamAttributes,
        name: &str,
    ) -> Result<&mut ParameterEmitter, EmitError> {
        self.ensure_open()?;
        self.params.define(ty, attributes, name)
    }

    /// Define the next parameter as a copy of `source`, including its default
    /// value and attached tags.
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

    // ── Body ────────────────────────────────────────────────────────

    pub fn append(&mut self, node: Expr) -> Result<(), EmitError> {
        self.ensure_open()?;
        self.body.append(node);
        Ok(())
    }

    /// Append a chain call to the base type's parameterless constructor.
    pub fn invoke_base_constructor(&mut self) -> Result<(), EmitError> {
        self.ensure_open()?;
        let chain = self.base_chain()?;
        self.body.append(chain);
        Ok(())
    }

    /// Append a chain call to `target` with `args` in caller order.
    ///
    /// `target` must be declared on the base type or on this type.
    pub fn invoke_constructor(
        &mut self,
        target: ConstructorRef,
        args: Vec<Expr>,
    ) -> Result<(), EmitError> {
        self.ensure_open()?;
        let declaring = target.declaring_type;
        let on_base = declaring == self.owner.base() || declaring == self.owner.chain_target();
        if !on_base && declaring != self.owner.ty() {
            return Err(EmitError::invalid(format!(
                "constructor {target} is declared on neither {} nor its base {}",
                self.owner.name(),
                self.owner.base()
            )));
        }
        if on_base {
            let Some(info) = self.owner.metadata().constructor_info(target) else {
                return Err(EmitError::LookupFailure {
                    ty: declaring,
                    detail: format!("no constructor {target}"),
                });
            };
            if info.arity() != args.len() {
                return Err(EmitError::invalid(format!(
                    "constructor {target} takes {} arguments, {} given",
                    info.arity(),
                    args.len()
                )));
            }
        }
        self.body.append(Expr::constructor_call(target, args));
        Ok(())
    }

    fn base_chain(&self) -> Result<Expr, EmitError> {
        let base = self.owner.base();
        let ctor = resolve_constructor(self.owner.metadata(), base, 0).ok_or_else(|| {
            EmitError::LookupFailure {
                ty: base,
                detail: "no parameterless instance constructor".to_owned(),
            }
        })?;
        Ok(Expr::constructor_call(ctor.handle, Vec::new()))
    }

    // ── Finalization ────────────────────────────────────────────────

    pub(crate) fn decl(&self) -> MemberDecl<'_> {
        MemberDecl {
            name: CONSTRUCTOR_NAME,
            attributes: self.attributes,
            conventions: self.conventions,
            policy: self.policy,
            return_type: TypeId::VOID,
        }
    }

    /// Write the constructor into `slot`. Runs once.
    ///
    /// A slot whose body is host-supplied receives nothing. Otherwise an empty
    /// body first gets the implicit base chain (the lookup runs before anything
    /// is written), then parameters are defined in position order and the body
    /// is lowered, followed by `ret` unless the body already returns.
    pub fn finalize<S: MemberSlot>(&mut self, slot: &mut S) -> Result<(), EmitError> {
        self.ensure_open()?;
        self.phase = Phase::Finalizing;

        if slot.impl_policy().is_host_supplied() {
            tracing::warn!(
                ctor = %self.handle,
                owner = self.owner.name(),
                "constructor body is host-supplied; nothing emitted"
            );
            self.phase = Phase::Committed;
            return Ok(());
        }

        if self.body.is_empty() {
            let chain = self.base_chain()?;
            tracing::trace!(ctor = %self.handle, "synthesized base constructor chain");
            self.body.append(chain);
        }

        self.params.write_all(slot)?;
        for tag in &self.tags {
            slot.set_attribute(tag)?;
        }

        let stream = slot.stream();
        self.body.lower(stream)?;
        if !self.body.ends_with_return() {
            stream.ret();
        }

        self.phase = Phase::Committed;
        tracing::debug!(
            ctor = %self.handle,
            owner = self.owner.name(),
            params = self.params.len(),
            statements = self.body.len(),
            "finalized constructor"
        );
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), EmitError> {
        self.phase.ensure_open(|| self.describe())
    }

    fn describe(&self) -> String {
        format!("constructor {} of {}", self.handle, self.owner.name())
    }
}
