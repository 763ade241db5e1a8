//! Field emitter.

use std::sync::Arc;

use forge_meta::{AttributeSpec, ConstValue, FieldInfo, FieldRef, MemberAttributes, TypeId};

use crate::backend::{FieldDecl, FieldSlot};
use crate::owner::{OwnerInfo, Phase};
use crate::EmitError;

#[derive(Debug)]
pub struct FieldEmitter {
    owner: Arc<OwnerInfo>,
    handle: FieldRef,
    name: String,
    ty: TypeId,
    attributes: MemberAttributes,
    constant: Option<ConstValue>,
    tags: Vec<AttributeSpec>,
    phase: Phase,
}

impl FieldEmitter {
    pub(crate) fn new(
        owner: Arc<OwnerInfo>,
        index: u32,
        name: &str,
        ty: TypeId,
        attributes: MemberAttributes,
    ) -> Self {
        let handle = FieldRef::new(owner.ty(), index);
        Self {
            owner,
            handle,
            name: name.to_owned(),
            ty,
            attributes,
            constant: None,
            tags: Vec::new(),
            phase: Phase::Open,
        }
    }

    #[inline]
    pub fn handle(&self) -> FieldRef {
        self.handle
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn ty(&self) -> TypeId {
        self.ty
    }

    #[inline]
    pub fn attributes(&self) -> MemberAttributes {
        self.attributes
    }

    #[inline]
    pub fn constant(&self) -> Option<&ConstValue> {
        self.constant.as_ref()
    }

    pub fn info(&self) -> FieldInfo {
        FieldInfo {
            handle: self.handle,
            name: self.name.clone(),
            ty: self.ty,
            attributes: self.attributes,
            constant: self.constant.clone(),
        }
    }

    /// Give the field a constant initial value.
    pub fn set_constant(&mut self, value: ConstValue) -> Result<&mut Self, EmitError> {
        self.ensure_open()?;
        if !value.fits(self.ty) {
            return Err(EmitError::invalid(format!(
                "constant `{value}` does not fit field `{}` of type {}",
                self.name, self.ty
            )));
        }
        self.constant = Some(value);
        Ok(self)
    }

    pub fn add_attribute(&mut self, spec: AttributeSpec) -> Result<&mut Self, EmitError> {
        self.ensure_open()?;
        self.tags.push(spec);
        Ok(self)
    }

    pub(crate) fn decl(&self) -> FieldDecl<'_> {
        FieldDecl {
            name: &self.name,
            ty: self.ty,
            attributes: self.attributes,
        }
    }

    /// Write the constant and tags into `slot`. Runs once.
    pub fn finalize<S: FieldSlot>(&mut self, slot: &mut S) -> Result<(), EmitError> {
        self.ensure_open()?;
        self.phase = Phase::Finalizing;
        if self.attributes.contains(MemberAttributes::LITERAL) && self.constant.is_none() {
            return Err(EmitError::invalid(format!(
                "literal field `{}` has no constant",
                self.name
            )));
        }
        if let Some(value) = &self.constant {
            slot.set_constant(value)?;
        }
        for tag in &self.tags {
            slot.set_attribute(tag)?;
        }
        self.phase = Phase::Committed;
        tracing::debug!(field = %self.name, owner = self.owner.name(), "finalized field");
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), EmitError> {
        self.phase
            .ensure_open(|| format!("field `{}` of {}", self.name, self.owner.name()))
    }
}
