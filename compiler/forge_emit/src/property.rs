//! Property emitter.
//!
//! A property is metadata only: a name and type linking up to two accessor
//! methods. The accessors themselves are ordinary [`MethodEmitter`]s; the
//! type emitter checks their signatures before the property is finalized.
//!
//! [`MethodEmitter`]: crate::MethodEmitter

use std::sync::Arc;

use forge_meta::{AttributeSpec, MethodRef, PropertyInfo, TypeId};

use crate::backend::PropertySlot;
use crate::owner::{OwnerInfo, Phase};
use crate::EmitError;

#[derive(Debug)]
pub struct PropertyEmitter {
    owner: Arc<OwnerInfo>,
    name: String,
    ty: TypeId,
    getter: Option<MethodRef>,
    setter: Option<MethodRef>,
    tags: Vec<AttributeSpec>,
    phase: Phase,
}

impl PropertyEmitter {
    pub(crate) fn new(owner: Arc<OwnerInfo>, name: &str, ty: TypeId) -> Self {
        Self {
            owner,
            name: name.to_owned(),
            ty,
            getter: None,
            setter: None,
            tags: Vec::new(),
            phase: Phase::Open,
        }
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
    pub fn getter(&self) -> Option<MethodRef> {
        self.getter
    }

    #[inline]
    pub fn setter(&self) -> Option<MethodRef> {
        self.setter
    }

    pub fn info(&self) -> PropertyInfo {
        PropertyInfo {
            name: self.name.clone(),
            ty: self.ty,
            getter: self.getter,
            setter: self.setter,
        }
    }

    pub fn set_getter(&mut self, getter: MethodRef) -> Result<&mut Self, EmitError> {
        self.ensure_open()?;
        self.check_owner(getter)?;
        self.getter = Some(getter);
        Ok(self)
    }

    pub fn set_setter(&mut self, setter: MethodRef) -> Result<&mut Self, EmitError> {
        self.ensure_open()?;
        self.check_owner(setter)?;
        self.setter = Some(setter);
        Ok(self)
    }

    pub fn add_attribute(&mut self, spec: AttributeSpec) -> Result<&mut Self, EmitError> {
        self.ensure_open()?;
        self.tags.push(spec);
        Ok(self)
    }

    fn check_owner(&self, accessor: MethodRef) -> Result<(), EmitError> {
        if accessor.declaring_type == self.owner.ty() {
            Ok(())
        } else {
            Err(EmitError::invalid(format!(
                "accessor {accessor} of property `{}` belongs to another type",
                self.name
            )))
        }
    }

    /// Link accessors and write tags into `slot`. Runs once.
    pub fn finalize<S: PropertySlot>(&mut self, slot: &mut S) -> Result<(), EmitError> {
        self.ensure_open()?;
        self.phase = Phase::Finalizing;
        if self.getter.is_none() && self.setter.is_none() {
            return Err(EmitError::invalid(format!(
                "property `{}` has no accessors",
                self.name
            )));
        }
        if let Some(getter) = self.getter {
            slot.set_getter(getter)?;
        }
        if let Some(setter) = self.setter {
            slot.set_setter(setter)?;
        }
        for tag in &self.tags {
            slot.set_attribute(tag)?;
        }
        self.phase = Phase::Committed;
        tracing::debug!(property = %self.name, owner = self.owner.name(), "finalized property");
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), EmitError> {
        self.phase
            .ensure_open(|| format!("property `{}` of {}", self.name, self.owner.name()))
    }
}
