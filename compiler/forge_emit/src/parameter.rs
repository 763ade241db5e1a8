//! Parameter descriptors.

use forge_meta::{AttributeSpec, ConstValue, ParamAttributes, ParameterInfo, TypeId};

use crate::backend::{MemberSlot, ParameterSlot};
use crate::EmitError;

/// One formal parameter of a constructor or method under construction.
///
/// Positions are 1-based and assigned by the owning member in definition
/// order; position 0 is the implicit receiver and never gets a descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParameterEmitter {
    position: u16,
    ty: TypeId,
    attributes: ParamAttributes,
    name: String,
    default_value: Option<ConstValue>,
    tags: Vec<AttributeSpec>,
}

impl ParameterEmitter {
    fn new(
        position: u16,
        ty: TypeId,
        attributes: ParamAttributes,
        name: &str,
    ) -> Result<Self, EmitError> {
        if ty.is_void() {
            return Err(EmitError::invalid(format!(
                "parameter `{name}` at position {position} has no type"
            )));
        }
        if name.is_empty() {
            return Err(EmitError::invalid(format!(
                "parameter at position {position} has an empty name"
            )));
        }
        Ok(Self {
            position,
            ty,
            attributes,
            name: name.to_owned(),
            default_value: None,
            tags: Vec::new(),
        })
    }

    /// Copy `source` verbatim into `position`.
    fn mirror(position: u16, source: &ParameterInfo) -> Result<Self, EmitError> {
        let mut param = Self::new(position, source.ty, source.attributes, &source.name)?;
        if source.is_optional() || source.has_default_value() {
            param.default_value.clone_from(&source.default_value);
        }
        param.tags.clone_from(&source.custom_attributes);
        Ok(param)
    }

    #[inline]
    pub fn position(&self) -> u16 {
        self.position
    }

    #[inline]
    pub fn ty(&self) -> TypeId {
        self.ty
    }

    #[inline]
    pub fn attributes(&self) -> ParamAttributes {
        self.attributes
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn default_value(&self) -> Option<&ConstValue> {
        self.default_value.as_ref()
    }

    /// Attached tags in attachment order.
    #[inline]
    pub fn tags(&self) -> &[AttributeSpec] {
        &self.tags
    }

    /// Make the parameter optional with `value` as its default.
    pub fn set_default(&mut self, value: ConstValue) -> Result<&mut Self, EmitError> {
        if !value.fits(self.ty) {
            return Err(EmitError::invalid(format!(
                "default `{value}` does not fit parameter `{}` of type {}",
                self.name, self.ty
            )));
        }
        self.attributes |= ParamAttributes::OPTIONAL | ParamAttributes::HAS_DEFAULT;
        self.default_value = Some(value);
        Ok(self)
    }

    pub fn add_attribute(&mut self, spec: AttributeSpec) -> &mut Self {
        self.tags.push(spec);
        self
    }

    /// Reflective record for this parameter.
    pub fn info(&self) -> ParameterInfo {
        ParameterInfo {
            position: self.position,
            name: self.name.clone(),
            ty: self.ty,
            attributes: self.attributes,
            default_value: self.default_value.clone(),
            custom_attributes: self.tags.clone(),
        }
    }

    /// Define on `slot`: declaration, then default value, then tags.
    fn write<S: MemberSlot>(&self, slot: &mut S) -> Result<(), EmitError> {
        let param = slot.define_parameter(self.position, self.ty, self.attributes, &self.name)?;
        if let Some(value) = &self.default_value {
            param.set_constant(value)?;
        }
        for tag in &self.tags {
            param.set_attribute(tag)?;
        }
        Ok(())
    }
}

/// Ordered parameter descriptors of one member.
#[derive(Clone, Debug, Default)]
pub(crate) struct ParameterList {
    params: Vec<ParameterEmitter>,
}

impl ParameterList {
    fn next_position(&self) -> Result<u16, EmitError> {
        let Ok(position) = u16::try_from(self.params.len() + 1) else {
            return Err(EmitError::invalid("too many parameters"));
        };
        Ok(position)
    }

    pub(crate) fn define(
        &mut self,
        ty: TypeId,
        attributes: ParamAttributes,
        name: &str,
    ) -> Result<&mut ParameterEmitter, EmitError> {
        let param = ParameterEmitter::new(self.next_position()?, ty, attributes, name)?;
        Ok(self.push(param))
    }

    pub(crate) fn define_from(
        &mut self,
        source: &ParameterInfo,
    ) -> Result<&mut ParameterEmitter, EmitError> {
        let param = ParameterEmitter::mirror(self.next_position()?, source)?;
        Ok(self.push(param))
    }

    fn push(&mut self, param: ParameterEmitter) -> &mut ParameterEmitter {
        tracing::trace!(
            position = param.position,
            name = %param.name,
            ty = %param.ty,
            "defined parameter"
        );
        let index = self.params.len();
        self.params.push(param);
        &mut self.params[index]
    }

    #[inline]
    pub(crate) fn as_slice(&self) -> &[ParameterEmitter] {
        &self.params
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.params.len()
    }

    /// Type of the parameter at 1-based `position`.
    pub(crate) fn type_at(&self, position: u16) -> Option<TypeId> {
        let index = usize::from(position).checked_sub(1)?;
        self.params.get(index).map(ParameterEmitter::ty)
    }

    pub(crate) fn infos(&self) -> Vec<ParameterInfo> {
        self.params.iter().map(ParameterEmitter::info).collect()
    }

    /// Define every parameter on `slot` in position order.
    pub(crate) fn write_all<S: MemberSlot>(&self, slot: &mut S) -> Result<(), EmitError> {
        for param in &self.params {
            param.write(slot)?;
        }
        Ok(())
    }
}
