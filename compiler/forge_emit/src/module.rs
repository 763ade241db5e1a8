//! Module emitter: the entry point that owns a backend.

use std::sync::Arc;

use forge_meta::{MetadataProvider, TypeAttributes, TypeId};
use rustc_hash::FxHashSet;

use crate::backend::TargetBackend;
use crate::{EmitError, TypeEmitter};

/// Owns a [`TargetBackend`] and hands out [`TypeEmitter`]s for it.
pub struct ModuleEmitter<B: TargetBackend> {
    name: String,
    backend: B,
    type_names: FxHashSet<String>,
}

impl<B: TargetBackend> ModuleEmitter<B> {
    pub fn new(name: impl Into<String>, backend: B) -> Self {
        Self {
            name: name.into(),
            backend,
            type_names: FxHashSet::default(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metadata(&self) -> Arc<dyn MetadataProvider> {
        self.backend.metadata()
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Start a new type deriving from `base`.
    ///
    /// The base must be known to the metadata service and must be neither
    /// sealed nor an interface. Interfaces themselves are declared with base
    /// `object`.
    pub fn define_type(
        &mut self,
        name: &str,
        attributes: TypeAttributes,
        base: TypeId,
    ) -> Result<TypeEmitter, EmitError> {
        if name.is_empty() {
            return Err(EmitError::invalid("type name is empty"));
        }
        if self.type_names.contains(name) {
            return Err(EmitError::invalid(format!(
                "type `{name}` is already defined in module `{}`",
                self.name
            )));
        }
        let metadata = self.backend.metadata();
        let Some(base_info) = metadata.type_info(base) else {
            return Err(EmitError::LookupFailure {
                ty: base,
                detail: "base type is not known".to_owned(),
            });
        };
        if base_info.attributes.is_interface()
            || base_info.attributes.contains(TypeAttributes::SEALED)
        {
            return Err(EmitError::invalid(format!(
                "{} cannot be used as a base type",
                base_info.name
            )));
        }
        if attributes.is_interface() && base != TypeId::OBJECT {
            return Err(EmitError::invalid(format!(
                "interface `{name}` cannot derive from {}",
                base_info.name
            )));
        }

        let ty = self.backend.define_type(name, attributes, base)?;
        self.type_names.insert(name.to_owned());
        tracing::debug!(module = %self.name, ty = %ty, name, base = %base, "defined type");
        Ok(TypeEmitter::new(ty, name, attributes, base, metadata))
    }

    /// Shorthand for a public class.
    pub fn define_class(&mut self, name: &str, base: TypeId) -> Result<TypeEmitter, EmitError> {
        self.define_type(name, TypeAttributes::PUBLIC, base)
    }

    pub fn define_interface(&mut self, name: &str) -> Result<TypeEmitter, EmitError> {
        self.define_type(
            name,
            TypeAttributes::PUBLIC | TypeAttributes::INTERFACE | TypeAttributes::ABSTRACT,
            TypeId::OBJECT,
        )
    }

    /// Commit a finished type. See [`TypeEmitter::commit`].
    ///
    /// When the commit fails the backend discards the partly written type and
    /// its name becomes available to [`define_type`](Self::define_type) again.
    pub fn commit(&mut self, ty: TypeEmitter) -> Result<TypeId, EmitError> {
        let id = ty.ty();
        let name = ty.name().to_owned();
        let result = ty.commit(&mut self.backend);
        if let Err(err) = &result {
            if self.backend.discard_type(id) {
                self.type_names.remove(&name);
                tracing::debug!(
                    module = %self.name,
                    ty = %id,
                    name = %name,
                    error = %err,
                    "discarded type"
                );
            }
        }
        result
    }
}
