//! State shared between a type emitter and its members.

use std::fmt;
use std::sync::Arc;

use forge_meta::{lookup_target, MetadataProvider, TypeAttributes, TypeId};

use crate::EmitError;

/// Immutable facts about the type under construction.
///
/// Member emitters hold an `Arc<OwnerInfo>` instead of a reference to their
/// [`TypeEmitter`](crate::TypeEmitter), so they can be finalized while the
/// type emitter is borrowed by the commit loop.
pub struct OwnerInfo {
    pub(crate) ty: TypeId,
    pub(crate) name: String,
    pub(crate) attributes: TypeAttributes,
    pub(crate) base: TypeId,
    pub(crate) metadata: Arc<dyn MetadataProvider>,
}

impl OwnerInfo {
    #[inline]
    pub fn ty(&self) -> TypeId {
        self.ty
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn attributes(&self) -> TypeAttributes {
        self.attributes
    }

    /// Declared base type; may be a generic placeholder.
    #[inline]
    pub fn base(&self) -> TypeId {
        self.base
    }

    /// Base type with a generic placeholder replaced by its definition.
    pub fn chain_target(&self) -> TypeId {
        lookup_target(self.metadata.as_ref(), self.base)
    }

    #[inline]
    pub fn metadata(&self) -> &dyn MetadataProvider {
        self.metadata.as_ref()
    }
}

impl fmt::Debug for OwnerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnerInfo")
            .field("ty", &self.ty)
            .field("name", &self.name)
            .field("attributes", &self.attributes)
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

/// Lifecycle of a member emitter.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    /// Accepting parameters and statements.
    #[default]
    Open,
    /// Being written into a slot. A failed finalization stays here.
    Finalizing,
    /// Written; no further changes.
    Committed,
}

impl Phase {
    /// Fail with `AlreadyFinalized` unless still open.
    pub(crate) fn ensure_open(self, member: impl FnOnce() -> String) -> Result<(), EmitError> {
        match self {
            Phase::Open => Ok(()),
            Phase::Finalizing | Phase::Committed => {
                Err(EmitError::AlreadyFinalized { member: member() })
            }
        }
    }
}
