//! Emission errors.
//!
//! Every operation is fail-fast: the first error aborts the member (and the
//! type commit it belongs to). Nothing is retried and nothing is partially
//! committed by the emitters themselves.

use forge_ir::LowerError;
use forge_meta::TypeId;

/// A definition or commit was rejected by the target backend.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The type was committed before; committed types are permanent.
    #[error("type {0} has already been committed")]
    AlreadyCommitted(TypeId),

    /// The backend has no record of this type.
    #[error("type {0} is not defined in this backend")]
    UnknownType(TypeId),

    /// The backend refused a member or type, e.g. failed verification.
    #[error("{member}: {reason}")]
    Rejected { member: String, reason: String },
}

/// Error produced while building or committing a type.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EmitError {
    /// A defective argument, reported at the call that received it.
    #[error("invalid argument: {what}")]
    InvalidArgument { what: String },

    /// No constructor to chain to.
    #[error("constructor lookup on {ty} failed: {detail}")]
    LookupFailure { ty: TypeId, detail: String },

    /// A node kind with no lowering.
    #[error("unsupported construct `{construct}`")]
    UnsupportedConstruct { construct: &'static str },

    /// The member was already finalized (or its finalization failed).
    #[error("{member} has already been finalized")]
    AlreadyFinalized { member: String },

    #[error("type {ty} has already been committed")]
    AlreadyCommitted { ty: TypeId },

    #[error(transparent)]
    Backend(BackendError),
}

impl EmitError {
    pub(crate) fn invalid(what: impl Into<String>) -> Self {
        EmitError::InvalidArgument { what: what.into() }
    }
}

impl From<LowerError> for EmitError {
    fn from(err: LowerError) -> Self {
        match err {
            LowerError::Unsupported { construct } => EmitError::UnsupportedConstruct { construct },
            other @ (LowerError::TypeMismatch { .. } | LowerError::VoidOperand { .. }) => {
                EmitError::invalid(other.to_string())
            }
        }
    }
}

impl From<BackendError> for EmitError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::AlreadyCommitted(ty) => EmitError::AlreadyCommitted { ty },
            other => EmitError::Backend(other),
        }
    }
}
