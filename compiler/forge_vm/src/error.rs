//! Runtime and verification errors.

use forge_ir::Label;
use forge_meta::TypeId;

/// Interpreter failure.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum VmError {
    #[error("type {0} is not committed")]
    UnknownType(TypeId),

    /// Interfaces and abstract classes have no instances.
    #[error("type {0} cannot be instantiated")]
    AbstractType(TypeId),

    #[error("no member {0}")]
    UnknownMember(String),

    /// The member has no instructions and no native binding.
    #[error("{0} has no executable body")]
    NoBody(String),

    #[error("{member} expects {expected} arguments, {found} given")]
    ArityMismatch {
        member: String,
        expected: usize,
        found: usize,
    },

    #[error("{op}: unexpected {found}")]
    TypeMismatch { op: &'static str, found: String },

    #[error("null receiver in {0}")]
    NullReference(String),

    #[error("division by zero")]
    DivideByZero,

    #[error("call depth exceeded ({0} frames)")]
    CallDepthExceeded(usize),

    /// Malformed code that would have been caught by verification.
    #[error("invalid code in {member}: {reason}")]
    InvalidCode { member: String, reason: String },

    /// Raised by a native binding.
    #[error("native {member} failed: {message}")]
    Native { member: String, message: String },
}

/// Why a body failed verification.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("stack underflow at {at}")]
    StackUnderflow { at: usize },

    #[error("stack depth {found} at {at} disagrees with {expected} on another path")]
    InconsistentDepth {
        at: usize,
        expected: usize,
        found: usize,
    },

    #[error("`ret` at {at} leaves {found} values, expected {expected}")]
    BadReturn {
        at: usize,
        expected: usize,
        found: usize,
    },

    #[error("control falls off the end of the body")]
    FallsThrough,

    #[error("label L{} is never marked", .0.raw())]
    UnmarkedLabel(Label),

    #[error("argument {position} at {at} is out of range")]
    BadArgument { at: usize, position: u16 },

    #[error("local {local} at {at} is not declared")]
    BadLocal { at: usize, local: u32 },

    #[error("unknown member {member} at {at}")]
    UnknownMember { at: usize, member: String },

    #[error("constructor never chains to a base or sibling constructor")]
    MissingChain,
}
