//! Lowering errors.

use forge_meta::TypeId;

/// Why an expression tree could not be lowered.
///
/// Lowering is fail-fast: the first problem aborts the member being lowered.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LowerError {
    /// The node kind has no lowering.
    #[error("no lowering defined for `{construct}`")]
    Unsupported { construct: &'static str },

    /// An operand has the wrong type for the position it is used in.
    #[error("{context}: expected {expected}, found {found}")]
    TypeMismatch {
        context: &'static str,
        expected: TypeId,
        found: TypeId,
    },

    /// A `void` node was used where a value is required.
    #[error("{context}: operand produces no value")]
    VoidOperand { context: &'static str },
}
