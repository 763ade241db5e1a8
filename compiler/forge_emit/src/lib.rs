//! Emitters for the Forge type construction engine.
//!
//! Builds new types at runtime, member by member, and writes them into a
//! pluggable [`TargetBackend`]:
//!
//! ```text
//! ModuleEmitter ── define_type ──► TypeEmitter
//!                                    ├── define_field       ► FieldEmitter
//!                                    ├── define_constructor ► ConstructorEmitter
//!                                    ├── define_method      ► MethodEmitter
//!                                    └── define_property    ► PropertyEmitter
//! TypeEmitter::commit ── finalize each member into a backend slot ── commit_type
//! ```
//!
//! Member bodies are `forge_ir` expression trees. Constructors that receive no
//! statements chain to the base type's parameterless constructor on their own.
//!
//! # Crate Dependencies
//!
//! Builds on `forge_meta` (metadata, flags, constructor resolution) and
//! `forge_ir` (expressions, lowering). `forge_vm` provides a backend.

mod backend;
mod constructor;
mod error;
mod field;
mod method;
mod module;
mod owner;
mod parameter;
mod property;
mod type_emitter;

#[cfg(test)]
mod test_helpers;

pub use backend::{
    FieldDecl, FieldSlot, MemberDecl, MemberSlot, ParameterSlot, PropertySlot, TargetBackend,
};
pub use constructor::{ConstructorEmitter, CONSTRUCTOR_NAME};
pub use error::{BackendError, EmitError};
pub use field::FieldEmitter;
pub use method::MethodEmitter;
pub use module::ModuleEmitter;
pub use owner::{OwnerInfo, Phase};
pub use parameter::ParameterEmitter;
pub use property::PropertyEmitter;
pub use type_emitter::TypeEmitter;
