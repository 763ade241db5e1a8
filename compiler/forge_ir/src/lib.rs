//! Expression trees and lowering for the Forge type construction engine.
//!
//! Callers describe member bodies as trees of [`Expr`] nodes collected into a
//! [`Body`]. Lowering walks the tree and drives an [`InstructionStream`], the
//! only capability a target backend has to expose for code.
//!
//! # Architecture
//!
//! - `expr`: node kinds, builders, and per-node lowering
//! - `body`: the statement sequence and its local slots
//! - `instr`: the stream trait, [`Instr`], and [`InstrBuffer`]
//!
//! # Crate Dependencies
//!
//! Depends on `forge_meta` for type handles, constants and member handles.
//! `forge_emit` drives lowering; `forge_vm` consumes [`InstrBuffer`]s.

mod body;
mod error;
mod expr;
mod instr;
mod stack;

pub use body::{Body, Local};
pub use error::LowerError;
pub use expr::{Expr, ExprExtension, ExprKind};
pub use instr::{BinaryOp, Instr, InstrBuffer, InstructionStream, Label, LocalId};
pub use stack::ensure_sufficient_stack;
