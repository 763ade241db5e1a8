//! Member bodies.

use forge_meta::TypeId;

use crate::instr::{InstructionStream, LocalId};
use crate::{Expr, LowerError};

/// A declared local slot: its id plus its type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Local {
    id: LocalId,
    ty: TypeId,
}

impl Local {
    #[inline]
    pub fn id(self) -> LocalId {
        self.id
    }

    #[inline]
    pub fn ty(self) -> TypeId {
        self.ty
    }
}

/// Ordered statement sequence of a constructor or method.
///
/// Nodes are lowered in append order. Unlike [`Expr::block`], a body does not
/// discard values its statements leave behind; statements are expected to be
/// `void` (wrap value-producing calls in [`Expr::discard`]).
#[derive(Clone, Debug, Default)]
pub struct Body {
    nodes: Vec<Expr>,
    locals: Vec<TypeId>,
}

impl Body {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, node: Expr) {
        self.nodes.push(node);
    }

    /// `true` when nothing has been appended yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn nodes(&self) -> &[Expr] {
        &self.nodes
    }

    /// Declare a local slot. Slots are numbered in declaration order.
    pub fn declare_local(&mut self, ty: TypeId) -> Local {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "local counts never approach u32::MAX"
        )]
        let id = LocalId::new(self.locals.len() as u32);
        self.locals.push(ty);
        Local { id, ty }
    }

    #[inline]
    pub fn locals(&self) -> &[TypeId] {
        &self.locals
    }

    /// `true` when the final statement is an explicit return.
    pub fn ends_with_return(&self) -> bool {
        self.nodes.last().is_some_and(Expr::is_return)
    }

    /// Declare locals, then lower every statement in order.
    ///
    /// Stops at the first failure; the stream may hold a partial body.
    pub fn lower(&self, stream: &mut dyn InstructionStream) -> Result<(), LowerError> {
        for &ty in &self.locals {
            stream.declare_local(ty);
        }
        for node in &self.nodes {
            node.lower(stream)?;
        }
        tracing::trace!(
            nodes = self.nodes.len(),
            locals = self.locals.len(),
            "lowered body"
        );
        Ok(())
    }
}
