//! Expression nodes and their lowering.
//!
//! An [`Expr`] is a node kind plus the type of the value it leaves on the
//! evaluation stack. The lowering contract is local to each node:
//!
//! - a node with a non-void result type leaves exactly one more value on the
//!   stack than before it ran;
//! - a node with a `void` result type leaves the stack unchanged.
//!
//! Nodes check the types of their own operands while lowering; nothing checks
//! stack balance across a whole body (backends may verify that at commit).

use std::fmt;
use std::sync::Arc;

use forge_meta::{ConstValue, ConstructorRef, FieldRef, MethodInfo, MethodRef, TypeId};

use crate::instr::{BinaryOp, InstructionStream, LocalId};
use crate::stack::ensure_sufficient_stack;
use crate::{Local, LowerError};

/// A caller-defined node kind.
///
/// Lets hosts add node kinds without touching [`ExprKind`]. A kind that does
/// not override [`lower`](ExprExtension::lower) is rejected with
/// [`LowerError::Unsupported`] when its body is lowered.
pub trait ExprExtension: fmt::Debug + Send + Sync {
    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;

    fn result_type(&self) -> TypeId {
        TypeId::VOID
    }

    fn lower(&self, stream: &mut dyn InstructionStream) -> Result<(), LowerError> {
        let _ = stream;
        Err(LowerError::Unsupported {
            construct: self.name(),
        })
    }
}

/// Node kinds.
#[derive(Clone, Debug)]
pub enum ExprKind {
    // Values
    Constant(ConstValue),
    /// The receiver (argument 0) of an instance member.
    This,
    /// A formal parameter by 1-based position.
    Param(u16),
    Local(LocalId),

    // Stores
    StoreLocal {
        local: LocalId,
        value: Box<Expr>,
    },
    /// Instance field when `receiver` is present, static field otherwise.
    LoadField {
        receiver: Option<Box<Expr>>,
        field: FieldRef,
    },
    StoreField {
        receiver: Option<Box<Expr>>,
        field: FieldRef,
        value: Box<Expr>,
    },

    // Invocation
    Call {
        receiver: Option<Box<Expr>>,
        method: MethodRef,
        args: Vec<Expr>,
        virtual_dispatch: bool,
    },
    /// Initializer chain call on the receiver: `this.ctor(args)`.
    ConstructorCall {
        target: ConstructorRef,
        args: Vec<Expr>,
    },
    /// Allocate a new object and run `ctor` on it.
    New {
        ctor: ConstructorRef,
        args: Vec<Expr>,
    },

    // Operators and control flow
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Condition {
        test: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Option<Box<Expr>>,
    },
    /// Sequence; intermediate values are discarded, the last one is kept.
    Block(Vec<Expr>),
    Return(Option<Box<Expr>>),
    /// Evaluate for side effects and drop the value.
    Discard(Box<Expr>),

    Extension(Arc<dyn ExprExtension>),
}

impl ExprKind {
    /// Short name for tracing and diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            ExprKind::Constant(_) => "constant",
            ExprKind::This => "this",
            ExprKind::Param(_) => "param",
            ExprKind::Local(_) => "local",
            ExprKind::StoreLocal { .. } => "store_local",
            ExprKind::LoadField { .. } => "load_field",
            ExprKind::StoreField { .. } => "store_field",
            ExprKind::Call { .. } => "call",
            ExprKind::ConstructorCall { .. } => "constructor_call",
            ExprKind::New { .. } => "new",
            ExprKind::Binary { .. } => "binary",
            ExprKind::Condition { .. } => "condition",
            ExprKind::Block(_) => "block",
            ExprKind::Return(_) => "return",
            ExprKind::Discard(_) => "discard",
            ExprKind::Extension(ext) => ext.name(),
        }
    }
}

/// An expression node: a kind and its result type.
#[derive(Clone, Debug)]
pub struct Expr {
    kind: ExprKind,
    ty: TypeId,
}

impl Expr {
    fn new(kind: ExprKind, ty: TypeId) -> Self {
        Self { kind, ty }
    }

    #[inline]
    pub fn kind(&self) -> &ExprKind {
        &self.kind
    }

    /// Type of the value this node leaves on the stack; `void` for none.
    #[inline]
    pub fn result_type(&self) -> TypeId {
        self.ty
    }

    #[inline]
    pub fn is_void(&self) -> bool {
        self.ty.is_void()
    }

    #[inline]
    pub fn is_return(&self) -> bool {
        matches!(self.kind, ExprKind::Return(_))
    }

    // ── Builders ────────────────────────────────────────────────────

    pub fn constant(value: ConstValue) -> Self {
        let ty = value.ty();
        Self::new(ExprKind::Constant(value), ty)
    }

    /// The receiver, typed as the type under construction.
    pub fn this(ty: TypeId) -> Self {
        Self::new(ExprKind::This, ty)
    }

    pub fn param(position: u16, ty: TypeId) -> Self {
        Self::new(ExprKind::Param(position), ty)
    }

    pub fn local(local: Local) -> Self {
        Self::new(ExprKind::Local(local.id()), local.ty())
    }

    pub fn store_local(local: Local, value: Expr) -> Self {
        Self::new(
            ExprKind::StoreLocal {
                local: local.id(),
                value: Box::new(value),
            },
            TypeId::VOID,
        )
    }

    /// Load a field; `receiver` is `None` for static fields.
    pub fn field(receiver: Option<Expr>, field: FieldRef, ty: TypeId) -> Self {
        Self::new(
            ExprKind::LoadField {
                receiver: receiver.map(Box::new),
                field,
            },
            ty,
        )
    }

    /// Store into a field; `receiver` is `None` for static fields.
    pub fn store_field(receiver: Option<Expr>, field: FieldRef, value: Expr) -> Self {
        Self::new(
            ExprKind::StoreField {
                receiver: receiver.map(Box::new),
                field,
                value: Box::new(value),
            },
            TypeId::VOID,
        )
    }

    /// Non-virtual call; `receiver` is `None` for static methods.
    pub fn call(
        receiver: Option<Expr>,
        method: MethodRef,
        return_type: TypeId,
        args: Vec<Expr>,
    ) -> Self {
        Self::new(
            ExprKind::Call {
                receiver: receiver.map(Box::new),
                method,
                args,
                virtual_dispatch: false,
            },
            return_type,
        )
    }

    /// Virtual call through `receiver`.
    pub fn call_virtual(
        receiver: Expr,
        method: MethodRef,
        return_type: TypeId,
        args: Vec<Expr>,
    ) -> Self {
        Self::new(
            ExprKind::Call {
                receiver: Some(Box::new(receiver)),
                method,
                args,
                virtual_dispatch: true,
            },
            return_type,
        )
    }

    /// Call a reflected method, taking the return type from its record.
    pub fn call_method(receiver: Option<Expr>, method: &MethodInfo, args: Vec<Expr>) -> Self {
        Self::call(receiver, method.handle, method.return_type, args)
    }

    /// Chain to `target` on the receiver.
    pub fn constructor_call(target: ConstructorRef, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::ConstructorCall { target, args }, TypeId::VOID)
    }

    pub fn new_object(ctor: ConstructorRef, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::New { ctor, args }, ctor.declaring_type)
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        let ty = if op.is_comparison() {
            TypeId::BOOL
        } else {
            lhs.ty
        };
        Self::new(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty,
        )
    }

    /// `if test { then } else { else }`. Without an else branch the node is void.
    pub fn condition(test: Expr, then_branch: Expr, else_branch: Option<Expr>) -> Self {
        let ty = if else_branch.is_some() {
            then_branch.ty
        } else {
            TypeId::VOID
        };
        Self::new(
            ExprKind::Condition {
                test: Box::new(test),
                then_branch: Box::new(then_branch),
                else_branch: else_branch.map(Box::new),
            },
            ty,
        )
    }

    pub fn block(nodes: Vec<Expr>) -> Self {
        let ty = nodes.last().map_or(TypeId::VOID, |last| last.ty);
        Self::new(ExprKind::Block(nodes), ty)
    }

    pub fn ret(value: Option<Expr>) -> Self {
        Self::new(ExprKind::Return(value.map(Box::new)), TypeId::VOID)
    }

    pub fn discard(value: Expr) -> Self {
        Self::new(ExprKind::Discard(Box::new(value)), TypeId::VOID)
    }

    pub fn extension(ext: Arc<dyn ExprExtension>) -> Self {
        let ty = ext.result_type();
        Self::new(ExprKind::Extension(ext), ty)
    }

    // ── Lowering ────────────────────────────────────────────────────

    /// Emit the instructions that compute this node at the current position.
    pub fn lower(&self, stream: &mut dyn InstructionStream) -> Result<(), LowerError> {
        ensure_sufficient_stack(|| self.lower_node(stream))
    }

    fn lower_node(&self, s: &mut dyn InstructionStream) -> Result<(), LowerError> {
        tracing::trace!(kind = self.kind.name(), ty = %self.ty, "lower");
        match &self.kind {
            ExprKind::Constant(value) => s.load_const(value),
            ExprKind::This => s.load_arg(0),
            ExprKind::Param(position) => s.load_arg(*position),
            ExprKind::Local(local) => s.load_local(*local),

            ExprKind::StoreLocal { local, value } => {
                lower_value(value, s, "local store")?;
                s.store_local(*local);
            }
            ExprKind::LoadField { receiver, field } => match receiver {
                Some(receiver) => {
                    lower_value(receiver, s, "field receiver")?;
                    s.load_field(*field);
                }
                None => s.load_static_field(*field),
            },
            ExprKind::StoreField {
                receiver,
                field,
                value,
            } => {
                if let Some(receiver) = receiver {
                    lower_value(receiver, s, "field receiver")?;
                }
                lower_value(value, s, "field store")?;
                match receiver {
                    Some(_) => s.store_field(*field),
                    None => s.store_static_field(*field),
                }
            }

            ExprKind::Call {
                receiver,
                method,
                args,
                virtual_dispatch,
            } => {
                if let Some(receiver) = receiver {
                    lower_value(receiver, s, "call receiver")?;
                }
                lower_args(args, s)?;
                if *virtual_dispatch {
                    s.call_virtual(*method);
                } else {
                    s.call(*method);
                }
            }
            ExprKind::ConstructorCall { target, args } => {
                s.load_arg(0);
                lower_args(args, s)?;
                s.call_constructor(*target);
            }
            ExprKind::New { ctor, args } => {
                lower_args(args, s)?;
                s.new_object(*ctor);
            }

            ExprKind::Binary { op, lhs, rhs } => {
                if op.is_logical() {
                    expect_type(lhs, TypeId::BOOL, "logical operand")?;
                    expect_type(rhs, TypeId::BOOL, "logical operand")?;
                } else {
                    expect_type(rhs, lhs.ty, "binary operand")?;
                }
                lower_value(lhs, s, "binary operand")?;
                lower_value(rhs, s, "binary operand")?;
                s.binary(*op);
            }
            ExprKind::Condition {
                test,
                then_branch,
                else_branch,
            } => lower_condition(test, then_branch, else_branch.as_deref(), s)?,
            ExprKind::Block(nodes) => {
                let last = nodes.len().saturating_sub(1);
                for (i, node) in nodes.iter().enumerate() {
                    node.lower(s)?;
                    if i != last && !node.is_void() {
                        s.pop();
                    }
                }
            }
            ExprKind::Return(value) => {
                if let Some(value) = value {
                    lower_value(value, s, "return value")?;
                }
                s.ret();
            }
            ExprKind::Discard(value) => {
                value.lower(s)?;
                if !value.is_void() {
                    s.pop();
                }
            }

            ExprKind::Extension(ext) => ext.lower(s)?,
        }
        Ok(())
    }
}

fn lower_condition(
    test: &Expr,
    then_branch: &Expr,
    else_branch: Option<&Expr>,
    s: &mut dyn InstructionStream,
) -> Result<(), LowerError> {
    expect_type(test, TypeId::BOOL, "condition test")?;
    match else_branch {
        Some(else_branch) => expect_type(else_branch, then_branch.ty, "condition branch")?,
        None => expect_type(then_branch, TypeId::VOID, "condition without else")?,
    }

    let else_label = s.define_label();
    test.lower(s)?;
    s.branch_if_false(else_label);
    then_branch.lower(s)?;
    match else_branch {
        Some(else_branch) => {
            let end = s.define_label();
            s.branch(end);
            s.mark_label(else_label);
            else_branch.lower(s)?;
            s.mark_label(end);
        }
        None => s.mark_label(else_label),
    }
    Ok(())
}

impl From<ConstValue> for Expr {
    fn from(value: ConstValue) -> Self {
        Expr::constant(value)
    }
}

fn lower_value(
    expr: &Expr,
    s: &mut dyn InstructionStream,
    context: &'static str,
) -> Result<(), LowerError> {
    if expr.is_void() {
        return Err(LowerError::VoidOperand { context });
    }
    expr.lower(s)
}

fn lower_args(args: &[Expr], s: &mut dyn InstructionStream) -> Result<(), LowerError> {
    for arg in args {
        lower_value(arg, s, "call argument")?;
    }
    Ok(())
}

fn expect_type(expr: &Expr, expected: TypeId, context: &'static str) -> Result<(), LowerError> {
    if expr.ty == expected {
        Ok(())
    } else {
        Err(LowerError::TypeMismatch {
            context,
            expected,
            found: expr.ty,
        })
    }
}
