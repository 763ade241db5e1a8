//! The instruction-stream capability and a recording implementation.
//!
//! [`InstructionStream`] is what a target backend exposes to the lowering
//! code: stack-machine primitives (load, store, call, branch, return). The
//! engine never assumes anything about the backend's encoding.
//!
//! [`InstrBuffer`] records primitives as [`Instr`] values. Backends that
//! interpret or post-process code (and most tests) use it directly.

use std::fmt;

use forge_meta::{ConstValue, ConstructorRef, FieldRef, MethodRef, TypeId};

// ── ID newtypes ─────────────────────────────────────────────────────

/// A branch target within one instruction stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct Label(u32);

impl Label {
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A local variable slot within one member body.
///
/// Slots are numbered in declaration order starting at 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct LocalId(u32);

impl LocalId {
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// ── Operators ───────────────────────────────────────────────────────

/// Binary arithmetic, comparison, and logic operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    /// Comparisons yield `bool` regardless of operand type.
    #[inline]
    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    #[inline]
    pub const fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    /// Mnemonic used in listings.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Rem => "rem",
            BinaryOp::Eq => "ceq",
            BinaryOp::Ne => "cne",
            BinaryOp::Lt => "clt",
            BinaryOp::Le => "cle",
            BinaryOp::Gt => "cgt",
            BinaryOp::Ge => "cge",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

// ── Capability ──────────────────────────────────────────────────────

/// Stack-machine primitives a target backend accepts.
///
/// Each method documents its stack effect as `[before] -> [after]`.
pub trait InstructionStream {
    /// `[] -> [arg]`. Position 0 is the receiver of instance members.
    fn load_arg(&mut self, position: u16);

    /// `[] -> [value]`.
    fn load_const(&mut self, value: &ConstValue);

    /// Declare the next local slot. Slots are numbered 0, 1, ... in call order.
    fn declare_local(&mut self, ty: TypeId);

    /// `[] -> [value]`.
    fn load_local(&mut self, local: LocalId);

    /// `[value] -> []`.
    fn store_local(&mut self, local: LocalId);

    /// `[obj] -> [value]`.
    fn load_field(&mut self, field: FieldRef);

    /// `[obj, value] -> []`.
    fn store_field(&mut self, field: FieldRef);

    /// `[] -> [value]`.
    fn load_static_field(&mut self, field: FieldRef);

    /// `[value] -> []`.
    fn store_static_field(&mut self, field: FieldRef);

    /// `[recv?, args..] -> [result?]`. Non-virtual dispatch.
    fn call(&mut self, method: MethodRef);

    /// `[recv, args..] -> [result?]`. Dispatch on the receiver's runtime type.
    fn call_virtual(&mut self, method: MethodRef);

    /// `[recv, args..] -> []`. Run an initializer on an existing receiver.
    fn call_constructor(&mut self, ctor: ConstructorRef);

    /// `[args..] -> [obj]`. Allocate and initialize.
    fn new_object(&mut self, ctor: ConstructorRef);

    /// `[lhs, rhs] -> [result]`.
    fn binary(&mut self, op: BinaryOp);

    /// `[value] -> []`.
    fn pop(&mut self);

    /// Allocate a fresh, unplaced label.
    fn define_label(&mut self) -> Label;

    /// Place `label` at the current position.
    fn mark_label(&mut self, label: Label);

    /// Unconditional jump.
    fn branch(&mut self, target: Label);

    /// `[cond] -> []`. Jump when `cond` is false.
    fn branch_if_false(&mut self, target: Label);

    /// `[result?] -> exit`.
    fn ret(&mut self);
}

// ── Recorded instructions ───────────────────────────────────────────

/// One recorded primitive.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Instr {
    LoadArg(u16),
    LoadConst(ConstValue),
    LoadLocal(LocalId),
    StoreLocal(LocalId),
    LoadField(FieldRef),
    StoreField(FieldRef),
    LoadStaticField(FieldRef),
    StoreStaticField(FieldRef),
    Call(MethodRef),
    CallVirtual(MethodRef),
    CallCtor(ConstructorRef),
    NewObj(ConstructorRef),
    Binary(BinaryOp),
    Pop,
    Br(Label),
    BrFalse(Label),
    Ret,
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::LoadArg(n) => write!(f, "ldarg.{n}"),
            Instr::LoadConst(value) => write!(f, "ldc {value}"),
            Instr::LoadLocal(local) => write!(f, "ldloc.{}", local.raw()),
            Instr::StoreLocal(local) => write!(f, "stloc.{}", local.raw()),
            Instr::LoadField(field) => write!(f, "ldfld {field}"),
            Instr::StoreField(field) => write!(f, "stfld {field}"),
            Instr::LoadStaticField(field) => write!(f, "ldsfld {field}"),
            Instr::StoreStaticField(field) => write!(f, "stsfld {field}"),
            Instr::Call(method) => write!(f, "call {method}"),
            Instr::CallVirtual(method) => write!(f, "callvirt {method}"),
            Instr::CallCtor(ctor) => write!(f, "call .ctor {ctor}"),
            Instr::NewObj(ctor) => write!(f, "newobj {ctor}"),
            Instr::Binary(op) => f.write_str(op.mnemonic()),
            Instr::Pop => f.write_str("pop"),
            Instr::Br(label) => write!(f, "br L{}", label.raw()),
            Instr::BrFalse(label) => write!(f, "brfalse L{}", label.raw()),
            Instr::Ret => f.write_str("ret"),
        }
    }
}

/// Records primitives as [`Instr`]s, resolving labels to instruction indices.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstrBuffer {
    instrs: Vec<Instr>,
    /// Instruction index each label was marked at (`None` until marked).
    labels: Vec<Option<usize>>,
    locals: Vec<TypeId>,
}

impl InstrBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn instrs(&self) -> &[Instr] {
        &self.instrs
    }

    #[inline]
    pub fn locals(&self) -> &[TypeId] {
        &self.locals
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    /// Instruction index a label points at, if it was marked.
    #[inline]
    pub fn label_target(&self, label: Label) -> Option<usize> {
        self.labels.get(label.index()).copied().flatten()
    }

    /// Render as a numbered listing, one instruction per line, with label marks.
    pub fn listing(&self) -> String {
        use std::fmt::Write;

        let mut out = String::with_capacity(self.instrs.len() * 16);
        let mark = |out: &mut String, at: usize| {
            for (label, _) in self
                .labels
                .iter()
                .enumerate()
                .filter(|(_, target)| **target == Some(at))
            {
                let _ = writeln!(out, "L{label}:");
            }
        };
        for (i, instr) in self.instrs.iter().enumerate() {
            mark(&mut out, i);
            let _ = writeln!(out, "  {i:04}: {instr}");
        }
        mark(&mut out, self.instrs.len());
        out
    }

    fn push(&mut self, instr: Instr) {
        tracing::trace!(index = self.instrs.len(), %instr, "emit");
        self.instrs.push(instr);
    }
}

impl InstructionStream for InstrBuffer {
    fn load_arg(&mut self, position: u16) {
        self.push(Instr::LoadArg(position));
    }

    fn load_const(&mut self, value: &ConstValue) {
        self.push(Instr::LoadConst(value.clone()));
    }

    fn declare_local(&mut self, ty: TypeId) {
        self.locals.push(ty);
    }

    fn load_local(&mut self, local: LocalId) {
        self.push(Instr::LoadLocal(local));
    }

    fn store_local(&mut self, local: LocalId) {
        self.push(Instr::StoreLocal(local));
    }

    fn load_field(&mut self, field: FieldRef) {
        self.push(Instr::LoadField(field));
    }

    fn store_field(&mut self, field: FieldRef) {
        self.push(Instr::StoreField(field));
    }

    fn load_static_field(&mut self, field: FieldRef) {
        self.push(Instr::LoadStaticField(field));
    }

    fn store_static_field(&mut self, field: FieldRef) {
        self.push(Instr::StoreStaticField(field));
    }

    fn call(&mut self, method: MethodRef) {
        self.push(Instr::Call(method));
    }

    fn call_virtual(&mut self, method: MethodRef) {
        self.push(Instr::CallVirtual(method));
    }

    fn call_constructor(&mut self, ctor: ConstructorRef) {
        self.push(Instr::CallCtor(ctor));
    }

    fn new_object(&mut self, ctor: ConstructorRef) {
        self.push(Instr::NewObj(ctor));
    }

    fn binary(&mut self, op: BinaryOp) {
        self.push(Instr::Binary(op));
    }

    fn pop(&mut self) {
        self.push(Instr::Pop);
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "label counts never exceed u32"
    )]
    fn define_label(&mut self) -> Label {
        let label = Label::new(self.labels.len() as u32);
        self.labels.push(None);
        label
    }

    fn mark_label(&mut self, label: Label) {
        debug_assert!(
            label.index() < self.labels.len(),
            "label L{} was not defined on this stream",
            label.raw()
        );
        if let Some(slot) = self.labels.get_mut(label.index()) {
            *slot = Some(self.instrs.len());
        }
    }

    fn branch(&mut self, target: Label) {
        self.push(Instr::Br(target));
    }

    fn branch_if_false(&mut self, target: Label) {
        self.push(Instr::BrFalse(target));
    }

    fn ret(&mut self) {
        self.push(Instr::Ret);
    }
}
