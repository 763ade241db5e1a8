//! Stack-machine interpreter over committed bodies.
//!
//! Each call runs its body against a fresh operand stack and local slots.
//! Argument slot 0 holds the receiver (`null` for static members) and slots
//! `1..=arity` hold the parameters, matching the positions the emitters use.
//!
//! Constructors of builtin types run nothing. Members bound with
//! [`Vm::bind_native`] take precedence over committed instructions.

use std::sync::Arc;

use forge_ir::{ensure_sufficient_stack, BinaryOp, Instr};
use forge_meta::{
    BindingFlags, ConstructorRef, FieldRef, MetadataProvider, MethodInfo, MethodRef,
    SharedRegistry, TypeAttributes, TypeId, TypeInfo,
};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::code::{CodeStore, CompiledBody, MemberKey};
use crate::value::{ObjectRef, Value};
use crate::{VmBackend, VmConfig, VmError};

/// Receiver slot plus arguments.
type Args = SmallVec<[Value; 8]>;

/// A host-supplied member body. `args[0]` is the receiver.
pub type NativeFn = Arc<dyn Fn(&[Value]) -> Result<Option<Value>, VmError> + Send + Sync>;

/// Executes members of types committed through a [`VmBackend`].
pub struct Vm {
    registry: SharedRegistry,
    code: Arc<CodeStore>,
    config: VmConfig,
    statics: FxHashMap<FieldRef, Value>,
    natives: FxHashMap<MemberKey, NativeFn>,
    /// Active calls, innermost last.
    frames: Vec<MemberKey>,
}

impl Vm {
    /// An interpreter sharing `backend`'s registry, code, and configuration.
    pub fn new(backend: &VmBackend) -> Self {
        Self::with_parts(
            Arc::clone(backend.registry()),
            Arc::clone(backend.code()),
            backend.config().clone(),
        )
    }

    pub fn with_parts(registry: SharedRegistry, code: Arc<CodeStore>, config: VmConfig) -> Self {
        Self {
            registry,
            code,
            config,
            statics: FxHashMap::default(),
            natives: FxHashMap::default(),
            frames: Vec::new(),
        }
    }

    /// Supply the body of a host-implemented member.
    pub fn bind_native(
        &mut self,
        member: MemberKey,
        body: impl Fn(&[Value]) -> Result<Option<Value>, VmError> + Send + Sync + 'static,
    ) {
        tracing::debug!(member = %member, "bound native body");
        self.natives.insert(member, Arc::new(body));
    }

    /// Number of calls currently executing.
    #[inline]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    // ── Objects ─────────────────────────────────────────────────────

    /// Create an instance through the public constructor taking `args.len()`
    /// parameters.
    pub fn instantiate(&mut self, ty: TypeId, args: &[Value]) -> Result<ObjectRef, VmError> {
        let ctor = self
            .registry
            .find_constructor(ty, BindingFlags::INSTANCE | BindingFlags::PUBLIC, args.len())
            .ok_or_else(|| {
                VmError::UnknownMember(format!(
                    "public constructor of {ty} taking {} parameters",
                    args.len()
                ))
            })?;
        self.construct(ctor.handle, args)
    }

    /// Allocate an instance of `ctor`'s type and run `ctor` on it.
    pub fn construct(
        &mut self,
        ctor: ConstructorRef,
        args: &[Value],
    ) -> Result<ObjectRef, VmError> {
        let obj = self.allocate(ctor.declaring_type)?;
        let mut call_args = Args::with_capacity(args.len() + 1);
        call_args.push(Value::Object(obj.clone()));
        call_args.extend(args.iter().cloned());
        self.call(MemberKey::Constructor(ctor), call_args)?;
        Ok(obj)
    }

    /// A zero-initialized instance with no constructor run. Instance fields
    /// of the type and all its bases start at their constant or zero value.
    fn allocate(&self, ty: TypeId) -> Result<ObjectRef, VmError> {
        let info = self
            .registry
            .type_info(ty)
            .ok_or(VmError::UnknownType(ty))?;
        if info
            .attributes
            .intersects(TypeAttributes::INTERFACE | TypeAttributes::ABSTRACT)
        {
            return Err(VmError::AbstractType(ty));
        }
        let mut fields = FxHashMap::default();
        for level in self.ancestry(ty) {
            for field in level.fields.iter().filter(|f| !f.attributes.is_static()) {
                let value = field
                    .constant
                    .as_ref()
                    .map_or_else(|| Value::zero(field.ty), Value::from);
                fields.insert(field.handle, value);
            }
        }
        Ok(ObjectRef::new(ty, fields))
    }

    /// `ty` followed by each of its bases.
    fn ancestry(&self, ty: TypeId) -> impl Iterator<Item = Arc<TypeInfo>> + '_ {
        std::iter::successors(self.registry.type_info(ty), move |info| {
            info.base.and_then(|base| self.registry.type_info(base))
        })
    }

    /// Read a field by name, searching the object's type and its bases.
    pub fn field_value(&mut self, obj: &ObjectRef, name: &str) -> Result<Value, VmError> {
        let field = self
            .ancestry(obj.ty())
            .find_map(|info| info.field_named(name).cloned())
            .ok_or_else(|| VmError::UnknownMember(format!("{}::{name}", obj.ty())))?;
        if field.attributes.is_static() {
            return self.static_value(field.handle);
        }
        obj.field(field.handle)
            .ok_or_else(|| VmError::UnknownMember(field.handle.to_string()))
    }

    /// Current value of a static field.
    pub fn static_value(&mut self, field: FieldRef) -> Result<Value, VmError> {
        if let Some(value) = self.statics.get(&field) {
            return Ok(value.clone());
        }
        let info = self
            .registry
            .field_info(field)
            .ok_or_else(|| VmError::UnknownMember(field.to_string()))?;
        let value = info
            .constant
            .as_ref()
            .map_or_else(|| Value::zero(info.ty), Value::from);
        self.statics.insert(field, value.clone());
        Ok(value)
    }

    // ── Properties ──────────────────────────────────────────────────

    pub fn get_property(&mut self, obj: &ObjectRef, name: &str) -> Result<Value, VmError> {
        let getter = self
            .ancestry(obj.ty())
            .find_map(|info| info.property_named(name).and_then(|p| p.getter))
            .ok_or_else(|| VmError::UnknownMember(format!("getter of {}::{name}", obj.ty())))?;
        self.invoke(Some(obj), getter, &[])?
            .ok_or_else(|| VmError::NoBody(format!("getter of {}::{name}", obj.ty())))
    }

    pub fn set_property(
        &mut self,
        obj: &ObjectRef,
        name: &str,
        value: Value,
    ) -> Result<(), VmError> {
        let setter = self
            .ancestry(obj.ty())
            .find_map(|info| info.property_named(name).and_then(|p| p.setter))
            .ok_or_else(|| VmError::UnknownMember(format!("setter of {}::{name}", obj.ty())))?;
        self.invoke(Some(obj), setter, &[value])?;
        Ok(())
    }

    // ── Calls ───────────────────────────────────────────────────────

    /// Invoke `method`. Instance methods dispatch on the receiver's runtime
    /// type; static methods take no receiver.
    pub fn invoke(
        &mut self,
        receiver: Option<&ObjectRef>,
        method: MethodRef,
        args: &[Value],
    ) -> Result<Option<Value>, VmError> {
        let info = self
            .registry
            .method_info(method)
            .ok_or_else(|| VmError::UnknownMember(method.to_string()))?;
        let (target, slot0) = if info.is_static() {
            (method, Value::Null)
        } else {
            let obj = receiver.ok_or_else(|| VmError::NullReference(info.name.clone()))?;
            (self.resolve_virtual(obj.ty(), &info), Value::Object(obj.clone()))
        };
        let mut call_args = Args::with_capacity(args.len() + 1);
        call_args.push(slot0);
        call_args.extend(args.iter().cloned());
        self.call(MemberKey::Method(target), call_args)
    }

    /// Invoke the instance method `name` taking `args.len()` parameters,
    /// found on the receiver's type or its nearest base.
    pub fn invoke_named(
        &mut self,
        receiver: &ObjectRef,
        name: &str,
        args: &[Value],
    ) -> Result<Option<Value>, VmError> {
        let method = self
            .ancestry(receiver.ty())
            .find_map(|info| {
                info.methods
                    .iter()
                    .find(|m| m.name == name && m.arity() == args.len())
                    .map(|m| m.handle)
            })
            .ok_or_else(|| VmError::UnknownMember(format!("{}::{name}", receiver.ty())))?;
        self.invoke(Some(receiver), method, args)
    }

    /// The most derived concrete override of `declared` visible from `runtime`.
    /// Non-virtual methods always run as declared.
    fn resolve_virtual(&self, runtime: TypeId, declared: &MethodInfo) -> MethodRef {
        if !declared.attributes.is_overridable() {
            return declared.handle;
        }
        self.ancestry(runtime)
            .find_map(|info| {
                info.methods
                    .iter()
                    .find(|m| {
                        m.name == declared.name
                            && m.arity() == declared.arity()
                            && !m.is_static()
                            && !m.attributes.is_abstract()
                    })
                    .map(|m| m.handle)
            })
            .unwrap_or(declared.handle)
    }

    fn call(&mut self, member: MemberKey, args: Args) -> Result<Option<Value>, VmError> {
        if self.frames.len() >= self.config.max_call_depth {
            return Err(VmError::CallDepthExceeded(self.config.max_call_depth));
        }

        if let Some(native) = self.natives.get(&member).cloned() {
            self.frames.push(member);
            let result = native(&args[..]);
            self.frames.pop();
            return result;
        }

        if matches!(member, MemberKey::Constructor(_)) && member.declaring_type().is_builtin() {
            return Ok(None);
        }

        let body = self
            .code
            .get(member)
            .ok_or_else(|| VmError::UnknownMember(member.to_string()))?;
        if body.code.is_empty() {
            return Err(VmError::NoBody(member.to_string()));
        }
        if args.len() != body.arity + 1 {
            return Err(VmError::ArityMismatch {
                member: member.to_string(),
                expected: body.arity,
                found: args.len() - 1,
            });
        }

        tracing::trace!(member = %member, depth = self.frames.len(), "enter");
        self.frames.push(member);
        let result = ensure_sufficient_stack(|| self.run(member, &body, &args));
        self.frames.pop();
        result
    }

    fn run(
        &mut self,
        member: MemberKey,
        body: &CompiledBody,
        args: &[Value],
    ) -> Result<Option<Value>, VmError> {
        let invalid = |reason: &str| VmError::InvalidCode {
            member: member.to_string(),
            reason: reason.to_owned(),
        };
        let instrs = body.code.instrs();
        let mut locals: SmallVec<[Value; 8]> =
            body.code.locals().iter().map(|ty| Value::zero(*ty)).collect();
        let mut stack: Vec<Value> = Vec::new();
        let mut pc = 0;

        loop {
            let instr = instrs
                .get(pc)
                .ok_or_else(|| invalid("control ran past the last instruction"))?;
            pc += 1;
            match instr {
                Instr::LoadArg(position) => {
                    let value = args
                        .get(usize::from(*position))
                        .cloned()
                        .ok_or_else(|| invalid("argument out of range"))?;
                    stack.push(value);
                }
                Instr::LoadConst(value) => stack.push(Value::from(value)),
                Instr::LoadLocal(local) => {
                    let value = locals
                        .get(local.index())
                        .cloned()
                        .ok_or_else(|| invalid("undeclared local"))?;
                    stack.push(value);
                }
                Instr::StoreLocal(local) => {
                    let value = pop(&mut stack, member)?;
                    let slot = locals
                        .get_mut(local.index())
                        .ok_or_else(|| invalid("undeclared local"))?;
                    *slot = value;
                }
                Instr::LoadField(field) => {
                    let obj = pop_object(&mut stack, member, "ldfld")?;
                    let value = obj
                        .field(*field)
                        .ok_or_else(|| VmError::UnknownMember(field.to_string()))?;
                    stack.push(value);
                }
                Instr::StoreField(field) => {
                    let value = pop(&mut stack, member)?;
                    let obj = pop_object(&mut stack, member, "stfld")?;
                    obj.set_field(*field, value);
                }
                Instr::LoadStaticField(field) => {
                    let value = self.static_value(*field)?;
                    stack.push(value);
                }
                Instr::StoreStaticField(field) => {
                    let value = pop(&mut stack, member)?;
                    self.statics.insert(*field, value);
                }
                Instr::Call(method) => self.call_method(member, *method, false, &mut stack)?,
                Instr::CallVirtual(method) => {
                    self.call_method(member, *method, true, &mut stack)?;
                }
                Instr::CallCtor(ctor) => {
                    let mut call_args = self.pop_ctor_args(member, *ctor, &mut stack)?;
                    let receiver = pop_object(&mut stack, member, "callctor")?;
                    call_args[0] = Value::Object(receiver);
                    self.call(MemberKey::Constructor(*ctor), call_args)?;
                }
                Instr::NewObj(ctor) => {
                    let mut call_args = self.pop_ctor_args(member, *ctor, &mut stack)?;
                    let obj = self.allocate(ctor.declaring_type)?;
                    call_args[0] = Value::Object(obj.clone());
                    self.call(MemberKey::Constructor(*ctor), call_args)?;
                    stack.push(Value::Object(obj));
                }
                Instr::Binary(op) => {
                    let rhs = pop(&mut stack, member)?;
                    let lhs = pop(&mut stack, member)?;
                    stack.push(binary(*op, &lhs, &rhs)?);
                }
                Instr::Pop => {
                    pop(&mut stack, member)?;
                }
                Instr::Br(label) => {
                    pc = body
                        .code
                        .label_target(*label)
                        .ok_or_else(|| invalid("unmarked label"))?;
                }
                Instr::BrFalse(label) => match pop(&mut stack, member)? {
                    Value::Bool(true) => {}
                    Value::Bool(false) => {
                        pc = body
                            .code
                            .label_target(*label)
                            .ok_or_else(|| invalid("unmarked label"))?;
                    }
                    other => {
                        return Err(VmError::TypeMismatch {
                            op: "brfalse",
                            found: other.kind().to_owned(),
                        })
                    }
                },
                Instr::Ret => {
                    if body.return_type.is_void() {
                        return Ok(None);
                    }
                    return pop(&mut stack, member).map(Some);
                }
            }
        }
    }

    fn call_method(
        &mut self,
        caller: MemberKey,
        method: MethodRef,
        virtual_dispatch: bool,
        stack: &mut Vec<Value>,
    ) -> Result<(), VmError> {
        let info = self
            .registry
            .method_info(method)
            .ok_or_else(|| VmError::UnknownMember(method.to_string()))?;
        let mut args = pop_args(stack, caller, info.arity())?;
        let mut target = method;
        if !info.is_static() {
            let receiver = pop_object(stack, caller, "call")?;
            if virtual_dispatch {
                target = self.resolve_virtual(receiver.ty(), &info);
            }
            args[0] = Value::Object(receiver);
        }
        if let Some(result) = self.call(MemberKey::Method(target), args)? {
            stack.push(result);
        }
        Ok(())
    }

    fn pop_ctor_args(
        &self,
        caller: MemberKey,
        ctor: ConstructorRef,
        stack: &mut Vec<Value>,
    ) -> Result<Args, VmError> {
        let arity = self
            .registry
            .constructor_info(ctor)
            .ok_or_else(|| VmError::UnknownMember(ctor.to_string()))?
            .arity();
        pop_args(stack, caller, arity)
    }
}

// ── Operand helpers ─────────────────────────────────────────────────

fn underflow(member: MemberKey) -> VmError {
    VmError::InvalidCode {
        member: member.to_string(),
        reason: "operand stack underflow".to_owned(),
    }
}

fn pop(stack: &mut Vec<Value>, member: MemberKey) -> Result<Value, VmError> {
    stack.pop().ok_or_else(|| underflow(member))
}

fn pop_object(
    stack: &mut Vec<Value>,
    member: MemberKey,
    op: &'static str,
) -> Result<ObjectRef, VmError> {
    match pop(stack, member)? {
        Value::Object(obj) => Ok(obj),
        Value::Null => Err(VmError::NullReference(format!("{op} in {member}"))),
        other => Err(VmError::TypeMismatch {
            op,
            found: other.kind().to_owned(),
        }),
    }
}

/// Pop `arity` arguments, keeping their order, behind an empty receiver slot.
fn pop_args(stack: &mut Vec<Value>, member: MemberKey, arity: usize) -> Result<Args, VmError> {
    let split = stack
        .len()
        .checked_sub(arity)
        .ok_or_else(|| underflow(member))?;
    let mut args = Args::with_capacity(arity + 1);
    args.push(Value::Null);
    args.extend(stack.drain(split..));
    Ok(args)
}

// ── Operators ───────────────────────────────────────────────────────

fn compare<T: PartialOrd>(op: BinaryOp, a: T, b: T) -> Option<Value> {
    let result = match op {
        BinaryOp::Lt => a < b,
        BinaryOp::Le => a <= b,
        BinaryOp::Gt => a > b,
        BinaryOp::Ge => a >= b,
        _ => return None,
    };
    Some(Value::Bool(result))
}

/// Integer arithmetic wraps; division and remainder by zero fail.
macro_rules! int_binary {
    ($variant:ident, $op:expr, $a:expr, $b:expr) => {{
        let (a, b) = ($a, $b);
        match $op {
            BinaryOp::Add => Some(Value::$variant(a.wrapping_add(b))),
            BinaryOp::Sub => Some(Value::$variant(a.wrapping_sub(b))),
            BinaryOp::Mul => Some(Value::$variant(a.wrapping_mul(b))),
            BinaryOp::Div | BinaryOp::Rem if b == 0 => return Err(VmError::DivideByZero),
            BinaryOp::Div => Some(Value::$variant(a.wrapping_div(b))),
            BinaryOp::Rem => Some(Value::$variant(a.wrapping_rem(b))),
            other => compare(other, a, b),
        }
    }};
}

fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, VmError> {
    match op {
        BinaryOp::Eq => return Ok(Value::Bool(lhs == rhs)),
        BinaryOp::Ne => return Ok(Value::Bool(lhs != rhs)),
        _ => {}
    }
    let result = match (lhs, rhs) {
        (Value::Bool(a), Value::Bool(b)) => match op {
            BinaryOp::And => Some(Value::Bool(*a && *b)),
            BinaryOp::Or => Some(Value::Bool(*a || *b)),
            _ => None,
        },
        (Value::I32(a), Value::I32(b)) => int_binary!(I32, op, *a, *b),
        (Value::I64(a), Value::I64(b)) => int_binary!(I64, op, *a, *b),
        (Value::F64(a), Value::F64(b)) => match op {
            BinaryOp::Add => Some(Value::F64(a + b)),
            BinaryOp::Sub => Some(Value::F64(a - b)),
            BinaryOp::Mul => Some(Value::F64(a * b)),
            BinaryOp::Div => Some(Value::F64(a / b)),
            BinaryOp::Rem => Some(Value::F64(a % b)),
            other => compare(other, a, b),
        },
        (Value::Str(a), Value::Str(b)) => match op {
            BinaryOp::Add => Some(Value::Str(Arc::from(format!("{a}{b}")))),
            other => compare(other, a, b),
        },
        _ => None,
    };
    result.ok_or_else(|| VmError::TypeMismatch {
        op: op.mnemonic(),
        found: format!("{} and {}", lhs.kind(), rhs.kind()),
    })
}

#[cfg(test)]
mod tests;
