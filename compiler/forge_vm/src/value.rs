//! Runtime values.

use std::fmt;
use std::sync::Arc;

use forge_meta::{ConstValue, FieldRef, TypeId};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

/// A value on the interpreter stack, in a local, or in a field.
///
/// Objects are shared by reference; cloning a `Value::Object` aliases it.
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F64(f64),
    Str(Arc<str>),
    Object(ObjectRef),
}

impl Value {
    /// Short kind name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::F64(_) => "f64",
            Value::Str(_) => "string",
            Value::Object(_) => "object",
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Zero value stored in a fresh slot of type `ty`.
    pub fn zero(ty: TypeId) -> Self {
        ConstValue::default_for(ty).map_or(Value::Null, |c| Value::from(&c))
    }
}

impl From<&ConstValue> for Value {
    fn from(value: &ConstValue) -> Self {
        match value {
            ConstValue::Null => Value::Null,
            ConstValue::Bool(b) => Value::Bool(*b),
            ConstValue::I32(n) => Value::I32(*n),
            ConstValue::I64(n) => Value::I64(*n),
            ConstValue::F64(bits) => Value::F64(f64::from_bits(*bits)),
            ConstValue::Str(s) => Value::Str(Arc::from(&**s)),
        }
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::I32(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }
}

/// Equality as the `eq` instruction sees it: objects by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::F64(a), Value::F64(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.same(b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::I32(n) => write!(f, "{n}"),
            Value::I64(n) => write!(f, "{n}"),
            Value::F64(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Object(obj) => write!(f, "<{} instance>", obj.ty()),
        }
    }
}

/// Heap object: its runtime type and field storage.
#[derive(Debug)]
struct Object {
    ty: TypeId,
    fields: RwLock<FxHashMap<FieldRef, Value>>,
}

/// Shared handle to a heap object.
#[derive(Clone, Debug)]
pub struct ObjectRef(Arc<Object>);

impl ObjectRef {
    pub(crate) fn new(ty: TypeId, fields: FxHashMap<FieldRef, Value>) -> Self {
        ObjectRef(Arc::new(Object {
            ty,
            fields: RwLock::new(fields),
        }))
    }

    #[inline]
    pub fn ty(&self) -> TypeId {
        self.0.ty
    }

    pub fn field(&self, field: FieldRef) -> Option<Value> {
        self.0.fields.read().get(&field).cloned()
    }

    pub(crate) fn set_field(&self, field: FieldRef, value: Value) {
        self.0.fields.write().insert(field, value);
    }

    /// Identity comparison.
    #[inline]
    pub fn same(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
