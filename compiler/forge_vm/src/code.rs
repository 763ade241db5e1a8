//! Committed member bodies, shared between the backend and interpreters.

use std::fmt;
use std::sync::Arc;

use forge_ir::InstrBuffer;
use forge_meta::{AttributeSpec, ConstructorRef, ImplPolicy, MethodRef, TypeId};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

/// Identifies an executable member.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MemberKey {
    Constructor(ConstructorRef),
    Method(MethodRef),
}

impl MemberKey {
    #[inline]
    pub fn declaring_type(self) -> TypeId {
        match self {
            MemberKey::Constructor(c) => c.declaring_type,
            MemberKey::Method(m) => m.declaring_type,
        }
    }
}

impl fmt::Display for MemberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberKey::Constructor(c) => write!(f, ".ctor {c}"),
            MemberKey::Method(m) => write!(f, "method {m}"),
        }
    }
}

/// A committed executable member.
#[derive(Debug)]
pub struct CompiledBody {
    pub policy: ImplPolicy,
    /// Declared parameter count, receiver excluded.
    pub arity: usize,
    pub has_this: bool,
    pub return_type: TypeId,
    /// Tags attached to the member itself.
    pub tags: Vec<AttributeSpec>,
    /// Empty for host-supplied and abstract members.
    pub code: InstrBuffer,
}

/// Read-mostly store of committed bodies.
#[derive(Debug, Default)]
pub struct CodeStore {
    bodies: RwLock<FxHashMap<MemberKey, Arc<CompiledBody>>>,
}

impl CodeStore {
    pub fn get(&self, key: MemberKey) -> Option<Arc<CompiledBody>> {
        self.bodies.read().get(&key).cloned()
    }

    pub(crate) fn publish(&self, bodies: impl IntoIterator<Item = (MemberKey, CompiledBody)>) {
        let mut map = self.bodies.write();
        for (key, body) in bodies {
            map.insert(key, Arc::new(body));
        }
    }

    pub fn len(&self) -> usize {
        self.bodies.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.read().is_empty()
    }
}
