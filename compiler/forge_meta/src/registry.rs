//! Metadata provider trait and the shared, thread-safe registry.
//!
//! The emitters only ever see [`MetadataProvider`]. [`MetadataRegistry`] is
//! the implementation shipped with the engine: a read-mostly map guarded by a
//! `parking_lot::RwLock`, so independent build sessions may query it in
//! parallel while a host backend registers freshly committed types.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::{
    BindingFlags, ConstructorInfo, ConstructorRef, FieldInfo, FieldRef, MemberAttributes,
    MethodInfo, MethodRef, TypeAttributes, TypeId, TypeInfo, TypeKind,
};

/// Error when registering a type record.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A record with this id already exists. Registered types are permanent.
    #[error("type {0} is already registered")]
    Duplicate(TypeId),
    /// The id was not produced by this registry.
    #[error("type {0} was never reserved by this registry")]
    NotReserved(TypeId),
}

/// Read-only view of reflective type metadata.
///
/// Implementations must be safe to share across threads; the engine treats
/// them as an external, read-mostly service.
pub trait MetadataProvider: Send + Sync {
    /// Look up a type record.
    fn type_info(&self, ty: TypeId) -> Option<Arc<TypeInfo>>;

    /// Find a constructor declared on `ty` that is visible to `binding` and
    /// takes exactly `arity` parameters.
    ///
    /// When several match, the first in declaration order wins.
    fn find_constructor(
        &self,
        ty: TypeId,
        binding: BindingFlags,
        arity: usize,
    ) -> Option<ConstructorInfo> {
        let info = self.type_info(ty)?;
        info.constructors
            .iter()
            .find(|c| c.attributes.matches(binding) && c.arity() == arity)
            .cloned()
    }

    fn constructor_info(&self, handle: ConstructorRef) -> Option<ConstructorInfo> {
        self.type_info(handle.declaring_type)?
            .constructor(handle)
            .cloned()
    }

    fn method_info(&self, handle: MethodRef) -> Option<MethodInfo> {
        self.type_info(handle.declaring_type)?.method(handle).cloned()
    }

    fn field_info(&self, handle: FieldRef) -> Option<FieldInfo> {
        self.type_info(handle.declaring_type)?.field(handle).cloned()
    }
}

/// Thread-safe registry of type records.
pub struct MetadataRegistry {
    types: RwLock<FxHashMap<TypeId, Arc<TypeInfo>>>,
    next_id: AtomicU32,
}

/// A registry shared between emitters, backends, and unrelated callers.
pub type SharedRegistry = Arc<MetadataRegistry>;

impl Default for MetadataRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataRegistry {
    /// Create a registry holding the builtin types.
    ///
    /// `object` carries one public parameterless constructor so that every
    /// class can chain to it.
    pub fn new() -> Self {
        let registry = Self {
            types: RwLock::new(FxHashMap::default()),
            next_id: AtomicU32::new(TypeId::FIRST_DYNAMIC),
        };
        registry.register_builtins();
        registry
    }

    /// Create a registry wrapped for sharing.
    pub fn shared() -> SharedRegistry {
        Arc::new(Self::new())
    }

    fn register_builtins(&self) {
        let mut map = self.types.write();
        for raw in 0..TypeId::FIRST_DYNAMIC {
            let id = TypeId::from_raw(raw);
            let Some(name) = id.builtin_name() else {
                continue;
            };
            let base = if id == TypeId::OBJECT || id.is_void() {
                None
            } else {
                Some(TypeId::OBJECT)
            };
            let mut info = TypeInfo::new(name, TypeKind::Builtin, base);
            if id == TypeId::OBJECT {
                info = info.with_constructor(MemberAttributes::PUBLIC, Vec::new());
            }
            info.attributes = TypeAttributes::PUBLIC;
            info.assign_id(id);
            map.insert(id, Arc::new(info));
        }
    }

    /// Reserve a fresh id without registering a record yet.
    ///
    /// Used by backends that hand out an id when a type is defined and only
    /// publish its record on commit.
    pub fn reserve(&self) -> TypeId {
        TypeId::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Register `info` under a fresh id and return that id.
    pub fn register(&self, mut info: TypeInfo) -> TypeId {
        let id = self.reserve();
        info.assign_id(id);
        tracing::trace!(ty = id.raw(), name = %info.name, "registered type");
        self.types.write().insert(id, Arc::new(info));
        id
    }

    /// Publish a record under an id previously obtained from [`reserve`](Self::reserve).
    pub fn insert(&self, mut info: TypeInfo, id: TypeId) -> Result<Arc<TypeInfo>, RegistryError> {
        if id.is_builtin() || id.raw() >= self.next_id.load(Ordering::Relaxed) {
            return Err(RegistryError::NotReserved(id));
        }
        let mut map = self.types.write();
        if map.contains_key(&id) {
            return Err(RegistryError::Duplicate(id));
        }
        info.assign_id(id);
        let info = Arc::new(info);
        map.insert(id, Arc::clone(&info));
        tracing::trace!(ty = id.raw(), name = %info.name, "published type");
        Ok(info)
    }

    /// Whether a record exists for `ty`.
    pub fn contains(&self, ty: TypeId) -> bool {
        self.types.read().contains_key(&ty)
    }

    /// Number of registered records, builtins included.
    pub fn len(&self) -> usize {
        self.types.read().len()
    }

    /// Always false; builtins are registered on creation.
    pub fn is_empty(&self) -> bool {
        self.types.read().is_empty()
    }

    /// Find a type by name. Linear scan; intended for tests and tooling.
    pub fn find_by_name(&self, name: &str) -> Option<Arc<TypeInfo>> {
        self.types
            .read()
            .values()
            .find(|info| info.name == name)
            .cloned()
    }
}

impl MetadataProvider for MetadataRegistry {
    fn type_info(&self, ty: TypeId) -> Option<Arc<TypeInfo>> {
        self.types.read().get(&ty).cloned()
    }
}

impl<T: MetadataProvider + ?Sized> MetadataProvider for Arc<T> {
    fn type_info(&self, ty: TypeId) -> Option<Arc<TypeInfo>> {
        (**self).type_info(ty)
    }

    fn find_constructor(
        &self,
        ty: TypeId,
        binding: BindingFlags,
        arity: usize,
    ) -> Option<ConstructorInfo> {
        (**self).find_constructor(ty, binding, arity)
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
