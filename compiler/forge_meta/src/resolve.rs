//! Constructor resolution for initializer chaining.
//!
//! Kept as free functions so the generic-parameter fallback is a visible,
//! separately testable step rather than a branch buried in a lookup chain.

use crate::{BindingFlags, ConstructorInfo, MetadataProvider, TypeId, TypeKind};

/// The type a constructor lookup should actually target.
///
/// Reflection cannot look up members on an unbound generic placeholder, so a
/// placeholder is replaced by the generic definition it stands for. Every
/// other type is returned unchanged, as is a type the provider does not know.
pub fn lookup_target(meta: &dyn MetadataProvider, ty: TypeId) -> TypeId {
    match meta.type_info(ty).map(|info| info.kind.clone()) {
        Some(TypeKind::GenericParameter { definition, .. }) => {
            tracing::trace!(
                placeholder = ty.raw(),
                definition = definition.raw(),
                "substituting generic definition for placeholder"
            );
            definition
        }
        _ => ty,
    }
}

/// Resolve an instance constructor of `base` taking `arity` parameters,
/// visible at any accessibility.
pub fn resolve_constructor(
    meta: &dyn MetadataProvider,
    base: TypeId,
    arity: usize,
) -> Option<ConstructorInfo> {
    let target = lookup_target(meta, base);
    meta.find_constructor(target, BindingFlags::ANY_INSTANCE, arity)
}
