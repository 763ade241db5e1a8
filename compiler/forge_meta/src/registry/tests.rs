use std::sync::Arc;
use std::thread;

use pretty_assertions::assert_eq;

use super::*;
use crate::{ParameterInfo, TypeKind};

#[test]
fn builtins_are_registered() {
    let meta = MetadataRegistry::new();
    assert!(meta.contains(TypeId::OBJECT));
    assert!(meta.contains(TypeId::STRING));
    assert!(!meta.is_empty());

    let object = meta.type_info(TypeId::OBJECT);
    assert_eq!(object.map(|o| o.constructors.len()), Some(1));
}

#[test]
fn register_fixes_up_member_handles() {
    let meta = MetadataRegistry::new();
    let id = meta.register(
        TypeInfo::class("Point", TypeId::OBJECT)
            .with_constructor(MemberAttributes::PUBLIC, Vec::new())
            .with_field("x", TypeId::I32, MemberAttributes::PUBLIC)
            .with_method("len", MemberAttributes::PUBLIC, TypeId::I32, Vec::new()),
    );
    assert!(!id.is_builtin());

    let info = meta.type_info(id).unwrap();
    assert_eq!(info.constructors[0].handle, ConstructorRef::new(id, 0));
    assert_eq!(info.fields[0].handle, FieldRef::new(id, 0));
    assert_eq!(info.methods[0].handle, MethodRef::new(id, 0));
    assert_eq!(
        meta.method_info(MethodRef::new(id, 0)).map(|m| m.name),
        Some("len".to_string())
    );
}

#[test]
fn insert_requires_reserved_id() {
    let meta = MetadataRegistry::new();
    let reserved = meta.reserve();
    let info = TypeInfo::class("Late", TypeId::OBJECT);

    assert_eq!(
        meta.insert(info.clone(), TypeId::from_raw(reserved.raw() + 10)),
        Err(RegistryError::NotReserved(TypeId::from_raw(reserved.raw() + 10)))
    );
    assert!(meta.insert(info.clone(), reserved).is_ok());
    assert_eq!(
        meta.insert(info, reserved),
        Err(RegistryError::Duplicate(reserved))
    );
}

#[test]
fn builtin_ids_cannot_be_overwritten() {
    let meta = MetadataRegistry::new();
    let info = TypeInfo::class("Fake", TypeId::OBJECT);
    assert_eq!(
        meta.insert(info, TypeId::OBJECT),
        Err(RegistryError::NotReserved(TypeId::OBJECT))
    );
}

#[test]
fn find_constructor_honours_binding() {
    let meta = MetadataRegistry::new();
    let id = meta.register(
        TypeInfo::class("Guarded", TypeId::OBJECT)
            .with_constructor(MemberAttributes::PRIVATE, Vec::new())
            .with_constructor(
                MemberAttributes::PUBLIC,
                vec![ParameterInfo::new(1, "seed", TypeId::I64)],
            ),
    );

    let public_only = BindingFlags::INSTANCE | BindingFlags::PUBLIC;
    assert!(meta.find_constructor(id, public_only, 0).is_none());
    assert!(meta.find_constructor(id, public_only, 1).is_some());
    assert_eq!(
        meta.find_constructor(id, BindingFlags::ANY_INSTANCE, 0)
            .map(|c| c.handle.index),
        Some(0)
    );
}

#[test]
fn concurrent_readers_and_writer() {
    let meta = Arc::new(MetadataRegistry::new());
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let meta = Arc::clone(&meta);
            thread::spawn(move || {
                for _ in 0..100 {
                    assert!(meta
                        .find_constructor(TypeId::OBJECT, BindingFlags::ANY_INSTANCE, 0)
                        .is_some());
                }
            })
        })
        .collect();

    for i in 0..20 {
        meta.register(TypeInfo::new(format!("T{i}"), TypeKind::Class, Some(TypeId::OBJECT)));
    }
    for reader in readers {
        reader.join().unwrap();
    }
    assert!(meta.find_by_name("T19").is_some());
}
