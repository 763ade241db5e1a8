use forge_emit::ModuleEmitter;
use forge_ir::{BinaryOp, Expr};
use forge_meta::{
    ConstValue, MemberAttributes, MetadataRegistry, ParamAttributes, TypeAttributes, TypeId,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::binary;
use crate::{Value, Vm, VmBackend, VmConfig, VmError};

#[test]
fn integer_arithmetic_wraps() {
    assert_eq!(
        binary(BinaryOp::Add, &Value::I32(i32::MAX), &Value::I32(1)),
        Ok(Value::I32(i32::MIN))
    );
    assert_eq!(
        binary(BinaryOp::Mul, &Value::I64(3), &Value::I64(-4)),
        Ok(Value::I64(-12))
    );
    assert_eq!(
        binary(BinaryOp::Rem, &Value::I32(7), &Value::I32(3)),
        Ok(Value::I32(1))
    );
}

proptest! {
    #[test]
    fn i32_arithmetic_matches_wrapping_ops(a: i32, b: i32) {
        prop_assert_eq!(
            binary(BinaryOp::Add, &Value::I32(a), &Value::I32(b)),
            Ok(Value::I32(a.wrapping_add(b)))
        );
        prop_assert_eq!(
            binary(BinaryOp::Sub, &Value::I32(a), &Value::I32(b)),
            Ok(Value::I32(a.wrapping_sub(b)))
        );
        prop_assert_eq!(
            binary(BinaryOp::Lt, &Value::I32(a), &Value::I32(b)),
            Ok(Value::Bool(a < b))
        );
        if b != 0 {
            prop_assert_eq!(
                binary(BinaryOp::Div, &Value::I32(a), &Value::I32(b)),
                Ok(Value::I32(a.wrapping_div(b)))
            );
        }
    }
}

#[test]
fn division_by_zero_fails() {
    assert_eq!(
        binary(BinaryOp::Div, &Value::I32(1), &Value::I32(0)),
        Err(VmError::DivideByZero)
    );
    assert_eq!(
        binary(BinaryOp::Rem, &Value::I64(1), &Value::I64(0)),
        Err(VmError::DivideByZero)
    );
    // Floats follow IEEE semantics instead.
    assert_eq!(
        binary(BinaryOp::Div, &Value::F64(1.0), &Value::F64(0.0)),
        Ok(Value::F64(f64::INFINITY))
    );
}

#[test]
fn comparisons_and_logic_yield_bools() {
    assert_eq!(
        binary(BinaryOp::Lt, &Value::I32(1), &Value::I32(2)),
        Ok(Value::Bool(true))
    );
    assert_eq!(
        binary(BinaryOp::Ge, &Value::from("b"), &Value::from("a")),
        Ok(Value::Bool(true))
    );
    assert_eq!(
        binary(BinaryOp::Eq, &Value::Null, &Value::I32(0)),
        Ok(Value::Bool(false))
    );
    assert_eq!(
        binary(BinaryOp::And, &Value::Bool(true), &Value::Bool(false)),
        Ok(Value::Bool(false))
    );
}

#[test]
fn strings_concatenate() {
    assert_eq!(
        binary(BinaryOp::Add, &Value::from("ab"), &Value::from("cd")),
        Ok(Value::from("abcd"))
    );
}

#[test]
fn mixed_operands_are_rejected() {
    assert_eq!(
        binary(BinaryOp::Add, &Value::I32(1), &Value::I64(1)),
        Err(VmError::TypeMismatch {
            op: "add",
            found: "i32 and i64".to_owned()
        })
    );
    assert_eq!(
        binary(BinaryOp::Or, &Value::I32(1), &Value::I32(1)),
        Err(VmError::TypeMismatch {
            op: "or",
            found: "i32 and i32".to_owned()
        })
    );
}

#[test]
fn abstract_types_cannot_be_instantiated() {
    let mut module = ModuleEmitter::new(
        "interp",
        VmBackend::with_config(MetadataRegistry::shared(), VmConfig::default()),
    );
    let ty = module
        .define_type(
            "Shape",
            TypeAttributes::PUBLIC | TypeAttributes::ABSTRACT,
            TypeId::OBJECT,
        )
        .unwrap_or_else(|e| panic!("define failed: {e}"));
    let id = module
        .commit(ty)
        .unwrap_or_else(|e| panic!("commit failed: {e}"));

    let mut vm = Vm::new(module.backend());
    assert!(matches!(
        vm.instantiate(id, &[]),
        Err(VmError::AbstractType(ty)) if ty == id
    ));
}

#[test]
fn static_fields_start_at_their_constant() {
    let mut module = ModuleEmitter::new(
        "interp",
        VmBackend::with_config(MetadataRegistry::shared(), VmConfig::default()),
    );
    let mut ty = module
        .define_class("Config", TypeId::OBJECT)
        .unwrap_or_else(|e| panic!("define failed: {e}"));
    let limit = ty
        .define_field(
            "Limit",
            TypeId::I32,
            MemberAttributes::PUBLIC | MemberAttributes::STATIC,
        )
        .unwrap_or_else(|e| panic!("field failed: {e}"));
    limit
        .set_constant(ConstValue::I32(64))
        .unwrap_or_else(|e| panic!("constant failed: {e}"));
    let limit = limit.handle();

    let bump = ty
        .define_method(
            "bump",
            MemberAttributes::PUBLIC | MemberAttributes::STATIC,
            TypeId::I32,
        )
        .unwrap_or_else(|e| panic!("method failed: {e}"));
    bump.define_parameter(TypeId::I32, ParamAttributes::empty(), "by")
        .unwrap_or_else(|e| panic!("param failed: {e}"));
    let sum = Expr::binary(
        BinaryOp::Add,
        Expr::field(None, limit, TypeId::I32),
        Expr::param(1, TypeId::I32),
    );
    bump.append(Expr::store_field(None, limit, sum))
        .unwrap_or_else(|e| panic!("append failed: {e}"));
    bump.append(Expr::ret(Some(Expr::field(None, limit, TypeId::I32))))
        .unwrap_or_else(|e| panic!("append failed: {e}"));
    let bump = bump.handle();
    module
        .commit(ty)
        .unwrap_or_else(|e| panic!("commit failed: {e}"));

    let mut vm = Vm::new(module.backend());
    assert_eq!(vm.static_value(limit), Ok(Value::I32(64)));
    assert_eq!(vm.invoke(None, bump, &[Value::I32(6)]), Ok(Some(Value::I32(70))));
    assert_eq!(vm.invoke(None, bump, &[Value::I32(1)]), Ok(Some(Value::I32(71))));
    assert_eq!(vm.depth(), 0);
}
