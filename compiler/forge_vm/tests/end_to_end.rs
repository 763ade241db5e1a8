//! End-to-end tests: types built with the emitters, committed through
//! `VmBackend`, and executed on `Vm`.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use forge_emit::{BackendError, EmitError, ModuleEmitter, TargetBackend};
use forge_ir::{BinaryOp, Expr};
use forge_meta::{
    ConstValue, ConstructorRef, FieldRef, ImplPolicy, MemberAttributes, MetadataProvider,
    MetadataRegistry, MethodRef, ParamAttributes, TypeId,
};
use forge_vm::{MemberKey, Value, Vm, VmBackend, VmConfig, VmError};
use pretty_assertions::assert_eq;

fn module_with(config: VmConfig) -> ModuleEmitter<VmBackend> {
    forge_vm::init_tracing();
    ModuleEmitter::new(
        "e2e",
        VmBackend::with_config(MetadataRegistry::shared(), config),
    )
}

fn module() -> ModuleEmitter<VmBackend> {
    module_with(VmConfig::default())
}

const VIRTUAL: MemberAttributes = MemberAttributes::PUBLIC.union(MemberAttributes::VIRTUAL);

struct Point {
    ty: TypeId,
    ctor: ConstructorRef,
    sum: MethodRef,
}

/// `class Point { int x; int y; Point(int x, int y); virtual int sum(); string Label { get; set; } }`
fn define_point(module: &mut ModuleEmitter<VmBackend>) -> Point {
    let mut ty = module.define_class("Point", TypeId::OBJECT).unwrap();
    let x = ty
        .define_field("x", TypeId::I32, MemberAttributes::PRIVATE)
        .unwrap()
        .handle();
    let y = ty
        .define_field("y", TypeId::I32, MemberAttributes::PRIVATE)
        .unwrap()
        .handle();

    let ctor = ty.define_constructor(MemberAttributes::PUBLIC).unwrap();
    ctor.define_parameter(TypeId::I32, ParamAttributes::empty(), "x")
        .unwrap();
    ctor.define_parameter(TypeId::I32, ParamAttributes::empty(), "y")
        .unwrap();
    ctor.invoke_base_constructor().unwrap();
    for (position, field) in [(1, x), (2, y)] {
        let value = ctor.param(position).unwrap();
        ctor.append(Expr::store_field(Some(ctor.this()), field, value))
            .unwrap();
    }
    let ctor = ctor.handle();

    let sum = ty.define_method("sum", VIRTUAL, TypeId::I32).unwrap();
    let total = Expr::binary(
        BinaryOp::Add,
        Expr::field(sum.this(), x, TypeId::I32),
        Expr::field(sum.this(), y, TypeId::I32),
    );
    sum.append(Expr::ret(Some(total))).unwrap();
    let sum = sum.handle();

    ty.define_auto_property("Label", TypeId::STRING, MemberAttributes::PUBLIC)
        .unwrap();

    let ty = module.commit(ty).unwrap();
    Point { ty, ctor, sum }
}

#[test]
fn emitted_class_runs() {
    let mut module = module();
    let point = define_point(&mut module);
    let mut vm = Vm::new(module.backend());

    let obj = vm
        .instantiate(point.ty, &[Value::I32(3), Value::I32(4)])
        .unwrap();
    assert_eq!(obj.ty(), point.ty);
    assert_eq!(vm.field_value(&obj, "x").unwrap(), Value::I32(3));
    assert_eq!(vm.invoke_named(&obj, "sum", &[]).unwrap(), Some(Value::I32(7)));

    assert_eq!(vm.get_property(&obj, "Label").unwrap(), Value::Null);
    vm.set_property(&obj, "Label", Value::from("origin"))
        .unwrap();
    assert_eq!(
        vm.get_property(&obj, "Label").unwrap(),
        Value::from("origin")
    );
}

#[test]
fn class_without_constructors_is_instantiable() {
    let mut module = module();
    let ty = module.define_class("Empty", TypeId::OBJECT).unwrap();
    let id = module.commit(ty).unwrap();

    let mut vm = Vm::new(module.backend());
    let obj = vm.instantiate(id, &[]).unwrap();
    assert_eq!(obj.ty(), id);
}

#[test]
fn derived_constructor_forwards_to_base_and_overrides_dispatch() {
    let mut module = module();
    let point = define_point(&mut module);

    let mut ty = module.define_class("Point3", point.ty).unwrap();
    let z = ty
        .define_field("z", TypeId::I32, MemberAttributes::PRIVATE)
        .unwrap()
        .handle();
    let ctor = ty.define_constructor(MemberAttributes::PUBLIC).unwrap();
    for name in ["x", "y", "z"] {
        ctor.define_parameter(TypeId::I32, ParamAttributes::empty(), name)
            .unwrap();
    }
    let forwarded = vec![ctor.param(1).unwrap(), ctor.param(2).unwrap()];
    ctor.invoke_constructor(point.ctor, forwarded).unwrap();
    let value = ctor.param(3).unwrap();
    ctor.append(Expr::store_field(Some(ctor.this()), z, value))
        .unwrap();

    let sum = ty.define_method("sum", VIRTUAL, TypeId::I32).unwrap();
    let base_sum = Expr::call(sum.this(), point.sum, TypeId::I32, Vec::new());
    let total = Expr::binary(
        BinaryOp::Add,
        base_sum,
        Expr::field(sum.this(), z, TypeId::I32),
    );
    sum.append(Expr::ret(Some(total))).unwrap();
    let point3 = module.commit(ty).unwrap();

    let mut vm = Vm::new(module.backend());
    let obj = vm
        .instantiate(point3, &[Value::I32(1), Value::I32(2), Value::I32(3)])
        .unwrap();
    assert_eq!(vm.field_value(&obj, "x").unwrap(), Value::I32(1));
    assert_eq!(vm.field_value(&obj, "z").unwrap(), Value::I32(3));
    // Invoking the base method dispatches to the override.
    assert_eq!(vm.invoke(Some(&obj), point.sum, &[]).unwrap(), Some(Value::I32(6)));
}

#[test]
fn non_virtual_methods_are_not_overridden() {
    let mut module = module();
    let mut base = module.define_class("Plain", TypeId::OBJECT).unwrap();
    let code = base
        .define_method("code", MemberAttributes::PUBLIC, TypeId::I32)
        .unwrap();
    code.append(Expr::ret(Some(Expr::constant(ConstValue::I32(1)))))
        .unwrap();
    let base_code = code.handle();
    let base = module.commit(base).unwrap();

    let mut derived = module.define_class("Shadow", base).unwrap();
    let code = derived
        .define_method("code", MemberAttributes::PUBLIC, TypeId::I32)
        .unwrap();
    code.append(Expr::ret(Some(Expr::constant(ConstValue::I32(2)))))
        .unwrap();
    let derived_code = code.handle();
    let derived = module.commit(derived).unwrap();

    let mut vm = Vm::new(module.backend());
    let obj = vm.instantiate(derived, &[]).unwrap();
    assert_eq!(
        vm.invoke(Some(&obj), base_code, &[]).unwrap(),
        Some(Value::I32(1))
    );
    assert_eq!(
        vm.invoke(Some(&obj), derived_code, &[]).unwrap(),
        Some(Value::I32(2))
    );
}

#[test]
fn sibling_constructor_chain_runs() {
    let mut module = module();
    let mut ty = module.define_class("Counter", TypeId::OBJECT).unwrap();
    let start = ty
        .define_field("start", TypeId::I32, MemberAttributes::PUBLIC)
        .unwrap()
        .handle();

    let full = ty.define_constructor(MemberAttributes::PUBLIC).unwrap();
    full.define_parameter(TypeId::I32, ParamAttributes::empty(), "start")
        .unwrap();
    full.invoke_base_constructor().unwrap();
    let value = full.param(1).unwrap();
    full.append(Expr::store_field(Some(full.this()), start, value))
        .unwrap();
    let full = full.handle();

    let short = ty.define_constructor(MemberAttributes::PUBLIC).unwrap();
    short
        .invoke_constructor(full, vec![Expr::constant(ConstValue::I32(5))])
        .unwrap();
    let id = module.commit(ty).unwrap();

    let mut vm = Vm::new(module.backend());
    let obj = vm.instantiate(id, &[]).unwrap();
    assert_eq!(obj.field(start), Some(Value::I32(5)));
}

#[test]
fn mirrored_parameters_keep_defaults() {
    let mut module = module();
    let mut service = module.define_class("Service", TypeId::OBJECT).unwrap();
    let retries = service
        .define_field("retries", TypeId::I32, MemberAttributes::PUBLIC)
        .unwrap()
        .handle();
    let ctor = service
        .define_constructor(MemberAttributes::PUBLIC)
        .unwrap();
    ctor.define_parameter(TypeId::STRING, ParamAttributes::empty(), "name")
        .unwrap();
    ctor.define_parameter(TypeId::I32, ParamAttributes::empty(), "retries")
        .unwrap()
        .set_default(ConstValue::I32(3))
        .unwrap();
    ctor.invoke_base_constructor().unwrap();
    let value = ctor.param(2).unwrap();
    ctor.append(Expr::store_field(Some(ctor.this()), retries, value))
        .unwrap();
    let service_ctor = ctor.handle();
    let service = module.commit(service).unwrap();

    let source = module
        .metadata()
        .constructor_info(service_ctor)
        .unwrap();
    let mut proxy = module.define_class("ServiceProxy", service).unwrap();
    let ctor = proxy.define_constructor(MemberAttributes::PUBLIC).unwrap();
    for param in &source.parameters {
        ctor.define_parameter_from(param).unwrap();
    }
    let forwarded = (1..=2).map(|p| ctor.param(p).unwrap()).collect();
    ctor.invoke_constructor(service_ctor, forwarded).unwrap();
    let proxy_ctor = ctor.handle();
    let proxy = module.commit(proxy).unwrap();

    let published = module.metadata().constructor_info(proxy_ctor).unwrap();
    assert_eq!(published.parameters[0].name, "name");
    assert_eq!(published.parameters[0].default_value, None);
    assert_eq!(published.parameters[1].name, "retries");
    assert!(published.parameters[1].is_optional());
    assert_eq!(
        published.parameters[1].default_value,
        Some(ConstValue::I32(3))
    );

    let mut vm = Vm::new(module.backend());
    let obj = vm
        .instantiate(proxy, &[Value::from("db"), Value::I32(5)])
        .unwrap();
    assert_eq!(obj.field(retries), Some(Value::I32(5)));
}

#[test]
fn conditions_and_locals_execute() {
    let mut module = module();
    let mut ty = module.define_class("Math", TypeId::OBJECT).unwrap();
    let statics = MemberAttributes::PUBLIC | MemberAttributes::STATIC;

    let max = ty.define_method("max", statics, TypeId::I32).unwrap();
    max.define_parameter(TypeId::I32, ParamAttributes::empty(), "a")
        .unwrap();
    max.define_parameter(TypeId::I32, ParamAttributes::empty(), "b")
        .unwrap();
    let a = max.param(1).unwrap();
    let b = max.param(2).unwrap();
    let pick = Expr::condition(
        Expr::binary(BinaryOp::Gt, a.clone(), b.clone()),
        a,
        Some(b),
    );
    max.append(Expr::ret(Some(pick))).unwrap();
    let max = max.handle();

    let triple = ty.define_method("triple", statics, TypeId::I64).unwrap();
    triple
        .define_parameter(TypeId::I64, ParamAttributes::empty(), "n")
        .unwrap();
    let n = triple.param(1).unwrap();
    let acc = triple.declare_local(TypeId::I64).unwrap();
    triple
        .append(Expr::store_local(
            acc,
            Expr::binary(BinaryOp::Add, n.clone(), n.clone()),
        ))
        .unwrap();
    triple
        .append(Expr::store_local(
            acc,
            Expr::binary(BinaryOp::Add, Expr::local(acc), n),
        ))
        .unwrap();
    triple.append(Expr::ret(Some(Expr::local(acc)))).unwrap();
    let triple = triple.handle();
    module.commit(ty).unwrap();

    let mut vm = Vm::new(module.backend());
    assert_eq!(
        vm.invoke(None, max, &[Value::I32(2), Value::I32(9)]).unwrap(),
        Some(Value::I32(9))
    );
    assert_eq!(
        vm.invoke(None, max, &[Value::I32(4), Value::I32(-1)]).unwrap(),
        Some(Value::I32(4))
    );
    assert_eq!(
        vm.invoke(None, triple, &[Value::I64(14)]).unwrap(),
        Some(Value::I64(42))
    );
    assert_eq!(
        vm.invoke(None, max, &[Value::I32(1)]),
        Err(VmError::ArityMismatch {
            member: MemberKey::Method(max).to_string(),
            expected: 2,
            found: 1,
        })
    );
}

#[test]
fn interface_calls_dispatch_to_the_implementation() {
    let mut module = module();
    let mut shape = module.define_interface("IShape").unwrap();
    let area = shape
        .define_method(
            "area",
            VIRTUAL | MemberAttributes::ABSTRACT,
            TypeId::I32,
        )
        .unwrap()
        .handle();
    let shape = module.commit(shape).unwrap();

    let mut square = module.define_class("Square", TypeId::OBJECT).unwrap();
    square.implement(shape).unwrap();
    let side = square
        .define_field("side", TypeId::I32, MemberAttributes::PRIVATE)
        .unwrap();
    side.set_constant(ConstValue::I32(6)).unwrap();
    let side = side.handle();
    let method = square.define_method("area", VIRTUAL, TypeId::I32).unwrap();
    let product = Expr::binary(
        BinaryOp::Mul,
        Expr::field(method.this(), side, TypeId::I32),
        Expr::field(method.this(), side, TypeId::I32),
    );
    method.append(Expr::ret(Some(product))).unwrap();
    let square = module.commit(square).unwrap();

    let info = module.metadata().type_info(square).unwrap();
    assert_eq!(info.interfaces, vec![shape]);

    let mut vm = Vm::new(module.backend());
    let obj = vm.instantiate(square, &[]).unwrap();
    assert_eq!(vm.invoke(Some(&obj), area, &[]).unwrap(), Some(Value::I32(36)));
    assert!(matches!(
        vm.instantiate(shape, &[]),
        Err(VmError::UnknownMember(_))
    ));
}

#[test]
fn native_members_need_a_binding() {
    let mut module = module();
    let mut ty = module.define_class("Clock", TypeId::OBJECT).unwrap();
    let now = ty
        .define_method("now", MemberAttributes::PUBLIC, TypeId::I64)
        .unwrap();
    now.set_impl_policy(ImplPolicy::Native).unwrap();
    let now = now.handle();
    let id = module.commit(ty).unwrap();

    let mut vm = Vm::new(module.backend());
    let obj = vm.instantiate(id, &[]).unwrap();
    assert_eq!(
        vm.invoke(Some(&obj), now, &[]),
        Err(VmError::NoBody(MemberKey::Method(now).to_string()))
    );

    vm.bind_native(MemberKey::Method(now), |args| {
        assert!(args[0].as_object().is_some());
        Ok(Some(Value::I64(1_700_000_000)))
    });
    assert_eq!(
        vm.invoke(Some(&obj), now, &[]).unwrap(),
        Some(Value::I64(1_700_000_000))
    );
}

#[test]
fn runaway_recursion_hits_the_call_depth_limit() {
    let config = VmConfig {
        max_call_depth: 16,
        ..VmConfig::default()
    };
    let mut module = module_with(config);
    let mut ty = module.define_class("Deep", TypeId::OBJECT).unwrap();
    let dive = ty
        .define_method("dive", MemberAttributes::PUBLIC, TypeId::I32)
        .unwrap();
    dive.define_parameter(TypeId::I32, ParamAttributes::empty(), "n")
        .unwrap();
    let handle = dive.handle();
    let recurse = Expr::call(
        dive.this(),
        handle,
        TypeId::I32,
        vec![dive.param(1).unwrap()],
    );
    dive.append(Expr::ret(Some(recurse))).unwrap();
    let id = module.commit(ty).unwrap();

    let mut vm = Vm::new(module.backend());
    let obj = vm.instantiate(id, &[]).unwrap();
    assert_eq!(
        vm.invoke(Some(&obj), handle, &[Value::I32(0)]),
        Err(VmError::CallDepthExceeded(16))
    );
    assert_eq!(vm.depth(), 0);
}

#[test]
fn committed_types_are_permanent() {
    let mut module = module();
    let point = define_point(&mut module);

    // The name stays taken and the record stays published.
    assert!(matches!(
        module.define_class("Point", TypeId::OBJECT),
        Err(EmitError::InvalidArgument { .. })
    ));
    assert!(module.metadata().type_info(point.ty).is_some());
}

#[test]
fn rejected_type_frees_its_name() {
    let mut module = module();
    let mut widget = module.define_class("Widget", TypeId::OBJECT).unwrap();
    let rejected = widget.ty();
    widget
        .define_constructor(MemberAttributes::PUBLIC)
        .unwrap()
        .append(Expr::discard(Expr::constant(ConstValue::I32(1))))
        .unwrap();
    assert!(matches!(
        module.commit(widget),
        Err(EmitError::Backend(BackendError::Rejected { .. }))
    ));

    // Nothing of the rejected attempt is left pending.
    assert_eq!(
        module.backend_mut().commit_type(rejected),
        Err(BackendError::UnknownType(rejected))
    );

    let widget = module.define_class("Widget", TypeId::OBJECT).unwrap();
    let id = module.commit(widget).unwrap();
    assert_ne!(id, rejected);
    let mut vm = Vm::new(module.backend());
    assert!(vm.instantiate(id, &[]).is_ok());
}

#[test]
fn field_handles_resolve_through_metadata() {
    let mut module = module();
    let point = define_point(&mut module);
    let info = module.metadata().type_info(point.ty).unwrap();
    let x: FieldRef = info.field_named("x").unwrap().handle;
    assert_eq!(module.metadata().field_info(x).unwrap().ty, TypeId::I32);
    assert_eq!(
        info.property_named("Label").and_then(|p| p.getter),
        info.method_named("get_Label").map(|m| m.handle)
    );
}
