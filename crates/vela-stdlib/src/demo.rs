//! The `demo` module: a reference consumer of the full class surface
//!
//! `Pair` exercises every capability a native class can declare — allocate
//! and deallocate hooks, a constructor, getter/setter, operator overloads,
//! and a named method — while the module functions exercise the reentrant
//! call protocol. Embedders defining their own classes should start here.

use std::any::Any;

use vela_engine::{
    CallCtx, InteropError, InteropResult, MethodSym, NativeModule, Operator, Vm,
};

/// Native payload of a `Pair` instance.
#[derive(Debug, Default)]
struct Pair {
    val: f64,
}

fn new_pair() -> Box<dyn Any + Send> {
    Box::new(Pair::default())
}

fn drop_pair(payload: Box<dyn Any + Send>) {
    log::trace!("finalizing a Pair payload");
    drop(payload);
}

/// `Pair(val: number)` — store the value in the fresh payload.
fn pair_init(ctx: &mut CallCtx<'_>) -> InteropResult<()> {
    let val = ctx.get_number(2)?;
    ctx.self_payload::<Pair>()?.val = val;
    Ok(())
}

fn no_such_attribute(ctx: &CallCtx<'_>) -> InteropError {
    InteropError::NoSuchAttribute {
        class: "Pair".to_string(),
        name: ctx.get_str(2).map(str::to_string).unwrap_or_default(),
    }
}

/// Getter hook: only `val` exists; anything else is an attribute error.
fn pair_getter(ctx: &mut CallCtx<'_>) -> InteropResult<()> {
    if ctx.get_str(2)? == "val" {
        let val = ctx.self_payload::<Pair>()?.val;
        ctx.set_number(0, val);
        Ok(())
    } else {
        Err(no_such_attribute(ctx))
    }
}

/// Setter hook, mirror of the getter.
fn pair_setter(ctx: &mut CallCtx<'_>) -> InteropResult<()> {
    if ctx.get_str(2)? == "val" {
        let val = ctx.get_number(3)?;
        ctx.self_payload::<Pair>()?.val = val;
        Ok(())
    } else {
        Err(no_such_attribute(ctx))
    }
}

/// Validate the operand in slot 2 as a `Pair` and read both payloads.
fn pair_operands(ctx: &mut CallCtx<'_>) -> InteropResult<(f64, f64)> {
    let class = ctx.class_of(1)?;
    ctx.check_instance_of(2, class)?;
    let rhs = ctx.instance_payload::<Pair>(2)?.val;
    let lhs = ctx.self_payload::<Pair>()?.val;
    Ok((lhs, rhs))
}

/// `Pair + Pair -> Pair` — a new instance carrying the sum.
fn pair_add(ctx: &mut CallCtx<'_>) -> InteropResult<()> {
    let class = ctx.class_of(1)?;
    let (lhs, rhs) = pair_operands(ctx)?;
    ctx.reserve(4);
    ctx.set_number(3, lhs + rhs);
    ctx.new_instance(class, 0, 1, 3)
}

/// `Pair == Pair` — value equality on the payloads.
fn pair_eq(ctx: &mut CallCtx<'_>) -> InteropResult<()> {
    let (lhs, rhs) = pair_operands(ctx)?;
    ctx.set_bool(0, lhs == rhs);
    Ok(())
}

/// `Pair > Pair` — value ordering on the payloads.
fn pair_gt(ctx: &mut CallCtx<'_>) -> InteropResult<()> {
    let (lhs, rhs) = pair_operands(ctx)?;
    ctx.set_bool(0, lhs > rhs);
    Ok(())
}

/// `Pair.scale(a: number, b: number) -> number` — the payload scaled by both.
fn pair_scale(ctx: &mut CallCtx<'_>) -> InteropResult<()> {
    let a = ctx.get_number(2)?;
    let b = ctx.get_number(3)?;
    let val = ctx.self_payload::<Pair>()?.val;
    ctx.set_number(0, val * a * b);
    Ok(())
}

/// `demo.concat(s1: string, s2: string) -> string` — returns `s2 + s1`.
fn demo_concat(ctx: &mut CallCtx<'_>) -> InteropResult<()> {
    let joined = {
        let s1 = ctx.get_str(1)?;
        let s2 = ctx.get_str(2)?;
        format!("{s2}{s1}")
    };
    ctx.set_string(0, &joined);
    Ok(())
}

/// `demo.call_native(f: fn)` — call `f` with "foo", 42, false and return its
/// result, exercising the reentrant call protocol.
fn demo_call_native(ctx: &mut CallCtx<'_>) -> InteropResult<()> {
    ctx.get_callable(1)?;
    ctx.reserve(5);
    ctx.set_string(2, "foo");
    ctx.set_number(3, 42.0);
    ctx.set_bool(4, false);
    ctx.call(1, 3, 2, 0)
}

/// `demo.call_method(o, name: string, a1, a2)` — by-name method call on `o`,
/// resolved on its class chain at call time.
fn demo_call_method(ctx: &mut CallCtx<'_>) -> InteropResult<()> {
    let name = ctx.get_str(2)?.to_string();
    ctx.call_method(1, &name, 2, 3, 0)
}

/// Register the `demo` module on `vm`.
pub fn register(vm: &mut Vm) -> InteropResult<()> {
    let mut module = NativeModule::new("demo");
    module.add_function("concat", demo_concat, 2);
    module.add_function("call_native", demo_call_native, 1);
    module.add_function("call_method", demo_call_method, 4);

    let pair = vm.define_class(&mut module, "Pair", None, new_pair, Some(drop_pair));
    vm.add_method(pair, MethodSym::Ctor, pair_init, 1);
    vm.add_method(pair, MethodSym::Getter, pair_getter, 1);
    vm.add_method(pair, MethodSym::Setter, pair_setter, 2);
    vm.add_method(pair, MethodSym::Operator(Operator::Add), pair_add, 1);
    vm.add_method(pair, MethodSym::Operator(Operator::Eq), pair_eq, 1);
    vm.add_method(pair, MethodSym::Operator(Operator::Gt), pair_gt, 1);
    vm.add_method(pair, MethodSym::Named("scale"), pair_scale, 2);

    vm.register_module(module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_engine::Value;

    fn vm_with_demo() -> Vm {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut vm = Vm::new();
        register(&mut vm).unwrap();
        vm
    }

    fn make_pair(vm: &mut Vm, val: f64) -> Value {
        let class = vm.lookup("demo", "Pair").unwrap();
        vm.eval(class, &[Value::Number(val)]).unwrap()
    }

    #[test]
    fn test_construct_and_read_val() {
        let mut vm = vm_with_demo();
        let p = make_pair(&mut vm, 3.0);
        assert_eq!(vm.get_attr(p, "val").unwrap(), Value::Number(3.0));
    }

    #[test]
    fn test_setter_updates_payload() {
        let mut vm = vm_with_demo();
        let p = make_pair(&mut vm, 1.0);
        vm.set_attr(p, "val", Value::Number(9.0)).unwrap();
        assert_eq!(vm.get_attr(p, "val").unwrap(), Value::Number(9.0));
    }

    #[test]
    fn test_unknown_attribute_is_an_error() {
        let mut vm = vm_with_demo();
        let p = make_pair(&mut vm, 1.0);
        let err = vm.get_attr(p, "nothing").unwrap_err();
        assert!(matches!(err, InteropError::NoSuchAttribute { .. }));
        let err = vm.set_attr(p, "nothing", Value::Nil).unwrap_err();
        assert!(matches!(err, InteropError::NoSuchAttribute { .. }));
    }

    #[test]
    fn test_declared_method_shadows_getter() {
        let mut vm = vm_with_demo();
        let p = make_pair(&mut vm, 2.0);
        // "scale" resolves to the bound method, never the getter hook.
        let bound = vm.get_attr(p, "scale").unwrap();
        assert!(bound.is_callable());
        let out = vm
            .eval(bound, &[Value::Number(3.0), Value::Number(4.0)])
            .unwrap();
        assert_eq!(out, Value::Number(24.0));
    }

    #[test]
    fn test_pair_addition() {
        let mut vm = vm_with_demo();
        let a = make_pair(&mut vm, 3.0);
        let b = make_pair(&mut vm, 4.0);
        let sum = vm.binary_op(Operator::Add, a, b).unwrap();
        assert_eq!(vm.get_attr(sum, "val").unwrap(), Value::Number(7.0));
    }

    #[test]
    fn test_pair_comparison() {
        let mut vm = vm_with_demo();
        let a = make_pair(&mut vm, 3.0);
        let b = make_pair(&mut vm, 4.0);
        let c = make_pair(&mut vm, 3.0);
        assert_eq!(vm.binary_op(Operator::Eq, a, c).unwrap(), Value::Bool(true));
        assert_eq!(vm.binary_op(Operator::Eq, a, b).unwrap(), Value::Bool(false));
        assert_eq!(vm.binary_op(Operator::Gt, b, a).unwrap(), Value::Bool(true));
        assert_eq!(vm.binary_op(Operator::Gt, a, b).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_operator_rejects_non_pair_operand() {
        let mut vm = vm_with_demo();
        let a = make_pair(&mut vm, 3.0);
        let err = vm.binary_op(Operator::Add, a, Value::Number(4.0)).unwrap_err();
        assert!(matches!(err, InteropError::TypeMismatch { .. }));
    }

    #[test]
    fn test_undeclared_operator_is_a_type_error() {
        let mut vm = vm_with_demo();
        let a = make_pair(&mut vm, 3.0);
        let b = make_pair(&mut vm, 4.0);
        let err = vm.binary_op(Operator::Mul, a, b).unwrap_err();
        assert!(matches!(err, InteropError::NoSuchOperator { op: "*", .. }));
    }

    #[test]
    fn test_concat_reverses() {
        let mut vm = vm_with_demo();
        let s1 = vm.make_string("world");
        let s2 = vm.make_string("hello ");
        let out = vm.call_exported("demo", "concat", &[s1, s2]).unwrap();
        assert_eq!(vm.str_value(out), Some("hello world"));
    }

    fn probe(ctx: &mut CallCtx<'_>) -> InteropResult<()> {
        let rendered = {
            let s = ctx.get_str(1)?;
            let n = ctx.get_number(2)?;
            let b = ctx.get_bool(3)?;
            format!("{s}:{n}:{b}")
        };
        ctx.set_string(0, &rendered);
        Ok(())
    }

    #[test]
    fn test_call_native_passes_fixed_arguments() {
        let mut vm = vm_with_demo();
        let f = vm.make_native_fn("probe", probe, 3);
        let out = vm.call_exported("demo", "call_native", &[f]).unwrap();
        assert_eq!(vm.str_value(out), Some("foo:42:false"));
    }

    #[test]
    fn test_call_method_by_name() {
        let mut vm = vm_with_demo();
        let p = make_pair(&mut vm, 2.0);
        let name = vm.make_string("scale");
        let out = vm
            .call_exported(
                "demo",
                "call_method",
                &[p, name, Value::Number(3.0), Value::Number(4.0)],
            )
            .unwrap();
        assert_eq!(out, Value::Number(24.0));
    }

    #[test]
    fn test_ctor_requires_a_number() {
        let mut vm = vm_with_demo();
        let class = vm.lookup("demo", "Pair").unwrap();
        let s = vm.make_string("three");
        let err = vm.eval(class, &[s]).unwrap_err();
        assert!(err.message.contains("expected number at slot 2"));
    }
}
