//! Dispatch loop for script chunks
//!
//! Runs synchronously on the caller's stack: a chunk that calls a native
//! entry that re-enters the interpreter simply nests frames until the chain
//! completes or an error unwinds all of it. A malformed chunk (operand-stack
//! underflow, bad indices) is a programming error and panics; script-level
//! failures surface as `InteropError` and propagate to the caller.

use super::Chunk;
use super::Op;
use crate::vm::error::{InteropError, InteropResult};
use crate::vm::value::Value;
use crate::vm::Vm;

fn pop(stack: &mut Vec<Value>) -> Value {
    stack.pop().expect("operand stack underflow in script chunk")
}

fn pop_n(stack: &mut Vec<Value>, n: usize) -> Vec<Value> {
    assert!(stack.len() >= n, "operand stack underflow in script chunk");
    stack.split_off(stack.len() - n)
}

pub(crate) fn run(vm: &mut Vm, chunk: &Chunk, args: &[Value]) -> InteropResult<Value> {
    let mut stack: Vec<Value> = Vec::with_capacity(8);
    let mut pc = 0usize;

    while pc < chunk.ops.len() {
        let op = chunk.ops[pc];
        pc += 1;
        match op {
            Op::Const(i) => stack.push(chunk.consts[i as usize]),
            Op::LoadArg(i) => stack.push(args[i as usize]),
            Op::Pop => {
                pop(&mut stack);
            }
            Op::Binary(operator) => {
                let rhs = pop(&mut stack);
                let lhs = pop(&mut stack);
                stack.push(vm.binary_op(operator, lhs, rhs)?);
            }
            Op::Call { argc } => {
                let call_args = pop_n(&mut stack, argc as usize);
                let callee = pop(&mut stack);
                stack.push(vm.call_value(callee, &call_args)?);
            }
            Op::CallMethod { name, argc } => {
                let call_args = pop_n(&mut stack, argc as usize);
                let receiver = pop(&mut stack);
                let method = chunk.names[name as usize].as_str();
                stack.push(vm.call_method_by_name(receiver, method, &call_args)?);
            }
            Op::GetAttr(i) => {
                let receiver = pop(&mut stack);
                stack.push(vm.get_attr(receiver, &chunk.names[i as usize])?);
            }
            Op::SetAttr(i) => {
                let value = pop(&mut stack);
                let receiver = pop(&mut stack);
                vm.set_attr(receiver, &chunk.names[i as usize], value)?;
            }
            Op::Jump(target) => pc = target as usize,
            Op::JumpIfFalse(target) => {
                if !pop(&mut stack).is_truthy() {
                    pc = target as usize;
                }
            }
            Op::Throw => {
                let message = vm.display(pop(&mut stack));
                return Err(InteropError::Raised(message));
            }
            Op::Return => return Ok(stack.pop().unwrap_or(Value::Nil)),
        }
    }
    Ok(Value::Nil)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::class::Operator;

    fn chunk(ops: Vec<Op>, consts: Vec<Value>) -> Chunk {
        Chunk {
            name: "test".to_string(),
            arity: 0,
            consts,
            names: Vec::new(),
            ops,
        }
    }

    #[test]
    fn test_const_return() {
        let mut vm = Vm::new();
        let c = chunk(vec![Op::Const(0), Op::Return], vec![Value::Number(9.5)]);
        assert_eq!(run(&mut vm, &c, &[]).unwrap(), Value::Number(9.5));
    }

    #[test]
    fn test_falls_off_end_returns_nil() {
        let mut vm = Vm::new();
        let c = chunk(vec![], vec![]);
        assert_eq!(run(&mut vm, &c, &[]).unwrap(), Value::Nil);
    }

    #[test]
    fn test_arithmetic_and_jump() {
        // if (1 + 2 == 3) return 10 else return 20
        let mut vm = Vm::new();
        let c = chunk(
            vec![
                Op::Const(0),
                Op::Const(1),
                Op::Binary(Operator::Add),
                Op::Const(2),
                Op::Binary(Operator::Eq),
                Op::JumpIfFalse(8),
                Op::Const(3),
                Op::Return,
                Op::Const(4),
                Op::Return,
            ],
            vec![
                Value::Number(1.0),
                Value::Number(2.0),
                Value::Number(3.0),
                Value::Number(10.0),
                Value::Number(20.0),
            ],
        );
        assert_eq!(run(&mut vm, &c, &[]).unwrap(), Value::Number(10.0));
    }

    #[test]
    fn test_throw_surfaces_as_raised() {
        let mut vm = Vm::new();
        let msg = vm.make_string("kaboom");
        let c = chunk(vec![Op::Const(0), Op::Throw], vec![msg]);
        match run(&mut vm, &c, &[]) {
            Err(InteropError::Raised(m)) => assert_eq!(m, "kaboom"),
            other => panic!("expected raise, got {other:?}"),
        }
    }

    #[test]
    fn test_load_arg() {
        let mut vm = Vm::new();
        let c = Chunk {
            name: "second".to_string(),
            arity: 2,
            consts: vec![],
            names: vec![],
            ops: vec![Op::LoadArg(1), Op::Return],
        };
        let out = run(&mut vm, &c, &[Value::Number(1.0), Value::Number(2.0)]).unwrap();
        assert_eq!(out, Value::Number(2.0));
    }
}
