//! Minimal chunk interpreter
//!
//! The interop layer needs a collaborator that can run a script callable to
//! completion for reentrant calls; this module is that collaborator, kept as
//! small as the protocol's guarantees allow. A [`Chunk`] is a straight-line
//! stack program over constants, argument loads, calls, attribute access,
//! binary operators, conditional jumps, throw, and return. There is no
//! compiler here — chunks are produced by embedders and tests.

mod run;

pub(crate) use run::run;

use super::class::Operator;
use super::value::Value;

/// One stack-machine instruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Op {
    /// Push `consts[i]`.
    Const(u16),
    /// Push the activation's argument `i` (0-based).
    LoadArg(u8),
    /// Discard the top of stack.
    Pop,
    /// Pop rhs, lhs; push `lhs <op> rhs` via the dispatch policy.
    Binary(Operator),
    /// Pop `argc` arguments, then the callee; push the call's result.
    Call {
        /// Number of arguments on the stack above the callee.
        argc: u8,
    },
    /// Pop `argc` arguments, then the receiver; resolve `names[name]` on it
    /// at call time and push the result.
    CallMethod {
        /// Index into the chunk's name table.
        name: u16,
        /// Number of arguments on the stack above the receiver.
        argc: u8,
    },
    /// Pop the receiver; push attribute `names[i]`.
    GetAttr(u16),
    /// Pop the value, then the receiver; set attribute `names[i]`.
    SetAttr(u16),
    /// Unconditional jump to an absolute instruction index.
    Jump(u16),
    /// Pop; jump if the value is falsey.
    JumpIfFalse(u16),
    /// Pop a value and raise it as a script error.
    Throw,
    /// Pop the result (nil if the stack is empty) and finish.
    Return,
}

/// A compiled script callable.
#[derive(Debug)]
pub struct Chunk {
    /// Name used in call traces.
    pub name: String,
    /// Declared arity; checked by the caller before the chunk runs.
    pub arity: u8,
    /// Constant pool. Reference-typed constants must come from the same `Vm`
    /// that will run the chunk.
    pub consts: Vec<Value>,
    /// Name table for attribute access and by-name method calls.
    pub names: Vec<String>,
    /// Instruction stream.
    pub ops: Vec<Op>,
}
