//! Vela Interop Engine
//!
//! This crate provides the native-interop protocol of the Vela runtime:
//! - **Slot windows**: per-activation value arrays for marshaling (`vm::slots`)
//! - **Classes**: native class registry and dispatch tables (`vm::class`)
//! - **Calls**: reentrant call protocol between native code and script
//!   execution (`vm::ctx`)
//! - **Handles**: pinned cross-activation references (`vm::handle`)
//! - **GC**: mark/sweep heap with payload finalization (`vm::gc`)
//!
//! # Example
//!
//! ```rust,ignore
//! use vela_engine::{CallCtx, InteropResult, NativeModule, Value, Vm};
//!
//! fn double(ctx: &mut CallCtx<'_>) -> InteropResult<()> {
//!     let n = ctx.get_number(1)?;
//!     ctx.set_number(0, n * 2.0);
//!     Ok(())
//! }
//!
//! let mut vm = Vm::new();
//! let mut module = NativeModule::new("math");
//! module.add_function("double", double, 1);
//! vm.register_module(module).unwrap();
//!
//! let out = vm.call_exported("math", "double", &[Value::Number(21.0)]).unwrap();
//! assert_eq!(out, Value::Number(42.0));
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// VM module: heap, classes, slot windows, handles, and dispatch
pub mod vm;

// ============================================================================
// Re-exports
// ============================================================================

pub use vm::class::{
    AllocateFn, DeallocateFn, MethodSym, NativeClass, NativeFn, NativeMethod, Operator,
};
pub use vm::ctx::CallCtx;
pub use vm::error::{InteropError, InteropResult, RuntimeError};
pub use vm::handle::Handle;
pub use vm::interp::{Chunk, Op};
pub use vm::module::NativeModule;
pub use vm::slots::MAX_SLOTS;
pub use vm::value::{ClassId, Value};
pub use vm::{Vm, MAX_CALL_DEPTH};
