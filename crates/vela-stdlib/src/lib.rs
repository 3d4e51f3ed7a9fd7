//! Vela standard library modules
//!
//! Every module here is an ordinary external consumer of the interop
//! protocol: it defines classes and functions exclusively through the public
//! `vela-engine` surface, with no access to engine internals. That boundary
//! is the point — if the stdlib can be written this way, so can any embedder.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod demo;
pub mod time;

use vela_engine::{InteropResult, Vm};

/// Register every stdlib module on `vm`.
pub fn register_all(vm: &mut Vm) -> InteropResult<()> {
    time::register(vm)?;
    demo::register(vm)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_all_is_idempotent_failure() {
        let mut vm = Vm::new();
        register_all(&mut vm).unwrap();
        // Registering again collides on every module name.
        assert!(register_all(&mut vm).is_err());
    }
}
