//! Native modules: built once, registered, then immutable
//!
//! A [`NativeModule`] is the builder external code populates with functions
//! and classes; [`Vm::register_module`](crate::Vm::register_module) consumes
//! it, publishes the flat namespace into the instance's module table, and
//! seals it — consuming the builder is the move-semantics rendition of
//! "release the handle after registration". Registered modules live until
//! the `Vm` is dropped.

use rustc_hash::FxHashMap;

use super::class::NativeFn;
use super::value::{ClassId, Value};

/// Builder for a native module's flat namespace.
pub struct NativeModule {
    pub(crate) name: String,
    pub(crate) functions: Vec<(String, NativeFn, u8)>,
    pub(crate) classes: Vec<(String, ClassId)>,
}

impl NativeModule {
    /// Start a module named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        NativeModule {
            name: name.into(),
            functions: Vec::new(),
            classes: Vec::new(),
        }
    }

    /// Module name as it will appear in the global namespace.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Export a native function under `name` with the given declared arity.
    pub fn add_function(&mut self, name: impl Into<String>, entry: NativeFn, arity: u8) {
        self.functions.push((name.into(), entry, arity));
    }
}

impl std::fmt::Debug for NativeModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeModule")
            .field("name", &self.name)
            .field("functions", &self.functions.len())
            .field("classes", &self.classes.len())
            .finish()
    }
}

/// One published export.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ModuleEntry {
    Function(Value),
    Class(ClassId),
}

/// A registered, sealed module.
pub(crate) struct Module {
    pub(crate) entries: FxHashMap<String, ModuleEntry>,
}

impl Module {
    /// Exported values, for the collector's root scan.
    pub(crate) fn exported_values(&self) -> impl Iterator<Item = Value> + '_ {
        self.entries.values().map(|e| match e {
            ModuleEntry::Function(v) => *v,
            ModuleEntry::Class(id) => Value::Class(*id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::ctx::CallCtx;
    use crate::vm::error::InteropResult;

    fn noop(_ctx: &mut CallCtx<'_>) -> InteropResult<()> {
        Ok(())
    }

    #[test]
    fn test_builder_accumulates() {
        let mut m = NativeModule::new("math");
        m.add_function("abs", noop, 1);
        m.add_function("min", noop, 2);
        assert_eq!(m.name(), "math");
        assert_eq!(m.functions.len(), 2);
    }
}
