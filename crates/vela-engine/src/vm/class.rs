//! Native class descriptors and the dispatch capability table
//!
//! A [`NativeClass`] describes an externally defined type: allocation and
//! deallocation hooks for its opaque payload plus a method table. The table
//! is a fixed-layout capability record — constructor, property getter,
//! property setter, and one slot per overloadable operator are nullable
//! function references, so operator dispatch never hashes a string; only
//! ordinary named methods go through a hash map.

use std::any::Any;

use rustc_hash::FxHashMap;

use super::ctx::CallCtx;
use super::error::InteropResult;
use super::value::ClassId;

/// Entry point of a native function or method.
///
/// The entry receives the activation's slot window through [`CallCtx`];
/// slot 0 is the result, arguments start at slot 1 (slot 2 for methods,
/// with `self` fixed in slot 1). Returning `Err` aborts the activation and
/// propagates to the caller.
pub type NativeFn = fn(&mut CallCtx<'_>) -> InteropResult<()>;

/// Allocation hook: produces the opaque native payload of a new instance.
///
/// Runs before the constructor entry; the payload should be a cheap default
/// that the constructor then fills in. Payloads are `Send` so a whole `Vm`
/// can move between threads.
pub type AllocateFn = fn() -> Box<dyn Any + Send>;

/// Deallocation hook: finalizes the payload when the wrapping instance is
/// reclaimed (by collection or at `Vm` drop). Runs exactly once. Classes
/// whose payload needs no finalization beyond `Drop` can omit it.
pub type DeallocateFn = fn(Box<dyn Any + Send>);

/// Overloadable operator symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
    /// `==`
    Eq,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl Operator {
    /// Number of operator slots in the capability table.
    pub const COUNT: usize = 10;

    pub(crate) fn index(self) -> usize {
        match self {
            Operator::Add => 0,
            Operator::Sub => 1,
            Operator::Mul => 2,
            Operator::Div => 3,
            Operator::Rem => 4,
            Operator::Eq => 5,
            Operator::Lt => 6,
            Operator::Le => 7,
            Operator::Gt => 8,
            Operator::Ge => 9,
        }
    }

    /// Source-level symbol, used in diagnostics.
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Rem => "%",
            Operator::Eq => "==",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
        }
    }
}

/// Method-table key: a reserved symbol or an ordinary method name.
#[derive(Debug, Clone, Copy)]
pub enum MethodSym<'a> {
    /// Constructor, invoked on instantiation after the allocate hook.
    Ctor,
    /// Property getter, consulted for attribute names with no declared method.
    Getter,
    /// Property setter, mirror of the getter.
    Setter,
    /// Operator overload.
    Operator(Operator),
    /// Ordinary named method.
    Named(&'a str),
}

/// One installed method: declared arity plus entry point.
///
/// Arity counts explicit arguments only — `self` is not included.
#[derive(Debug, Clone, Copy)]
pub struct NativeMethod {
    pub(crate) entry: NativeFn,
    pub(crate) arity: u8,
}

impl NativeMethod {
    /// Declared arity (explicit arguments, excluding `self`).
    pub fn arity(&self) -> u8 {
        self.arity
    }
}

/// Fixed-layout capability table of one class.
#[derive(Default)]
pub(crate) struct MethodTable {
    pub(crate) ctor: Option<NativeMethod>,
    pub(crate) getter: Option<NativeMethod>,
    pub(crate) setter: Option<NativeMethod>,
    pub(crate) operators: [Option<NativeMethod>; Operator::COUNT],
    pub(crate) named: FxHashMap<String, NativeMethod>,
}

impl MethodTable {
    pub(crate) fn install(&mut self, sym: MethodSym<'_>, method: NativeMethod) {
        match sym {
            MethodSym::Ctor => self.ctor = Some(method),
            MethodSym::Getter => self.getter = Some(method),
            MethodSym::Setter => self.setter = Some(method),
            MethodSym::Operator(op) => self.operators[op.index()] = Some(method),
            MethodSym::Named(name) => {
                self.named.insert(name.to_string(), method);
            }
        }
    }
}

/// Descriptor of an externally defined class.
pub struct NativeClass {
    pub(crate) name: String,
    pub(crate) parent: Option<ClassId>,
    pub(crate) allocate: AllocateFn,
    pub(crate) deallocate: Option<DeallocateFn>,
    pub(crate) table: MethodTable,
}

impl NativeClass {
    /// Class name as registered in its module.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent descriptor, if any.
    pub fn parent(&self) -> Option<ClassId> {
        self.parent
    }
}

impl std::fmt::Debug for NativeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeClass")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("methods", &self.table.named.len())
            .finish()
    }
}

/// Walk the class chain most-derived first, returning the first table hit.
pub(crate) fn resolve<F>(classes: &[NativeClass], mut class: ClassId, pick: F) -> Option<NativeMethod>
where
    F: Fn(&MethodTable) -> Option<NativeMethod>,
{
    loop {
        let desc = &classes[class];
        if let Some(m) = pick(&desc.table) {
            return Some(m);
        }
        match desc.parent {
            Some(parent) => class = parent,
            None => return None,
        }
    }
}

/// Whether `class` is `target` or derives from it.
pub(crate) fn derives_from(classes: &[NativeClass], mut class: ClassId, target: ClassId) -> bool {
    loop {
        if class == target {
            return true;
        }
        match classes[class].parent {
            Some(parent) => class = parent,
            None => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::error::InteropResult;

    fn noop(_ctx: &mut CallCtx<'_>) -> InteropResult<()> {
        Ok(())
    }

    fn class(name: &str, parent: Option<ClassId>) -> NativeClass {
        NativeClass {
            name: name.to_string(),
            parent,
            allocate: || Box::new(()),
            deallocate: None,
            table: MethodTable::default(),
        }
    }

    #[test]
    fn test_operator_slots_are_distinct() {
        let mut seen = [false; Operator::COUNT];
        for op in [
            Operator::Add,
            Operator::Sub,
            Operator::Mul,
            Operator::Div,
            Operator::Rem,
            Operator::Eq,
            Operator::Lt,
            Operator::Le,
            Operator::Gt,
            Operator::Ge,
        ] {
            assert!(!seen[op.index()], "operator index collision");
            seen[op.index()] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_resolve_prefers_most_derived() {
        let mut base = class("Base", None);
        base.table.install(
            MethodSym::Operator(Operator::Add),
            NativeMethod { entry: noop, arity: 1 },
        );
        base.table.install(
            MethodSym::Named("only_base"),
            NativeMethod { entry: noop, arity: 0 },
        );

        let mut derived = class("Derived", Some(0));
        derived.table.install(
            MethodSym::Operator(Operator::Add),
            NativeMethod { entry: noop, arity: 7 },
        );

        let classes = vec![base, derived];

        // Derived's own entry wins.
        let hit = resolve(&classes, 1, |t| t.operators[Operator::Add.index()]).unwrap();
        assert_eq!(hit.arity(), 7);

        // Missing locally falls through to the parent.
        let hit = resolve(&classes, 1, |t| t.named.get("only_base").copied()).unwrap();
        assert_eq!(hit.arity(), 0);

        // Absent everywhere resolves to nothing.
        assert!(resolve(&classes, 1, |t| t.operators[Operator::Lt.index()]).is_none());
    }

    #[test]
    fn test_derives_from() {
        let classes = vec![class("A", None), class("B", Some(0)), class("C", Some(1))];
        assert!(derives_from(&classes, 2, 0));
        assert!(derives_from(&classes, 2, 2));
        assert!(!derives_from(&classes, 0, 2));
    }
}
