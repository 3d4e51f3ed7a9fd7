//! Vela VM runtime: instance state, dispatch policy, and the interop surface
//!
//! One [`Vm`] is one interpreter instance. It owns everything the interop
//! protocol touches — heap, class registry, module table, handle table, and
//! the stack of slot windows — so multiple instances can run on separate
//! threads with nothing shared between them. Script execution, native-call
//! dispatch, and reentrant calls all nest synchronously on one call stack;
//! there is no suspension other than nesting and no cancellation below an
//! error unwinding the whole chain.

pub mod class;
pub mod ctx;
pub mod error;
pub(crate) mod gc;
pub mod handle;
pub mod interp;
pub mod module;
pub mod slots;
pub mod value;

use std::sync::Arc;

use rustc_hash::FxHashMap;

use class::{
    AllocateFn, DeallocateFn, MethodSym, MethodTable, NativeClass, NativeFn, NativeMethod, Operator,
};
use ctx::CallCtx;
use error::{InteropError, InteropResult, RuntimeError};
use gc::collector;
use gc::heap::{Function, FunctionKind, Heap, HeapObject, InstanceObj};
use handle::{Handle, HandleTable};
use interp::Chunk;
use module::{Module, ModuleEntry, NativeModule};
use slots::SlotWindow;
use value::{ClassId, Value};

/// Recursion ceiling for the nested-call chain (native → script → native …).
pub const MAX_CALL_DEPTH: usize = 1024;

/// One interpreter instance.
///
/// `Vm` is `Send` (it can move to another thread) but not `Sync`; slot
/// windows, handles, and instances must never cross between instances.
pub struct Vm {
    pub(crate) heap: Heap,
    pub(crate) classes: Vec<NativeClass>,
    pub(crate) modules: FxHashMap<String, Module>,
    pub(crate) handles: HandleTable,
    pub(crate) windows: Vec<SlotWindow>,
    frames: Vec<String>,
    error_trace: Option<Vec<String>>,
    depth: usize,
}

impl Vm {
    /// Create an empty instance: no modules, no classes, empty heap.
    pub fn new() -> Self {
        Vm {
            heap: Heap::new(),
            classes: Vec::new(),
            modules: FxHashMap::default(),
            handles: HandleTable::default(),
            windows: Vec::new(),
            frames: Vec::new(),
            error_trace: None,
            depth: 0,
        }
    }

    // ========================================================================
    // Registration surface
    // ========================================================================

    /// Define a native class: allocation/deallocation hooks plus an empty
    /// method table, registered under `name` in `module`.
    ///
    /// # Panics
    ///
    /// Panics if `parent` is not a previously defined class.
    pub fn define_class(
        &mut self,
        module: &mut NativeModule,
        name: &str,
        parent: Option<ClassId>,
        allocate: AllocateFn,
        deallocate: Option<DeallocateFn>,
    ) -> ClassId {
        if let Some(p) = parent {
            assert!(p < self.classes.len(), "parent class {p} is not defined");
        }
        let id = self.classes.len();
        self.classes.push(NativeClass {
            name: name.to_string(),
            parent,
            allocate,
            deallocate,
            table: MethodTable::default(),
        });
        module.classes.push((name.to_string(), id));
        id
    }

    /// Install a method-table entry on a defined class.
    pub fn add_method(&mut self, class: ClassId, sym: MethodSym<'_>, entry: NativeFn, arity: u8) {
        self.classes[class].table.install(sym, NativeMethod { entry, arity });
    }

    /// Publish a populated module into the global namespace and seal it.
    ///
    /// Fails on a duplicate module name or duplicate export names. The
    /// builder is consumed; registered modules live until the `Vm` drops.
    pub fn register_module(&mut self, module: NativeModule) -> InteropResult<()> {
        if self.modules.contains_key(&module.name) {
            return Err(InteropError::Module(format!(
                "module '{}' is already registered",
                module.name
            )));
        }
        let mut entries: FxHashMap<String, ModuleEntry> = FxHashMap::default();
        for (name, entry, arity) in &module.functions {
            let qualified = format!("{}.{}", module.name, name);
            let value = self.make_native_fn(&qualified, *entry, *arity);
            if entries.insert(name.clone(), ModuleEntry::Function(value)).is_some() {
                return Err(InteropError::Module(format!(
                    "duplicate export '{name}' in module '{}'",
                    module.name
                )));
            }
        }
        for (name, id) in &module.classes {
            if entries.insert(name.clone(), ModuleEntry::Class(*id)).is_some() {
                return Err(InteropError::Module(format!(
                    "duplicate export '{name}' in module '{}'",
                    module.name
                )));
            }
        }
        log::debug!(
            "registered module '{}' with {} export(s)",
            module.name,
            entries.len()
        );
        self.modules.insert(module.name, Module { entries });
        Ok(())
    }

    /// Look up an export of a registered module.
    pub fn lookup(&self, module: &str, name: &str) -> InteropResult<Value> {
        let m = self
            .modules
            .get(module)
            .ok_or_else(|| InteropError::Module(format!("no module named '{module}'")))?;
        match m.entries.get(name) {
            Some(ModuleEntry::Function(v)) => Ok(*v),
            Some(ModuleEntry::Class(id)) => Ok(Value::Class(*id)),
            None => Err(InteropError::Module(format!(
                "module '{module}' has no export '{name}'"
            ))),
        }
    }

    // ========================================================================
    // Value construction helpers
    // ========================================================================

    /// Allocate a managed string.
    pub fn make_string(&mut self, s: &str) -> Value {
        Value::Str(self.heap.alloc(HeapObject::Str(s.to_string())))
    }

    /// Allocate an empty opaque object (open field map).
    pub fn make_object(&mut self) -> Value {
        Value::Object(self.heap.alloc(HeapObject::Object(FxHashMap::default())))
    }

    /// Set a field on an opaque object.
    ///
    /// # Panics
    ///
    /// Panics if `obj` is not an object value; this is a host-side API, not
    /// a script-facing operation.
    pub fn object_set(&mut self, obj: Value, key: &str, value: Value) {
        match obj {
            Value::Object(r) => match self.heap.get_mut(r) {
                HeapObject::Object(fields) => {
                    fields.insert(key.to_string(), value);
                }
                _ => unreachable!("object value pointing at a non-object"),
            },
            other => panic!("object_set on a {} value", other.type_name()),
        }
    }

    /// Wrap a script chunk as a callable value.
    pub fn make_script_fn(&mut self, chunk: Chunk) -> Value {
        let name = chunk.name.clone();
        Value::Closure(self.heap.alloc(HeapObject::Closure(Function {
            name,
            kind: FunctionKind::Script(Arc::new(chunk)),
        })))
    }

    /// Wrap a native entry point as a callable value.
    pub fn make_native_fn(&mut self, name: &str, entry: NativeFn, arity: u8) -> Value {
        Value::Closure(self.heap.alloc(HeapObject::Closure(Function {
            name: name.to_string(),
            kind: FunctionKind::Native { entry, arity },
        })))
    }

    /// Read a managed string's text.
    pub fn str_value(&self, v: Value) -> Option<&str> {
        match v {
            Value::Str(r) => match self.heap.get(r) {
                HeapObject::Str(s) => Some(s.as_str()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Human-readable rendering, used by `throw` and diagnostics.
    pub fn display(&self, v: Value) -> String {
        match v {
            Value::Nil => "nil".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format!("{n}"),
            Value::Str(r) => match self.heap.get(r) {
                HeapObject::Str(s) => s.clone(),
                _ => unreachable!(),
            },
            Value::Instance(r) => match self.heap.get(r) {
                HeapObject::Instance(inst) => {
                    format!("<{} instance>", self.classes[inst.class].name)
                }
                _ => unreachable!(),
            },
            Value::Closure(r) => match self.heap.get(r) {
                HeapObject::Closure(f) => format!("<fn {}>", f.name),
                HeapObject::BoundMethod { name, .. } => format!("<method {name}>"),
                _ => unreachable!(),
            },
            Value::Class(id) => format!("<class {}>", self.classes[id].name),
            Value::Object(_) => "<object>".to_string(),
        }
    }

    // ========================================================================
    // Class chain queries
    // ========================================================================

    /// Name of a defined class.
    pub fn class_name_of(&self, id: ClassId) -> &str {
        &self.classes[id].name
    }

    /// Whether `class` is `target` or transitively derives from it.
    pub fn class_derives_from(&self, class: ClassId, target: ClassId) -> bool {
        class::derives_from(&self.classes, class, target)
    }

    pub(crate) fn resolve_named(&self, class: ClassId, name: &str) -> Option<NativeMethod> {
        class::resolve(&self.classes, class, |t| t.named.get(name).copied())
    }

    pub(crate) fn resolve_operator(&self, class: ClassId, op: Operator) -> Option<NativeMethod> {
        class::resolve(&self.classes, class, |t| t.operators[op.index()])
    }

    pub(crate) fn resolve_getter(&self, class: ClassId) -> Option<NativeMethod> {
        class::resolve(&self.classes, class, |t| t.getter)
    }

    pub(crate) fn resolve_setter(&self, class: ClassId) -> Option<NativeMethod> {
        class::resolve(&self.classes, class, |t| t.setter)
    }

    fn instance_class(&self, v: Value) -> Option<ClassId> {
        match v {
            Value::Instance(r) => match self.heap.get(r) {
                HeapObject::Instance(inst) => Some(inst.class),
                _ => None,
            },
            _ => None,
        }
    }

    // ========================================================================
    // Handles
    // ========================================================================

    /// Pin `value` and return a stable reference usable after the current
    /// slot window is destroyed. Must be paired with [`Vm::release_handle`].
    pub fn new_handle(&mut self, value: Value) -> Handle {
        if let Some(r) = collector::value_ref(&value) {
            self.heap.pin(r);
        }
        self.handles.insert(value)
    }

    /// Unpin and consume a handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle was not issued by this instance (a double
    /// release does not typecheck — the token is consumed).
    pub fn release_handle(&mut self, handle: Handle) {
        let value = self.handles.remove(handle);
        if let Some(r) = collector::value_ref(&value) {
            self.heap.unpin(r);
        }
    }

    /// Read a live handle's pinned value.
    pub fn handle_value(&self, handle: &Handle) -> Value {
        self.handles.get(handle)
    }

    /// Number of live handles (diagnostic).
    pub fn live_handles(&self) -> usize {
        self.handles.live_count()
    }

    /// Number of live heap objects (diagnostic).
    pub fn live_objects(&self) -> usize {
        self.heap.live()
    }

    // ========================================================================
    // Dispatch policy
    // ========================================================================

    fn with_frame<F>(&mut self, name: String, f: F) -> InteropResult<Value>
    where
        F: FnOnce(&mut Vm) -> InteropResult<Value>,
    {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(InteropError::StackOverflow);
        }
        self.depth += 1;
        self.frames.push(name);
        let result = f(self);
        // Capture the trace at the deepest failing frame only.
        if result.is_err() && self.error_trace.is_none() {
            self.error_trace = Some(self.frames.clone());
        }
        self.frames.pop();
        self.depth -= 1;
        result
    }

    /// Invoke a callable value with `args`, running the nested execution to
    /// completion. This is the single entry point the reentrant call
    /// protocol, the interpreter, and top-level evaluation all share.
    pub(crate) fn call_value(&mut self, callee: Value, args: &[Value]) -> InteropResult<Value> {
        match callee {
            Value::Closure(r) => {
                enum Plan {
                    Native { entry: NativeFn, arity: u8, name: String },
                    Script { chunk: Arc<Chunk>, name: String },
                    Bound { receiver: Value, method: NativeMethod, name: String },
                }
                let plan = match self.heap.get(r) {
                    HeapObject::Closure(f) => match &f.kind {
                        FunctionKind::Native { entry, arity } => Plan::Native {
                            entry: *entry,
                            arity: *arity,
                            name: f.name.clone(),
                        },
                        FunctionKind::Script(chunk) => Plan::Script {
                            chunk: chunk.clone(),
                            name: f.name.clone(),
                        },
                    },
                    HeapObject::BoundMethod { receiver, method, name } => Plan::Bound {
                        receiver: *receiver,
                        method: *method,
                        name: name.clone(),
                    },
                    _ => return Err(InteropError::NotCallable(callee.type_name())),
                };
                match plan {
                    Plan::Native { entry, arity, name } => {
                        if args.len() != arity as usize {
                            return Err(InteropError::ArityMismatch {
                                expected: arity,
                                got: args.len(),
                            });
                        }
                        self.with_frame(name, |vm| vm.run_native(entry, None, args))
                    }
                    Plan::Script { chunk, name } => {
                        if args.len() != chunk.arity as usize {
                            return Err(InteropError::ArityMismatch {
                                expected: chunk.arity,
                                got: args.len(),
                            });
                        }
                        self.with_frame(name, |vm| interp::run(vm, &chunk, args))
                    }
                    Plan::Bound { receiver, method, name } => {
                        self.invoke_method(&name, method, receiver, args)
                    }
                }
            }
            Value::Class(id) => self.construct(id, args),
            other => Err(InteropError::NotCallable(other.type_name())),
        }
    }

    /// Run a native entry in a fresh slot window.
    ///
    /// Window shape: slot 0 nil (result), then `self` in slot 1 when
    /// `receiver` is present, then the arguments in declared order.
    fn run_native(
        &mut self,
        entry: NativeFn,
        receiver: Option<Value>,
        args: &[Value],
    ) -> InteropResult<Value> {
        let base = if receiver.is_some() { 2 } else { 1 };
        let mut window = SlotWindow::new(base + args.len());
        if let Some(recv) = receiver {
            window.set(1, recv);
        }
        for (i, a) in args.iter().enumerate() {
            window.set(base + i, *a);
        }
        self.windows.push(window);
        let win = self.windows.len() - 1;
        let result = entry(&mut CallCtx::new(self, win));
        let window = self.windows.pop().expect("window stack imbalance");
        debug_assert_eq!(self.windows.len(), win);
        result.map(|()| window.get(0))
    }

    /// Invoke a resolved method entry with its receiver fixed in slot 1.
    pub(crate) fn invoke_method(
        &mut self,
        name: &str,
        method: NativeMethod,
        receiver: Value,
        args: &[Value],
    ) -> InteropResult<Value> {
        if args.len() != method.arity as usize {
            return Err(InteropError::ArityMismatch {
                expected: method.arity,
                got: args.len(),
            });
        }
        self.with_frame(name.to_string(), |vm| {
            vm.run_native(method.entry, Some(receiver), args)
        })
    }

    /// Instantiate `class`: allocate hook, wrap the payload, then run the
    /// constructor entry (if declared) with the new instance as `self`.
    ///
    /// Constructors are not inherited; a class without one accepts exactly
    /// zero arguments.
    pub(crate) fn construct(&mut self, class: ClassId, args: &[Value]) -> InteropResult<Value> {
        let (allocate, ctor, class_name) = {
            let desc = &self.classes[class];
            (desc.allocate, desc.table.ctor, desc.name.clone())
        };
        let payload = allocate();
        let instance = Value::Instance(self.heap.alloc(HeapObject::Instance(InstanceObj {
            class,
            payload: Some(payload),
        })));
        match ctor {
            Some(method) => {
                self.invoke_method(&class_name, method, instance, args)?;
            }
            None => {
                if !args.is_empty() {
                    return Err(InteropError::ArityMismatch {
                        expected: 0,
                        got: args.len(),
                    });
                }
            }
        }
        Ok(instance)
    }

    /// Resolve `name` on the receiver's class chain at call time and invoke
    /// it. For opaque objects, a closure-valued field of that name is the
    /// method.
    pub fn call_method_by_name(
        &mut self,
        receiver: Value,
        name: &str,
        args: &[Value],
    ) -> InteropResult<Value> {
        match receiver {
            Value::Instance(_) => {
                let class = self.instance_class(receiver).expect("checked instance");
                match self.resolve_named(class, name) {
                    Some(method) => {
                        let qualified = format!("{}.{name}", self.classes[class].name);
                        self.invoke_method(&qualified, method, receiver, args)
                    }
                    None => Err(InteropError::NoSuchMethod {
                        class: self.classes[class].name.clone(),
                        name: name.to_string(),
                    }),
                }
            }
            Value::Object(r) => {
                let field = match self.heap.get(r) {
                    HeapObject::Object(fields) => fields.get(name).copied(),
                    _ => unreachable!(),
                };
                match field {
                    Some(v) if v.is_callable() => self.call_value(v, args),
                    _ => Err(InteropError::NoSuchMethod {
                        class: "object".to_string(),
                        name: name.to_string(),
                    }),
                }
            }
            other => Err(InteropError::NoSuchMethod {
                class: other.type_name().to_string(),
                name: name.to_string(),
            }),
        }
    }

    /// Attribute read. Declared methods shadow the getter: a name satisfied
    /// by the class chain's named table binds the method to the receiver;
    /// only unknown names reach the getter hook (name in slot 2).
    pub fn get_attr(&mut self, receiver: Value, name: &str) -> InteropResult<Value> {
        match receiver {
            Value::Instance(_) => {
                let class = self.instance_class(receiver).expect("checked instance");
                if let Some(method) = self.resolve_named(class, name) {
                    let qualified = format!("{}.{name}", self.classes[class].name);
                    return Ok(Value::Closure(self.heap.alloc(HeapObject::BoundMethod {
                        receiver,
                        method,
                        name: qualified,
                    })));
                }
                match self.resolve_getter(class) {
                    Some(getter) => {
                        let qualified = format!("{}.@getter", self.classes[class].name);
                        let name_value = self.make_string(name);
                        self.invoke_method(&qualified, getter, receiver, &[name_value])
                    }
                    None => Err(InteropError::NoSuchAttribute {
                        class: self.classes[class].name.clone(),
                        name: name.to_string(),
                    }),
                }
            }
            Value::Object(r) => match self.heap.get(r) {
                HeapObject::Object(fields) => {
                    fields.get(name).copied().ok_or_else(|| InteropError::NoSuchAttribute {
                        class: "object".to_string(),
                        name: name.to_string(),
                    })
                }
                _ => unreachable!(),
            },
            other => Err(InteropError::NoSuchAttribute {
                class: other.type_name().to_string(),
                name: name.to_string(),
            }),
        }
    }

    /// Attribute write, mirroring [`Vm::get_attr`]: the setter hook receives
    /// the name in slot 2 and the value in slot 3. Assigning over a declared
    /// method is an error; opaque objects are open maps.
    pub fn set_attr(&mut self, receiver: Value, name: &str, value: Value) -> InteropResult<()> {
        match receiver {
            Value::Instance(_) => {
                let class = self.instance_class(receiver).expect("checked instance");
                if self.resolve_named(class, name).is_some() {
                    return Err(InteropError::NoSuchAttribute {
                        class: self.classes[class].name.clone(),
                        name: name.to_string(),
                    });
                }
                match self.resolve_setter(class) {
                    Some(setter) => {
                        let qualified = format!("{}.@setter", self.classes[class].name);
                        let name_value = self.make_string(name);
                        self.invoke_method(&qualified, setter, receiver, &[name_value, value])?;
                        Ok(())
                    }
                    None => Err(InteropError::NoSuchAttribute {
                        class: self.classes[class].name.clone(),
                        name: name.to_string(),
                    }),
                }
            }
            Value::Object(_) => {
                self.object_set(receiver, name, value);
                Ok(())
            }
            other => Err(InteropError::NoSuchAttribute {
                class: other.type_name().to_string(),
                name: name.to_string(),
            }),
        }
    }

    /// Binary-operator dispatch.
    ///
    /// Numbers, strings, and booleans have the built-in meanings; a native
    /// instance on the left dispatches through its class chain's operator
    /// table with the right operand in slot 2. No entry anywhere in the
    /// chain is a type error, never a default result.
    pub fn binary_op(&mut self, op: Operator, lhs: Value, rhs: Value) -> InteropResult<Value> {
        use Operator::*;
        match (lhs, rhs) {
            (Value::Number(a), Value::Number(b)) => Ok(match op {
                Add => Value::Number(a + b),
                Sub => Value::Number(a - b),
                Mul => Value::Number(a * b),
                Div => Value::Number(a / b),
                Rem => Value::Number(a % b),
                Eq => Value::Bool(a == b),
                Lt => Value::Bool(a < b),
                Le => Value::Bool(a <= b),
                Gt => Value::Bool(a > b),
                Ge => Value::Bool(a >= b),
            }),
            (Value::Str(a), Value::Str(b)) => match op {
                Add => {
                    let joined = {
                        let lhs_str = match self.heap.get(a) {
                            HeapObject::Str(s) => s.clone(),
                            _ => unreachable!(),
                        };
                        let rhs_str = match self.heap.get(b) {
                            HeapObject::Str(s) => s.as_str(),
                            _ => unreachable!(),
                        };
                        lhs_str + rhs_str
                    };
                    Ok(self.make_string(&joined))
                }
                Eq => {
                    let equal = match (self.heap.get(a), self.heap.get(b)) {
                        (HeapObject::Str(x), HeapObject::Str(y)) => x == y,
                        _ => unreachable!(),
                    };
                    Ok(Value::Bool(equal))
                }
                _ => Err(InteropError::NoSuchOperator {
                    op: op.symbol(),
                    class: "string".to_string(),
                }),
            },
            (Value::Instance(_), _) => {
                let class = self.instance_class(lhs).expect("checked instance");
                match self.resolve_operator(class, op) {
                    Some(method) => {
                        let qualified =
                            format!("{}.{}", self.classes[class].name, op.symbol());
                        self.invoke_method(&qualified, method, lhs, &[rhs])
                    }
                    None => Err(InteropError::NoSuchOperator {
                        op: op.symbol(),
                        class: self.classes[class].name.clone(),
                    }),
                }
            }
            // Dispatch is left-operand only, and it never defaults for a
            // native instance: a primitive on the left with an instance on
            // the right is a type error even when the class declares `==`.
            (_, Value::Instance(_)) => Err(InteropError::NoSuchOperator {
                op: op.symbol(),
                class: lhs.type_name().to_string(),
            }),
            _ if op == Eq => {
                // Mixed or non-overloadable primitive equality.
                Ok(Value::Bool(lhs == rhs))
            }
            _ => Err(InteropError::NoSuchOperator {
                op: op.symbol(),
                class: lhs.type_name().to_string(),
            }),
        }
    }

    // ========================================================================
    // Top-level evaluation
    // ========================================================================

    /// Run a callable to completion at the top of the call chain.
    ///
    /// An uncaught failure surfaces as a [`RuntimeError`] (message plus call
    /// trace) and aborts only this evaluation; the instance stays usable.
    pub fn eval(&mut self, callable: Value, args: &[Value]) -> Result<Value, RuntimeError> {
        self.error_trace = None;
        match self.call_value(callable, args) {
            Ok(v) => Ok(v),
            Err(e) => {
                let trace = self.error_trace.take().unwrap_or_default();
                let err = RuntimeError {
                    message: e.to_string(),
                    trace,
                };
                log::error!("{}", err.report());
                debug_assert!(self.frames.is_empty(), "frame stack survived unwinding");
                Err(err)
            }
        }
    }

    /// Look up `module.name` and [`Vm::eval`] it.
    pub fn call_exported(
        &mut self,
        module: &str,
        name: &str,
        args: &[Value],
    ) -> Result<Value, RuntimeError> {
        let callee = self.lookup(module, name).map_err(|e| RuntimeError {
            message: e.to_string(),
            trace: Vec::new(),
        })?;
        self.eval(callee, args)
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Vm {
    fn drop(&mut self) {
        // Finalize everything still alive; sweep already took what it freed,
        // so each payload hook still runs exactly once.
        for entry in &mut self.heap.entries {
            if let Some(obj) = entry.obj.take() {
                collector::finalize(obj, &self.classes);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn the_answer(ctx: &mut CallCtx<'_>) -> InteropResult<()> {
        ctx.set_number(0, 42.0);
        Ok(())
    }

    fn add_two(ctx: &mut CallCtx<'_>) -> InteropResult<()> {
        let a = ctx.get_number(1)?;
        let b = ctx.get_number(2)?;
        ctx.set_number(0, a + b);
        Ok(())
    }

    #[test]
    fn test_register_and_call_function() {
        let mut vm = Vm::new();
        let mut m = NativeModule::new("math");
        m.add_function("answer", the_answer, 0);
        m.add_function("add", add_two, 2);
        vm.register_module(m).unwrap();

        let out = vm.call_exported("math", "answer", &[]).unwrap();
        assert_eq!(out, Value::Number(42.0));

        let out = vm
            .call_exported("math", "add", &[Value::Number(2.0), Value::Number(2.5)])
            .unwrap();
        assert_eq!(out, Value::Number(4.5));
    }

    #[test]
    fn test_duplicate_module_rejected() {
        let mut vm = Vm::new();
        vm.register_module(NativeModule::new("m")).unwrap();
        let err = vm.register_module(NativeModule::new("m")).unwrap_err();
        assert!(matches!(err, InteropError::Module(_)));
    }

    #[test]
    fn test_arity_is_validated_not_truncated() {
        let mut vm = Vm::new();
        let mut m = NativeModule::new("math");
        m.add_function("add", add_two, 2);
        vm.register_module(m).unwrap();

        let err = vm
            .call_exported("math", "add", &[Value::Number(1.0)])
            .unwrap_err();
        assert!(err.message.contains("expected 2 argument(s), got 1"));
    }

    #[test]
    fn test_validation_failure_surfaces() {
        let mut vm = Vm::new();
        let mut m = NativeModule::new("math");
        m.add_function("add", add_two, 2);
        vm.register_module(m).unwrap();

        let s = vm.make_string("nope");
        let err = vm
            .call_exported("math", "add", &[s, Value::Number(1.0)])
            .unwrap_err();
        assert!(err.message.contains("expected number at slot 1"));
    }

    #[test]
    fn test_lookup_unknown_export() {
        let mut vm = Vm::new();
        vm.register_module(NativeModule::new("m")).unwrap();
        assert!(vm.lookup("m", "ghost").is_err());
        assert!(vm.lookup("ghost", "x").is_err());
    }

    #[test]
    fn test_handles_pin_across_collection() {
        let mut vm = Vm::new();
        let s = vm.make_string("keep me");
        let h = vm.new_handle(s);
        assert_eq!(vm.collect(), 0);
        assert_eq!(vm.str_value(vm.handle_value(&h)), Some("keep me"));
        vm.release_handle(h);
        assert_eq!(vm.collect(), 1);
    }

    #[test]
    fn test_two_handles_same_value() {
        let mut vm = Vm::new();
        let s = vm.make_string("shared");
        let h1 = vm.new_handle(s);
        let h2 = vm.new_handle(s);
        vm.release_handle(h1);
        // Still pinned through h2.
        assert_eq!(vm.collect(), 0);
        vm.release_handle(h2);
        assert_eq!(vm.collect(), 1);
    }

    #[test]
    fn test_display() {
        let mut vm = Vm::new();
        let s = vm.make_string("hi");
        assert_eq!(vm.display(s), "hi");
        assert_eq!(vm.display(Value::Nil), "nil");
        assert_eq!(vm.display(Value::Number(3.0)), "3");
        assert_eq!(vm.display(Value::Bool(true)), "true");
    }

    #[test]
    fn test_calling_a_number_fails() {
        let mut vm = Vm::new();
        let err = vm.eval(Value::Number(5.0), &[]).unwrap_err();
        assert!(err.message.contains("not callable"));
    }
}
