//! Native-call context: the slot window surface and reentrant calls
//!
//! Every native entry point receives a [`CallCtx`] for the duration of one
//! activation. It is the only way to touch the activation's slot window,
//! and the only way back into the interpreter.
//!
//! # Calling convention
//!
//! - Slot 0 is the designated result, nil unless the entry writes it.
//! - Plain functions: arguments occupy slots 1..=arity in declared order.
//! - Methods (constructor, getter, setter, operators, named): `self` is
//!   fixed in slot 1, explicit arguments follow from slot 2. The getter
//!   receives the attribute name in slot 2; the setter receives the name in
//!   slot 2 and the value in slot 3.
//!
//! # Failure discipline
//!
//! Validators and call operations return [`InteropResult`]; an entry that
//! observes `Err` must propagate it immediately (`?`) without further slot
//! writes. Out-of-range slot access is a contract violation and panics.

use std::any::Any;

use super::error::{InteropError, InteropResult};
use super::gc::heap::HeapObject;
use super::handle::Handle;
use super::slots::SlotWindow;
use super::value::{ClassId, Value};
use super::Vm;

/// Window accessor and reentry surface of one native activation.
pub struct CallCtx<'vm> {
    vm: &'vm mut Vm,
    win: usize,
}

impl<'vm> CallCtx<'vm> {
    pub(crate) fn new(vm: &'vm mut Vm, win: usize) -> Self {
        CallCtx { vm, win }
    }

    fn window(&self) -> &SlotWindow {
        &self.vm.windows[self.win]
    }

    fn window_mut(&mut self) -> &mut SlotWindow {
        &mut self.vm.windows[self.win]
    }

    fn mismatch(&self, slot: usize, expected: &str) -> InteropError {
        InteropError::TypeMismatch {
            slot,
            expected: expected.to_string(),
            got: self.window().get(slot).type_name().to_string(),
        }
    }

    // ========================================================================
    // Window management
    // ========================================================================

    /// Number of addressable slots in this window.
    pub fn slot_count(&self) -> usize {
        self.window().len()
    }

    /// Guarantee at least `n` addressable slots; existing slots keep their
    /// contents and indices, new slots are nil.
    ///
    /// # Panics
    ///
    /// Panics past the window ceiling ([`MAX_SLOTS`](super::slots::MAX_SLOTS)).
    pub fn reserve(&mut self, n: usize) {
        self.window_mut().reserve(n);
    }

    /// Short type name of the value in slot `i`, for diagnostics.
    pub fn type_name_at(&self, i: usize) -> &'static str {
        self.window().get(i).type_name()
    }

    // ========================================================================
    // Slot writers
    // ========================================================================

    /// Write a raw value. Bounds-checked.
    pub fn set_slot(&mut self, i: usize, value: Value) {
        self.window_mut().set(i, value);
    }

    /// Read a raw value. Bounds-checked.
    pub fn get_slot(&self, i: usize) -> Value {
        self.window().get(i)
    }

    /// Write nil into slot `i`.
    pub fn set_nil(&mut self, i: usize) {
        self.set_slot(i, Value::Nil);
    }

    /// Write a boolean into slot `i`.
    pub fn set_bool(&mut self, i: usize, b: bool) {
        self.set_slot(i, Value::Bool(b));
    }

    /// Write a number into slot `i`. Bit-preserving for every f64.
    pub fn set_number(&mut self, i: usize, n: f64) {
        self.set_slot(i, Value::Number(n));
    }

    /// Allocate a managed string and write it into slot `i`.
    pub fn set_string(&mut self, i: usize, s: &str) {
        let v = self.vm.make_string(s);
        self.set_slot(i, v);
    }

    // ========================================================================
    // Validators
    // ========================================================================

    /// Read slot `i` as a number.
    pub fn get_number(&self, i: usize) -> InteropResult<f64> {
        match self.window().get(i) {
            Value::Number(n) => Ok(n),
            _ => Err(self.mismatch(i, "number")),
        }
    }

    /// Read slot `i` as a boolean.
    pub fn get_bool(&self, i: usize) -> InteropResult<bool> {
        match self.window().get(i) {
            Value::Bool(b) => Ok(b),
            _ => Err(self.mismatch(i, "bool")),
        }
    }

    /// Read slot `i` as a string.
    ///
    /// The `&str` carries its explicit length (embedded NULs are fine) and
    /// borrows from this activation; copy it out if it must survive further
    /// window writes.
    pub fn get_str(&self, i: usize) -> InteropResult<&str> {
        match self.window().get(i) {
            Value::Str(r) => match self.vm.heap.get(r) {
                HeapObject::Str(s) => Ok(s.as_str()),
                _ => unreachable!("string value pointing at a non-string object"),
            },
            _ => Err(self.mismatch(i, "string")),
        }
    }

    /// Read slot `i` as a callable (closure or class).
    pub fn get_callable(&self, i: usize) -> InteropResult<Value> {
        let v = self.window().get(i);
        if v.is_callable() {
            Ok(v)
        } else {
            Err(self.mismatch(i, "callable"))
        }
    }

    /// Class of the instance in slot `i`.
    pub fn class_of(&self, i: usize) -> InteropResult<ClassId> {
        match self.window().get(i) {
            Value::Instance(r) => match self.vm.heap.get(r) {
                HeapObject::Instance(inst) => Ok(inst.class),
                _ => unreachable!("instance value pointing at a non-instance object"),
            },
            _ => Err(self.mismatch(i, "instance")),
        }
    }

    /// Validate that slot `i` holds an instance of `class` (or a subclass).
    pub fn check_instance_of(&self, i: usize, class: ClassId) -> InteropResult<()> {
        let actual = self.class_of(i)?;
        if self.vm.class_derives_from(actual, class) {
            Ok(())
        } else {
            Err(InteropError::TypeMismatch {
                slot: i,
                expected: self.vm.class_name_of(class).to_string(),
                got: self.vm.class_name_of(actual).to_string(),
            })
        }
    }

    /// Borrow the native payload of the instance in slot `i`, downcast to
    /// `T`. The borrow is scoped to this activation — retaining payload
    /// state across activations requires a [`Handle`] on the instance.
    pub fn instance_payload<T: Any>(&mut self, i: usize) -> InteropResult<&mut T> {
        let mismatch = self.mismatch(i, "instance");
        let r = match self.window().get(i) {
            Value::Instance(r) => r,
            _ => return Err(mismatch),
        };
        match self.vm.heap.get_mut(r) {
            HeapObject::Instance(inst) => inst
                .payload
                .as_mut()
                .and_then(|p| p.downcast_mut::<T>())
                .ok_or_else(|| InteropError::TypeMismatch {
                    slot: i,
                    expected: std::any::type_name::<T>().to_string(),
                    got: "instance".to_string(),
                }),
            _ => unreachable!("instance value pointing at a non-instance object"),
        }
    }

    /// Payload of `self` (slot 1), for method bodies.
    pub fn self_payload<T: Any>(&mut self) -> InteropResult<&mut T> {
        self.instance_payload(1)
    }

    // ========================================================================
    // Construction and reentrant calls
    // ========================================================================

    /// Construct an instance of `class` from `argc` argument slots starting
    /// at `args_start`, writing the instance into `dst`.
    pub fn new_instance(
        &mut self,
        class: ClassId,
        dst: usize,
        argc: usize,
        args_start: usize,
    ) -> InteropResult<()> {
        let args = self.collect_args(argc, args_start);
        let instance = self.vm.construct(class, &args)?;
        self.set_slot(dst, instance);
        Ok(())
    }

    /// Invoke the callable in `callable_slot` with `argc` arguments starting
    /// at `args_start`, writing the nested execution's result into
    /// `ret_slot` of this window.
    ///
    /// Blocks until the nested execution completes. A failure inside it —
    /// including an uncaught script error — comes back as `Err` and must be
    /// propagated like any validation failure.
    pub fn call(
        &mut self,
        callable_slot: usize,
        argc: usize,
        args_start: usize,
        ret_slot: usize,
    ) -> InteropResult<()> {
        let callee = self.get_callable(callable_slot)?;
        let args = self.collect_args(argc, args_start);
        let result = self.vm.call_value(callee, &args)?;
        self.set_slot(ret_slot, result);
        Ok(())
    }

    /// Invoke `name` on the receiver in `receiver_slot`, resolving it on the
    /// receiver's class chain at call time, with `argc` arguments starting
    /// at `args_start`; the result lands in `ret_slot`.
    pub fn call_method(
        &mut self,
        receiver_slot: usize,
        name: &str,
        argc: usize,
        args_start: usize,
        ret_slot: usize,
    ) -> InteropResult<()> {
        let receiver = self.window().get(receiver_slot);
        let args = self.collect_args(argc, args_start);
        let result = self.vm.call_method_by_name(receiver, name, &args)?;
        self.set_slot(ret_slot, result);
        Ok(())
    }

    fn collect_args(&self, argc: usize, args_start: usize) -> Vec<Value> {
        (args_start..args_start + argc)
            .map(|i| self.window().get(i))
            .collect()
    }

    // ========================================================================
    // Handles
    // ========================================================================

    /// Pin the value in slot `i` and return a handle usable after this
    /// window is destroyed.
    pub fn new_handle(&mut self, i: usize) -> Handle {
        let value = self.window().get(i);
        self.vm.new_handle(value)
    }

    /// Release a handle, consuming it.
    pub fn release_handle(&mut self, handle: Handle) {
        self.vm.release_handle(handle);
    }

    /// Read a live handle's pinned value.
    pub fn handle_value(&self, handle: &Handle) -> Value {
        self.vm.handle_value(handle)
    }

    /// Write a handle's pinned value into slot `i`.
    pub fn place_handle(&mut self, i: usize, handle: &Handle) {
        let value = self.vm.handle_value(handle);
        self.set_slot(i, value);
    }
}
