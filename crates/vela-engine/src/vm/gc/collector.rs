//! Mark/sweep collection and payload finalization
//!
//! The root set of one `Vm` is: every slot of every live window, every value
//! pinned through the handle table, every module export, and every entry
//! with a positive pin count. Collection runs only from [`Vm::collect`] —
//! never inside a native activation — so that root set is complete.
//!
//! Finalization of a native instance (running its class's deallocate hook)
//! happens exactly once, here or at `Vm` drop, whichever reclaims the
//! wrapper first.

use crate::vm::class::NativeClass;
use crate::vm::gc::heap::{FunctionKind, HeapObject};
use crate::vm::value::{Ref, Value};
use crate::vm::Vm;

/// Heap reference carried by a value, if any.
pub(crate) fn value_ref(v: &Value) -> Option<Ref> {
    match v {
        Value::Str(r) | Value::Instance(r) | Value::Closure(r) | Value::Object(r) => Some(*r),
        Value::Nil | Value::Bool(_) | Value::Number(_) | Value::Class(_) => None,
    }
}

/// Heap references held by one object's children.
fn child_refs(obj: &HeapObject) -> Vec<Ref> {
    match obj {
        HeapObject::Str(_) => Vec::new(),
        // The native payload is opaque to the collector.
        HeapObject::Instance(_) => Vec::new(),
        HeapObject::Closure(f) => match &f.kind {
            FunctionKind::Native { .. } => Vec::new(),
            FunctionKind::Script(chunk) => chunk.consts.iter().filter_map(value_ref).collect(),
        },
        HeapObject::BoundMethod { receiver, .. } => value_ref(receiver).into_iter().collect(),
        HeapObject::Object(fields) => fields.values().filter_map(value_ref).collect(),
    }
}

/// Run an object's finalization. For native instances this invokes the
/// class's deallocate hook on the payload; everything else just drops.
pub(crate) fn finalize(obj: HeapObject, classes: &[NativeClass]) {
    if let HeapObject::Instance(mut inst) = obj {
        if let Some(payload) = inst.payload.take() {
            if let Some(hook) = classes[inst.class].deallocate {
                hook(payload);
            }
        }
    }
}

impl Vm {
    /// Reclaim unreachable, unpinned heap objects. Returns the number freed.
    ///
    /// Values reachable from a live slot window, a handle, or a module
    /// export survive; so does anything with a positive pin count. Native
    /// payloads of reclaimed instances are finalized through their class's
    /// deallocate hook, exactly once.
    pub fn collect(&mut self) -> usize {
        let mut pending: Vec<Ref> = Vec::new();

        for window in &self.windows {
            pending.extend(window.iter().filter_map(value_ref));
        }
        pending.extend(self.handles.iter_values().filter_map(|v| value_ref(&v)));
        for module in self.modules.values() {
            pending.extend(module.exported_values().filter_map(|v| value_ref(&v)));
        }
        for (index, entry) in self.heap.entries.iter().enumerate() {
            if entry.pins > 0 && entry.obj.is_some() {
                pending.push(Ref(index as u32));
            }
        }

        while let Some(r) = pending.pop() {
            let entry = &mut self.heap.entries[r.0 as usize];
            if entry.marked || entry.obj.is_none() {
                continue;
            }
            entry.marked = true;
            pending.extend(child_refs(self.heap.get(r)));
        }

        let mut freed = 0;
        for index in 0..self.heap.entries.len() {
            let entry = &mut self.heap.entries[index];
            if entry.obj.is_some() && !entry.marked && entry.pins == 0 {
                let obj = entry.obj.take().expect("checked above");
                finalize(obj, &self.classes);
                self.heap.release_entry(index);
                freed += 1;
            }
        }
        for entry in &mut self.heap.entries {
            entry.marked = false;
        }

        log::debug!("collect: freed {freed}, live {}", self.heap.live());
        freed
    }
}
