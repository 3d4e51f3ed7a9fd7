//! Arena heap for GC-managed objects
//!
//! The heap is a slab of entries indexed by [`Ref`]; reclaimed entries go on
//! a free list and are reused. Each entry carries a pin count (driven by the
//! handle table) and a mark bit for the collector. Holding an entry's index
//! across activations without pinning it is exactly the use-after-scope bug
//! the public API prevents: `Ref` cannot be dereferenced outside the engine.

use std::any::Any;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::vm::class::{NativeFn, NativeMethod};
use crate::vm::interp::Chunk;
use crate::vm::value::{ClassId, Ref, Value};

/// A native instance: class back-reference plus the opaque payload.
///
/// The payload is `None` only after finalization has taken it, which is what
/// makes "deallocated exactly once" structural rather than a convention.
pub(crate) struct InstanceObj {
    pub(crate) class: ClassId,
    pub(crate) payload: Option<Box<dyn Any + Send>>,
}

/// A callable: native entry point or script chunk.
pub(crate) enum FunctionKind {
    Native { entry: NativeFn, arity: u8 },
    Script(Arc<Chunk>),
}

/// Callable object with the name used in call traces.
pub(crate) struct Function {
    pub(crate) name: String,
    pub(crate) kind: FunctionKind,
}

/// One managed heap object.
pub(crate) enum HeapObject {
    Str(String),
    Instance(InstanceObj),
    Closure(Function),
    /// A method picked off a class chain, carrying its receiver.
    BoundMethod {
        receiver: Value,
        method: NativeMethod,
        name: String,
    },
    /// Plain field map (the opaque-object slot type).
    Object(FxHashMap<String, Value>),
}

pub(crate) struct Entry {
    pub(crate) obj: Option<HeapObject>,
    pub(crate) pins: u32,
    pub(crate) marked: bool,
}

/// Slab heap owned by one `Vm`.
pub(crate) struct Heap {
    pub(crate) entries: Vec<Entry>,
    free: Vec<u32>,
}

impl Heap {
    pub(crate) fn new() -> Self {
        Heap {
            entries: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Allocate an object, reusing a reclaimed entry when one is free.
    pub(crate) fn alloc(&mut self, obj: HeapObject) -> Ref {
        if let Some(index) = self.free.pop() {
            let entry = &mut self.entries[index as usize];
            debug_assert!(entry.obj.is_none() && entry.pins == 0);
            entry.obj = Some(obj);
            entry.marked = false;
            return Ref(index);
        }
        let index = u32::try_from(self.entries.len()).expect("heap index overflow");
        self.entries.push(Entry {
            obj: Some(obj),
            pins: 0,
            marked: false,
        });
        Ref(index)
    }

    /// Borrow the object behind `r`.
    ///
    /// # Panics
    ///
    /// Panics if the entry was reclaimed — a stale reference is a
    /// programming error on the engine side, never observable through the
    /// public API.
    pub(crate) fn get(&self, r: Ref) -> &HeapObject {
        self.entries[r.0 as usize]
            .obj
            .as_ref()
            .expect("stale heap reference")
    }

    pub(crate) fn get_mut(&mut self, r: Ref) -> &mut HeapObject {
        self.entries[r.0 as usize]
            .obj
            .as_mut()
            .expect("stale heap reference")
    }

    /// Increment the pin count; a pinned entry is never reclaimed.
    pub(crate) fn pin(&mut self, r: Ref) {
        self.entries[r.0 as usize].pins += 1;
    }

    /// Decrement the pin count.
    pub(crate) fn unpin(&mut self, r: Ref) {
        let entry = &mut self.entries[r.0 as usize];
        assert!(entry.pins > 0, "unpin of an unpinned heap entry");
        entry.pins -= 1;
    }

    /// Return a reclaimed entry to the free list. The object must already
    /// have been taken (and finalized) by the collector.
    pub(crate) fn release_entry(&mut self, index: usize) {
        debug_assert!(self.entries[index].obj.is_none());
        self.entries[index].pins = 0;
        self.free.push(index as u32);
    }

    /// Number of live objects.
    pub(crate) fn live(&self) -> usize {
        self.entries.iter().filter(|e| e.obj.is_some()).count()
    }
}
