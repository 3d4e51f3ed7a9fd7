//! Handle table: pinned, explicitly released references
//!
//! A [`Handle`] is the only legal way for native code to retain a managed
//! value across two separate native-call activations. Creating one pins the
//! value (the collector will not reclaim it); releasing consumes the token,
//! so releasing the same handle twice does not typecheck. Two distinct
//! handles to the same value pin it twice and release independently.
//!
//! The remaining runtime-detectable misuse — presenting a handle to a `Vm`
//! that never issued it — is a programming error and panics.

use rustc_hash::FxHashMap;

use super::value::Value;

/// Opaque, pinned reference to a managed value.
///
/// Not `Clone`: the token is consumed by `Vm::release_handle`, making a
/// double release unrepresentable.
#[derive(Debug)]
pub struct Handle {
    id: u64,
}

impl Handle {
    /// Numeric identity, for logging only.
    pub fn id(&self) -> u64 {
        self.id
    }
}

#[derive(Default)]
pub(crate) struct HandleTable {
    live: FxHashMap<u64, Value>,
    next_id: u64,
}

impl HandleTable {
    pub(crate) fn insert(&mut self, value: Value) -> Handle {
        let id = self.next_id;
        self.next_id += 1;
        self.live.insert(id, value);
        Handle { id }
    }

    /// Remove a live handle, yielding the pinned value.
    ///
    /// # Panics
    ///
    /// Panics if the handle was not issued by this table (stale or foreign).
    pub(crate) fn remove(&mut self, handle: Handle) -> Value {
        match self.live.remove(&handle.id) {
            Some(value) => value,
            None => panic!("released handle {} is not live in this vm", handle.id),
        }
    }

    /// Read a live handle's value without releasing it.
    ///
    /// # Panics
    ///
    /// Panics if the handle is not live in this table.
    pub(crate) fn get(&self, handle: &Handle) -> Value {
        match self.live.get(&handle.id) {
            Some(value) => *value,
            None => panic!("handle {} is not live in this vm", handle.id),
        }
    }

    pub(crate) fn iter_values(&self) -> impl Iterator<Item = Value> + '_ {
        self.live.values().copied()
    }

    pub(crate) fn live_count(&self) -> usize {
        self.live.len()
    }
}
