//! Per-activation slot windows
//!
//! A [`SlotWindow`] is the bounded, zero-indexed array of values scoped to
//! one native-call activation. Slot 0 is reserved for the return value and
//! nil-initialized before the entry runs; argument slots follow (methods get
//! `self` fixed in slot 1). The window is destroyed when the activation
//! returns; nothing may outlive it except through a handle.
//!
//! Out-of-range access and exceeding the growth ceiling are contract
//! violations (panics), deliberately distinct from the recoverable
//! validation errors in [`error`](super::error).

use super::value::Value;

/// Growth ceiling for a single window.
pub const MAX_SLOTS: usize = 256;

/// The bounded value array of one native-call activation.
#[derive(Debug)]
pub(crate) struct SlotWindow {
    slots: Vec<Value>,
}

impl SlotWindow {
    /// Create a window with `count` nil slots (slot 0 included).
    pub(crate) fn new(count: usize) -> Self {
        assert!(
            count <= MAX_SLOTS,
            "slot window of {count} slots exceeds the {MAX_SLOTS}-slot ceiling"
        );
        SlotWindow {
            slots: vec![Value::Nil; count],
        }
    }

    /// Number of addressable slots.
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Guarantee at least `n` addressable slots.
    ///
    /// Existing slots keep their contents and indices; new slots are nil.
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds [`MAX_SLOTS`].
    pub(crate) fn reserve(&mut self, n: usize) {
        assert!(
            n <= MAX_SLOTS,
            "reserve({n}) exceeds the {MAX_SLOTS}-slot window ceiling"
        );
        if n > self.slots.len() {
            self.slots.resize(n, Value::Nil);
        }
    }

    /// Read slot `i`.
    ///
    /// # Panics
    ///
    /// Panics on an out-of-range index; that is a native-call contract
    /// violation, not a recoverable validation failure.
    pub(crate) fn get(&self, i: usize) -> Value {
        match self.slots.get(i) {
            Some(v) => *v,
            None => panic!(
                "slot index {i} out of bounds for a window of {} slots",
                self.slots.len()
            ),
        }
    }

    /// Write slot `i`.
    ///
    /// # Panics
    ///
    /// Panics on an out-of-range index.
    pub(crate) fn set(&mut self, i: usize, value: Value) {
        let len = self.slots.len();
        match self.slots.get_mut(i) {
            Some(slot) => *slot = value,
            None => panic!("slot index {i} out of bounds for a window of {len} slots"),
        }
    }

    /// Iterate the live slots (GC root scan).
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Value> {
        self.slots.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_window_is_nil() {
        let w = SlotWindow::new(3);
        assert_eq!(w.len(), 3);
        for i in 0..3 {
            assert_eq!(w.get(i), Value::Nil);
        }
    }

    #[test]
    fn test_set_get() {
        let mut w = SlotWindow::new(2);
        w.set(1, Value::Number(42.0));
        assert_eq!(w.get(1), Value::Number(42.0));
        assert_eq!(w.get(0), Value::Nil);
    }

    #[test]
    fn test_reserve_preserves_contents() {
        let mut w = SlotWindow::new(3);
        w.set(0, Value::Bool(true));
        w.set(1, Value::Number(1.5));
        w.set(2, Value::Number(-0.0));
        w.reserve(32);
        assert_eq!(w.len(), 32);
        assert_eq!(w.get(0), Value::Bool(true));
        assert_eq!(w.get(1), Value::Number(1.5));
        match w.get(2) {
            Value::Number(n) => assert_eq!(n.to_bits(), (-0.0f64).to_bits()),
            _ => unreachable!(),
        }
        assert_eq!(w.get(31), Value::Nil);
    }

    #[test]
    fn test_reserve_never_shrinks() {
        let mut w = SlotWindow::new(8);
        w.reserve(2);
        assert_eq!(w.len(), 8);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_get_out_of_range_panics() {
        let w = SlotWindow::new(2);
        w.get(2);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_set_out_of_range_panics() {
        let mut w = SlotWindow::new(1);
        w.set(5, Value::Nil);
    }

    #[test]
    #[should_panic(expected = "ceiling")]
    fn test_reserve_past_ceiling_panics() {
        let mut w = SlotWindow::new(1);
        w.reserve(MAX_SLOTS + 1);
    }
}
