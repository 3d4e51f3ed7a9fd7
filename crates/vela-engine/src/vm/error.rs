//! Error types for the interop layer
//!
//! The taxonomy follows three tiers:
//!
//! - [`InteropError`] — recoverable failures raised inside a native
//!   activation: validation (wrong slot type, wrong arity), dispatch (no such
//!   method/attribute/operator), and errors propagated out of reentrant
//!   calls. Every validator and call operation returns
//!   [`InteropResult`]; the `?` operator is the mandatory
//!   check-and-propagate discipline — a native entry that observes an `Err`
//!   must return it without further slot writes.
//! - Programming errors — out-of-bounds slot access, stale handle ids,
//!   window-ceiling overflow. These are contract violations, not user
//!   errors, and panic with an explicit message.
//! - [`RuntimeError`] — the process-visible diagnostic produced when a
//!   failure reaches the top of the call chain. It aborts only the current
//!   top-level evaluation; the `Vm` stays usable.

/// Result type for every slot validator and reentrant call operation.
pub type InteropResult<T> = Result<T, InteropError>;

/// Recoverable failure inside a native activation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InteropError {
    /// A slot did not hold the expected shape.
    #[error("expected {expected} at slot {slot}, got {got}")]
    TypeMismatch {
        /// Slot index that failed validation.
        slot: usize,
        /// Expected type or class name.
        expected: String,
        /// Actual type or class name.
        got: String,
    },

    /// Wrong number of arguments for a declared arity.
    #[error("expected {expected} argument(s), got {got}")]
    ArityMismatch {
        /// Declared arity.
        expected: u8,
        /// Arguments actually supplied.
        got: usize,
    },

    /// A value that is not a closure or class was invoked.
    #[error("value of type {0} is not callable")]
    NotCallable(&'static str),

    /// Method name resolution failed on the receiver's class chain.
    #[error("'{class}' has no method '{name}'")]
    NoSuchMethod {
        /// Receiver class (or primitive type) name.
        class: String,
        /// Requested method name.
        name: String,
    },

    /// Attribute access not satisfied by a declared method or getter/setter.
    #[error("'{class}' has no attribute '{name}'")]
    NoSuchAttribute {
        /// Receiver class name.
        class: String,
        /// Requested attribute name.
        name: String,
    },

    /// No entry for an operator symbol anywhere in the class chain.
    #[error("unsupported operand type '{class}' for '{op}'")]
    NoSuchOperator {
        /// Operator symbol, e.g. `+`.
        op: &'static str,
        /// Left operand class (or primitive type) name.
        class: String,
    },

    /// Module registration or lookup failure.
    #[error("module error: {0}")]
    Module(String),

    /// An error raised by script code, bubbling unchanged through every
    /// intermediate native frame.
    #[error("{0}")]
    Raised(String),

    /// The nested-call chain exceeded the recursion ceiling.
    #[error("maximum call depth exceeded")]
    StackOverflow,
}

/// Top-level evaluation failure: message plus the call trace captured at the
/// deepest failing frame.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct RuntimeError {
    /// Human-readable description of the failure.
    pub message: String,
    /// Call trace, outermost frame first.
    pub trace: Vec<String>,
}

impl RuntimeError {
    /// Render the diagnostic with its trace, one frame per line.
    pub fn report(&self) -> String {
        let mut out = format!("error: {}", self.message);
        for frame in self.trace.iter().rev() {
            out.push_str("\n  in ");
            out.push_str(frame);
        }
        out
    }
}
