//! Tagged value representation
//!
//! A [`Value`] is one machine word of tag plus payload. Reference-typed
//! variants carry a [`Ref`] — an index into the owning [`Vm`](crate::Vm)'s
//! heap arena, never a raw pointer — so a value is only meaningful together
//! with the instance that produced it. Values are `Copy`; ownership of the
//! referenced object stays with the managed heap.

/// Identifier of a registered native class.
///
/// Stable for the lifetime of the owning `Vm`; meaningless across instances.
pub type ClassId = usize;

/// Index of a heap object in the owning `Vm`'s arena.
///
/// Opaque outside the engine: there is deliberately no way to construct or
/// dereference one without going through the `Vm`, which is what keeps raw
/// payload access window-scoped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ref(pub(crate) u32);

/// A tagged script value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// The absent value.
    Nil,
    /// Boolean.
    Bool(bool),
    /// IEEE-754 double. The only numeric type; marshaling is bit-preserving.
    Number(f64),
    /// Immutable string on the managed heap.
    Str(Ref),
    /// Native instance: a managed wrapper around an opaque native payload.
    Instance(Ref),
    /// Callable reference: a native function, script function, or bound method.
    Closure(Ref),
    /// A registered class, callable as its constructor.
    Class(ClassId),
    /// Opaque object reference (a plain field map).
    Object(Ref),
}

impl Value {
    /// Short type name used in diagnostics and validation errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Instance(_) => "instance",
            Value::Closure(_) => "closure",
            Value::Class(_) => "class",
            Value::Object(_) => "object",
        }
    }

    /// Truthiness used by the interpreter: `nil` and `false` are falsey.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    /// Whether this value can be invoked by the call protocol.
    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Closure(_) | Value::Class(_))
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Nil
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_is_bit_preserving() {
        let weird_nan = f64::from_bits(0x7ff8_dead_beef_0001);
        let v = Value::Number(weird_nan);
        match v {
            Value::Number(n) => assert_eq!(n.to_bits(), weird_nan.to_bits()),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(Value::Number(0.0).is_truthy());
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Nil.type_name(), "nil");
        assert_eq!(Value::Number(1.0).type_name(), "number");
        assert_eq!(Value::Class(0).type_name(), "class");
    }
}
