//! Runtime values for the Monkey compiler and VM.
//!
//! Values are a tagged enum with reference-counted payloads, so stack slots,
//! globals, and captured free variables share storage through cheap clones.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use indexmap::IndexMap;

use crate::bytecode::instruction::Instructions;

pub mod builtins;

pub use builtins::{Builtin, BuiltinFn, BUILTINS};

/// Hash storage: insertion-ordered so inspect output is deterministic.
pub type HashPairs = IndexMap<HashKey, HashPair>;

/// A runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Integer value
    Integer(i64),
    /// Boolean value
    Boolean(bool),
    /// String value
    String(Rc<String>),
    /// Null value
    Null,
    /// Array value (immutable; `push` builds a new one)
    Array(Rc<Vec<Value>>),
    /// Hash value, keyed by the entries' hash keys
    Hash(Rc<HashPairs>),
    /// Compiled function: bytecode plus frame-layout counts
    Function(Rc<CompiledFunction>),
    /// Closure: a compiled function with its captured free variables
    Closure(Rc<Closure>),
    /// Host-provided builtin function
    Builtin(Builtin),
    /// Error produced by a builtin; inert until inspected
    Error(Rc<String>),
}

/// A key/value entry of a hash, kept alongside its original key so inspect
/// output can show it.
#[derive(Debug, Clone, PartialEq)]
pub struct HashPair {
    pub key: Value,
    pub value: Value,
}

/// A stable identity for hashable values: type tag plus 64-bit hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashKey {
    pub kind: &'static str,
    pub value: u64,
}

/// A function lowered to bytecode. Lives in the constant pool; the VM only
/// ever runs it wrapped in a [`Closure`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompiledFunction {
    pub instructions: Instructions,
    pub num_locals: usize,
    pub num_parameters: usize,
}

/// A compiled function paired with the values captured from its enclosing
/// scopes, in capture order.
#[derive(Debug, Clone, PartialEq)]
pub struct Closure {
    pub func: Rc<CompiledFunction>,
    pub free: Vec<Value>,
}

impl Value {
    /// The value's type tag, as used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "Integer",
            Value::Boolean(_) => "Boolean",
            Value::String(_) => "String",
            Value::Null => "Null",
            Value::Array(_) => "Array",
            Value::Hash(_) => "Hash",
            Value::Function(_) => "CompiledFunction",
            Value::Closure(_) => "Closure",
            Value::Builtin(_) => "Builtin",
            Value::Error(_) => "Error",
        }
    }

    /// Everything is truthy except `false` and `null`.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Boolean(value) => *value,
            Value::Null => false,
            _ => true,
        }
    }

    /// The stable key used to store this value in a hash, or `None` when the
    /// type is not hashable.
    pub fn hash_key(&self) -> Option<HashKey> {
        match self {
            Value::Integer(value) => Some(HashKey {
                kind: "Integer",
                value: *value as u64,
            }),
            Value::Boolean(value) => Some(HashKey {
                kind: "Boolean",
                value: *value as u64,
            }),
            Value::String(value) => {
                let mut hasher = DefaultHasher::new();
                value.hash(&mut hasher);
                Some(HashKey {
                    kind: "String",
                    value: hasher.finish(),
                })
            }
            _ => None,
        }
    }

    /// Object-identity comparison, used by the VM for `==`/`!=` on
    /// non-integer operands: structural for the boolean and null singletons,
    /// shared-allocation identity for everything else.
    pub fn same_identity(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::String(a), Value::String(b)) => Rc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Hash(a), Value::Hash(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(value) => write!(f, "{}", value),
            Value::Boolean(value) => write!(f, "{}", value),
            Value::String(value) => write!(f, "{}", value),
            Value::Null => write!(f, "null"),
            Value::Array(elements) => {
                write!(f, "[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", element)?;
                }
                write!(f, "]")
            }
            Value::Hash(pairs) => {
                write!(f, "{{")?;
                for (i, pair) in pairs.values().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", pair.key, pair.value)?;
                }
                write!(f, "}}")
            }
            Value::Function(func) => write!(f, "CompiledFunction[{:p}]", Rc::as_ptr(func)),
            Value::Closure(closure) => write!(f, "Closure[{:p}]", Rc::as_ptr(closure)),
            Value::Builtin(builtin) => write!(f, "builtin function {}", builtin.name),
            Value::Error(message) => write!(f, "ERROR: {}", message),
        }
    }
}
