//! The registry of host-provided builtin functions.
//!
//! The registry order is the ABI: `OpGetBuiltin`'s operand is an index into
//! [`BUILTINS`]. Builtins report their own misuse by returning an error
//! value instead of aborting the VM; an absent result becomes null.

use std::rc::Rc;

use crate::value::Value;

/// Signature of a builtin: arguments in, optional result out.
pub type BuiltinFn = fn(&[Value]) -> Option<Value>;

/// A named builtin function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFn,
}

/// All builtins, in registry order.
pub const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "len",
        func: builtin_len,
    },
    Builtin {
        name: "puts",
        func: builtin_puts,
    },
    Builtin {
        name: "first",
        func: builtin_first,
    },
    Builtin {
        name: "last",
        func: builtin_last,
    },
    Builtin {
        name: "rest",
        func: builtin_rest,
    },
    Builtin {
        name: "push",
        func: builtin_push,
    },
];

/// Find a builtin by name.
pub fn lookup(name: &str) -> Option<&'static Builtin> {
    BUILTINS.iter().find(|builtin| builtin.name == name)
}

fn new_error(message: String) -> Option<Value> {
    Some(Value::Error(Rc::new(message)))
}

fn builtin_len(args: &[Value]) -> Option<Value> {
    if args.len() != 1 {
        return new_error(format!("wrong number of arguments: got={}, want=1", args.len()));
    }
    match &args[0] {
        Value::Array(elements) => Some(Value::Integer(elements.len() as i64)),
        Value::String(value) => Some(Value::Integer(value.len() as i64)),
        other => new_error(format!("unsupported type for len(): {}", other.type_name())),
    }
}

fn builtin_puts(args: &[Value]) -> Option<Value> {
    for arg in args {
        println!("{}", arg);
    }
    None
}

fn builtin_first(args: &[Value]) -> Option<Value> {
    if args.len() != 1 {
        return new_error(format!("wrong number of arguments: got={}, want=1", args.len()));
    }
    match &args[0] {
        Value::Array(elements) => elements.first().cloned().or(Some(Value::Null)),
        other => new_error(format!(
            "argument to first must be an Array: got {}",
            other.type_name()
        )),
    }
}

fn builtin_last(args: &[Value]) -> Option<Value> {
    if args.len() != 1 {
        return new_error(format!("wrong number of arguments: got={}, want=1", args.len()));
    }
    match &args[0] {
        Value::Array(elements) => elements.last().cloned().or(Some(Value::Null)),
        other => new_error(format!(
            "argument to last must be an Array: got {}",
            other.type_name()
        )),
    }
}

fn builtin_rest(args: &[Value]) -> Option<Value> {
    if args.len() != 1 {
        return new_error(format!("wrong number of arguments: got={}, want=1", args.len()));
    }
    match &args[0] {
        Value::Array(elements) if !elements.is_empty() => {
            Some(Value::Array(Rc::new(elements[1..].to_vec())))
        }
        Value::Array(_) => Some(Value::Null),
        other => new_error(format!(
            "argument to rest must be an Array: got {}",
            other.type_name()
        )),
    }
}

fn builtin_push(args: &[Value]) -> Option<Value> {
    if args.len() != 2 {
        return new_error(format!("wrong number of arguments: got={}, want=2", args.len()));
    }
    match &args[0] {
        Value::Array(elements) => {
            let mut new_elements = elements.as_ref().clone();
            new_elements.push(args[1].clone());
            Some(Value::Array(Rc::new(new_elements)))
        }
        other => new_error(format!(
            "argument to push must be an Array: got {}",
            other.type_name()
        )),
    }
}
