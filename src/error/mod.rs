//! Error types for bytecode encoding, compilation, and execution.

use thiserror::Error;

/// A raw byte that does not name any opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("opcode {0} undefined")]
pub struct UndefinedOpcode(pub u8);

/// Compilation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("undefined variable {0}")]
    UndefinedVariable(String),
}

/// Runtime errors. Any of these aborts the VM's run loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("stack overflow")]
    StackOverflow,

    #[error("frame overflow")]
    FrameOverflow,

    #[error("invalid operand type: {left} {right}")]
    InvalidOperandType {
        left: &'static str,
        right: &'static str,
    },

    #[error("unknown integer operator: {0}")]
    UnknownIntegerOperator(u8),

    #[error("unknown string operator: {0}")]
    UnknownStringOperator(u8),

    #[error("unsupported type for negation: {0}")]
    UnsupportedNegation(&'static str),

    #[error("unknown operator: {0}")]
    UnknownOperator(u8),

    #[error("division by zero")]
    DivisionByZero,

    #[error("invalid hash key: {0}")]
    InvalidHashKey(&'static str),

    #[error("invalid index operator: {0}")]
    InvalidIndexOperator(&'static str),

    #[error("calling non-function and non-builtin")]
    NotCallable,

    #[error("wrong number of args: got={got}, want={want}")]
    WrongNumberOfArgs { want: usize, got: usize },

    #[error("not a function: {0}")]
    NotAFunction(&'static str),

    #[error(transparent)]
    UndefinedOpcode(#[from] UndefinedOpcode),
}

/// A unified error type covering both phases.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonkeyError {
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}
