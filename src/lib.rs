//! Monkeylang: a bytecode compiler and stack-based virtual machine for the
//! Monkey language.
//!
//! The crate consumes a pre-built AST (lexing and parsing live with the
//! embedder) and runs it in two stages:
//!
//! - **Compiler**: a single-pass walk that lowers the tree into a flat
//!   instruction stream plus a constant pool, resolving identifiers through
//!   nested symbol tables.
//! - **VM**: a stack machine with fixed-size value, global, and frame
//!   stacks; every function runs as a closure over its captured free
//!   variables.

pub mod ast;
pub mod bytecode;
pub mod error;
pub mod value;

pub use bytecode::{Bytecode, Compiler, Vm};
pub use error::MonkeyError;
pub use value::Value;

/// Compile a program into bytecode.
pub fn compile(program: &ast::Program) -> Result<Bytecode, error::CompileError> {
    let mut compiler = Compiler::new();
    compiler.compile(program)?;
    Ok(compiler.bytecode())
}

/// Compile and execute a program, returning the value of its final
/// statement.
pub fn run(program: &ast::Program) -> Result<Value, MonkeyError> {
    let bytecode = compile(program)?;
    let mut vm = Vm::new(bytecode);
    vm.run()?;
    Ok(vm.last_popped().clone())
}

/// Render compiled instructions as human-readable assembly.
pub fn disassemble(bytecode: &Bytecode) -> String {
    bytecode::disassemble(&bytecode.instructions)
}
