//! Abstract Syntax Tree for Monkey.
//!
//! The compiler consumes a pre-built tree; producing one (lexing, parsing)
//! is the embedder's job. Constructor helpers on [`Expr`] and [`Stmt`] keep
//! hand-built programs readable in tests and benchmarks.

pub mod expr;
pub mod stmt;

pub use expr::{Expr, InfixOp, PrefixOp};
pub use stmt::{BlockStmt, Program, Stmt};
