//! Bytecode compiler: transforms AST into bytecode.

use std::rc::Rc;

use crate::ast::{BlockStmt, Expr, InfixOp, PrefixOp, Program, Stmt};
use crate::bytecode::instruction::{make, Instructions, Opcode};
use crate::bytecode::symbol::{Symbol, SymbolScope, SymbolTable};
use crate::error::CompileError;
use crate::value::{CompiledFunction, Value, BUILTINS};

/// Result type for compilation.
pub type CompileResult<T> = Result<T, CompileError>;

/// Compiler output: the main instruction stream plus the constant pool.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bytecode {
    pub instructions: Instructions,
    pub constants: Vec<Value>,
}

/// An instruction already written to the current scope's buffer.
#[derive(Debug, Clone, Copy)]
struct EmittedInstruction {
    opcode: Opcode,
    position: usize,
}

/// Per-function emission state. Entering a function literal pushes a fresh
/// scope; leaving pops it and hands back the accumulated instructions.
#[derive(Debug, Default)]
struct CompilationScope {
    instructions: Instructions,
    last_instruction: Option<EmittedInstruction>,
    previous_instruction: Option<EmittedInstruction>,
}

/// The bytecode compiler.
pub struct Compiler {
    /// Constant pool, shared by all scopes
    constants: Vec<Value>,
    /// Symbol table of the scope currently being compiled
    symbols: SymbolTable,
    /// Stack of emission scopes; index 0 is the main program
    scopes: Vec<CompilationScope>,
    scope_index: usize,
}

impl Compiler {
    /// Create a new compiler with the builtins pre-defined.
    pub fn new() -> Self {
        let mut symbols = SymbolTable::new();
        for (index, builtin) in BUILTINS.iter().enumerate() {
            symbols.define_builtin(index, builtin.name);
        }

        Self {
            constants: Vec::new(),
            symbols,
            scopes: vec![CompilationScope::default()],
            scope_index: 0,
        }
    }

    /// Create a compiler seeded with an existing symbol table and constant
    /// pool, so a REPL can carry bindings across inputs.
    pub fn new_with_state(symbols: SymbolTable, constants: Vec<Value>) -> Self {
        let mut compiler = Self::new();
        compiler.symbols = symbols;
        compiler.constants = constants;
        compiler
    }

    /// Hand back the symbol table and constant pool for the next
    /// [`Compiler::new_with_state`].
    pub fn into_state(self) -> (SymbolTable, Vec<Value>) {
        (self.symbols, self.constants)
    }

    /// Compile a program into the current scope.
    pub fn compile(&mut self, program: &Program) -> CompileResult<()> {
        for stmt in &program.statements {
            self.compile_statement(stmt)?;
        }
        Ok(())
    }

    /// The main-scope instructions and the constant pool.
    pub fn bytecode(&self) -> Bytecode {
        Bytecode {
            instructions: self.scopes[0].instructions.clone(),
            constants: self.constants.clone(),
        }
    }

    fn compile_statement(&mut self, stmt: &Stmt) -> CompileResult<()> {
        match stmt {
            Stmt::Expression(expr) => {
                self.compile_expression(expr)?;
                self.emit(Opcode::Pop, &[]);
            }

            Stmt::Let { name, value } => {
                // Define before compiling so the initializer can refer to
                // itself (recursive functions).
                let symbol = self.symbols.define(name);
                self.compile_expression(value)?;
                match symbol.scope {
                    SymbolScope::Global => self.emit(Opcode::SetGlobal, &[symbol.index]),
                    _ => self.emit(Opcode::SetLocal, &[symbol.index]),
                };
            }

            Stmt::Return(value) => {
                self.compile_expression(value)?;
                self.emit(Opcode::ReturnValue, &[]);
            }
        }
        Ok(())
    }

    fn compile_block(&mut self, block: &BlockStmt) -> CompileResult<()> {
        for stmt in &block.statements {
            self.compile_statement(stmt)?;
        }
        Ok(())
    }

    fn compile_expression(&mut self, expr: &Expr) -> CompileResult<()> {
        match expr {
            Expr::IntLiteral(value) => {
                let index = self.add_constant(Value::Integer(*value));
                self.emit(Opcode::Constant, &[index]);
            }

            Expr::StringLiteral(value) => {
                let index = self.add_constant(Value::String(Rc::new(value.clone())));
                self.emit(Opcode::Constant, &[index]);
            }

            Expr::BoolLiteral(value) => {
                if *value {
                    self.emit(Opcode::True, &[]);
                } else {
                    self.emit(Opcode::False, &[]);
                }
            }

            Expr::Null => {
                self.emit(Opcode::Null, &[]);
            }

            Expr::Identifier(name) => {
                let symbol = self
                    .symbols
                    .resolve(name)
                    .ok_or_else(|| CompileError::UndefinedVariable(name.clone()))?;
                self.load_symbol(&symbol);
            }

            Expr::Prefix { operator, right } => {
                self.compile_expression(right)?;
                match operator {
                    PrefixOp::Bang => self.emit(Opcode::Bang, &[]),
                    PrefixOp::Minus => self.emit(Opcode::Minus, &[]),
                };
            }

            Expr::Infix {
                left,
                operator,
                right,
            } => {
                // `a < b` compiles as `b > a`; there is no less-than opcode.
                if *operator == InfixOp::Lt {
                    self.compile_expression(right)?;
                    self.compile_expression(left)?;
                    self.emit(Opcode::GreaterThan, &[]);
                    return Ok(());
                }

                self.compile_expression(left)?;
                self.compile_expression(right)?;
                match operator {
                    InfixOp::Add => self.emit(Opcode::Add, &[]),
                    InfixOp::Sub => self.emit(Opcode::Sub, &[]),
                    InfixOp::Mul => self.emit(Opcode::Mul, &[]),
                    InfixOp::Div => self.emit(Opcode::Div, &[]),
                    InfixOp::Eq => self.emit(Opcode::Equal, &[]),
                    InfixOp::NotEq => self.emit(Opcode::NotEqual, &[]),
                    InfixOp::Gt => self.emit(Opcode::GreaterThan, &[]),
                    InfixOp::Lt => unreachable!("handled above"),
                };
            }

            Expr::If {
                condition,
                consequence,
                alternative,
            } => {
                self.compile_expression(condition)?;

                // Placeholder target, patched once the branch size is known.
                let jump_not_truthy = self.emit(Opcode::JumpNotTruthy, &[9999]);

                self.compile_block(consequence)?;
                if self.last_instruction_is(Opcode::Pop) {
                    self.remove_last_pop();
                }

                let jump = self.emit(Opcode::Jump, &[9999]);

                let after_consequence = self.current_instructions().len();
                self.change_operand(jump_not_truthy, after_consequence);

                match alternative {
                    Some(alternative) => {
                        self.compile_block(alternative)?;
                        if self.last_instruction_is(Opcode::Pop) {
                            self.remove_last_pop();
                        }
                    }
                    None => {
                        self.emit(Opcode::Null, &[]);
                    }
                }

                let after_alternative = self.current_instructions().len();
                self.change_operand(jump, after_alternative);
            }

            Expr::Function { parameters, body } => {
                self.enter_scope();

                for parameter in parameters {
                    self.symbols.define(parameter);
                }

                self.compile_block(body)?;

                // The body's final expression becomes the return value; an
                // empty body returns null.
                if self.last_instruction_is(Opcode::Pop) {
                    self.replace_last_pop_with_return();
                }
                if !self.last_instruction_is(Opcode::ReturnValue) {
                    self.emit(Opcode::Return, &[]);
                }

                let free_symbols = self.symbols.free_symbols().to_vec();
                let num_locals = self.symbols.num_definitions();
                let instructions = self.leave_scope();

                // Load each captured value in the enclosing scope, by its
                // original scope, so OpClosure finds them on the stack.
                for symbol in &free_symbols {
                    self.load_symbol(symbol);
                }

                let function = CompiledFunction {
                    instructions,
                    num_locals,
                    num_parameters: parameters.len(),
                };
                let index = self.add_constant(Value::Function(Rc::new(function)));
                self.emit(Opcode::Closure, &[index, free_symbols.len()]);
            }

            Expr::Call {
                function,
                arguments,
            } => {
                self.compile_expression(function)?;
                for argument in arguments {
                    self.compile_expression(argument)?;
                }
                self.emit(Opcode::Call, &[arguments.len()]);
            }

            Expr::Array(elements) => {
                for element in elements {
                    self.compile_expression(element)?;
                }
                self.emit(Opcode::Array, &[elements.len()]);
            }

            Expr::Hash(pairs) => {
                // Source order of hash pairs is arbitrary; sort by the key's
                // rendered text so compilation is deterministic.
                let mut sorted: Vec<&(Expr, Expr)> = pairs.iter().collect();
                sorted.sort_by_key(|(key, _)| key.to_string());

                for (key, value) in sorted {
                    self.compile_expression(key)?;
                    self.compile_expression(value)?;
                }
                self.emit(Opcode::Hash, &[pairs.len() * 2]);
            }

            Expr::Index { left, index } => {
                self.compile_expression(left)?;
                self.compile_expression(index)?;
                self.emit(Opcode::Index, &[]);
            }
        }
        Ok(())
    }

    fn load_symbol(&mut self, symbol: &Symbol) {
        match symbol.scope {
            SymbolScope::Global => self.emit(Opcode::GetGlobal, &[symbol.index]),
            SymbolScope::Local => self.emit(Opcode::GetLocal, &[symbol.index]),
            SymbolScope::Free => self.emit(Opcode::GetFree, &[symbol.index]),
            SymbolScope::Builtin => self.emit(Opcode::GetBuiltin, &[symbol.index]),
        };
    }

    // ===== Scope management =====

    fn enter_scope(&mut self) {
        self.scopes.push(CompilationScope::default());
        self.scope_index += 1;

        let outer = std::mem::take(&mut self.symbols);
        self.symbols = SymbolTable::enclosed(outer);
    }

    fn leave_scope(&mut self) -> Instructions {
        let scope = self.scopes.pop().expect("scope stack underflow");
        self.scope_index -= 1;

        let table = std::mem::take(&mut self.symbols);
        self.symbols = table.into_outer().expect("left the global scope");

        scope.instructions
    }

    /// Index of the scope currently compiled into; 0 is the main program.
    pub fn scope_index(&self) -> usize {
        self.scope_index
    }

    // ===== Bytecode emission =====

    fn emit(&mut self, op: Opcode, operands: &[usize]) -> usize {
        let instruction = make(op, operands);
        let position = self.add_instruction(instruction);
        self.set_last_instruction(op, position);
        position
    }

    fn add_instruction(&mut self, instruction: Vec<u8>) -> usize {
        let scope = &mut self.scopes[self.scope_index];
        let position = scope.instructions.len();
        scope.instructions.extend(instruction);
        position
    }

    fn set_last_instruction(&mut self, opcode: Opcode, position: usize) {
        let scope = &mut self.scopes[self.scope_index];
        scope.previous_instruction = scope.last_instruction;
        scope.last_instruction = Some(EmittedInstruction { opcode, position });
    }

    fn current_instructions(&self) -> &Instructions {
        &self.scopes[self.scope_index].instructions
    }

    fn last_instruction_is(&self, op: Opcode) -> bool {
        self.scopes[self.scope_index]
            .last_instruction
            .map_or(false, |last| last.opcode == op)
    }

    /// Drop a trailing OpPop and roll the descriptor back.
    fn remove_last_pop(&mut self) {
        let scope = &mut self.scopes[self.scope_index];
        let last = scope.last_instruction.expect("no instruction to remove");
        scope.instructions.truncate(last.position);
        scope.last_instruction = scope.previous_instruction;
        scope.previous_instruction = None;
    }

    /// Overwrite the instruction at `position` with a same-length encoding.
    fn replace_instruction(&mut self, position: usize, new_instruction: &[u8]) {
        let instructions = &mut self.scopes[self.scope_index].instructions;
        instructions[position..position + new_instruction.len()]
            .copy_from_slice(new_instruction);
    }

    /// Re-encode the instruction at `position` with a new operand. Only
    /// valid for the opcode already there, which keeps the width unchanged.
    fn change_operand(&mut self, position: usize, operand: usize) {
        let byte = self.current_instructions()[position];
        let op = Opcode::from_u8(byte).expect("patching an undefined opcode");
        let new_instruction = make(op, &[operand]);
        self.replace_instruction(position, &new_instruction);
    }

    fn replace_last_pop_with_return(&mut self) {
        let last = self.scopes[self.scope_index]
            .last_instruction
            .expect("no instruction to replace");
        self.replace_instruction(last.position, &make(Opcode::ReturnValue, &[]));
        self.scopes[self.scope_index]
            .last_instruction
            .replace(EmittedInstruction {
                opcode: Opcode::ReturnValue,
                position: last.position,
            });
    }

    fn add_constant(&mut self, value: Value) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}
