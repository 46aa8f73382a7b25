//! Stack-based virtual machine for executing bytecode.

use std::rc::Rc;

use crate::bytecode::compiler::Bytecode;
use crate::bytecode::instruction::{read_u16, read_u8, Opcode};
use crate::error::RuntimeError;
use crate::value::{Builtin, Closure, CompiledFunction, HashPair, HashPairs, Value, BUILTINS};

/// Maximum depth of the value stack.
pub const STACK_SIZE: usize = 2048;
/// Number of global binding slots.
pub const GLOBALS_SIZE: usize = 65536;
/// Maximum depth of the call-frame stack.
pub const MAX_FRAMES: usize = 1024;

/// Result type for VM operations.
pub type VmResult<T> = Result<T, RuntimeError>;

/// A call frame: one function invocation in flight.
#[derive(Debug, Clone)]
struct Frame {
    /// The closure being executed
    closure: Rc<Closure>,
    /// Instruction pointer into the closure's instructions
    ip: usize,
    /// Base pointer: where this frame's locals start on the value stack
    bp: usize,
}

impl Frame {
    fn new(closure: Rc<Closure>, bp: usize) -> Self {
        Self { closure, ip: 0, bp }
    }

    fn instructions(&self) -> &[u8] {
        &self.closure.func.instructions
    }
}

/// The virtual machine.
#[derive(Debug)]
pub struct Vm {
    constants: Vec<Value>,

    /// Fixed-size value stack; `sp` points at the next free slot, so the top
    /// of the stack is `stack[sp - 1]`. Popped slots keep their value, which
    /// is what makes [`Vm::last_popped`] observable.
    stack: Vec<Value>,
    sp: usize,

    globals: Vec<Value>,

    frames: Vec<Frame>,
}

impl Vm {
    /// Create a VM for the given bytecode. The main program runs inside
    /// frame 0, whose closure wraps the top-level instructions.
    pub fn new(bytecode: Bytecode) -> Self {
        let main_function = CompiledFunction {
            instructions: bytecode.instructions,
            num_locals: 0,
            num_parameters: 0,
        };
        let main_closure = Closure {
            func: Rc::new(main_function),
            free: Vec::new(),
        };

        let mut frames = Vec::with_capacity(MAX_FRAMES);
        frames.push(Frame::new(Rc::new(main_closure), 0));

        Self {
            constants: bytecode.constants,
            stack: vec![Value::Null; STACK_SIZE],
            sp: 0,
            globals: vec![Value::Null; GLOBALS_SIZE],
            frames,
        }
    }

    /// Create a VM that reuses an existing global store, so a REPL can carry
    /// bindings across inputs. One VM at a time owns the store.
    pub fn new_with_globals(bytecode: Bytecode, globals: Vec<Value>) -> Self {
        let mut vm = Self::new(bytecode);
        vm.globals = globals;
        vm
    }

    /// Hand the global store back for the next [`Vm::new_with_globals`].
    pub fn into_globals(self) -> Vec<Value> {
        self.globals
    }

    /// Execute until the main frame runs out of instructions. Any runtime
    /// error aborts execution immediately.
    pub fn run(&mut self) -> VmResult<()> {
        while self.current_frame().ip < self.current_frame().instructions().len() {
            let byte = {
                let frame = self.current_frame_mut();
                let byte = frame.closure.func.instructions[frame.ip];
                frame.ip += 1;
                byte
            };
            let op = Opcode::from_u8(byte)
                .ok_or(crate::error::UndefinedOpcode(byte))?;

            match op {
                Opcode::Constant => {
                    let index = self.read_u16_operand();
                    let constant = self.constants[index].clone();
                    self.push(constant)?;
                }

                Opcode::Pop => {
                    self.pop();
                }

                Opcode::True => self.push(Value::Boolean(true))?,
                Opcode::False => self.push(Value::Boolean(false))?,
                Opcode::Null => self.push(Value::Null)?,

                Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div => {
                    self.execute_binary_operation(op)?;
                }

                Opcode::Equal | Opcode::NotEqual | Opcode::GreaterThan => {
                    self.execute_comparison(op)?;
                }

                Opcode::Bang => {
                    let operand = self.pop();
                    self.push(Value::Boolean(!operand.is_truthy()))?;
                }

                Opcode::Minus => {
                    let operand = self.pop();
                    match operand {
                        Value::Integer(value) => {
                            self.push(Value::Integer(value.wrapping_neg()))?
                        }
                        other => {
                            return Err(RuntimeError::UnsupportedNegation(other.type_name()))
                        }
                    }
                }

                Opcode::Jump => {
                    let target = self.read_u16_operand();
                    self.current_frame_mut().ip = target;
                }

                Opcode::JumpNotTruthy => {
                    let target = self.read_u16_operand();
                    let condition = self.pop();
                    if !condition.is_truthy() {
                        self.current_frame_mut().ip = target;
                    }
                }

                Opcode::SetGlobal => {
                    let index = self.read_u16_operand();
                    self.globals[index] = self.pop();
                }

                Opcode::GetGlobal => {
                    let index = self.read_u16_operand();
                    let value = self.globals[index].clone();
                    self.push(value)?;
                }

                Opcode::SetLocal => {
                    let index = self.read_u8_operand();
                    let bp = self.current_frame().bp;
                    self.stack[bp + index] = self.pop();
                }

                Opcode::GetLocal => {
                    let index = self.read_u8_operand();
                    let bp = self.current_frame().bp;
                    let value = self.stack[bp + index].clone();
                    self.push(value)?;
                }

                Opcode::GetBuiltin => {
                    let index = self.read_u8_operand();
                    self.push(Value::Builtin(BUILTINS[index]))?;
                }

                Opcode::GetFree => {
                    let index = self.read_u8_operand();
                    let value = self.current_frame().closure.free[index].clone();
                    self.push(value)?;
                }

                Opcode::Array => {
                    let count = self.read_u16_operand();
                    let array = self.build_array(self.sp - count, self.sp);
                    self.sp -= count;
                    self.push(array)?;
                }

                Opcode::Hash => {
                    let count = self.read_u16_operand();
                    let hash = self.build_hash(self.sp - count, self.sp)?;
                    self.sp -= count;
                    self.push(hash)?;
                }

                Opcode::Index => {
                    let index = self.pop();
                    let left = self.pop();
                    self.execute_index_expression(left, index)?;
                }

                Opcode::Call => {
                    let num_args = self.read_u8_operand();
                    self.execute_call(num_args)?;
                }

                Opcode::ReturnValue => {
                    let return_value = self.pop();
                    let frame = self.frames.pop().expect("frame stack underflow");
                    // Dropping to bp - 1 discards the locals, the arguments,
                    // and the callee in one move.
                    self.sp = frame.bp - 1;
                    self.push(return_value)?;
                }

                Opcode::Return => {
                    let frame = self.frames.pop().expect("frame stack underflow");
                    self.sp = frame.bp - 1;
                    self.push(Value::Null)?;
                }

                Opcode::Closure => {
                    let const_index = self.read_u16_operand();
                    let num_free = self.read_u8_operand();
                    self.push_closure(const_index, num_free)?;
                }
            }
        }
        Ok(())
    }

    /// The current top of the stack, if any.
    pub fn stack_top(&self) -> Option<&Value> {
        if self.sp == 0 {
            None
        } else {
            Some(&self.stack[self.sp - 1])
        }
    }

    /// The value most recently popped. A program whose final statement ended
    /// in OpPop leaves its result here.
    pub fn last_popped(&self) -> &Value {
        &self.stack[self.sp]
    }

    // ===== Handlers =====

    fn execute_binary_operation(&mut self, op: Opcode) -> VmResult<()> {
        let right = self.pop();
        let left = self.pop();

        match (&left, &right) {
            (Value::Integer(left), Value::Integer(right)) => {
                self.execute_binary_integer_operation(op, *left, *right)
            }
            (Value::String(left), Value::String(right)) => {
                if op != Opcode::Add {
                    return Err(RuntimeError::UnknownStringOperator(op as u8));
                }
                let concatenated = format!("{}{}", left, right);
                self.push(Value::String(Rc::new(concatenated)))
            }
            _ => Err(RuntimeError::InvalidOperandType {
                left: left.type_name(),
                right: right.type_name(),
            }),
        }
    }

    fn execute_binary_integer_operation(
        &mut self,
        op: Opcode,
        left: i64,
        right: i64,
    ) -> VmResult<()> {
        let result = match op {
            Opcode::Add => left.wrapping_add(right),
            Opcode::Sub => left.wrapping_sub(right),
            Opcode::Mul => left.wrapping_mul(right),
            Opcode::Div => {
                if right == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                left.wrapping_div(right)
            }
            _ => return Err(RuntimeError::UnknownIntegerOperator(op as u8)),
        };
        self.push(Value::Integer(result))
    }

    fn execute_comparison(&mut self, op: Opcode) -> VmResult<()> {
        let right = self.pop();
        let left = self.pop();

        if let (Value::Integer(left), Value::Integer(right)) = (&left, &right) {
            let result = match op {
                Opcode::Equal => left == right,
                Opcode::NotEqual => left != right,
                Opcode::GreaterThan => left > right,
                _ => return Err(RuntimeError::UnknownOperator(op as u8)),
            };
            return self.push(Value::Boolean(result));
        }

        // Non-integer operands compare by object identity.
        match op {
            Opcode::Equal => self.push(Value::Boolean(left.same_identity(&right))),
            Opcode::NotEqual => self.push(Value::Boolean(!left.same_identity(&right))),
            _ => Err(RuntimeError::UnknownOperator(op as u8)),
        }
    }

    fn build_array(&self, start: usize, end: usize) -> Value {
        Value::Array(Rc::new(self.stack[start..end].to_vec()))
    }

    fn build_hash(&self, start: usize, end: usize) -> VmResult<Value> {
        let mut pairs = HashPairs::with_capacity((end - start) / 2);
        let mut index = start;
        while index < end {
            let key = self.stack[index].clone();
            let value = self.stack[index + 1].clone();
            let hash_key = key
                .hash_key()
                .ok_or_else(|| RuntimeError::InvalidHashKey(key.type_name()))?;
            pairs.insert(hash_key, HashPair { key, value });
            index += 2;
        }
        Ok(Value::Hash(Rc::new(pairs)))
    }

    fn execute_index_expression(&mut self, left: Value, index: Value) -> VmResult<()> {
        match (&left, &index) {
            (Value::Array(elements), Value::Integer(index)) => {
                let max = elements.len() as i64 - 1;
                if *index < 0 || *index > max {
                    return self.push(Value::Null);
                }
                let value = elements[*index as usize].clone();
                self.push(value)
            }
            (Value::Hash(pairs), _) => {
                let key = index
                    .hash_key()
                    .ok_or_else(|| RuntimeError::InvalidHashKey(index.type_name()))?;
                match pairs.get(&key) {
                    Some(pair) => {
                        let value = pair.value.clone();
                        self.push(value)
                    }
                    None => self.push(Value::Null),
                }
            }
            _ => Err(RuntimeError::InvalidIndexOperator(left.type_name())),
        }
    }

    fn execute_call(&mut self, num_args: usize) -> VmResult<()> {
        let callee = self.stack[self.sp - 1 - num_args].clone();
        match callee {
            Value::Closure(closure) => self.call_closure(closure, num_args),
            Value::Builtin(builtin) => self.call_builtin(builtin, num_args),
            _ => Err(RuntimeError::NotCallable),
        }
    }

    fn call_closure(&mut self, closure: Rc<Closure>, num_args: usize) -> VmResult<()> {
        if num_args != closure.func.num_parameters {
            return Err(RuntimeError::WrongNumberOfArgs {
                want: closure.func.num_parameters,
                got: num_args,
            });
        }
        if self.frames.len() >= MAX_FRAMES {
            return Err(RuntimeError::FrameOverflow);
        }

        let bp = self.sp - num_args;
        let num_locals = closure.func.num_locals;
        if bp + num_locals > STACK_SIZE {
            return Err(RuntimeError::StackOverflow);
        }

        self.frames.push(Frame::new(closure, bp));
        // The arguments already sit in the first local slots; reserve the
        // rest above them.
        self.sp = bp + num_locals;
        Ok(())
    }

    fn call_builtin(&mut self, builtin: Builtin, num_args: usize) -> VmResult<()> {
        let args = &self.stack[self.sp - num_args..self.sp];
        let result = (builtin.func)(args);

        // Discard the arguments and the callee.
        self.sp = self.sp - num_args - 1;
        match result {
            Some(value) => self.push(value),
            None => self.push(Value::Null),
        }
    }

    fn push_closure(&mut self, const_index: usize, num_free: usize) -> VmResult<()> {
        let constant = self.constants[const_index].clone();
        let func = match constant {
            Value::Function(func) => func,
            other => return Err(RuntimeError::NotAFunction(other.type_name())),
        };

        let free = self.stack[self.sp - num_free..self.sp].to_vec();
        self.sp -= num_free;

        self.push(Value::Closure(Rc::new(Closure { func, free })))
    }

    // ===== Stack and frame plumbing =====

    fn current_frame(&self) -> &Frame {
        self.frames.last().expect("no active frame")
    }

    fn current_frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("no active frame")
    }

    fn read_u16_operand(&mut self) -> usize {
        let frame = self.current_frame_mut();
        let value = read_u16(&frame.closure.func.instructions[frame.ip..]);
        frame.ip += 2;
        value as usize
    }

    fn read_u8_operand(&mut self) -> usize {
        let frame = self.current_frame_mut();
        let value = read_u8(&frame.closure.func.instructions[frame.ip..]);
        frame.ip += 1;
        value as usize
    }

    fn push(&mut self, value: Value) -> VmResult<()> {
        if self.sp >= STACK_SIZE {
            return Err(RuntimeError::StackOverflow);
        }
        self.stack[self.sp] = value;
        self.sp += 1;
        Ok(())
    }

    fn pop(&mut self) -> Value {
        self.sp -= 1;
        self.stack[self.sp].clone()
    }
}
