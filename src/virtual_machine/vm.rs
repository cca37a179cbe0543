//! Core virtual machine implementation.
//!
//! The VM executes a flat `i64` instruction stream against a bounded operand
//! stack and a bounded stack of call frames. Arithmetic wraps on overflow;
//! division and modulo by zero fault.
//!
//! A [`VM`] moves through `Ready → Running → Halted | Faulted` exactly once.
//! Faults stop the loop immediately and leave both stacks as they were at the
//! moment of failure.

mod config;
mod frame;
#[cfg(test)]
mod tests;

pub use config::{FRAME_STACK_CAPACITY, OPERAND_STACK_CAPACITY, VmConfig};
pub use frame::CallFrame;

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Instruction;
use crate::virtual_machine::program::Program;
use crate::virtual_machine::stack::{BoundedStack, StackError};
use crate::virtual_machine::trace::TraceSink;

/// Trace text emitted for an opcode outside the instruction table.
pub const INVALID_OP_TRACE: &str = "INVALID OP";

/// Lifecycle of a single [`VM`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RunState {
    Ready,
    Running,
    Halted,
    Faulted,
}

/// Converts an integer to a boolean under the nonzero-is-true convention.
#[inline]
pub const fn as_bool(v: i64) -> bool {
    v != 0
}

/// Converts a boolean to `1` or `0`.
#[inline]
pub const fn as_int(b: bool) -> i64 {
    if b { 1 } else { 0 }
}

/// Maps a stack failure to the executor fault raised at `ip`.
fn stack_fault(err: StackError, ip: usize) -> VMError {
    match err {
        StackError::Overflow { capacity } => VMError::StackOverflow { ip, capacity },
        StackError::Underflow => VMError::StackUnderflow { ip },
    }
}

macro_rules! exec_vm {
    (
        vm = $vm:ident,
        instr = $instr:ident,
        { $( $($variant:ident)|+ => $handler:ident ( $( $field:ident ),* ) ),* $(,)? }
    ) => {{
        match $instr {
            $(
                $( Instruction::$variant )|+ => {
                    $( let $field = $vm.fetch()?; )*
                    $vm.$handler($instr, $( $field ),*)
                }
            ),*
        }
    }};
}

/// Stack-based bytecode virtual machine.
///
/// Generic over the [`TraceSink`] that receives `NOP`, `HALT`, `PRINT_I` and
/// invalid-opcode events.
pub struct VM<S: TraceSink> {
    /// Instruction stream.
    program: Program,
    /// Index of the next word to fetch.
    ip: usize,
    /// Offset of the opcode currently executing; reported in faults.
    instr_offset: usize,
    /// Operand stack.
    stack: BoundedStack<i64>,
    /// Call frames; the top frame owns the variables `LOAD`/`STORE` address.
    frames: BoundedStack<CallFrame>,
    state: RunState,
    /// Instructions dispatched so far, including invalid ones.
    steps: u64,
    config: VmConfig,
    sink: S,
}

impl<S: TraceSink> VM<S> {
    /// Creates a VM with the default capacities and no step limit.
    pub fn new(program: impl Into<Program>, sink: S) -> Self {
        Self::with_config(program, sink, VmConfig::default())
    }

    /// Creates a VM with explicit capacities and step limit.
    pub fn with_config(program: impl Into<Program>, sink: S, config: VmConfig) -> Self {
        Self {
            program: program.into(),
            ip: 0,
            instr_offset: 0,
            stack: BoundedStack::new(config.operand_stack_capacity),
            frames: BoundedStack::new(config.frame_stack_capacity),
            state: RunState::Ready,
            steps: 0,
            config,
            sink,
        }
    }

    /// Executes the program until `HALT` or a fault.
    ///
    /// Can be called once. Returns `Ok(())` only if the program halted; any
    /// fault is returned as-is and the VM is left in [`RunState::Faulted`].
    pub fn run(&mut self) -> Result<(), VMError> {
        if self.state != RunState::Ready {
            return Err(VMError::AlreadyRun);
        }

        self.ip = 0;
        self.instr_offset = 0;
        self.state = RunState::Running;
        crate::debug!(
            "vm: run start ({} words, stack {}, frames {})",
            self.program.len(),
            self.config.operand_stack_capacity,
            self.config.frame_stack_capacity
        );

        let result = self.execute();
        match &result {
            Ok(()) => {
                crate::debug!("vm: halted after {} instructions", self.steps);
            }
            Err(err) => {
                self.state = RunState::Faulted;
                crate::warn!("vm: faulted after {} instructions: {}", self.steps, err);
            }
        }
        result
    }

    /// Pushes the top-level frame and drives the fetch-execute loop.
    fn execute(&mut self) -> Result<(), VMError> {
        self.frames
            .push(CallFrame::new(0))
            .map_err(|e| stack_fault(e, 0))?;

        while self.state == RunState::Running {
            self.step()?;
        }
        Ok(())
    }

    /// Fetches, decodes and executes one instruction.
    fn step(&mut self) -> Result<(), VMError> {
        if let Some(limit) = self.config.max_steps {
            if self.steps >= limit {
                return Err(VMError::StepLimitExceeded { limit });
            }
        }

        self.instr_offset = self.ip;
        let opcode = self.fetch()?;
        self.steps += 1;

        match Instruction::try_from(opcode) {
            Ok(instr) => self.exec(instr),
            Err(_) => {
                crate::debug!("vm: invalid opcode {opcode:#06x} at ip {}", self.instr_offset);
                self.sink.emit(INVALID_OP_TRACE);
                Ok(())
            }
        }
    }

    /// Reads the word at the instruction pointer and advances past it.
    fn fetch(&mut self) -> Result<i64, VMError> {
        let word = self.program.get(self.ip).ok_or(VMError::InvalidIP {
            ip: i64::try_from(self.ip).unwrap_or(i64::MAX),
        })?;
        self.ip += 1;
        Ok(word)
    }

    /// Executes a decoded instruction, fetching its immediates first.
    fn exec(&mut self, instruction: Instruction) -> Result<(), VMError> {
        exec_vm! {
            vm = self,
            instr = instruction,
            {
                // General
                Nop => op_nop(),
                Halt => op_halt(),
                // Data manipulation
                Push => op_push(value),
                Pop => op_pop(),
                Dup => op_dup(),
                Load => op_load(id),
                Store => op_store(id),
                PrintI => op_print_i(),
                // Arithmetic
                Add => op_add(),
                Sub => op_sub(),
                Mul => op_mul(),
                Div => op_div(),
                Mod => op_mod(),
                // Logic
                Not => op_not(),
                And => op_and(),
                Or => op_or(),
                // Comparison
                CmpE | CmpNe | CmpG | CmpGe | CmpL | CmpLe => op_compare(),
                // Control flow
                Jmp => op_jmp(),
                Jif => op_jif(),
            }
        }
    }

    // ==================== Stack helpers ====================

    fn push(&mut self, value: i64) -> Result<(), VMError> {
        let ip = self.instr_offset;
        self.stack.push(value).map_err(|e| stack_fault(e, ip))
    }

    fn pop(&mut self) -> Result<i64, VMError> {
        let ip = self.instr_offset;
        self.stack.pop().map_err(|e| stack_fault(e, ip))
    }

    /// Pops `b` then `a` and returns `(a, b)`.
    fn pop_operands(&mut self) -> Result<(i64, i64), VMError> {
        let b = self.pop()?;
        let a = self.pop()?;
        Ok((a, b))
    }

    fn top_frame(&self) -> Result<&CallFrame, VMError> {
        self.frames
            .peek()
            .map_err(|e| stack_fault(e, self.instr_offset))
    }

    fn top_frame_mut(&mut self) -> Result<&mut CallFrame, VMError> {
        let ip = self.instr_offset;
        self.frames.peek_mut().map_err(|e| stack_fault(e, ip))
    }

    /// Moves the instruction pointer to an absolute target.
    ///
    /// Negative targets fault here; targets past the end fault at the next fetch.
    fn jump(&mut self, target: i64) -> Result<(), VMError> {
        self.ip = usize::try_from(target).map_err(|_| VMError::InvalidIP { ip: target })?;
        Ok(())
    }

    // ==================== General ====================

    fn op_nop(&mut self, _instr: Instruction) -> Result<(), VMError> {
        self.sink.emit(Instruction::Nop.mnemonic());
        Ok(())
    }

    fn op_halt(&mut self, _instr: Instruction) -> Result<(), VMError> {
        self.sink.emit(Instruction::Halt.mnemonic());
        self.state = RunState::Halted;
        Ok(())
    }

    // ==================== Data manipulation ====================

    fn op_push(&mut self, _instr: Instruction, value: i64) -> Result<(), VMError> {
        self.push(value)
    }

    fn op_pop(&mut self, _instr: Instruction) -> Result<(), VMError> {
        self.pop().map(|_| ())
    }

    fn op_dup(&mut self, _instr: Instruction) -> Result<(), VMError> {
        let ip = self.instr_offset;
        let top = *self.stack.peek().map_err(|e| stack_fault(e, ip))?;
        self.push(top)
    }

    fn op_load(&mut self, _instr: Instruction, id: i64) -> Result<(), VMError> {
        let value = self.top_frame()?.load(id);
        self.push(value)
    }

    fn op_store(&mut self, _instr: Instruction, id: i64) -> Result<(), VMError> {
        let value = self.pop()?;
        self.top_frame_mut()?.store(id, value);
        Ok(())
    }

    fn op_print_i(&mut self, _instr: Instruction) -> Result<(), VMError> {
        let value = self.pop()?;
        self.sink.emit(&value.to_string());
        Ok(())
    }

    // ==================== Arithmetic ====================

    fn op_add(&mut self, _instr: Instruction) -> Result<(), VMError> {
        let (a, b) = self.pop_operands()?;
        self.push(a.wrapping_add(b))
    }

    fn op_sub(&mut self, _instr: Instruction) -> Result<(), VMError> {
        let (a, b) = self.pop_operands()?;
        self.push(a.wrapping_sub(b))
    }

    fn op_mul(&mut self, _instr: Instruction) -> Result<(), VMError> {
        let (a, b) = self.pop_operands()?;
        self.push(a.wrapping_mul(b))
    }

    fn op_div(&mut self, _instr: Instruction) -> Result<(), VMError> {
        let (a, b) = self.pop_operands()?;
        if b == 0 {
            return Err(VMError::DivisionByZero {
                ip: self.instr_offset,
            });
        }
        self.push(a.wrapping_div(b))
    }

    fn op_mod(&mut self, _instr: Instruction) -> Result<(), VMError> {
        let (a, b) = self.pop_operands()?;
        if b == 0 {
            return Err(VMError::DivisionByZero {
                ip: self.instr_offset,
            });
        }
        self.push(a.wrapping_rem(b))
    }

    // ==================== Logic ====================

    fn op_not(&mut self, _instr: Instruction) -> Result<(), VMError> {
        let a = self.pop()?;
        self.push(as_int(!as_bool(a)))
    }

    fn op_and(&mut self, _instr: Instruction) -> Result<(), VMError> {
        let (a, b) = self.pop_operands()?;
        self.push(as_int(as_bool(a) && as_bool(b)))
    }

    fn op_or(&mut self, _instr: Instruction) -> Result<(), VMError> {
        let (a, b) = self.pop_operands()?;
        self.push(as_int(as_bool(a) || as_bool(b)))
    }

    // ==================== Comparison ====================

    fn op_compare(&mut self, instr: Instruction) -> Result<(), VMError> {
        let (a, b) = self.pop_operands()?;
        let result = compare(instr, a, b, self.instr_offset)?;
        self.push(as_int(result))
    }

    // ==================== Control flow ====================

    fn op_jmp(&mut self, _instr: Instruction) -> Result<(), VMError> {
        let target = self.pop()?;
        self.jump(target)
    }

    /// Condition is popped first; the target is only popped when it is taken.
    fn op_jif(&mut self, _instr: Instruction) -> Result<(), VMError> {
        let cond = self.pop()?;
        if as_bool(cond) {
            let target = self.pop()?;
            self.jump(target)?;
        }
        Ok(())
    }

    // ==================== Inspection ====================

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Index of the next word to fetch.
    pub fn ip(&self) -> usize {
        self.ip
    }

    /// Number of instructions dispatched, including invalid opcodes.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Operand stack contents, bottom to top.
    pub fn operand_stack(&self) -> &[i64] {
        self.stack.as_slice()
    }

    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    /// The frame `LOAD`/`STORE` currently address, if a run has started.
    pub fn current_frame(&self) -> Option<&CallFrame> {
        self.frames.peek().ok()
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

/// Evaluates the relation named by a comparison opcode.
///
/// Fails with [`VMError::UnknownComparisonOperator`] for any other opcode.
pub fn compare(instr: Instruction, a: i64, b: i64, ip: usize) -> Result<bool, VMError> {
    Ok(match instr {
        Instruction::CmpE => a == b,
        Instruction::CmpNe => a != b,
        Instruction::CmpG => a > b,
        Instruction::CmpGe => a >= b,
        Instruction::CmpL => a < b,
        Instruction::CmpLe => a <= b,
        other => {
            return Err(VMError::UnknownComparisonOperator {
                opcode: other.opcode(),
                ip,
            });
        }
    })
}
