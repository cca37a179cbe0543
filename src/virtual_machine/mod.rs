//! Stack-based bytecode virtual machine.
//!
//! Programs are flat sequences of `i64` words: opcodes interleaved with their
//! inline immediates. The VM executes them against a bounded operand stack and
//! a bounded stack of call frames holding local variables.
//!
//! # Architecture
//!
//! - **Operand stack**: bounded LIFO of `i64` (default capacity 4096)
//! - **Frames**: bounded LIFO of [`vm::CallFrame`]s (default capacity 256); the
//!   top frame backs `LOAD`/`STORE`
//! - **Booleans**: nonzero is true; logic and comparison results are `0` or `1`
//! - **Faults**: stack underflow/overflow, division by zero and bad jumps stop
//!   the run; unknown opcodes are traced and skipped
//! - **Trace output**: `NOP`, `HALT`, `PRINT_I` and invalid-opcode events go to a
//!   caller-supplied [`trace::TraceSink`]
//!
//! # Modules
//!
//! - [`assembler`]: Mnemonic assembly, diagnostics and disassembly
//! - [`errors`]: Assembly, loading and execution error types
//! - [`isa`]: Instruction set definition and opcode mappings
//! - [`program`]: Instruction stream and its text/binary forms
//! - [`stack`]: Fixed-capacity LIFO container
//! - [`trace`]: Trace sink trait and stock sinks
//! - [`vm`]: Executor, call frames and configuration

pub mod assembler;
pub mod errors;
pub mod isa;
#[cfg(test)]
mod isa_static_check;
pub mod program;
pub mod stack;
pub mod trace;
pub mod vm;
