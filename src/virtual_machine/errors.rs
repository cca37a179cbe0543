use stackvm_derive::Error;

/// Errors produced while loading, assembling or executing a program.
///
/// Executor faults carry `ip`, the offset of the opcode that was being
/// executed when the fault was raised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VMError {
    /// Pop or peek on an empty operand or frame stack.
    #[error("stack underflow at ip {ip}")]
    StackUnderflow { ip: usize },
    /// Push onto a full operand or frame stack.
    #[error("stack overflow at ip {ip} (capacity {capacity})")]
    StackOverflow { ip: usize, capacity: usize },
    /// Division or modulo by zero.
    #[error("division by zero at ip {ip}")]
    DivisionByZero { ip: usize },
    /// A comparison opcode reached the relation evaluator without a matching relation.
    #[error("unknown comparison operator {opcode:#06x} at ip {ip}")]
    UnknownComparisonOperator { opcode: i64, ip: usize },
    /// Instruction pointer outside the instruction stream.
    #[error("invalid instruction pointer {ip}")]
    InvalidIP { ip: i64 },
    /// Configured instruction budget exhausted.
    #[error("step limit of {limit} instructions exceeded")]
    StepLimitExceeded { limit: u64 },
    /// `run` called on an executor that already left the ready state.
    #[error("executor has already run")]
    AlreadyRun,
    /// Word that does not decode to any known opcode.
    #[error("invalid instruction {opcode:#06x} at offset {offset}")]
    InvalidInstruction { opcode: i64, offset: usize },
    /// Unrecognized mnemonic during assembly.
    #[error("invalid instruction name: {name}")]
    InvalidInstructionName { name: String },
    /// Wrong number of operands for an instruction.
    #[error("{instruction} expects {expected} operand(s), got {actual}")]
    ArityMismatch {
        instruction: &'static str,
        expected: usize,
        actual: usize,
    },
    /// Malformed token with source location.
    #[error("line {line}:{offset}: {message}")]
    ParseError {
        line: usize,
        offset: usize,
        message: String,
    },
    /// Instruction-level assembly failure with source location.
    #[error("line {line}:{offset}: {source}")]
    AssemblyError {
        line: usize,
        offset: usize,
        source: String,
    },
    /// Label defined more than once.
    #[error("line {line}: duplicate label: {label}")]
    DuplicateLabel { line: usize, label: String },
    /// Reference to an undefined label.
    #[error("line {line}: undefined label: {label}")]
    UndefinedLabel { line: usize, label: String },
    /// Program file could not be decoded.
    #[error("decoding error: {reason}")]
    DecodeError { reason: String },
    /// File I/O error while loading a program.
    #[error("io error on {path}: {source}")]
    IoError { path: String, source: String },
}

impl VMError {
    /// Returns true for errors raised by the executor that end a run.
    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            VMError::StackUnderflow { .. }
                | VMError::StackOverflow { .. }
                | VMError::DivisionByZero { .. }
                | VMError::UnknownComparisonOperator { .. }
                | VMError::InvalidIP { .. }
                | VMError::StepLimitExceeded { .. }
        )
    }
}
