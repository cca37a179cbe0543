//! stackvm library.
//!
//! Provides a bounded, stack-based bytecode virtual machine together with the
//! tooling around it: program loading, a mnemonic assembler and a logger.

pub mod utils;
pub mod virtual_machine;
