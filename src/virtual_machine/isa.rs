//! Instruction Set Architecture (ISA) definitions.
//!
//! The [`for_each_instruction!`](crate::for_each_instruction) macro holds the
//! canonical opcode table and hands it to a callback macro for code
//! generation, so the decoder, the assembler and the static ISA check all read
//! from one list.
//!
//! This module generates:
//! - The [`Instruction`] enum with opcode mappings
//! - `TryFrom<i64>` for decoding opcodes
//! - Mnemonic, category and immediate-count lookups
//!
//! # Bytecode Format
//!
//! A program is a flat sequence of `i64` words. Each instruction is one opcode
//! word, optionally followed by one immediate word:
//!
//! ```text
//! [PUSH] [42] [PUSH] [8] [ADD] [PRINT_I] [HALT]
//! ```
//!
//! Opcode values keep the category in the high byte (`0x01xx` data,
//! `0x02xx` arithmetic, ...).

use crate::virtual_machine::errors::VMError;

/// Invokes a callback macro with the complete instruction definition list.
///
/// Entry format: `Name = opcode, "MNEMONIC", Category => [immediates]`.
#[macro_export]
macro_rules! for_each_instruction {
    ($callback:ident) => {
        $callback! {
            // =========================
            // General
            // =========================
            /// NOP ; no operation, emits a trace event
            Nop = 0x0000, "NOP", General => [],
            /// HALT ; stop execution
            Halt = 0x0001, "HALT", General => [],
            // =========================
            // Data manipulation
            // =========================
            /// PUSH imm ; push imm
            Push = 0x0101, "PUSH", Data => [value: Imm],
            /// POP ; discard top
            Pop = 0x0102, "POP", Data => [],
            /// DUP ; push a copy of top
            Dup = 0x0103, "DUP", Data => [],
            /// LOAD id ; push variable id of the current frame
            Load = 0x0104, "LOAD", Data => [id: Imm],
            /// STORE id ; pop into variable id of the current frame
            Store = 0x0105, "STORE", Data => [id: Imm],
            /// PRINT_I ; pop and emit as decimal text
            PrintI = 0x0199, "PRINT_I", Data => [],
            // =========================
            // Arithmetic
            // =========================
            /// ADD ; pop b, pop a, push a + b
            Add = 0x0201, "ADD", Arithmetic => [],
            /// SUB ; pop b, pop a, push a - b
            Sub = 0x0202, "SUB", Arithmetic => [],
            /// MUL ; pop b, pop a, push a * b
            Mul = 0x0203, "MUL", Arithmetic => [],
            /// DIV ; pop b, pop a, push a / b (fault on zero)
            Div = 0x0204, "DIV", Arithmetic => [],
            /// MOD ; pop b, pop a, push a % b (fault on zero)
            Mod = 0x0205, "MOD", Arithmetic => [],
            // =========================
            // Logic
            // =========================
            /// NOT ; pop a, push a == 0
            Not = 0x0301, "NOT", Logic => [],
            /// AND ; pop b, pop a, push a && b
            And = 0x0302, "AND", Logic => [],
            /// OR ; pop b, pop a, push a || b
            Or = 0x0303, "OR", Logic => [],
            // =========================
            // Comparison
            // =========================
            /// CMP_E ; pop b, pop a, push a == b
            CmpE = 0x0401, "CMP_E", Comparison => [],
            /// CMP_NE ; pop b, pop a, push a != b
            CmpNe = 0x0402, "CMP_NE", Comparison => [],
            /// CMP_G ; pop b, pop a, push a > b
            CmpG = 0x0403, "CMP_G", Comparison => [],
            /// CMP_GE ; pop b, pop a, push a >= b
            CmpGe = 0x0404, "CMP_GE", Comparison => [],
            /// CMP_L ; pop b, pop a, push a < b
            CmpL = 0x0405, "CMP_L", Comparison => [],
            /// CMP_LE ; pop b, pop a, push a <= b
            CmpLe = 0x0406, "CMP_LE", Comparison => [],
            // =========================
            // Control flow
            // =========================
            /// JMP ; pop target, ip = target
            Jmp = 0x0411, "JMP", ControlFlow => [],
            /// JIF ; pop cond, if cond != 0 { pop target, ip = target }
            Jif = 0x0412, "JIF", ControlFlow => [],
        }
    };
}

#[macro_export]
macro_rules! define_instructions {
    (@one Imm) => { 1 };

    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:literal, $mnemonic:literal, $category:ident => [
                $( $field:ident : $kind:ident ),* $(,)?
            ]
        ),* $(,)?
    ) => {
        // =========================
        // VM instruction enum
        // =========================
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        #[repr(i64)]
        pub enum Instruction {
            $(
                $(#[$doc])*
                $name = $opcode,
            )*
        }

        impl TryFrom<i64> for Instruction {
            type Error = VMError;

            fn try_from(value: i64) -> Result<Self, Self::Error> {
                match value {
                    $( $opcode => Ok(Instruction::$name), )*
                    _ => Err(VMError::InvalidInstruction {
                        opcode: value,
                        offset: 0,
                    }),
                }
            }
        }

        impl Instruction {
            /// Every instruction in opcode order.
            pub const ALL: &'static [Instruction] = &[ $( Instruction::$name, )* ];

            /// Returns the opcode word for this instruction.
            pub const fn opcode(&self) -> i64 {
                *self as i64
            }

            /// Returns the assembly mnemonic for this instruction.
            pub const fn mnemonic(&self) -> &'static str {
                match self {
                    $( Instruction::$name => $mnemonic, )*
                }
            }

            /// Returns the category this instruction belongs to.
            pub const fn category(&self) -> Category {
                match self {
                    $( Instruction::$name => Category::$category, )*
                }
            }

            /// Returns how many immediate words follow the opcode.
            pub const fn immediates(&self) -> usize {
                match self {
                    $( Instruction::$name => 0 $( + define_instructions!(@one $kind) )*, )*
                }
            }

            /// Looks up an instruction by its mnemonic (case-insensitive).
            pub fn from_mnemonic(mnemonic: &str) -> Option<Instruction> {
                $(
                    if mnemonic.eq_ignore_ascii_case($mnemonic) {
                        return Some(Instruction::$name);
                    }
                )*
                None
            }
        }
    };
}

for_each_instruction!(define_instructions);

/// Instruction groups, mirroring the high byte of the opcode.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Category {
    General,
    Data,
    Arithmetic,
    Logic,
    Comparison,
    ControlFlow,
}
