use super::*;
use crate::virtual_machine::assembler::assemble_source;
use crate::virtual_machine::trace::BufferSink;

const NOP: i64 = Instruction::Nop as i64;
const HALT: i64 = Instruction::Halt as i64;
const PUSH: i64 = Instruction::Push as i64;
const POP: i64 = Instruction::Pop as i64;
const DUP: i64 = Instruction::Dup as i64;
const LOAD: i64 = Instruction::Load as i64;
const STORE: i64 = Instruction::Store as i64;
const PRINT_I: i64 = Instruction::PrintI as i64;
const ADD: i64 = Instruction::Add as i64;
const SUB: i64 = Instruction::Sub as i64;
const MUL: i64 = Instruction::Mul as i64;
const DIV: i64 = Instruction::Div as i64;
const MOD: i64 = Instruction::Mod as i64;
const NOT: i64 = Instruction::Not as i64;
const AND: i64 = Instruction::And as i64;
const OR: i64 = Instruction::Or as i64;
const CMP_L: i64 = Instruction::CmpL as i64;
const JMP: i64 = Instruction::Jmp as i64;
const JIF: i64 = Instruction::Jif as i64;

fn run_vm(words: &[i64]) -> VM<BufferSink> {
    let mut vm = VM::new(words, BufferSink::new());
    vm.run().expect("vm run failed");
    vm
}

fn run_program(words: &[i64]) -> Vec<String> {
    run_vm(words).into_sink().into_events()
}

fn run_expect_err(words: &[i64]) -> VMError {
    let mut vm = VM::new(words, BufferSink::new());
    let err = vm.run().expect_err("expected fault");
    assert_eq!(vm.state(), RunState::Faulted);
    err
}

fn run_asm(source: &str) -> Vec<String> {
    let program = assemble_source(source).expect("assembly failed");
    let mut vm = VM::new(program, BufferSink::new());
    vm.run().expect("vm run failed");
    vm.into_sink().into_events()
}

/// Runs `a <op> b` and returns the printed result.
fn binary(op: i64, a: i64, b: i64) -> String {
    let events = run_program(&[PUSH, a, PUSH, b, op, PRINT_I, HALT]);
    events[0].clone()
}

// ==================== End-to-end ====================

#[test]
fn variables_feed_arithmetic() {
    let vm = run_vm(&[
        PUSH, 100, STORE, 0, PUSH, 200, STORE, 1, PUSH, 300, LOAD, 1, ADD, PRINT_I, HALT,
    ]);
    assert_eq!(vm.state(), RunState::Halted);
    assert_eq!(vm.sink().events(), ["500", "HALT"]);
}

#[test]
fn less_than_prints_one() {
    assert_eq!(run_program(&[PUSH, 4, PUSH, 5, CMP_L, PRINT_I, HALT]), ["1", "HALT"]);
}

#[test]
fn subtraction_prints_difference() {
    assert_eq!(run_program(&[PUSH, 10, PUSH, 5, SUB, PRINT_I, HALT]), ["5", "HALT"]);
}

#[test]
fn division_by_zero_stops_the_run() {
    let mut vm = VM::new([PUSH, 1, PUSH, 0, DIV, PUSH, 7, PRINT_I, HALT].as_slice(), BufferSink::new());
    assert_eq!(vm.run(), Err(VMError::DivisionByZero { ip: 4 }));
    assert_eq!(vm.state(), RunState::Faulted);
    assert!(vm.sink().events().is_empty());
    assert_eq!(vm.steps(), 3);
}

#[test]
fn operand_stack_overflows_at_capacity() {
    let mut words = Vec::new();
    for _ in 0..=OPERAND_STACK_CAPACITY {
        words.extend_from_slice(&[PUSH, 0]);
    }
    let mut vm = VM::new(words, BufferSink::new());
    assert_eq!(
        vm.run(),
        Err(VMError::StackOverflow {
            ip: 2 * OPERAND_STACK_CAPACITY,
            capacity: OPERAND_STACK_CAPACITY,
        })
    );
    assert_eq!(vm.operand_stack().len(), OPERAND_STACK_CAPACITY);
}

#[test]
fn countdown_loop() {
    let events = run_asm(
        r#"
                PUSH 3
                STORE 0
        loop:   LOAD 0
                PRINT_I
                PUSH @loop
                LOAD 0
                PUSH 1
                SUB
                DUP
                STORE 0
                JIF
                POP
                HALT
        "#,
    );
    assert_eq!(events, ["3", "2", "1", "HALT"]);
}

// ==================== Data manipulation ====================

#[test]
fn stack_is_lifo() {
    assert_eq!(
        run_program(&[PUSH, 1, PUSH, 2, PUSH, 3, PRINT_I, PRINT_I, PRINT_I, HALT]),
        ["3", "2", "1", "HALT"]
    );
}

#[test]
fn pop_discards_top() {
    let vm = run_vm(&[PUSH, 1, PUSH, 2, POP, HALT]);
    assert_eq!(vm.operand_stack(), [1]);
}

#[test]
fn dup_copies_top() {
    let vm = run_vm(&[PUSH, 9, DUP, HALT]);
    assert_eq!(vm.operand_stack(), [9, 9]);
}

#[test]
fn load_of_unset_variable_is_zero() {
    assert_eq!(run_program(&[LOAD, 42, PRINT_I, HALT]), ["0", "HALT"]);
}

#[test]
fn store_then_load_any_id() {
    let vm = run_vm(&[PUSH, 5, STORE, -3, PUSH, 6, STORE, i64::MAX, LOAD, -3, LOAD, i64::MAX, HALT]);
    assert_eq!(vm.operand_stack(), [5, 6]);
    let frame = vm.current_frame().expect("frame");
    assert_eq!(frame.variable_count(), 2);
    assert_eq!(frame.return_address(), 0);
}

#[test]
fn store_overwrites() {
    assert_eq!(
        run_program(&[PUSH, 1, STORE, 0, PUSH, 2, STORE, 0, LOAD, 0, PRINT_I, HALT]),
        ["2", "HALT"]
    );
}

#[test]
fn nop_and_halt_are_traced() {
    assert_eq!(run_program(&[NOP, NOP, HALT]), ["NOP", "NOP", "HALT"]);
}

#[test]
fn halt_stops_before_trailing_words() {
    let vm = run_vm(&[HALT, PUSH, 1, PRINT_I]);
    assert_eq!(vm.sink().events(), ["HALT"]);
    assert_eq!(vm.ip(), 1);
    assert!(vm.operand_stack().is_empty());
}

// ==================== Arithmetic ====================

#[test]
fn operand_order() {
    assert_eq!(binary(SUB, 3, 10), "-7");
    assert_eq!(binary(DIV, 20, 4), "5");
    assert_eq!(binary(MOD, 20, 6), "2");
    assert_eq!(binary(MUL, -3, 4), "-12");
}

#[test]
fn division_truncates_toward_zero() {
    assert_eq!(binary(DIV, -7, 2), "-3");
    assert_eq!(binary(MOD, -7, 2), "-1");
    assert_eq!(binary(MOD, 7, -2), "1");
}

#[test]
fn arithmetic_wraps() {
    assert_eq!(binary(ADD, i64::MAX, 1), i64::MIN.to_string());
    assert_eq!(binary(SUB, i64::MIN, 1), i64::MAX.to_string());
    assert_eq!(binary(MUL, i64::MAX, 2), "-2");
    assert_eq!(binary(DIV, i64::MIN, -1), i64::MIN.to_string());
    assert_eq!(binary(MOD, i64::MIN, -1), "0");
}

#[test]
fn modulo_by_zero_faults() {
    assert_eq!(
        run_expect_err(&[PUSH, 5, PUSH, 0, MOD]),
        VMError::DivisionByZero { ip: 4 }
    );
}

// ==================== Logic ====================

#[test]
fn logic_yields_zero_or_one() {
    assert_eq!(run_program(&[PUSH, 0, NOT, PRINT_I, HALT])[0], "1");
    assert_eq!(run_program(&[PUSH, -5, NOT, PRINT_I, HALT])[0], "0");
    assert_eq!(binary(AND, 2, 3), "1");
    assert_eq!(binary(AND, 0, 7), "0");
    assert_eq!(binary(OR, 0, -4), "1");
    assert_eq!(binary(OR, 0, 0), "0");
}

// ==================== Comparison ====================

#[test]
fn comparisons() {
    let cases = [
        (Instruction::CmpE, 3, 3, "1"),
        (Instruction::CmpE, 3, 4, "0"),
        (Instruction::CmpNe, 3, 4, "1"),
        (Instruction::CmpNe, 3, 3, "0"),
        (Instruction::CmpG, 5, 4, "1"),
        (Instruction::CmpG, 4, 4, "0"),
        (Instruction::CmpGe, 4, 4, "1"),
        (Instruction::CmpGe, -1, 0, "0"),
        (Instruction::CmpL, -2, 1, "1"),
        (Instruction::CmpL, 1, 1, "0"),
        (Instruction::CmpLe, 1, 1, "1"),
        (Instruction::CmpLe, 2, 1, "0"),
    ];
    for (instr, a, b, expected) in cases {
        assert_eq!(binary(instr.opcode(), a, b), expected, "{} {a} {b}", instr.mnemonic());
    }
}

#[test]
fn compare_rejects_non_comparison_opcode() {
    assert_eq!(
        compare(Instruction::Add, 1, 2, 9),
        Err(VMError::UnknownComparisonOperator {
            opcode: Instruction::Add.opcode(),
            ip: 9,
        })
    );
}

// ==================== Control flow ====================

#[test]
fn jmp_to_absolute_target() {
    // 0: PUSH 6, 2: JMP, 3: PUSH 1, 5: PRINT_I, 6: HALT
    assert_eq!(run_program(&[PUSH, 6, JMP, PUSH, 1, PRINT_I, HALT]), ["HALT"]);
}

#[test]
fn jif_taken_pops_target() {
    // 0: PUSH 8, 2: PUSH 1, 4: JIF, 5: PUSH 111, 7: PRINT_I, 8: HALT
    let vm = run_vm(&[PUSH, 8, PUSH, 1, JIF, PUSH, 111, PRINT_I, HALT]);
    assert_eq!(vm.sink().events(), ["HALT"]);
    assert!(vm.operand_stack().is_empty());
}

#[test]
fn jif_not_taken_leaves_target() {
    let vm = run_vm(&[PUSH, 99, PUSH, 0, JIF, HALT]);
    assert_eq!(vm.operand_stack(), [99]);
}

#[test]
fn jif_not_taken_needs_only_condition() {
    let vm = run_vm(&[PUSH, 0, JIF, HALT]);
    assert!(vm.operand_stack().is_empty());
}

#[test]
fn negative_jump_target_faults() {
    assert_eq!(run_expect_err(&[PUSH, -1, JMP]), VMError::InvalidIP { ip: -1 });
}

#[test]
fn jump_past_end_faults_on_fetch() {
    assert_eq!(run_expect_err(&[PUSH, 100, JMP]), VMError::InvalidIP { ip: 100 });
}

#[test]
fn running_off_the_end_faults() {
    assert_eq!(run_expect_err(&[PUSH, 1]), VMError::InvalidIP { ip: 2 });
    assert_eq!(run_expect_err(&[]), VMError::InvalidIP { ip: 0 });
}

#[test]
fn missing_immediate_faults() {
    assert_eq!(run_expect_err(&[PUSH]), VMError::InvalidIP { ip: 1 });
}

// ==================== Faults ====================

#[test]
fn underflow_reports_opcode_offset() {
    assert_eq!(run_expect_err(&[POP]), VMError::StackUnderflow { ip: 0 });
    assert_eq!(run_expect_err(&[DUP]), VMError::StackUnderflow { ip: 0 });
    assert_eq!(run_expect_err(&[PUSH, 1, ADD]), VMError::StackUnderflow { ip: 2 });
    assert_eq!(run_expect_err(&[NOP, PRINT_I]), VMError::StackUnderflow { ip: 1 });
    assert_eq!(run_expect_err(&[PUSH, 1, JIF]), VMError::StackUnderflow { ip: 2 });
    assert_eq!(run_expect_err(&[STORE, 0]), VMError::StackUnderflow { ip: 0 });
}

#[test]
fn small_operand_stack_overflows() {
    let config = VmConfig::default().with_operand_stack_capacity(2);
    let mut vm = VM::with_config([PUSH, 1, PUSH, 2, PUSH, 3].as_slice(), BufferSink::new(), config);
    assert_eq!(vm.run(), Err(VMError::StackOverflow { ip: 4, capacity: 2 }));
    assert_eq!(vm.operand_stack(), [1, 2]);
}

#[test]
fn zero_frame_capacity_faults_before_first_fetch() {
    let config = VmConfig::default().with_frame_stack_capacity(0);
    let mut vm = VM::with_config([HALT].as_slice(), BufferSink::new(), config);
    assert_eq!(vm.run(), Err(VMError::StackOverflow { ip: 0, capacity: 0 }));
    assert_eq!(vm.steps(), 0);
    assert!(vm.sink().events().is_empty());
}

#[test]
fn step_limit_stops_infinite_loop() {
    let config = VmConfig::default().with_max_steps(3);
    let mut vm = VM::with_config([PUSH, 0, JMP].as_slice(), BufferSink::new(), config);
    assert_eq!(vm.run(), Err(VMError::StepLimitExceeded { limit: 3 }));
    assert_eq!(vm.steps(), 3);
    assert_eq!(vm.state(), RunState::Faulted);
}

#[test]
fn step_limit_allows_exact_budget() {
    let config = VmConfig::default().with_max_steps(2);
    let mut vm = VM::with_config([NOP, HALT].as_slice(), BufferSink::new(), config);
    assert_eq!(vm.run(), Ok(()));
}

// ==================== Invalid opcodes ====================

#[test]
fn invalid_opcode_is_traced_and_skipped() {
    let vm = run_vm(&[0x0500, PUSH, 7, PRINT_I, -1, HALT]);
    assert_eq!(vm.sink().events(), [INVALID_OP_TRACE, "7", INVALID_OP_TRACE, "HALT"]);
    assert_eq!(vm.steps(), 5);
}

#[test]
fn invalid_opcode_consumes_one_word() {
    // 0x0199 + 1 is not an opcode; the following word decodes as HALT.
    let vm = run_vm(&[PRINT_I + 1, HALT]);
    assert_eq!(vm.sink().events(), [INVALID_OP_TRACE, "HALT"]);
}

// ==================== Lifecycle ====================

#[test]
fn state_transitions() {
    let mut vm = VM::new([HALT].as_slice(), BufferSink::new());
    assert_eq!(vm.state(), RunState::Ready);
    assert_eq!(vm.frame_depth(), 0);
    assert!(vm.current_frame().is_none());

    vm.run().expect("vm run failed");
    assert_eq!(vm.state(), RunState::Halted);
    assert_eq!(vm.frame_depth(), 1);
}

#[test]
fn run_is_single_use() {
    let mut vm = VM::new([PUSH, 1, PRINT_I, HALT].as_slice(), BufferSink::new());
    vm.run().expect("vm run failed");
    assert_eq!(vm.run(), Err(VMError::AlreadyRun));
    assert_eq!(vm.state(), RunState::Halted);
    assert_eq!(vm.sink().events(), ["1", "HALT"]);

    let mut vm = VM::new([POP].as_slice(), BufferSink::new());
    assert!(vm.run().is_err());
    assert_eq!(vm.run(), Err(VMError::AlreadyRun));
    assert_eq!(vm.state(), RunState::Faulted);
}

#[test]
fn borrowed_sink() {
    let mut sink = BufferSink::new();
    {
        let mut vm = VM::new([PUSH, 42, PRINT_I, HALT].as_slice(), &mut sink);
        vm.run().expect("vm run failed");
    }
    assert_eq!(sink.events(), ["42", "HALT"]);
}

#[test]
fn boolean_conversions() {
    assert!(as_bool(-1));
    assert!(!as_bool(0));
    assert_eq!(as_int(true), 1);
    assert_eq!(as_int(false), 0);
}
