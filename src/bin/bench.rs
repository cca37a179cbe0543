//! VM benchmark binary.
//!
//! Measures execution time for representative programs.
//! Run with: `cargo run --release --bin bench`

use std::time::{Duration, Instant};

use stackvm::virtual_machine::assembler::assemble_source;
use stackvm::virtual_machine::program::Program;
use stackvm::virtual_machine::trace::NullSink;
use stackvm::virtual_machine::vm::VM;

// ---------------------------------------------------------------------------
// Benchmark harness
// ---------------------------------------------------------------------------

struct BenchResult {
    name: &'static str,
    iterations: u64,
    total: Duration,
    /// Instructions executed by the last run.
    steps: u64,
}

impl BenchResult {
    fn avg(&self) -> Duration {
        self.total / self.iterations as u32
    }

    fn print(&self) {
        let avg = self.avg();
        let ns_per_op = avg.as_nanos();
        let ns_per_instr = if self.steps > 0 {
            format!("{:>8.1}", ns_per_op as f64 / self.steps as f64)
        } else {
            "       -".to_string()
        };
        println!(
            "  {:<30} {:>7} iters {:>10.3} us/iter {:>12} steps  {} ns/instr",
            self.name,
            self.iterations,
            ns_per_op as f64 / 1000.0,
            self.steps,
            ns_per_instr,
        );
    }
}

/// Runs `f` for at least `min_duration`, returning aggregated results.
fn bench<F>(name: &'static str, min_duration: Duration, mut f: F) -> BenchResult
where
    F: FnMut() -> u64,
{
    // Warmup
    for _ in 0..5 {
        f();
    }

    let mut iterations = 0u64;
    let mut last_steps = 0u64;
    let start = Instant::now();
    while start.elapsed() < min_duration {
        last_steps = f();
        iterations += 1;
    }
    let total = start.elapsed();

    BenchResult {
        name,
        iterations,
        total,
        steps: last_steps,
    }
}

/// Runs `program` to completion and returns the instruction count.
fn run_steps(program: &Program) -> u64 {
    let mut vm = VM::new(program.clone(), NullSink);
    vm.run().expect("run failed");
    vm.steps()
}

// ---------------------------------------------------------------------------
// Benchmark definitions
// ---------------------------------------------------------------------------

const COUNTDOWN_ASM: &str = r#"
        PUSH 100000
        STORE 0
loop:   PUSH @loop
        LOAD 0
        PUSH 1
        SUB
        DUP
        STORE 0
        JIF
        POP
        HALT
"#;

const ARITHMETIC_MIX_ASM: &str = r#"
        PUSH 10000
        STORE 0
        PUSH 1
        STORE 1
loop:   LOAD 1
        PUSH 31
        MUL
        PUSH 7
        ADD
        PUSH 1000003
        MOD
        DUP
        PUSH 3
        DIV
        ADD
        STORE 1
        PUSH @loop
        LOAD 0
        PUSH 1
        SUB
        DUP
        STORE 0
        JIF
        POP
        HALT
"#;

const BRANCH_HEAVY_ASM: &str = r#"
        PUSH 50000
        STORE 0
loop:   PUSH @odd
        LOAD 0
        PUSH 2
        MOD
        JIF
        POP
        PUSH @next
        JMP
odd:    LOAD 1
        PUSH 1
        ADD
        STORE 1
next:   PUSH @loop
        LOAD 0
        PUSH 1
        SUB
        DUP
        STORE 0
        PUSH 0
        CMP_G
        JIF
        POP
        HALT
"#;

const VARIABLES_ASM: &str = r#"
        PUSH 5000
        STORE 0
loop:   LOAD 0
        STORE 1
        LOAD 1
        STORE 2
        LOAD 2
        STORE 3
        LOAD 3
        STORE 4
        LOAD 4
        STORE 1000
        PUSH @loop
        LOAD 0
        PUSH 1
        SUB
        DUP
        STORE 0
        JIF
        POP
        HALT
"#;

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() {
    let min = Duration::from_secs(2);

    println!("VM Benchmarks (each runs for >= 2s)\n");
    println!(
        "  {:<30} {:>7}       {:>14} {:>12}  {:>10}",
        "benchmark", "iters", "avg time", "steps/run", "ns/instr"
    );
    println!("  {}", "-".repeat(82));

    // Pre-assemble programs (assembly cost excluded from benchmark)
    let countdown_prog = assemble_source(COUNTDOWN_ASM).expect("asm");
    let arith_prog = assemble_source(ARITHMETIC_MIX_ASM).expect("asm");
    let branch_prog = assemble_source(BRANCH_HEAVY_ASM).expect("asm");
    let vars_prog = assemble_source(VARIABLES_ASM).expect("asm");

    // 1. Tight countdown (100K iterations)
    bench("countdown(100K)", min, || run_steps(&countdown_prog)).print();

    // 2. Arithmetic mix (10K iterations)
    bench("arithmetic_mix(10K)", min, || run_steps(&arith_prog)).print();

    // 3. Compare + branch (50K iterations)
    bench("branch_heavy(50K)", min, || run_steps(&branch_prog)).print();

    // 4. Variable load/store (5K iterations)
    bench("variables(5K)", min, || run_steps(&vars_prog)).print();

    println!();
}
