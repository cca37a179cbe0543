//! Command-line driver for the stack VM.
//!
//! Loads a program, runs it once and prints trace output to stdout.
//!
//! # Usage
//! ```text
//! stackvm <program> [OPTIONS]
//! ```
//!
//! # Arguments
//! - `program`: Path to the program file. Files ending in `.asm` are
//!   assembled; anything else is read as whitespace-separated integers.
//!
//! # Options
//! - `--asm`: Treat the input as assembly source
//! - `--bin`: Treat the input as little-endian 8-byte words
//! - `--stack <n>`: Operand stack capacity
//! - `--frames <n>`: Frame stack capacity
//! - `--max-steps <n>`: Fault after `n` instructions
//! - `--disasm`: Print the program listing instead of running it
//! - `--quiet`: Only log errors

use stackvm::utils::log::{self, Level};
use stackvm::virtual_machine::assembler::{assemble_file, disassemble};
use stackvm::virtual_machine::program::Program;
use stackvm::virtual_machine::trace::StdoutSink;
use stackvm::virtual_machine::vm::{VM, VmConfig};
use stackvm::{error, info};
use std::env;
use std::path::Path;
use std::process;
use std::str::FromStr;

const ASM_EXTENSION: &str = "asm";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    Assembly,
    Binary,
    Text,
}

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage(&args[0]);
        process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    let path = &args[1];
    let mut format: Option<Format> = None;
    let mut config = VmConfig::default();
    let mut disasm = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--asm" => {
                format = Some(Format::Assembly);
                i += 1;
            }
            "--bin" => {
                format = Some(Format::Binary);
                i += 1;
            }
            "--stack" => {
                i += 1;
                config = config.with_operand_stack_capacity(parse_flag_value(&args, i, "--stack"));
                i += 1;
            }
            "--frames" => {
                i += 1;
                config = config.with_frame_stack_capacity(parse_flag_value(&args, i, "--frames"));
                i += 1;
            }
            "--max-steps" => {
                i += 1;
                config = config.with_max_steps(parse_flag_value(&args, i, "--max-steps"));
                i += 1;
            }
            "--disasm" => {
                disasm = true;
                i += 1;
            }
            "--quiet" => {
                log::set_max_level(Level::Error);
                i += 1;
            }
            "-h" | "--help" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            other => {
                eprintln!("Unexpected argument: {}\n", other);
                print_usage(&args[0]);
                process::exit(1);
            }
        }
    }

    let format = format.unwrap_or_else(|| detect_format(Path::new(path)));
    let program = match load(path, format) {
        Ok(program) => program,
        Err(e) => {
            error!("failed to load {}: {}", path, e);
            process::exit(1);
        }
    };
    info!("loaded {} ({} words)", path, program.len());

    if disasm {
        print!("{}", disassemble(&program));
        return;
    }

    let mut vm = VM::with_config(program, StdoutSink, config);
    match vm.run() {
        Ok(()) => info!("halted after {} instructions", vm.steps()),
        Err(e) => {
            error!("execution failed: {}", e);
            process::exit(1);
        }
    }
}

fn detect_format(path: &Path) -> Format {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case(ASM_EXTENSION) => Format::Assembly,
        _ => Format::Text,
    }
}

fn load(path: &str, format: Format) -> Result<Program, stackvm::virtual_machine::errors::VMError> {
    match format {
        Format::Assembly => assemble_file(path),
        Format::Binary => Program::read_binary(path),
        Format::Text => Program::read_text(path),
    }
}

/// Parses the value following `flag`, exiting with usage on failure.
fn parse_flag_value<T: FromStr>(args: &[String], i: usize, flag: &str) -> T {
    let Some(raw) = args.get(i) else {
        eprintln!("{} requires an argument", flag);
        process::exit(1);
    };
    match raw.parse() {
        Ok(value) => value,
        Err(_) => {
            eprintln!("Invalid value for {}: {}", flag, raw);
            process::exit(1);
        }
    }
}

const USAGE: &str = "\
Stack VM

USAGE:
    {program} <program> [OPTIONS]

ARGS:
    <program>    Program file (.asm source, integer text, or binary with --bin)

OPTIONS:
    --asm              Treat the input as assembly source
    --bin              Treat the input as little-endian 8-byte words
    --stack <n>        Operand stack capacity (default 4096)
    --frames <n>       Frame stack capacity (default 256)
    --max-steps <n>    Fault after n instructions
    --disasm           Print the program listing and exit
    --quiet            Only log errors
    -h, --help         Print this help message

EXAMPLES:
    # Assemble and run
    {program} countdown.asm

    # Run raw words with a small stack
    {program} program.txt --stack 16

    # Inspect a binary program
    {program} program.bin --bin --disasm
";

/// Prints usage information to stderr.
fn print_usage(program: &str) {
    eprintln!("{}", USAGE.replace("{program}", program));
}
