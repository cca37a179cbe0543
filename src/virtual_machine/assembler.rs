//! Mnemonic assembler and disassembler.
//!
//! Turns human-readable source into a [`Program`] and back. The VM itself never
//! depends on this module; it exists for tooling and tests.
//!
//! # Syntax
//!
//! ```text
//! # prints 3, 2, 1
//!         PUSH 3
//!         STORE 0
//! loop:   LOAD 0
//!         PRINT_I
//!         PUSH @loop      # target, consumed only when the jump is taken
//!         LOAD 0
//!         PUSH 1
//!         SUB
//!         DUP
//!         STORE 0
//!         JIF             # loop while the counter is nonzero
//!         POP             # drop the unused target
//!         HALT
//! ```
//!
//! - One instruction per line, mnemonics case-insensitive
//! - Operands are decimal or `0x` hex integers, or `@label`
//! - `@label` resolves to the absolute word address of `label:`
//! - `.word N` emits a raw word
//! - Comments start with `#`; commas are ignored

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Instruction;
use crate::virtual_machine::program::{Program, parse_word};
use std::collections::HashMap;
use std::fmt::Write;
use std::fs;
use std::path::Path;

const COMMENT_CHAR: char = '#';
const LABEL_SUFFIX: char = ':';
const LABEL_REF_PREFIX: char = '@';
const WORD_DIRECTIVE: &str = ".word";

#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    text: &'a str,
    /// 1-based column offset in the line.
    offset: usize,
}

/// What a source line emits once labels are stripped.
#[derive(Debug)]
enum Item<'a> {
    Instr {
        instr: Instruction,
        operands: Vec<Token<'a>>,
    },
    Word(Token<'a>),
}

#[derive(Debug)]
struct Line<'a> {
    line_no: usize,
    item: Item<'a>,
}

/// Tokenize a single line: `#` starts a comment, commas and whitespace separate.
fn tokenize(line: &str) -> Vec<Token<'_>> {
    let code = match line.find(COMMENT_CHAR) {
        Some(pos) => &line[..pos],
        None => line,
    };

    let mut out = Vec::with_capacity(4);
    let mut start: Option<usize> = None;

    for (i, c) in code.char_indices() {
        let separator = c == ',' || c.is_whitespace();
        match (separator, start) {
            (true, Some(s)) => {
                out.push(Token {
                    text: &code[s..i],
                    offset: code[..s].chars().count() + 1,
                });
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        out.push(Token {
            text: &code[s..],
            offset: code[..s].chars().count() + 1,
        });
    }
    out
}

/// Checks if a token is a label definition (ends with `:`).
fn is_label_def(tok: &str) -> bool {
    tok.len() > 1 && tok.ends_with(LABEL_SUFFIX)
}

fn is_valid_label(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parses an integer operand, attaching the token location on failure.
fn parse_int(tok: Token<'_>, line_no: usize) -> Result<i64, VMError> {
    parse_word(tok.text).ok_or_else(|| VMError::ParseError {
        line: line_no,
        offset: tok.offset,
        message: format!("invalid integer `{}`", tok.text),
    })
}

/// Parses an integer or resolves an `@label` reference.
fn parse_operand(
    tok: Token<'_>,
    line_no: usize,
    labels: &HashMap<&str, usize>,
) -> Result<i64, VMError> {
    match tok.text.strip_prefix(LABEL_REF_PREFIX) {
        Some(name) => labels
            .get(name)
            .map(|&addr| addr as i64)
            .ok_or_else(|| VMError::UndefinedLabel {
                line: line_no,
                label: name.to_string(),
            }),
        None => parse_int(tok, line_no),
    }
}

/// First pass: strip comments, record label addresses, classify each line.
fn collect_lines(source: &str) -> Result<(Vec<Line<'_>>, HashMap<&str, usize>), VMError> {
    let mut lines = Vec::new();
    let mut labels: HashMap<&str, usize> = HashMap::new();
    let mut address = 0usize;

    for (idx, raw) in source.lines().enumerate() {
        let line_no = idx + 1;
        let mut tokens = tokenize(raw).into_iter().peekable();

        while let Some(tok) = tokens.next_if(|t| is_label_def(t.text)) {
            let name = &tok.text[..tok.text.len() - 1];
            if !is_valid_label(name) {
                return Err(VMError::ParseError {
                    line: line_no,
                    offset: tok.offset,
                    message: format!("invalid label name `{name}`"),
                });
            }
            if labels.insert(name, address).is_some() {
                return Err(VMError::DuplicateLabel {
                    line: line_no,
                    label: name.to_string(),
                });
            }
        }

        let Some(head) = tokens.next() else {
            continue;
        };
        let operands: Vec<Token<'_>> = tokens.collect();

        let item = if head.text.eq_ignore_ascii_case(WORD_DIRECTIVE) {
            match operands.as_slice() {
                [word] => Item::Word(*word),
                _ => {
                    return Err(VMError::AssemblyError {
                        line: line_no,
                        offset: head.offset,
                        source: format!(
                            "{WORD_DIRECTIVE} expects 1 operand(s), got {}",
                            operands.len()
                        ),
                    });
                }
            }
        } else {
            let instr = Instruction::from_mnemonic(head.text).ok_or_else(|| {
                VMError::AssemblyError {
                    line: line_no,
                    offset: head.offset,
                    source: VMError::InvalidInstructionName {
                        name: head.text.to_string(),
                    }
                    .to_string(),
                }
            })?;
            if operands.len() != instr.immediates() {
                return Err(VMError::AssemblyError {
                    line: line_no,
                    offset: head.offset,
                    source: VMError::ArityMismatch {
                        instruction: instr.mnemonic(),
                        expected: instr.immediates(),
                        actual: operands.len(),
                    }
                    .to_string(),
                });
            }
            Item::Instr { instr, operands }
        };

        address += match &item {
            Item::Instr { instr, .. } => 1 + instr.immediates(),
            Item::Word(_) => 1,
        };
        lines.push(Line { line_no, item });
    }

    Ok((lines, labels))
}

/// Second pass: resolve operands and emit words.
fn emit(lines: &[Line<'_>], labels: &HashMap<&str, usize>) -> Result<Program, VMError> {
    let mut code = Vec::with_capacity(lines.len() * 2);
    for line in lines {
        match &line.item {
            Item::Instr { instr, operands } => {
                code.push(instr.opcode());
                for tok in operands {
                    code.push(parse_operand(*tok, line.line_no, labels)?);
                }
            }
            Item::Word(tok) => code.push(parse_operand(*tok, line.line_no, labels)?),
        }
    }
    Ok(Program::new(code))
}

/// Returns the line/column/message triple for located assembly errors.
fn assembly_error_location(err: &VMError) -> Option<(usize, usize, String)> {
    match err {
        VMError::AssemblyError {
            line,
            offset,
            source,
        } => Some((*line, *offset, source.clone())),
        VMError::ParseError {
            line,
            offset,
            message,
        } => Some((*line, *offset, message.clone())),
        VMError::DuplicateLabel { line, label } => {
            Some((*line, 1, format!("duplicate label: {label}")))
        }
        VMError::UndefinedLabel { line, label } => {
            Some((*line, 1, format!("undefined label: {label}")))
        }
        _ => None,
    }
}

/// Formats a compiler-style diagnostic for assembly failures.
pub fn render_diagnostic(file: &str, source: &str, err: &VMError) -> String {
    let Some((line, offset, message)) = assembly_error_location(err) else {
        return format!("error: {err}\n");
    };

    let mut diag = String::new();
    let _ = writeln!(diag, "error: {message}");
    let _ = writeln!(diag, " --> {file}:{line}:{offset}");
    if let Some(raw_line) = source.lines().nth(line.saturating_sub(1)) {
        let underline = " ".repeat(offset.saturating_sub(1));
        let _ = writeln!(diag, "     |");
        let _ = writeln!(diag, "{:>4} | {}", line, raw_line.trim_end_matches('\r'));
        let _ = writeln!(diag, "     | {}^", underline);
    }
    diag
}

/// Assembles source text into a program.
pub fn assemble_source(source: &str) -> Result<Program, VMError> {
    assemble_with_name(source, "<source>")
}

fn assemble_with_name(source: &str, name: &str) -> Result<Program, VMError> {
    let result = collect_lines(source).and_then(|(lines, labels)| emit(&lines, &labels));
    if let Err(err) = &result {
        crate::error!("{}", render_diagnostic(name, source, err).trim_end());
    }
    result
}

/// Assembles a source file.
pub fn assemble_file<P: AsRef<Path>>(path: P) -> Result<Program, VMError> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|e| VMError::IoError {
        path: path.display().to_string(),
        source: e.to_string(),
    })?;
    assemble_with_name(&source, &path.display().to_string())
}

/// Renders a program as a listing, one instruction per line.
///
/// Words that are not opcodes, and opcodes whose immediate is missing, are
/// written as `.word` so the listing assembles back to the same stream.
pub fn disassemble(program: &Program) -> String {
    let words = program.words();
    let mut out = String::new();
    let mut ip = 0;

    while ip < words.len() {
        let word = words[ip];
        match Instruction::try_from(word) {
            Ok(instr) if ip + instr.immediates() < words.len() => {
                let _ = write!(out, "{ip:>6}: {}", instr.mnemonic());
                for imm in &words[ip + 1..=ip + instr.immediates()] {
                    let _ = write!(out, " {imm}");
                }
                out.push('\n');
                ip += 1 + instr.immediates();
            }
            _ => {
                let _ = writeln!(out, "{ip:>6}: {WORD_DIRECTIVE} {word}");
                ip += 1;
            }
        }
    }
    out
}
