//! Instruction stream representation and loading.
//!
//! A [`Program`] is nothing more than the ordered `i64` words the executor
//! fetches from. No header, magic or version is attached. Two on-disk forms
//! are understood:
//!
//! - **Text**: integers separated by whitespace or commas, decimal or
//!   `0x`-prefixed hex, `#` starts a comment running to end of line.
//! - **Binary**: consecutive little-endian 8-byte words.

use crate::virtual_machine::errors::VMError;
use std::fs;
use std::path::Path;

/// Size in bytes of one encoded word.
pub const WORD_SIZE: usize = 8;

const COMMENT_CHAR: char = '#';

/// Immutable instruction stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Program {
    code: Vec<i64>,
}

impl Program {
    pub fn new(code: Vec<i64>) -> Self {
        Self { code }
    }

    pub fn words(&self) -> &[i64] {
        &self.code
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Returns the word at `ip`, or `None` past the end.
    pub fn get(&self, ip: usize) -> Option<i64> {
        self.code.get(ip).copied()
    }

    /// Parses the text form.
    pub fn parse_text(source: &str) -> Result<Self, VMError> {
        let mut code = Vec::new();
        for (line_idx, raw_line) in source.lines().enumerate() {
            let line = match raw_line.find(COMMENT_CHAR) {
                Some(pos) => &raw_line[..pos],
                None => raw_line,
            };
            let mut column = 1;
            for chunk in line.split(|c: char| c == ',' || c.is_whitespace()) {
                if !chunk.is_empty() {
                    let word = parse_word(chunk).ok_or_else(|| VMError::ParseError {
                        line: line_idx + 1,
                        offset: column,
                        message: format!("invalid integer `{chunk}`"),
                    })?;
                    code.push(word);
                }
                column += chunk.chars().count() + 1;
            }
        }
        Ok(Self { code })
    }

    /// Decodes the binary form.
    pub fn from_le_bytes(bytes: &[u8]) -> Result<Self, VMError> {
        if bytes.len() % WORD_SIZE != 0 {
            return Err(VMError::DecodeError {
                reason: format!(
                    "length {} is not a multiple of {WORD_SIZE} bytes",
                    bytes.len()
                ),
            });
        }
        let code = bytes
            .chunks_exact(WORD_SIZE)
            .map(|chunk| {
                let mut word = [0u8; WORD_SIZE];
                word.copy_from_slice(chunk);
                i64::from_le_bytes(word)
            })
            .collect();
        Ok(Self { code })
    }

    /// Encodes the binary form.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.code.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    /// Reads and parses a text program from disk.
    pub fn read_text<P: AsRef<Path>>(path: P) -> Result<Self, VMError> {
        let source = read_with_context(path.as_ref(), |p| fs::read_to_string(p))?;
        Self::parse_text(&source)
    }

    /// Reads and decodes a binary program from disk.
    pub fn read_binary<P: AsRef<Path>>(path: P) -> Result<Self, VMError> {
        let bytes = read_with_context(path.as_ref(), |p| fs::read(p))?;
        Self::from_le_bytes(&bytes)
    }
}

impl From<Vec<i64>> for Program {
    fn from(code: Vec<i64>) -> Self {
        Self::new(code)
    }
}

impl From<&[i64]> for Program {
    fn from(code: &[i64]) -> Self {
        Self::new(code.to_vec())
    }
}

/// Parses a decimal or `0x` hex integer, with optional leading `-`.
pub(crate) fn parse_word(tok: &str) -> Option<i64> {
    let (negative, digits) = match tok.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, tok.strip_prefix('+').unwrap_or(tok)),
    };
    if digits.starts_with(['-', '+']) {
        return None;
    }
    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) if !hex.starts_with(['-', '+']) => i128::from_str_radix(hex, 16).ok()?,
        Some(_) => return None,
        None => digits.parse::<i128>().ok()?,
    };
    let value = if negative { -magnitude } else { magnitude };
    i64::try_from(value).ok()
}

fn read_with_context<T>(
    path: &Path,
    read: impl FnOnce(&Path) -> std::io::Result<T>,
) -> Result<T, VMError> {
    read(path).map_err(|e| VMError::IoError {
        path: path.display().to_string(),
        source: e.to_string(),
    })
}
