use std::fmt;

use thiserror::Error;

/// A single diagnostic with its source position.
///
/// `offset` is the byte offset from the start of the input, `line` is
/// 1-based and `column` is the byte offset within the line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{offset}:{line}:{column}: {message}")]
pub struct Error {
    pub offset: u32,
    pub line: u32,
    pub column: u32,
    pub message: String,
}

impl Error {
    pub fn new(offset: u32, line: u32, column: u32, message: impl Into<String>) -> Self {
        Self {
            offset,
            line,
            column,
            message: message.into(),
        }
    }
}

/// Aggregated diagnostics, one per line.
///
/// The pipeline never aborts on the first problem; every stage accumulates
/// into one of these and returns it as a single error value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Errors(pub Vec<Error>);

impl Errors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Error> {
        self.0.iter()
    }

    /// True if any accumulated message contains `needle`.
    pub fn any_contains(&self, needle: &str) -> bool {
        self.0.iter().any(|e| e.message.contains(needle))
    }
}

impl fmt::Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i != 0 {
                writeln!(f)?;
            }
            write!(f, "{e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Errors {}

/// Lexical failure classes.
///
/// The scanner is fully recoverable: each of these becomes the message of an
/// `Illegal` token and scanning continues at the next byte.
#[derive(Debug, Clone, PartialEq, Eq, Default, Error)]
pub enum LexErrorKind {
    #[default]
    #[error("illegal token")]
    IllegalToken,
    #[error("illegal hexadecimal number")]
    IllegalHexNumber,
    #[error("illegal octal number")]
    IllegalOctalNumber,
    #[error("illegal floating-point exponent")]
    IllegalExponent,
    #[error("string literal not terminated")]
    UnterminatedString,
    #[error("raw string literal not terminated")]
    UnterminatedRawString,
    #[error("comment not terminated")]
    UnterminatedComment,
    #[error("unknown escape sequence")]
    UnknownEscape,
    #[error("escape sequence not terminated")]
    UnterminatedEscape,
    #[error("illegal character {0:?} in escape sequence")]
    IllegalEscapeChar(char),
    #[error("escape sequence is invalid Unicode code point")]
    InvalidCodePoint,
}
