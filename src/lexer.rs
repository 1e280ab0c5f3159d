//! Lexical scanner for Loam source.
//!
//! A Logos-generated DFA recognizes the raw token shapes; the [`Lexer`]
//! wrapper turns them into position-carrying [`Token`]s, implements automatic
//! semicolon insertion, and tracks line/column state across multi-line
//! literals. Literal validation (escapes, numeric forms) runs in Logos
//! callbacks so malformed literals surface as `Illegal` tokens carrying a
//! message, never as panics.

use std::borrow::Cow;
use std::fmt;

use logos::{Lexer as LogosLexer, Logos};

use crate::error::LexErrorKind;

const MAX_RUNE: u32 = 0x10_FFFF;

// =============================================================================
// Escape validation
// =============================================================================

#[inline]
const fn digit_val(b: u8) -> Option<u32> {
    match b {
        b'0'..=b'9' => Some((b - b'0') as u32),
        b'a'..=b'f' => Some((b - b'a' + 10) as u32),
        b'A'..=b'F' => Some((b - b'A' + 10) as u32),
        _ => None,
    }
}

/// Validates one escape sequence. `j` indexes the byte after the backslash;
/// returns the index just past the escape, or the error with the index at
/// which scanning must resume.
fn scan_escape(rem: &str, j: usize) -> Result<usize, (LexErrorKind, usize)> {
    let bytes = rem.as_bytes();
    let Some(&c) = bytes.get(j) else {
        return Err((LexErrorKind::UnterminatedEscape, j));
    };
    let (digits, base, max) = match c {
        b'a' | b'b' | b'f' | b'n' | b'r' | b't' | b'v' | b'\\' | b'\'' => return Ok(j + 1),
        b'0'..=b'7' => (3u32, 8u32, 255u32),
        b'x' => (2, 16, 255),
        b'u' => (4, 16, MAX_RUNE),
        b'U' => (8, 16, MAX_RUNE),
        _ => return Err((LexErrorKind::UnknownEscape, j + 1)),
    };
    // Octal escapes include the digit already seen.
    let mut i = if matches!(c, b'x' | b'u' | b'U') { j + 1 } else { j };
    let mut x = 0u32;
    for _ in 0..digits {
        let Some(&d) = bytes.get(i) else {
            return Err((LexErrorKind::UnterminatedEscape, i));
        };
        match digit_val(d) {
            Some(v) if v < base => x = x * base + v,
            _ => {
                let ch = rem[i..].chars().next().unwrap_or('\u{FFFD}');
                return Err((LexErrorKind::IllegalEscapeChar(ch), i));
            }
        }
        i += 1;
    }
    if x > max || (0xD800..0xE000).contains(&x) {
        return Err((LexErrorKind::InvalidCodePoint, i));
    }
    Ok(i)
}

// =============================================================================
// Logos callbacks
// =============================================================================

fn lex_string(lex: &mut LogosLexer<'_, RawTok>) -> Result<(), LexErrorKind> {
    let rem = lex.remainder();
    let bytes = rem.as_bytes();
    let mut i = 0usize;
    loop {
        match bytes.get(i) {
            None | Some(b'\n') => {
                lex.bump(i);
                return Err(LexErrorKind::UnterminatedString);
            }
            Some(b'\'') => {
                lex.bump(i + 1);
                return Ok(());
            }
            Some(b'\\') => match scan_escape(rem, i + 1) {
                Ok(next) => i = next,
                Err((kind, upto)) => {
                    lex.bump(upto);
                    return Err(kind);
                }
            },
            Some(_) => i += 1,
        }
    }
}

fn lex_raw_string(lex: &mut LogosLexer<'_, RawTok>) -> Result<(), LexErrorKind> {
    let rem = lex.remainder().as_bytes();
    match rem.iter().position(|&b| b == b'`') {
        Some(pos) => {
            lex.bump(pos + 1);
            Ok(())
        }
        None => {
            lex.bump(rem.len());
            Err(LexErrorKind::UnterminatedRawString)
        }
    }
}

fn lex_block_comment(lex: &mut LogosLexer<'_, RawTok>) -> Result<(), LexErrorKind> {
    let rem = lex.remainder().as_bytes();
    match rem.windows(2).position(|w| w == b"*/") {
        Some(pos) => {
            lex.bump(pos + 2);
            Ok(())
        }
        None => {
            lex.bump(rem.len());
            Err(LexErrorKind::UnterminatedComment)
        }
    }
}

fn lex_number(lex: &mut LogosLexer<'_, RawTok>) -> Result<(), LexErrorKind> {
    // The regex matched one digit (or ".<digit>"); grow to the maximal
    // numeric token here and validate its shape.
    let src = lex.source().as_bytes();
    let start = lex.span().start;
    let (end, res) = scan_number(src, start);
    let already = lex.span().end;
    if end > already {
        lex.bump(end - already);
    }
    res
}

/// Scans a numeric literal beginning at `start`: decimal or leading-zero
/// octal integers, `0x` hexadecimal integers, and decimal floats with an
/// optional signed exponent.
fn scan_number(src: &[u8], start: usize) -> (usize, Result<(), LexErrorKind>) {
    let n = src.len();
    let mut i = start;

    if src[i] == b'.' {
        return scan_float_tail(src, i);
    }

    if src[i] == b'0' {
        i += 1;
        if i < n && (src[i] | 0x20) == b'x' {
            i += 1;
            let digits_at = i;
            while i < n && digit_val(src[i]).is_some() {
                i += 1;
            }
            if i == digits_at {
                // only scanned "0x" or "0X"
                return (i, Err(LexErrorKind::IllegalHexNumber));
            }
            return (i, Ok(()));
        }
        // octal int or float
        let mut must_be_float = false;
        while i < n && matches!(src[i], b'0'..=b'7') {
            i += 1;
        }
        if i < n && matches!(src[i], b'8' | b'9') {
            must_be_float = true;
            while i < n && src[i].is_ascii_digit() {
                i += 1;
            }
        }
        if i < n && (at_fraction_dot(src, i) || (src[i] | 0x20) == b'e') {
            return scan_float_tail(src, i);
        }
        if must_be_float {
            return (i, Err(LexErrorKind::IllegalOctalNumber));
        }
        return (i, Ok(()));
    }

    // decimal int or float
    while i < n && src[i].is_ascii_digit() {
        i += 1;
    }
    if i < n && (at_fraction_dot(src, i) || (src[i] | 0x20) == b'e') {
        return scan_float_tail(src, i);
    }
    (i, Ok(()))
}

// A '.' starts a fraction unless it is the first of "..",
// which belongs to an ellipsis.
#[inline]
fn at_fraction_dot(src: &[u8], i: usize) -> bool {
    src[i] == b'.' && src.get(i + 1) != Some(&b'.')
}

fn scan_float_tail(src: &[u8], mut i: usize) -> (usize, Result<(), LexErrorKind>) {
    let n = src.len();
    if src[i] == b'.' {
        i += 1;
        while i < n && src[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i < n && (src[i] | 0x20) == b'e' {
        i += 1;
        if i < n && matches!(src[i], b'+' | b'-') {
            i += 1;
        }
        if i >= n || !src[i].is_ascii_digit() {
            return (i, Err(LexErrorKind::IllegalExponent));
        }
        while i < n && src[i].is_ascii_digit() {
            i += 1;
        }
    }
    (i, Ok(()))
}

fn is_float_lit(lit: &str) -> bool {
    let b = lit.as_bytes();
    if b.len() > 1 && b[0] == b'0' && (b[1] | 0x20) == b'x' {
        return false;
    }
    b.iter().any(|&c| c == b'.' || (c | 0x20) == b'e')
}

fn strip_cr(s: &str) -> Cow<'_, str> {
    if s.contains('\r') {
        Cow::Owned(s.chars().filter(|&c| c != '\r').collect())
    } else {
        Cow::Borrowed(s)
    }
}

// =============================================================================
// Raw token set (DFA shapes)
// =============================================================================

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(error = LexErrorKind)]
#[logos(skip r"[\t\r ]+")]
#[rustfmt::skip]
enum RawTok {
    #[token("\n")] Newline,
    #[regex(r"//[^\n]*")] LineComment,
    #[token("/*", lex_block_comment)] BlockComment,

    // Keywords (must win over Ident on exact matches).
    #[token("switch")] KwSwitch,
    #[token("case")] KwCase,
    #[token("break")] KwBreak,
    #[token("continue")] KwContinue,
    #[token("default")] KwDefault,
    #[token("if")] KwIf,
    #[token("else")] KwElse,
    #[token("fun")] KwFun,
    #[token("return")] KwReturn,
    #[token("for")] KwFor,
    #[token("in")] KwIn,
    #[token("var")] KwVar,
    #[token("use")] KwUse,
    #[token("pkg")] KwPkg,

    // Identifiers: a letter or '_' followed by letters/digits.
    #[regex(r"[_\p{L}][_\p{L}\p{Nd}]*")] Ident,

    // Numbers start with a digit or ".<digit>"; the callback grows the
    // token to its full extent and validates it.
    #[regex(r"[0-9]|\.[0-9]", lex_number)] Number,

    #[token("'", lex_string)] Str,
    #[token("`", lex_raw_string)] RawStr,

    // Operators, multi-character first.
    #[token("...")] Ellipsis,
    #[token("<<=")] ShlAssign,
    #[token(">>=")] ShrAssign,
    #[token("&^=")] AndNotAssign,
    #[token("+=")] AddAssign,
    #[token("-=")] SubAssign,
    #[token("*=")] MulAssign,
    #[token("/=")] QuoAssign,
    #[token("%=")] RemAssign,
    #[token("&=")] AndAssign,
    #[token("|=")] OrAssign,
    #[token("^=")] XorAssign,
    #[token("<<")] Shl,
    #[token(">>")] Shr,
    #[token("&^")] AndNot,
    #[token("&&")] Land,
    #[token("||")] Lor,
    #[token("==")] Eql,
    #[token("!=")] Neq,
    #[token("<=")] Leq,
    #[token(">=")] Geq,
    #[token("++")] Inc,
    #[token("--")] Dec,
    #[token("=")] Assign,
    #[token("+")] Add,
    #[token("-")] Sub,
    #[token("*")] Mul,
    #[token("/")] Quo,
    #[token("%")] Rem,
    #[token("&")] And,
    #[token("|")] Or,
    #[token("^")] Xor,
    #[token("!")] Not,
    #[token("<")] Lss,
    #[token(">")] Gtr,

    #[token("(")] Lparen,
    #[token(")")] Rparen,
    #[token("[")] Lbrack,
    #[token("]")] Rbrack,
    #[token("{")] Lbrace,
    #[token("}")] Rbrace,
    #[token(",")] Comma,
    #[token(".")] Period,
    #[token(";")] Semicolon,
    #[token(":")] Colon,

    // Catch-all so the wrapper can report "illegal character".
    #[regex(r".", priority = 0)] Unknown,
}

impl RawTok {
    fn kind(self) -> TokenKind {
        use TokenKind as K;
        match self {
            RawTok::LineComment | RawTok::BlockComment => K::Comment,
            RawTok::KwSwitch => K::Switch,
            RawTok::KwCase => K::Case,
            RawTok::KwBreak => K::Break,
            RawTok::KwContinue => K::Continue,
            RawTok::KwDefault => K::Default,
            RawTok::KwIf => K::If,
            RawTok::KwElse => K::Else,
            RawTok::KwFun => K::Fun,
            RawTok::KwReturn => K::Return,
            RawTok::KwFor => K::For,
            RawTok::KwIn => K::In,
            RawTok::KwVar => K::Var,
            RawTok::KwUse => K::Use,
            RawTok::KwPkg => K::Pkg,
            RawTok::Ident => K::Ident,
            RawTok::Str | RawTok::RawStr => K::String,
            RawTok::Ellipsis => K::Ellipsis,
            RawTok::ShlAssign => K::ShlAssign,
            RawTok::ShrAssign => K::ShrAssign,
            RawTok::AndNotAssign => K::AndNotAssign,
            RawTok::AddAssign => K::AddAssign,
            RawTok::SubAssign => K::SubAssign,
            RawTok::MulAssign => K::MulAssign,
            RawTok::QuoAssign => K::QuoAssign,
            RawTok::RemAssign => K::RemAssign,
            RawTok::AndAssign => K::AndAssign,
            RawTok::OrAssign => K::OrAssign,
            RawTok::XorAssign => K::XorAssign,
            RawTok::Shl => K::Shl,
            RawTok::Shr => K::Shr,
            RawTok::AndNot => K::AndNot,
            RawTok::Land => K::Land,
            RawTok::Lor => K::Lor,
            RawTok::Eql => K::Eql,
            RawTok::Neq => K::Neq,
            RawTok::Leq => K::Leq,
            RawTok::Geq => K::Geq,
            RawTok::Inc => K::Inc,
            RawTok::Dec => K::Dec,
            RawTok::Assign => K::Assign,
            RawTok::Add => K::Add,
            RawTok::Sub => K::Sub,
            RawTok::Mul => K::Mul,
            RawTok::Quo => K::Quo,
            RawTok::Rem => K::Rem,
            RawTok::And => K::And,
            RawTok::Or => K::Or,
            RawTok::Xor => K::Xor,
            RawTok::Not => K::Not,
            RawTok::Lss => K::Lss,
            RawTok::Gtr => K::Gtr,
            RawTok::Lparen => K::Lparen,
            RawTok::Rparen => K::Rparen,
            RawTok::Lbrack => K::Lbrack,
            RawTok::Rbrack => K::Rbrack,
            RawTok::Lbrace => K::Lbrace,
            RawTok::Rbrace => K::Rbrace,
            RawTok::Comma => K::Comma,
            RawTok::Period => K::Period,
            RawTok::Semicolon => K::Semicolon,
            RawTok::Colon => K::Colon,
            RawTok::Newline | RawTok::Number | RawTok::Unknown => K::Illegal,
        }
    }
}

// =============================================================================
// Public token type
// =============================================================================

/// Token classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Eof,
    Illegal,
    Comment,

    // Identifiers and basic type literals
    Ident,
    Int,
    Float,
    String,

    // Operators and delimiters
    Add,
    Sub,
    Mul,
    Quo,
    Rem,

    And,
    Or,
    Xor,
    Shl,
    Shr,
    AndNot,

    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    QuoAssign,
    RemAssign,

    AndAssign,
    OrAssign,
    XorAssign,
    ShlAssign,
    ShrAssign,
    AndNotAssign,

    Land,
    Lor,
    Inc,
    Dec,

    Eql,
    Lss,
    Gtr,
    Not,

    Neq,
    Leq,
    Geq,
    Ellipsis,

    Lparen,
    Lbrack,
    Lbrace,
    Comma,
    Period,

    Rparen,
    Rbrack,
    Rbrace,
    Semicolon,
    Colon,

    // Keywords
    Switch,
    Case,
    Break,
    Continue,
    Default,

    If,
    Else,

    Fun,
    Return,

    For,
    In,

    Var,

    Use,
    Pkg,
}

/// Non-operators have the lowest precedence, binary operators range over
/// 1..=5, unary operators bind tighter, and postfix forms tightest of all.
pub const LOWEST_PREC: u8 = 0;
pub const UNARY_PREC: u8 = 6;
pub const HIGHEST_PREC: u8 = 7;

impl TokenKind {
    /// Binary operator precedence; `LOWEST_PREC` for non-operators.
    pub fn precedence(self) -> u8 {
        use TokenKind::*;
        match self {
            Lor => 1,
            Land => 2,
            Eql | Neq | Lss | Leq | Gtr | Geq => 3,
            Add | Sub | Or | Xor => 4,
            Mul | Quo | Rem | Shl | Shr | And | AndNot => 5,
            _ => LOWEST_PREC,
        }
    }

    pub fn is_assign(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            Assign
                | AddAssign
                | SubAssign
                | MulAssign
                | QuoAssign
                | RemAssign
                | AndAssign
                | OrAssign
                | XorAssign
                | ShlAssign
                | ShrAssign
                | AndNotAssign
        )
    }

    /// Whether a newline (or EOF) directly after a token of this kind gets a
    /// synthetic semicolon.
    fn can_insert_semicolon(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            Ident
                | Int
                | Float
                | String
                | Break
                | Continue
                | Return
                | Inc
                | Dec
                | Rparen
                | Rbrack
                | Rbrace
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TokenKind::*;
        let s = match self {
            Eof => "EOF",
            Illegal => "Illegal",
            Comment => "Comment",
            Ident => "Ident",
            Int => "Int",
            Float => "Float",
            String => "String",
            Add => "+",
            Sub => "-",
            Mul => "*",
            Quo => "/",
            Rem => "%",
            And => "&",
            Or => "|",
            Xor => "^",
            Shl => "<<",
            Shr => ">>",
            AndNot => "&^",
            Assign => "=",
            AddAssign => "+=",
            SubAssign => "-=",
            MulAssign => "*=",
            QuoAssign => "/=",
            RemAssign => "%=",
            AndAssign => "&=",
            OrAssign => "|=",
            XorAssign => "^=",
            ShlAssign => "<<=",
            ShrAssign => ">>=",
            AndNotAssign => "&^=",
            Land => "&&",
            Lor => "||",
            Inc => "++",
            Dec => "--",
            Eql => "==",
            Lss => "<",
            Gtr => ">",
            Not => "!",
            Neq => "!=",
            Leq => "<=",
            Geq => ">=",
            Ellipsis => "...",
            Lparen => "(",
            Lbrack => "[",
            Lbrace => "{",
            Comma => ",",
            Period => ".",
            Rparen => ")",
            Rbrack => "]",
            Rbrace => "}",
            Semicolon => ";",
            Colon => ":",
            Switch => "switch",
            Case => "case",
            Break => "break",
            Continue => "continue",
            Default => "default",
            If => "if",
            Else => "else",
            Fun => "fun",
            Return => "return",
            For => "for",
            In => "in",
            Var => "var",
            Use => "use",
            Pkg => "pkg",
        };
        f.write_str(s)
    }
}

/// A scanned token.
///
/// `lit` is the exact source text for ordinary tokens (raw strings and
/// comments have carriage returns stripped), the diagnostic message for
/// `Illegal` tokens, and `"\n"`/`""`/`";"` for newline-inserted,
/// EOF-inserted, and explicit semicolons respectively.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub offset: u32,
    pub line: u32,
    pub column: u32,
    pub lit: Cow<'src, str>,
}

impl<'src> Token<'src> {
    pub fn text(&self) -> &str {
        &self.lit
    }
}

// =============================================================================
// Lexer with semicolon insertion
// =============================================================================

/// Token stream over a source string.
///
/// `scan` always yields a token; after the input is exhausted it returns
/// `Eof` tokens forever (preceded by at most one synthetic semicolon).
pub struct Lexer<'src> {
    raw: LogosLexer<'src, RawTok>,
    src: &'src str,
    line: u32,
    line_start: u32,
    insert_semi: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(src: &'src str) -> Self {
        Self {
            raw: RawTok::lexer(src),
            src,
            line: 1,
            line_start: 0,
            insert_semi: false,
        }
    }

    fn token(&self, kind: TokenKind, offset: usize, lit: Cow<'src, str>) -> Token<'src> {
        Token {
            kind,
            offset: offset as u32,
            line: self.line,
            column: offset as u32 - self.line_start,
            lit,
        }
    }

    // Account for newlines inside a just-emitted multi-line token.
    fn advance_lines(&mut self, start: usize, slice: &str) {
        let mut newlines = 0u32;
        let mut last = 0usize;
        for (idx, b) in slice.bytes().enumerate() {
            if b == b'\n' {
                newlines += 1;
                last = idx;
            }
        }
        if newlines > 0 {
            self.line += newlines;
            self.line_start = (start + last + 1) as u32;
        }
    }

    pub fn scan(&mut self) -> Token<'src> {
        loop {
            let Some(res) = self.raw.next() else {
                let off = self.src.len();
                if std::mem::take(&mut self.insert_semi) {
                    return self.token(TokenKind::Semicolon, off, Cow::Borrowed(""));
                }
                return self.token(TokenKind::Eof, off, Cow::Borrowed(""));
            };
            let span = self.raw.span();
            let slice = self.raw.slice();
            match res {
                Err(kind) => {
                    self.insert_semi = false;
                    let tok =
                        self.token(TokenKind::Illegal, span.start, Cow::Owned(kind.to_string()));
                    self.advance_lines(span.start, slice);
                    return tok;
                }
                Ok(RawTok::Newline) => {
                    if self.insert_semi {
                        self.insert_semi = false;
                        let tok =
                            self.token(TokenKind::Semicolon, span.start, Cow::Borrowed("\n"));
                        self.line += 1;
                        self.line_start = span.end as u32;
                        return tok;
                    }
                    self.line += 1;
                    self.line_start = span.end as u32;
                }
                Ok(RawTok::Unknown) => {
                    self.insert_semi = false;
                    let ch = slice.chars().next().unwrap_or('\u{FFFD}');
                    let msg = format!("illegal character U+{:04X} {:?}", ch as u32, ch);
                    return self.token(TokenKind::Illegal, span.start, Cow::Owned(msg));
                }
                Ok(RawTok::Number) => {
                    self.insert_semi = true;
                    let kind = if is_float_lit(slice) {
                        TokenKind::Float
                    } else {
                        TokenKind::Int
                    };
                    return self.token(kind, span.start, Cow::Borrowed(slice));
                }
                Ok(raw) => {
                    let kind = raw.kind();
                    self.insert_semi = kind.can_insert_semicolon();
                    let lit = match raw {
                        RawTok::RawStr | RawTok::LineComment | RawTok::BlockComment => {
                            strip_cr(slice)
                        }
                        _ => Cow::Borrowed(slice),
                    };
                    let tok = self.token(kind, span.start, lit);
                    self.advance_lines(span.start, slice);
                    return tok;
                }
            }
        }
    }
}

impl<'src> Iterator for Lexer<'src> {
    type Item = Token<'src>;

    fn next(&mut self) -> Option<Self::Item> {
        let tok = self.scan();
        if tok.kind == TokenKind::Eof {
            None
        } else {
            Some(tok)
        }
    }
}
