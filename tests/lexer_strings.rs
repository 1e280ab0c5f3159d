use loam::lexer::{Lexer, Token, TokenKind};

use TokenKind as K;

fn first(input: &str) -> Token<'_> {
    Lexer::scan(&mut Lexer::new(input))
}

fn all(input: &str) -> Vec<Token<'_>> {
    Lexer::new(input).collect()
}

#[test]
fn simple_and_empty_strings() {
    for src in ["'a'", "''", "'hello world'", "'héllo'"] {
        let tok = first(src);
        assert_eq!(tok.kind, K::String, "input {src:?}");
        assert_eq!(tok.lit.as_ref(), src, "input {src:?}");
    }
}

#[test]
fn valid_escapes() {
    for src in [
        r"'\a'",
        r"'\b'",
        r"'\f'",
        r"'\n'",
        r"'\r'",
        r"'\t'",
        r"'\v'",
        r"'\\'",
        r"'\''",
        r"'\101'",
        r"'\x41'",
        r"'A'",
        r"'\U00000041'",
        r"'A ok'",
    ] {
        let tok = first(src);
        assert_eq!(tok.kind, K::String, "input {src:?}: {:?}", tok.lit);
    }
}

#[test]
fn invalid_escapes() {
    for (src, msg) in [
        (r"'\q'", "unknown escape sequence"),
        (r"'\xG1'", "illegal character"),
        (r"'\u12'", "illegal character"),
        (r"'\777'", "escape sequence is invalid Unicode code point"),
        (r"'\ud800'", "escape sequence is invalid Unicode code point"),
        (r"'\U00110000'", "escape sequence is invalid Unicode code point"),
        ("'\\", "escape sequence not terminated"),
    ] {
        let tok = first(src);
        assert_eq!(tok.kind, K::Illegal, "input {src:?}");
        assert!(
            tok.lit.contains(msg),
            "input {src:?}: got {:?}, want {msg:?}",
            tok.lit
        );
    }
}

#[test]
fn surrogate_boundaries() {
    assert_eq!(first(r"'\ud7ff'").kind, K::String);
    assert_eq!(first(r"'\ue000'").kind, K::String);
    assert_eq!(first(r"'\ud800'").kind, K::Illegal);
    assert_eq!(first(r"'\udfff'").kind, K::Illegal);
}

#[test]
fn unterminated_string() {
    let tok = first("'abc");
    assert_eq!(tok.kind, K::Illegal);
    assert_eq!(tok.lit.as_ref(), "string literal not terminated");

    // a newline ends the literal with the same error
    let tok = first("'ab\ncd'");
    assert_eq!(tok.kind, K::Illegal);
    assert_eq!(tok.lit.as_ref(), "string literal not terminated");
}

#[test]
fn raw_strings() {
    let tok = first("`a'b\"c`");
    assert_eq!(tok.kind, K::String);
    assert_eq!(tok.lit.as_ref(), "`a'b\"c`");

    // carriage returns are stripped from the literal value
    let tok = first("`a\r\nb`");
    assert_eq!(tok.kind, K::String);
    assert_eq!(tok.lit.as_ref(), "`a\nb`");

    let tok = first("`abc");
    assert_eq!(tok.kind, K::Illegal);
    assert_eq!(tok.lit.as_ref(), "raw string literal not terminated");
}

#[test]
fn line_tracking_after_raw_string() {
    let toks = all("`a\nb\nc` x");
    assert_eq!(toks[0].kind, K::String);
    assert_eq!(toks[0].line, 1);
    let x = &toks[1];
    assert_eq!(x.kind, K::Ident);
    assert_eq!(x.line, 3);
    assert_eq!(x.column, 3);
}

#[test]
fn comments() {
    let toks = all("// line\nx /* block */ y");
    let kinds: Vec<K> = toks.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![K::Comment, K::Ident, K::Comment, K::Ident, K::Semicolon]
    );
    assert_eq!(toks[0].lit.as_ref(), "// line");
    assert_eq!(toks[2].lit.as_ref(), "/* block */");
}

#[test]
fn comment_carriage_returns_stripped() {
    let toks = all("/* a\r\nb */");
    assert_eq!(toks[0].kind, K::Comment);
    assert_eq!(toks[0].lit.as_ref(), "/* a\nb */");
}

#[test]
fn unterminated_block_comment() {
    let tok = first("/* never closed");
    assert_eq!(tok.kind, K::Illegal);
    assert_eq!(tok.lit.as_ref(), "comment not terminated");
}
