use loam::lexer::{Lexer, Token, TokenKind};

fn lex_all(input: &str) -> Vec<Token<'_>> {
    Lexer::new(input).collect()
}

/// Offsets of semicolons the scanner synthesized (literal "\n" or "").
fn injected_semis(input: &str) -> Vec<u32> {
    lex_all(input)
        .into_iter()
        .filter(|t| t.kind == TokenKind::Semicolon && t.lit != ";")
        .map(|t| t.offset)
        .collect()
}

#[test]
fn inserted_after_each_trigger_kind() {
    // every token kind in the insertion set gets a semicolon before '\n'
    for src in [
        "x\n", "1\n", "1.5\n", "'s'\n", "`r`\n", "break\n", "continue\n", "return\n", "x++\n",
        "x--\n", ")\n", "]\n", "}\n",
    ] {
        let pos = (src.len() - 1) as u32;
        assert_eq!(injected_semis(src), vec![pos], "input {src:?}");
    }
}

#[test]
fn not_inserted_after_other_kinds() {
    for src in [
        "+\n", ",\n", "(\n", "[\n", "{\n", "fun\n", "if\n", "else\n", "var\n", "==\n", "=\n",
        "in\n", "for\n", "switch\n", ";\n",
    ] {
        assert_eq!(injected_semis(src), Vec::<u32>::new(), "input {src:?}");
    }
}

#[test]
fn literal_distinguishes_origin() {
    // explicit ";" vs newline-inserted "\n" vs EOF-inserted ""
    let toks = lex_all("x;\ny\nz");
    let semis: Vec<(&str, u32)> = toks
        .iter()
        .filter(|t| t.kind == TokenKind::Semicolon)
        .map(|t| (t.lit.as_ref(), t.offset))
        .collect();
    assert_eq!(semis, vec![(";", 1), ("\n", 4), ("", 6)]);
}

#[test]
fn no_insertion_after_comment() {
    // a trailing comment becomes the previous token, which is not in the
    // insertion set
    let toks = lex_all("a // trailing\nb");
    let kinds: Vec<TokenKind> = toks.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Ident,
            TokenKind::Comment,
            TokenKind::Ident,
            TokenKind::Semicolon,
        ]
    );
}

#[test]
fn no_insertion_on_blank_lines() {
    assert_eq!(injected_semis("x\n\n\ny\n"), vec![1, 5]);
}

#[test]
fn multi_line_block_comment_advances_lines() {
    let toks = lex_all("/* a\nb\nc */ x");
    assert_eq!(toks[0].kind, TokenKind::Comment);
    assert_eq!(toks[0].line, 1);
    let x = &toks[1];
    assert_eq!(x.kind, TokenKind::Ident);
    assert_eq!(x.line, 3);
    assert_eq!(x.column, 5);
}

#[test]
fn crlf_counts_as_one_newline() {
    let toks = lex_all("a\r\nb");
    let kinds: Vec<TokenKind> = toks.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Ident,
            TokenKind::Semicolon,
            TokenKind::Ident,
            TokenKind::Semicolon,
        ]
    );
    assert_eq!(toks[2].line, 2);
    assert_eq!(toks[2].column, 0);
}

#[test]
fn illegal_token_disarms_insertion() {
    // the Illegal token becomes the previous token, so no semicolon
    let toks = lex_all("a $\nb");
    let semis: Vec<u32> = toks
        .iter()
        .filter(|t| t.kind == TokenKind::Semicolon && t.lit != ";")
        .map(|t| t.offset)
        .collect();
    // only the EOF-inserted one after `b`
    assert_eq!(semis, vec![5]);
}
