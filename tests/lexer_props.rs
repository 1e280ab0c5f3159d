use loam::lexer::{Lexer, Token, TokenKind};
use proptest::prelude::*;

// Line/column recomputed from scratch: line is one plus the newlines before
// the offset, column is the distance from the last newline.
fn expected_position(input: &str, offset: usize) -> (u32, u32) {
    let prefix = &input.as_bytes()[..offset];
    let line = 1 + prefix.iter().filter(|&&b| b == b'\n').count() as u32;
    let line_start = prefix
        .iter()
        .rposition(|&b| b == b'\n')
        .map(|i| i + 1)
        .unwrap_or(0);
    (line, (offset - line_start) as u32)
}

fn semi_trigger(kind: TokenKind) -> bool {
    use TokenKind::*;
    matches!(
        kind,
        Ident | Int | Float | String | Break | Continue | Return | Inc | Dec | Rparen | Rbrack
            | Rbrace
    )
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    #[test]
    fn never_panics_and_positions_hold(s in ".*") {
        let mut lx = Lexer::new(&s);
        let mut last_offset = 0u32;
        let max_steps = s.len().saturating_mul(4) + 64;
        let mut steps = 0usize;
        loop {
            let tok = Lexer::scan(&mut lx);
            steps += 1;
            prop_assert!(steps <= max_steps, "possible hang on {s:?}");

            // offsets stay in bounds and never move backwards
            prop_assert!((tok.offset as usize) <= s.len(), "offset out of bounds on {s:?}");
            prop_assert!(tok.offset >= last_offset, "offset moved backwards on {s:?}");
            last_offset = tok.offset;

            // every token's line/column agrees with a from-scratch recount
            let (line, column) = expected_position(&s, tok.offset as usize);
            prop_assert_eq!(tok.line, line, "line mismatch at {} in {:?}", tok.offset, &s);
            prop_assert_eq!(tok.column, column, "column mismatch at {} in {:?}", tok.offset, &s);

            if tok.kind == TokenKind::Eof {
                break;
            }
        }
    }

    #[test]
    fn literals_reproduce_their_source_bytes(s in ".*") {
        // Every ordinary token's literal is exactly the input text at its
        // offset. Synthetic semicolons, error messages, and CR-stripped
        // literals are the documented exceptions.
        let mut lx = Lexer::new(&s);
        loop {
            let tok = Lexer::scan(&mut lx);
            match tok.kind {
                TokenKind::Eof => break,
                TokenKind::Illegal | TokenKind::Semicolon => continue,
                _ => {}
            }
            if tok.lit.contains('\r') || s.contains('\r') {
                continue;
            }
            let start = tok.offset as usize;
            let end = start + tok.lit.len();
            prop_assert!(end <= s.len(), "literal out of bounds in {s:?}");
            prop_assert_eq!(tok.lit.as_ref(), &s[start..end], "literal mismatch in {:?}", &s);
        }
    }

    #[test]
    fn asi_follows_previous_token(s in "[a-z0-9+\\-*/(){}\\[\\]=;,.\n ]*") {
        let toks: Vec<Token<'_>> = Lexer::new(&s).collect();
        let mut prev: Option<TokenKind> = None;
        for t in &toks {
            let injected = t.kind == TokenKind::Semicolon && t.lit != ";";
            if injected {
                // a synthetic semicolon only ever follows a trigger token
                prop_assert!(
                    matches!(prev, Some(k) if semi_trigger(k)),
                    "stray semicolon after {prev:?} in {s:?}"
                );
            }
            prev = Some(t.kind);
        }
    }
}
