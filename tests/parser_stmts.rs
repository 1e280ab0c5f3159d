use loam::ast::{Expr, ExprId, File, Spec, Stmt};
use loam::error::Errors;
use loam::parser::parse;

fn parse_ok(src: &str) -> File<'_> {
    match parse(src) {
        Ok(f) => f,
        Err(e) => panic!("unexpected parse errors for {src:?}:\n{}", e.errors),
    }
}

fn parse_errs(src: &str) -> Errors {
    match parse(src) {
        Ok(_) => panic!("expected parse errors for {src:?}"),
        Err(e) => e.errors,
    }
}

fn ident_name<'a, 's>(file: &'a File<'s>, e: ExprId<'s>) -> &'a str {
    file.ast
        .ident(e)
        .map(|i| i.tok.lit.as_ref())
        .unwrap_or("<not an ident>")
}

fn assign_rhs<'s>(file: &File<'s>, i: usize) -> ExprId<'s> {
    match &file.ast.stmts[file.stmts[i]] {
        Stmt::Assign { rhs, .. } => rhs[0],
        other => panic!("statement #{i} is not an assignment: {other:?}"),
    }
}

#[test]
fn binary_operators_are_left_associative() {
    let file = parse_ok("x = a - b - c");
    let Expr::Binary { x, y, .. } = &file.ast.exprs[assign_rhs(&file, 0)] else {
        panic!("expected binary expression");
    };
    assert_eq!(ident_name(&file, *y), "c");
    let Expr::Binary { x: a, y: b, .. } = &file.ast.exprs[*x] else {
        panic!("expected nested binary expression on the left");
    };
    assert_eq!(ident_name(&file, *a), "a");
    assert_eq!(ident_name(&file, *b), "b");
}

#[test]
fn precedence_binds_mul_over_add() {
    let file = parse_ok("x = n + m * k");
    let Expr::Binary { x, op, y } = &file.ast.exprs[assign_rhs(&file, 0)] else {
        panic!("expected binary expression");
    };
    assert_eq!(op.lit, "+");
    assert_eq!(ident_name(&file, *x), "n");
    assert!(matches!(file.ast.exprs[*y], Expr::Binary { .. }));
}

#[test]
fn parens_override_precedence() {
    let file = parse_ok("x = (n + m) * k");
    let Expr::Binary { x, op, .. } = &file.ast.exprs[assign_rhs(&file, 0)] else {
        panic!("expected binary expression");
    };
    assert_eq!(op.lit, "*");
    assert!(matches!(file.ast.exprs[*x], Expr::Paren { .. }));
}

#[test]
fn for_in_destructuring() {
    let file = parse_ok("for x in y { }");
    let Stmt::In {
        index,
        key,
        value,
        x,
        ..
    } = &file.ast.stmts[file.stmts[0]]
    else {
        panic!("expected in-statement");
    };
    assert!(index.is_none());
    assert_eq!(ident_name(&file, key.expect("key")), "x");
    assert!(value.is_none());
    assert_eq!(ident_name(&file, *x), "y");

    let file = parse_ok("for k, v in m { }");
    let Stmt::In { key, value, .. } = &file.ast.stmts[file.stmts[0]] else {
        panic!("expected in-statement");
    };
    assert_eq!(ident_name(&file, key.expect("key")), "k");
    assert_eq!(ident_name(&file, value.expect("value")), "v");

    let file = parse_ok("for i, k, v in m { }");
    let Stmt::In { index, .. } = &file.ast.stmts[file.stmts[0]] else {
        panic!("expected in-statement");
    };
    assert_eq!(ident_name(&file, index.expect("index")), "i");

    let file = parse_ok("for in m { }");
    let Stmt::In {
        index, key, value, ..
    } = &file.ast.stmts[file.stmts[0]]
    else {
        panic!("expected in-statement");
    };
    assert!(index.is_none() && key.is_none() && value.is_none());
}

#[test]
fn classic_for_headers() {
    let file = parse_ok("for i = 0; i < 10; i++ { }");
    let Stmt::For {
        init, cond, post, ..
    } = &file.ast.stmts[file.stmts[0]]
    else {
        panic!("expected for statement");
    };
    assert!(init.is_some() && cond.is_some() && post.is_some());

    let file = parse_ok("for { }");
    let Stmt::For {
        init, cond, post, ..
    } = &file.ast.stmts[file.stmts[0]]
    else {
        panic!("expected for statement");
    };
    assert!(init.is_none() && cond.is_none() && post.is_none());

    let file = parse_ok("for n < 3 { }");
    let Stmt::For {
        init, cond, post, ..
    } = &file.ast.stmts[file.stmts[0]]
    else {
        panic!("expected for statement");
    };
    assert!(init.is_none() && cond.is_some() && post.is_none());
}

#[test]
fn if_header_errors() {
    assert!(parse_errs("if var x = 1; x { }").any_contains("var declaration not allowed"));
    assert!(parse_errs("if { }").any_contains("missing condition in if statement"));
    assert!(parse_errs("if x\n{ }").any_contains("unexpected newline, expecting {"));
}

#[test]
fn if_else_chain() {
    let file = parse_ok("if n < 0 { m = 1 } else if n < 10 { m = 2 } else { m = 3 }");
    let Stmt::If { alt, .. } = &file.ast.stmts[file.stmts[0]] else {
        panic!("expected if statement");
    };
    let Stmt::If { alt: alt2, .. } = &file.ast.stmts[alt.expect("else branch")] else {
        panic!("expected chained if");
    };
    assert!(matches!(
        file.ast.stmts[alt2.expect("final else")],
        Stmt::Block(_)
    ));
}

#[test]
fn switch_header_expression_becomes_tag() {
    let file = parse_ok("switch n {\ncase 1:\ncase 2, 3:\ndefault:\n}");
    let Stmt::Switch {
        init, tag, body, ..
    } = &file.ast.stmts[file.stmts[0]]
    else {
        panic!("expected switch statement");
    };
    assert!(init.is_none());
    assert_eq!(ident_name(&file, tag.expect("tag")), "n");
    let Stmt::Block(block) = &file.ast.stmts[*body] else {
        panic!("expected case block");
    };
    assert_eq!(block.list.len(), 3);
    let Stmt::Case(two_three) = &file.ast.stmts[block.list[1]] else {
        panic!("expected case clause");
    };
    assert_eq!(two_three.list.len(), 2);
}

#[test]
fn labeled_statement_and_branch_target() {
    let file = parse_ok("loop: for {\nbreak loop\n}");
    let Stmt::Labeled { label, stmt, .. } = &file.ast.stmts[file.stmts[0]] else {
        panic!("expected labeled statement");
    };
    assert_eq!(ident_name(&file, *label), "loop");
    let Stmt::For { body, .. } = &file.ast.stmts[*stmt] else {
        panic!("expected for under the label");
    };
    let Stmt::Block(block) = &file.ast.stmts[*body] else {
        panic!("expected block body");
    };
    let Stmt::Branch { label: target, .. } = &file.ast.stmts[block.list[0]] else {
        panic!("expected branch statement");
    };
    let target = target.expect("break label");
    assert!(
        file.ast.ident(target).and_then(|i| i.obj).is_some(),
        "break target should resolve to the label object"
    );
}

#[test]
fn illegal_label_declaration() {
    assert!(parse_errs("1: n = 2").any_contains("illegal label declaration"));
}

#[test]
fn index_slice_and_backwards_forms() {
    let file = parse_ok("q = m[[k]]");
    let Expr::Index { backwards, .. } = &file.ast.exprs[assign_rhs(&file, 0)] else {
        panic!("expected index expression");
    };
    assert!(*backwards);

    let file = parse_ok("q = m[k]");
    let Expr::Index { backwards, .. } = &file.ast.exprs[assign_rhs(&file, 0)] else {
        panic!("expected index expression");
    };
    assert!(!*backwards);

    let file = parse_ok("q = m[1:5]");
    let Expr::Slice { low, high, .. } = &file.ast.exprs[assign_rhs(&file, 0)] else {
        panic!("expected slice expression");
    };
    assert!(low.is_some() && high.is_some());

    let file = parse_ok("q = m[:5]");
    let Expr::Slice { low, high, .. } = &file.ast.exprs[assign_rhs(&file, 0)] else {
        panic!("expected slice expression");
    };
    assert!(low.is_none() && high.is_some());

    assert!(parse_errs("q = m[[k]:2]").any_contains("cannot slice a backwards index"));
}

#[test]
fn composite_literals() {
    let file = parse_ok("m = a{1: 'one', 2: 'two'}");
    let Expr::Composite { ty, elts, .. } = &file.ast.exprs[assign_rhs(&file, 0)] else {
        panic!("expected composite literal");
    };
    assert!(matches!(
        file.ast.exprs[ty.expect("marker")],
        Expr::ArrayLit { .. }
    ));
    assert_eq!(elts.len(), 2);
    assert!(matches!(file.ast.exprs[elts[0]], Expr::KeyValue { .. }));

    let file = parse_ok("p = r{'k': 1, 2}");
    let Expr::Composite { ty, elts, .. } = &file.ast.exprs[assign_rhs(&file, 0)] else {
        panic!("expected composite literal");
    };
    assert!(matches!(
        file.ast.exprs[ty.expect("marker")],
        Expr::RecordLit { .. }
    ));
    assert_eq!(elts.len(), 2);

    // a bare nested value has no marker expression
    let file = parse_ok("m = a{ {1: 2} }");
    let Expr::Composite { elts, .. } = &file.ast.exprs[assign_rhs(&file, 0)] else {
        panic!("expected composite literal");
    };
    assert!(matches!(
        file.ast.exprs[elts[0]],
        Expr::Composite { ty: None, .. }
    ));
}

#[test]
fn call_with_spread() {
    let file = parse_ok("g(xs...)");
    let Stmt::Expr { x } = &file.ast.stmts[file.stmts[0]] else {
        panic!("expected expression statement");
    };
    let Expr::Call { args, ellipsis, .. } = &file.ast.exprs[*x] else {
        panic!("expected call expression");
    };
    assert_eq!(args.len(), 1);
    assert!(ellipsis.is_some());
}

#[test]
fn use_declarations() {
    let file = parse_ok("use 'lib'\nn = 1");
    let Spec::Use(u) = &file.ast.specs[file.decls[0].specs[0]] else {
        panic!("expected use spec");
    };
    assert!(u.name.is_none());
    assert_eq!(u.path.lit, "'lib'");

    let file = parse_ok("use io 'io'\nn = 1");
    let Spec::Use(u) = &file.ast.specs[file.decls[0].specs[0]] else {
        panic!("expected use spec");
    };
    assert_eq!(ident_name(&file, u.name.expect("alias")), "io");

    let file = parse_ok("use . 'sys'\nn = 1");
    let Spec::Use(u) = &file.ast.specs[file.decls[0].specs[0]] else {
        panic!("expected use spec");
    };
    assert_eq!(ident_name(&file, u.name.expect("dot import")), ".");

    let file = parse_ok("use (\nio 'io'\nnet 'net'\n)\nn = 1");
    assert_eq!(file.decls.len(), 1);
    assert_eq!(file.decls[0].specs.len(), 2);
}

#[test]
fn package_clause() {
    let file = parse_ok("pkg main\nn = 1");
    let pkg = file.package.expect("package clause");
    assert_eq!(pkg.name.lit, "main");
}

#[test]
fn var_declarations() {
    let file = parse_ok("var x, y = 1, 2");
    let Stmt::Decl(decl) = &file.ast.stmts[file.stmts[0]] else {
        panic!("expected declaration statement");
    };
    let Spec::Value(v) = &file.ast.specs[decl.specs[0]] else {
        panic!("expected value spec");
    };
    assert_eq!(v.names.len(), 2);
    assert_eq!(v.values.len(), 2);

    let file = parse_ok("var (\nx = 1\ny = 2\n)");
    let Stmt::Decl(decl) = &file.ast.stmts[file.stmts[0]] else {
        panic!("expected declaration statement");
    };
    assert_eq!(decl.specs.len(), 2);
}

#[test]
fn function_definition_shape() {
    let file = parse_ok("fun add(x, y) { return x + y }");
    let Stmt::Expr { x } = &file.ast.stmts[file.stmts[0]] else {
        panic!("expected expression statement");
    };
    let Expr::Fun(def) = &file.ast.exprs[*x] else {
        panic!("expected function definition");
    };
    assert_eq!(ident_name(&file, def.name.expect("name")), "add");
    assert_eq!(def.params.len(), 2);
    assert!(matches!(file.ast.stmts[def.body], Stmt::Block(_)));
}

#[test]
fn variadic_parameter_position() {
    let file = parse_ok("fun g(x, ...xs) { }");
    let Stmt::Expr { x } = &file.ast.stmts[file.stmts[0]] else {
        panic!("expected expression statement");
    };
    let Expr::Fun(def) = &file.ast.exprs[*x] else {
        panic!("expected function definition");
    };
    assert!(file.ast.params[def.params[1]].ellipsis.is_some());

    assert!(
        parse_errs("fun g(...xs, y) { }").any_contains("can only use ... with final parameter")
    );
}

#[test]
fn missing_semicolon_is_reported() {
    assert!(parse_errs("x = 1 y = 2").any_contains("expected ';'"));
}

#[test]
fn assign_in_rhs_is_reinterpreted_as_equality() {
    assert!(parse_errs("c = (x = y)").any_contains("expected '=='"));
}

#[test]
fn statements_split_by_inserted_semicolons() {
    let file = parse_ok("x = 1\ny = 2");
    assert_eq!(file.stmts.len(), 2);
}
