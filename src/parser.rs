//! Recursive-descent parser with scope resolution.
//!
//! The parser consumes one token of lookahead from the [`Lexer`], builds
//! arena-allocated nodes, opens and closes lexical scopes, installs
//! declarations, and defers unresolved identifiers to an end-of-file
//! package-scope pass. Expressions are parsed Pratt-style over the operator
//! precedence table; all binary operators are left-associative.
//!
//! A token mismatch is reported and parsing continues, usually by
//! synthesizing a `_` identifier or a `Bad` node, so a single parse returns
//! every syntax error in the file at once.

use std::borrow::Cow;

use crate::ast::*;
use crate::error::{Error, Errors};
use crate::lexer::{Lexer, Token, TokenKind, LOWEST_PREC};

/// Parse failure: the diagnostics plus the partial tree, which is still
/// useful for tooling that wants to look at whatever did parse.
#[derive(Debug)]
pub struct ParseFailure<'s> {
    pub file: File<'s>,
    pub errors: Errors,
}

impl std::fmt::Display for ParseFailure<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.errors.fmt(f)
    }
}

impl std::error::Error for ParseFailure<'_> {}

/// Parses one source file.
pub fn parse(src: &str) -> Result<File<'_>, ParseFailure<'_>> {
    Parser::new(src).file()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StmtMode {
    Basic,
    LabelOk,
    InOk,
}

struct Parser<'s> {
    lx: Lexer<'s>,
    tok: Token<'s>,
    ast: Ast<'s>,
    comments: Vec<Comment<'s>>,
    top_scope: Option<ScopeId<'s>>,
    pkg_scope: Option<ScopeId<'s>>,
    unresolved: Vec<ExprId<'s>>,
    errors: Vec<Error>,
    in_rhs: bool,
}

impl<'s> Parser<'s> {
    fn new(src: &'s str) -> Self {
        let mut p = Parser {
            lx: Lexer::new(src),
            tok: Token {
                kind: TokenKind::Eof,
                offset: 0,
                line: 1,
                column: 0,
                lit: Cow::Borrowed(""),
            },
            ast: Ast::new(),
            comments: Vec::new(),
            top_scope: None,
            pkg_scope: None,
            unresolved: Vec::new(),
            errors: Vec::new(),
            in_rhs: false,
        };
        p.next();
        p
    }

    /// Advances to the next significant token. Comments are collected on the
    /// side; `Illegal` tokens become diagnostics (their literal is the
    /// scanner's message) and are skipped.
    fn next(&mut self) {
        loop {
            let t = Lexer::scan(&mut self.lx);
            match t.kind {
                TokenKind::Comment => self.comments.push(Comment { tok: t }),
                TokenKind::Illegal => {
                    let msg = t.lit.to_string();
                    self.errors.push(Error::new(t.offset, t.line, t.column, msg));
                }
                _ => {
                    self.tok = t;
                    return;
                }
            }
        }
    }

    fn error(&mut self, tok: &Token<'s>, msg: impl Into<String>) {
        self.errors
            .push(Error::new(tok.offset, tok.line, tok.column, msg));
    }

    fn expect(&mut self, kind: TokenKind) -> Token<'s> {
        let tok = self.tok.clone();
        if tok.kind != kind {
            self.error(&tok, format!("expected '{kind}'"));
        }
        self.next();
        tok
    }

    /// Statement terminator: a semicolon, elided before `)` and `}`.
    fn expect_semi(&mut self) {
        if self.tok.kind != TokenKind::Rparen && self.tok.kind != TokenKind::Rbrace {
            match self.tok.kind {
                TokenKind::Comma => {
                    let tok = self.tok.clone();
                    self.error(&tok, "expected ';'");
                    self.next();
                }
                TokenKind::Semicolon => self.next(),
                _ => {
                    let tok = self.tok.clone();
                    self.error(&tok, "expected ';'");
                }
            }
        }
    }

    fn at_comma(&mut self, context: &str, follow: TokenKind) -> bool {
        if self.tok.kind == TokenKind::Comma {
            return true;
        }
        if self.tok.kind != follow {
            let mut msg = String::from("missing ','");
            if self.tok.kind == TokenKind::Semicolon && self.tok.lit == "\n" {
                msg.push_str(" before newline");
            }
            let tok = self.tok.clone();
            self.error(&tok, format!("{msg} in {context}"));
            return true; // assume the comma and continue
        }
        false
    }

    fn expect_closing(&mut self, kind: TokenKind, context: &str) -> Token<'s> {
        if self.tok.kind != kind
            && self.tok.kind == TokenKind::Semicolon
            && self.tok.lit == "\n"
        {
            let tok = self.tok.clone();
            self.error(&tok, format!("missing ',' before newline in {context}"));
            self.next();
        }
        self.expect(kind)
    }

    // =========================================================================
    // Scopes, declarations, resolution
    // =========================================================================

    fn open_scope(&mut self) {
        self.top_scope = Some(self.ast.new_scope(self.top_scope));
    }

    fn close_scope(&mut self) {
        if let Some(s) = self.top_scope {
            self.top_scope = self.ast.scopes[s].outer;
        }
    }

    /// Creates an object per identifier and installs it in `scope`. `_` is
    /// never declared; a collision reports exactly one redeclaration error.
    fn declare(
        &mut self,
        decl: DeclRef<'s>,
        scope: ScopeId<'s>,
        kind: ObjKind,
        idents: &[ExprId<'s>],
    ) {
        for &id in idents {
            let (sym, tok) = match self.ast.ident(id) {
                Some(i) => (i.sym, i.tok.clone()),
                None => continue,
            };
            if self.ast.name(sym) == "_" {
                continue;
            }
            let obj = self.ast.objects.alloc(Object {
                kind,
                name: sym,
                decl,
            });
            if let Expr::Ident(i) = &mut self.ast.exprs[id] {
                i.obj = Some(obj);
            }
            if let Some(prev) = self.ast.scopes[scope].insert(sym, obj) {
                let prev_tok = self.ast.decl_token(prev).cloned();
                let name = self.ast.name(sym).to_string();
                let msg = match prev_tok {
                    Some(p) => format!(
                        "{name} redeclared in this block\n\tprevious declaration at {}:{}:{}",
                        p.offset, p.line, p.column
                    ),
                    None => format!("{name} redeclared in this block"),
                };
                self.error(&tok, msg);
            }
        }
    }

    /// Resolves an identifier use against the scope chain; on failure the
    /// identifier is recorded for the end-of-file package-scope pass.
    fn resolve(&mut self, x: ExprId<'s>) {
        self.try_resolve(x, true);
    }

    fn try_resolve(&mut self, x: ExprId<'s>, collect_unresolved: bool) -> bool {
        let sym = match self.ast.ident(x) {
            Some(i) if i.obj.is_none() => i.sym,
            _ => return true,
        };
        if self.ast.name(sym) == "_" {
            return true;
        }
        let mut scope = self.top_scope;
        while let Some(sid) = scope {
            if let Some(obj) = self.ast.scopes[sid].lookup(sym) {
                if let Expr::Ident(i) = &mut self.ast.exprs[x] {
                    i.obj = Some(obj);
                }
                return true;
            }
            scope = self.ast.scopes[sid].outer;
        }
        if collect_unresolved {
            self.unresolved.push(x);
        }
        false
    }

    // =========================================================================
    // Identifiers
    // =========================================================================

    fn ident(&mut self) -> ExprId<'s> {
        if self.tok.kind == TokenKind::Ident {
            let tok = self.tok.clone();
            let sym = self.ast.interner.intern(&tok.lit);
            let id = self.ast.exprs.alloc(Expr::Ident(Ident {
                tok,
                sym,
                obj: None,
            }));
            self.next();
            return id;
        }
        // synthesize a blank identifier at the offending token
        let mut tok = self.tok.clone();
        tok.kind = TokenKind::Ident;
        tok.lit = Cow::Borrowed("_");
        let sym = self.ast.interner.intern("_");
        let id = self.ast.exprs.alloc(Expr::Ident(Ident {
            tok,
            sym,
            obj: None,
        }));
        self.expect(TokenKind::Ident);
        id
    }

    /// IdentifierList = identifier { "," identifier } .
    fn ident_list(&mut self) -> ExprList<'s> {
        let mut list = ExprList::new();
        list.push(self.ident());
        while self.tok.kind == TokenKind::Comma {
            self.next();
            list.push(self.ident());
        }
        list
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn rhs(&mut self) -> ExprId<'s> {
        let old = self.in_rhs;
        self.in_rhs = true;
        let x = self.expr(false);
        self.in_rhs = old;
        x
    }

    fn lhs_list(&mut self) -> ExprList<'s> {
        let old = self.in_rhs;
        self.in_rhs = false;
        let list = self.expr_list(true);
        self.in_rhs = old;
        list
    }

    fn rhs_list(&mut self) -> ExprList<'s> {
        let old = self.in_rhs;
        self.in_rhs = true;
        let list = self.expr_list(false);
        self.in_rhs = old;
        list
    }

    /// ExpressionList = Expression { "," Expression } .
    fn expr_list(&mut self, lhs: bool) -> ExprList<'s> {
        let mut list = ExprList::new();
        list.push(self.expr(lhs));
        while self.tok.kind == TokenKind::Comma {
            self.next();
            list.push(self.expr(lhs));
        }
        list
    }

    /// Expression = UnaryExpr | Expression binary_op Expression .
    fn expr(&mut self, lhs: bool) -> ExprId<'s> {
        self.binary_expr(lhs, LOWEST_PREC + 1)
    }

    // In RHS position `=` denotes equality, not assignment.
    fn typ_prec(&self) -> (TokenKind, u8) {
        let mut typ = self.tok.kind;
        if self.in_rhs && typ == TokenKind::Assign {
            typ = TokenKind::Eql;
        }
        (typ, typ.precedence())
    }

    fn binary_expr(&mut self, mut lhs: bool, prec1: u8) -> ExprId<'s> {
        let mut x = self.unary_expr(lhs);
        loop {
            let (op, oprec) = self.typ_prec();
            if oprec < prec1 {
                return x;
            }
            let tok = self.expect(op);
            if lhs {
                self.resolve(x);
                lhs = false;
            }
            let y = self.binary_expr(false, oprec + 1);
            x = self.ast.exprs.alloc(Expr::Binary { x, op: tok, y });
        }
    }

    /// UnaryExpr = PrimaryExpr | unary_op UnaryExpr .
    fn unary_expr(&mut self, lhs: bool) -> ExprId<'s> {
        match self.tok.kind {
            TokenKind::Add | TokenKind::Sub | TokenKind::Not | TokenKind::Xor | TokenKind::And => {
                let op = self.tok.clone();
                self.next();
                let x = self.unary_expr(false);
                self.ast.exprs.alloc(Expr::Unary { op, x })
            }
            _ => self.primary_expr(lhs),
        }
    }

    /// ArrayLit = "a" AssocLit .
    fn array_lit(&mut self) -> ExprId<'s> {
        let tok = self.tok.clone();
        self.next();
        if self.tok.kind != TokenKind::Lbrace {
            self.error(&tok, "expected '{' after array literal marker");
        }
        self.ast.exprs.alloc(Expr::ArrayLit { tok })
    }

    /// RecordLit = "r" AssocLit .
    fn record_lit(&mut self) -> ExprId<'s> {
        let tok = self.tok.clone();
        self.next();
        if self.tok.kind != TokenKind::Lbrace {
            self.error(&tok, "expected '{' after record literal marker");
        }
        self.ast.exprs.alloc(Expr::RecordLit { tok })
    }

    /// Operand = Literal | OperandName | "(" Expression ")" .
    fn operand(&mut self, lhs: bool) -> ExprId<'s> {
        match self.tok.kind {
            TokenKind::Ident => match self.tok.lit.as_ref() {
                "a" => self.array_lit(),
                "r" => self.record_lit(),
                "true" | "false" => {
                    let value = self.tok.clone();
                    self.next();
                    self.ast.exprs.alloc(Expr::BasicLit { value })
                }
                _ => {
                    let x = self.ident();
                    if !lhs {
                        self.resolve(x);
                    }
                    x
                }
            },
            TokenKind::Int | TokenKind::Float | TokenKind::String => {
                let value = self.tok.clone();
                self.next();
                self.ast.exprs.alloc(Expr::BasicLit { value })
            }
            TokenKind::Lparen => {
                let lparen = self.expect(TokenKind::Lparen);
                let x = self.rhs();
                let rparen = self.expect(TokenKind::Rparen);
                self.ast.exprs.alloc(Expr::Paren { lparen, x, rparen })
            }
            TokenKind::Fun => self.fun_lit(),
            _ => {
                let tok = self.tok.clone();
                self.error(&tok, "expected operand");
                self.ast.exprs.alloc(Expr::Bad {
                    from: tok.clone(),
                    to: tok,
                })
            }
        }
    }

    /// Index = [ "[" ] "[" Expression "]" [ "]" ] .
    /// Slice = "[" [ Expression ] ":" [ Expression ] "]" .
    fn index_or_slice(&mut self, x: ExprId<'s>) -> ExprId<'s> {
        let lbrack = self.expect(TokenKind::Lbrack);
        let mut backwards = false;
        if self.tok.kind == TokenKind::Lbrack {
            self.next();
            backwards = true;
        }
        let mut low = None;
        if self.tok.kind != TokenKind::Colon {
            low = Some(self.rhs());
        }
        let mut slice = false;
        let mut high = None;
        if self.tok.kind == TokenKind::Colon {
            if backwards {
                let tok = self.tok.clone();
                self.error(&tok, "cannot slice a backwards index");
                return self.ast.exprs.alloc(Expr::Bad {
                    from: tok.clone(),
                    to: tok,
                });
            }
            slice = true;
            self.next();
            if self.tok.kind != TokenKind::Rbrack && self.tok.kind != TokenKind::Eof {
                high = Some(self.rhs());
            }
        }
        let rbrack = self.expect(TokenKind::Rbrack);
        if backwards {
            self.expect(TokenKind::Rbrack);
        }
        if slice {
            self.ast.exprs.alloc(Expr::Slice {
                x,
                lbrack,
                low,
                high,
                rbrack,
            })
        } else {
            self.ast.exprs.alloc(Expr::Index {
                x,
                lbrack,
                index: low,
                backwards,
                rbrack,
            })
        }
    }

    fn is_literal_type(&self, x: ExprId<'s>) -> bool {
        match &self.ast.exprs[x] {
            Expr::Bad { .. }
            | Expr::Ident(_)
            | Expr::ArrayLit { .. }
            | Expr::RecordLit { .. } => true,
            Expr::Selector { x, .. } => matches!(self.ast.exprs[*x], Expr::Ident(_)),
            _ => false,
        }
    }

    /// PrimaryExpr = Operand | PrimaryExpr Selector | PrimaryExpr Index |
    ///               PrimaryExpr Slice | PrimaryExpr Arguments .
    fn primary_expr(&mut self, lhs: bool) -> ExprId<'s> {
        let mut x = self.operand(lhs);
        let mut lhs = lhs;
        loop {
            match self.tok.kind {
                TokenKind::Period => {
                    self.next();
                    if lhs {
                        self.resolve(x);
                    }
                    match self.tok.kind {
                        TokenKind::Ident => {
                            let sel = self.ident();
                            x = self.ast.exprs.alloc(Expr::Selector { x, sel });
                        }
                        _ => {
                            let mut tok = self.tok.clone();
                            self.error(&tok, "expected selector");
                            self.next();
                            tok.kind = TokenKind::Ident;
                            tok.lit = Cow::Borrowed("_");
                            let sym = self.ast.interner.intern("_");
                            let sel = self.ast.exprs.alloc(Expr::Ident(Ident {
                                tok,
                                sym,
                                obj: None,
                            }));
                            x = self.ast.exprs.alloc(Expr::Selector { x, sel });
                        }
                    }
                }
                TokenKind::Lbrack => {
                    if lhs {
                        self.resolve(x);
                    }
                    x = self.index_or_slice(x);
                }
                TokenKind::Lparen => {
                    if lhs {
                        self.resolve(x);
                    }
                    x = self.call(x);
                }
                TokenKind::Lbrace => {
                    if self.is_literal_type(x) {
                        if lhs {
                            self.resolve(x);
                        }
                        x = self.literal_value(Some(x));
                    } else {
                        break;
                    }
                }
                _ => break,
            }
            lhs = false;
        }
        x
    }

    fn value(&mut self, key_ok: bool) -> ExprId<'s> {
        if self.tok.kind == TokenKind::Lbrace {
            return self.literal_value(None);
        }
        self.expr(key_ok)
    }

    /// KeyedElement = [ Element ":" ] Element .
    fn element(&mut self) -> ExprId<'s> {
        let x = self.value(true);
        if self.tok.kind == TokenKind::Colon {
            let colon = self.tok.clone();
            self.next();
            let value = self.value(false);
            return self.ast.exprs.alloc(Expr::KeyValue {
                key: x,
                colon,
                value,
            });
        }
        x
    }

    /// AssocLit = "{" [ ElementList [ "," ] ] "}" .
    fn literal_value(&mut self, ty: Option<ExprId<'s>>) -> ExprId<'s> {
        let lbrace = self.expect(TokenKind::Lbrace);
        let mut elts = Vec::new();
        while self.tok.kind != TokenKind::Rbrace && self.tok.kind != TokenKind::Eof {
            elts.push(self.element());
            if !self.at_comma("composite literal", TokenKind::Rbrace) {
                break;
            }
            self.next();
        }
        let rbrace = self.expect_closing(TokenKind::Rbrace, "composite literal");
        self.ast.exprs.alloc(Expr::Composite {
            ty,
            lbrace,
            elts,
            rbrace,
        })
    }

    /// Arguments = "(" [ ExpressionList [ "..." ] [ "," ] ] ")" .
    fn call(&mut self, fun: ExprId<'s>) -> ExprId<'s> {
        let lparen = self.expect(TokenKind::Lparen);
        let mut args = Vec::new();
        let mut ellipsis = None;
        while self.tok.kind != TokenKind::Rparen && self.tok.kind != TokenKind::Eof {
            args.push(self.rhs());
            if self.tok.kind == TokenKind::Ellipsis {
                ellipsis = Some(self.tok.clone());
                self.next();
            }
            if !self.at_comma("argument list", TokenKind::Rparen) {
                break;
            }
            self.next();
        }
        let rparen = self.expect_closing(TokenKind::Rparen, "argument list");
        self.ast.exprs.alloc(Expr::Call {
            fun,
            lparen,
            args,
            ellipsis,
            rparen,
        })
    }

    // =========================================================================
    // Functions
    // =========================================================================

    /// Parameters are declared into the function scope as they are parsed so
    /// the body sees them; `...` is only legal on the final parameter.
    fn parameter_list(&mut self, scope: ScopeId<'s>) -> Vec<ParamId<'s>> {
        let mut list = Vec::new();
        let mut nellipsis = 0usize;
        while self.tok.kind != TokenKind::Rparen && self.tok.kind != TokenKind::Eof {
            let mut ellipsis = None;
            if self.tok.kind == TokenKind::Ellipsis {
                nellipsis += 1;
                ellipsis = Some(self.tok.clone());
                self.next();
            }
            let name = self.ident();
            if self.tok.kind == TokenKind::Comma {
                self.next();
            }
            let param = self.ast.params.alloc(Param { ellipsis, name });
            self.declare(DeclRef::Param(param), scope, ObjKind::Var, &[name]);
            list.push(param);
        }
        let last_has_ellipsis = list
            .last()
            .map(|&p| self.ast.params[p].ellipsis.is_some())
            .unwrap_or(false);
        if nellipsis > 1 || (nellipsis > 0 && !last_has_ellipsis) {
            let tok = self.tok.clone();
            self.error(&tok, "can only use ... with final parameter in list");
        }
        list
    }

    /// FunctionDecl = "fun" [ FunctionName ] Parameters FunctionBody .
    ///
    /// A named definition is declared into the enclosing scope before the
    /// body parses, so recursive references resolve.
    fn fun_lit(&mut self) -> ExprId<'s> {
        let fun = self.expect(TokenKind::Fun);
        let dummy_body = self.ast.stmts.alloc(Stmt::Empty {
            semi: fun.clone(),
            implicit: true,
        });
        let fid = self.ast.exprs.alloc(Expr::Fun(FunDef {
            fun: fun.clone(),
            name: None,
            lparen: fun.clone(),
            params: Vec::new(),
            rparen: fun.clone(),
            body: dummy_body,
        }));
        let mut name = None;
        if self.tok.kind == TokenKind::Ident {
            let n = self.ident();
            name = Some(n);
            if let Some(scope) = self.top_scope {
                self.declare(DeclRef::Fun(fid), scope, ObjKind::Fun, &[n]);
            }
        }
        let scope = self.ast.new_scope(self.top_scope);
        let lparen = self.expect(TokenKind::Lparen);
        let params = if self.tok.kind != TokenKind::Rparen {
            self.parameter_list(scope)
        } else {
            Vec::new()
        };
        let rparen = self.expect(TokenKind::Rparen);
        let body = self.body(scope);
        if let Expr::Fun(def) = &mut self.ast.exprs[fid] {
            def.name = name;
            def.lparen = lparen;
            def.params = params;
            def.rparen = rparen;
            def.body = body;
        }
        fid
    }

    fn body(&mut self, scope: ScopeId<'s>) -> StmtId<'s> {
        let lbrace = self.expect(TokenKind::Lbrace);
        self.top_scope = Some(scope);
        let list = self.stmt_list();
        self.close_scope();
        let rbrace = self.expect(TokenKind::Rbrace);
        self.ast.stmts.alloc(Stmt::Block(Block {
            lbrace,
            list,
            rbrace,
        }))
    }

    // =========================================================================
    // Statements
    // =========================================================================

    /// StatementList = { Statement ";" } .
    fn stmt_list(&mut self) -> Vec<StmtId<'s>> {
        let mut list = Vec::new();
        while !matches!(
            self.tok.kind,
            TokenKind::Case | TokenKind::Default | TokenKind::Rbrace | TokenKind::Eof
        ) {
            list.push(self.stmt());
        }
        list
    }

    /// SimpleStmt = EmptyStmt | ExpressionStmt | IncDecStmt | Assignment .
    ///
    /// Returns the statement and whether it was the header of a `for .. in`.
    fn simple_stmt(&mut self, mode: StmtMode) -> (StmtId<'s>, bool) {
        let xpos = self.tok.clone();
        let x = self.lhs_list();

        if self.tok.kind == TokenKind::In || self.tok.kind.is_assign() {
            let tok = self.tok.clone();
            let is_in = tok.kind == TokenKind::In && mode == StmtMode::InOk;
            self.next();
            let rhs: ExprList<'s> = if is_in {
                let mut one = ExprList::new();
                one.push(self.rhs());
                one
            } else {
                self.rhs_list()
            };
            let lhs = x.clone();
            let sid = self.ast.stmts.alloc(Stmt::Assign { lhs, op: tok.clone(), rhs });
            if tok.kind == TokenKind::Assign || is_in {
                // a plain assignment declares names it cannot resolve
                for &l in &x {
                    if !self.try_resolve(l, false) {
                        if let Some(scope) = self.top_scope {
                            self.declare(DeclRef::Assign(sid), scope, ObjKind::Var, &[l]);
                        }
                    }
                }
            } else {
                for &l in &x {
                    self.resolve(l);
                }
            }
            return (sid, is_in);
        }

        if x.len() > 1 {
            self.error(&xpos, "expected 1 expression");
        }
        let x0 = x[0];

        match self.tok.kind {
            TokenKind::Colon => {
                let colon = self.tok.clone();
                self.next();
                if mode == StmtMode::LabelOk && self.ast.ident(x0).is_some() {
                    // bind the label before its statement so branches inside
                    // the labeled body resolve
                    let dummy = self.ast.stmts.alloc(Stmt::Empty {
                        semi: colon.clone(),
                        implicit: true,
                    });
                    let sid = self.ast.stmts.alloc(Stmt::Labeled {
                        label: x0,
                        colon,
                        stmt: dummy,
                    });
                    if let Some(scope) = self.top_scope {
                        self.declare(DeclRef::Label(sid), scope, ObjKind::Lbl, &[x0]);
                    }
                    let body = self.stmt();
                    if let Stmt::Labeled { stmt, .. } = &mut self.ast.stmts[sid] {
                        *stmt = body;
                    }
                    return (sid, false);
                }
                self.error(&colon, "illegal label declaration");
                let sid = self.ast.stmts.alloc(Stmt::Bad {
                    from: xpos,
                    to: colon,
                });
                (sid, false)
            }
            TokenKind::Inc | TokenKind::Dec => {
                self.resolve(x0);
                let op = self.tok.clone();
                self.next();
                (self.ast.stmts.alloc(Stmt::IncDec { x: x0, op }), false)
            }
            _ => {
                self.resolve(x0);
                (self.ast.stmts.alloc(Stmt::Expr { x: x0 }), false)
            }
        }
    }

    /// ReturnStmt = "return" [ ExpressionList ] .
    fn return_stmt(&mut self) -> StmtId<'s> {
        let ret = self.expect(TokenKind::Return);
        let mut results = ExprList::new();
        if self.tok.kind != TokenKind::Semicolon && self.tok.kind != TokenKind::Rbrace {
            results = self.rhs_list();
        }
        self.expect_semi();
        self.ast.stmts.alloc(Stmt::Return { ret, results })
    }

    /// BreakStmt = "break" [ Label ] .
    /// ContinueStmt = "continue" [ Label ] .
    fn branch_stmt(&mut self, keyword: TokenKind) -> StmtId<'s> {
        let tok = self.expect(keyword);
        let mut label = None;
        if self.tok.kind == TokenKind::Ident {
            let l = self.ident();
            self.resolve(l);
            label = Some(l);
        }
        self.expect_semi();
        self.ast.stmts.alloc(Stmt::Branch { tok, label })
    }

    /// Block = "{" StatementList "}" .
    fn block_stmt(&mut self) -> StmtId<'s> {
        let lbrace = self.expect(TokenKind::Lbrace);
        self.open_scope();
        let list = self.stmt_list();
        self.close_scope();
        let rbrace = self.expect(TokenKind::Rbrace);
        self.ast.stmts.alloc(Stmt::Block(Block {
            lbrace,
            list,
            rbrace,
        }))
    }

    fn make_expr(
        &mut self,
        s: StmtId<'s>,
        beg: &Token<'s>,
        end: &Token<'s>,
        want: &str,
    ) -> ExprId<'s> {
        if let Stmt::Expr { x } = &self.ast.stmts[s] {
            return *x;
        }
        let found = if matches!(&self.ast.stmts[s], Stmt::Assign { .. }) {
            "assignment"
        } else {
            "simple statement"
        };
        self.error(
            beg,
            format!("expected {want}, found {found} (missing parentheses around composite literal?)"),
        );
        self.ast.exprs.alloc(Expr::Bad {
            from: beg.clone(),
            to: end.clone(),
        })
    }

    fn if_header(&mut self) -> (Option<StmtId<'s>>, ExprId<'s>) {
        if self.tok.kind == TokenKind::Lbrace {
            let tok = self.tok.clone();
            self.error(&tok, "missing condition in if statement");
            let bad = self.ast.exprs.alloc(Expr::Bad {
                from: tok.clone(),
                to: tok,
            });
            return (None, bad);
        }
        let mut init = None;
        let mut cbeg = self.tok.clone();
        let mut cend = self.tok.clone();
        if self.tok.kind != TokenKind::Semicolon {
            if self.tok.kind == TokenKind::Var {
                self.next();
                let tok = self.tok.clone();
                self.error(&tok, "var declaration not allowed in 'if' initializer");
            }
            cbeg = self.tok.clone();
            let (s, _) = self.simple_stmt(StmtMode::Basic);
            init = Some(s);
            cend = self.tok.clone();
        }
        let mut cond_stmt = None;
        let mut semi: Option<Token<'s>> = None;
        if self.tok.kind != TokenKind::Lbrace {
            if self.tok.kind == TokenKind::Semicolon {
                semi = Some(self.tok.clone());
                self.next();
            } else {
                self.expect(TokenKind::Semicolon);
            }
            if self.tok.kind != TokenKind::Lbrace {
                cbeg = self.tok.clone();
                let (s, _) = self.simple_stmt(StmtMode::Basic);
                cond_stmt = Some(s);
                cend = self.tok.clone();
            }
        } else {
            cond_stmt = init.take();
        }
        let cond = match cond_stmt {
            Some(cs) => Some(self.make_expr(cs, &cbeg, &cend, "boolean expression")),
            None => {
                match semi {
                    Some(t) if t.lit == "\n" => {
                        self.error(&t, "unexpected newline, expecting { after if clause")
                    }
                    Some(t) => self.error(&t, "missing condition in if statement"),
                    None => {
                        let t = self.tok.clone();
                        self.error(&t, "missing condition in if statement")
                    }
                }
                None
            }
        };
        let cond = cond.unwrap_or_else(|| {
            let t = self.tok.clone();
            self.ast.exprs.alloc(Expr::Bad {
                from: t.clone(),
                to: t,
            })
        });
        (init, cond)
    }

    /// IfStmt = "if" [ SimpleStmt ";" ] Expression Block
    ///          [ "else" ( IfStmt | Block ) ] .
    fn if_stmt(&mut self) -> StmtId<'s> {
        let tok = self.expect(TokenKind::If);
        self.open_scope();
        let (init, cond) = self.if_header();
        let body = self.block_stmt();
        let mut alt = None;
        if self.tok.kind == TokenKind::Else {
            self.next();
            match self.tok.kind {
                TokenKind::If => alt = Some(self.if_stmt()),
                TokenKind::Lbrace => {
                    alt = Some(self.block_stmt());
                    self.expect_semi();
                }
                _ => {
                    let t = self.tok.clone();
                    self.error(&t, "expected if statement or block");
                    alt = Some(self.ast.stmts.alloc(Stmt::Bad {
                        from: t.clone(),
                        to: t,
                    }));
                }
            }
        } else {
            self.expect_semi();
        }
        self.close_scope();
        self.ast.stmts.alloc(Stmt::If {
            tok,
            init,
            cond,
            body,
            alt,
        })
    }

    /// CaseClause = ( "case" ExpressionList | "default" ) ":" StatementList .
    fn case_clause(&mut self) -> StmtId<'s> {
        let tok = self.tok.clone();
        let mut list = Vec::new();
        if self.tok.kind == TokenKind::Case {
            self.next();
            list = self.rhs_list().into_vec();
        } else {
            self.expect(TokenKind::Default);
        }
        let colon = self.expect(TokenKind::Colon);
        self.open_scope();
        let body = self.stmt_list();
        self.close_scope();
        self.ast.stmts.alloc(Stmt::Case(CaseClause {
            tok,
            list,
            colon,
            body,
        }))
    }

    /// ExprSwitchStmt = "switch" [ SimpleStmt ";" ] [ Expression ]
    ///                  "{" { CaseClause } "}" .
    fn switch_stmt(&mut self) -> StmtId<'s> {
        let tok = self.expect(TokenKind::Switch);
        self.open_scope();
        let mut init = None;
        let mut tag = None;
        if self.tok.kind != TokenKind::Lbrace {
            if self.tok.kind != TokenKind::Semicolon {
                let (s, _) = self.simple_stmt(StmtMode::Basic);
                init = Some(s);
            }
            if self.tok.kind == TokenKind::Semicolon {
                self.next();
                if self.tok.kind != TokenKind::Lbrace {
                    tag = Some(self.expr(false));
                }
            }
        }
        // a bare `switch x { }` header: the expression statement becomes the tag
        if tag.is_none() {
            if let Some(s) = init {
                if let Stmt::Expr { x } = &self.ast.stmts[s] {
                    tag = Some(*x);
                    init = None;
                }
            }
        }
        let lbrace = self.expect(TokenKind::Lbrace);
        let mut list = Vec::new();
        while self.tok.kind == TokenKind::Case || self.tok.kind == TokenKind::Default {
            list.push(self.case_clause());
        }
        let rbrace = self.expect(TokenKind::Rbrace);
        self.expect_semi();
        let body = self.ast.stmts.alloc(Stmt::Block(Block {
            lbrace,
            list,
            rbrace,
        }));
        self.close_scope();
        self.ast.stmts.alloc(Stmt::Switch {
            tok,
            init,
            tag,
            body,
        })
    }

    /// ForStmt = "for" [ Condition | ForClause | InClause ] Block .
    ///
    /// An `in` token where an assignment operator would go classifies the
    /// header as an in-statement; the LHS count selects `(key)`,
    /// `(key, value)`, or `(index, key, value)` destructuring.
    fn for_stmt(&mut self) -> StmtId<'s> {
        let tok = self.expect(TokenKind::For);
        self.open_scope();

        let mut s1 = None;
        let mut s2 = None;
        let mut s3 = None;
        let mut is_in = false;
        let mut c2beg = self.tok.clone();
        let mut c2end = self.tok.clone();
        if self.tok.kind != TokenKind::Lbrace {
            if self.tok.kind != TokenKind::Semicolon {
                c2beg = self.tok.clone();
                if self.tok.kind == TokenKind::In {
                    // "for in x"
                    let in_tok = self.tok.clone();
                    self.next();
                    let mut rhs = ExprList::new();
                    rhs.push(self.rhs());
                    s2 = Some(self.ast.stmts.alloc(Stmt::Assign {
                        lhs: ExprList::new(),
                        op: in_tok,
                        rhs,
                    }));
                    is_in = true;
                } else {
                    let (s, flag) = self.simple_stmt(StmtMode::InOk);
                    s2 = Some(s);
                    is_in = flag;
                }
                c2end = self.tok.clone();
            }
            if !is_in && self.tok.kind == TokenKind::Semicolon {
                self.next();
                s1 = s2.take();
                if self.tok.kind != TokenKind::Semicolon {
                    c2beg = self.tok.clone();
                    let (s, _) = self.simple_stmt(StmtMode::Basic);
                    s2 = Some(s);
                    c2end = self.tok.clone();
                }
                self.expect_semi();
                if self.tok.kind != TokenKind::Lbrace {
                    let (s, _) = self.simple_stmt(StmtMode::Basic);
                    s3 = Some(s);
                }
            }
        }
        let body = self.block_stmt();
        let endb = self.tok.clone();
        self.expect_semi();
        self.close_scope();

        if is_in {
            let Some(header) = s2 else {
                return self.ast.stmts.alloc(Stmt::Bad {
                    from: tok,
                    to: endb,
                });
            };
            let (lhs, op, x) = match &self.ast.stmts[header] {
                Stmt::Assign { lhs, op, rhs } => {
                    (lhs.clone(), op.clone(), rhs.first().copied())
                }
                _ => (ExprList::new(), tok.clone(), None),
            };
            let Some(x) = x else {
                return self.ast.stmts.alloc(Stmt::Bad {
                    from: tok,
                    to: endb,
                });
            };
            let (index, key, value) = match lhs.len() {
                0 => (None, None, None),
                1 => (None, Some(lhs[0]), None),
                2 => (None, Some(lhs[0]), Some(lhs[1])),
                3 => (Some(lhs[0]), Some(lhs[1]), Some(lhs[2])),
                _ => {
                    self.error(&endb, "expected at most 3 expressions in for..in header");
                    return self.ast.stmts.alloc(Stmt::Bad {
                        from: tok,
                        to: endb,
                    });
                }
            };
            return self.ast.stmts.alloc(Stmt::In {
                tok,
                index,
                key,
                value,
                op,
                x,
                body,
            });
        }

        let cond = s2.map(|s| self.make_expr(s, &c2beg, &c2end, "boolean or in expression"));
        self.ast.stmts.alloc(Stmt::For {
            tok,
            init: s1,
            cond,
            post: s3,
            body,
        })
    }

    /// Statement = Declaration | LabeledStmt | SimpleStmt | ReturnStmt |
    ///             BreakStmt | ContinueStmt | Block | IfStmt | SwitchStmt |
    ///             ForStmt .
    fn stmt(&mut self) -> StmtId<'s> {
        match self.tok.kind {
            TokenKind::Var => {
                let decl = self.gen_decl(TokenKind::Var, Self::value_spec);
                self.ast.stmts.alloc(Stmt::Decl(decl))
            }
            TokenKind::Ident
            | TokenKind::Int
            | TokenKind::Float
            | TokenKind::String
            | TokenKind::Fun
            | TokenKind::Lparen
            | TokenKind::Add
            | TokenKind::Sub
            | TokenKind::Mul
            | TokenKind::And
            | TokenKind::Xor
            | TokenKind::Not => {
                let (s, _) = self.simple_stmt(StmtMode::LabelOk);
                if !matches!(self.ast.stmts[s], Stmt::Labeled { .. }) {
                    self.expect_semi();
                }
                s
            }
            TokenKind::Return => self.return_stmt(),
            TokenKind::Break | TokenKind::Continue => self.branch_stmt(self.tok.kind),
            TokenKind::Lbrace => {
                let s = self.block_stmt();
                self.expect_semi();
                s
            }
            TokenKind::If => self.if_stmt(),
            TokenKind::Switch => self.switch_stmt(),
            TokenKind::For => self.for_stmt(),
            TokenKind::Semicolon => {
                let semi = self.tok.clone();
                let implicit = semi.lit != ";";
                self.next();
                self.ast.stmts.alloc(Stmt::Empty { semi, implicit })
            }
            TokenKind::Rbrace => {
                let semi = self.tok.clone();
                self.ast.stmts.alloc(Stmt::Empty {
                    semi,
                    implicit: true,
                })
            }
            _ => {
                let from = self.tok.clone();
                self.error(&from, "expected statement");
                self.next();
                let to = self.tok.clone();
                self.ast.stmts.alloc(Stmt::Bad { from, to })
            }
        }
    }

    // =========================================================================
    // Declarations
    // =========================================================================

    fn gen_decl(
        &mut self,
        keyword: TokenKind,
        f: fn(&mut Self) -> SpecId<'s>,
    ) -> GenDecl<'s> {
        let kw = self.expect(keyword);
        let mut decl = GenDecl {
            keyword: kw,
            lparen: None,
            specs: Vec::new(),
            rparen: None,
        };
        if self.tok.kind == TokenKind::Lparen {
            decl.lparen = Some(self.tok.clone());
            self.next();
            while self.tok.kind != TokenKind::Rparen && self.tok.kind != TokenKind::Eof {
                decl.specs.push(f(self));
            }
            decl.rparen = Some(self.expect(TokenKind::Rparen));
            self.expect_semi();
        } else {
            decl.specs.push(f(self));
        }
        decl
    }

    /// UseSpec = [ "." | PackageName ] UsePath ";" .
    fn use_spec(&mut self) -> SpecId<'s> {
        let mut name = None;
        let mut is_dot = false;
        match self.tok.kind {
            TokenKind::Period => {
                let mut tok = self.tok.clone();
                tok.kind = TokenKind::Ident;
                tok.lit = Cow::Borrowed(".");
                let sym = self.ast.interner.intern(".");
                name = Some(self.ast.exprs.alloc(Expr::Ident(Ident {
                    tok,
                    sym,
                    obj: None,
                })));
                is_dot = true;
                self.next();
            }
            TokenKind::Ident => name = Some(self.ident()),
            _ => {}
        }
        let path = self.tok.clone();
        self.expect(TokenKind::String);
        let spec = self.ast.specs.alloc(Spec::Use(UseSpec { name, path }));
        if !is_dot {
            if let (Some(n), Some(scope)) = (name, self.top_scope) {
                self.declare(DeclRef::Use(spec), scope, ObjKind::Pkg, &[n]);
            }
        }
        self.expect_semi();
        spec
    }

    /// VarSpec = IdentifierList [ "=" ExpressionList ] ";" .
    fn value_spec(&mut self) -> SpecId<'s> {
        let names = self.ident_list();
        let mut values = ExprList::new();
        if self.tok.kind == TokenKind::Assign {
            self.next();
            values = self.rhs_list();
        }
        self.expect_semi();
        let spec = self.ast.specs.alloc(Spec::Value(ValueSpec {
            names: names.clone(),
            values,
        }));
        if let Some(scope) = self.top_scope {
            self.declare(DeclRef::Value(spec), scope, ObjKind::Var, &names);
        }
        spec
    }

    // =========================================================================
    // File
    // =========================================================================

    /// SourceFile = [ "pkg" Ident ";" ] { UseDecl ";" } { Statement ";" } .
    fn file(mut self) -> Result<File<'s>, ParseFailure<'s>> {
        let mut package = None;
        if self.tok.kind == TokenKind::Pkg {
            let pkg = self.tok.clone();
            self.next();
            let name = self.expect(TokenKind::Ident);
            self.expect_semi();
            package = Some(PackageDecl { pkg, name });
        }

        self.open_scope();
        self.pkg_scope = self.top_scope;

        let mut decls = Vec::new();
        while self.tok.kind == TokenKind::Use {
            decls.push(self.gen_decl(TokenKind::Use, Self::use_spec));
        }
        let mut stmts = Vec::new();
        while self.tok.kind != TokenKind::Eof {
            stmts.push(self.stmt());
        }
        self.close_scope();

        // retry unresolved identifiers against the package scope
        let pkg_scope = self
            .pkg_scope
            .unwrap_or_else(|| self.ast.new_scope(None));
        let mut still_unresolved = Vec::new();
        for id in std::mem::take(&mut self.unresolved) {
            let sym = match self.ast.ident(id) {
                Some(i) if i.obj.is_none() => i.sym,
                _ => continue,
            };
            match self.ast.scopes[pkg_scope].lookup(sym) {
                Some(obj) => {
                    if let Expr::Ident(i) = &mut self.ast.exprs[id] {
                        i.obj = Some(obj);
                    }
                }
                None => still_unresolved.push(id),
            }
        }

        let file = File {
            ast: self.ast,
            package,
            decls,
            stmts,
            scope: pkg_scope,
            unresolved: still_unresolved,
            comments: CommentGroup {
                list: self.comments,
            },
        };
        if self.errors.is_empty() {
            Ok(file)
        } else {
            Err(ParseFailure {
                file,
                errors: Errors(self.errors),
            })
        }
    }
}
