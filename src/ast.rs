//! Syntax tree for Loam source files.
//!
//! All nodes live in typed arenas inside [`Ast`] and reference each other
//! through `la_arena` indices, so every expression, statement, object, and
//! scope has a stable `Copy` identity; downstream passes key side tables
//! (most importantly the inferred-type map) by these indices. Identifier
//! text is interned to compact [`Symbol`]s; nodes keep the tokens that
//! delimit them for diagnostics.

use std::collections::HashMap;

use la_arena::{Arena, Idx};
use smallvec::SmallVec;

use crate::lexer::Token;

pub type ExprId<'s> = Idx<Expr<'s>>;
pub type StmtId<'s> = Idx<Stmt<'s>>;
pub type SpecId<'s> = Idx<Spec<'s>>;
pub type ParamId<'s> = Idx<Param<'s>>;
pub type ObjectId<'s> = Idx<Object<'s>>;
pub type ScopeId<'s> = Idx<Scope<'s>>;

/// Statement-level expression lists are almost always one or two entries.
pub type ExprList<'s> = SmallVec<[ExprId<'s>; 2]>;

// =============================================================================
// Symbol interning
// =============================================================================

/// An interned string handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Symbol(u32);

impl Symbol {
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

/// Simple string interner.
///
/// `intern` deduplicates identifiers, `resolve` retrieves the original text.
#[derive(Debug, Default)]
pub struct Interner {
    map: HashMap<Box<str>, Symbol>,
    vec: Vec<Box<str>>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, s: &str) -> Symbol {
        if let Some(&sym) = self.map.get(s) {
            return sym;
        }
        let boxed: Box<str> = s.into();
        let sym = Symbol(self.vec.len() as u32);
        self.map.insert(boxed.clone(), sym);
        self.vec.push(boxed);
        sym
    }

    pub fn resolve(&self, sym: Symbol) -> &str {
        &self.vec[sym.0 as usize]
    }
}

// =============================================================================
// Expressions
// =============================================================================

/// An identifier occurrence: its token, interned name, and, once resolution
/// has run, the object it denotes.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident<'s> {
    pub tok: Token<'s>,
    pub sym: Symbol,
    pub obj: Option<ObjectId<'s>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunDef<'s> {
    pub fun: Token<'s>,
    pub name: Option<ExprId<'s>>,
    pub lparen: Token<'s>,
    pub params: Vec<ParamId<'s>>,
    pub rparen: Token<'s>,
    pub body: StmtId<'s>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param<'s> {
    pub ellipsis: Option<Token<'s>>,
    pub name: ExprId<'s>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr<'s> {
    Bad {
        from: Token<'s>,
        to: Token<'s>,
    },
    Ident(Ident<'s>),
    BasicLit {
        value: Token<'s>,
    },
    /// The `a` marker that heads an associative-array literal.
    ArrayLit {
        tok: Token<'s>,
    },
    /// The `r` marker that heads a record literal.
    RecordLit {
        tok: Token<'s>,
    },
    Composite {
        ty: Option<ExprId<'s>>,
        lbrace: Token<'s>,
        elts: Vec<ExprId<'s>>,
        rbrace: Token<'s>,
    },
    Paren {
        lparen: Token<'s>,
        x: ExprId<'s>,
        rparen: Token<'s>,
    },
    Selector {
        x: ExprId<'s>,
        sel: ExprId<'s>,
    },
    /// `x[i]`, or the backwards form `x[[i]]` addressing an array by value.
    Index {
        x: ExprId<'s>,
        lbrack: Token<'s>,
        index: Option<ExprId<'s>>,
        backwards: bool,
        rbrack: Token<'s>,
    },
    Slice {
        x: ExprId<'s>,
        lbrack: Token<'s>,
        low: Option<ExprId<'s>>,
        high: Option<ExprId<'s>>,
        rbrack: Token<'s>,
    },
    Call {
        fun: ExprId<'s>,
        lparen: Token<'s>,
        args: Vec<ExprId<'s>>,
        ellipsis: Option<Token<'s>>,
        rparen: Token<'s>,
    },
    Unary {
        op: Token<'s>,
        x: ExprId<'s>,
    },
    Binary {
        x: ExprId<'s>,
        op: Token<'s>,
        y: ExprId<'s>,
    },
    KeyValue {
        key: ExprId<'s>,
        colon: Token<'s>,
        value: ExprId<'s>,
    },
    Fun(FunDef<'s>),
}

// =============================================================================
// Statements
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Block<'s> {
    pub lbrace: Token<'s>,
    pub list: Vec<StmtId<'s>>,
    pub rbrace: Token<'s>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseClause<'s> {
    pub tok: Token<'s>,
    pub list: Vec<ExprId<'s>>,
    pub colon: Token<'s>,
    pub body: Vec<StmtId<'s>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt<'s> {
    Bad {
        from: Token<'s>,
        to: Token<'s>,
    },
    Decl(GenDecl<'s>),
    Empty {
        semi: Token<'s>,
        /// False for an explicit `;`, true for one the scanner inserted.
        implicit: bool,
    },
    Labeled {
        label: ExprId<'s>,
        colon: Token<'s>,
        stmt: StmtId<'s>,
    },
    Expr {
        x: ExprId<'s>,
    },
    IncDec {
        x: ExprId<'s>,
        op: Token<'s>,
    },
    Assign {
        lhs: ExprList<'s>,
        op: Token<'s>,
        rhs: ExprList<'s>,
    },
    Return {
        ret: Token<'s>,
        results: ExprList<'s>,
    },
    Branch {
        tok: Token<'s>,
        label: Option<ExprId<'s>>,
    },
    Block(Block<'s>),
    If {
        tok: Token<'s>,
        init: Option<StmtId<'s>>,
        cond: ExprId<'s>,
        body: StmtId<'s>,
        alt: Option<StmtId<'s>>,
    },
    Switch {
        tok: Token<'s>,
        init: Option<StmtId<'s>>,
        tag: Option<ExprId<'s>>,
        body: StmtId<'s>,
    },
    Case(CaseClause<'s>),
    For {
        tok: Token<'s>,
        init: Option<StmtId<'s>>,
        cond: Option<ExprId<'s>>,
        post: Option<StmtId<'s>>,
        body: StmtId<'s>,
    },
    /// `for [index,] [key[, value]] in x { ... }`.
    In {
        tok: Token<'s>,
        index: Option<ExprId<'s>>,
        key: Option<ExprId<'s>>,
        value: Option<ExprId<'s>>,
        op: Token<'s>,
        x: ExprId<'s>,
        body: StmtId<'s>,
    },
}

// =============================================================================
// Declarations and specs
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct GenDecl<'s> {
    pub keyword: Token<'s>,
    pub lparen: Option<Token<'s>>,
    pub specs: Vec<SpecId<'s>>,
    pub rparen: Option<Token<'s>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UseSpec<'s> {
    pub name: Option<ExprId<'s>>,
    pub path: Token<'s>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueSpec<'s> {
    pub names: ExprList<'s>,
    pub values: ExprList<'s>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Spec<'s> {
    Use(UseSpec<'s>),
    Value(ValueSpec<'s>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PackageDecl<'s> {
    pub pkg: Token<'s>,
    pub name: Token<'s>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment<'s> {
    pub tok: Token<'s>,
}

/// The comments of a file, in source order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommentGroup<'s> {
    pub list: Vec<Comment<'s>>,
}

// =============================================================================
// Scopes and objects
// =============================================================================

/// What a declared name denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjKind {
    Bad,
    Pkg,
    Con,
    Typ,
    Var,
    Fun,
    Lbl,
}

/// The declaring node of an [`Object`], a closed sum over the forms that can
/// introduce names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclRef<'s> {
    Param(ParamId<'s>),
    Use(SpecId<'s>),
    Value(SpecId<'s>),
    Fun(ExprId<'s>),
    Label(StmtId<'s>),
    Assign(StmtId<'s>),
}

/// A named declaration; identifiers that resolve to the same declaration
/// share one `Object`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object<'s> {
    pub kind: ObjKind,
    pub name: Symbol,
    pub decl: DeclRef<'s>,
}

/// A lexical scope: insert-only name bindings plus the enclosing scope.
#[derive(Debug, Default)]
pub struct Scope<'s> {
    pub outer: Option<ScopeId<'s>>,
    entries: HashMap<Symbol, ObjectId<'s>>,
}

impl<'s> Scope<'s> {
    pub fn new(outer: Option<ScopeId<'s>>) -> Self {
        Self {
            outer,
            entries: HashMap::new(),
        }
    }

    /// Inserts `obj` under `name` unless the name is already bound, in which
    /// case the existing binding is returned and the scope is unchanged.
    pub fn insert(&mut self, name: Symbol, obj: ObjectId<'s>) -> Option<ObjectId<'s>> {
        match self.entries.get(&name) {
            Some(&alt) => Some(alt),
            None => {
                self.entries.insert(name, obj);
                None
            }
        }
    }

    pub fn lookup(&self, name: Symbol) -> Option<ObjectId<'s>> {
        self.entries.get(&name).copied()
    }
}

// =============================================================================
// The arena
// =============================================================================

/// Owns every node of one parsed file.
#[derive(Debug, Default)]
pub struct Ast<'s> {
    pub exprs: Arena<Expr<'s>>,
    pub stmts: Arena<Stmt<'s>>,
    pub specs: Arena<Spec<'s>>,
    pub params: Arena<Param<'s>>,
    pub objects: Arena<Object<'s>>,
    pub scopes: Arena<Scope<'s>>,
    pub interner: Interner,
}

impl<'s> Ast<'s> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_scope(&mut self, outer: Option<ScopeId<'s>>) -> ScopeId<'s> {
        self.scopes.alloc(Scope::new(outer))
    }

    /// The identifier data of `e`, if `e` is an identifier.
    pub fn ident(&self, e: ExprId<'s>) -> Option<&Ident<'s>> {
        match &self.exprs[e] {
            Expr::Ident(id) => Some(id),
            _ => None,
        }
    }

    pub fn name(&self, sym: Symbol) -> &str {
        self.interner.resolve(sym)
    }

    /// The first token of an expression, used to anchor diagnostics.
    pub fn expr_token(&self, e: ExprId<'s>) -> &Token<'s> {
        match &self.exprs[e] {
            Expr::Bad { from, .. } => from,
            Expr::Ident(id) => &id.tok,
            Expr::BasicLit { value } => value,
            Expr::ArrayLit { tok } | Expr::RecordLit { tok } => tok,
            Expr::Composite { ty, lbrace, .. } => match ty {
                Some(t) => self.expr_token(*t),
                None => lbrace,
            },
            Expr::Paren { lparen, .. } => lparen,
            Expr::Selector { x, .. }
            | Expr::Index { x, .. }
            | Expr::Slice { x, .. }
            | Expr::Binary { x, .. } => self.expr_token(*x),
            Expr::Call { fun, .. } => self.expr_token(*fun),
            Expr::Unary { op, .. } => op,
            Expr::KeyValue { key, .. } => self.expr_token(*key),
            Expr::Fun(def) => &def.fun,
        }
    }

    /// The first token of a statement.
    pub fn stmt_token(&self, s: StmtId<'s>) -> &Token<'s> {
        match &self.stmts[s] {
            Stmt::Bad { from, .. } => from,
            Stmt::Decl(d) => &d.keyword,
            Stmt::Empty { semi, .. } => semi,
            Stmt::Labeled { label, .. } => self.expr_token(*label),
            Stmt::Expr { x } => self.expr_token(*x),
            Stmt::IncDec { x, .. } => self.expr_token(*x),
            Stmt::Assign { lhs, op, .. } => match lhs.first() {
                Some(&l) => self.expr_token(l),
                None => op,
            },
            Stmt::Return { ret, .. } => ret,
            Stmt::Branch { tok, .. } => tok,
            Stmt::Block(b) => &b.lbrace,
            Stmt::If { tok, .. }
            | Stmt::Switch { tok, .. }
            | Stmt::For { tok, .. }
            | Stmt::In { tok, .. } => tok,
            Stmt::Case(c) => &c.tok,
        }
    }

    /// The token of the identifier that declared `obj`, for "previous
    /// declaration at ..." notes.
    pub fn decl_token(&self, obj: ObjectId<'s>) -> Option<&Token<'s>> {
        let o = &self.objects[obj];
        match o.decl {
            DeclRef::Param(p) => self.ident(self.params[p].name).map(|i| &i.tok),
            DeclRef::Use(s) => match &self.specs[s] {
                Spec::Use(u) => match u.name {
                    Some(n) => self.ident(n).map(|i| &i.tok),
                    None => Some(&u.path),
                },
                _ => None,
            },
            DeclRef::Value(s) => match &self.specs[s] {
                Spec::Value(v) => self.find_ident(&v.names, o.name),
                _ => None,
            },
            DeclRef::Fun(f) => match &self.exprs[f] {
                Expr::Fun(def) => def.name.and_then(|n| self.ident(n)).map(|i| &i.tok),
                _ => None,
            },
            DeclRef::Label(st) => match &self.stmts[st] {
                Stmt::Labeled { label, .. } => self.ident(*label).map(|i| &i.tok),
                _ => None,
            },
            DeclRef::Assign(st) => match &self.stmts[st] {
                Stmt::Assign { lhs, .. } => self.find_ident(lhs, o.name),
                _ => None,
            },
        }
    }

    fn find_ident(&self, list: &[ExprId<'s>], name: Symbol) -> Option<&Token<'s>> {
        list.iter()
            .filter_map(|&e| self.ident(e))
            .find(|i| i.sym == name)
            .map(|i| &i.tok)
    }
}

// =============================================================================
// File
// =============================================================================

/// One parsed source file: the arena, the top-level structure, the package
/// scope, and the identifiers that stayed unresolved after the end-of-file
/// package-scope pass.
#[derive(Debug)]
pub struct File<'s> {
    pub ast: Ast<'s>,
    pub package: Option<PackageDecl<'s>>,
    pub decls: Vec<GenDecl<'s>>,
    pub stmts: Vec<StmtId<'s>>,
    pub scope: ScopeId<'s>,
    pub unresolved: Vec<ExprId<'s>>,
    pub comments: CommentGroup<'s>,
}

/// A group of files compiled together. Multi-file resolution is the
/// driver's job; the front-end only ever fills in one file at a time.
#[derive(Debug, Default)]
pub struct Package<'s> {
    pub files: Vec<File<'s>>,
}
