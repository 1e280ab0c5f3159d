//! Single-pass bidirectional type inference.
//!
//! The checker walks the tree once with pre/post hooks, reading and writing
//! a mapping from expression identity to a type cell. Types it cannot pin
//! down yet are held open with the `Or`/`Same` lattice: `Or(a, b)` is an
//! unresolved choice, `Same(t)` an alias of another slot. Function parameter
//! types flow backwards from call sites. Errors accumulate; inference never
//! aborts.
//!
//! Uses and definitions of a name share one slot: `get`/`set` on an
//! identifier redirect through its object to the canonical declaring
//! identifier before touching the map.

use std::collections::HashMap;

use la_arena::{Arena, Idx};

use crate::ast::{
    Ast, DeclRef, Expr, ExprId, File, FunDef, ObjectId, ParamId, Spec, Stmt, StmtId,
};
use crate::error::{Error, Errors};
use crate::lexer::{Token, TokenKind};
use crate::walk::{walk_file, Node, Visitor};

pub type TyId<'s> = Idx<Ty<'s>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Basic {
    Bool,
    Num,
    String,
}

/// A record or array element type: key/value, either side possibly unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element<'s> {
    pub key: TyId<'s>,
    pub value: TyId<'s>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature<'s> {
    pub params: Vec<TyId<'s>>,
    pub results: Vec<TyId<'s>>,
    pub variadic: bool,
}

/// Transient per-call-site type bridging arguments and the callee's
/// signature; collapsed away before types are published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation<'s> {
    pub arg_len: usize,
    pub args: Vec<TyId<'s>>,
    pub spread: bool,
    pub sig: Option<Signature<'s>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ty<'s> {
    /// Not yet determined; matches everything.
    None,
    Basic(Basic),
    Array {
        key: TyId<'s>,
        value: TyId<'s>,
    },
    Record {
        elts: Vec<Element<'s>>,
    },
    Tuple(Vec<TyId<'s>>),
    Signature(Signature<'s>),
    Invocation(Invocation<'s>),
    /// Unresolved choice: the expression's type is one of the two.
    Or(TyId<'s>, TyId<'s>),
    /// Late-bound alias of another type slot.
    Same(TyId<'s>),
    Label(Option<ObjectId<'s>>),
    Element(Element<'s>),
}

// =============================================================================
// Type map
// =============================================================================

/// The expression-to-type mapping plus the arena of type cells it points into.
#[derive(Debug)]
pub struct TypeMap<'s> {
    cells: Arena<Ty<'s>>,
    map: HashMap<ExprId<'s>, TyId<'s>>,
    none: TyId<'s>,
    bool_: TyId<'s>,
    num: TyId<'s>,
    string: TyId<'s>,
}

impl<'s> TypeMap<'s> {
    pub fn new() -> Self {
        let mut cells = Arena::new();
        let none = cells.alloc(Ty::None);
        let bool_ = cells.alloc(Ty::Basic(Basic::Bool));
        let num = cells.alloc(Ty::Basic(Basic::Num));
        let string = cells.alloc(Ty::Basic(Basic::String));
        Self {
            cells,
            map: HashMap::new(),
            none,
            bool_,
            num,
            string,
        }
    }

    pub fn none_id(&self) -> TyId<'s> {
        self.none
    }

    pub fn basic_id(&self, b: Basic) -> TyId<'s> {
        match b {
            Basic::Bool => self.bool_,
            Basic::Num => self.num,
            Basic::String => self.string,
        }
    }

    pub fn ty(&self, id: TyId<'s>) -> &Ty<'s> {
        &self.cells[id]
    }

    pub fn is_none(&self, id: TyId<'s>) -> bool {
        matches!(self.cells[id], Ty::None)
    }

    pub fn alloc(&mut self, ty: Ty<'s>) -> TyId<'s> {
        match ty {
            Ty::None => self.none,
            Ty::Basic(b) => self.basic_id(b),
            other => self.cells.alloc(other),
        }
    }

    /// Canonicalizes an identifier to its declaring identifier so uses and
    /// definitions share a single type slot. Non-identifiers and unknown
    /// names key under themselves.
    fn redirect(&self, ast: &Ast<'s>, e: ExprId<'s>) -> ExprId<'s> {
        let Some(ident) = ast.ident(e) else { return e };
        let Some(oid) = ident.obj else { return e };
        let obj = &ast.objects[oid];
        match (obj.kind, obj.decl) {
            (crate::ast::ObjKind::Fun, DeclRef::Fun(f)) => match &ast.exprs[f] {
                Expr::Fun(def) => def.name.unwrap_or(e),
                _ => e,
            },
            (crate::ast::ObjKind::Var, DeclRef::Param(p)) => ast.params[p].name,
            (crate::ast::ObjKind::Var, DeclRef::Assign(st)) => match &ast.stmts[st] {
                Stmt::Assign { lhs, .. } => lhs
                    .iter()
                    .copied()
                    .find(|&l| ast.ident(l).is_some_and(|i| i.sym == obj.name))
                    .unwrap_or(e),
                _ => e,
            },
            (crate::ast::ObjKind::Var, DeclRef::Value(sp)) => match &ast.specs[sp] {
                Spec::Value(v) => v
                    .names
                    .iter()
                    .copied()
                    .find(|&n| ast.ident(n).is_some_and(|i| i.sym == obj.name))
                    .unwrap_or(e),
                _ => e,
            },
            _ => e,
        }
    }

    pub fn get(&self, ast: &Ast<'s>, e: ExprId<'s>) -> TyId<'s> {
        self.map
            .get(&self.redirect(ast, e))
            .copied()
            .unwrap_or(self.none)
    }

    fn get_opt(&self, ast: &Ast<'s>, e: Option<ExprId<'s>>) -> TyId<'s> {
        match e {
            Some(e) => self.get(ast, e),
            None => self.none,
        }
    }

    fn set(&mut self, ast: &Ast<'s>, e: ExprId<'s>, ty: Ty<'s>) -> TyId<'s> {
        let id = self.alloc(ty);
        self.set_id(ast, e, id);
        id
    }

    fn set_id(&mut self, ast: &Ast<'s>, e: ExprId<'s>, id: TyId<'s>) {
        let key = self.redirect(ast, e);
        self.map.insert(key, id);
    }

    /// The match relation: `None` is top, `Or` matches through either
    /// branch, `Same` through its target; otherwise structural equality.
    /// Symmetric: `a`'s special forms are tried first, then `b`'s.
    pub fn matches(&self, a: TyId<'s>, b: TyId<'s>) -> bool {
        match &self.cells[a] {
            Ty::Or(x, y) => return self.matches(*x, b) || self.matches(*y, b),
            Ty::Same(t) => return self.matches(*t, b),
            Ty::None => return true,
            _ => {}
        }
        match &self.cells[b] {
            Ty::Or(x, y) => return self.matches(a, *x) || self.matches(a, *y),
            Ty::Same(t) => return self.matches(a, *t),
            Ty::None => return true,
            _ => {}
        }
        self.structural_eq(a, b)
    }

    fn sig_eq(&self, a: &Signature<'s>, b: &Signature<'s>) -> bool {
        a.variadic == b.variadic
            && a.params.len() == b.params.len()
            && a.results.len() == b.results.len()
            && a.params
                .iter()
                .zip(&b.params)
                .all(|(&x, &y)| self.structural_eq(x, y))
            && a.results
                .iter()
                .zip(&b.results)
                .all(|(&x, &y)| self.structural_eq(x, y))
    }

    fn structural_eq(&self, a: TyId<'s>, b: TyId<'s>) -> bool {
        if a == b {
            return true;
        }
        match (&self.cells[a], &self.cells[b]) {
            (Ty::None, Ty::None) => true,
            (Ty::Basic(x), Ty::Basic(y)) => x == y,
            (
                Ty::Array { key: k1, value: v1 },
                Ty::Array { key: k2, value: v2 },
            ) => self.structural_eq(*k1, *k2) && self.structural_eq(*v1, *v2),
            (Ty::Record { elts: e1 }, Ty::Record { elts: e2 }) => {
                e1.len() == e2.len()
                    && e1.iter().zip(e2).all(|(x, y)| {
                        self.structural_eq(x.key, y.key) && self.structural_eq(x.value, y.value)
                    })
            }
            (Ty::Tuple(t1), Ty::Tuple(t2)) => {
                t1.len() == t2.len()
                    && t1.iter().zip(t2).all(|(&x, &y)| self.structural_eq(x, y))
            }
            (Ty::Signature(s1), Ty::Signature(s2)) => self.sig_eq(s1, s2),
            (Ty::Invocation(i1), Ty::Invocation(i2)) => {
                i1.arg_len == i2.arg_len
                    && i1.spread == i2.spread
                    && i1.args.len() == i2.args.len()
                    && i1
                        .args
                        .iter()
                        .zip(&i2.args)
                        .all(|(&x, &y)| self.structural_eq(x, y))
                    && match (&i1.sig, &i2.sig) {
                        (None, None) => true,
                        (Some(x), Some(y)) => self.sig_eq(x, y),
                        _ => false,
                    }
            }
            (Ty::Or(a1, b1), Ty::Or(a2, b2)) => {
                self.structural_eq(*a1, *a2) && self.structural_eq(*b1, *b2)
            }
            (Ty::Same(x), Ty::Same(y)) => self.structural_eq(*x, *y),
            (Ty::Label(x), Ty::Label(y)) => x == y,
            (Ty::Element(x), Ty::Element(y)) => {
                self.structural_eq(x.key, y.key) && self.structural_eq(x.value, y.value)
            }
            _ => false,
        }
    }

    /// Collapses transient types: an `Invocation` becomes its sole result
    /// (or a tuple of them, or `None`), `Or` evaluates branch-wise,
    /// everything else passes through. Idempotent on closed types.
    pub fn eval(&mut self, t: TyId<'s>) -> TyId<'s> {
        match &self.cells[t] {
            Ty::Invocation(inv) => {
                let results = match &inv.sig {
                    Some(sig) if !sig.results.is_empty() => sig.results.clone(),
                    _ => return self.none,
                };
                if results.len() == 1 {
                    results[0]
                } else {
                    self.alloc(Ty::Tuple(results))
                }
            }
            Ty::Or(a, b) => {
                let (a, b) = (*a, *b);
                let ea = self.eval(a);
                let eb = self.eval(b);
                if ea == a && eb == b {
                    t
                } else {
                    self.alloc(Ty::Or(ea, eb))
                }
            }
            _ => t,
        }
    }

    fn or_branches(&self, t: TyId<'s>, out: &mut Vec<TyId<'s>>) {
        match &self.cells[t] {
            Ty::Or(a, b) => {
                let (a, b) = (*a, *b);
                self.or_branches(a, out);
                self.or_branches(b, out);
            }
            _ => out.push(t),
        }
    }

    /// Widens an underconstrained parameter slot with an argument type from
    /// a call site. Returns the widened type, or `None` when the slot is
    /// already constrained or already carries a structurally equal branch.
    fn widen(&mut self, old: TyId<'s>, at: TyId<'s>) -> Option<TyId<'s>> {
        let mut branches = Vec::new();
        self.or_branches(old, &mut branches);
        if !branches.iter().any(|&b| self.is_none(b)) {
            return None;
        }
        if branches.iter().any(|&b| self.structural_eq(b, at)) {
            return None;
        }
        Some(self.alloc(Ty::Or(old, at)))
    }
}

impl<'s> Default for TypeMap<'s> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Inference configuration
// =============================================================================

/// Inference configuration: the file under analysis and the type mapping it
/// populates. This is the query surface consumers (e.g. a code generator)
/// keep around after `infer` returns.
pub struct Config<'a, 's> {
    pub file: &'a File<'s>,
    pub types: TypeMap<'s>,
}

impl<'a, 's> Config<'a, 's> {
    pub fn new(file: &'a File<'s>) -> Self {
        Self {
            file,
            types: TypeMap::new(),
        }
    }

    /// Walks the tree once, populating the type mapping, and returns every
    /// semantic error found.
    pub fn infer(&mut self) -> Result<(), Errors> {
        let file = self.file;
        let mut checker = Checker {
            types: &mut self.types,
            retstk: Vec::new(),
            errors: Vec::new(),
        };
        walk_file(&file.ast, file, &mut checker);
        let errors = checker.errors;

        // Collapse leftover invocation types so consumers only ever see
        // final types at call expressions.
        let cells = &self.types.cells;
        let keys: Vec<ExprId<'s>> = self
            .types
            .map
            .iter()
            .filter(|(_, &t)| matches!(cells[t], Ty::Invocation(_)))
            .map(|(&k, _)| k)
            .collect();
        for k in keys {
            if let Some(&t) = self.types.map.get(&k) {
                let ev = self.types.eval(t);
                self.types.map.insert(k, ev);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Errors(errors))
        }
    }

    /// The inferred type of an expression, keyed by canonical identity.
    pub fn type_of(&self, e: ExprId<'s>) -> &Ty<'s> {
        self.types.ty(self.types.get(&self.file.ast, e))
    }
}

// =============================================================================
// The checker
// =============================================================================

struct Checker<'a, 's> {
    types: &'a mut TypeMap<'s>,
    /// One return tuple per active function definition; `None` until the
    /// first `return` fixes the shape.
    retstk: Vec<Option<Vec<TyId<'s>>>>,
    errors: Vec<Error>,
}

impl<'s> Checker<'_, 's> {
    fn error(&mut self, tok: &Token<'s>, msg: impl Into<String>) {
        self.errors
            .push(Error::new(tok.offset, tok.line, tok.column, msg));
    }

    fn is_basic_non_string(&self, t: TyId<'s>) -> bool {
        matches!(self.types.ty(t), Ty::Basic(b) if *b != Basic::String)
    }

    fn or_bool_num(&mut self) -> TyId<'s> {
        let b = self.types.basic_id(Basic::Bool);
        let n = self.types.basic_id(Basic::Num);
        self.types.alloc(Ty::Or(b, n))
    }

    // ------------------------------------------------------------------ pre

    fn pre_expr(&mut self, ast: &Ast<'s>, e: ExprId<'s>) {
        match &ast.exprs[e] {
            Expr::BasicLit { value } => match value.kind {
                TokenKind::Ident => {
                    if value.lit == "true" || value.lit == "false" {
                        self.types.set(ast, e, Ty::Basic(Basic::Bool));
                    }
                }
                TokenKind::Int | TokenKind::Float => {
                    self.types.set(ast, e, Ty::Basic(Basic::Num));
                }
                TokenKind::String => {
                    self.types.set(ast, e, Ty::Basic(Basic::String));
                }
                _ => {}
            },
            Expr::Fun(def) => {
                let variadic = def.params.iter().any(|&p| ast.params[p].ellipsis.is_some());
                let name = def.name;
                let sig = Signature {
                    params: vec![self.types.none_id(); def.params.len()],
                    results: Vec::new(),
                    variadic,
                };
                self.types.set(ast, e, Ty::Signature(sig.clone()));
                if let Some(n) = name {
                    self.types.set(ast, n, Ty::Signature(sig));
                }
                self.retstk.push(None);
            }
            Expr::Composite {
                ty: Some(t), elts, ..
            } => match &ast.exprs[*t] {
                Expr::ArrayLit { .. } => {
                    let none = self.types.none_id();
                    self.types.set(
                        ast,
                        e,
                        Ty::Array {
                            key: none,
                            value: none,
                        },
                    );
                }
                Expr::RecordLit { .. } => {
                    let none = self.types.none_id();
                    let elts = vec![
                        Element {
                            key: none,
                            value: none,
                        };
                        elts.len()
                    ];
                    self.types.set(ast, e, Ty::Record { elts });
                }
                _ => {}
            },
            Expr::Call { args, ellipsis, .. } => {
                let inv = Invocation {
                    arg_len: args.len(),
                    args: Vec::new(),
                    spread: ellipsis.is_some(),
                    sig: None,
                };
                self.types.set(ast, e, Ty::Invocation(inv));
            }
            Expr::KeyValue { .. } => {
                let none = self.types.none_id();
                self.types.set(
                    ast,
                    e,
                    Ty::Element(Element {
                        key: none,
                        value: none,
                    }),
                );
            }
            _ => {}
        }
    }

    fn pre_stmt(&mut self, ast: &Ast<'s>, s: StmtId<'s>) {
        match &ast.stmts[s] {
            Stmt::IncDec { x, .. } => {
                self.types.set(ast, *x, Ty::Basic(Basic::Num));
            }
            Stmt::Assign { lhs, op, rhs } => {
                if lhs.len() != rhs.len() {
                    let msg = format!(
                        "left-hand side and right-hand side do not match: {} {} {}",
                        lhs.len(),
                        op.lit,
                        rhs.len()
                    );
                    self.error(ast.stmt_token(s), msg);
                }
            }
            Stmt::Branch {
                label: Some(l), ..
            } => {
                let obj = ast.ident(*l).and_then(|i| i.obj);
                self.types.set(ast, *l, Ty::Label(obj));
            }
            Stmt::In { x, .. } => {
                let none = self.types.none_id();
                let arr = self.types.alloc(Ty::Array {
                    key: none,
                    value: none,
                });
                let rec = self.types.alloc(Ty::Record { elts: Vec::new() });
                self.types.set(ast, *x, Ty::Or(arr, rec));
            }
            _ => {}
        }
    }

    fn pre_spec(&mut self, ast: &Ast<'s>, sp: crate::ast::SpecId<'s>) {
        if let Spec::Value(v) = &ast.specs[sp] {
            if !v.values.is_empty() && v.names.len() != v.values.len() {
                let msg = format!(
                    "left-hand side and right-hand side do not match: {} = {}",
                    v.names.len(),
                    v.values.len()
                );
                self.error(ast.expr_token(v.names[0]), msg);
            }
        }
    }

    // ----------------------------------------------------------------- post

    fn post_expr(&mut self, ast: &Ast<'s>, e: ExprId<'s>) {
        match &ast.exprs[e] {
            Expr::Fun(def) => self.post_fun(ast, e, def),
            Expr::Composite {
                ty: Some(t), elts, ..
            } => match &ast.exprs[*t] {
                Expr::ArrayLit { .. } => self.post_array_lit(ast, e, elts),
                Expr::RecordLit { .. } => self.post_record_lit(ast, e, elts),
                _ => {}
            },
            Expr::Paren { x, .. } => {
                let t = self.types.get(ast, *x);
                self.types.set_id(ast, e, t);
            }
            Expr::Selector { sel, .. } => {
                let t = self.types.get(ast, *sel);
                self.types.set_id(ast, e, t);
            }
            Expr::Index {
                x,
                index,
                backwards,
                ..
            } => self.post_index(ast, e, *x, *index, *backwards),
            Expr::Slice { x, low, high, .. } => self.post_slice(ast, e, *x, *low, *high),
            Expr::Call { fun, args, .. } => self.post_call(ast, e, *fun, args),
            Expr::Unary { x, .. } => self.post_unary(ast, e, *x),
            Expr::Binary { x, op, y } => self.post_binary(ast, e, *x, op.kind, *y),
            Expr::KeyValue { key, value, .. } => {
                let k = self.types.get(ast, *key);
                let v = self.types.get(ast, *value);
                let k = self.types.eval(k);
                let v = self.types.eval(v);
                self.types
                    .set(ast, e, Ty::Element(Element { key: k, value: v }));
            }
            _ => {}
        }
    }

    fn post_fun(&mut self, ast: &Ast<'s>, e: ExprId<'s>, def: &FunDef<'s>) {
        let sig_id = self.types.get(ast, e);
        let Ty::Signature(mut sig) = self.types.ty(sig_id).clone() else {
            self.retstk.pop();
            return;
        };
        for (i, &p) in def.params.iter().enumerate() {
            if i < sig.params.len() {
                sig.params[i] = self.types.get(ast, ast.params[p].name);
            }
        }
        if sig.variadic {
            if let Some(&last) = sig.params.last() {
                let num = self.types.basic_id(Basic::Num);
                let wrapped = self.types.alloc(Ty::Array {
                    key: num,
                    value: last,
                });
                if let Some(slot) = sig.params.last_mut() {
                    *slot = wrapped;
                }
            }
        }
        sig.results = self.retstk.pop().flatten().unwrap_or_default();
        let id = self.types.alloc(Ty::Signature(sig));
        self.types.set_id(ast, e, id);
        if let Some(n) = def.name {
            self.types.set_id(ast, n, id);
        }
    }

    fn post_array_lit(&mut self, ast: &Ast<'s>, e: ExprId<'s>, elts: &[ExprId<'s>]) {
        let Some(&first) = elts.first() else { return };
        let t0 = self.types.get(ast, first);
        let mut errd = false;
        for &el in &elts[1..] {
            let ti = self.types.get(ast, el);
            if !self.types.structural_eq(t0, ti) {
                self.error(ast.expr_token(el), "array holds values of varying type");
                errd = true;
            }
        }
        if errd {
            return;
        }
        if let Ty::Element(kv) = self.types.ty(t0).clone() {
            let key = self.types.eval(kv.key);
            let value = self.types.eval(kv.value);
            self.types.set(ast, e, Ty::Array { key, value });
        } else {
            let value = self.types.eval(t0);
            let key = self.types.basic_id(Basic::Num);
            self.types.set(ast, e, Ty::Array { key, value });
        }
    }

    fn post_record_lit(&mut self, ast: &Ast<'s>, e: ExprId<'s>, elts: &[ExprId<'s>]) {
        let rid = self.types.get(ast, e);
        let Ty::Record { elts: mut fields } = self.types.ty(rid).clone() else {
            return;
        };
        for (i, &el) in elts.iter().enumerate() {
            let t0 = self.types.get(ast, el);
            let entry = match self.types.ty(t0).clone() {
                Ty::Element(kv) => kv,
                _ => Element {
                    key: self.types.basic_id(Basic::Num),
                    value: t0,
                },
            };
            if i < fields.len() {
                fields[i] = entry;
            } else {
                fields.push(entry);
            }
        }
        self.types.set(ast, e, Ty::Record { elts: fields });
    }

    fn post_index(
        &mut self,
        ast: &Ast<'s>,
        e: ExprId<'s>,
        x: ExprId<'s>,
        index: Option<ExprId<'s>>,
        backwards: bool,
    ) {
        let xt = self.types.get(ast, x);
        let it = self.types.get_opt(ast, index);
        if backwards {
            match self.types.ty(xt).clone() {
                Ty::Array { value, .. } => {
                    if !self.types.is_none(value)
                        && !self.types.is_none(it)
                        && !self.types.structural_eq(value, it)
                    {
                        self.error(ast.expr_token(e), "array value and index types do not match");
                    }
                    let value = self.types.eval(it);
                    let key = self.types.basic_id(Basic::Num);
                    self.types.set(ast, e, Ty::Array { key, value });
                }
                Ty::Record { .. } => {
                    self.error(ast.expr_token(e), "record cannot be reverse-indexed");
                }
                _ => {}
            }
        } else {
            match self.types.ty(xt).clone() {
                Ty::Array { key, .. } => {
                    if !self.types.is_none(key)
                        && !self.types.is_none(it)
                        && !self.types.structural_eq(key, it)
                    {
                        self.error(ast.expr_token(e), "array key and index types do not match");
                    }
                }
                Ty::Record { elts } => {
                    let found = elts.iter().any(|el| self.types.structural_eq(el.key, it));
                    if !found {
                        self.error(ast.expr_token(e), "record key and index types do not match");
                    }
                }
                _ => {}
            }
        }
    }

    fn post_slice(
        &mut self,
        ast: &Ast<'s>,
        e: ExprId<'s>,
        x: ExprId<'s>,
        low: Option<ExprId<'s>>,
        high: Option<ExprId<'s>>,
    ) {
        let xt = self.types.get(ast, x);
        match self.types.ty(xt) {
            Ty::Array { .. } => {
                let num = self.types.basic_id(Basic::Num);
                let lt = self.types.get_opt(ast, low);
                let ht = self.types.get_opt(ast, high);
                let low_ok = low.is_none() || self.types.matches(lt, num);
                let high_ok = high.is_none() || self.types.matches(ht, num);
                if !low_ok || !high_ok {
                    self.error(ast.expr_token(e), "slice bounds must be numbers");
                }
                let t = self.types.eval(xt);
                self.types.set_id(ast, e, t);
            }
            Ty::Record { .. } => {
                self.error(ast.expr_token(e), "record cannot be sliced");
            }
            _ => {}
        }
    }

    fn post_call(&mut self, ast: &Ast<'s>, e: ExprId<'s>, fun: ExprId<'s>, args: &[ExprId<'s>]) {
        let inv_id = self.types.get(ast, e);
        let Ty::Invocation(mut inv) = self.types.ty(inv_id).clone() else {
            return;
        };
        let fun_t = self.types.get(ast, fun);
        let mut sig = match self.types.ty(fun_t) {
            Ty::Signature(s) => s.clone(),
            Ty::None => return,
            _ => {
                self.error(ast.expr_token(fun), "called value is not a function");
                return;
            }
        };
        if !sig.variadic && inv.arg_len != sig.params.len() {
            self.error(
                ast.expr_token(e),
                "number of arguments does not match number of parameters",
            );
            return;
        }
        if sig.variadic && inv.arg_len + 1 < sig.params.len() {
            self.error(
                ast.expr_token(e),
                "number of arguments does not match number of parameters",
            );
            return;
        }

        let fixed = sig.params.len() - usize::from(sig.variadic);
        let def_params: Option<Vec<ParamId<'s>>> =
            called_def(ast, fun).map(|d| d.params.clone());
        let mut rewrote = false;
        for i in 0..fixed {
            let Some(&arg) = args.get(i) else { break };
            let at = self.types.get(ast, arg);
            inv.args.push(at);
            let pt = self.types.eval(sig.params[i]);
            if !self.types.matches(at, pt) {
                self.error(
                    ast.expr_token(arg),
                    "argument types don't match parameter types",
                );
                break;
            }
            // flow the argument type back into an underconstrained parameter
            if let Some(widened) = self.types.widen(sig.params[i], at) {
                if let Some(params) = &def_params {
                    if let Some(&pid) = params.get(i) {
                        let pname = ast.params[pid].name;
                        self.types.set_id(ast, pname, widened);
                        sig.params[i] = widened;
                        rewrote = true;
                    }
                }
            }
        }

        if sig.variadic {
            let elem = match sig.params.last().map(|&l| self.types.ty(l).clone()) {
                Some(Ty::Array { value, .. }) => Some(value),
                _ => {
                    if inv.arg_len >= sig.params.len() {
                        self.error(ast.expr_token(e), "variadic parameter must have array type");
                    }
                    None
                }
            };
            if let Some(elem) = elem {
                for &arg in args.iter().take(inv.arg_len).skip(fixed) {
                    let at = self.types.get(ast, arg);
                    inv.args.push(at);
                    if !self.types.matches(at, elem) {
                        self.error(
                            ast.expr_token(arg),
                            "argument types don't match parameter types",
                        );
                        break;
                    }
                }
            }
        }

        inv.sig = Some(sig.clone());
        self.types.set(ast, e, Ty::Invocation(inv));
        if rewrote {
            self.types.set(ast, fun, Ty::Signature(sig));
        }
    }

    fn post_unary(&mut self, ast: &Ast<'s>, e: ExprId<'s>, x: ExprId<'s>) {
        let xt = self.types.get(ast, x);
        let typ = if !self.types.is_none(xt) {
            if !self.is_basic_non_string(xt) {
                self.error(
                    ast.expr_token(e),
                    "unary operation can only be performed on number or bool",
                );
                return;
            }
            xt
        } else {
            self.or_bool_num()
        };
        let typ = self.types.eval(typ);
        self.types.set_id(ast, e, typ);
        self.types.set_id(ast, x, typ);
    }

    fn post_binary(
        &mut self,
        ast: &Ast<'s>,
        e: ExprId<'s>,
        x: ExprId<'s>,
        op: TokenKind,
        y: ExprId<'s>,
    ) {
        use TokenKind as K;
        let tx = self.types.get(ast, x);
        let ty_ = self.types.get(ast, y);
        let typ = if matches!(op, K::Add | K::Eql | K::Lss | K::Gtr | K::Neq | K::Leq | K::Geq) {
            if !self.types.is_none(tx) || !self.types.is_none(ty_) {
                self.types.alloc(Ty::Or(tx, ty_))
            } else {
                let bn = self.or_bool_num();
                let s = self.types.basic_id(Basic::String);
                self.types.alloc(Ty::Or(bn, s))
            }
        } else if !self.types.is_none(tx) && !self.types.is_none(ty_) {
            if !self.is_basic_non_string(tx) || !self.is_basic_non_string(ty_) {
                self.error(
                    ast.expr_token(e),
                    "binary operation can only be performed between numbers or bools",
                );
                return;
            }
            self.types.alloc(Ty::Or(tx, ty_))
        } else {
            self.or_bool_num()
        };
        let typ = self.types.eval(typ);
        self.types.set_id(ast, e, typ);
        self.types.set_id(ast, x, typ);
        self.types.set(ast, y, Ty::Same(typ));
    }

    fn post_stmt(&mut self, ast: &Ast<'s>, s: StmtId<'s>) {
        match &ast.stmts[s] {
            Stmt::IncDec { x, .. } => {
                let xt = self.types.get(ast, *x);
                if !self.types.is_none(xt) && !self.is_basic_non_string(xt) {
                    self.error(
                        ast.stmt_token(s),
                        "can only increment and decrement a number or bool",
                    );
                }
            }
            Stmt::Assign { lhs, op, rhs } => self.post_assign(ast, s, lhs, op.kind, rhs),
            Stmt::Return { results, .. } => self.post_return(ast, s, results),
            Stmt::Switch { tag, body, .. } => self.post_switch(ast, *tag, *body),
            _ => {}
        }
    }

    fn post_assign(
        &mut self,
        ast: &Ast<'s>,
        s: StmtId<'s>,
        lhs: &[ExprId<'s>],
        op: TokenKind,
        rhs: &[ExprId<'s>],
    ) {
        if op != TokenKind::Assign {
            if lhs.len() > 1 || rhs.len() > 1 {
                self.error(
                    ast.stmt_token(s),
                    "assignment operator can only operate on one element on lhs and rhs",
                );
                return;
            }
            let (Some(&l), Some(&r)) = (lhs.first(), rhs.first()) else {
                return;
            };
            let lt = self.types.get(ast, l);
            let rt = self.types.get(ast, r);
            if !self.types.is_none(lt) && !self.types.matches(lt, rt) {
                self.error(ast.stmt_token(s), "lhs does not match rhs type");
                return;
            }
            let rv = self.types.eval(rt);
            self.types.set_id(ast, l, rv);
            return;
        }
        for (&l, &r) in lhs.iter().zip(rhs.iter()) {
            let lt = self.types.get(ast, l);
            let rt = self.types.get(ast, r);
            let rv = self.types.eval(rt);
            if !self.types.is_none(lt) && !self.types.matches(lt, rv) {
                self.error(ast.expr_token(l), "lhs does not match rhs type");
            } else {
                self.types.set_id(ast, l, rv);
            }
        }
    }

    fn post_return(&mut self, ast: &Ast<'s>, s: StmtId<'s>, results: &[ExprId<'s>]) {
        // a `return` outside any function never reaches the checker with a
        // frame on the stack; ignore it here
        let fixed = match self.retstk.last() {
            None => return,
            Some(t) => t.is_some(),
        };
        if !fixed {
            let mut tuple = Vec::with_capacity(results.len());
            for &r in results {
                let t = self.types.get(ast, r);
                tuple.push(self.types.eval(t));
            }
            if let Some(top) = self.retstk.last_mut() {
                *top = Some(tuple);
            }
            return;
        }
        let tuple = match self.retstk.last() {
            Some(Some(t)) => t.clone(),
            _ => return,
        };
        if tuple.len() != results.len() {
            self.error(ast.stmt_token(s), "number of return values do not match");
            return;
        }
        for (i, &r) in results.iter().enumerate() {
            let rt = self.types.get(ast, r);
            if !self.types.matches(rt, tuple[i]) {
                self.error(
                    ast.expr_token(r),
                    "return statement does not match signature",
                );
            }
        }
    }

    fn post_switch(&mut self, ast: &Ast<'s>, tag: Option<ExprId<'s>>, body: StmtId<'s>) {
        let tag_t = match tag {
            Some(t) => self.types.get(ast, t),
            None => self.types.basic_id(Basic::Bool),
        };
        let Stmt::Block(block) = &ast.stmts[body] else {
            return;
        };
        for &cs in &block.list {
            let Stmt::Case(clause) = &ast.stmts[cs] else {
                continue;
            };
            for &ce in &clause.list {
                let t2 = self.types.get(ast, ce);
                if !self.types.is_none(t2) && !self.types.matches(t2, tag_t) {
                    self.error(
                        ast.expr_token(ce),
                        "case expressions must match switch tag type",
                    );
                } else {
                    self.types.set(ast, ce, Ty::Same(tag_t));
                }
            }
        }
    }

    fn post_spec(&mut self, ast: &Ast<'s>, sp: crate::ast::SpecId<'s>) {
        if let Spec::Value(v) = &ast.specs[sp] {
            if v.values.is_empty() || v.names.len() != v.values.len() {
                return;
            }
            for (&n, &val) in v.names.iter().zip(v.values.iter()) {
                let vt = self.types.get(ast, val);
                let ev = self.types.eval(vt);
                self.types.set_id(ast, n, ev);
            }
        }
    }
}

fn called_def<'a, 's>(ast: &'a Ast<'s>, fun: ExprId<'s>) -> Option<&'a FunDef<'s>> {
    match &ast.exprs[fun] {
        Expr::Ident(id) => {
            let obj = id.obj?;
            if let DeclRef::Fun(f) = ast.objects[obj].decl {
                if let Expr::Fun(def) = &ast.exprs[f] {
                    return Some(def);
                }
            }
            None
        }
        Expr::Fun(def) => Some(def),
        _ => None,
    }
}

impl<'s> Visitor<'s> for Checker<'_, 's> {
    fn pre(&mut self, ast: &Ast<'s>, node: Node<'s>) -> bool {
        match node {
            Node::Expr(e) => self.pre_expr(ast, e),
            Node::Stmt(s) => self.pre_stmt(ast, s),
            Node::Spec(sp) => self.pre_spec(ast, sp),
            Node::Param(_) => {}
        }
        true
    }

    fn post(&mut self, ast: &Ast<'s>, node: Node<'s>) {
        match node {
            Node::Expr(e) => self.post_expr(ast, e),
            Node::Stmt(s) => self.post_stmt(ast, s),
            Node::Spec(sp) => self.post_spec(ast, sp),
            Node::Param(_) => {}
        }
    }
}
