//! Depth-first traversal of the syntax tree with pre/post hooks.
//!
//! The inferencer (and any other single-pass analysis) implements
//! [`Visitor`]; `pre` runs on the way down and may prune a subtree by
//! returning `false`, `post` runs on the way up after all children.

use crate::ast::{Ast, Expr, ExprId, File, ParamId, Spec, SpecId, Stmt, StmtId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node<'s> {
    Expr(ExprId<'s>),
    Stmt(StmtId<'s>),
    Spec(SpecId<'s>),
    Param(ParamId<'s>),
}

pub trait Visitor<'s> {
    fn pre(&mut self, ast: &Ast<'s>, node: Node<'s>) -> bool {
        let _ = (ast, node);
        true
    }

    fn post(&mut self, ast: &Ast<'s>, node: Node<'s>) {
        let _ = (ast, node);
    }
}

pub fn walk_file<'s, V: Visitor<'s> + ?Sized>(ast: &Ast<'s>, file: &File<'s>, v: &mut V) {
    for decl in &file.decls {
        for &spec in &decl.specs {
            walk_spec(ast, spec, v);
        }
    }
    for &stmt in &file.stmts {
        walk_stmt(ast, stmt, v);
    }
}

pub fn walk_expr<'s, V: Visitor<'s> + ?Sized>(ast: &Ast<'s>, e: ExprId<'s>, v: &mut V) {
    if !v.pre(ast, Node::Expr(e)) {
        return;
    }
    match &ast.exprs[e] {
        Expr::Bad { .. }
        | Expr::Ident(_)
        | Expr::BasicLit { .. }
        | Expr::ArrayLit { .. }
        | Expr::RecordLit { .. } => {}
        Expr::Composite { ty, elts, .. } => {
            if let Some(t) = ty {
                walk_expr(ast, *t, v);
            }
            for &el in elts {
                walk_expr(ast, el, v);
            }
        }
        Expr::Paren { x, .. } => walk_expr(ast, *x, v),
        Expr::Selector { x, sel } => {
            walk_expr(ast, *x, v);
            walk_expr(ast, *sel, v);
        }
        Expr::Index { x, index, .. } => {
            walk_expr(ast, *x, v);
            if let Some(i) = index {
                walk_expr(ast, *i, v);
            }
        }
        Expr::Slice { x, low, high, .. } => {
            walk_expr(ast, *x, v);
            if let Some(l) = low {
                walk_expr(ast, *l, v);
            }
            if let Some(h) = high {
                walk_expr(ast, *h, v);
            }
        }
        Expr::Call { fun, args, .. } => {
            walk_expr(ast, *fun, v);
            for &a in args {
                walk_expr(ast, a, v);
            }
        }
        Expr::Unary { x, .. } => walk_expr(ast, *x, v),
        Expr::Binary { x, y, .. } => {
            walk_expr(ast, *x, v);
            walk_expr(ast, *y, v);
        }
        Expr::KeyValue { key, value, .. } => {
            walk_expr(ast, *key, v);
            walk_expr(ast, *value, v);
        }
        Expr::Fun(def) => {
            if let Some(n) = def.name {
                walk_expr(ast, n, v);
            }
            for &p in &def.params {
                walk_param(ast, p, v);
            }
            walk_stmt(ast, def.body, v);
        }
    }
    v.post(ast, Node::Expr(e));
}

fn walk_param<'s, V: Visitor<'s> + ?Sized>(ast: &Ast<'s>, p: ParamId<'s>, v: &mut V) {
    if !v.pre(ast, Node::Param(p)) {
        return;
    }
    v.post(ast, Node::Param(p));
}

pub fn walk_stmt<'s, V: Visitor<'s> + ?Sized>(ast: &Ast<'s>, s: StmtId<'s>, v: &mut V) {
    if !v.pre(ast, Node::Stmt(s)) {
        return;
    }
    match &ast.stmts[s] {
        Stmt::Bad { .. } | Stmt::Empty { .. } => {}
        Stmt::Decl(d) => {
            for &spec in &d.specs {
                walk_spec(ast, spec, v);
            }
        }
        Stmt::Labeled { label, stmt, .. } => {
            walk_expr(ast, *label, v);
            walk_stmt(ast, *stmt, v);
        }
        Stmt::Expr { x } => walk_expr(ast, *x, v),
        Stmt::IncDec { x, .. } => walk_expr(ast, *x, v),
        Stmt::Assign { lhs, rhs, .. } => {
            for &e in lhs {
                walk_expr(ast, e, v);
            }
            for &e in rhs {
                walk_expr(ast, e, v);
            }
        }
        Stmt::Return { results, .. } => {
            for &e in results {
                walk_expr(ast, e, v);
            }
        }
        Stmt::Branch { label, .. } => {
            if let Some(l) = label {
                walk_expr(ast, *l, v);
            }
        }
        Stmt::Block(b) => {
            for &st in &b.list {
                walk_stmt(ast, st, v);
            }
        }
        Stmt::If {
            init,
            cond,
            body,
            alt,
            ..
        } => {
            if let Some(i) = init {
                walk_stmt(ast, *i, v);
            }
            walk_expr(ast, *cond, v);
            walk_stmt(ast, *body, v);
            if let Some(e) = alt {
                walk_stmt(ast, *e, v);
            }
        }
        Stmt::Switch {
            init, tag, body, ..
        } => {
            if let Some(i) = init {
                walk_stmt(ast, *i, v);
            }
            if let Some(t) = tag {
                walk_expr(ast, *t, v);
            }
            walk_stmt(ast, *body, v);
        }
        Stmt::Case(c) => {
            for &e in &c.list {
                walk_expr(ast, e, v);
            }
            for &st in &c.body {
                walk_stmt(ast, st, v);
            }
        }
        Stmt::For {
            init,
            cond,
            post,
            body,
            ..
        } => {
            if let Some(i) = init {
                walk_stmt(ast, *i, v);
            }
            if let Some(c) = cond {
                walk_expr(ast, *c, v);
            }
            if let Some(p) = post {
                walk_stmt(ast, *p, v);
            }
            walk_stmt(ast, *body, v);
        }
        Stmt::In {
            index,
            key,
            value,
            x,
            body,
            ..
        } => {
            for opt in [index, key, value] {
                if let Some(e) = opt {
                    walk_expr(ast, *e, v);
                }
            }
            walk_expr(ast, *x, v);
            walk_stmt(ast, *body, v);
        }
    }
    v.post(ast, Node::Stmt(s));
}

pub fn walk_spec<'s, V: Visitor<'s> + ?Sized>(ast: &Ast<'s>, sp: SpecId<'s>, v: &mut V) {
    if !v.pre(ast, Node::Spec(sp)) {
        return;
    }
    match &ast.specs[sp] {
        Spec::Use(u) => {
            if let Some(n) = u.name {
                walk_expr(ast, n, v);
            }
        }
        Spec::Value(val) => {
            for &n in &val.names {
                walk_expr(ast, n, v);
            }
            for &e in &val.values {
                walk_expr(ast, e, v);
            }
        }
    }
    v.post(ast, Node::Spec(sp));
}
