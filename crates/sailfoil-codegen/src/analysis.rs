//! Whole-module exception analysis.
//!
//! A function may raise if its body sets `have_exception = true` or it
//! calls a function that may raise. The set is the least fixpoint over the
//! call graph, so mutually recursive functions that never raise stay clean.

use std::collections::{HashMap, HashSet};

use sailfoil_types::ast::*;

/// Names of every function that can return with the exception flag set.
pub fn raising_functions(module: &Module) -> HashSet<String> {
    let defined: HashSet<&str> = module.functions().map(|f| f.name.name.as_str()).collect();

    let mut raising = HashSet::new();
    let mut callees: HashMap<&str, HashSet<&str>> = HashMap::new();
    for function in module.functions() {
        let name = function.name.name.as_str();
        if function.body.iter().any(raises_directly) {
            raising.insert(name.to_string());
        }
        let mut calls = HashSet::new();
        for stmt in &function.body {
            stmt_calls(stmt, &mut calls);
        }
        calls.retain(|c| defined.contains(c));
        callees.insert(name, calls);
    }

    loop {
        let newly: Vec<&str> = callees
            .iter()
            .filter(|(name, calls)| {
                !raising.contains(**name) && calls.iter().any(|c| raising.contains(*c))
            })
            .map(|(name, _)| *name)
            .collect();
        if newly.is_empty() {
            break;
        }
        raising.extend(newly.into_iter().map(String::from));
    }

    tracing::trace!(raising = raising.len(), "exception analysis");
    raising
}

fn raises_directly(stmt: &Stmt) -> bool {
    matches!(
        &stmt.kind,
        StmtKind::Assign {
            target: Place::HaveException,
            value: Expr {
                kind: ExprKind::Literal(Literal::Bool(true)),
                ..
            },
        }
    )
}

fn stmt_calls<'a>(stmt: &'a Stmt, out: &mut HashSet<&'a str>) {
    match &stmt.kind {
        StmtKind::Declare { init: Some(e), .. } => expr_calls(e, out),
        StmtKind::Assign { value, .. } => expr_calls(value, out),
        StmtKind::Jump { cond, .. } => expr_calls(cond, out),
        _ => {}
    }
}

fn expr_calls<'a>(expr: &'a Expr, out: &mut HashSet<&'a str>) {
    match &expr.kind {
        ExprKind::Call { callee, args } => {
            out.insert(callee.name.as_str());
            for arg in args {
                expr_calls(arg, out);
            }
        }
        ExprKind::Prim { args, .. } => {
            for arg in args {
                expr_calls(arg, out);
            }
        }
        ExprKind::Is { value, .. } | ExprKind::As { value, .. } | ExprKind::Field { value, .. } => {
            expr_calls(value, out)
        }
        _ => {}
    }
}
