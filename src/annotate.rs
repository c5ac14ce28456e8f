//! Prerequisite annotation: conjoin each symbol's prerequisites into the
//! tree and expand predicate references into their defining expressions.

use crate::parse::{negate, parse};
use crate::types::Junction;
use crate::{Cmp, Expr, ExprError, SymTab, SymbolKind};

impl Expr {
    /// Annotate a raw tree: every terminal gains its symbol's prerequisite
    /// expression (ANDed in), and every predicate test is replaced by the
    /// predicate's expansion, negated if the test was for falsehood.
    /// Expansion is recursive; prerequisites and expansions may themselves
    /// reference predicates.
    ///
    /// # Errors
    ///
    /// Fails with [`ExprError::CircularPrerequisite`] if a predicate's
    /// expansion or a symbol's prerequisites transitively refer back to the
    /// symbol being expanded, and propagates parse errors from expansion
    /// and prerequisite strings.
    pub fn annotate(self, symtab: &SymTab) -> Result<Expr, ExprError> {
        annotate_expr(self, symtab, &mut Vec::new())
    }
}

fn annotate_expr(
    expr: Expr,
    symtab: &SymTab,
    visiting: &mut Vec<String>,
) -> Result<Expr, ExprError> {
    match expr {
        Expr::Boolean(_) => Ok(expr),
        Expr::Cmp(cmp) => annotate_cmp(cmp, symtab, visiting),
        Expr::And(children) => annotate_children(Junction::And, children, symtab, visiting),
        Expr::Or(children) => annotate_children(Junction::Or, children, symtab, visiting),
    }
}

fn annotate_children(
    op: Junction,
    children: Vec<Expr>,
    symtab: &SymTab,
    visiting: &mut Vec<String>,
) -> Result<Expr, ExprError> {
    let mut result: Option<Expr> = None;
    for child in children {
        let annotated = annotate_expr(child, symtab, visiting)?;
        result = Some(match result {
            None => annotated,
            Some(acc) => Expr::combine(op, acc, annotated),
        });
    }
    result.ok_or_else(|| ExprError::syntax("empty expression"))
}

fn annotate_cmp(cmp: Cmp, symtab: &SymTab, visiting: &mut Vec<String>) -> Result<Expr, ExprError> {
    let sym = symtab
        .get(&cmp.symbol)
        .ok_or_else(|| ExprError::undefined(&cmp.symbol))?;
    if visiting.iter().any(|v| v == &sym.name) {
        return Err(ExprError::CircularPrerequisite {
            symbol: sym.name.clone(),
        });
    }
    visiting.push(sym.name.clone());
    let result = annotate_cmp_guarded(cmp, symtab, visiting);
    visiting.pop();
    result
}

fn annotate_cmp_guarded(
    cmp: Cmp,
    symtab: &SymTab,
    visiting: &mut Vec<String>,
) -> Result<Expr, ExprError> {
    let sym = symtab
        .get(&cmp.symbol)
        .ok_or_else(|| ExprError::undefined(&cmp.symbol))?;

    // Subfields carry their parent's prerequisites in addition to their own.
    let mut prereqs: Vec<String> = Vec::new();
    if let Some(p) = &sym.prereqs {
        prereqs.push(p.clone());
    }
    if let SymbolKind::Subfield { parent, .. } = &sym.kind {
        let mut parent_name = parent.clone();
        loop {
            let parent_sym = symtab
                .get(&parent_name)
                .ok_or_else(|| ExprError::undefined(&parent_name))?;
            if let Some(p) = &parent_sym.prereqs {
                prereqs.push(p.clone());
            }
            match &parent_sym.kind {
                SymbolKind::Subfield { parent, .. } => parent_name = parent.clone(),
                _ => break,
            }
        }
    }

    let mut result = match &sym.kind {
        SymbolKind::Predicate { expansion } => {
            let tests_true = cmp.tests_true();
            let expanded = parse(expansion, symtab)?;
            let expanded = annotate_expr(expanded, symtab, visiting)?;
            if tests_true {
                expanded
            } else {
                negate(expanded, symtab)?
            }
        }
        _ => Expr::Cmp(cmp),
    };

    for prereq in prereqs {
        let p = parse(&prereq, symtab)?;
        let p = annotate_expr(p, symtab, visiting)?;
        result = Expr::combine(Junction::And, result, p);
    }
    Ok(result)
}
