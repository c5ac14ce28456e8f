//! Boolean simplification and relational lowering.
//!
//! Besides the usual identities (constant folding, identity removal,
//! single-child collapse), simplification rewrites every relational
//! comparison into an OR of bitwise-testable equalities: `x < c` becomes a
//! disjunction of prefix matches, and `x != c` a disjunction of single-bit
//! mismatches. After simplification every comparison is an equality on a
//! value/mask pair, which is what the match compiler can install.

use crate::types::width_mask;
use crate::{Cmp, Expr, Operand, RelOp};

impl Expr {
    /// Apply boolean identities and relational lowering until no further
    /// rule applies. The result is observationally equivalent to the input
    /// and honors the shape invariants.
    #[must_use]
    pub fn simplify(self) -> Expr {
        match self {
            Expr::Boolean(_) => self,
            Expr::Cmp(cmp) => simplify_cmp(cmp),
            Expr::And(children) => simplify_andor(children, true),
            Expr::Or(children) => simplify_andor(children, false),
        }
    }

    /// Whether no simplification rule applies: shape invariants hold, every
    /// comparison is an equality, and Boolean literals appear only as the
    /// root.
    #[must_use]
    pub fn is_simplified(&self) -> bool {
        fn check(expr: &Expr, is_root: bool) -> bool {
            match expr {
                Expr::Boolean(_) => is_root,
                Expr::Cmp(cmp) => cmp.relop == RelOp::Eq,
                Expr::And(children) | Expr::Or(children) => {
                    children.iter().all(|c| check(c, false))
                }
            }
        }
        self.honors_invariants() && check(self, true)
    }
}

fn simplify_andor(children: Vec<Expr>, is_and: bool) -> Expr {
    let mut out: Vec<Expr> = Vec::with_capacity(children.len());
    for child in children {
        match child.simplify() {
            Expr::Boolean(b) => {
                if b != is_and {
                    // Dominator: false in AND, true in OR.
                    return Expr::Boolean(b);
                }
            }
            Expr::And(gs) if is_and => out.extend(gs),
            Expr::Or(gs) if !is_and => out.extend(gs),
            other => out.push(other),
        }
    }
    match out.len() {
        0 => Expr::Boolean(is_and),
        1 => out.swap_remove(0),
        _ if is_and => Expr::And(out),
        _ => Expr::Or(out),
    }
}

fn simplify_cmp(cmp: Cmp) -> Expr {
    let Operand::Integer { value, mask, width } = cmp.operand else {
        return Expr::Cmp(cmp);
    };
    match cmp.relop {
        RelOp::Eq => Expr::Cmp(cmp),
        RelOp::Ne => expand_ne(&cmp.symbol, value, mask, width),
        RelOp::Lt => expand_lt(&cmp.symbol, value, mask, width),
        RelOp::Le => {
            if value == mask {
                Expr::Boolean(true)
            } else {
                expand_lt(&cmp.symbol, value + 1, mask, width)
            }
        }
        RelOp::Gt => expand_gt(&cmp.symbol, value, mask, width),
        RelOp::Ge => {
            if value == 0 {
                Expr::Boolean(true)
            } else {
                expand_gt(&cmp.symbol, value - 1, mask, width)
            }
        }
    }
}

fn eq_cmp(symbol: &str, value: u128, mask: u128, width: u32) -> Expr {
    Expr::Cmp(Cmp {
        symbol: symbol.to_owned(),
        relop: RelOp::Eq,
        operand: Operand::Integer { value, mask, width },
    })
}

fn disjunction(terms: Vec<Expr>) -> Expr {
    match terms.len() {
        0 => Expr::Boolean(false),
        1 => {
            let mut terms = terms;
            terms.swap_remove(0)
        }
        _ => Expr::Or(terms),
    }
}

/// `x != value` holds iff some masked bit of x differs from value: one
/// single-bit equality per mask bit, with the bit inverted.
fn expand_ne(symbol: &str, value: u128, mask: u128, width: u32) -> Expr {
    let mut terms = Vec::new();
    for i in 0..128 {
        let bit = 1u128 << i;
        if mask & bit != 0 {
            terms.push(eq_cmp(symbol, (value ^ bit) & bit, bit, width));
        }
    }
    disjunction(terms)
}

/// `x < value` holds iff x agrees with value above some 1-bit of value and
/// has that bit clear: one prefix match per 1-bit.
fn expand_lt(symbol: &str, value: u128, mask: u128, width: u32) -> Expr {
    let mut terms = Vec::new();
    for i in 0..128 {
        let bit = 1u128 << i;
        if value & bit != 0 {
            let term_mask = mask & !width_mask(i);
            terms.push(eq_cmp(symbol, value & !width_mask(i + 1), term_mask, width));
        }
    }
    disjunction(terms)
}

/// `x > value` holds iff x agrees with value above some 0-bit of value and
/// has that bit set: one prefix match per 0-bit inside the mask.
fn expand_gt(symbol: &str, value: u128, mask: u128, width: u32) -> Expr {
    let mut terms = Vec::new();
    for i in 0..128 {
        let bit = 1u128 << i;
        if mask & bit != 0 && value & bit == 0 {
            let term_mask = mask & !width_mask(i);
            terms.push(eq_cmp(
                symbol,
                (value & !width_mask(i + 1)) | bit,
                term_mask,
                width,
            ));
        }
    }
    disjunction(terms)
}
