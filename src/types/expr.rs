use std::fmt;

use super::symtab::width_mask;

/// Relational operator of a comparison. The symbol is always on the left,
/// e.g. `field < constant`; the parser reverses `constant < field` forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl RelOp {
    /// The operator that holds exactly when `self` does not.
    #[must_use]
    pub fn negated(self) -> RelOp {
        match self {
            RelOp::Eq => RelOp::Ne,
            RelOp::Ne => RelOp::Eq,
            RelOp::Lt => RelOp::Ge,
            RelOp::Le => RelOp::Gt,
            RelOp::Gt => RelOp::Le,
            RelOp::Ge => RelOp::Lt,
        }
    }

    /// The operator with its operands swapped, for rewriting `a < x` as
    /// `x > a`.
    #[must_use]
    pub fn reversed(self) -> RelOp {
        match self {
            RelOp::Eq => RelOp::Eq,
            RelOp::Ne => RelOp::Ne,
            RelOp::Lt => RelOp::Gt,
            RelOp::Le => RelOp::Ge,
            RelOp::Gt => RelOp::Lt,
            RelOp::Ge => RelOp::Le,
        }
    }
}

impl fmt::Display for RelOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RelOp::Eq => "==",
            RelOp::Ne => "!=",
            RelOp::Lt => "<",
            RelOp::Le => "<=",
            RelOp::Gt => ">",
            RelOp::Ge => ">=",
        };
        write!(f, "{s}")
    }
}

/// The constant side of a comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// Fixed-width integer constant. For `==`/`!=` the comparison tests
    /// `field & mask == value`; for relational operators the mask covers the
    /// full symbol width. Every 1-bit of `value` lies inside `mask`, and
    /// `mask` is never zero.
    Integer { value: u128, mask: u128, width: u32 },
    /// String constant, for string-typed symbols only.
    String(String),
}

/// A terminal comparison of a symbol against a constant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cmp {
    pub symbol: String,
    pub relop: RelOp,
    pub operand: Operand,
}

impl Cmp {
    /// Whether a 1-bit test (predicate reference) tests for truth, taking
    /// the relop and the constant together.
    #[must_use]
    pub(crate) fn tests_true(&self) -> bool {
        match &self.operand {
            Operand::Integer { value, .. } => (self.relop == RelOp::Eq) == (*value != 0),
            Operand::String(_) => self.relop == RelOp::Eq,
        }
    }
}

/// An abstract syntax tree for a matching expression.
///
/// The pipeline maintains and relies on a few invariants:
///
///   - An `And` or `Or` node never has a direct child of its own type (such
///     children would merge into the parent). Grandchildren of the same type
///     are fine, so every nonterminal at one depth shares a type.
///
///   - `And` and `Or` nodes have at least two children.
///
///   - A comparison always has a nonzero mask and no 1-bit in its value
///     outside the mask.
///
/// [`Expr::honors_invariants`] checks all three.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Literal `1` (true) or `0` (false).
    Boolean(bool),
    /// Terminal comparison.
    Cmp(Cmp),
    And(Vec<Expr>),
    Or(Vec<Expr>),
}

/// Which nonterminal type to combine under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Junction {
    And,
    Or,
}

impl Expr {
    #[must_use]
    pub fn and(self, other: Expr) -> Expr {
        Expr::combine(Junction::And, self, other)
    }

    #[must_use]
    pub fn or(self, other: Expr) -> Expr {
        Expr::combine(Junction::Or, self, other)
    }

    /// Merge two expressions under `op` without creating a direct child of
    /// the parent's type, folding Boolean identity and dominator literals.
    pub(crate) fn combine(op: Junction, a: Expr, b: Expr) -> Expr {
        let (identity, dominator) = match op {
            Junction::And => (true, false),
            Junction::Or => (false, true),
        };
        match (a, b) {
            (Expr::Boolean(v), other) | (other, Expr::Boolean(v)) => {
                if v == identity {
                    other
                } else {
                    Expr::Boolean(dominator)
                }
            }
            (a, b) => {
                let mut children = Vec::new();
                for e in [a, b] {
                    match (op, e) {
                        (Junction::And, Expr::And(gs)) | (Junction::Or, Expr::Or(gs)) => {
                            children.extend(gs);
                        }
                        (_, e) => children.push(e),
                    }
                }
                match op {
                    Junction::And => Expr::And(children),
                    Junction::Or => Expr::Or(children),
                }
            }
        }
    }

    /// Standalone shape-invariant predicate; see the type-level docs. Holds
    /// for every tree produced by parsing, annotation, simplification, and
    /// normalization.
    #[must_use]
    pub fn honors_invariants(&self) -> bool {
        match self {
            Expr::Boolean(_) => true,
            Expr::Cmp(cmp) => match &cmp.operand {
                Operand::Integer { value, mask, width } => {
                    *mask != 0 && value & !mask == 0 && mask & !width_mask(*width) == 0
                }
                Operand::String(_) => cmp.relop == RelOp::Eq || cmp.relop == RelOp::Ne,
            },
            Expr::And(children) => {
                children.len() >= 2
                    && children
                        .iter()
                        .all(|c| !matches!(c, Expr::And(_)) && c.honors_invariants())
            }
            Expr::Or(children) => {
                children.len() >= 2
                    && children
                        .iter()
                        .all(|c| !matches!(c, Expr::Or(_)) && c.honors_invariants())
            }
        }
    }

    /// Upper bound on the number of terminals a full distribution of AND
    /// over OR could produce. Used by
    /// [`normalize_bounded`](Expr::normalize_bounded) to fail fast before an
    /// exponential blow-up.
    #[must_use]
    pub(crate) fn dnf_terminals(&self) -> usize {
        match self {
            Expr::Boolean(_) | Expr::Cmp(_) => 1,
            Expr::Or(children) => children
                .iter()
                .fold(0usize, |n, c| n.saturating_add(c.dnf_terminals())),
            Expr::And(children) => children
                .iter()
                .fold(1usize, |n, c| n.saturating_mul(c.dnf_terminals())),
        }
    }
}

fn fmt_child(child: &Expr, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match child {
        Expr::And(_) | Expr::Or(_) => write!(f, "({child})"),
        _ => write!(f, "{child}"),
    }
}

impl fmt::Display for Expr {
    /// Canonical text form: `&&`/`||` with nonterminal children
    /// parenthesized, decimal constants with a `/mask` suffix when the mask
    /// is not the full symbol width, and `1`/`0` for Boolean literals.
    /// Parsing the rendering of a tree yields a logically equivalent tree.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Boolean(b) => write!(f, "{}", u8::from(*b)),
            Expr::Cmp(cmp) => {
                write!(f, "{} {} ", cmp.symbol, cmp.relop)?;
                match &cmp.operand {
                    Operand::Integer { value, mask, width } => {
                        if *mask == width_mask(*width) {
                            write!(f, "{value}")
                        } else {
                            write!(f, "{value}/{mask}")
                        }
                    }
                    Operand::String(s) => {
                        write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
                    }
                }
            }
            Expr::And(children) => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " && ")?;
                    }
                    fmt_child(child, f)?;
                }
                Ok(())
            }
            Expr::Or(children) => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " || ")?;
                    }
                    fmt_child(child, f)?;
                }
                Ok(())
            }
        }
    }
}
