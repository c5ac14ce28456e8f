//! Normalization into a match-compilable shape.
//!
//! The normal form is not full DNF. It is a terminal, an AND of
//! "generalized comparisons", or an OR whose children are terminals or such
//! ANDs, where a generalized comparison is a single comparison or an OR of
//! comparisons. ANDs distribute over any other kind of OR child, but an OR
//! of plain comparisons survives as a single AND child so the match
//! compiler can treat it as one dimension of a conjunctive match.

use crate::{Cmp, Expr, ExprError, Operand};

impl Expr {
    /// Rewrite a simplified expression into normal form. The result is
    /// observationally equivalent to the input.
    #[must_use]
    pub fn normalize(self) -> Expr {
        match self {
            Expr::Boolean(_) | Expr::Cmp(_) => self,
            Expr::And(children) => normalize_and(children),
            Expr::Or(children) => normalize_or(children),
        }
    }

    /// Like [`Expr::normalize`], but refuse up front when distribution
    /// could expand the expression past `max_terminals` comparisons.
    ///
    /// # Errors
    ///
    /// Fails with [`ExprError::TooComplex`] when the worst-case expansion
    /// exceeds the ceiling. The estimate treats every AND of ORs as fully
    /// distributed, so it never underestimates.
    pub fn normalize_bounded(self, max_terminals: usize) -> Result<Expr, ExprError> {
        let terminals = self.dnf_terminals();
        if terminals > max_terminals {
            return Err(ExprError::TooComplex {
                terminals,
                limit: max_terminals,
            });
        }
        Ok(self.normalize())
    }

    /// Whether the expression is in normal form.
    #[must_use]
    pub fn is_normalized(&self) -> bool {
        fn generalized_cmp(expr: &Expr) -> bool {
            match expr {
                Expr::Cmp(_) => true,
                Expr::Or(children) => children.iter().all(|c| matches!(c, Expr::Cmp(_))),
                _ => false,
            }
        }
        let shape_ok = match self {
            Expr::Boolean(_) | Expr::Cmp(_) => true,
            Expr::And(children) => children.iter().all(generalized_cmp),
            Expr::Or(children) => children.iter().all(|c| match c {
                Expr::Cmp(_) => true,
                Expr::And(gs) => gs.iter().all(generalized_cmp),
                _ => false,
            }),
        };
        shape_ok && self.honors_invariants()
    }
}

fn normalize_and(children: Vec<Expr>) -> Expr {
    let mut flat: Vec<Expr> = Vec::with_capacity(children.len());
    for child in children {
        match child.normalize() {
            Expr::Boolean(false) => return Expr::Boolean(false),
            Expr::Boolean(true) => {}
            Expr::And(gs) => flat.extend(gs),
            other => flat.push(other),
        }
    }

    if !intersect_cmps(&mut flat) {
        return Expr::Boolean(false);
    }

    // An OR child that is not purely comparisons forces distribution:
    // AND(a, OR(t1, t2)) becomes OR(AND(a, t1), AND(a, t2)).
    if let Some(disjuncts) = take_distributable_or(&mut flat) {
        let terms = disjuncts
            .into_iter()
            .map(|d| {
                let mut conj = flat.clone();
                conj.push(d);
                normalize_and(conj)
            })
            .collect();
        return normalize_or(terms);
    }

    match flat.len() {
        0 => Expr::Boolean(true),
        1 => flat.swap_remove(0),
        _ => Expr::And(flat),
    }
}

fn normalize_or(children: Vec<Expr>) -> Expr {
    let mut flat: Vec<Expr> = Vec::with_capacity(children.len());
    for child in children {
        match child.normalize() {
            Expr::Boolean(true) => return Expr::Boolean(true),
            Expr::Boolean(false) => {}
            Expr::Or(gs) => flat.extend(gs),
            other => flat.push(other),
        }
    }
    match flat.len() {
        0 => Expr::Boolean(false),
        1 => flat.swap_remove(0),
        _ => factor_or(flat),
    }
}

/// Undo the duplication annotation introduces: in an OR whose disjuncts all
/// carry the same conjoined comparisons (prerequisites) apart from a single
/// one each, hoist the shared part out so the leftovers form one OR
/// dimension: `a && p || b && p || c && p` becomes `(a || b || c) && p`.
/// Without this, an AND of such ORs would distribute into a crossproduct
/// and the match compiler could never see the conjunctive structure.
fn factor_or(flat: Vec<Expr>) -> Expr {
    let mut disjunct_cmps: Vec<Vec<&Cmp>> = Vec::with_capacity(flat.len());
    for child in &flat {
        match child {
            Expr::Cmp(cmp) => disjunct_cmps.push(vec![cmp]),
            Expr::And(gs) => {
                let mut cmps = Vec::with_capacity(gs.len());
                for g in gs {
                    match g {
                        Expr::Cmp(cmp) => cmps.push(cmp),
                        _ => return Expr::Or(flat),
                    }
                }
                disjunct_cmps.push(cmps);
            }
            _ => return Expr::Or(flat),
        }
    }

    let common: Vec<&Cmp> = disjunct_cmps[0]
        .iter()
        .filter(|c| disjunct_cmps[1..].iter().all(|d| d.contains(*c)))
        .copied()
        .collect();
    if common.is_empty() {
        return Expr::Or(flat);
    }

    let mut residuals: Vec<Cmp> = Vec::with_capacity(disjunct_cmps.len());
    for cmps in &disjunct_cmps {
        let left: Vec<&&Cmp> = cmps.iter().filter(|c| !common.contains(*c)).collect();
        match left.len() {
            // A disjunct equal to the shared part absorbs all the others.
            0 => {
                return match common.len() {
                    1 => Expr::Cmp(common[0].clone()),
                    _ => Expr::And(common.into_iter().cloned().map(Expr::Cmp).collect()),
                };
            }
            1 => {
                let cmp = (*left[0]).clone();
                if !residuals.contains(&cmp) {
                    residuals.push(cmp);
                }
            }
            _ => return Expr::Or(flat),
        }
    }

    let mut out: Vec<Expr> = common.into_iter().cloned().map(Expr::Cmp).collect();
    match residuals.len() {
        1 => out.push(Expr::Cmp(residuals.swap_remove(0))),
        _ => out.push(Expr::Or(residuals.into_iter().map(Expr::Cmp).collect())),
    }
    match out.len() {
        1 => out.swap_remove(0),
        _ => Expr::And(out),
    }
}

/// Remove and return the disjuncts of the first OR child that contains
/// anything other than plain comparisons. ORs of comparisons stay put.
fn take_distributable_or(children: &mut Vec<Expr>) -> Option<Vec<Expr>> {
    let i = children.iter().position(|c| match c {
        Expr::Or(gs) => gs.iter().any(|g| !matches!(g, Expr::Cmp(_))),
        _ => false,
    })?;
    match children.remove(i) {
        Expr::Or(gs) => Some(gs),
        other => {
            children.insert(i, other);
            None
        }
    }
}

/// Merge plain equality comparisons on the same symbol within an AND.
/// Returns false when two of them cannot be satisfied together.
fn intersect_cmps(children: &mut Vec<Expr>) -> bool {
    let mut i = 0;
    while i < children.len() {
        let mut j = i + 1;
        while j < children.len() {
            match merge_pair(&children[i], &children[j]) {
                Merge::Conflict => return false,
                Merge::Combined(merged) => {
                    children[i] = merged;
                    children.remove(j);
                }
                Merge::Keep => j += 1,
                Merge::Duplicate => {
                    children.remove(j);
                }
            }
        }
        i += 1;
    }
    true
}

enum Merge {
    Keep,
    Duplicate,
    Combined(Expr),
    Conflict,
}

fn merge_pair(a: &Expr, b: &Expr) -> Merge {
    let (Expr::Cmp(ca), Expr::Cmp(cb)) = (a, b) else {
        return Merge::Keep;
    };
    if ca.symbol != cb.symbol {
        return Merge::Keep;
    }
    match (&ca.operand, &cb.operand) {
        (
            Operand::Integer {
                value: va,
                mask: ma,
                width,
            },
            Operand::Integer {
                value: vb, mask: mb, ..
            },
        ) => {
            if (va ^ vb) & ma & mb != 0 {
                return Merge::Conflict;
            }
            if mb & !ma == 0 {
                return Merge::Duplicate;
            }
            Merge::Combined(Expr::Cmp(Cmp {
                symbol: ca.symbol.clone(),
                relop: ca.relop,
                operand: Operand::Integer {
                    value: va | vb,
                    mask: ma | mb,
                    width: *width,
                },
            }))
        }
        (Operand::String(sa), Operand::String(sb)) => {
            if sa == sb {
                Merge::Duplicate
            } else {
                Merge::Conflict
            }
        }
        _ => Merge::Keep,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RelOp;

    fn cmp(symbol: &str, value: u128, mask: u128, width: u32) -> Expr {
        Expr::Cmp(Cmp {
            symbol: symbol.to_owned(),
            relop: RelOp::Eq,
            operand: Operand::Integer { value, mask, width },
        })
    }

    #[test]
    fn terminals_already_normalized() {
        assert!(Expr::Boolean(true).is_normalized());
        assert!(cmp("a", 1, 0xf, 4).is_normalized());
    }

    #[test]
    fn and_of_cmps_stays_put() {
        let e = Expr::And(vec![cmp("a", 1, 0xf, 4), cmp("b", 2, 0xf, 4)]);
        let n = e.clone().normalize();
        assert_eq!(n, e);
        assert!(n.is_normalized());
    }

    #[test]
    fn or_dimension_preserved_inside_and() {
        let dim = Expr::Or(vec![cmp("a", 1, 0xf, 4), cmp("a", 2, 0xf, 4)]);
        let e = Expr::And(vec![dim.clone(), cmp("b", 3, 0xf, 4)]);
        let n = e.clone().normalize();
        assert_eq!(n, e);
        assert!(n.is_normalized());
    }

    #[test]
    fn and_distributes_over_or_of_ands() {
        // a && (b && c || d && f) => a && b && c || a && d && f
        let e = Expr::And(vec![
            cmp("a", 1, 0xf, 4),
            Expr::Or(vec![
                Expr::And(vec![cmp("b", 1, 0xf, 4), cmp("c", 1, 0xf, 4)]),
                Expr::And(vec![cmp("d", 1, 0xf, 4), cmp("f", 1, 0xf, 4)]),
            ]),
        ]);
        let n = e.normalize();
        assert!(n.is_normalized());
        let Expr::Or(terms) = &n else {
            panic!("expected Or at the root, got {n:?}");
        };
        assert_eq!(terms.len(), 2);
        for term in terms {
            let Expr::And(gs) = term else {
                panic!("expected And term, got {term:?}");
            };
            assert_eq!(gs.len(), 3);
        }
    }

    #[test]
    fn conflicting_cmps_collapse_to_false() {
        let e = Expr::And(vec![cmp("a", 1, 0xf, 4), cmp("a", 2, 0xf, 4)]);
        assert_eq!(e.normalize(), Expr::Boolean(false));
    }

    #[test]
    fn compatible_cmps_intersect() {
        // a[0:3] == 0b0001 with mask 0b0011 plus mask 0b1100 == 0b0100.
        let e = Expr::And(vec![cmp("a", 0b0001, 0b0011, 4), cmp("a", 0b0100, 0b1100, 4)]);
        assert_eq!(e.normalize(), cmp("a", 0b0101, 0b1111, 4));
    }

    #[test]
    fn duplicate_cmps_merge() {
        let e = Expr::And(vec![cmp("a", 1, 0xf, 4), cmp("a", 1, 0xf, 4)]);
        assert_eq!(e.normalize(), cmp("a", 1, 0xf, 4));
    }

    #[test]
    fn conflicting_string_cmps_collapse_to_false() {
        let s = |name: &str| {
            Expr::Cmp(Cmp {
                symbol: "inport".into(),
                relop: RelOp::Eq,
                operand: Operand::String(name.into()),
            })
        };
        let e = Expr::And(vec![s("lp1"), s("lp2")]);
        assert_eq!(e.normalize(), Expr::Boolean(false));
    }

    #[test]
    fn nested_or_flattens() {
        let inner = Expr::Or(vec![
            Expr::And(vec![cmp("a", 1, 0xf, 4), cmp("b", 1, 0xf, 4)]),
            cmp("c", 1, 0xf, 4),
        ]);
        let e = Expr::Or(vec![inner, cmp("d", 1, 0xf, 4)]);
        let n = e.normalize();
        assert!(n.is_normalized());
        let Expr::Or(children) = &n else {
            panic!("expected Or, got {n:?}");
        };
        assert_eq!(children.len(), 3);
    }

    #[test]
    fn normalize_is_idempotent() {
        let e = Expr::And(vec![
            cmp("a", 1, 0xf, 4),
            Expr::Or(vec![
                Expr::And(vec![cmp("b", 1, 0xf, 4), cmp("c", 1, 0xf, 4)]),
                cmp("d", 1, 0xf, 4),
            ]),
        ]);
        let once = e.normalize();
        assert!(once.is_normalized());
        assert_eq!(once.clone().normalize(), once);
    }

    #[test]
    fn bounded_normalize_rejects_blowup() {
        // Five dimensions of four values each: 1024 worst-case terminals.
        let dims: Vec<Expr> = (0..5)
            .map(|d| {
                Expr::Or(
                    (0..4)
                        .map(|v| {
                            Expr::And(vec![
                                cmp(&format!("f{d}"), v, 0xf, 4),
                                cmp("g", v, 0xf, 4),
                            ])
                        })
                        .collect(),
                )
            })
            .collect();
        let e = Expr::And(dims);
        let err = e.clone().normalize_bounded(100).unwrap_err();
        assert!(matches!(err, ExprError::TooComplex { .. }));
        assert!(e.normalize_bounded(1 << 20).is_ok());
    }

    #[test]
    fn bounded_normalize_passes_small_inputs() {
        let e = Expr::And(vec![cmp("a", 1, 0xf, 4), cmp("b", 2, 0xf, 4)]);
        let n = e.normalize_bounded(64).unwrap();
        assert!(n.is_normalized());
    }
}
