use crate::types::{width_mask, Junction};
use crate::{Cmp, Expr, ExprError, Level, Operand, RelOp, SymTab, Symbol, SymbolKind};

use super::grammar::{self, Ast, Constant};

/// Resolve a symbol's level of measurement, deriving predicate levels from
/// their expansions: nominal if the expansion refers to any nominal symbol,
/// else Boolean. `visiting` guards against circular definitions.
pub(crate) fn symbol_level(
    symtab: &SymTab,
    symbol: &Symbol,
    visiting: &mut Vec<String>,
) -> Result<Level, ExprError> {
    match &symbol.kind {
        SymbolKind::Predicate { expansion } => {
            if visiting.iter().any(|v| v == &symbol.name) {
                return Err(ExprError::CircularPrerequisite {
                    symbol: symbol.name.clone(),
                });
            }
            visiting.push(symbol.name.clone());
            let result = predicate_level(symtab, expansion, visiting);
            visiting.pop();
            result
        }
        _ => Ok(symbol.declared_level().unwrap_or(Level::Nominal)),
    }
}

fn predicate_level(
    symtab: &SymTab,
    expansion: &str,
    visiting: &mut Vec<String>,
) -> Result<Level, ExprError> {
    use winnow::Parser;
    let ast = grammar::expr_line
        .parse(expansion)
        .map_err(|e| ExprError::syntax(e.to_string()))?;
    let mut idents = Vec::new();
    grammar::referenced_idents(&ast, &mut idents);
    let mut level = Level::Boolean;
    for name in idents {
        let sym = symtab.get(&name).ok_or_else(|| ExprError::undefined(&name))?;
        if symbol_level(symtab, sym, visiting)? == Level::Nominal {
            level = Level::Nominal;
        }
    }
    Ok(level)
}

/// Rewrite `expr` as its logical negation without a NOT node: Boolean
/// literals flip, comparisons invert their operator, and AND/OR exchange by
/// De Morgan's laws.
///
/// # Errors
///
/// Nominal symbols only support equality, so negating an equality on one
/// fails with a level-of-measurement error.
pub(crate) fn negate(expr: Expr, symtab: &SymTab) -> Result<Expr, ExprError> {
    match expr {
        Expr::Boolean(b) => Ok(Expr::Boolean(!b)),
        Expr::Cmp(cmp) => {
            let sym = symtab
                .get(&cmp.symbol)
                .ok_or_else(|| ExprError::undefined(&cmp.symbol))?;
            match symbol_level(symtab, sym, &mut Vec::new())? {
                Level::Ordinal | Level::Boolean => Ok(Expr::Cmp(Cmp {
                    relop: cmp.relop.negated(),
                    ..cmp
                })),
                Level::Nominal => Err(nominal_equality_error(sym)),
            }
        }
        Expr::And(children) => fold_negated(Junction::Or, children, symtab),
        Expr::Or(children) => fold_negated(Junction::And, children, symtab),
    }
}

fn fold_negated(op: Junction, children: Vec<Expr>, symtab: &SymTab) -> Result<Expr, ExprError> {
    let mut result: Option<Expr> = None;
    for child in children {
        let negated = negate(child, symtab)?;
        result = Some(match result {
            None => negated,
            Some(acc) => Expr::combine(op, acc, negated),
        });
    }
    // And/Or nodes always have at least two children.
    result.ok_or_else(|| ExprError::syntax("empty conjunction"))
}

fn nominal_equality_error(sym: &Symbol) -> ExprError {
    let what = match &sym.kind {
        SymbolKind::Predicate { .. } => {
            return ExprError::level(
                &sym.name,
                format!(
                    "nominal predicate '{}' may only be tested positively, e.g. '{0}' or '{0} == 1'",
                    sym.name
                ),
            );
        }
        SymbolKind::String => "string field",
        _ => "nominal field",
    };
    ExprError::level(
        &sym.name,
        format!(
            "{what} '{}' may only be tested for equality (taking enclosing '!' operators \
             into account)",
            sym.name
        ),
    )
}

fn relational_error(sym: &Symbol, level: Level) -> ExprError {
    ExprError::level(
        &sym.name,
        format!(
            "only ordinal fields support relational comparisons, and '{}' is {}",
            sym.name,
            level.as_str()
        ),
    )
}

/// Lower a syntactic tree into an expression tree: resolve symbols, check
/// levels and widths, and desugar NOT, set membership, reversed
/// comparisons, and ranges.
pub(crate) fn lower(ast: Ast, symtab: &SymTab) -> Result<Expr, ExprError> {
    match ast {
        Ast::Literal(Constant::Integer {
            value: v @ (0 | 1),
            mask: None,
        }) => Ok(Expr::Boolean(v == 1)),
        Ast::Literal(_) => Err(ExprError::syntax(
            "a constant is not an expression, except the Boolean literals 0 and 1",
        )),
        Ast::Test(name) => make_test(&name, symtab),
        Ast::Cmp { field, relop, set } => {
            let sym = symtab
                .get(&field)
                .ok_or_else(|| ExprError::undefined(&field))?;
            if set.len() > 1 && relop != RelOp::Eq && relop != RelOp::Ne {
                return Err(ExprError::syntax(
                    "only == and != may be tested against a value set",
                ));
            }
            // x == {a, b, c} is x == a || x == b || x == c;
            // x != {a, b, c} is x != a && x != b && x != c.
            let op = if relop == RelOp::Ne {
                Junction::And
            } else {
                Junction::Or
            };
            let mut result: Option<Expr> = None;
            for constant in set {
                let cmp = make_cmp(sym, relop, constant, symtab)?;
                result = Some(match result {
                    None => cmp,
                    Some(acc) => Expr::combine(op, acc, cmp),
                });
            }
            result.ok_or_else(|| ExprError::syntax("empty value set"))
        }
        Ast::Rev { lo, lo_op, field, hi } => {
            let sym = symtab
                .get(&field)
                .ok_or_else(|| ExprError::undefined(&field))?;
            // a < x becomes x > a; a < x < b becomes x > a && x < b.
            let low = make_cmp(sym, lo_op.reversed(), lo, symtab)?;
            match hi {
                None => Ok(low),
                Some((hi_op, hi)) => {
                    let high = make_cmp(sym, hi_op, hi, symtab)?;
                    Ok(Expr::combine(Junction::And, low, high))
                }
            }
        }
        Ast::Not(inner) => {
            let e = lower(*inner, symtab)?;
            negate(e, symtab)
        }
        Ast::And(children) => fold_lowered(Junction::And, children, symtab),
        Ast::Or(children) => fold_lowered(Junction::Or, children, symtab),
    }
}

fn fold_lowered(op: Junction, children: Vec<Ast>, symtab: &SymTab) -> Result<Expr, ExprError> {
    let mut result: Option<Expr> = None;
    for child in children {
        let lowered = lower(child, symtab)?;
        result = Some(match result {
            None => lowered,
            Some(acc) => Expr::combine(op, acc, lowered),
        });
    }
    result.ok_or_else(|| ExprError::syntax("empty expression"))
}

/// A bare identifier: a predicate reference or a 1-bit field, tested for 1.
fn make_test(name: &str, symtab: &SymTab) -> Result<Expr, ExprError> {
    let sym = symtab.get(name).ok_or_else(|| ExprError::undefined(name))?;
    if sym.width() != 1 {
        return Err(ExprError::syntax(format!(
            "expecting relational operator after '{name}'"
        )));
    }
    // Force level resolution so circular predicate definitions surface at
    // parse time.
    symbol_level(symtab, sym, &mut Vec::new())?;
    Ok(Expr::Cmp(Cmp {
        symbol: name.to_owned(),
        relop: RelOp::Eq,
        operand: Operand::Integer {
            value: 1,
            mask: 1,
            width: 1,
        },
    }))
}

fn make_cmp(
    sym: &Symbol,
    relop: RelOp,
    constant: Constant,
    symtab: &SymTab,
) -> Result<Expr, ExprError> {
    let level = symbol_level(symtab, sym, &mut Vec::new())?;
    let relational = !matches!(relop, RelOp::Eq | RelOp::Ne);
    if relational && level != Level::Ordinal {
        return Err(relational_error(sym, level));
    }

    match &sym.kind {
        SymbolKind::String => {
            let Constant::String(s) = constant else {
                return Err(ExprError::syntax(format!(
                    "expecting string literal to test string field '{}'",
                    sym.name
                )));
            };
            if relop == RelOp::Ne {
                return Err(nominal_equality_error(sym));
            }
            Ok(Expr::Cmp(Cmp {
                symbol: sym.name.clone(),
                relop,
                operand: Operand::String(s),
            }))
        }
        SymbolKind::Predicate { .. } => {
            let Constant::Integer { value, mask } = constant else {
                return Err(ExprError::syntax(format!(
                    "expecting 0 or 1 to test predicate '{}'",
                    sym.name
                )));
            };
            if value > 1 || mask.is_some_and(|m| m != 1) {
                return Err(ExprError::width(
                    &sym.name,
                    format!("predicate '{}' is a 1-bit value", sym.name),
                ));
            }
            let cmp = Cmp {
                symbol: sym.name.clone(),
                relop,
                operand: Operand::Integer {
                    value,
                    mask: 1,
                    width: 1,
                },
            };
            if level == Level::Nominal && !cmp.tests_true() {
                return Err(nominal_equality_error(sym));
            }
            Ok(Expr::Cmp(cmp))
        }
        SymbolKind::Field { width, .. } | SymbolKind::Subfield { width, .. } => {
            let width = *width;
            let Constant::Integer { value, mask } = constant else {
                return Err(ExprError::syntax(format!(
                    "expecting integer constant to test field '{}'",
                    sym.name
                )));
            };
            let full = width_mask(width);
            match mask {
                Some(mask) => {
                    if relational {
                        return Err(ExprError::syntax(
                            "masked constants may only be tested with == or !=",
                        ));
                    }
                    if level != Level::Ordinal {
                        return Err(ExprError::level(
                            &sym.name,
                            format!(
                                "only ordinal fields support masked constants, and '{}' is {}",
                                sym.name,
                                level.as_str()
                            ),
                        ));
                    }
                    if mask == 0 {
                        return Err(ExprError::lexical("zero mask is not allowed"));
                    }
                    if value & !mask != 0 {
                        return Err(ExprError::lexical(format!(
                            "value {value} has 1-bits outside its mask {mask}"
                        )));
                    }
                    if mask & !full != 0 {
                        return Err(ExprError::width(
                            &sym.name,
                            format!(
                                "mask {mask} does not fit in the {width}-bit field '{}'",
                                sym.name
                            ),
                        ));
                    }
                    Ok(Expr::Cmp(Cmp {
                        symbol: sym.name.clone(),
                        relop,
                        operand: Operand::Integer { value, mask, width },
                    }))
                }
                None => {
                    if value & !full != 0 {
                        return Err(ExprError::width(
                            &sym.name,
                            format!(
                                "value {value} does not fit in the {width}-bit field '{}'",
                                sym.name
                            ),
                        ));
                    }
                    if relop == RelOp::Ne && level == Level::Nominal {
                        return Err(nominal_equality_error(sym));
                    }
                    Ok(Expr::Cmp(Cmp {
                        symbol: sym.name.clone(),
                        relop,
                        operand: Operand::Integer {
                            value,
                            mask: full,
                            width,
                        },
                    }))
                }
            }
        }
    }
}
