//! Concrete evaluation of an expression against example field values.
//!
//! This is not on the compilation path. It exists so tests can check that
//! a rewritten tree still accepts and rejects the same packets as the tree
//! it came from.

use std::collections::HashMap;

use crate::parse::parse;
use crate::types::width_mask;
use crate::{Cmp, Expr, Operand, RelOp, SymTab, SymbolKind};

/// A concrete value for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Integer(u128),
    String(String),
}

/// An assignment of values to fields. Unassigned integer fields read as
/// zero; unassigned string fields match nothing.
#[derive(Debug, Clone, Default)]
pub struct Valuation {
    values: HashMap<String, FieldValue>,
}

impl Valuation {
    #[must_use]
    pub fn new() -> Valuation {
        Valuation::default()
    }

    pub fn set_integer(&mut self, field: &str, value: u128) -> &mut Valuation {
        self.values
            .insert(field.to_owned(), FieldValue::Integer(value));
        self
    }

    pub fn set_string(&mut self, field: &str, value: &str) -> &mut Valuation {
        self.values
            .insert(field.to_owned(), FieldValue::String(value.to_owned()));
        self
    }

    fn integer(&self, field: &str) -> u128 {
        match self.values.get(field) {
            Some(FieldValue::Integer(v)) => *v,
            _ => 0,
        }
    }

    fn string(&self, field: &str) -> Option<&str> {
        match self.values.get(field) {
            Some(FieldValue::String(s)) => Some(s),
            _ => None,
        }
    }
}

impl Expr {
    /// Evaluate against a valuation. Subfield comparisons read their bit
    /// range out of the parent field; predicate comparisons evaluate the
    /// predicate's expansion. Comparisons on symbols the table does not
    /// define evaluate to false.
    #[must_use]
    pub fn evaluate(&self, valuation: &Valuation, symtab: &SymTab) -> bool {
        match self {
            Expr::Boolean(b) => *b,
            Expr::Cmp(cmp) => evaluate_cmp(cmp, valuation, symtab),
            Expr::And(children) => children.iter().all(|c| c.evaluate(valuation, symtab)),
            Expr::Or(children) => children.iter().any(|c| c.evaluate(valuation, symtab)),
        }
    }
}

fn evaluate_cmp(cmp: &Cmp, valuation: &Valuation, symtab: &SymTab) -> bool {
    let Some(sym) = symtab.get(&cmp.symbol) else {
        return false;
    };
    if let SymbolKind::Predicate { expansion } = &sym.kind {
        let truth = match parse(expansion, symtab) {
            Ok(e) => e.evaluate(valuation, symtab),
            Err(_) => return false,
        };
        return if cmp.tests_true() { truth } else { !truth };
    }
    match &cmp.operand {
        Operand::String(s) => valuation.string(&cmp.symbol) == Some(s.as_str()),
        Operand::Integer { value, mask, .. } => {
            let Some(x) = field_bits(symtab, &cmp.symbol, valuation) else {
                return false;
            };
            match cmp.relop {
                RelOp::Eq => x & mask == *value,
                RelOp::Ne => x & mask != *value,
                RelOp::Lt => x < *value,
                RelOp::Le => x <= *value,
                RelOp::Gt => x > *value,
                RelOp::Ge => x >= *value,
            }
        }
    }
}

/// Read a symbol's bits out of the valuation, walking subfields up to the
/// concrete parent field.
fn field_bits(symtab: &SymTab, name: &str, valuation: &Valuation) -> Option<u128> {
    let width = symtab.get(name)?.width();
    let mut name = name.to_owned();
    let mut ofs = 0;
    loop {
        let sym = symtab.get(&name)?;
        match &sym.kind {
            SymbolKind::Subfield { parent, ofs: o, .. } => {
                ofs += o;
                name = parent.clone();
            }
            _ => break,
        }
    }
    Some((valuation.integer(&name) >> ofs) & width_mask(width))
}
