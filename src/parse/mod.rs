mod grammar;
mod lower;

pub(crate) use lower::negate;

use crate::{Expr, ExprError, SymTab};

/// Parse a match expression against a symbol table.
///
/// The raw tree is fully desugared: NOT is pushed down and eliminated, set
/// membership expands into OR/AND, reversed comparisons put the symbol on
/// the left, and range forms split into conjunctions.
///
/// # Errors
///
/// Returns [`ExprError`] for malformed syntax (with position information),
/// references to undefined symbols, comparisons a symbol's level of
/// measurement does not support, constants that do not fit their field, and
/// circular predicate definitions.
pub fn parse(input: &str, symtab: &SymTab) -> Result<Expr, ExprError> {
    use winnow::Parser;
    let ast = grammar::expr_line
        .parse(input)
        .map_err(|e| ExprError::Syntax {
            message: e.to_string(),
        })?;
    lower::lower(ast, symtab)
}
