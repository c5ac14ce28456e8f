mod error;
mod expr;
mod symtab;

pub use error::ExprError;
pub use expr::{Cmp, Expr, Operand, RelOp};
pub use symtab::{Level, SymTab, Symbol, SymbolKind};

pub(crate) use expr::Junction;
pub(crate) use symtab::width_mask;
