//! A compiler from boolean match expressions over logical network fields
//! to flow-table matches.
//!
//! An expression like `tcp.src == {80, 443} && inport == "lp1"` is parsed
//! against a caller-built [`SymTab`], annotated with each field's
//! prerequisites, simplified, normalized, and finally compiled into
//! value/mask matches, using the conjunctive-match encoding when a
//! disjunction spans independent fields.
//!
//! ```
//! use flowexpr::{parse, to_matches, Level, SymTab};
//!
//! let mut symtab = SymTab::new();
//! symtab.add_field("tcp.src", 16, Level::Ordinal, None, false)?;
//!
//! let expr = parse("tcp.src == {80, 443}", &symtab)?
//!     .annotate(&symtab)?
//!     .simplify()
//!     .normalize();
//! let matches = to_matches(&expr, &symtab, &|_: &str| -> Option<u32> { None })?;
//! assert_eq!(matches.len(), 2);
//! # Ok::<(), flowexpr::ExprError>(())
//! ```

mod annotate;
mod compile;
mod evaluate;
mod normalize;
mod parse;
mod simplify;
mod types;

pub use compile::{to_matches, Conjunction, FieldMatch, Match, MatchInfo, MatchSet, PortResolver};
pub use evaluate::{FieldValue, Valuation};
pub use parse::parse;
pub use types::{
    Cmp, Expr, ExprError, Level, Operand, RelOp, SymTab, Symbol, SymbolKind,
};
