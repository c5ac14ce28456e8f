use std::collections::HashMap;

use super::ExprError;

/// Level of measurement of a symbol, controlling which comparison operators
/// it supports.
///
/// Ordinal symbols can be examined bit by bit, so they support the full set
/// of relational operators (every relational test lowers to a collection of
/// bitwise tests). Nominal symbols are opaque identifiers and may only be
/// tested for equality. Boolean is the special case of a nominal value with
/// exactly two values, where both equality and inequality are cheap; only
/// predicates have Boolean level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Nominal,
    Boolean,
    Ordinal,
}

impl Level {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Nominal => "nominal",
            Level::Boolean => "Boolean",
            Level::Ordinal => "ordinal",
        }
    }
}

/// What a symbol refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolKind {
    /// An integer field of `width` bits (1..=128).
    Field { width: u32, level: Level },
    /// A string-typed field, e.g. a logical port name. Always nominal.
    String,
    /// A contiguous bit range `[ofs, ofs + width)` of an ordinal integer
    /// field. Always ordinal.
    Subfield { parent: String, ofs: u32, width: u32 },
    /// A named Boolean expression usable like a 1-bit field. The expansion
    /// is an expression string, parsed on demand and possibly referring to
    /// further predicates.
    Predicate { expansion: String },
}

/// A named field, subfield, or predicate registered in a [`SymTab`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// Expression that must hold whenever this symbol is referenced,
    /// conjoined in during annotation.
    pub prereqs: Option<String>,
    /// Force this symbol into the base match of every generated flow
    /// instead of letting it become a conjunctive-match dimension.
    pub must_crossproduct: bool,
}

impl Symbol {
    /// Width in bits; 0 for string symbols, 1 for predicates.
    #[must_use]
    pub fn width(&self) -> u32 {
        match &self.kind {
            SymbolKind::Field { width, .. } | SymbolKind::Subfield { width, .. } => *width,
            SymbolKind::String => 0,
            SymbolKind::Predicate { .. } => 1,
        }
    }

    /// The level declared at registration time. Predicates have no declared
    /// level; theirs is derived from their expansion during parsing.
    #[must_use]
    pub fn declared_level(&self) -> Option<Level> {
        match &self.kind {
            SymbolKind::Field { level, .. } => Some(*level),
            SymbolKind::String => Some(Level::Nominal),
            SymbolKind::Subfield { .. } => Some(Level::Ordinal),
            SymbolKind::Predicate { .. } => None,
        }
    }
}

/// All-ones mask for a `width`-bit value.
pub(crate) fn width_mask(width: u32) -> u128 {
    if width >= 128 {
        u128::MAX
    } else {
        (1u128 << width) - 1
    }
}

/// A symbol table: the set of fields, subfields, and predicates a match
/// expression may refer to.
///
/// Built once per compile session by a configuration loader and passed by
/// reference to every stage of the pipeline. Dropping the table releases
/// every symbol.
#[derive(Debug, Clone, Default)]
pub struct SymTab {
    symbols: HashMap<String, Symbol>,
}

impl SymTab {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an integer field of `width` bits.
    ///
    /// # Errors
    ///
    /// Fails on a duplicate name, a width outside 1..=128, or a `Boolean`
    /// level (only predicates may be Boolean).
    pub fn add_field(
        &mut self,
        name: &str,
        width: u32,
        level: Level,
        prereqs: Option<&str>,
        must_crossproduct: bool,
    ) -> Result<&Symbol, ExprError> {
        if width == 0 || width > 128 {
            return Err(ExprError::width(
                name,
                format!("field '{name}' must be 1 to 128 bits wide, not {width}"),
            ));
        }
        if level == Level::Boolean {
            return Err(ExprError::level(
                name,
                format!("field '{name}' may not be declared Boolean; only predicates are Boolean"),
            ));
        }
        self.insert(Symbol {
            name: name.to_owned(),
            kind: SymbolKind::Field { width, level },
            prereqs: prereqs.map(str::to_owned),
            must_crossproduct,
        })
    }

    /// Register a subfield covering bits `[ofs, ofs + width)` of `parent`.
    ///
    /// # Errors
    ///
    /// Fails on a duplicate name, an unknown or non-ordinal parent, or a bit
    /// range that does not fit inside the parent.
    pub fn add_subfield(
        &mut self,
        name: &str,
        parent: &str,
        ofs: u32,
        width: u32,
        prereqs: Option<&str>,
    ) -> Result<&Symbol, ExprError> {
        let parent_sym = self
            .symbols
            .get(parent)
            .ok_or_else(|| ExprError::undefined(parent))?;
        let parent_width = match &parent_sym.kind {
            SymbolKind::Field {
                width,
                level: Level::Ordinal,
            } => *width,
            _ => {
                return Err(ExprError::level(
                    parent,
                    format!("'{parent}' is not an ordinal field and cannot have subfields"),
                ));
            }
        };
        if width == 0 || ofs.checked_add(width).is_none_or(|end| end > parent_width) {
            return Err(ExprError::width(
                name,
                format!(
                    "bit range [{ofs}, {}) of '{name}' does not fit in the \
                     {parent_width}-bit field '{parent}'",
                    ofs.saturating_add(width)
                ),
            ));
        }
        self.insert(Symbol {
            name: name.to_owned(),
            kind: SymbolKind::Subfield {
                parent: parent.to_owned(),
                ofs,
                width,
            },
            prereqs: prereqs.map(str::to_owned),
            must_crossproduct: false,
        })
    }

    /// Register a string-typed field, e.g. a logical port name.
    ///
    /// # Errors
    ///
    /// Fails on a duplicate name.
    pub fn add_string(&mut self, name: &str, prereqs: Option<&str>) -> Result<&Symbol, ExprError> {
        self.insert(Symbol {
            name: name.to_owned(),
            kind: SymbolKind::String,
            prereqs: prereqs.map(str::to_owned),
            must_crossproduct: false,
        })
    }

    /// Register a predicate whose `expansion` is an expression string.
    ///
    /// The expansion is resolved lazily, when an expression referencing the
    /// predicate is parsed or annotated, so predicates may be registered in
    /// any order. A predicate whose expansion transitively refers to itself
    /// is reported as a circular definition at that point.
    ///
    /// # Errors
    ///
    /// Fails on a duplicate name.
    pub fn add_predicate(&mut self, name: &str, expansion: &str) -> Result<&Symbol, ExprError> {
        self.insert(Symbol {
            name: name.to_owned(),
            kind: SymbolKind::Predicate {
                expansion: expansion.to_owned(),
            },
            prereqs: None,
            must_crossproduct: false,
        })
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Iterate over all registered symbols in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    fn insert(&mut self, symbol: Symbol) -> Result<&Symbol, ExprError> {
        let name = symbol.name.clone();
        if self.symbols.contains_key(&name) {
            return Err(ExprError::DuplicateSymbol { name });
        }
        self.symbols.insert(name.clone(), symbol);
        Ok(&self.symbols[&name])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_get_field() {
        let mut symtab = SymTab::new();
        symtab
            .add_field("vlan.tci", 16, Level::Ordinal, None, false)
            .unwrap();
        let sym = symtab.get("vlan.tci").unwrap();
        assert_eq!(sym.width(), 16);
        assert_eq!(sym.declared_level(), Some(Level::Ordinal));
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut symtab = SymTab::new();
        symtab
            .add_field("eth.type", 16, Level::Nominal, None, true)
            .unwrap();
        let err = symtab.add_predicate("eth.type", "1").unwrap_err();
        assert_eq!(
            err,
            ExprError::DuplicateSymbol {
                name: "eth.type".into()
            }
        );
    }

    #[test]
    fn zero_width_field_rejected() {
        let mut symtab = SymTab::new();
        let err = symtab
            .add_field("bad", 0, Level::Ordinal, None, false)
            .unwrap_err();
        assert!(matches!(err, ExprError::WidthMismatch { .. }));
    }

    #[test]
    fn boolean_field_rejected() {
        let mut symtab = SymTab::new();
        let err = symtab
            .add_field("flag", 1, Level::Boolean, None, false)
            .unwrap_err();
        assert!(matches!(err, ExprError::LevelOfMeasurement { .. }));
    }

    #[test]
    fn subfield_range_checked() {
        let mut symtab = SymTab::new();
        symtab
            .add_field("vlan.tci", 16, Level::Ordinal, None, false)
            .unwrap();
        symtab
            .add_subfield("vlan.vid", "vlan.tci", 0, 12, None)
            .unwrap();
        assert_eq!(symtab.get("vlan.vid").unwrap().width(), 12);

        let err = symtab
            .add_subfield("vlan.bad", "vlan.tci", 8, 9, None)
            .unwrap_err();
        assert!(matches!(err, ExprError::WidthMismatch { .. }));
    }

    #[test]
    fn subfield_of_nominal_rejected() {
        let mut symtab = SymTab::new();
        symtab
            .add_field("eth.type", 16, Level::Nominal, None, true)
            .unwrap();
        let err = symtab
            .add_subfield("eth.low", "eth.type", 0, 8, None)
            .unwrap_err();
        assert!(matches!(err, ExprError::LevelOfMeasurement { .. }));
    }

    #[test]
    fn subfield_of_unknown_parent_rejected() {
        let mut symtab = SymTab::new();
        let err = symtab.add_subfield("x", "missing", 0, 4, None).unwrap_err();
        assert_eq!(err, ExprError::undefined("missing"));
    }

    #[test]
    fn string_symbol_has_zero_width() {
        let mut symtab = SymTab::new();
        symtab.add_string("inport", None).unwrap();
        let sym = symtab.get("inport").unwrap();
        assert_eq!(sym.width(), 0);
        assert_eq!(sym.declared_level(), Some(Level::Nominal));
    }

    #[test]
    fn predicate_registration_is_lazy() {
        let mut symtab = SymTab::new();
        // "p2" is not defined yet; registration must still succeed.
        symtab.add_predicate("p1", "p2").unwrap();
        symtab.add_predicate("p2", "p1").unwrap();
        assert_eq!(symtab.len(), 2);
    }

    #[test]
    fn width_mask_extremes() {
        assert_eq!(width_mask(1), 1);
        assert_eq!(width_mask(16), 0xffff);
        assert_eq!(width_mask(128), u128::MAX);
    }
}
