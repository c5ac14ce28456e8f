//! Compilation of normalized expressions into flow matches.
//!
//! Each disjunct of a normalized expression becomes one or more value/mask
//! matches. A disjunct whose AND contains two or more OR dimensions cannot
//! be expressed as plain matches without a crossproduct, so it is emitted
//! as a conjunctive match instead: every alternative of every dimension
//! gets its own match tagged with a shared conjunction id and a 1-based
//! clause number, and a flow matches the conjunction when at least one
//! alternative of every clause matched. Entries from different disjuncts
//! that land on the same match merge, keeping both their standalone
//! meaning and their clause tags.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;

use crate::{Cmp, Expr, ExprError, Operand, SymTab, SymbolKind};

/// Maps logical port names to the integer ids used in matches.
pub trait PortResolver {
    fn resolve(&self, port: &str) -> Option<u32>;
}

impl<F> PortResolver for F
where
    F: Fn(&str) -> Option<u32>,
{
    fn resolve(&self, port: &str) -> Option<u32> {
        self(port)
    }
}

/// A single field's value under a mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldMatch {
    pub value: u128,
    pub mask: u128,
}

/// A flow match: per-field values and masks, in field name order.
/// Subfield comparisons are folded into their parent field.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Match {
    fields: BTreeMap<String, FieldMatch>,
}

impl Match {
    #[must_use]
    pub fn new() -> Match {
        Match::default()
    }

    /// Constrain `field` to `value` under `mask`, intersecting with any
    /// constraint already present. Returns false when the intersection is
    /// unsatisfiable, leaving the match in an unspecified state.
    pub fn set(&mut self, field: &str, value: u128, mask: u128) -> bool {
        match self.fields.entry(field.to_owned()) {
            Entry::Vacant(e) => {
                e.insert(FieldMatch { value, mask });
                true
            }
            Entry::Occupied(mut e) => {
                let fm = e.get_mut();
                if (fm.value ^ value) & fm.mask & mask != 0 {
                    return false;
                }
                fm.value |= value;
                fm.mask |= mask;
                true
            }
        }
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<FieldMatch> {
        self.fields.get(field).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, FieldMatch)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), *v))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fields.is_empty() {
            return write!(f, "(any)");
        }
        for (i, (name, fm)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{name}=0x{:x}/0x{:x}", fm.value, fm.mask)?;
        }
        Ok(())
    }
}

/// One clause membership of a conjunctive match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Conjunction {
    pub id: u32,
    pub clause: u32,
    pub n_clauses: u32,
}

/// How one match participates in the compiled set: on its own, as clauses
/// of one or more conjunctions, or both when disjuncts overlap. A plain
/// disjunct whose match collides with a conjunction clause keeps its
/// standalone meaning alongside the clause tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchInfo {
    standalone: bool,
    conjunctions: Vec<Conjunction>,
}

impl MatchInfo {
    /// Whether a packet hitting this match satisfies the expression
    /// outright, with no conjunction bookkeeping.
    #[must_use]
    pub fn is_standalone(&self) -> bool {
        self.standalone
    }

    /// The conjunction clauses this match contributes to.
    #[must_use]
    pub fn conjunctions(&self) -> &[Conjunction] {
        &self.conjunctions
    }
}

/// The compiled form of an expression: deduplicated matches, each with the
/// conjunctions it participates in (none for a plain match).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MatchSet {
    matches: BTreeMap<Match, MatchInfo>,
    n_conjs: u32,
}

impl MatchSet {
    /// Number of distinct matches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Number of conjunction ids allocated. Ids run from 1 to this count.
    #[must_use]
    pub fn n_conjs(&self) -> u32 {
        self.n_conjs
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Match, &MatchInfo)> {
        self.matches.iter()
    }

    fn add_plain(&mut self, m: Match) {
        self.matches.entry(m).or_default().standalone = true;
    }

    fn add_conj(&mut self, m: Match, conj: Conjunction) {
        self.matches.entry(m).or_default().conjunctions.push(conj);
    }

    fn next_conj_id(&mut self) -> u32 {
        self.n_conjs += 1;
        self.n_conjs
    }
}

impl fmt::Display for MatchSet {
    /// One line per installed flow. A match that is both standalone and part
    /// of a conjunction prints twice, once bare and once with its tags.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (m, info) in self.matches.iter() {
            if info.standalone {
                writeln!(f, "{m}")?;
            }
            if !info.conjunctions.is_empty() {
                write!(f, "{m}")?;
                for c in &info.conjunctions {
                    write!(f, ",conjunction({},{}/{})", c.id, c.clause, c.n_clauses)?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

/// Compile a normalized expression into a [`MatchSet`].
///
/// Plain comparisons of a disjunct form a base match. OR dimensions whose
/// symbols are marked must-crossproduct multiply into the base. Of the
/// dimensions left over, zero yields the bases as-is, one yields one match
/// per alternative, and two or more yield a conjunctive match with a fresh
/// id. Unsatisfiable combinations are dropped rather than reported.
///
/// # Errors
///
/// Fails with [`ExprError::UnresolvedPort`] when a string comparison names
/// a port the resolver does not know, and with a syntax error when the
/// expression is not in normal form.
pub fn to_matches<R>(expr: &Expr, symtab: &SymTab, resolver: &R) -> Result<MatchSet, ExprError>
where
    R: PortResolver + ?Sized,
{
    let mut out = MatchSet::default();
    match expr {
        Expr::Boolean(false) => {}
        Expr::Boolean(true) => out.add_plain(Match::new()),
        Expr::Or(children) => {
            for child in children {
                compile_disjunct(child, symtab, resolver, &mut out)?;
            }
        }
        _ => compile_disjunct(expr, symtab, resolver, &mut out)?,
    }
    Ok(out)
}

fn compile_disjunct<R>(
    expr: &Expr,
    symtab: &SymTab,
    resolver: &R,
    out: &mut MatchSet,
) -> Result<(), ExprError>
where
    R: PortResolver + ?Sized,
{
    let mut plain: Vec<&Cmp> = Vec::new();
    let mut dims: Vec<Vec<&Cmp>> = Vec::new();

    let children: &[Expr] = match expr {
        Expr::Cmp(_) => std::slice::from_ref(expr),
        Expr::And(children) => children,
        _ => return Err(not_normalized()),
    };
    for child in children {
        match child {
            Expr::Cmp(cmp) => plain.push(cmp),
            Expr::Or(alts) => {
                let mut dim = Vec::with_capacity(alts.len());
                for alt in alts {
                    match alt {
                        Expr::Cmp(cmp) => dim.push(cmp),
                        _ => return Err(not_normalized()),
                    }
                }
                dims.push(dim);
            }
            _ => return Err(not_normalized()),
        }
    }

    let mut base = Match::new();
    for cmp in plain {
        if !apply_cmp(&mut base, cmp, symtab, resolver)? {
            return Ok(());
        }
    }

    // Dimensions touching a must-crossproduct symbol cannot go into a
    // conjunctive clause, so they multiply into the base matches instead.
    let (xp_dims, conj_dims): (Vec<_>, Vec<_>) = dims.into_iter().partition(|dim| {
        dim.iter().any(|cmp| {
            symtab
                .get(&cmp.symbol)
                .is_some_and(|sym| sym.must_crossproduct)
        })
    });

    let mut bases = vec![base];
    for dim in xp_dims {
        let mut next = Vec::with_capacity(bases.len() * dim.len());
        for b in &bases {
            for cmp in &dim {
                let mut m = b.clone();
                if apply_cmp(&mut m, cmp, symtab, resolver)? {
                    next.push(m);
                }
            }
        }
        bases = next;
    }
    if bases.is_empty() {
        return Ok(());
    }

    match conj_dims.len() {
        0 => {
            for b in bases {
                out.add_plain(b);
            }
        }
        1 => {
            for cmp in &conj_dims[0] {
                for b in &bases {
                    let mut m = b.clone();
                    if apply_cmp(&mut m, cmp, symtab, resolver)? {
                        out.add_plain(m);
                    }
                }
            }
        }
        n => {
            // Build every clause's flows before emitting anything: a clause
            // whose alternatives all contradict the base makes the whole
            // disjunct unsatisfiable, and a partial conjunction could never
            // fire.
            let mut clauses: Vec<Vec<Match>> = Vec::with_capacity(n);
            for dim in &conj_dims {
                let mut flows = Vec::new();
                for cmp in dim {
                    for b in &bases {
                        let mut m = b.clone();
                        if apply_cmp(&mut m, cmp, symtab, resolver)? {
                            flows.push(m);
                        }
                    }
                }
                if flows.is_empty() {
                    return Ok(());
                }
                clauses.push(flows);
            }
            let id = out.next_conj_id();
            let n_clauses = n as u32;
            for (k, flows) in clauses.into_iter().enumerate() {
                let conj = Conjunction {
                    id,
                    clause: k as u32 + 1,
                    n_clauses,
                };
                for m in flows {
                    out.add_conj(m, conj);
                }
            }
        }
    }
    Ok(())
}

fn not_normalized() -> ExprError {
    ExprError::syntax("expression must be normalized before match generation")
}

/// Apply one equality comparison to a match, shifting subfields into their
/// parent field and lowering string comparisons to the resolved port id.
/// Returns false when the comparison contradicts the match so far.
fn apply_cmp<R>(
    m: &mut Match,
    cmp: &Cmp,
    symtab: &SymTab,
    resolver: &R,
) -> Result<bool, ExprError>
where
    R: PortResolver + ?Sized,
{
    match &cmp.operand {
        Operand::String(port) => {
            let id = resolver
                .resolve(port)
                .ok_or_else(|| ExprError::UnresolvedPort { port: port.clone() })?;
            Ok(m.set(&cmp.symbol, u128::from(id), u128::from(u32::MAX)))
        }
        Operand::Integer { value, mask, .. } => {
            let (field, ofs) = resolve_target(symtab, &cmp.symbol)?;
            Ok(m.set(&field, value << ofs, mask << ofs))
        }
    }
}

/// Walk subfield parents up to a concrete field, accumulating the bit
/// offset at which the symbol's bits live within it.
fn resolve_target(symtab: &SymTab, name: &str) -> Result<(String, u32), ExprError> {
    let mut name = name.to_owned();
    let mut total_ofs = 0;
    loop {
        let sym = symtab.get(&name).ok_or_else(|| ExprError::undefined(&name))?;
        match &sym.kind {
            SymbolKind::Subfield { parent, ofs, .. } => {
                total_ofs += ofs;
                name = parent.clone();
            }
            _ => return Ok((sym.name.clone(), total_ofs)),
        }
    }
}
