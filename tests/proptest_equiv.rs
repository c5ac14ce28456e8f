
use std::collections::{HashMap, HashSet};

use flowexpr::{parse, to_matches, MatchSet};
use proptest::prelude::*;
use strategies::{
    arb_plain_expr, arb_plain_valuation, arb_protocol_expr, arb_protocol_valuation, plain_schema,
    protocol_schema,
};

fn no_ports(_: &str) -> Option<u32> {
    None
}

/// Whether a packet with the given concrete field values hits the compiled
/// match set: directly through a standalone match, or by satisfying every
/// clause of some conjunction.
fn matchset_hits(set: &MatchSet, fields: &[(&str, u128)]) -> bool {
    let values: HashMap<&str, u128> = fields.iter().copied().collect();
    let mut clause_hits: HashSet<(u32, u32)> = HashSet::new();
    let mut conj_sizes: HashMap<u32, u32> = HashMap::new();
    for (m, info) in set.iter() {
        let hit = m
            .iter()
            .all(|(f, fm)| values.get(f).copied().unwrap_or(0) & fm.mask == fm.value);
        if !hit {
            continue;
        }
        if info.is_standalone() {
            return true;
        }
        for c in info.conjunctions() {
            clause_hits.insert((c.id, c.clause));
            conj_sizes.insert(c.id, c.n_clauses);
        }
    }
    conj_sizes
        .iter()
        .any(|(id, n)| (1..=*n).all(|k| clause_hits.contains(&(*id, k))))
}

// ---------------------------------------------------------------------------
// Every stage preserves the tree-shape invariants and its own postcondition.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn stages_preserve_invariants(input in arb_plain_expr()) {
        let symtab = plain_schema();
        let parsed = parse(&input, &symtab).unwrap();
        prop_assert!(parsed.honors_invariants(), "parse broke invariants: {input}");

        let simplified = parsed.simplify();
        prop_assert!(simplified.honors_invariants());
        prop_assert!(simplified.is_simplified(), "not simplified: {input}");

        let normalized = simplified.normalize();
        prop_assert!(normalized.honors_invariants());
        prop_assert!(normalized.is_normalized(), "not normalized: {input}");
    }

    #[test]
    fn simplify_and_normalize_are_idempotent(input in arb_plain_expr()) {
        let symtab = plain_schema();
        let simplified = parse(&input, &symtab).unwrap().simplify();
        prop_assert_eq!(simplified.clone().simplify(), simplified.clone());
        let normalized = simplified.normalize();
        prop_assert_eq!(normalized.clone().normalize(), normalized);
    }
}

// ---------------------------------------------------------------------------
// Rewrites never change which packets an expression accepts.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn rewrites_preserve_acceptance(
        input in arb_plain_expr(),
        packet in arb_plain_valuation(),
    ) {
        let symtab = plain_schema();
        let (valuation, _) = packet;
        let parsed = parse(&input, &symtab).unwrap();
        let expected = parsed.evaluate(&valuation, &symtab);

        let simplified = parsed.clone().simplify();
        prop_assert_eq!(
            simplified.evaluate(&valuation, &symtab), expected,
            "simplify changed acceptance of {}", input
        );

        let normalized = simplified.normalize();
        prop_assert_eq!(
            normalized.evaluate(&valuation, &symtab), expected,
            "normalize changed acceptance of {}", input
        );
    }

    #[test]
    fn formatting_round_trips(input in arb_plain_expr(), packet in arb_plain_valuation()) {
        let symtab = plain_schema();
        let (valuation, _) = packet;
        let parsed = parse(&input, &symtab).unwrap();
        let reparsed = parse(&parsed.to_string(), &symtab).unwrap();
        prop_assert_eq!(
            reparsed.evaluate(&valuation, &symtab),
            parsed.evaluate(&valuation, &symtab),
            "round-trip changed acceptance of {}", parsed
        );
    }

    #[test]
    fn annotation_rewrites_preserve_acceptance(
        input in arb_protocol_expr(),
        valuation in arb_protocol_valuation(),
    ) {
        let symtab = protocol_schema();
        let annotated = parse(&input, &symtab).unwrap().annotate(&symtab).unwrap();
        let expected = annotated.evaluate(&valuation, &symtab);
        let rewritten = annotated.clone().simplify().normalize();
        prop_assert_eq!(
            rewritten.evaluate(&valuation, &symtab), expected,
            "pipeline changed acceptance of {}", input
        );
    }
}

// ---------------------------------------------------------------------------
// Compiled matches agree exactly with direct evaluation: a packet hits the
// match set iff the expression accepts it, conjunctions included.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn compiled_matches_agree_with_evaluation(
        input in arb_plain_expr(),
        packet in arb_plain_valuation(),
    ) {
        let symtab = plain_schema();
        let (valuation, fields) = packet;
        let parsed = parse(&input, &symtab).unwrap();
        let expected = parsed.evaluate(&valuation, &symtab);
        let normalized = parsed.simplify().normalize();
        let set = to_matches(&normalized, &symtab, &no_ports).unwrap();

        let hit = matchset_hits(&set, &fields);
        prop_assert_eq!(hit, expected, "match set disagrees on {}", input);
    }
}
