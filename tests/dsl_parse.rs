//! Surface-syntax coverage: precedence, literal forms, desugaring, and the
//! error taxonomy, all through the public API.

use flowexpr::{parse, ExprError, Level, SymTab};

fn symtab() -> SymTab {
    let mut symtab = SymTab::new();
    symtab
        .add_field("eth.type", 16, Level::Nominal, None, true)
        .unwrap();
    symtab
        .add_field("ip.ttl", 8, Level::Ordinal, None, false)
        .unwrap();
    symtab
        .add_field("vlan.tci", 16, Level::Ordinal, None, false)
        .unwrap();
    symtab
        .add_subfield("vlan.vid", "vlan.tci", 0, 12, None)
        .unwrap();
    symtab.add_string("inport", None).unwrap();
    symtab.add_predicate("ip4", "eth.type == 0x800").unwrap();
    symtab
}

fn formatted(input: &str) -> String {
    parse(input, &symtab()).unwrap().to_string()
}

#[test]
fn and_binds_tighter_than_or() {
    assert_eq!(
        formatted("ip.ttl == 1 || ip.ttl == 2 && vlan.vid == 3"),
        "ip.ttl == 1 || (ip.ttl == 2 && vlan.vid == 3)"
    );
}

#[test]
fn parentheses_override_precedence() {
    assert_eq!(
        formatted("(ip.ttl == 1 || ip.ttl == 2) && vlan.vid == 3"),
        "(ip.ttl == 1 || ip.ttl == 2) && vlan.vid == 3"
    );
}

#[test]
fn hex_and_decimal_literals_are_equivalent() {
    let symtab = symtab();
    assert_eq!(
        parse("vlan.tci == 0x1000", &symtab).unwrap(),
        parse("vlan.tci == 4096", &symtab).unwrap()
    );
}

#[test]
fn whitespace_is_insignificant() {
    let symtab = symtab();
    assert_eq!(
        parse("ip.ttl==1&&vlan.vid==3", &symtab).unwrap(),
        parse("  ip.ttl == 1  &&  vlan.vid == 3  ", &symtab).unwrap()
    );
}

#[test]
fn set_membership_desugars_to_disjunction() {
    assert_eq!(
        formatted("ip.ttl == {1, 2, 3}"),
        "ip.ttl == 1 || ip.ttl == 2 || ip.ttl == 3"
    );
}

#[test]
fn excluded_set_desugars_to_conjunction() {
    assert_eq!(
        formatted("ip.ttl != {1, 2}"),
        "ip.ttl != 1 && ip.ttl != 2"
    );
}

#[test]
fn chained_range_desugars_to_conjunction() {
    assert_eq!(
        formatted("1 < ip.ttl < 10"),
        "ip.ttl > 1 && ip.ttl < 10"
    );
}

#[test]
fn reversed_comparison_flips_onto_symbol() {
    assert_eq!(formatted("64 >= ip.ttl"), "ip.ttl <= 64");
}

#[test]
fn negation_is_pushed_down_and_eliminated() {
    assert_eq!(
        formatted("!(ip.ttl == 1 || vlan.vid == 3)"),
        "ip.ttl != 1 && vlan.vid != 3"
    );
}

#[test]
fn bare_predicate_is_a_test_for_one() {
    assert_eq!(formatted("ip4"), "ip4 == 1");
}

#[test]
fn string_literals_support_escapes() {
    assert_eq!(
        formatted(r#"inport == "a\"b""#),
        r#"inport == "a\"b""#
    );
}

#[test]
fn garbage_reports_syntax_error() {
    for input in ["ip.ttl ==", "&& ip.ttl == 1", "(ip.ttl == 1", "ip.ttl == 1 2"] {
        let err = parse(input, &symtab()).unwrap_err();
        assert!(
            matches!(err, ExprError::Syntax { .. }),
            "expected syntax error for {input:?}, got {err:?}"
        );
    }
}

#[test]
fn unknown_field_reports_undefined_symbol() {
    let err = parse("nosuch.field == 1", &symtab()).unwrap_err();
    assert_eq!(err.to_string(), "'nosuch.field' is not a defined field, subfield, or predicate");
}

#[test]
fn oversized_constant_reports_width_mismatch() {
    let err = parse("ip.ttl == 256", &symtab()).unwrap_err();
    assert!(matches!(err, ExprError::WidthMismatch { .. }));
}

#[test]
fn relational_on_nominal_reports_level_error() {
    let err = parse("eth.type > 10", &symtab()).unwrap_err();
    assert!(matches!(err, ExprError::LevelOfMeasurement { .. }));
}

#[test]
fn inequality_on_string_reports_level_error() {
    let err = parse(r#"inport != "lp1""#, &symtab()).unwrap_err();
    assert!(matches!(err, ExprError::LevelOfMeasurement { .. }));
}

#[test]
fn zero_mask_reports_lexical_error() {
    let err = parse("vlan.tci == 1/0", &symtab()).unwrap_err();
    assert!(matches!(err, ExprError::Lexical { .. }));
}

#[test]
fn duplicate_symbol_rejected_at_registration() {
    let mut symtab = symtab();
    let err = symtab
        .add_field("ip.ttl", 8, Level::Ordinal, None, false)
        .unwrap_err();
    assert_eq!(
        err,
        ExprError::DuplicateSymbol {
            name: "ip.ttl".into()
        }
    );
}
