//! Walks one expression through the whole pipeline and prints each stage.
//!
//!     cargo run --example pipeline

use flowexpr::{parse, to_matches, ExprError, Level, SymTab};

fn main() -> Result<(), ExprError> {
    let mut symtab = SymTab::new();
    symtab.add_field("eth.type", 16, Level::Nominal, None, true)?;
    symtab.add_predicate("ip4", "eth.type == 0x800")?;
    symtab.add_field("ip.proto", 8, Level::Nominal, Some("ip4"), true)?;
    symtab.add_predicate("tcp", "ip.proto == 6")?;
    symtab.add_field("tcp.src", 16, Level::Ordinal, Some("tcp"), false)?;
    symtab.add_field("tcp.dst", 16, Level::Ordinal, Some("tcp"), false)?;
    symtab.add_string("inport", None)?;

    let input = r#"inport == "lp1" && tcp.src == {80, 443} && tcp.dst == {25, 110}"#;
    println!("input:      {input}");

    let parsed = parse(input, &symtab)?;
    println!("parsed:     {parsed}");

    let annotated = parsed.annotate(&symtab)?;
    println!("annotated:  {annotated}");

    let simplified = annotated.simplify();
    println!("simplified: {simplified}");

    let normalized = simplified.normalize();
    println!("normalized: {normalized}");

    let ports = |name: &str| -> Option<u32> { (name == "lp1").then_some(7) };
    let matches = to_matches(&normalized, &symtab, &ports)?;
    println!("matches ({} flows, {} conjunctions):", matches.len(), matches.n_conjs());
    print!("{matches}");
    Ok(())
}
