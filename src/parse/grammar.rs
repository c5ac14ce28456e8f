use winnow::combinator::{alt, cut_err, delimited, opt, preceded, repeat, separated, terminated};
use winnow::error::{ModalResult, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::{any, take_while};

use crate::RelOp;

/// Purely syntactic expression tree, before symbol resolution and
/// desugaring. `lower` turns this into an [`Expr`](crate::Expr).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Ast {
    /// A bare constant; only `0` and `1` are meaningful (Boolean literals).
    Literal(Constant),
    /// A bare identifier, e.g. a predicate name used as a test.
    Test(String),
    /// `field RELOP constant` or `field RELOP { constant, ... }`.
    Cmp {
        field: String,
        relop: RelOp,
        set: Vec<Constant>,
    },
    /// Constant-first form: `lo LO_OP field` with an optional trailing
    /// `HI_OP hi`, covering both reversed comparisons and ranges like
    /// `a < x < b`.
    Rev {
        lo: Constant,
        lo_op: RelOp,
        field: String,
        hi: Option<(RelOp, Constant)>,
    },
    Not(Box<Ast>),
    And(Vec<Ast>),
    Or(Vec<Ast>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Constant {
    Integer { value: u128, mask: Option<u128> },
    String(String),
}

// -- Whitespace -------------------------------------------------------------

fn ws(input: &mut &str) -> ModalResult<()> {
    take_while(0.., |c: char| c.is_ascii_whitespace())
        .void()
        .parse_next(input)
}

// -- Identifiers ------------------------------------------------------------

fn ident<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    (
        take_while(1.., |c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| {
            c.is_ascii_alphanumeric() || c == '_' || c == '.'
        }),
    )
        .take()
        .parse_next(input)
}

// -- Constants --------------------------------------------------------------

fn string_literal(input: &mut &str) -> ModalResult<String> {
    '"'.parse_next(input)?;
    let mut s = String::new();
    loop {
        let ch = any.parse_next(input)?;
        match ch {
            '"' => return Ok(s),
            '\\' => {
                let esc = any.parse_next(input)?;
                match esc {
                    '"' => s.push('"'),
                    '\\' => s.push('\\'),
                    'n' => s.push('\n'),
                    't' => s.push('\t'),
                    other => {
                        s.push('\\');
                        s.push(other);
                    }
                }
            }
            c => s.push(c),
        }
    }
}

fn integer(input: &mut &str) -> ModalResult<u128> {
    alt((
        preceded(
            "0x",
            cut_err(take_while(1.., |c: char| c.is_ascii_hexdigit())),
        )
        .try_map(|s: &str| u128::from_str_radix(s, 16)),
        take_while(1.., |c: char| c.is_ascii_digit()).try_map(|s: &str| s.parse::<u128>()),
    ))
    .parse_next(input)
}

fn constant(input: &mut &str) -> ModalResult<Constant> {
    ws.parse_next(input)?;
    alt((
        string_literal.map(Constant::String),
        (integer, opt(preceded('/', cut_err(integer))))
            .map(|(value, mask)| Constant::Integer { value, mask }),
    ))
    .context(StrContext::Expected(StrContextValue::Description(
        "constant",
    )))
    .parse_next(input)
}

fn constant_set(input: &mut &str) -> ModalResult<Vec<Constant>> {
    alt((
        delimited(
            '{',
            cut_err(separated(1.., constant, (ws, ','))),
            (ws, cut_err('}')),
        ),
        constant.map(|c| vec![c]),
    ))
    .parse_next(input)
}

// -- Comparison operators ---------------------------------------------------

fn relop(input: &mut &str) -> ModalResult<RelOp> {
    alt((
        ">=".value(RelOp::Ge),
        ">".value(RelOp::Gt),
        "<=".value(RelOp::Le),
        "<".value(RelOp::Lt),
        "==".value(RelOp::Eq),
        "!=".value(RelOp::Ne),
    ))
    .parse_next(input)
}

// -- Expressions (precedence: OR < AND < NOT < comparison) ------------------

fn primary(input: &mut &str) -> ModalResult<Ast> {
    ws.parse_next(input)?;
    alt((
        delimited('(', expr, (ws, cut_err(')'))),
        constant_leading,
        ident_leading,
    ))
    .context(StrContext::Expected(StrContextValue::Description(
        "expression",
    )))
    .parse_next(input)
}

fn ident_leading(input: &mut &str) -> ModalResult<Ast> {
    let name = ident.parse_next(input)?;
    let checkpoint = input.checkpoint();
    ws.parse_next(input)?;
    if let Ok(op) = relop.parse_next(input) {
        let set = cut_err(preceded(ws, constant_set)).parse_next(input)?;
        Ok(Ast::Cmp {
            field: name.to_owned(),
            relop: op,
            set,
        })
    } else {
        input.reset(&checkpoint);
        Ok(Ast::Test(name.to_owned()))
    }
}

fn constant_leading(input: &mut &str) -> ModalResult<Ast> {
    let lo = constant.parse_next(input)?;
    let checkpoint = input.checkpoint();
    ws.parse_next(input)?;
    if let Ok(lo_op) = relop.parse_next(input) {
        let field = cut_err(preceded(ws, ident)).parse_next(input)?;
        let hi_checkpoint = input.checkpoint();
        ws.parse_next(input)?;
        let hi = if let Ok(hi_op) = relop.parse_next(input) {
            let hi = cut_err(constant).parse_next(input)?;
            Some((hi_op, hi))
        } else {
            input.reset(&hi_checkpoint);
            None
        };
        Ok(Ast::Rev {
            lo,
            lo_op,
            field: field.to_owned(),
            hi,
        })
    } else {
        input.reset(&checkpoint);
        Ok(Ast::Literal(lo))
    }
}

fn unary(input: &mut &str) -> ModalResult<Ast> {
    ws.parse_next(input)?;
    // "!" but not "!="
    let negate = opt(terminated('!', winnow::combinator::not('='))).parse_next(input)?;
    if negate.is_some() {
        let inner = cut_err(unary).parse_next(input)?;
        Ok(Ast::Not(Box::new(inner)))
    } else {
        primary(input)
    }
}

fn and_expr(input: &mut &str) -> ModalResult<Ast> {
    let first = unary(input)?;
    let rest: Vec<Ast> = repeat(0.., preceded((ws, "&&"), cut_err(unary))).parse_next(input)?;
    if rest.is_empty() {
        Ok(first)
    } else {
        let mut children = vec![first];
        children.extend(rest);
        Ok(Ast::And(children))
    }
}

fn or_expr(input: &mut &str) -> ModalResult<Ast> {
    let first = and_expr(input)?;
    let rest: Vec<Ast> = repeat(0.., preceded((ws, "||"), cut_err(and_expr))).parse_next(input)?;
    if rest.is_empty() {
        Ok(first)
    } else {
        let mut children = vec![first];
        children.extend(rest);
        Ok(Ast::Or(children))
    }
}

fn expr(input: &mut &str) -> ModalResult<Ast> {
    or_expr(input)
}

/// Top-level parser: one expression, surrounded by optional whitespace.
pub(crate) fn expr_line(input: &mut &str) -> ModalResult<Ast> {
    terminated(expr, ws).parse_next(input)
}

/// Collect every identifier the expression refers to, without resolving
/// anything. Used to derive predicate levels lazily.
pub(crate) fn referenced_idents(ast: &Ast, out: &mut Vec<String>) {
    match ast {
        Ast::Literal(_) => {}
        Ast::Test(name) => out.push(name.clone()),
        Ast::Cmp { field, .. } | Ast::Rev { field, .. } => out.push(field.clone()),
        Ast::Not(inner) => referenced_idents(inner, out),
        Ast::And(children) | Ast::Or(children) => {
            for child in children {
                referenced_idents(child, out);
            }
        }
    }
}
