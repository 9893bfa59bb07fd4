//! Compile-then-run checks over the public API.

use lumen_compiler::{compile, Compiler, CompilerOptions, MAX_NESTING, NESTING_TOO_DEEP, TOO_MANY_CONSTANTS};
use lumen_core::runtime::eval::{eval_chunk, EvalOptions};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn value_of(src: &str) -> f64 {
    let chunk = compile(src).unwrap_or_else(|e| panic!("{src}: {e}"));
    let out = eval_chunk(&chunk, &EvalOptions::default()).unwrap();
    out.value.expect("a value on the stack").as_f64()
}

#[test]
fn arithmetic_follows_usual_precedence() {
    assert_eq!(value_of("1 + 2 * 3"), 7.0);
    assert_eq!(value_of("(1 + 2) * 3"), 9.0);
    assert_eq!(value_of("8 / 2 / 2"), 2.0);
    assert_eq!(value_of("8 / 4 / 2"), 1.0);
    assert_eq!(value_of("-2 + 3"), 1.0);
    assert_eq!(value_of("10 - 4 - 3"), 3.0);
    assert_eq!(value_of("-2 - -3"), 1.0);
    assert_eq!(value_of("2 * -3"), -6.0);
    assert_eq!(value_of("1.5 * 2"), 3.0);
    assert_eq!(value_of("-(1 + 2) * 4"), -12.0);
    assert_eq!(value_of("1 + 2 * 3 - 4 / -5"), 7.8);
}

#[test]
fn division_by_zero_is_ieee() {
    assert_eq!(value_of("1 / 0"), f64::INFINITY);
    assert!(value_of("0 / 0").is_nan());
}

#[test]
fn distinct_constants_overflow_at_257() {
    let src = (0..=256).map(|n| n.to_string()).collect::<Vec<_>>().join(" + ");
    let c = Compiler::default().compile(&src);
    assert!(c.had_error());
    assert_eq!(c.diagnostics.len(), 1);
    assert_eq!(c.diagnostics[0].to_string(), format!("[line 1] Error at '256': {TOO_MANY_CONSTANTS}"));
    assert_eq!(c.chunk.constants().len(), 256);
}

#[test]
fn repeated_literals_share_a_slot_when_asked() {
    let src = vec!["1"; 300].join(" + ");
    let err = compile(&src).unwrap_err();
    assert_eq!(err.to_string(), format!("[line 1] Error at '1': {TOO_MANY_CONSTANTS}"));

    let shared = Compiler::new(CompilerOptions { dedupe_constants: true, ..CompilerOptions::default() });
    let chunk = shared.compile(&src).into_result().unwrap();
    assert_eq!(chunk.constants().len(), 1);
    let out = eval_chunk(&chunk, &EvalOptions::default()).unwrap();
    assert_eq!(out.value.map(|v| v.as_f64()), Some(300.0));
}

#[test]
fn deep_nesting_is_a_diagnostic() {
    let n = 100_000;
    for src in [format!("{}1{}", "(".repeat(n), ")".repeat(n)), format!("{}1", "-".repeat(n))] {
        let c = Compiler::default().compile(&src);
        assert_eq!(c.diagnostics.len(), 1);
        assert_eq!(c.diagnostics[0].message, NESTING_TOO_DEEP);
    }

    let depth = usize::try_from(MAX_NESTING).unwrap() - 1;
    assert_eq!(value_of(&format!("{}7{}", "(".repeat(depth), ")".repeat(depth))), 7.0);
}

#[test]
fn unclosed_group_reports_once() {
    let err = compile("(1 + 2").unwrap_err();
    assert_eq!(err.diagnostics.len(), 1);
    assert_eq!(err.to_string(), "[line 1] Error at end: Expect ')' after expression.");
}

#[test]
fn compilation_is_deterministic() {
    let src = "(3 - 1) * -4 / 2\n+ 7";
    assert_eq!(compile(src), compile(src));
}

/* ────────── Property checks ────────── */

#[derive(Debug, Clone)]
enum Expr {
    Num(u32),
    Neg(Box<Expr>),
    Bin(Box<Expr>, char, Box<Expr>),
}

impl Expr {
    fn precedence(&self) -> u8 {
        match self {
            Self::Num(_) => 3,
            Self::Neg(_) => 2,
            Self::Bin(_, '*' | '/', _) => 1,
            Self::Bin(..) => 0,
        }
    }

    fn eval(&self) -> f64 {
        match self {
            Self::Num(n) => f64::from(*n),
            Self::Neg(e) => -e.eval(),
            Self::Bin(l, op, r) => {
                let (a, b) = (l.eval(), r.eval());
                match op {
                    '+' => a + b,
                    '-' => a - b,
                    '*' => a * b,
                    _ => a / b,
                }
            }
        }
    }

    /// Source text with the fewest parentheses that keep the tree shape.
    fn render(&self) -> String {
        match self {
            Self::Num(n) => n.to_string(),
            Self::Neg(e) if matches!(**e, Self::Bin(..)) => format!("-({})", e.render()),
            Self::Neg(e) => format!("-{}", e.render()),
            Self::Bin(l, op, r) => {
                let p = self.precedence();
                let left = if l.precedence() < p { format!("({})", l.render()) } else { l.render() };
                let right = if r.precedence() <= p { format!("({})", r.render()) } else { r.render() };
                format!("{left} {op} {right}")
            }
        }
    }
}

fn expr() -> impl Strategy<Value = Expr> {
    let leaf = (0u32..1000).prop_map(Expr::Num);
    leaf.prop_recursive(5, 48, 2, |inner| {
        prop_oneof![
            inner.clone().prop_map(|e| Expr::Neg(Box::new(e))),
            (inner.clone(), prop::sample::select(vec!['+', '-', '*', '/']), inner)
                .prop_map(|(l, op, r)| Expr::Bin(Box::new(l), op, Box::new(r))),
        ]
    })
}

proptest! {
    #[test]
    fn compiled_code_agrees_with_direct_evaluation(e in expr()) {
        let src = e.render();
        let got = value_of(&src);
        let want = e.eval();
        prop_assert!(got == want || (got.is_nan() && want.is_nan()), "{src}: {got} != {want}");
    }

    #[test]
    fn every_byte_has_a_line(e in expr()) {
        let chunk = compile(&e.render()).unwrap();
        prop_assert_eq!(chunk.code().len(), chunk.lines().len());
    }

    #[test]
    fn garbage_input_never_panics(src in "[0-9()+*/ .\\-a-z@\n]{0,40}") {
        let c = Compiler::default().compile(&src);
        prop_assert!(c.diagnostics.len() <= 1);
        prop_assert_eq!(c.chunk.code().len(), c.chunk.lines().len());
    }
}
