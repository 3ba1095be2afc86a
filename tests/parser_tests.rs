// Integration tests for the lexer and parser

use kaleidoscope::parser::ast::{Expr, Root};
use kaleidoscope::parser::lexer::{Lexer, TokenKind};
use kaleidoscope::parser::operators::{OperatorClass, OperatorTable};
use kaleidoscope::parser::parse::{DiagnosticKind, Parser};
use kaleidoscope::parser::{parse_source, parse_units};
use kaleidoscope::pipeline::input::InputUnit;

#[test]
fn test_mandelbrot_demo() {
    let unit = InputUnit::open("demos/mandel.k").expect("Failed to open demo file");
    let (roots, diagnostics) = parse_units([unit]);

    assert!(diagnostics.is_empty(), "Unexpected diagnostics: {:?}", diagnostics);
    assert_eq!(roots.len(), 15);

    let names: Vec<_> = roots
        .iter()
        .filter(|r| !r.is_anonymous())
        .map(|r| r.prototype().name.as_str())
        .collect();
    assert_eq!(
        names,
        vec![
            "putchard",
            "unary!",
            "unary-",
            "binary>",
            "binary|",
            "binary&",
            "binary=",
            "binary:",
            "printdensity",
            "mandelconverger",
            "mandelconverge",
            "mandelhelp",
            "mandel",
        ]
    );

    assert!(matches!(roots[0], Root::Extern(_)));
    assert_eq!(
        roots[13].to_string(),
        "(call mandel (- 2.3) (- 1.3) 0.05 0.07)"
    );
    assert_eq!(roots[14].to_string(), "(var ((a 1) (b 16)) (: a b))");
}

#[test]
fn test_redeclared_equals_binds_below_relationals() {
    let (roots, _) = parse_units([InputUnit::open("demos/mandel.k").unwrap()]);
    match &roots[6] {
        Root::Function(func) => {
            assert_eq!(func.proto.precedence, 9);
            assert_eq!(func.body.to_string(), "(! (| (< LHS RHS) (> LHS RHS)))");
        }
        other => panic!("Expected function definition, got {:?}", other),
    }
}

#[test]
fn test_sequencing_operator_in_loop_body() {
    let (roots, _) = parse_units([InputUnit::open("demos/mandel.k").unwrap()]);
    let helper = roots
        .iter()
        .find(|r| r.prototype().name == "mandelhelp")
        .expect("mandelhelp not parsed");
    match helper {
        Root::Function(func) => match &func.body {
            Expr::For(outer) => {
                assert_eq!(outer.counter, "y");
                assert!(outer.step.is_some());
                assert!(matches!(&*outer.body, Expr::Binary(b) if b.op == ':'));
            }
            other => panic!("Expected for loop, got {:?}", other),
        },
        _ => panic!("Expected function definition"),
    }
}

#[test]
fn test_canonical_tokens_round_trip() {
    let source = "def binary ^ 60 (a b) a*a; # square\nfor i = 1, i < 10 in 2^i";
    let canonical = |text: &str| {
        Lexer::new(OperatorTable::new())
            .tokenize([InputUnit::from_source("rt", text)])
            .into_iter()
            .filter(|t| {
                !t.kind.is_trivia() && !matches!(t.kind, TokenKind::NewUnit | TokenKind::Eof)
            })
            .map(|t| t.text)
            .collect::<Vec<_>>()
            .join(" ")
    };

    let once = canonical(source);
    assert_eq!(
        once,
        "def binary ^ 60 ( a b ) a * a ; for i = 1 , i < 10 in 2 ^ i"
    );
    assert_eq!(canonical(&once), once);
}

#[test]
fn test_statements_recover_across_units() {
    let (roots, diagnostics) = parse_units([
        InputUnit::from_source("one", "def f(x) (x"),
        InputUnit::from_source("two", "f(2)"),
    ]);

    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].unit, "one");
    assert_eq!(diagnostics[0].message, "expected ')'");
    assert_eq!(
        diagnostics[0].to_string(),
        "one:11: expected ')' (found start of 'two')"
    );
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].to_string(), "(call f 2)");
}

#[test]
fn test_lexical_error_drops_later_units() {
    let (roots, diagnostics) = parse_units([
        InputUnit::from_source("first", "1"),
        InputUnit::from_source("second", "2 ? 3"),
        InputUnit::from_source("third", "4"),
    ]);

    assert_eq!(roots.len(), 2);
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::Lexical);
    assert_eq!(
        diagnostics[0].to_string(),
        "second:2: unrecognized character: U+003F '?'"
    );
}

#[test]
fn test_positions_restart_per_unit() {
    let (_, diagnostics) = parse_units([
        InputUnit::from_source("a", "1 + 2; then"),
        InputUnit::from_source("b", "then"),
    ]);
    let located: Vec<_> = diagnostics
        .iter()
        .map(|d| (d.unit.as_str(), d.pos.offset()))
        .collect();
    assert_eq!(located, vec![("a", 7), ("b", 0)]);
}

#[test]
fn test_parser_over_prebuilt_tokens() {
    let table = OperatorTable::new();
    let tokens = Lexer::new(table.clone())
        .tokenize([InputUnit::from_source("t", "def unary ~ (v) v; ~~1")]);
    assert_eq!(table.classify('~'), OperatorClass::Unary);

    let roots = Parser::new(tokens.into_iter(), table).parse_all();
    assert_eq!(roots.len(), 2);
    assert_eq!(roots[1].to_string(), "(~ (~ 1))");
}

#[test]
fn test_empty_and_comment_only_input() {
    for source in ["", "   ", "# nothing here", "\n\n;\n"] {
        let (roots, diagnostics) = parse_source("blank", source);
        assert!(roots.is_empty(), "{:?} produced roots", source);
        assert!(diagnostics.is_empty(), "{:?} produced diagnostics", source);
    }
}
