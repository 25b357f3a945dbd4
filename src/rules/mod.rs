//! Routing rule expressions.
//!
//! # Data Flow
//! ```text
//! rendered rule text ("42 > 10 && \"push\" == \"push\"")
//!     → lexer.rs (tokens with offsets)
//!     → parser.rs (precedence-climbing AST)
//!     → eval.rs (bottom-up evaluation)
//!     → Evaluation { kind, value }
//! ```
//!
//! # Design Decisions
//! - Two result kinds only: INTEGER and BOOLEAN-TEXT. Comparison results are
//!   the text `"true"`/`"false"` and share a kind with string literals, so a
//!   comparison result can be compared against a string but never against
//!   an integer. Callers parse the text back with [`parse_bool`].
//! - Operand kinds must match exactly; no coercion.
//! - No short-circuiting: both sides of every binary node are evaluated.
//! - `&&` and `||` read text that is not a boolean as false.
//! - Nesting deeper than [`parser::MAX_DEPTH`] is a syntax error.
//! - No variables, loops, floats or calls. Those parse, then fail with
//!   `UnsupportedExpressionForm`.

pub mod eval;
pub mod lexer;
pub mod parser;

use std::fmt;
use thiserror::Error;

/// Kind tag attached to every evaluation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Integer,
    /// Boolean results and string literals.
    BooleanText,
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultKind::Integer => write!(f, "INTEGER"),
            ResultKind::BooleanText => write!(f, "BOOLEAN-TEXT"),
        }
    }
}

/// Result of evaluating an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub kind: ResultKind,
    pub value: String,
}

/// Errors from parsing or evaluating a rule.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("operands must be of same type - left: {left}, right: {right}")]
    TypeMismatch { left: ResultKind, right: ResultKind },

    #[error("unsupported operator '{operator}' for {kind}")]
    UnsupportedOperator { operator: String, kind: ResultKind },

    #[error("unsupported expression form: {0}")]
    UnsupportedExpressionForm(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow")]
    Overflow,

    #[error("'{0}' is not a boolean")]
    NotBoolean(String),

    #[error("expected result of '{expression}' to be {expected} but got {actual}")]
    UnexpectedKind {
        expression: String,
        expected: ResultKind,
        actual: ResultKind,
    },
}

/// Evaluate an expression, returning its value and kind.
pub fn evaluate(expression: &str) -> Result<Evaluation, RuleError> {
    let expr = parser::parse(expression)?;
    let result = eval::evaluate_expr(&expr)?;

    let evaluation = match result {
        eval::Operand::Integer(v) => Evaluation {
            kind: ResultKind::Integer,
            value: v.to_string(),
        },
        eval::Operand::Text(text) => Evaluation {
            kind: ResultKind::BooleanText,
            value: text,
        },
    };

    tracing::debug!(expression, result = %evaluation.value, kind = %evaluation.kind, "Evaluated expression");
    Ok(evaluation)
}

/// Evaluate an expression that must produce a boolean.
pub fn evaluate_boolean(expression: &str) -> Result<bool, RuleError> {
    let evaluation = evaluate(expression)?;
    if evaluation.kind != ResultKind::BooleanText {
        return Err(RuleError::UnexpectedKind {
            expression: expression.to_string(),
            expected: ResultKind::BooleanText,
            actual: evaluation.kind,
        });
    }
    parse_bool(&evaluation.value)
}

/// Evaluate an expression that must produce an integer.
pub fn evaluate_arithmetic(expression: &str) -> Result<i64, RuleError> {
    let evaluation = evaluate(expression)?;
    if evaluation.kind != ResultKind::Integer {
        return Err(RuleError::UnexpectedKind {
            expression: expression.to_string(),
            expected: ResultKind::Integer,
            actual: evaluation.kind,
        });
    }
    evaluation.value.parse().map_err(|_| RuleError::Overflow)
}

/// Parse boolean text. Accepts the same spellings a template is likely to
/// emit: `1 t T TRUE true True` and `0 f F FALSE false False`.
pub fn parse_bool(text: &str) -> Result<bool, RuleError> {
    match text {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        other => Err(RuleError::NotBoolean(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boolean(expr: &str) -> String {
        let result = evaluate(expr).unwrap();
        assert_eq!(result.kind, ResultKind::BooleanText, "{}", expr);
        result.value
    }

    #[test]
    fn test_parentheses() {
        assert_eq!(boolean("(1 < 2 || 2 > 3) && (2 > 1)"), "true");

        let result = evaluate("(1 + (2 * 10)) + 4").unwrap();
        assert_eq!(result, Evaluation { kind: ResultKind::Integer, value: "25".into() });
    }

    #[test]
    fn test_enforces_operands_of_same_type() {
        assert!(matches!(
            evaluate("1 > 2 && 2 + 1"),
            Err(RuleError::TypeMismatch { left: ResultKind::BooleanText, right: ResultKind::Integer })
        ));
        assert!(matches!(evaluate("\"1\" == 1"), Err(RuleError::TypeMismatch { .. })));
    }

    #[test]
    fn test_logical_truth_table() {
        assert_eq!(boolean("1 < 2 && 2 < 3"), "true");
        assert_eq!(boolean("1 > 2 && 2 < 3"), "false");
        assert_eq!(boolean("1 < 2 && 2 > 3"), "false");
        assert_eq!(boolean("1 > 2 && 2 > 3"), "false");

        assert_eq!(boolean("1 < 2 || 2 < 3"), "true");
        assert_eq!(boolean("1 > 2 || 2 < 3"), "true");
        assert_eq!(boolean("1 < 2 || 2 > 3"), "true");
        assert_eq!(boolean("1 > 2 || 2 > 3"), "false");
    }

    #[test]
    fn test_logical_does_not_short_circuit() {
        assert_eq!(evaluate("1 > 2 && 1 / 0 == 1"), Err(RuleError::DivisionByZero));
        assert_eq!(evaluate("1 < 2 || 1 / 0 == 1"), Err(RuleError::DivisionByZero));
        assert_eq!(boolean("1 > 2 && \"maybe\""), "false");
    }

    #[test]
    fn test_logical_treats_non_boolean_text_as_false() {
        assert_eq!(boolean("\"yes\" && 1 < 2"), "false");
        assert_eq!(boolean("\"yes\" || 1 < 2"), "true");
        assert_eq!(boolean("\"\" || \"nope\""), "false");
        assert_eq!(boolean("\"T\" && \"1\""), "true");
        // Outside && and || the text is still checked
        assert!(matches!(evaluate_boolean("\"yes\""), Err(RuleError::NotBoolean(_))));
    }

    #[test]
    fn test_deep_nesting_is_a_syntax_error() {
        let deep = format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000));
        assert!(matches!(evaluate(&deep), Err(RuleError::Syntax { .. })));
        assert!(matches!(evaluate_boolean(&deep), Err(RuleError::Syntax { .. })));
    }

    #[test]
    fn test_integer_relational() {
        assert_eq!(boolean("2 == 1"), "false");
        assert_eq!(boolean("2 == 2"), "true");
        assert_eq!(boolean("2 != 1"), "true");
        assert_eq!(boolean("2 >= 3"), "false");
        assert_eq!(boolean("2 >= 2"), "true");
        assert_eq!(boolean("2 <= 1"), "false");
        assert_eq!(boolean("2 > 1"), "true");
        assert_eq!(boolean("2 < 2"), "false");
        assert_eq!(boolean("-3 < 2"), "true");
    }

    #[test]
    fn test_string_relational() {
        assert_eq!(boolean(r#""FOO" == "BAR""#), "false");
        assert_eq!(boolean(r#""FOO" == "FOO""#), "true");
        assert_eq!(boolean(r#""FOO" != "BAR""#), "true");
        assert_eq!(boolean(r#""FOO" >= "GOO""#), "false");
        assert_eq!(boolean(r#""FOO" <= "GOO""#), "true");
        assert_eq!(boolean(r#""FOO" > "BAR""#), "true");
        assert_eq!(boolean(r#""FOO" < "FOO""#), "false");
        assert_eq!(boolean(r#"'push' == "push""#), "true");
        // byte order: uppercase sorts before lowercase
        assert_eq!(boolean(r#""Z" < "a""#), "true");
    }

    #[test]
    fn test_comparison_result_compares_as_text() {
        assert_eq!(boolean(r#"(1 < 2) == "true""#), "true");
        assert_eq!(boolean(r#""true" && "false" || "1""#), "true");
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(evaluate_arithmetic("2 + 1").unwrap(), 3);
        assert_eq!(evaluate_arithmetic("2 + -1").unwrap(), 1);
        assert_eq!(evaluate_arithmetic("2 - -1").unwrap(), 3);
        assert_eq!(evaluate_arithmetic("6 * 7").unwrap(), 42);
        assert_eq!(evaluate_arithmetic("7 / 2").unwrap(), 3);
        assert_eq!(evaluate_arithmetic("-7 / 2").unwrap(), -3);
        assert_eq!(evaluate_arithmetic("10 - 4 - 3").unwrap(), 3);
        assert_eq!(evaluate_arithmetic("-(2 * 3)").unwrap(), -6);
    }

    #[test]
    fn test_arithmetic_rejects_strings() {
        assert!(matches!(
            evaluate(r#""FOO" + "BAR""#),
            Err(RuleError::UnsupportedOperator { kind: ResultKind::BooleanText, .. })
        ));
        assert!(matches!(evaluate(r#""FOO" * "BAR""#), Err(RuleError::UnsupportedOperator { .. })));
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(evaluate("1 / 0"), Err(RuleError::DivisionByZero));
    }

    #[test]
    fn test_overflow() {
        assert_eq!(evaluate("9223372036854775807 + 1"), Err(RuleError::Overflow));
    }

    #[test]
    fn test_unary_only_on_integers() {
        assert!(matches!(
            evaluate(r#"-"abc""#),
            Err(RuleError::UnsupportedOperator { kind: ResultKind::BooleanText, .. })
        ));
        assert!(matches!(evaluate("-(1 < 2)"), Err(RuleError::UnsupportedOperator { .. })));
        assert!(matches!(evaluate("!(1 < 2)"), Err(RuleError::UnsupportedOperator { .. })));
    }

    #[test]
    fn test_unsupported_forms() {
        assert!(matches!(evaluate("foo == 1"), Err(RuleError::UnsupportedExpressionForm(_))));
        assert!(matches!(evaluate("1.5 > 1"), Err(RuleError::UnsupportedExpressionForm(_))));
        assert!(matches!(evaluate("len(\"abc\")"), Err(RuleError::UnsupportedExpressionForm(_))));
        assert!(matches!(evaluate("5 % 2"), Err(RuleError::UnsupportedOperator { .. })));
    }

    #[test]
    fn test_typed_entry_points() {
        assert!(evaluate_boolean("3 > 2").unwrap());
        assert!(!evaluate_boolean(r#""a" == "b""#).unwrap());
        assert!(matches!(
            evaluate_boolean("1 + 1"),
            Err(RuleError::UnexpectedKind { expected: ResultKind::BooleanText, actual: ResultKind::Integer, .. })
        ));
        assert!(matches!(evaluate_boolean(r#""not a bool""#), Err(RuleError::NotBoolean(_))));
        assert!(matches!(
            evaluate_arithmetic("1 < 2"),
            Err(RuleError::UnexpectedKind { expected: ResultKind::Integer, .. })
        ));
    }
}
