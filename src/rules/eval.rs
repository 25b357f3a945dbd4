//! Tree-walking evaluation of rule expressions.
//!
//! Both operands of a binary node are always evaluated before the
//! operator is applied, so `&&` and `||` never short-circuit.

use crate::rules::parser::{BinaryOp, Expr, UnaryOp};
use crate::rules::{parse_bool, ResultKind, RuleError};

/// Intermediate operand. Integers stay numeric between nodes; everything
/// textual (string literals and comparison results) shares one kind.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Operand {
    Integer(i64),
    Text(String),
}

impl Operand {
    pub(crate) fn kind(&self) -> ResultKind {
        match self {
            Operand::Integer(_) => ResultKind::Integer,
            Operand::Text(_) => ResultKind::BooleanText,
        }
    }

    fn boolean(value: bool) -> Self {
        Operand::Text(value.to_string())
    }
}

pub(crate) fn evaluate_expr(expr: &Expr) -> Result<Operand, RuleError> {
    match expr {
        Expr::Integer(digits) => digits
            .parse::<i64>()
            .map(Operand::Integer)
            .map_err(|_| RuleError::Overflow),
        Expr::Str(text) => Ok(Operand::Text(text.clone())),
        Expr::Paren(inner) => evaluate_expr(inner),
        Expr::Unary { op, operand } => {
            let value = evaluate_expr(operand)?;
            apply_unary(*op, value)
        }
        Expr::Binary { op, left, right } => {
            let left = evaluate_expr(left)?;
            let right = evaluate_expr(right)?;
            apply_binary(*op, left, right)
        }
        other => Err(RuleError::UnsupportedExpressionForm(other.form().to_string())),
    }
}

fn apply_unary(op: UnaryOp, value: Operand) -> Result<Operand, RuleError> {
    match (op, value) {
        (UnaryOp::Neg, Operand::Integer(v)) => v
            .checked_neg()
            .map(Operand::Integer)
            .ok_or(RuleError::Overflow),
        (UnaryOp::Plus, Operand::Integer(v)) => Ok(Operand::Integer(v)),
        (op, value) => Err(RuleError::UnsupportedOperator {
            operator: op.symbol().to_string(),
            kind: value.kind(),
        }),
    }
}

fn apply_binary(op: BinaryOp, left: Operand, right: Operand) -> Result<Operand, RuleError> {
    match (left, right) {
        (Operand::Integer(l), Operand::Integer(r)) => integer_op(op, l, r),
        (Operand::Text(l), Operand::Text(r)) => text_op(op, &l, &r),
        (l, r) => Err(RuleError::TypeMismatch {
            left: l.kind(),
            right: r.kind(),
        }),
    }
}

fn integer_op(op: BinaryOp, l: i64, r: i64) -> Result<Operand, RuleError> {
    let value = match op {
        BinaryOp::Eq => return Ok(Operand::boolean(l == r)),
        BinaryOp::Ne => return Ok(Operand::boolean(l != r)),
        BinaryOp::Ge => return Ok(Operand::boolean(l >= r)),
        BinaryOp::Le => return Ok(Operand::boolean(l <= r)),
        BinaryOp::Gt => return Ok(Operand::boolean(l > r)),
        BinaryOp::Lt => return Ok(Operand::boolean(l < r)),
        BinaryOp::Add => l.checked_add(r),
        BinaryOp::Sub => l.checked_sub(r),
        BinaryOp::Mul => l.checked_mul(r),
        BinaryOp::Div => {
            if r == 0 {
                return Err(RuleError::DivisionByZero);
            }
            l.checked_div(r)
        }
        BinaryOp::Rem | BinaryOp::And | BinaryOp::Or => {
            return Err(RuleError::UnsupportedOperator {
                operator: op.symbol().to_string(),
                kind: ResultKind::Integer,
            })
        }
    };
    value.map(Operand::Integer).ok_or(RuleError::Overflow)
}

/// Logical operands that are not boolean text count as false.
fn truthy(text: &str) -> bool {
    parse_bool(text).unwrap_or(false)
}

fn text_op(op: BinaryOp, l: &str, r: &str) -> Result<Operand, RuleError> {
    // str ordering is byte-lexicographic
    let result = match op {
        BinaryOp::Eq => l == r,
        BinaryOp::Ne => l != r,
        BinaryOp::Ge => l >= r,
        BinaryOp::Le => l <= r,
        BinaryOp::Gt => l > r,
        BinaryOp::Lt => l < r,
        BinaryOp::And => truthy(l) && truthy(r),
        BinaryOp::Or => truthy(l) || truthy(r),
        _ => {
            return Err(RuleError::UnsupportedOperator {
                operator: op.symbol().to_string(),
                kind: ResultKind::BooleanText,
            })
        }
    };
    Ok(Operand::boolean(result))
}
