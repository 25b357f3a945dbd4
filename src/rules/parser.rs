//! Precedence-climbing parser producing the rule AST.
//!
//! Binary precedence, loosest first: `||`, `&&`, relational, additive,
//! multiplicative. All binary operators are left associative.
//!
//! The grammar is deliberately wider than what the evaluator accepts:
//! identifiers, calls and fractional numbers parse cleanly so that the
//! evaluator can reject them as unsupported forms rather than as typos.

use crate::rules::lexer::{tokenize, Spanned, Token};
use crate::rules::RuleError;

/// Deepest nesting accepted. Counts open parentheses, prefix operators,
/// call arguments and chained binary operators, which together bound
/// the depth of the tree the evaluator walks.
pub const MAX_DEPTH: usize = 128;

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Ge,
    Le,
    Gt,
    Lt,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Ge => ">=",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Lt => "<",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    fn from_token(token: &Token) -> Option<(Self, u8)> {
        let op = match token {
            Token::OrOr => (BinaryOp::Or, 1),
            Token::AndAnd => (BinaryOp::And, 2),
            Token::EqEq => (BinaryOp::Eq, 3),
            Token::NotEq => (BinaryOp::Ne, 3),
            Token::Ge => (BinaryOp::Ge, 3),
            Token::Le => (BinaryOp::Le, 3),
            Token::Gt => (BinaryOp::Gt, 3),
            Token::Lt => (BinaryOp::Lt, 3),
            Token::Plus => (BinaryOp::Add, 4),
            Token::Minus => (BinaryOp::Sub, 4),
            Token::Star => (BinaryOp::Mul, 5),
            Token::Slash => (BinaryOp::Div, 5),
            Token::Percent => (BinaryOp::Rem, 5),
            _ => return None,
        };
        Some(op)
    }
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Not => "!",
        }
    }
}

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Integer(String),
    Str(String),
    Float(String),
    Ident(String),
    Call { callee: Box<Expr>, args: Vec<Expr> },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
    Paren(Box<Expr>),
}

impl Expr {
    /// Short description of the node's form, for error messages.
    pub fn form(&self) -> &'static str {
        match self {
            Expr::Integer(_) | Expr::Str(_) => "literal",
            Expr::Float(_) => "floating point literal",
            Expr::Ident(_) => "identifier",
            Expr::Call { .. } => "call",
            Expr::Unary { .. } => "unary",
            Expr::Binary { .. } => "binary",
            Expr::Paren(_) => "parenthesized",
        }
    }
}

/// Parse a complete expression.
pub fn parse(input: &str) -> Result<Expr, RuleError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0, depth: 0 };
    let expr = parser.expression(0)?;
    match parser.peek() {
        Token::Eof => Ok(expr),
        other => Err(parser.unexpected(other.symbol())),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos].token
    }

    fn offset(&self) -> usize {
        self.tokens[self.pos].offset
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].token.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn unexpected(&self, found: &str) -> RuleError {
        RuleError::Syntax {
            offset: self.offset(),
            message: format!("unexpected {}", found),
        }
    }

    fn descend(&mut self) -> Result<(), RuleError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(RuleError::Syntax {
                offset: self.offset(),
                message: format!("expression nested deeper than {} levels", MAX_DEPTH),
            });
        }
        Ok(())
    }

    fn expect(&mut self, expected: Token) -> Result<(), RuleError> {
        if *self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(RuleError::Syntax {
                offset: self.offset(),
                message: format!("expected '{}', found {}", expected.symbol(), self.peek().symbol()),
            })
        }
    }

    fn expression(&mut self, min_prec: u8) -> Result<Expr, RuleError> {
        let entry = self.depth;
        self.descend()?;
        let mut left = self.unary()?;

        while let Some((op, prec)) = BinaryOp::from_token(self.peek()) {
            if prec <= min_prec {
                break;
            }
            self.advance();
            self.descend()?;
            let right = self.expression(prec)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        self.depth = entry;
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, RuleError> {
        let op = match self.peek() {
            Token::Minus => UnaryOp::Neg,
            Token::Plus => UnaryOp::Plus,
            Token::Bang => UnaryOp::Not,
            _ => return self.postfix(),
        };
        self.advance();
        self.descend()?;
        let operand = self.unary()?;
        self.depth -= 1;
        Ok(Expr::Unary { op, operand: Box::new(operand) })
    }

    fn postfix(&mut self) -> Result<Expr, RuleError> {
        let entry = self.depth;
        let mut expr = self.primary()?;
        while *self.peek() == Token::LParen {
            self.advance();
            self.descend()?;
            let mut args = Vec::new();
            if *self.peek() != Token::RParen {
                loop {
                    args.push(self.expression(0)?);
                    if *self.peek() == Token::Comma {
                        self.advance();
                    } else {
                        break;
                    }
                }
            }
            self.expect(Token::RParen)?;
            expr = Expr::Call { callee: Box::new(expr), args };
        }
        self.depth = entry;
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, RuleError> {
        match self.peek().clone() {
            Token::Integer(digits) => {
                self.advance();
                Ok(Expr::Integer(digits))
            }
            Token::Float(text) => {
                self.advance();
                Ok(Expr::Float(text))
            }
            Token::Str(text) => {
                self.advance();
                Ok(Expr::Str(text))
            }
            Token::Ident(name) => {
                self.advance();
                Ok(Expr::Ident(name))
            }
            Token::LParen => {
                self.advance();
                let inner = self.expression(0)?;
                self.expect(Token::RParen)?;
                Ok(Expr::Paren(Box::new(inner)))
            }
            other => Err(self.unexpected(other.symbol())),
        }
    }
}
