//! Tokenizer for rule expressions.
//!
//! Produces a flat token stream with byte offsets so syntax errors can
//! point at the offending column.

use crate::rules::RuleError;

/// A single lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Integer(String),
    /// Fractional literal. Lexed so the evaluator can reject it by form.
    Float(String),
    Str(String),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    EqEq,
    NotEq,
    Ge,
    Le,
    Gt,
    Lt,
    AndAnd,
    OrOr,
    LParen,
    RParen,
    Comma,
    Eof,
}

impl Token {
    /// Operator spelling used in error messages.
    pub fn symbol(&self) -> &'static str {
        match self {
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Bang => "!",
            Token::EqEq => "==",
            Token::NotEq => "!=",
            Token::Ge => ">=",
            Token::Le => "<=",
            Token::Gt => ">",
            Token::Lt => "<",
            Token::AndAnd => "&&",
            Token::OrOr => "||",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::Comma => ",",
            Token::Integer(_) | Token::Float(_) => "number",
            Token::Str(_) => "string",
            Token::Ident(_) => "identifier",
            Token::Eof => "end of expression",
        }
    }
}

/// A token plus the byte offset it started at.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

/// Split an expression into tokens.
pub fn tokenize(input: &str) -> Result<Vec<Spanned>, RuleError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        let start = pos;
        let token = match c {
            b'0'..=b'9' => {
                while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                    pos += 1;
                }
                if pos < bytes.len() && bytes[pos] == b'.' {
                    pos += 1;
                    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                        pos += 1;
                    }
                    tokens.push(Spanned { token: Token::Float(input[start..pos].to_string()), offset: start });
                } else {
                    tokens.push(Spanned { token: Token::Integer(input[start..pos].to_string()), offset: start });
                }
                continue;
            }
            b'"' | b'\'' => {
                let (text, next) = read_string(input, pos)?;
                pos = next;
                tokens.push(Spanned { token: Token::Str(text), offset: start });
                continue;
            }
            c if c == b'_' || c.is_ascii_alphabetic() => {
                while pos < bytes.len() && (bytes[pos] == b'_' || bytes[pos].is_ascii_alphanumeric()) {
                    pos += 1;
                }
                tokens.push(Spanned { token: Token::Ident(input[start..pos].to_string()), offset: start });
                continue;
            }
            b'+' => Token::Plus,
            b'-' => Token::Minus,
            b'*' => Token::Star,
            b'/' => Token::Slash,
            b'%' => Token::Percent,
            b'(' => Token::LParen,
            b')' => Token::RParen,
            b',' => Token::Comma,
            b'=' if peek(bytes, pos) == Some(b'=') => {
                pos += 1;
                Token::EqEq
            }
            b'!' if peek(bytes, pos) == Some(b'=') => {
                pos += 1;
                Token::NotEq
            }
            b'!' => Token::Bang,
            b'>' if peek(bytes, pos) == Some(b'=') => {
                pos += 1;
                Token::Ge
            }
            b'>' => Token::Gt,
            b'<' if peek(bytes, pos) == Some(b'=') => {
                pos += 1;
                Token::Le
            }
            b'<' => Token::Lt,
            b'&' if peek(bytes, pos) == Some(b'&') => {
                pos += 1;
                Token::AndAnd
            }
            b'|' if peek(bytes, pos) == Some(b'|') => {
                pos += 1;
                Token::OrOr
            }
            _ => {
                let ch = input[pos..].chars().next().unwrap_or('?');
                return Err(RuleError::Syntax {
                    offset: pos,
                    message: format!("unexpected character '{}'", ch),
                });
            }
        };
        pos += 1;
        tokens.push(Spanned { token, offset: start });
    }

    tokens.push(Spanned { token: Token::Eof, offset: bytes.len() });
    Ok(tokens)
}

fn peek(bytes: &[u8], pos: usize) -> Option<u8> {
    bytes.get(pos + 1).copied()
}

/// Read a quoted literal starting at `start`. Returns the unescaped text and
/// the offset just past the closing quote.
fn read_string(input: &str, start: usize) -> Result<(String, usize), RuleError> {
    let quote = input.as_bytes()[start] as char;
    let mut out = String::new();
    let mut chars = input[start + 1..].char_indices();

    while let Some((i, ch)) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, c)) => out.push(c),
                None => break,
            },
            c if c == quote => return Ok((out, start + 1 + i + 1)),
            c => out.push(c),
        }
    }

    Err(RuleError::Syntax {
        offset: start,
        message: "unterminated string literal".to_string(),
    })
}
