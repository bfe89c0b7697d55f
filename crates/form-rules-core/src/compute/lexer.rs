// crates/form-rules-core/src/compute/lexer.rs
// ============================================================================
// Module: Compute Expression Lexer
// Description: Tokenizer for the compute expression language.
// Purpose: Turn expression text into positioned tokens for the parser.
// Dependencies: crate::compute::ExpressionError
// ============================================================================

//! ## Overview
//! Produces a flat token stream with byte offsets. String literals accept
//! single or double quotes with backslash escapes. `===`/`!==` lex to the
//! same tokens as `==`/`!=` because equality is always strict.

use crate::compute::ExpressionError;

// ============================================================================
// SECTION: Tokens
// ============================================================================

/// Lexer token produced from expression input.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token<'a> {
    /// Identifier or keyword.
    Ident(&'a str),
    /// Numeric literal.
    Number(f64),
    /// String literal with escapes resolved.
    Str(String),
    /// `.`
    Dot,
    /// `,`
    Comma,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `?`
    Question,
    /// `:`
    Colon,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `!`
    Bang,
    /// `&&`
    AndAnd,
    /// `||`
    OrOr,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `==` or `===`
    EqEq,
    /// `!=` or `!==`
    NotEq,
    /// End-of-input marker.
    Eof,
}

impl Token<'_> {
    /// Formats the token for diagnostics.
    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Ident(name) => (*name).to_string(),
            Self::Number(value) => value.to_string(),
            Self::Str(text) => format!("\"{text}\""),
            Self::Dot => ".".to_string(),
            Self::Comma => ",".to_string(),
            Self::LParen => "(".to_string(),
            Self::RParen => ")".to_string(),
            Self::Question => "?".to_string(),
            Self::Colon => ":".to_string(),
            Self::Plus => "+".to_string(),
            Self::Minus => "-".to_string(),
            Self::Star => "*".to_string(),
            Self::Slash => "/".to_string(),
            Self::Percent => "%".to_string(),
            Self::Bang => "!".to_string(),
            Self::AndAnd => "&&".to_string(),
            Self::OrOr => "||".to_string(),
            Self::Lt => "<".to_string(),
            Self::Le => "<=".to_string(),
            Self::Gt => ">".to_string(),
            Self::Ge => ">=".to_string(),
            Self::EqEq => "==".to_string(),
            Self::NotEq => "!=".to_string(),
            Self::Eof => "end of input".to_string(),
        }
    }
}

/// Token paired with its byte offset.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SpannedToken<'a> {
    /// Token value.
    pub(crate) token: Token<'a>,
    /// Byte offset into the input.
    pub(crate) position: usize,
}

// ============================================================================
// SECTION: Lexer
// ============================================================================

/// Lexer for compute expressions.
pub(crate) struct Lexer<'a> {
    /// Source input being tokenized.
    input: &'a str,
    /// Current byte offset into the input.
    offset: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    pub(crate) const fn new(input: &'a str) -> Self {
        Self {
            input,
            offset: 0,
        }
    }

    /// Lexes the input into a sequence of tokens ending in [`Token::Eof`].
    pub(crate) fn lex(&mut self) -> Result<Vec<SpannedToken<'a>>, ExpressionError> {
        let mut tokens = Vec::new();
        let bytes = self.input.as_bytes();

        while let Some(&ch) = bytes.get(self.offset) {
            let start = self.offset;
            let token = match ch {
                b' ' | b'\t' | b'\n' | b'\r' => {
                    self.offset += 1;
                    continue;
                }
                b'.' if bytes.get(start + 1).is_some_and(u8::is_ascii_digit) => {
                    self.lex_number(bytes)?
                }
                b'0' ..= b'9' => self.lex_number(bytes)?,
                b'\'' | b'"' => self.lex_string(ch)?,
                b'a' ..= b'z' | b'A' ..= b'Z' | b'_' | b'$' => {
                    self.consume_while(bytes, |b| b.is_ascii_alphanumeric() || b == b'_' || b == b'$');
                    Token::Ident(&self.input[start .. self.offset])
                }
                _ => self.lex_operator(bytes)?,
            };
            tokens.push(SpannedToken {
                token,
                position: start,
            });
        }

        if tokens.is_empty() {
            return Err(ExpressionError::EmptyInput);
        }

        tokens.push(SpannedToken {
            token: Token::Eof,
            position: self.offset,
        });
        Ok(tokens)
    }

    /// Lexes punctuation and operators.
    fn lex_operator(&mut self, bytes: &[u8]) -> Result<Token<'a>, ExpressionError> {
        let start = self.offset;
        let next = bytes.get(start + 1).copied();
        let third = bytes.get(start + 2).copied();
        let (token, width) = match (bytes[start], next) {
            (b'&', Some(b'&')) => (Token::AndAnd, 2),
            (b'|', Some(b'|')) => (Token::OrOr, 2),
            (b'=', Some(b'=')) => (Token::EqEq, if third == Some(b'=') { 3 } else { 2 }),
            (b'!', Some(b'=')) => (Token::NotEq, if third == Some(b'=') { 3 } else { 2 }),
            (b'<', Some(b'=')) => (Token::Le, 2),
            (b'>', Some(b'=')) => (Token::Ge, 2),
            (b'!', _) => (Token::Bang, 1),
            (b'<', _) => (Token::Lt, 1),
            (b'>', _) => (Token::Gt, 1),
            (b'+', _) => (Token::Plus, 1),
            (b'-', _) => (Token::Minus, 1),
            (b'*', _) => (Token::Star, 1),
            (b'/', _) => (Token::Slash, 1),
            (b'%', _) => (Token::Percent, 1),
            (b'(', _) => (Token::LParen, 1),
            (b')', _) => (Token::RParen, 1),
            (b',', _) => (Token::Comma, 1),
            (b'.', _) => (Token::Dot, 1),
            (b'?', _) => (Token::Question, 1),
            (b':', _) => (Token::Colon, 1),
            _ => {
                let found = self.input[start ..].chars().next().map_or_else(String::new, String::from);
                return Err(ExpressionError::UnexpectedToken {
                    expected: "operand or operator",
                    found,
                    position: start,
                });
            }
        };
        self.offset += width;
        Ok(token)
    }

    /// Lexes a decimal literal with optional fraction and exponent.
    fn lex_number(&mut self, bytes: &[u8]) -> Result<Token<'a>, ExpressionError> {
        let start = self.offset;
        self.consume_while(bytes, |b| b.is_ascii_digit());
        if bytes.get(self.offset) == Some(&b'.') {
            self.offset += 1;
            self.consume_while(bytes, |b| b.is_ascii_digit());
        }
        if matches!(bytes.get(self.offset), Some(b'e' | b'E')) {
            let mut lookahead = self.offset + 1;
            if matches!(bytes.get(lookahead), Some(b'+' | b'-')) {
                lookahead += 1;
            }
            if bytes.get(lookahead).is_some_and(u8::is_ascii_digit) {
                self.offset = lookahead;
                self.consume_while(bytes, |b| b.is_ascii_digit());
            }
        }
        let raw = &self.input[start .. self.offset];
        raw.parse::<f64>().map(Token::Number).map_err(|_| ExpressionError::InvalidNumber {
            raw: raw.to_string(),
            position: start,
        })
    }

    /// Lexes a quoted string literal.
    fn lex_string(&mut self, quote: u8) -> Result<Token<'a>, ExpressionError> {
        let start = self.offset;
        let mut text = String::new();
        let mut chars = self.input[start + 1 ..].char_indices();
        while let Some((index, ch)) = chars.next() {
            match ch {
                '\\' => {
                    let Some((_, escaped)) = chars.next() else {
                        break;
                    };
                    text.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                }
                _ if ch == char::from(quote) => {
                    self.offset = start + 1 + index + 1;
                    return Ok(Token::Str(text));
                }
                _ => text.push(ch),
            }
        }
        Err(ExpressionError::UnterminatedString {
            position: start,
        })
    }

    /// Advances while the condition matches the current byte.
    fn consume_while<F>(&mut self, bytes: &[u8], condition: F)
    where
        F: Fn(u8) -> bool,
    {
        while let Some(&b) = bytes.get(self.offset) {
            if condition(b) {
                self.offset += 1;
            } else {
                break;
            }
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
