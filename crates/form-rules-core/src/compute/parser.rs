// crates/form-rules-core/src/compute/parser.rs
// ============================================================================
// Module: Compute Expression Parser
// Description: Recursive-descent parser producing the compute AST.
// Purpose: Accept the arithmetic, comparison, logical, and ternary grammar
//          with hard size and nesting limits.
// Dependencies: crate::compute::{lexer, ExpressionError}
// ============================================================================

//! ## Overview
//! Precedence, lowest first: `?:`, `||`, `&&`, `== !=`, `< <= > >=`, `+ -`,
//! `* / %`, unary `! - +`, member access and `Math.*` calls. The only callable
//! functions are the `Math` builtins; any other call is rejected at parse
//! time, which keeps the evaluation environment closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::compute::ExpressionError;
use crate::compute::lexer::Lexer;
use crate::compute::lexer::SpannedToken;
use crate::compute::lexer::Token;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum allowed expression size in bytes.
pub const MAX_EXPRESSION_BYTES: usize = 64 * 1024;
/// Maximum supported nesting depth for expressions.
///
/// Parentheses, prefix operators, ternaries, calls, member accesses, and each
/// operator in a binary chain all count as one level.
pub const MAX_EXPRESSION_NESTING: usize = 64;

// ============================================================================
// SECTION: AST
// ============================================================================

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    /// Logical negation.
    Not,
    /// Arithmetic negation.
    Negate,
    /// Numeric conversion.
    Plus,
}

/// Binary operators, excluding the short-circuit logical ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `==`
    Eq,
    /// `!=`
    Ne,
}

/// Short-circuit logical operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LogicalOp {
    /// `&&`
    And,
    /// `||`
    Or,
}

/// `Math` functions available to expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MathFn {
    /// `Math.abs`
    Abs,
    /// `Math.ceil`
    Ceil,
    /// `Math.floor`
    Floor,
    /// `Math.round`
    Round,
    /// `Math.sqrt`
    Sqrt,
    /// `Math.trunc`
    Trunc,
    /// `Math.sign`
    Sign,
    /// `Math.max`
    Max,
    /// `Math.min`
    Min,
    /// `Math.pow`
    Pow,
}

impl MathFn {
    /// Looks up a `Math` member function by name.
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "abs" => Self::Abs,
            "ceil" => Self::Ceil,
            "floor" => Self::Floor,
            "round" => Self::Round,
            "sqrt" => Self::Sqrt,
            "trunc" => Self::Trunc,
            "sign" => Self::Sign,
            "max" => Self::Max,
            "min" => Self::Min,
            "pow" => Self::Pow,
            _ => return None,
        })
    }
}

/// Literal values.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Literal {
    /// Number literal.
    Number(f64),
    /// String literal.
    Str(String),
    /// Boolean literal.
    Bool(bool),
    /// `null` or `undefined`.
    Null,
}

/// Operator joining the links of a left-associative chain.
#[derive(Debug, Clone, Copy)]
enum ChainOp {
    /// Arithmetic, relational, or equality operator.
    Binary(BinaryOp),
    /// Short-circuit operator.
    Logical(LogicalOp),
}

impl ChainOp {
    /// Builds the node joining `left` and `right`.
    fn combine(self, left: Expr, right: Expr) -> Expr {
        match self {
            Self::Binary(op) => Expr::Binary(op, Box::new(left), Box::new(right)),
            Self::Logical(op) => Expr::Logical(op, Box::new(left), Box::new(right)),
        }
    }
}

/// Parsed compute expression node.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    /// Literal value.
    Literal(Literal),
    /// Bound input name.
    Ident(String),
    /// Property access on an object or string.
    Member(Box<Self>, String),
    /// `Math` builtin call.
    Call(MathFn, Vec<Self>),
    /// Unary operation.
    Unary(UnaryOp, Box<Self>),
    /// Binary operation.
    Binary(BinaryOp, Box<Self>, Box<Self>),
    /// Short-circuit logical operation returning an operand.
    Logical(LogicalOp, Box<Self>, Box<Self>),
    /// Ternary conditional.
    Conditional(Box<Self>, Box<Self>, Box<Self>),
}

impl Expr {
    /// Renders `a.b.c` member chains rooted at an identifier as a dotted path.
    pub(crate) fn dotted_path(&self) -> Option<String> {
        match self {
            Self::Ident(name) => Some(name.clone()),
            Self::Member(object, property) => {
                object.dotted_path().map(|prefix| format!("{prefix}.{property}"))
            }
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Parses expression text into an AST.
pub(crate) fn parse_expression(input: &str) -> Result<Expr, ExpressionError> {
    if input.len() > MAX_EXPRESSION_BYTES {
        return Err(ExpressionError::InputTooLarge {
            max_bytes: MAX_EXPRESSION_BYTES,
            actual_bytes: input.len(),
        });
    }
    let tokens = Lexer::new(input).lex()?;
    let mut parser = Parser::new(tokens);
    let expr = parser.parse_ternary()?;
    parser.expect_eof()?;
    Ok(expr)
}

// ============================================================================
// SECTION: Parser
// ============================================================================

/// Recursive-descent parser over a token stream.
struct Parser<'input> {
    /// Token stream with source positions.
    tokens: Vec<SpannedToken<'input>>,
    /// Current token index.
    index: usize,
    /// Current nesting depth.
    nesting: usize,
}

impl<'input> Parser<'input> {
    /// Creates a parser over the token stream.
    const fn new(tokens: Vec<SpannedToken<'input>>) -> Self {
        Self {
            tokens,
            index: 0,
            nesting: 0,
        }
    }

    /// Parses `cond ? a : b`, right-associative.
    fn parse_ternary(&mut self) -> Result<Expr, ExpressionError> {
        let condition = self.parse_or()?;
        if !self.matches(&Token::Question) {
            return Ok(condition);
        }
        let position = self.position();
        self.with_nesting(position, |parser| {
            let consequent = parser.parse_ternary()?;
            parser.expect(&Token::Colon, "`:` in conditional expression")?;
            let alternate = parser.parse_ternary()?;
            Ok(Expr::Conditional(
                Box::new(condition),
                Box::new(consequent),
                Box::new(alternate),
            ))
        })
    }

    /// Parses `||` chains.
    fn parse_or(&mut self) -> Result<Expr, ExpressionError> {
        self.parse_chain(Self::parse_and, |token| match token {
            Token::OrOr => Some(ChainOp::Logical(LogicalOp::Or)),
            _ => None,
        })
    }

    /// Parses `&&` chains.
    fn parse_and(&mut self) -> Result<Expr, ExpressionError> {
        self.parse_chain(Self::parse_equality, |token| match token {
            Token::AndAnd => Some(ChainOp::Logical(LogicalOp::And)),
            _ => None,
        })
    }

    /// Parses equality operators.
    fn parse_equality(&mut self) -> Result<Expr, ExpressionError> {
        self.parse_chain(Self::parse_comparison, |token| match token {
            Token::EqEq => Some(ChainOp::Binary(BinaryOp::Eq)),
            Token::NotEq => Some(ChainOp::Binary(BinaryOp::Ne)),
            _ => None,
        })
    }

    /// Parses relational operators.
    fn parse_comparison(&mut self) -> Result<Expr, ExpressionError> {
        self.parse_chain(Self::parse_additive, |token| match token {
            Token::Lt => Some(ChainOp::Binary(BinaryOp::Lt)),
            Token::Le => Some(ChainOp::Binary(BinaryOp::Le)),
            Token::Gt => Some(ChainOp::Binary(BinaryOp::Gt)),
            Token::Ge => Some(ChainOp::Binary(BinaryOp::Ge)),
            _ => None,
        })
    }

    /// Parses `+` and `-`.
    fn parse_additive(&mut self) -> Result<Expr, ExpressionError> {
        self.parse_chain(Self::parse_multiplicative, |token| match token {
            Token::Plus => Some(ChainOp::Binary(BinaryOp::Add)),
            Token::Minus => Some(ChainOp::Binary(BinaryOp::Sub)),
            _ => None,
        })
    }

    /// Parses `*`, `/`, and `%`.
    fn parse_multiplicative(&mut self) -> Result<Expr, ExpressionError> {
        self.parse_chain(Self::parse_unary, |token| match token {
            Token::Star => Some(ChainOp::Binary(BinaryOp::Mul)),
            Token::Slash => Some(ChainOp::Binary(BinaryOp::Div)),
            Token::Percent => Some(ChainOp::Binary(BinaryOp::Rem)),
            _ => None,
        })
    }

    /// Parses a left-associative operator chain.
    ///
    /// Each operator nests the tree one level deeper, so it counts toward
    /// the nesting limit until the chain ends.
    fn parse_chain(
        &mut self,
        operand: fn(&mut Self) -> Result<Expr, ExpressionError>,
        operator: fn(&Token<'_>) -> Option<ChainOp>,
    ) -> Result<Expr, ExpressionError> {
        let base = self.nesting;
        let result = self.parse_chain_operands(operand, operator);
        self.nesting = base;
        result
    }

    /// Folds operands of a chain into a left-nested tree.
    fn parse_chain_operands(
        &mut self,
        operand: fn(&mut Self) -> Result<Expr, ExpressionError>,
        operator: fn(&Token<'_>) -> Option<ChainOp>,
    ) -> Result<Expr, ExpressionError> {
        let mut left = operand(self)?;
        while let Some(op) = operator(&self.current().token) {
            self.descend(self.position())?;
            self.advance();
            let right = operand(self)?;
            left = op.combine(left, right);
        }
        Ok(left)
    }

    /// Parses prefix operators.
    fn parse_unary(&mut self) -> Result<Expr, ExpressionError> {
        let op = match self.current().token {
            Token::Bang => UnaryOp::Not,
            Token::Minus => UnaryOp::Negate,
            Token::Plus => UnaryOp::Plus,
            _ => return self.parse_postfix(),
        };
        let position = self.position();
        self.advance();
        self.with_nesting(position, |parser| {
            let operand = parser.parse_unary()?;
            Ok(Expr::Unary(op, Box::new(operand)))
        })
    }

    /// Parses member access chains after a primary expression.
    fn parse_postfix(&mut self) -> Result<Expr, ExpressionError> {
        let base = self.nesting;
        let result = self.parse_member_chain();
        self.nesting = base;
        result
    }

    /// Parses a primary expression and any `.name` accesses after it.
    fn parse_member_chain(&mut self) -> Result<Expr, ExpressionError> {
        let mut expr = self.parse_primary()?;
        while matches!(self.current().token, Token::Dot) {
            self.descend(self.position())?;
            self.advance();
            let property = self.expect_ident("property name after `.`")?;
            expr = Expr::Member(Box::new(expr), property.to_string());
        }
        if matches!(self.current().token, Token::LParen) {
            return Err(ExpressionError::UnknownFunction {
                name: expr.dotted_path().unwrap_or_else(|| "expression".to_string()),
                position: self.position(),
            });
        }
        Ok(expr)
    }

    /// Parses literals, identifiers, `Math` members, and parentheses.
    fn parse_primary(&mut self) -> Result<Expr, ExpressionError> {
        let position = self.position();
        let token = self.current().token.clone();
        match token {
            Token::Number(value) => {
                self.advance();
                Ok(Expr::Literal(Literal::Number(value)))
            }
            Token::Str(text) => {
                self.advance();
                Ok(Expr::Literal(Literal::Str(text)))
            }
            Token::Ident("true") => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(true)))
            }
            Token::Ident("false") => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(false)))
            }
            Token::Ident("null" | "undefined") => {
                self.advance();
                Ok(Expr::Literal(Literal::Null))
            }
            Token::Ident("NaN") => {
                self.advance();
                Ok(Expr::Literal(Literal::Number(f64::NAN)))
            }
            Token::Ident("Infinity") => {
                self.advance();
                Ok(Expr::Literal(Literal::Number(f64::INFINITY)))
            }
            Token::Ident("Math") => {
                self.advance();
                self.parse_math(position)
            }
            Token::Ident(name) => {
                self.advance();
                Ok(Expr::Ident(name.to_string()))
            }
            Token::LParen => {
                self.advance();
                self.with_nesting(position, |parser| {
                    let expr = parser.parse_ternary()?;
                    parser.expect(&Token::RParen, "`)`")?;
                    Ok(expr)
                })
            }
            _ => Err(ExpressionError::UnexpectedToken {
                expected: "operand",
                found: token.describe(),
                position,
            }),
        }
    }

    /// Parses `Math.<fn>(args)` or `Math.PI` / `Math.E`.
    fn parse_math(&mut self, position: usize) -> Result<Expr, ExpressionError> {
        self.expect(&Token::Dot, "`.` after `Math`")?;
        let member_position = self.position();
        let member = self.expect_ident("`Math` member name")?;
        match member {
            "PI" => return Ok(Expr::Literal(Literal::Number(std::f64::consts::PI))),
            "E" => return Ok(Expr::Literal(Literal::Number(std::f64::consts::E))),
            _ => {}
        }
        let Some(function) = MathFn::from_name(member) else {
            return Err(ExpressionError::UnknownFunction {
                name: format!("Math.{member}"),
                position: member_position,
            });
        };
        self.expect(&Token::LParen, "`(` after `Math` function")?;
        self.with_nesting(position, |parser| {
            let args = parser.parse_arguments()?;
            Ok(Expr::Call(function, args))
        })
    }

    /// Parses a comma-separated argument list after `(`.
    fn parse_arguments(&mut self) -> Result<Vec<Expr>, ExpressionError> {
        let mut args = Vec::new();
        if self.matches(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_ternary()?);
            if self.matches(&Token::Comma) {
                continue;
            }
            self.expect(&Token::RParen, "`)` after arguments")?;
            return Ok(args);
        }
    }

    /// Runs a parser step while enforcing the nesting limit.
    fn with_nesting<T>(
        &mut self,
        position: usize,
        f: impl FnOnce(&mut Self) -> Result<T, ExpressionError>,
    ) -> Result<T, ExpressionError> {
        let base = self.nesting;
        self.descend(position)?;
        let result = f(self);
        self.nesting = base;
        result
    }

    /// Enters one more nesting level, failing past the limit.
    const fn descend(&mut self, position: usize) -> Result<(), ExpressionError> {
        let next_depth = self.nesting + 1;
        if next_depth > MAX_EXPRESSION_NESTING {
            return Err(ExpressionError::NestingTooDeep {
                max_depth: MAX_EXPRESSION_NESTING,
                position,
            });
        }
        self.nesting = next_depth;
        Ok(())
    }

    /// Consumes an identifier token.
    fn expect_ident(&mut self, expected: &'static str) -> Result<&'input str, ExpressionError> {
        if let Token::Ident(name) = self.current().token {
            self.advance();
            Ok(name)
        } else {
            Err(ExpressionError::UnexpectedToken {
                expected,
                found: self.current().token.describe(),
                position: self.position(),
            })
        }
    }

    /// Consumes the expected token or returns an error.
    fn expect(&mut self, token: &Token<'_>, expected: &'static str) -> Result<(), ExpressionError> {
        if self.matches(token) {
            Ok(())
        } else {
            Err(ExpressionError::UnexpectedToken {
                expected,
                found: self.current().token.describe(),
                position: self.position(),
            })
        }
    }

    /// Ensures the parser is at end-of-input.
    fn expect_eof(&self) -> Result<(), ExpressionError> {
        if matches!(self.current().token, Token::Eof) {
            Ok(())
        } else {
            Err(ExpressionError::TrailingInput {
                position: self.position(),
            })
        }
    }

    /// Consumes the token if it matches the expected kind.
    fn matches(&mut self, kind: &Token<'_>) -> bool {
        if std::mem::discriminant(&self.current().token) == std::mem::discriminant(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Returns the current token.
    fn current(&self) -> &SpannedToken<'input> {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.index.min(last)]
    }

    /// Returns the byte offset of the current token.
    fn position(&self) -> usize {
        self.current().position
    }

    /// Advances to the next token.
    const fn advance(&mut self) {
        if self.index + 1 < self.tokens.len() {
            self.index += 1;
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
