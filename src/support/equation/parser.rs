//! Recursive-descent parser.
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := ('-' | '+') unary | power
//! power   := postfix ('^' unary)?
//! postfix := IDENT '[' expr ']' | primary
//! primary := NUMBER | IDENT | IDENT '(' args ')' | '(' expr ')'
//! ```
//!
//! Identifiers carry derivative notation: trailing apostrophes (`x''`) and
//! a letters-only subscript after the first underscore (`T_xx`) both become
//! [`Expr::Derivative`] nodes.
//!
//! Nesting through `unary` is limited to [`MAX_DEPTH`] levels.

use super::{
    ParseError,
    expr::{BinaryOp, Derivative, Expr, Function, Notation, UnaryOp},
    lexer::{Spanned, Token, tokenize},
};

/// Deepest nesting of unary operators, parentheses, calls and indices.
pub(super) const MAX_DEPTH: usize = 256;

pub(super) fn parse(text: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.expr()?;
    match parser.tokens.get(parser.pos) {
        None => Ok(expr),
        Some((token, pos)) => Err(ParseError::UnexpectedToken {
            found: token.describe(),
            pos: *pos,
        }),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(token, _)| token)
    }

    fn next(&mut self) -> Option<Spanned> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ParseError> {
        match self.next() {
            Some((token, _)) if &token == expected => Ok(()),
            Some((token, pos)) => Err(ParseError::UnexpectedToken {
                found: token.describe(),
                pos,
            }),
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    fn expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        if self.depth == MAX_DEPTH {
            return Err(ParseError::TooDeep { limit: MAX_DEPTH });
        }
        self.depth += 1;
        let expr = self.signed();
        self.depth -= 1;
        expr
    }

    fn signed(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&Token::Minus) {
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.unary()?)));
        }
        if self.eat(&Token::Plus) {
            return self.unary();
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr, ParseError> {
        let base = self.postfix()?;
        if self.eat(&Token::Caret) {
            let exponent = self.unary()?;
            return Ok(Expr::Binary(
                BinaryOp::Pow,
                Box::new(base),
                Box::new(exponent),
            ));
        }
        Ok(base)
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let Some((token, pos)) = self.next() else {
            return Err(ParseError::UnexpectedEnd);
        };
        match token {
            Token::Number(value) => Ok(Expr::Number(value)),
            Token::LParen => {
                let inner = self.expr()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Token::Ident { name, primes } => self.identifier(name, primes, pos),
            other => Err(ParseError::UnexpectedToken {
                found: other.describe(),
                pos,
            }),
        }
    }

    fn identifier(&mut self, name: String, primes: usize, pos: usize) -> Result<Expr, ParseError> {
        if primes == 0 && self.eat(&Token::LParen) {
            let Some(function) = Function::from_name(&name) else {
                return Err(ParseError::UnknownFunction { name });
            };
            let args = self.arguments()?;
            if let Some(expected) = function.arity() {
                if args.len() != expected {
                    return Err(ParseError::Arity {
                        name,
                        expected,
                        found: args.len(),
                    });
                }
            } else if args.is_empty() {
                return Err(ParseError::Arity {
                    name,
                    expected: 1,
                    found: 0,
                });
            }
            return Ok(Expr::Call(function, args));
        }

        if primes == 0 && self.eat(&Token::LBracket) {
            let index = self.expr()?;
            self.expect(&Token::RBracket)?;
            return Ok(Expr::Index(name, Box::new(index)));
        }

        if primes > 0 {
            if name.contains('_') {
                return Err(ParseError::UnexpectedToken {
                    found: format!("{name}{}", "'".repeat(primes)),
                    pos,
                });
            }
            let symbol = format!("{name}{}", "'".repeat(primes));
            return Ok(Expr::Derivative(Derivative {
                function: name,
                notation: Notation::Prime(primes),
                symbol,
            }));
        }

        Ok(subscript_derivative(&name).unwrap_or(Expr::Variable(name)))
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(&Token::RParen)?;
            return Ok(args);
        }
    }
}

/// Splits `T_xx` into a subscript derivative, if it has that shape.
fn subscript_derivative(name: &str) -> Option<Expr> {
    let (function, subscript) = name.split_once('_')?;
    let is_function = function
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic());
    let is_subscript = !subscript.is_empty() && subscript.chars().all(|c| c.is_ascii_alphabetic());
    (is_function && is_subscript).then(|| {
        Expr::Derivative(Derivative {
            function: function.to_owned(),
            notation: Notation::Subscript(subscript.to_owned()),
            symbol: name.to_owned(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn derivative(function: &str, notation: Notation, symbol: &str) -> Expr {
        Expr::Derivative(Derivative {
            function: function.into(),
            notation,
            symbol: symbol.into(),
        })
    }

    #[test]
    fn precedence() {
        let expr = parse("1 + 2 * x").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Add,
                Box::new(Expr::Number(1.0)),
                Box::new(Expr::Binary(
                    BinaryOp::Mul,
                    Box::new(Expr::Number(2.0)),
                    Box::new(Expr::Variable("x".into())),
                )),
            )
        );
    }

    #[test]
    fn derivative_notation() {
        assert_eq!(
            parse("T_xy").unwrap(),
            derivative("T", Notation::Subscript("xy".into()), "T_xy")
        );
        assert_eq!(
            parse("x''").unwrap(),
            derivative("x", Notation::Prime(2), "x''")
        );
        assert_eq!(parse("k_1").unwrap(), Expr::Variable("k_1".into()));
        assert_eq!(parse("_x").unwrap(), Expr::Variable("_x".into()));
    }

    #[test]
    fn syntax_errors() {
        assert_eq!(parse(""), Err(ParseError::Empty));
        assert_eq!(parse("1 +"), Err(ParseError::UnexpectedEnd));
        assert_eq!(
            parse("(1 + 2"),
            Err(ParseError::UnexpectedEnd)
        );
        assert_eq!(
            parse("1 2"),
            Err(ParseError::UnexpectedToken {
                found: "2".into(),
                pos: 2
            })
        );
        assert_eq!(
            parse("foo(1)"),
            Err(ParseError::UnknownFunction { name: "foo".into() })
        );
        assert_eq!(
            parse("sin(1, 2)"),
            Err(ParseError::Arity {
                name: "sin".into(),
                expected: 1,
                found: 2
            })
        );
    }

    #[test]
    fn nesting_is_limited() {
        let nested = |depth: usize| format!("{}x{}", "(".repeat(depth), ")".repeat(depth));
        assert_eq!(parse(&nested(100)).unwrap(), Expr::Variable("x".into()));
        assert!(parse(&format!("{}x", "-".repeat(MAX_DEPTH - 1))).is_ok());

        let limit = Err(ParseError::TooDeep { limit: MAX_DEPTH });
        assert_eq!(parse(&nested(10_000)), limit);
        assert_eq!(parse(&format!("{}x", "-".repeat(10_000))), limit);
        assert_eq!(parse(&format!("{}1", "2^".repeat(10_000))), limit);
    }
}
