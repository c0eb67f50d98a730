//! Tokenizer for equation text.

use super::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Token {
    Number(f64),
    /// An identifier with its trailing apostrophes counted (`x''` → primes = 2).
    Ident {
        name: String,
        primes: usize,
    },
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

impl Token {
    pub(super) fn describe(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Ident { name, primes } => format!("{name}{}", "'".repeat(*primes)),
            Self::Plus => "+".into(),
            Self::Minus => "-".into(),
            Self::Star => "*".into(),
            Self::Slash => "/".into(),
            Self::Caret => "^".into(),
            Self::LParen => "(".into(),
            Self::RParen => ")".into(),
            Self::LBracket => "[".into(),
            Self::RBracket => "]".into(),
            Self::Comma => ",".into(),
        }
    }
}

/// A token and the byte offset where it starts.
pub(super) type Spanned = (Token, usize);

pub(super) fn tokenize(text: &str) -> Result<Vec<Spanned>, ParseError> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        let start = pos;

        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        if c.is_ascii_digit() || (c == b'.' && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit)) {
            pos = scan_number(bytes, pos);
            let literal = &text[start..pos];
            let value = literal
                .parse::<f64>()
                .map_err(|_| ParseError::InvalidNumber {
                    literal: literal.to_owned(),
                    pos: start,
                })?;
            tokens.push((Token::Number(value), start));
            continue;
        }

        if c.is_ascii_alphabetic() || c == b'_' {
            while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
                pos += 1;
            }
            let name = text[start..pos].to_owned();
            let mut primes = 0;
            while pos < bytes.len() && bytes[pos] == b'\'' {
                primes += 1;
                pos += 1;
            }
            tokens.push((Token::Ident { name, primes }, start));
            continue;
        }

        let token = match c {
            b'+' => Token::Plus,
            b'-' => Token::Minus,
            b'*' => Token::Star,
            b'/' => Token::Slash,
            b'^' => Token::Caret,
            b'(' => Token::LParen,
            b')' => Token::RParen,
            b'[' => Token::LBracket,
            b']' => Token::RBracket,
            b',' => Token::Comma,
            _ => {
                let ch = text[start..].chars().next().unwrap_or('?');
                return Err(ParseError::UnexpectedChar { ch, pos: start });
            }
        };
        tokens.push((token, start));
        pos += 1;
    }

    Ok(tokens)
}

/// Returns the end offset of the numeric literal starting at `pos`.
///
/// An exponent marker is only consumed when digits follow it, so `2*e`
/// still reads `e` as an identifier.
fn scan_number(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos < bytes.len() && bytes[pos] == b'.' {
        pos += 1;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
    }
    if pos < bytes.len() && matches!(bytes[pos], b'e' | b'E') {
        let mut exp = pos + 1;
        if exp < bytes.len() && matches!(bytes[exp], b'+' | b'-') {
            exp += 1;
        }
        if exp < bytes.len() && bytes[exp].is_ascii_digit() {
            pos = exp;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
        }
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<Token> {
        tokenize(text).unwrap().into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn primes_attach_to_identifiers() {
        assert_eq!(
            kinds("x''"),
            vec![Token::Ident {
                name: "x".into(),
                primes: 2
            }]
        );
    }

    #[test]
    fn exponents_need_digits() {
        assert_eq!(kinds("1.5e-3"), vec![Token::Number(1.5e-3)]);
        assert_eq!(
            kinds("2e"),
            vec![
                Token::Number(2.0),
                Token::Ident {
                    name: "e".into(),
                    primes: 0
                }
            ]
        );
    }

    #[test]
    fn rejects_stray_characters() {
        assert_eq!(
            tokenize("a = b"),
            Err(ParseError::UnexpectedChar { ch: '=', pos: 2 })
        );
    }
}
