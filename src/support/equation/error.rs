use thiserror::Error;

/// Errors produced while turning equation text into an expression tree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("unexpected character `{ch}` at offset {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("unexpected `{found}` at offset {pos}")]
    UnexpectedToken { found: String, pos: usize },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("invalid number `{literal}` at offset {pos}")]
    InvalidNumber { literal: String, pos: usize },

    #[error("unknown function `{name}`")]
    UnknownFunction { name: String },

    #[error("`{name}` takes {expected} argument(s), got {found}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("empty expression")]
    Empty,

    #[error("expression nests deeper than {limit} levels")]
    TooDeep { limit: usize },
}

/// Errors produced while splitting `lhs=rhs` text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EquationError {
    /// The text contains no `=`.
    #[error("equation has no `=`")]
    MissingEquals,

    /// One side of the equation failed to parse.
    #[error("cannot parse {side}")]
    Parse {
        side: Side,
        #[source]
        source: ParseError,
    },
}

/// The side of an equation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Lhs,
    Rhs,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Lhs => "left-hand side",
            Self::Rhs => "right-hand side",
        })
    }
}

/// Errors raised while evaluating an expression against a scope.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("unbound variable `{0}`")]
    UnboundVariable(String),

    #[error("cannot resolve derivative `{0}`")]
    UnboundDerivative(String),

    #[error("`{0}` is an array and cannot be used as a number")]
    NotAScalar(String),

    #[error("`{0}` is not an array")]
    NotAnArray(String),

    #[error("index {index} is out of range for `{name}` (length {len})")]
    IndexOutOfRange { name: String, index: f64, len: usize },
}
