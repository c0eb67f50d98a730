use thiserror::Error;

use crate::support::{
    constraint::ConstraintError,
    equation::{EquationError, EvalError, ParseError, Side},
};

/// Errors recorded on a block.
///
/// Errors never escape the block that raised them. The flowchart stores
/// them in the block's [`Status`](super::Status) and carries on with the
/// rest of the tick.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BlockError {
    /// The equation text has no `=`.
    #[error("equation `{text}` has no `=`")]
    EquationSyntax { text: String },

    /// One side of an equation could not be parsed.
    #[error("cannot parse {side} of `{text}`")]
    Parse {
        text: String,
        side: Side,
        #[source]
        source: ParseError,
    },

    /// An expression failed while being evaluated.
    #[error("evaluation failed")]
    Evaluation(#[from] EvalError),

    /// The block's configuration or inputs do not fit together.
    #[error("{reason}")]
    Structural { reason: String },

    /// A numeric input violated its constraint.
    #[error("input `{port}` is invalid")]
    InvalidInput {
        port: String,
        #[source]
        source: ConstraintError,
    },
}

impl BlockError {
    pub(crate) fn structural(reason: impl Into<String>) -> Self {
        Self::Structural {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_input(port: &str, source: ConstraintError) -> Self {
        Self::InvalidInput {
            port: port.to_owned(),
            source,
        }
    }

    pub(crate) fn from_equation(text: &str, error: EquationError) -> Self {
        match error {
            EquationError::MissingEquals => Self::EquationSyntax {
                text: text.to_owned(),
            },
            EquationError::Parse { side, source } => Self::Parse {
                text: text.to_owned(),
                side,
                source,
            },
        }
    }
}

/// The name passed to [`BlockKind::from_str`](std::str::FromStr) is not a block kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown block kind `{0}`")]
pub struct UnknownKind(pub String);
