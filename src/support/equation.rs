//! Equation text and its parsed form.
//!
//! An equation is written `lhs=rhs`. Both sides are parsed by a small
//! recursive-descent grammar into [`Expr`] trees, with derivative notation
//! recognised by the grammar itself:
//!
//! - `x'`, `x''`: ordinary time derivatives (ODE solvers)
//! - `T_x`, `T_xx`, `T_xy`, `u_t`: partial derivatives (PDE solvers)
//!
//! Evaluation is driven by a [`Scope`], which the solver builds over its
//! own working buffers. The same parsed expression can therefore be
//! evaluated at many grid points, or many integration stages, without
//! copying any environment.
//!
//! # Example
//!
//! ```
//! use twinflow::support::equation::Equation;
//!
//! let eq = Equation::parse("x' = -k*x").unwrap();
//! assert_eq!(eq.ode_unknown(), Some(("x", 1)));
//! ```

mod error;
mod expr;
mod lexer;
mod parser;

pub use error::{EquationError, EvalError, ParseError, Side};
pub use expr::{Binding, BinaryOp, Derivative, Expr, Function, Notation, Scope, UnaryOp};

/// Parses a standalone expression.
///
/// # Errors
///
/// Returns a [`ParseError`] if the text is not a valid expression.
pub fn parse_expr(text: &str) -> Result<Expr, ParseError> {
    parser::parse(text)
}

/// A parsed `lhs=rhs` equation.
#[derive(Debug, Clone, PartialEq)]
pub struct Equation {
    text: String,
    lhs: Expr,
    rhs: Expr,
}

/// How a PDE solver should treat an equation, decided by its left-hand side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdeForm<'a> {
    /// The lhs is a pure time derivative, `u_t` (order 1) or `u_tt` (order 2).
    Transient { function: &'a str, order: usize },

    /// Anything else; `function` is the first field differentiated in space.
    Elliptic { function: &'a str },
}

impl Equation {
    /// Parses equation text, splitting on the first `=`.
    ///
    /// # Errors
    ///
    /// Returns [`EquationError::MissingEquals`] if there is no `=`, or
    /// [`EquationError::Parse`] if either side is not a valid expression.
    pub fn parse(text: &str) -> Result<Self, EquationError> {
        let (lhs, rhs) = text.split_once('=').ok_or(EquationError::MissingEquals)?;
        let lhs = parser::parse(lhs).map_err(|source| EquationError::Parse {
            side: Side::Lhs,
            source,
        })?;
        let rhs = parser::parse(rhs).map_err(|source| EquationError::Parse {
            side: Side::Rhs,
            source,
        })?;
        Ok(Self {
            text: text.to_owned(),
            lhs,
            rhs,
        })
    }

    /// The original text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn lhs(&self) -> &Expr {
        &self.lhs
    }

    #[must_use]
    pub fn rhs(&self) -> &Expr {
        &self.rhs
    }

    /// Returns the unknown an ODE equation defines, with its derivative order.
    ///
    /// `x=...` is order 0, `x'=...` order 1, `x''=...` order 2. Returns
    /// `None` if the lhs is not a bare name or prime derivative.
    #[must_use]
    pub fn ode_unknown(&self) -> Option<(&str, usize)> {
        match &self.lhs {
            Expr::Variable(name) => Some((name, 0)),
            Expr::Derivative(Derivative {
                function,
                notation: Notation::Prime(order),
                ..
            }) => Some((function, *order)),
            _ => None,
        }
    }

    /// Classifies the equation for PDE solvers.
    ///
    /// `time` is the time variable; `space` lists the spatial variables.
    /// Returns `None` if no field can be identified.
    #[must_use]
    pub fn pde_form(&self, time: Option<char>, space: &[char]) -> Option<PdeForm<'_>> {
        if let (Some(time), Expr::Derivative(d)) = (time, &self.lhs) {
            if let Some(order) = d.pure_order(time) {
                return Some(PdeForm::Transient {
                    function: &d.function,
                    order,
                });
            }
        }

        let is_spatial = |d: &&Derivative| {
            d.subscript()
                .is_some_and(|s| s.chars().all(|c| space.contains(&c)))
        };
        self.lhs
            .derivatives()
            .into_iter()
            .find(is_spatial)
            .or_else(|| self.rhs.derivatives().into_iter().find(is_spatial))
            .map(|d| PdeForm::Elliptic {
                function: &d.function,
            })
    }

    /// Evaluates `lhs - rhs`.
    ///
    /// # Errors
    ///
    /// Returns an [`EvalError`] if either side fails to evaluate.
    pub fn residual(&self, scope: &(impl Scope + ?Sized)) -> Result<f64, EvalError> {
        Ok(self.lhs.evaluate(scope)? - self.rhs.evaluate(scope)?)
    }
}
