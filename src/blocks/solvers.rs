//! Equation-driven solver blocks.
//!
//! Each solver holds equation texts, the names of its independent
//! variables, and a method selector. Setting the equations re-parses them
//! and regenerates the block's ports; the numerical work lives in each
//! solver's internal `core` module behind a [`twine_core::Model`] adapter.
//!
//! - [`OdeSolver`]: time integration of ordinary differential equations
//! - [`TransientSolver`]: 1-D finite-difference time marching
//! - [`SteadyStateSolver`]: 2-D finite-difference relaxation

mod ode;
mod steady;
mod transient;

pub use ode::{OdeMethod, OdeSettings, OdeSolver};
pub use steady::{RelaxationMethod, SteadySettings, SteadyStateSolver};
pub use transient::{TransientMethod, TransientSettings, TransientSolver};

use serde::{Deserialize, Serialize};

use crate::{
    flowchart::Value,
    support::{
        boundary::BoundaryCondition,
        constraint::{self, AtLeast, AtMost, Constrained, Constraint},
        equation::Equation,
    },
};

use super::{BlockBase, BlockError};

/// Configuration shared by every solver that holds equations.
pub trait SolverBlock {
    /// Replaces the equations, re-parsing them and regenerating ports.
    ///
    /// Equations that fail to parse are recorded as configuration errors on
    /// the block and take no part in evaluation.
    fn set_equations(&mut self, texts: Vec<String>);

    fn equations(&self) -> &[String];

    /// Replaces the independent variable names.
    fn set_variables(&mut self, names: Vec<String>);

    fn variables(&self) -> &[String];
}

/// Iteration settings for relaxation sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelaxationConfig {
    /// Sweeps performed per tick.
    pub steps: usize,

    /// Stops a tick's sweeps early once the largest point update falls
    /// below this value.
    #[serde(default)]
    pub tolerance: Option<f64>,
}

impl Default for RelaxationConfig {
    fn default() -> Self {
        Self {
            steps: 100,
            tolerance: None,
        }
    }
}

impl RelaxationConfig {
    pub(crate) fn converged(&self, largest_update: f64) -> bool {
        self.tolerance.is_some_and(|tol| largest_update < tol)
    }
}

/// Equations parsed from text, with the texts that failed.
#[derive(Debug, Clone, Default)]
pub(crate) struct EquationSet {
    parsed: Vec<Equation>,
    errors: Vec<BlockError>,
}

impl EquationSet {
    pub(crate) fn parse(texts: &[String]) -> Self {
        let mut parsed = Vec::new();
        let mut errors = Vec::new();
        for text in texts {
            match Equation::parse(text) {
                Ok(eq) => parsed.push(eq),
                Err(e) => errors.push(BlockError::from_equation(text, e)),
            }
        }
        Self { parsed, errors }
    }

    /// Equations that parsed, in declaration order.
    pub(crate) fn parsed(&self) -> &[Equation] {
        &self.parsed
    }

    /// Consumes the parse errors, leaving the set without any.
    pub(crate) fn take_errors(&mut self) -> Vec<BlockError> {
        std::mem::take(&mut self.errors)
    }
}

/// Checks variable names are single letters and returns them as chars.
pub(crate) fn single_letters(names: &[String]) -> Result<Vec<char>, BlockError> {
    names
        .iter()
        .map(|name| {
            let mut chars = name.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_alphabetic() => Ok(c),
                _ => Err(BlockError::structural(format!(
                    "variable `{name}` must be a single letter"
                ))),
            }
        })
        .collect()
}

/// Reads an input as a number, or `None` if it is undefined.
///
/// # Errors
///
/// Returns a structural error if the value is not a number.
pub(crate) fn number(base: &BlockBase, port: &str) -> Result<Option<f64>, BlockError> {
    base.input(port)
        .map(|value| {
            value
                .as_number()
                .ok_or_else(|| BlockError::structural(format!("input `{port}` is not a number")))
        })
        .transpose()
}

/// Checks a number against a constraint.
pub(crate) fn constrained<C: Constraint<f64>>(port: &str, value: f64) -> Result<f64, BlockError> {
    Constrained::<f64, C>::new(value)
        .map(Constrained::into_inner)
        .map_err(|e| BlockError::invalid_input(port, e))
}

/// Largest number of points along one grid axis.
pub(crate) const MAX_GRID_SIZE: usize = 1 << 20;

/// Converts a number into a grid size of at least `N` and at most
/// [`MAX_GRID_SIZE`].
pub(crate) fn grid_size<const N: usize>(port: &str, value: f64) -> Result<usize, BlockError> {
    let n = constraint::count(value).map_err(|e| BlockError::invalid_input(port, e))?;
    AtLeast::<N>::new(n)
        .and_then(|n| AtMost::<MAX_GRID_SIZE>::new(n.into_inner()))
        .map(Constrained::into_inner)
        .map_err(|e| BlockError::invalid_input(port, e))
}

/// Expands an initial-value input to a grid of `len` points.
///
/// A number fills the grid; an array must already have `len` entries.
pub(crate) fn grid_values(port: &str, value: &Value, len: usize) -> Result<Vec<f64>, BlockError> {
    if let Some(n) = value.as_number() {
        return Ok(vec![n; len]);
    }
    match value.as_array() {
        Some(values) if values.len() == len => Ok(values.to_vec()),
        Some(values) => Err(BlockError::structural(format!(
            "input `{port}` has {} values but the grid has {len} points",
            values.len()
        ))),
        None => Err(BlockError::structural(format!(
            "input `{port}` must be a number or number array"
        ))),
    }
}

/// Reads an optional boundary-condition input.
pub(crate) fn boundary(base: &BlockBase, port: &str) -> Result<BoundaryCondition, BlockError> {
    match base.input(port) {
        None => Ok(BoundaryCondition::default()),
        Some(value) => value.as_boundary().copied().ok_or_else(|| {
            BlockError::structural(format!("input `{port}` is not a boundary condition"))
        }),
    }
}

pub(crate) fn init_port(field: &str) -> String {
    format!("init:{field}")
}

pub(crate) fn bc_port(field: &str) -> String {
    format!("bc:{field}")
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::support::constraint::ConstraintError;

    #[test]
    fn equation_sets_keep_valid_equations() {
        let mut set = EquationSet::parse(&["x' = -x".into(), "xy".into(), "y = (".into()]);
        assert_eq!(set.parsed().len(), 1);

        let errors = set.take_errors();
        assert_eq!(errors[0], BlockError::EquationSyntax { text: "xy".into() });
        assert!(matches!(errors[1], BlockError::Parse { .. }));
        assert!(set.take_errors().is_empty());
    }

    #[test]
    fn grid_inputs() {
        assert_eq!(grid_size::<3>("NX", 5.0), Ok(5));
        assert_eq!(
            grid_size::<3>("NX", 2.0),
            Err(BlockError::invalid_input("NX", ConstraintError::BelowMinimum))
        );
        assert_eq!(grid_size::<3>("NX", MAX_GRID_SIZE as f64), Ok(MAX_GRID_SIZE));
        assert_eq!(
            grid_size::<3>("NX", 1e10),
            Err(BlockError::invalid_input("NX", ConstraintError::AboveMaximum))
        );
        assert_eq!(grid_values("init:u", &Value::Number(2.0), 3), Ok(vec![2.0; 3]));
        assert!(grid_values("init:u", &Value::NumberArray(vec![1.0]), 3).is_err());
    }

    #[test]
    fn variables_are_letters() {
        assert_eq!(single_letters(&["t".into(), "x".into()]), Ok(vec!['t', 'x']));
        assert!(single_letters(&["time".into()]).is_err());
    }
}
