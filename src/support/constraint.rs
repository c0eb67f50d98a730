//! Numeric constraints checked once, when a value enters a solver.
//!
//! Port values arrive as plain `f64`s. Before a solver uses a step size or
//! a grid dimension, it wraps the raw number in a [`Constrained<T, C>`],
//! which can only be built if the marker `C` accepts the value. Downstream
//! code then works with the unwrapped value knowing the check has passed.
//!
//! # Provided constraints
//!
//! - [`StrictlyPositive`]: greater than zero (step sizes, grid spacing)
//! - [`NonNegative`]: zero or greater (step indices, counts)
//! - [`AtLeast<N>`]: an integer count no smaller than `N` (grid sizes)
//! - [`AtMost<N>`]: an integer count no larger than `N` (grid size caps)
//!
//! Custom constraints implement [`Constraint<T>`] on a zero-sized marker.

mod at_least;
mod at_most;
mod non_negative;
mod strictly_positive;

use std::marker::PhantomData;

use thiserror::Error;

pub use at_least::AtLeast;
pub use at_most::AtMost;
pub use non_negative::NonNegative;
pub use strictly_positive::StrictlyPositive;

/// A numeric invariant enforced at construction time.
pub trait Constraint<T> {
    /// Checks that the given value satisfies this constraint.
    ///
    /// # Errors
    ///
    /// Returns a [`ConstraintError`] if the value does not satisfy the constraint.
    fn check(value: &T) -> Result<(), ConstraintError>;
}

/// An error returned when a [`Constraint`] is violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConstraintError {
    #[error("value must not be negative")]
    Negative,
    #[error("value must not be zero")]
    Zero,
    #[error("value is not a number")]
    NotANumber,
    #[error("value is below the minimum allowed")]
    BelowMinimum,
    #[error("value is above the maximum allowed")]
    AboveMaximum,
}

/// A result type alias to use with [`Constraint`].
pub type ConstraintResult<T, E = ConstraintError> = Result<T, E>;

/// A value that is known to satisfy the constraint `C`.
///
/// # Example
///
/// ```
/// use twinflow::support::constraint::{Constrained, StrictlyPositive};
///
/// let dx = Constrained::<f64, StrictlyPositive>::new(0.25).unwrap();
/// assert_eq!(dx.into_inner(), 0.25);
/// assert!(Constrained::<f64, StrictlyPositive>::new(0.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Constrained<T, C: Constraint<T>> {
    value: T,
    _marker: PhantomData<C>,
}

impl<T, C: Constraint<T>> Constrained<T, C> {
    /// Constructs a new constrained value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value does not satisfy the constraint.
    pub fn new(value: T) -> Result<Self, ConstraintError> {
        C::check(&value)?;
        Ok(Self {
            value,
            _marker: PhantomData,
        })
    }

    /// Consumes the wrapper and returns the inner value.
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T, C: Constraint<T>> AsRef<T> for Constrained<T, C> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

/// Converts a port number into a count.
///
/// The value is rounded to the nearest integer after checking that it is
/// a non-negative number.
///
/// # Errors
///
/// Returns an error if the value is negative or `NaN`.
pub fn count(value: f64) -> ConstraintResult<usize> {
    let value = NonNegative::new(value)?.into_inner();
    if value.is_infinite() {
        return Err(ConstraintError::NotANumber);
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(value.round() as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_round_to_nearest() {
        assert_eq!(count(4.0).unwrap(), 4);
        assert_eq!(count(4.4).unwrap(), 4);
        assert_eq!(count(4.6).unwrap(), 5);
        assert_eq!(count(0.0).unwrap(), 0);
    }

    #[test]
    fn counts_reject_bad_values() {
        assert_eq!(count(-1.0), Err(ConstraintError::Negative));
        assert_eq!(count(f64::NAN), Err(ConstraintError::NotANumber));
        assert_eq!(count(f64::INFINITY), Err(ConstraintError::NotANumber));
    }
}
