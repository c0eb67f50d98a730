use super::{Constrained, Constraint, ConstraintError};

/// Marker for counts no larger than `N`.
///
/// Grid sizes read from ports are capped so a stray input cannot request
/// an allocation the process cannot satisfy.
///
/// # Examples
///
/// ```
/// use twinflow::support::constraint::AtMost;
///
/// assert_eq!(AtMost::<10>::new(10).unwrap().into_inner(), 10);
/// assert!(AtMost::<10>::new(11).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct AtMost<const N: usize>;

impl<const N: usize> AtMost<N> {
    /// Constructs a [`Constrained<usize, AtMost<N>>`] if `value <= N`.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintError::AboveMaximum`] if the value is larger than `N`.
    pub fn new(value: usize) -> Result<Constrained<usize, AtMost<N>>, ConstraintError> {
        Constrained::<usize, AtMost<N>>::new(value)
    }
}

impl<const N: usize> Constraint<usize> for AtMost<N> {
    fn check(value: &usize) -> Result<(), ConstraintError> {
        if *value <= N {
            Ok(())
        } else {
            Err(ConstraintError::AboveMaximum)
        }
    }
}
