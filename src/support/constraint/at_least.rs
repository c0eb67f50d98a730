use super::{Constrained, Constraint, ConstraintError};

/// Marker for counts no smaller than `N`.
///
/// Finite-difference grids need at least one interior point, so grid sizes
/// are checked against `AtLeast<3>`.
///
/// # Examples
///
/// ```
/// use twinflow::support::constraint::AtLeast;
///
/// assert_eq!(AtLeast::<3>::new(5).unwrap().into_inner(), 5);
/// assert!(AtLeast::<3>::new(2).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct AtLeast<const N: usize>;

impl<const N: usize> AtLeast<N> {
    /// Constructs a [`Constrained<usize, AtLeast<N>>`] if `value >= N`.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintError::BelowMinimum`] if the value is smaller than `N`.
    pub fn new(value: usize) -> Result<Constrained<usize, AtLeast<N>>, ConstraintError> {
        Constrained::<usize, AtLeast<N>>::new(value)
    }
}

impl<const N: usize> Constraint<usize> for AtLeast<N> {
    fn check(value: &usize) -> Result<(), ConstraintError> {
        if *value >= N {
            Ok(())
        } else {
            Err(ConstraintError::BelowMinimum)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_sizes() {
        assert!(AtLeast::<3>::new(3).is_ok());
        assert_eq!(AtLeast::<3>::new(0), Err(ConstraintError::BelowMinimum));
        assert_eq!(AtLeast::<1>::new(1).unwrap().into_inner(), 1);
    }
}
