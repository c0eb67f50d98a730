//! Finite-difference stencils.
//!
//! Each stencil reads grid values through a `sample` closure indexed by
//! offset from the point being evaluated. Callers decide how offsets past
//! the grid edge resolve; the solvers in this crate clamp them to the
//! nearest edge point.

/// Central first derivative, `(v[+1] - v[-1]) / 2h`.
#[inline]
pub fn first(sample: impl Fn(isize) -> f64, h: f64) -> f64 {
    (sample(1) - sample(-1)) / (2.0 * h)
}

/// Central second derivative, `(v[+1] + v[-1] - 2v[0]) / h²`.
#[inline]
pub fn second(sample: impl Fn(isize) -> f64, h: f64) -> f64 {
    (sample(1) + sample(-1) - 2.0 * sample(0)) / (h * h)
}

/// Central third derivative over five points,
/// `(v[+2] - 2v[+1] + 2v[-1] - v[-2]) / 2h³`.
#[inline]
pub fn third(sample: impl Fn(isize) -> f64, h: f64) -> f64 {
    (sample(2) - 2.0 * sample(1) + 2.0 * sample(-1) - sample(-2)) / (2.0 * h * h * h)
}

/// Mixed second derivative from the four diagonal neighbours,
/// `(v[+1,+1] - v[+1,-1] - v[-1,+1] + v[-1,-1]) / 4hxhy`.
#[inline]
pub fn mixed(sample: impl Fn(isize, isize) -> f64, hx: f64, hy: f64) -> f64 {
    (sample(1, 1) - sample(1, -1) - sample(-1, 1) + sample(-1, -1)) / (4.0 * hx * hy)
}

/// Offsets `index` by `offset`, clamping the result to `0..len`.
#[inline]
#[must_use]
pub fn clamp_offset(index: usize, offset: isize, len: usize) -> usize {
    let last = len.saturating_sub(1);
    index.saturating_add_signed(offset).min(last)
}
