//! Stateless blocks that combine their inputs.

mod arithmetic;

pub use arithmetic::{Arithmetic, Operator};
