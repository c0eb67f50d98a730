//! Blocks with no inputs that feed values into the graph.

mod boundary;
mod clock;
mod constant;

pub use boundary::BoundarySource;
pub use clock::Clock;
pub use constant::Constant;
