//! Supporting utilities used by blocks and the flowchart.
//!
//! These modules are public because they are useful on their own (for
//! example, evaluating an equation outside a block), but their APIs are not
//! stable.

pub mod boundary;
pub mod constraint;
pub mod environment;
pub mod equation;
pub mod stencil;
