//! # Twinflow
//!
//! A dataflow execution engine for digital-twin simulations, with
//! equation-driven numerical solver blocks.
//!
//! A [`Flowchart`] holds [`Block`]s joined by connectors from output ports
//! to input ports. Every tick visits each block once: it reads its inputs,
//! computes its outputs, and the flowchart copies those outputs downstream.
//!
//! ## Crate layout
//!
//! - [`flowchart`]: The graph, its ports and values, scheduling and snapshots.
//! - [`blocks`]: Sources, transforms, and the ODE, transient and steady-state
//!   solver blocks.
//! - [`support`]: Equation parsing and evaluation, finite-difference stencils,
//!   boundary conditions and value constraints used by the blocks.
//!
//! Each solver keeps its numerical kernel in a private `core` module exposed
//! through a [`twine_core::Model`], so the block itself only handles ports,
//! configuration and status.
//!
//! ## Support code lifecycle
//!
//! Modules in [`support`] are part of the public API because they're useful,
//! but their APIs are not stable. Breaking changes may occur as needed.
//!
//! # Example
//!
//! ```
//! use twinflow::flowchart::{Flowchart, PortRef, Value};
//!
//! let mut flowchart = Flowchart::new();
//! let ode = flowchart.add_block("ode-solver", 0.0, 0.0, None).unwrap();
//! flowchart.set_equations(&ode, vec!["x' = 2".into()]);
//! flowchart.set_port_value(&PortRef::new(&ode, "N"), Some(Value::Number(0.0)));
//! flowchart.set_port_value(&PortRef::new(&ode, "H"), Some(Value::Number(0.5)));
//!
//! flowchart.tick();
//! let x = flowchart.port_value(&PortRef::new(&ode, "x"));
//! assert_eq!(x, Some(&Value::Number(1.0)));
//! ```

pub mod blocks;
pub mod flowchart;
pub mod support;

pub use blocks::{Block, BlockKind};
pub use flowchart::{Flowchart, PortRef, Value};
