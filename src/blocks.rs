//! Blocks: the nodes of a flowchart.
//!
//! Every block owns a [`BlockBase`] (uid, position, ports, status) and
//! implements [`Block`]. Blocks come in three families:
//!
//! - [`sources`]: constants, clocks and boundary-condition sources
//! - [`transform`]: stateless arithmetic on numbers
//! - [`solvers`]: equation-driven numerical integrators and relaxation solvers
//!
//! A block never talks to another block. It reads its own input ports,
//! writes its own output ports, and the [`Flowchart`](crate::flowchart::Flowchart)
//! moves values between them.

mod base;
mod error;
mod snapshot;
mod status;

pub mod solvers;
pub mod sources;
pub mod transform;

pub use base::{BlockBase, Position};
pub use error::{BlockError, UnknownKind};
pub use snapshot::{BlockSnapshot, BlockState};
pub use status::Status;

use std::{any::Any, collections::BTreeSet, fmt, str::FromStr};

use crate::{flowchart::Port, support::environment::Environment};

use solvers::{OdeSolver, SolverBlock, SteadyStateSolver, TransientSolver};
use sources::{BoundarySource, Clock, Constant};
use transform::Arithmetic;

/// A node in the dataflow graph.
pub trait Block: Any + fmt::Debug {
    fn base(&self) -> &BlockBase;

    fn base_mut(&mut self) -> &mut BlockBase;

    fn kind(&self) -> BlockKind;

    /// Computes outputs from the current input values.
    ///
    /// A missing required input is not an error: the block marks its outputs
    /// undefined and returns `Ok`.
    ///
    /// # Errors
    ///
    /// Returns a [`BlockError`] if the block cannot compute. The flowchart
    /// records it in the block's [`Status`] and continues the tick.
    fn update_model(&mut self, ctx: &TickContext<'_>) -> Result<(), BlockError>;

    /// Kind-specific configuration, for snapshots and copies.
    fn state(&self) -> BlockState;

    /// Clears retained state so the next tick starts fresh.
    fn reset(&mut self) {}

    /// `Some` for blocks that can be paused, such as clocks.
    fn is_paused(&self) -> Option<bool> {
        None
    }

    fn as_solver_mut(&mut self) -> Option<&mut dyn SolverBlock> {
        None
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn uid(&self) -> &str {
        self.base().uid()
    }

    fn ports(&self) -> &[Port] {
        self.base().ports()
    }

    fn status(&self) -> &Status {
        self.base().status()
    }

    fn snapshot(&self) -> BlockSnapshot {
        let base = self.base();
        let position = base.position();
        let inputs = base
            .ports()
            .iter()
            .filter(|p| p.is_input())
            .filter_map(|p| p.value().map(|v| (p.name().to_owned(), v.clone())))
            .collect();
        BlockSnapshot {
            uid: base.uid().to_owned(),
            x: position.x,
            y: position.y,
            state: self.state(),
            inputs,
        }
    }
}

/// The block kinds a flowchart can create by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Constant,
    Clock,
    Boundary,
    Arithmetic,
    OdeSolver,
    TransientSolver,
    SteadyStateSolver,
}

impl BlockKind {
    pub const ALL: [BlockKind; 7] = [
        Self::Constant,
        Self::Clock,
        Self::Boundary,
        Self::Arithmetic,
        Self::OdeSolver,
        Self::TransientSolver,
        Self::SteadyStateSolver,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Constant => "constant",
            Self::Clock => "clock",
            Self::Boundary => "boundary",
            Self::Arithmetic => "arithmetic",
            Self::OdeSolver => "ode-solver",
            Self::TransientSolver => "transient-solver",
            Self::SteadyStateSolver => "steady-state-solver",
        }
    }

    /// Builds a default-configured block of this kind.
    #[must_use]
    pub fn create(self, uid: &str, position: Position) -> Box<dyn Block> {
        match self {
            Self::Constant => Box::new(Constant::new(uid, position)),
            Self::Clock => Box::new(Clock::new(uid, position)),
            Self::Boundary => Box::new(BoundarySource::new(uid, position)),
            Self::Arithmetic => Box::new(Arithmetic::new(uid, position)),
            Self::OdeSolver => Box::new(OdeSolver::new(uid, position)),
            Self::TransientSolver => Box::new(TransientSolver::new(uid, position)),
            Self::SteadyStateSolver => Box::new(SteadyStateSolver::new(uid, position)),
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownKind(s.to_owned()))
    }
}

/// Rebuilds a block from its saved state.
///
/// Input values recorded in the snapshot are written back onto the
/// rebuilt ports; values for ports that no longer exist are dropped.
#[must_use]
pub fn restore(snapshot: &BlockSnapshot) -> Box<dyn Block> {
    let uid = snapshot.uid.as_str();
    let position = Position::new(snapshot.x, snapshot.y);
    let mut block: Box<dyn Block> = match &snapshot.state {
        BlockState::Constant { value } => Box::new(Constant::with_value(uid, position, value.clone())),
        BlockState::Clock { count, paused } => {
            Box::new(Clock::with_state(uid, position, *count, *paused))
        }
        BlockState::Boundary { condition } => {
            Box::new(BoundarySource::with_condition(uid, position, *condition))
        }
        BlockState::Arithmetic { operator } => {
            Box::new(Arithmetic::with_operator(uid, position, *operator))
        }
        BlockState::OdeSolver(settings) => {
            Box::new(OdeSolver::with_settings(uid, position, settings.clone()))
        }
        BlockState::TransientSolver(settings) => {
            Box::new(TransientSolver::with_settings(uid, position, settings.clone()))
        }
        BlockState::SteadyStateSolver(settings) => {
            Box::new(SteadyStateSolver::with_settings(uid, position, settings.clone()))
        }
    };

    let base = block.base_mut();
    for (name, value) in &snapshot.inputs {
        if let Some(port) = base.port_mut(name).filter(|p| p.is_input()) {
            port.set_value(Some(value.clone()));
        }
    }
    block
}

/// What a block can see while it updates.
#[derive(Debug, Clone)]
pub struct TickContext<'a> {
    globals: &'a Environment,
    paused_inputs: BTreeSet<String>,
}

impl<'a> TickContext<'a> {
    #[must_use]
    pub fn new(globals: &'a Environment) -> Self {
        Self {
            globals,
            paused_inputs: BTreeSet::new(),
        }
    }

    /// Marks an input as fed by a paused upstream block.
    #[must_use]
    pub fn with_paused_input(mut self, port: impl Into<String>) -> Self {
        self.paused_inputs.insert(port.into());
        self
    }

    /// The flowchart's global variables.
    #[must_use]
    pub fn globals(&self) -> &'a Environment {
        self.globals
    }

    /// Returns whether the block feeding `port` reports itself paused.
    #[must_use]
    pub fn is_upstream_paused(&self, port: &str) -> bool {
        self.paused_inputs.contains(port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::flowchart::Value;

    #[test]
    fn kinds_round_trip_through_names() {
        for kind in BlockKind::ALL {
            assert_eq!(kind.as_str().parse::<BlockKind>(), Ok(kind));
        }
        assert_eq!(
            "scope".parse::<BlockKind>(),
            Err(UnknownKind("scope".into()))
        );
    }

    #[test]
    fn created_blocks_report_their_kind() {
        for kind in BlockKind::ALL {
            let block = kind.create("b1", Position::new(1.0, 2.0));
            assert_eq!(block.kind(), kind);
            assert_eq!(block.state().kind(), kind);
            assert_eq!(block.uid(), "b1");
        }
    }

    #[test]
    fn restore_rebuilds_inputs() {
        let ode = BlockKind::OdeSolver.create("ode", Position::default());
        let mut snapshot = ode.snapshot();
        snapshot.inputs.insert("H".into(), Value::Number(0.5));
        snapshot.inputs.insert("missing".into(), Value::Number(1.0));

        let restored = restore(&snapshot);
        assert_eq!(restored.base().input("H"), Some(&Value::Number(0.5)));
        assert_eq!(restored.snapshot().inputs.len(), 1);
    }
}
