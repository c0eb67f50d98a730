use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{flowchart::Value, support::boundary::BoundaryCondition};

use super::{
    BlockKind,
    solvers::{OdeSettings, SteadySettings, TransientSettings},
    transform::Operator,
};

/// Kind-specific configuration of a block, as saved and restored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum BlockState {
    Constant {
        value: Option<Value>,
    },
    Clock {
        count: u64,
        paused: bool,
    },
    Boundary {
        condition: BoundaryCondition,
    },
    Arithmetic {
        operator: Operator,
    },
    OdeSolver(OdeSettings),
    TransientSolver(TransientSettings),
    SteadyStateSolver(SteadySettings),
}

impl BlockState {
    #[must_use]
    pub fn kind(&self) -> BlockKind {
        match self {
            Self::Constant { .. } => BlockKind::Constant,
            Self::Clock { .. } => BlockKind::Clock,
            Self::Boundary { .. } => BlockKind::Boundary,
            Self::Arithmetic { .. } => BlockKind::Arithmetic,
            Self::OdeSolver(_) => BlockKind::OdeSolver,
            Self::TransientSolver(_) => BlockKind::TransientSolver,
            Self::SteadyStateSolver(_) => BlockKind::SteadyStateSolver,
        }
    }
}

/// A flat, serializable record of one block.
///
/// `inputs` holds values set directly on input ports, so a restored block
/// sees the same unconnected inputs it had when saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSnapshot {
    pub uid: String,
    pub x: f64,
    pub y: f64,
    #[serde(flatten)]
    pub state: BlockState,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, Value>,
}
