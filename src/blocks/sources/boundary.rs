use std::any::Any;

use crate::{
    blocks::{Block, BlockBase, BlockError, BlockKind, BlockState, Position, TickContext},
    flowchart::{Port, PortType, Value},
    support::boundary::BoundaryCondition,
};

/// Emits a four-sided boundary condition on `out`, for wiring into the
/// `bc:<field>` inputs of the finite-difference solvers.
#[derive(Debug, Clone)]
pub struct BoundarySource {
    base: BlockBase,
    condition: BoundaryCondition,
}

impl BoundarySource {
    #[must_use]
    pub fn new(uid: &str, position: Position) -> Self {
        Self::with_condition(uid, position, BoundaryCondition::default())
    }

    #[must_use]
    pub fn with_condition(uid: &str, position: Position, condition: BoundaryCondition) -> Self {
        Self {
            base: BlockBase::new(uid, position, vec![Port::output("out", PortType::Boundary)]),
            condition,
        }
    }

    #[must_use]
    pub fn condition(&self) -> &BoundaryCondition {
        &self.condition
    }

    pub fn set_condition(&mut self, condition: BoundaryCondition) {
        self.condition = condition;
    }
}

impl Block for BoundarySource {
    fn base(&self) -> &BlockBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BlockBase {
        &mut self.base
    }

    fn kind(&self) -> BlockKind {
        BlockKind::Boundary
    }

    fn update_model(&mut self, _ctx: &TickContext<'_>) -> Result<(), BlockError> {
        self.base
            .set_output("out", Some(Value::Boundary(self.condition)));
        Ok(())
    }

    fn state(&self) -> BlockState {
        BlockState::Boundary {
            condition: self.condition,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
