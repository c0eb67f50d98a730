use std::any::Any;

use crate::{
    blocks::{Block, BlockBase, BlockError, BlockKind, BlockState, Position, TickContext},
    flowchart::{Port, PortType, Value},
};

/// Emits a fixed value on `out`.
#[derive(Debug, Clone)]
pub struct Constant {
    base: BlockBase,
    value: Option<Value>,
}

impl Constant {
    #[must_use]
    pub fn new(uid: &str, position: Position) -> Self {
        Self::with_value(uid, position, Some(Value::Number(0.0)))
    }

    #[must_use]
    pub fn with_value(uid: &str, position: Position, value: Option<Value>) -> Self {
        Self {
            base: BlockBase::new(uid, position, vec![Port::output("out", PortType::Any)]),
            value,
        }
    }

    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn set_value(&mut self, value: Option<Value>) {
        self.value = value;
    }
}

impl Block for Constant {
    fn base(&self) -> &BlockBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BlockBase {
        &mut self.base
    }

    fn kind(&self) -> BlockKind {
        BlockKind::Constant
    }

    fn update_model(&mut self, _ctx: &TickContext<'_>) -> Result<(), BlockError> {
        self.base.set_output("out", self.value.clone());
        Ok(())
    }

    fn state(&self) -> BlockState {
        BlockState::Constant {
            value: self.value.clone(),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
