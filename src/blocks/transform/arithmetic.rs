use std::any::Any;

use serde::{Deserialize, Serialize};

use crate::{
    blocks::{Block, BlockBase, BlockError, BlockKind, BlockState, Position, TickContext},
    flowchart::{Port, PortType, Value},
};

/// A binary arithmetic operator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    #[default]
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operator {
    #[must_use]
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            Self::Add => a + b,
            Self::Subtract => a - b,
            Self::Multiply => a * b,
            Self::Divide => a / b,
        }
    }
}

/// Computes `out = a <op> b`.
///
/// If either input is undefined the output is undefined.
#[derive(Debug, Clone)]
pub struct Arithmetic {
    base: BlockBase,
    operator: Operator,
}

impl Arithmetic {
    #[must_use]
    pub fn new(uid: &str, position: Position) -> Self {
        Self::with_operator(uid, position, Operator::default())
    }

    #[must_use]
    pub fn with_operator(uid: &str, position: Position, operator: Operator) -> Self {
        Self {
            base: BlockBase::new(
                uid,
                position,
                vec![
                    Port::input("a", PortType::Number),
                    Port::input("b", PortType::Number),
                    Port::output("out", PortType::Number),
                ],
            ),
            operator,
        }
    }

    #[must_use]
    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn set_operator(&mut self, operator: Operator) {
        self.operator = operator;
    }

    fn operand(&self, port: &str) -> Result<Option<f64>, BlockError> {
        match self.base.input(port) {
            None => Ok(None),
            Some(value) => value
                .as_number()
                .map(Some)
                .ok_or_else(|| BlockError::structural(format!("input `{port}` is not a number"))),
        }
    }
}

impl Block for Arithmetic {
    fn base(&self) -> &BlockBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BlockBase {
        &mut self.base
    }

    fn kind(&self) -> BlockKind {
        BlockKind::Arithmetic
    }

    fn update_model(&mut self, _ctx: &TickContext<'_>) -> Result<(), BlockError> {
        let out = match (self.operand("a")?, self.operand("b")?) {
            (Some(a), Some(b)) => Some(Value::Number(self.operator.apply(a, b))),
            _ => None,
        };
        self.base.set_output("out", out);
        Ok(())
    }

    fn state(&self) -> BlockState {
        BlockState::Arithmetic {
            operator: self.operator,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
