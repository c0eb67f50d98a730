use std::fmt;

use serde::{Deserialize, Serialize};

use super::value::{PortType, Value};

/// Whether a port receives or emits values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Input,
    Output,
}

/// A directed value terminal owned by a block.
///
/// Setting a port's value never propagates it; the flowchart copies output
/// values to connected inputs once per tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Port {
    name: String,
    direction: Direction,
    port_type: PortType,
    value: Option<Value>,
}

impl Port {
    #[must_use]
    pub fn input(name: impl Into<String>, port_type: PortType) -> Self {
        Self::new(name, Direction::Input, port_type)
    }

    #[must_use]
    pub fn output(name: impl Into<String>, port_type: PortType) -> Self {
        Self::new(name, Direction::Output, port_type)
    }

    fn new(name: impl Into<String>, direction: Direction, port_type: PortType) -> Self {
        Self {
            name: name.into(),
            direction,
            port_type,
            value: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    #[must_use]
    pub fn is_input(&self) -> bool {
        self.direction == Direction::Input
    }

    #[must_use]
    pub fn is_output(&self) -> bool {
        self.direction == Direction::Output
    }

    #[must_use]
    pub fn port_type(&self) -> PortType {
        self.port_type
    }

    /// The current value, or `None` if undefined.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn set_value(&mut self, value: Option<Value>) {
        self.value = value;
    }

    /// Returns whether `other` describes the same terminal, ignoring values.
    pub(crate) fn same_shape(&self, other: &Port) -> bool {
        self.name == other.name
            && self.direction == other.direction
            && self.port_type == other.port_type
    }
}

/// Addresses one port of one block in a flowchart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortRef {
    pub block: String,
    pub port: String,
}

impl PortRef {
    #[must_use]
    pub fn new(block: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            block: block.into(),
            port: port.into(),
        }
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.block, self.port)
    }
}
