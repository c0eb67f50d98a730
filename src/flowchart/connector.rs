use std::fmt;

use serde::{Deserialize, Serialize};

use super::port::PortRef;

/// Identifies a connector within its flowchart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectorId(pub(crate) u64);

impl fmt::Display for ConnectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A directed edge from one output port to one input port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connector {
    id: ConnectorId,
    output: PortRef,
    input: PortRef,
}

impl Connector {
    pub(crate) fn new(id: ConnectorId, output: PortRef, input: PortRef) -> Self {
        Self { id, output, input }
    }

    #[must_use]
    pub fn id(&self) -> ConnectorId {
        self.id
    }

    /// The upstream output port.
    #[must_use]
    pub fn output(&self) -> &PortRef {
        &self.output
    }

    /// The downstream input port.
    #[must_use]
    pub fn input(&self) -> &PortRef {
        &self.input
    }

    /// Returns whether either end belongs to the block.
    #[must_use]
    pub fn touches(&self, uid: &str) -> bool {
        self.output.block == uid || self.input.block == uid
    }

    #[must_use]
    pub fn joins(&self, output: &PortRef, input: &PortRef) -> bool {
        &self.output == output && &self.input == input
    }
}
