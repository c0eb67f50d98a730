use serde::{Deserialize, Serialize};

use crate::{blocks::BlockSnapshot, support::environment::Environment};

use super::{FlowchartConfig, PortRef};

/// A saved connector; its id is reassigned on restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorSnapshot {
    pub output: PortRef,
    pub input: PortRef,
}

/// A flat, serializable record of a whole flowchart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowchartSnapshot {
    pub blocks: Vec<BlockSnapshot>,
    pub connectors: Vec<ConnectorSnapshot>,
    #[serde(default)]
    pub globals: Environment,
    #[serde(default)]
    pub config: FlowchartConfig,
}
