use serde::{Deserialize, Serialize};

/// Order in which a tick visits blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchedulePolicy {
    /// Blocks run in the order they were added.
    ///
    /// Feedback cycles need no special handling: a block upstream of its
    /// producer in this order sees the producer's value from the previous
    /// tick, so an acyclic chain of length `L` settles within `L` ticks.
    #[default]
    InsertionOrder,

    /// Producers run before their consumers, so an acyclic graph settles in
    /// a single tick. Blocks on cycles run last, in insertion order.
    DependencyOrder,
}

/// Flowchart configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowchartConfig {
    pub schedule: SchedulePolicy,
}
