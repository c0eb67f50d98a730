use thiserror::Error;

use super::{PortRef, PortType};

/// Reasons a connector cannot be created.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("no block with uid `{0}`")]
    UnknownBlock(String),

    #[error("no port `{0}`")]
    UnknownPort(PortRef),

    #[error("`{0}` is not an output port")]
    NotAnOutput(PortRef),

    #[error("`{0}` is not an input port")]
    NotAnInput(PortRef),

    #[error("cannot connect a {output} output to a {input} input")]
    TypeMismatch { output: PortType, input: PortType },

    /// Every input is fed by at most one connector.
    #[error("input `{0}` is already connected")]
    InputOccupied(PortRef),
}

/// Errors raised while rebuilding a flowchart from a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RestoreError {
    #[error("block uid `{0}` appears more than once")]
    DuplicateUid(String),

    #[error("cannot reconnect `{output}` to `{input}`")]
    Connect {
        output: PortRef,
        input: PortRef,
        #[source]
        source: ConnectError,
    },
}
