//! The flowchart: blocks, the connectors between them, and the tick loop.
//!
//! A [`Flowchart`] owns every block and connector. Each [`tick`](Flowchart::tick)
//! visits the blocks once, in the order set by its [`SchedulePolicy`]. A
//! visited block computes its outputs, and those values are then copied
//! to every input they are connected to, undefined values included.
//!
//! Errors raised by a block are stored on that block's status and do not
//! interrupt the tick.

mod config;
mod connector;
mod error;
mod port;
mod schedule;
mod snapshot;
mod value;

pub use config::{FlowchartConfig, SchedulePolicy};
pub use connector::{Connector, ConnectorId};
pub use error::{ConnectError, RestoreError};
pub use port::{Direction, Port, PortRef};
pub use snapshot::{ConnectorSnapshot, FlowchartSnapshot};
pub use value::{PortType, Value};

use tracing::{debug, debug_span, warn};

use crate::{
    blocks::{self, Block, BlockKind, Position, TickContext},
    support::environment::{Environment, Variable},
};

/// A directed graph of blocks evaluated one tick at a time.
#[derive(Debug, Default)]
pub struct Flowchart {
    blocks: Vec<Box<dyn Block>>,
    connectors: Vec<Connector>,
    globals: Environment,
    config: FlowchartConfig,
    next_uid: u64,
    next_connector: u64,
}

impl Flowchart {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: FlowchartConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn config(&self) -> &FlowchartConfig {
        &self.config
    }

    pub fn set_schedule(&mut self, schedule: SchedulePolicy) {
        self.config.schedule = schedule;
    }

    /// Creates a block of the named kind at `(x, y)`.
    ///
    /// A uid is generated when none is given. Returns the block's uid, or
    /// `None` if the kind is unknown or the uid is already taken.
    pub fn add_block(&mut self, kind: &str, x: f64, y: f64, uid: Option<&str>) -> Option<String> {
        let kind = match kind.parse::<BlockKind>() {
            Ok(kind) => kind,
            Err(error) => {
                debug!(%error, "block not added");
                return None;
            }
        };
        let uid = match uid {
            Some(uid) => uid.to_owned(),
            None => self.fresh_uid(kind),
        };
        self.insert(kind.create(&uid, Position::new(x, y)))
    }

    /// Adds an already-built block.
    ///
    /// Returns its uid, or `None` if the uid is already taken.
    pub fn insert(&mut self, block: Box<dyn Block>) -> Option<String> {
        if self.contains(block.uid()) {
            debug!(block = block.uid(), "uid already in use");
            return None;
        }
        let uid = block.uid().to_owned();
        debug!(block = %uid, kind = %block.kind(), "block added");
        self.blocks.push(block);
        Some(uid)
    }

    /// Removes a block and every connector touching it.
    pub fn remove_block(&mut self, uid: &str) {
        let Some(index) = self.index_of(uid) else {
            return;
        };
        self.blocks.remove(index);
        let before = self.connectors.len();
        self.connectors.retain(|c| !c.touches(uid));
        debug!(
            block = uid,
            severed = before - self.connectors.len(),
            "block removed"
        );
    }

    /// Duplicates a block's configuration and inputs under a fresh uid.
    ///
    /// Connectors are not copied.
    pub fn copy_block(&mut self, uid: &str) -> Option<String> {
        let mut snapshot = self.block(uid)?.snapshot();
        snapshot.uid = self.fresh_uid(snapshot.state.kind());
        self.insert(blocks::restore(&snapshot))
    }

    #[must_use]
    pub fn contains(&self, uid: &str) -> bool {
        self.index_of(uid).is_some()
    }

    #[must_use]
    pub fn block(&self, uid: &str) -> Option<&dyn Block> {
        self.blocks
            .iter()
            .find(|b| b.uid() == uid)
            .map(AsRef::as_ref)
    }

    /// Returns a block as its concrete type.
    #[must_use]
    pub fn block_as<B: Block>(&self, uid: &str) -> Option<&B> {
        self.block(uid)?.as_any().downcast_ref::<B>()
    }

    /// Blocks in insertion order.
    pub fn blocks(&self) -> impl Iterator<Item = &dyn Block> {
        self.blocks.iter().map(AsRef::as_ref)
    }

    #[must_use]
    pub fn connectors(&self) -> &[Connector] {
        &self.connectors
    }

    /// Connects an output port to an input port.
    ///
    /// Returns `Ok(false)` if the connector already exists, leaving the
    /// flowchart unchanged.
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectError`] if either end is missing, the directions
    /// are wrong, the port types are incompatible, or the input is already
    /// fed by another connector.
    pub fn connect(&mut self, output: PortRef, input: PortRef) -> Result<bool, ConnectError> {
        let source = self.lookup_port(&output)?;
        if !source.is_output() {
            return Err(ConnectError::NotAnOutput(output));
        }
        let target = self.lookup_port(&input)?;
        if !target.is_input() {
            return Err(ConnectError::NotAnInput(input));
        }
        if !source.port_type().is_compatible(target.port_type()) {
            return Err(ConnectError::TypeMismatch {
                output: source.port_type(),
                input: target.port_type(),
            });
        }

        if self.connectors.iter().any(|c| c.joins(&output, &input)) {
            return Ok(false);
        }
        if self.connectors.iter().any(|c| c.input() == &input) {
            return Err(ConnectError::InputOccupied(input));
        }

        let id = ConnectorId(self.next_connector);
        self.next_connector += 1;
        debug!(%id, %output, %input, "connected");
        self.connectors.push(Connector::new(id, output, input));
        Ok(true)
    }

    /// Removes a connector. Returns whether it existed.
    pub fn disconnect(&mut self, id: ConnectorId) -> bool {
        let before = self.connectors.len();
        self.connectors.retain(|c| c.id() != id);
        before != self.connectors.len()
    }

    /// Advances every block by one tick.
    pub fn tick(&mut self) {
        let order = {
            let uids: Vec<&str> = self.blocks.iter().map(|b| b.uid()).collect();
            schedule::order(self.config.schedule, &uids, &self.connectors)
        };
        let _span = debug_span!("tick", blocks = order.len()).entered();

        for index in order {
            let paused = paused_inputs(&self.blocks, &self.connectors, index);
            let ctx = paused
                .into_iter()
                .fold(TickContext::new(&self.globals), TickContext::with_paused_input);

            let block = &mut self.blocks[index];
            match block.update_model(&ctx) {
                Ok(()) => block.base_mut().status_mut().clear_runtime(),
                Err(error) => {
                    warn!(block = block.uid(), %error, "block update failed");
                    block.base_mut().status_mut().record_runtime(error);
                }
            }
            self.propagate(index);
        }
    }

    /// Clears retained state in every block.
    pub fn reset(&mut self) {
        for block in &mut self.blocks {
            block.reset();
        }
        debug!("flowchart reset");
    }

    /// Replaces a solver's equations, severing connectors on ports it loses.
    ///
    /// Returns `false` if the block does not exist or is not a solver.
    pub fn set_equations(&mut self, uid: &str, texts: Vec<String>) -> bool {
        let Some(solver) = self.block_mut(uid).and_then(|b| b.as_solver_mut()) else {
            return false;
        };
        solver.set_equations(texts);
        self.prune_connectors(uid);
        true
    }

    /// Replaces a solver's independent variable names.
    pub fn set_variables(&mut self, uid: &str, names: Vec<String>) -> bool {
        let Some(solver) = self.block_mut(uid).and_then(|b| b.as_solver_mut()) else {
            return false;
        };
        solver.set_variables(names);
        self.prune_connectors(uid);
        true
    }

    /// Runs `f` on a block of concrete type `B`.
    ///
    /// Connectors on ports the block no longer has are severed afterwards.
    /// Returns `None` if there is no such block or it is not a `B`.
    pub fn configure<B: Block, R>(&mut self, uid: &str, f: impl FnOnce(&mut B) -> R) -> Option<R> {
        let block = self.block_mut(uid)?.as_any_mut().downcast_mut::<B>()?;
        let result = f(block);
        self.prune_connectors(uid);
        Some(result)
    }

    /// Sets a port's value directly.
    ///
    /// Returns `false` if the port does not exist or rejects the value's
    /// type. A connected input is overwritten again on the next tick.
    pub fn set_port_value(&mut self, port: &PortRef, value: Option<Value>) -> bool {
        let Some(target) = self
            .block_mut(&port.block)
            .and_then(|b| b.base_mut().port_mut(&port.port))
        else {
            return false;
        };
        if value.as_ref().is_some_and(|v| !target.port_type().accepts(v)) {
            return false;
        }
        target.set_value(value);
        true
    }

    #[must_use]
    pub fn port_value(&self, port: &PortRef) -> Option<&Value> {
        self.block(&port.block)?
            .base()
            .port(&port.port)
            .and_then(Port::value)
    }

    #[must_use]
    pub fn globals(&self) -> &Environment {
        &self.globals
    }

    /// Binds a global variable visible to every solver.
    pub fn set_global(&mut self, name: impl Into<String>, value: impl Into<Variable>) {
        self.globals.insert(name, value);
    }

    pub fn remove_global(&mut self, name: &str) -> Option<Variable> {
        self.globals.remove(name)
    }

    #[must_use]
    pub fn snapshot(&self) -> FlowchartSnapshot {
        FlowchartSnapshot {
            blocks: self.blocks.iter().map(|b| b.snapshot()).collect(),
            connectors: self
                .connectors
                .iter()
                .map(|c| ConnectorSnapshot {
                    output: c.output().clone(),
                    input: c.input().clone(),
                })
                .collect(),
            globals: self.globals.clone(),
            config: self.config,
        }
    }

    /// Rebuilds a flowchart from a snapshot.
    ///
    /// # Errors
    ///
    /// Returns a [`RestoreError`] if two blocks share a uid or a saved
    /// connector no longer fits its ports.
    pub fn restore(snapshot: &FlowchartSnapshot) -> Result<Self, RestoreError> {
        let mut flowchart = Self::with_config(snapshot.config);
        flowchart.globals = snapshot.globals.clone();

        for block in &snapshot.blocks {
            if flowchart.insert(blocks::restore(block)).is_none() {
                return Err(RestoreError::DuplicateUid(block.uid.clone()));
            }
        }
        for saved in &snapshot.connectors {
            flowchart
                .connect(saved.output.clone(), saved.input.clone())
                .map_err(|source| RestoreError::Connect {
                    output: saved.output.clone(),
                    input: saved.input.clone(),
                    source,
                })?;
        }
        Ok(flowchart)
    }

    fn index_of(&self, uid: &str) -> Option<usize> {
        self.blocks.iter().position(|b| b.uid() == uid)
    }

    fn block_mut(&mut self, uid: &str) -> Option<&mut Box<dyn Block>> {
        self.blocks.iter_mut().find(|b| b.uid() == uid)
    }

    fn fresh_uid(&mut self, kind: BlockKind) -> String {
        loop {
            self.next_uid += 1;
            let uid = format!("{kind}-{}", self.next_uid);
            if !self.contains(&uid) {
                return uid;
            }
        }
    }

    fn lookup_port(&self, port: &PortRef) -> Result<&Port, ConnectError> {
        let block = self
            .block(&port.block)
            .ok_or_else(|| ConnectError::UnknownBlock(port.block.clone()))?;
        block
            .base()
            .port(&port.port)
            .ok_or_else(|| ConnectError::UnknownPort(port.clone()))
    }

    /// Copies the block's output values to every input connected to them.
    fn propagate(&mut self, index: usize) {
        let source = self.blocks[index].base();
        let deliveries: Vec<(PortRef, Option<Value>)> = self
            .connectors
            .iter()
            .filter(|c| c.output().block == source.uid())
            .map(|c| {
                let value = source.port(&c.output().port).and_then(Port::value).cloned();
                (c.input().clone(), value)
            })
            .collect();

        for (input, value) in deliveries {
            if let Some(port) = self
                .block_mut(&input.block)
                .and_then(|b| b.base_mut().port_mut(&input.port))
                .filter(|p| p.is_input())
            {
                port.set_value(value);
            }
        }
    }

    /// Drops connectors whose end on `uid` no longer matches a port.
    fn prune_connectors(&mut self, uid: &str) {
        let Some(block) = self.block(uid) else {
            return;
        };
        let base = block.base();
        let dangling: Vec<ConnectorId> = self
            .connectors
            .iter()
            .filter(|c| {
                let lost_output = c.output().block == uid
                    && !base.port(&c.output().port).is_some_and(Port::is_output);
                let lost_input = c.input().block == uid
                    && !base.port(&c.input().port).is_some_and(Port::is_input);
                lost_output || lost_input
            })
            .map(Connector::id)
            .collect();

        if !dangling.is_empty() {
            debug!(block = uid, severed = dangling.len(), "connectors pruned");
            self.connectors.retain(|c| !dangling.contains(&c.id()));
        }
    }
}

/// Names of the block's inputs fed by a paused upstream block.
fn paused_inputs(blocks: &[Box<dyn Block>], connectors: &[Connector], index: usize) -> Vec<String> {
    let uid = blocks[index].uid();
    connectors
        .iter()
        .filter(|c| c.input().block == uid)
        .filter(|c| {
            blocks
                .iter()
                .find(|b| b.uid() == c.output().block)
                .and_then(|b| b.is_paused())
                == Some(true)
        })
        .map(|c| c.input().port.clone())
        .collect()
}
