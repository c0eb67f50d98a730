use serde::{Deserialize, Serialize};

use crate::flowchart::{Port, Value};

use super::Status;

/// A block's position on the canvas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// State shared by every block: identity, geometry, ports and status.
#[derive(Debug, Clone)]
pub struct BlockBase {
    uid: String,
    position: Position,
    ports: Vec<Port>,
    status: Status,
}

impl BlockBase {
    #[must_use]
    pub fn new(uid: impl Into<String>, position: Position, ports: Vec<Port>) -> Self {
        Self {
            uid: uid.into(),
            position,
            ports,
            status: Status::default(),
        }
    }

    #[must_use]
    pub fn uid(&self) -> &str {
        &self.uid
    }

    #[must_use]
    pub fn position(&self) -> Position {
        self.position
    }

    pub fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    #[must_use]
    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    #[must_use]
    pub fn port(&self, name: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.name() == name)
    }

    pub fn port_mut(&mut self, name: &str) -> Option<&mut Port> {
        self.ports.iter_mut().find(|p| p.name() == name)
    }

    /// The value on an input port, if the port exists and is defined.
    #[must_use]
    pub fn input(&self, name: &str) -> Option<&Value> {
        self.port(name)
            .filter(|p| p.is_input())
            .and_then(Port::value)
    }

    /// Sets an output port's value. Unknown names are ignored.
    pub fn set_output(&mut self, name: &str, value: Option<Value>) {
        if let Some(port) = self.port_mut(name).filter(|p| p.is_output()) {
            port.set_value(value);
        }
    }

    /// Marks every output undefined.
    pub fn clear_outputs(&mut self) {
        for port in self.ports.iter_mut().filter(|p| p.is_output()) {
            port.set_value(None);
        }
    }

    /// Replaces the port list.
    ///
    /// Ports that survive with the same name, direction and type keep their
    /// values. Connectors on ports that disappear are severed by the
    /// flowchart in the same operation.
    pub fn replace_ports(&mut self, mut ports: Vec<Port>) {
        for port in &mut ports {
            if let Some(old) = self.ports.iter().find(|old| old.same_shape(port)) {
                port.set_value(old.value().cloned());
            }
        }
        self.ports = ports;
    }

    #[must_use]
    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn status_mut(&mut self) -> &mut Status {
        &mut self.status
    }
}
