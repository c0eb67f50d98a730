use serde::{Deserialize, Serialize};

use crate::support::boundary::BoundaryCondition;

/// A value carried by a port.
///
/// Ports hold `Option<Value>`; `None` means the value is undefined, which
/// is how blocks signal that they have nothing to emit yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Number(f64),
    Boolean(bool),
    NumberArray(Vec<f64>),
    Boundary(BoundaryCondition),
}

impl Value {
    /// Reads the value as a number; booleans read as `1` or `0`.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::NumberArray(_) | Self::Boundary(_) => None,
        }
    }

    /// Reads the value as a boolean; numbers are true when non-zero.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            Self::Number(n) => Some(*n != 0.0),
            Self::NumberArray(_) | Self::Boundary(_) => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&[f64]> {
        match self {
            Self::NumberArray(values) => Some(values),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_boundary(&self) -> Option<&BoundaryCondition> {
        match self {
            Self::Boundary(bc) => Some(bc),
            _ => None,
        }
    }

    /// The port type that naturally carries this value.
    #[must_use]
    pub fn port_type(&self) -> PortType {
        match self {
            Self::Number(_) => PortType::Number,
            Self::Boolean(_) => PortType::Boolean,
            Self::NumberArray(_) => PortType::NumberArray,
            Self::Boundary(_) => PortType::Boundary,
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<Vec<f64>> for Value {
    fn from(values: Vec<f64>) -> Self {
        Self::NumberArray(values)
    }
}

impl From<BoundaryCondition> for Value {
    fn from(bc: BoundaryCondition) -> Self {
        Self::Boundary(bc)
    }
}

/// The kind of value a port declares it carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortType {
    #[default]
    Any,
    Number,
    Boolean,
    NumberArray,
    Boundary,
}

impl PortType {
    /// Returns whether a connector may join ports of these two types.
    ///
    /// `Any` matches everything, and numbers and booleans convert freely.
    #[must_use]
    pub fn is_compatible(self, other: PortType) -> bool {
        use PortType::{Any, Boolean, Number};
        match (self, other) {
            (Any, _) | (_, Any) => true,
            (Number | Boolean, Number | Boolean) => true,
            (a, b) => a == b,
        }
    }

    /// Returns whether a value may be stored in a port of this type.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        self.is_compatible(value.port_type())
    }
}

impl std::fmt::Display for PortType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Any => "any",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::NumberArray => "number array",
            Self::Boundary => "boundary",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_and_booleans_convert() {
        assert_eq!(Value::Boolean(true).as_number(), Some(1.0));
        assert_eq!(Value::Number(0.0).as_bool(), Some(false));
        assert_eq!(Value::from(vec![1.0]).as_number(), None);
        assert!(PortType::Number.is_compatible(PortType::Boolean));
        assert!(PortType::Any.is_compatible(PortType::Boundary));
        assert!(!PortType::NumberArray.is_compatible(PortType::Number));
    }

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_value(Value::Number(2.5)).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "number", "value": 2.5 }));

        let back: Value = serde_json::from_value(serde_json::json!({
            "type": "number_array",
            "value": [1.0, 2.0]
        }))
        .unwrap();
        assert_eq!(back, Value::NumberArray(vec![1.0, 2.0]));
    }
}
