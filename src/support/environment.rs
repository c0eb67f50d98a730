//! Global variables shared by every solver evaluation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::support::equation::{Binding, Scope};

/// A global variable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Variable {
    Number(f64),
    Array(Vec<f64>),
}

impl From<f64> for Variable {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<Vec<f64>> for Variable {
    fn from(values: Vec<f64>) -> Self {
        Self::Array(values)
    }
}

/// A read-only mapping of global variable names to values.
///
/// The flowchart owns one environment and lends it to every block during a
/// tick. Solver scopes fall back to it for any name they do not bind
/// themselves, so local unknowns shadow globals of the same name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Environment {
    variables: BTreeMap<String, Variable>,
}

impl Environment {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the environment with one more variable bound.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Variable>) -> Self {
        self.insert(name, value);
        self
    }

    /// Binds a variable, returning the previous value if there was one.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Variable>) -> Option<Variable> {
        self.variables.insert(name.into(), value.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<Variable> {
        self.variables.remove(name)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Variable)> {
        self.variables.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

impl Scope for Environment {
    fn lookup(&self, name: &str) -> Option<Binding<'_>> {
        self.variables.get(name).map(|value| match value {
            Variable::Number(n) => Binding::Scalar(*n),
            Variable::Array(values) => Binding::Array(values),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    use crate::support::equation::parse_expr;

    #[test]
    fn globals_feed_expressions() {
        let env = Environment::new()
            .with("g", 9.81)
            .with("masses", vec![1.0, 2.0]);

        let expr = parse_expr("g * masses[1]").unwrap();
        assert_relative_eq!(expr.evaluate(&env).unwrap(), 19.62);
        assert_eq!(env.len(), 2);
    }

    #[test]
    fn serializes_as_plain_map() {
        let env = Environment::new().with("k", 2.0).with("v", vec![1.0]);
        let json = serde_json::to_string(&env).unwrap();
        assert_eq!(json, r#"{"k":2.0,"v":[1.0]}"#);
        let back: Environment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, env);
    }
}
