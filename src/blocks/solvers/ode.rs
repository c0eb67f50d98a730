//! ODE integrator block.

mod core;

use std::any::Any;

use serde::{Deserialize, Serialize};
use tracing::trace;
use twine_core::Model;

use crate::{
    blocks::{Block, BlockBase, BlockError, BlockKind, BlockState, Position, TickContext},
    flowchart::{Port, PortType, Value},
    support::{
        constraint::{NonNegative, StrictlyPositive},
        equation::Equation,
    },
};

use self::core::{OdeState, OdeStep, OdeSystem, StepInput, Unknown};
use super::{EquationSet, SolverBlock, constrained, number};

/// Ports an unknown may not be named after.
const RESERVED: [&str; 3] = ["T", "N", "H"];

/// Integration scheme for an [`OdeSolver`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OdeMethod {
    /// Forward Euler.
    Euler,
    /// Classic fourth-order Runge-Kutta.
    #[default]
    Rk4,
    /// Symplectic velocity Verlet for second-order unknowns. First-order
    /// unknowns fall back to Euler.
    VelocityVerlet,
}

/// Saved configuration of an [`OdeSolver`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OdeSettings {
    pub equations: Vec<String>,

    /// Independent variables; the first names the time variable.
    pub variables: Vec<String>,

    pub method: OdeMethod,

    /// Starting value per unknown, in declaration order. Missing entries are 0.
    pub initial_values: Vec<f64>,

    /// Starting velocity per second-order unknown. Missing entries are 0.
    pub initial_rates: Vec<f64>,
}

impl Default for OdeSettings {
    fn default() -> Self {
        Self {
            equations: Vec::new(),
            variables: vec!["t".to_owned()],
            method: OdeMethod::default(),
            initial_values: Vec::new(),
            initial_rates: Vec::new(),
        }
    }
}

/// Integrates ordinary differential equations one step per tick.
///
/// Inputs are `N` (step index) and `H` (step size). Outputs are `T = N·H`,
/// then one output per unknown in declaration order.
///
/// The state is retained between ticks. Each tick advances it by one step of
/// `H` taken from time `N·H`, starting from the configured initial values
/// after construction or [`reset`](Block::reset). Algebraic unknowns are
/// evaluated at the end of the step.
#[derive(Debug, Clone)]
pub struct OdeSolver {
    base: BlockBase,
    settings: OdeSettings,
    system: OdeSystem,
    state: Option<OdeState>,
}

impl OdeSolver {
    #[must_use]
    pub fn new(uid: &str, position: Position) -> Self {
        Self::with_settings(uid, position, OdeSettings::default())
    }

    #[must_use]
    pub fn with_settings(uid: &str, position: Position, settings: OdeSettings) -> Self {
        let mut solver = Self {
            base: BlockBase::new(uid, position, Vec::new()),
            settings,
            system: OdeSystem::default(),
            state: None,
        };
        solver.rebuild();
        solver
    }

    #[must_use]
    pub fn settings(&self) -> &OdeSettings {
        &self.settings
    }

    #[must_use]
    pub fn method(&self) -> OdeMethod {
        self.settings.method
    }

    pub fn set_method(&mut self, method: OdeMethod) {
        self.settings.method = method;
    }

    /// Sets the starting values and restarts integration.
    pub fn set_initial_values(&mut self, values: Vec<f64>) {
        self.settings.initial_values = values;
        self.state = None;
    }

    /// Sets the starting velocities and restarts integration.
    pub fn set_initial_rates(&mut self, rates: Vec<f64>) {
        self.settings.initial_rates = rates;
        self.state = None;
    }

    /// Names of the unknowns being integrated, in output order.
    pub fn unknowns(&self) -> impl Iterator<Item = &str> {
        self.system.unknowns().iter().map(|u| u.name.as_str())
    }

    fn time_variable(&self) -> &str {
        self.settings.variables.first().map_or("t", String::as_str)
    }

    /// Re-parses equations, regenerates ports and clears retained state.
    fn rebuild(&mut self) {
        let mut set = EquationSet::parse(&self.settings.equations);
        let mut errors = set.take_errors();
        let time = self.time_variable().to_owned();

        let mut unknowns: Vec<Unknown> = Vec::new();
        for equation in set.parsed() {
            match classify(equation, &time, &unknowns) {
                Ok(unknown) => unknowns.push(unknown),
                Err(e) => errors.push(e),
            }
        }

        let mut ports = vec![
            Port::input("N", PortType::Number),
            Port::input("H", PortType::Number),
            Port::output("T", PortType::Number),
        ];
        ports.extend(
            unknowns
                .iter()
                .map(|u| Port::output(u.name.as_str(), PortType::Number)),
        );

        self.system = OdeSystem::new(time, unknowns);
        self.base.replace_ports(ports);
        self.base.status_mut().set_configuration_errors(errors);
        self.state = None;
    }

    fn initial_state(&self, time: f64) -> OdeState {
        let n = self.system.unknowns().len();
        let pick = |values: &[f64]| (0..n).map(|k| values.get(k).copied().unwrap_or(0.0)).collect();
        OdeState {
            time,
            values: pick(&self.settings.initial_values),
            rates: pick(&self.settings.initial_rates),
        }
    }

    fn publish(&mut self, time: f64, state: &OdeState) {
        self.base.set_output("T", Some(Value::Number(time)));
        for (unknown, value) in self.system.unknowns().iter().zip(&state.values) {
            self.base
                .set_output(&unknown.name, Some(Value::Number(*value)));
        }
    }
}

/// Turns a parsed equation into an unknown, checking it fits the system.
fn classify(equation: &Equation, time: &str, existing: &[Unknown]) -> Result<Unknown, BlockError> {
    let text = equation.text();
    let Some((name, order)) = equation.ode_unknown() else {
        return Err(BlockError::structural(format!(
            "left-hand side of `{text}` must be `x`, `x'` or `x''`"
        )));
    };
    if order > 2 {
        return Err(BlockError::structural(format!(
            "`{text}` is order {order}; at most order 2 is supported"
        )));
    }
    if RESERVED.contains(&name) || name == time {
        return Err(BlockError::structural(format!(
            "`{name}` is reserved and cannot be an unknown"
        )));
    }
    if existing.iter().any(|u| u.name == name) {
        return Err(BlockError::structural(format!(
            "`{name}` is defined more than once"
        )));
    }
    Ok(Unknown {
        name: name.to_owned(),
        order,
        equation: equation.clone(),
    })
}

impl SolverBlock for OdeSolver {
    fn set_equations(&mut self, texts: Vec<String>) {
        self.settings.equations = texts;
        self.rebuild();
    }

    fn equations(&self) -> &[String] {
        &self.settings.equations
    }

    fn set_variables(&mut self, names: Vec<String>) {
        self.settings.variables = names;
        self.rebuild();
    }

    fn variables(&self) -> &[String] {
        &self.settings.variables
    }
}

impl Block for OdeSolver {
    fn base(&self) -> &BlockBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BlockBase {
        &mut self.base
    }

    fn kind(&self) -> BlockKind {
        BlockKind::OdeSolver
    }

    fn update_model(&mut self, ctx: &TickContext<'_>) -> Result<(), BlockError> {
        if self.system.is_empty() {
            self.base.clear_outputs();
            return Ok(());
        }
        let (Some(n), Some(h)) = (number(&self.base, "N")?, number(&self.base, "H")?) else {
            self.base.clear_outputs();
            return Ok(());
        };
        let h = constrained::<StrictlyPositive>("H", h)?;
        let n = constrained::<NonNegative>("N", n)?;

        let time = n * h;
        let mut state = match &self.state {
            Some(state) => state.clone(),
            None => self.initial_state(time),
        };
        state.time = time;
        let step = OdeStep::new(&self.system, ctx.globals(), self.settings.method);
        let next = step.call(&StepInput { state, h })?;
        trace!(block = self.base.uid(), time = next.time, "ode step");

        self.publish(time, &next);
        self.state = Some(next);
        Ok(())
    }

    fn state(&self) -> BlockState {
        BlockState::OdeSolver(self.settings.clone())
    }

    fn reset(&mut self) {
        self.state = None;
    }

    fn as_solver_mut(&mut self) -> Option<&mut dyn SolverBlock> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    use crate::support::environment::Environment;

    fn solver(equations: &[&str]) -> OdeSolver {
        let mut solver = OdeSolver::new("ode", Position::default());
        solver.set_equations(equations.iter().map(|s| (*s).to_owned()).collect());
        solver
    }

    fn set_input(solver: &mut OdeSolver, port: &str, value: f64) {
        solver
            .base_mut()
            .port_mut(port)
            .unwrap()
            .set_value(Some(Value::Number(value)));
    }

    fn output(solver: &OdeSolver, port: &str) -> Option<f64> {
        solver
            .base()
            .port(port)
            .and_then(Port::value)
            .and_then(Value::as_number)
    }

    #[test]
    fn rk4_decay_over_one_hundred_ticks() {
        let globals = Environment::new();
        let ctx = TickContext::new(&globals);
        let mut ode = solver(&["x' = -x"]);
        ode.set_initial_values(vec![1.0]);
        set_input(&mut ode, "N", 0.0);
        set_input(&mut ode, "H", 0.01);

        for _ in 0..100 {
            ode.update_model(&ctx).unwrap();
        }
        assert_relative_eq!(output(&ode, "x").unwrap(), (-1.0_f64).exp(), epsilon = 1e-3);
        assert_eq!(output(&ode, "T"), Some(0.0));
    }

    #[test]
    fn time_output_is_step_index_times_step_size() {
        let globals = Environment::new();
        let ctx = TickContext::new(&globals);
        let mut ode = solver(&["x' = 1"]);
        set_input(&mut ode, "N", 5.0);
        set_input(&mut ode, "H", 1.0);

        for expected_x in [1.0, 2.0, 3.0] {
            ode.update_model(&ctx).unwrap();
            assert_eq!(output(&ode, "T"), Some(5.0));
            assert_relative_eq!(output(&ode, "x").unwrap(), expected_x);
        }

        set_input(&mut ode, "N", 0.0);
        ode.update_model(&ctx).unwrap();
        assert_eq!(output(&ode, "T"), Some(0.0));
    }

    #[test]
    fn steps_start_at_step_index_time() {
        let globals = Environment::new();
        let ctx = TickContext::new(&globals);
        let mut ode = solver(&["x' = t"]);
        set_input(&mut ode, "N", 10.0);
        set_input(&mut ode, "H", 0.5);

        ode.update_model(&ctx).unwrap();
        assert_relative_eq!(output(&ode, "T").unwrap(), 5.0);
        assert_relative_eq!(output(&ode, "x").unwrap(), 2.625, epsilon = 1e-12);

        set_input(&mut ode, "N", 12.0);
        ode.update_model(&ctx).unwrap();
        assert_relative_eq!(output(&ode, "T").unwrap(), 6.0);
        assert_relative_eq!(output(&ode, "x").unwrap(), 2.625 + 3.125, epsilon = 1e-12);
    }

    #[test]
    fn ports_follow_unknowns() {
        let ode = solver(&["x'' = -x", "v = x'"]);
        let names: Vec<_> = ode.ports().iter().map(Port::name).collect();
        assert_eq!(names, ["N", "H", "T", "x", "v"]);
        assert!(!ode.status().has_error());
    }

    #[test]
    fn missing_equals_leaves_outputs_undefined() {
        let globals = Environment::new();
        let ctx = TickContext::new(&globals);
        let mut ode = solver(&["xy"]);
        set_input(&mut ode, "N", 0.0);
        set_input(&mut ode, "H", 0.1);

        assert!(ode.status().has_error());
        ode.update_model(&ctx).unwrap();
        assert!(
            ode.ports()
                .iter()
                .filter(|p| p.is_output())
                .all(|p| p.value().is_none())
        );
    }

    #[test]
    fn missing_input_is_not_an_error() {
        let globals = Environment::new();
        let ctx = TickContext::new(&globals);
        let mut ode = solver(&["x' = 1"]);
        set_input(&mut ode, "H", 0.1);

        assert_eq!(ode.update_model(&ctx), Ok(()));
        assert_eq!(output(&ode, "x"), None);
    }

    #[test]
    fn step_size_must_be_positive() {
        let globals = Environment::new();
        let ctx = TickContext::new(&globals);
        let mut ode = solver(&["x' = 1"]);
        set_input(&mut ode, "N", 0.0);
        set_input(&mut ode, "H", 0.0);

        assert!(matches!(
            ode.update_model(&ctx),
            Err(BlockError::InvalidInput { ref port, .. }) if port == "H"
        ));
    }

    #[test]
    fn structural_errors() {
        let ode = solver(&["x''' = 1", "T = 2", "y' = 1", "y = 3", "2*z = 1"]);
        let errors = ode.status().configuration_errors();
        assert_eq!(errors.len(), 4);
        assert!(
            errors
                .iter()
                .all(|e| matches!(e, BlockError::Structural { .. }))
        );
        assert_eq!(ode.unknowns().collect::<Vec<_>>(), ["y"]);
    }

    #[test]
    fn evaluation_errors_keep_last_outputs() {
        let mut globals = Environment::new().with("k", 1.0);
        let mut ode = solver(&["x' = k"]);
        set_input(&mut ode, "N", 0.0);
        set_input(&mut ode, "H", 1.0);

        ode.update_model(&TickContext::new(&globals)).unwrap();
        assert_relative_eq!(output(&ode, "x").unwrap(), 1.0);

        globals.remove("k");
        assert!(matches!(
            ode.update_model(&TickContext::new(&globals)),
            Err(BlockError::Evaluation(_))
        ));
        assert_relative_eq!(output(&ode, "x").unwrap(), 1.0);
        assert_eq!(output(&ode, "T"), Some(0.0));
    }
}
