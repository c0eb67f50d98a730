//! Transient 1-D finite-difference block.

mod core;

use std::any::Any;

use serde::{Deserialize, Serialize};
use tracing::trace;
use twine_core::Model;

use crate::{
    blocks::{Block, BlockBase, BlockError, BlockKind, BlockState, Position, TickContext},
    flowchart::{Port, PortType, Value},
    support::{
        constraint::{self, StrictlyPositive},
        equation::{Equation, PdeForm},
    },
};

use self::core::{Field, Layers, Line, TransientStep};
use super::{
    EquationSet, RelaxationConfig, SolverBlock, bc_port, boundary, constrained, grid_size,
    grid_values, init_port, number, single_letters,
};

/// Time-stepping scheme for a [`TransientSolver`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransientMethod {
    /// Next layer computed directly from the current and previous layers.
    #[default]
    Explicit,
    /// Next layer found by Gauss-Seidel relaxation.
    Implicit,
}

/// Saved configuration of a [`TransientSolver`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransientSettings {
    pub equations: Vec<String>,

    /// `[time, space]`, each a single letter.
    pub variables: Vec<String>,

    pub method: TransientMethod,

    /// Sweeps per step for the implicit scheme.
    pub relaxation: RelaxationConfig,
}

impl Default for TransientSettings {
    fn default() -> Self {
        Self {
            equations: Vec::new(),
            variables: vec!["t".to_owned(), "x".to_owned()],
            method: TransientMethod::default(),
            relaxation: RelaxationConfig::default(),
        }
    }
}

/// Marches `u_t = ...` and `u_tt = ...` equations on a 1-D grid.
///
/// Inputs are `NT` (step count), `DT` (time step), `NX` (grid points), `X0`
/// (grid origin), `DX` (grid spacing), and per field `init:<u>` (a number or
/// an `NX`-long array) and an optional `bc:<u>` boundary condition whose
/// west side is `X0` and east side the last point. Without one, both ends
/// are held at zero. Outputs are one array per field.
///
/// Each tick takes one step of `DT` until `NT` steps have been taken.
#[derive(Debug, Clone)]
pub struct TransientSolver {
    base: BlockBase,
    settings: TransientSettings,
    axes: Option<(char, char)>,
    fields: Vec<Field>,
    layers: Option<Layers>,
}

impl TransientSolver {
    #[must_use]
    pub fn new(uid: &str, position: Position) -> Self {
        Self::with_settings(uid, position, TransientSettings::default())
    }

    #[must_use]
    pub fn with_settings(uid: &str, position: Position, settings: TransientSettings) -> Self {
        let mut solver = Self {
            base: BlockBase::new(uid, position, Vec::new()),
            settings,
            axes: None,
            fields: Vec::new(),
            layers: None,
        };
        solver.rebuild();
        solver
    }

    #[must_use]
    pub fn settings(&self) -> &TransientSettings {
        &self.settings
    }

    pub fn set_method(&mut self, method: TransientMethod) {
        self.settings.method = method;
    }

    pub fn set_relaxation(&mut self, relaxation: RelaxationConfig) {
        self.settings.relaxation = relaxation;
    }

    /// Steps taken since the initial layer.
    #[must_use]
    pub fn steps_taken(&self) -> usize {
        self.layers.as_ref().map_or(0, |l| l.step)
    }

    fn rebuild(&mut self) {
        let mut set = EquationSet::parse(&self.settings.equations);
        let mut errors = set.take_errors();
        self.fields.clear();
        self.layers = None;

        self.axes = match single_letters(&self.settings.variables) {
            Ok(letters) if letters.len() == 2 => Some((letters[0], letters[1])),
            Ok(_) => {
                errors.push(BlockError::structural(
                    "a transient solver needs exactly two variables, time then space",
                ));
                None
            }
            Err(e) => {
                errors.push(e);
                None
            }
        };

        if let Some((time, space)) = self.axes {
            for equation in set.parsed() {
                match classify(equation, time, space, &self.fields) {
                    Ok(field) => self.fields.push(field),
                    Err(e) => errors.push(e),
                }
            }
        }

        let mut ports = ["NT", "DT", "NX", "X0", "DX"]
            .map(|name| Port::input(name, PortType::Number))
            .to_vec();
        for field in &self.fields {
            ports.push(Port::input(init_port(&field.name), PortType::Any));
            ports.push(Port::input(bc_port(&field.name), PortType::Boundary));
        }
        ports.extend(
            self.fields
                .iter()
                .map(|f| Port::output(f.name.as_str(), PortType::NumberArray)),
        );

        self.base.replace_ports(ports);
        self.base.status_mut().set_configuration_errors(errors);
    }

    /// Reads every `init:<u>` input, or `None` if any is undefined.
    fn initial_inputs(&self) -> Option<Vec<Value>> {
        self.fields
            .iter()
            .map(|f| self.base.input(&init_port(&f.name)).cloned())
            .collect()
    }

    fn initial_layers(&self, inits: &[Value], nx: usize) -> Result<Layers, BlockError> {
        let values = self
            .fields
            .iter()
            .zip(inits)
            .map(|(field, value)| grid_values(&init_port(&field.name), value, nx))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Layers::initial(values))
    }

    fn publish(&mut self) {
        let Some(layers) = &self.layers else {
            return;
        };
        for (field, values) in self.fields.iter().zip(&layers.current) {
            self.base
                .set_output(&field.name, Some(Value::NumberArray(values.clone())));
        }
    }
}

fn classify(
    equation: &Equation,
    time: char,
    space: char,
    existing: &[Field],
) -> Result<Field, BlockError> {
    let text = equation.text();
    let Some(PdeForm::Transient { function, order }) = equation.pde_form(Some(time), &[space])
    else {
        return Err(BlockError::structural(format!(
            "left-hand side of `{text}` must be `u_{time}` or `u_{time}{time}`"
        )));
    };
    if order > 2 {
        return Err(BlockError::structural(format!(
            "`{text}` is order {order} in time; at most order 2 is supported"
        )));
    }
    let mut letter = function.chars();
    if letter.next().is_some_and(|c| c == time || c == space) && letter.next().is_none() {
        return Err(BlockError::structural(format!(
            "`{function}` is a variable and cannot be a field"
        )));
    }
    if existing.iter().any(|f| f.name == function) {
        return Err(BlockError::structural(format!(
            "`{function}` is defined more than once"
        )));
    }
    Ok(Field {
        name: function.to_owned(),
        order,
        equation: equation.clone(),
    })
}

impl SolverBlock for TransientSolver {
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

impl Block for TransientSolver {
    fn base(&self) -> &BlockBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BlockBase {
        &mut self.base
    }

    fn kind(&self) -> BlockKind {
        BlockKind::TransientSolver
    }

    fn update_model(&mut self, ctx: &TickContext<'_>) -> Result<(), BlockError> {
        let Some((time, space)) = self.axes.filter(|_| !self.fields.is_empty()) else {
            self.base.clear_outputs();
            return Ok(());
        };
        let inputs = ["NT", "DT", "NX", "X0", "DX"].map(|port| number(&self.base, port));
        let [nt, dt, nx, x0, dx] = inputs;
        let (Some(nt), Some(dt), Some(nx), Some(x0), Some(dx)) = (nt?, dt?, nx?, x0?, dx?) else {
            self.base.clear_outputs();
            return Ok(());
        };
        let Some(inits) = self.initial_inputs() else {
            self.base.clear_outputs();
            return Ok(());
        };

        let nt = constraint::count(nt).map_err(|e| BlockError::invalid_input("NT", e))?;
        let dt = constrained::<StrictlyPositive>("DT", dt)?;
        let nx = grid_size::<3>("NX", nx)?;
        let dx = constrained::<StrictlyPositive>("DX", dx)?;
        let boundaries = self
            .fields
            .iter()
            .map(|f| boundary(&self.base, &bc_port(&f.name)))
            .collect::<Result<Vec<_>, _>>()?;

        let layers = match &self.layers {
            Some(layers) if layers.points() == nx => layers.clone(),
            _ => self.initial_layers(&inits, nx)?,
        };

        let layers = if layers.step < nt {
            let step = TransientStep {
                fields: &self.fields,
                boundaries: &boundaries,
                globals: ctx.globals(),
                line: Line {
                    time,
                    space,
                    x0,
                    dx,
                    dt,
                },
                method: self.settings.method,
                relaxation: self.settings.relaxation,
            };
            let next = step.call(&layers)?;
            trace!(block = self.base.uid(), step = next.step, "transient step");
            next
        } else {
            layers
        };

        self.layers = Some(layers);
        self.publish();
        Ok(())
    }

    fn state(&self) -> BlockState {
        BlockState::TransientSolver(self.settings.clone())
    }

    fn reset(&mut self) {
        self.layers = None;
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

    use crate::support::{
        boundary::{Boundary, BoundaryCondition, Side},
        environment::Environment,
    };

    fn heat() -> TransientSolver {
        let mut solver = TransientSolver::new("heat", Position::default());
        solver.set_equations(vec!["u_t = u_xx".into()]);
        for (port, value) in [("NT", 2.0), ("DT", 0.25), ("NX", 5.0), ("X0", 0.0), ("DX", 1.0)] {
            set_input(&mut solver, port, Value::Number(value));
        }
        set_input(
            &mut solver,
            "init:u",
            Value::NumberArray(vec![0.0, 0.0, 1.0, 0.0, 0.0]),
        );
        solver
    }

    fn set_input(solver: &mut TransientSolver, port: &str, value: Value) {
        solver
            .base_mut()
            .port_mut(port)
            .unwrap()
            .set_value(Some(value));
    }

    fn output(solver: &TransientSolver, port: &str) -> Option<Vec<f64>> {
        solver
            .base()
            .port(port)
            .and_then(Port::value)
            .and_then(Value::as_array)
            .map(<[f64]>::to_vec)
    }

    #[test]
    fn steps_until_step_count() {
        let globals = Environment::new();
        let ctx = TickContext::new(&globals);
        let mut solver = heat();

        solver.update_model(&ctx).unwrap();
        assert_eq!(output(&solver, "u").unwrap(), [0.0, 0.25, 0.5, 0.25, 0.0]);

        solver.update_model(&ctx).unwrap();
        let after_two = output(&solver, "u").unwrap();
        solver.update_model(&ctx).unwrap();
        assert_eq!(solver.steps_taken(), 2);
        assert_eq!(output(&solver, "u").unwrap(), after_two);

        solver.reset();
        solver.update_model(&ctx).unwrap();
        assert_eq!(solver.steps_taken(), 1);
    }

    #[test]
    fn boundary_input_overrides_zero_ends() {
        let globals = Environment::new();
        let ctx = TickContext::new(&globals);
        let mut solver = heat();
        let bc = BoundaryCondition::default().with(Boundary::dirichlet(Side::West, 1.0));
        set_input(&mut solver, "bc:u", Value::Boundary(bc));

        solver.update_model(&ctx).unwrap();
        let u = output(&solver, "u").unwrap();
        assert_eq!(u[0], 1.0);
        assert_eq!(u[4], 0.0);
    }

    #[test]
    fn missing_initial_values_leave_outputs_undefined() {
        let globals = Environment::new();
        let ctx = TickContext::new(&globals);
        let mut solver = heat();
        solver.base_mut().port_mut("init:u").unwrap().set_value(None);

        assert_eq!(solver.update_model(&ctx), Ok(()));
        assert_eq!(output(&solver, "u"), None);
    }

    #[test]
    fn initial_values_must_fit_grid() {
        let globals = Environment::new();
        let ctx = TickContext::new(&globals);
        let mut solver = heat();
        set_input(&mut solver, "init:u", Value::NumberArray(vec![1.0, 2.0]));

        assert!(matches!(
            solver.update_model(&ctx),
            Err(BlockError::Structural { .. })
        ));
    }

    #[test]
    fn ports_and_configuration_errors() {
        let mut solver = TransientSolver::new("t", Position::default());
        solver.set_equations(vec!["u_t = u_xx".into(), "v_x = 1".into(), "u_tt = 0".into()]);

        let names: Vec<_> = solver.ports().iter().map(Port::name).collect();
        assert_eq!(
            names,
            ["NT", "DT", "NX", "X0", "DX", "init:u", "bc:u", "u"]
        );
        assert_eq!(solver.status().configuration_errors().len(), 2);

        solver.set_variables(vec!["time".into(), "x".into()]);
        assert!(solver.status().has_error());
        assert_eq!(solver.ports().len(), 5);
    }

    #[test]
    fn third_derivative_equations_hold_points_beside_the_ends() {
        let globals = Environment::new();
        let ctx = TickContext::new(&globals);
        let mut solver = TransientSolver::new("beam", Position::default());
        solver.set_equations(vec!["u_t = u_xxx".into()]);
        for (port, value) in [("NT", 1.0), ("DT", 0.1), ("NX", 7.0), ("X0", 0.0), ("DX", 1.0)] {
            set_input(&mut solver, port, Value::Number(value));
        }
        let cubic = (0..7).map(|j| f64::from(j).powi(3)).collect();
        set_input(&mut solver, "init:u", Value::NumberArray(cubic));

        solver.update_model(&ctx).unwrap();
        let u = output(&solver, "u").unwrap();
        let expected = [0.0, 1.0, 8.6, 27.6, 64.6, 125.0, 0.0];
        for (value, expected) in u.iter().zip(expected) {
            assert_relative_eq!(*value, expected, epsilon = 1e-12);
        }
    }
}
