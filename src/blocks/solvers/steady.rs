//! Steady-state 2-D finite-difference block.

mod core;

use std::any::Any;

use serde::{Deserialize, Serialize};
use tracing::trace;
use twine_core::Model;

use crate::{
    blocks::{Block, BlockBase, BlockError, BlockKind, BlockState, Position, TickContext},
    flowchart::{Port, PortType, Value},
    support::{
        constraint::StrictlyPositive,
        equation::{Equation, PdeForm},
    },
};

use self::core::{Field, Grid, Relaxation};
use super::{
    EquationSet, RelaxationConfig, SolverBlock, bc_port, boundary, constrained, grid_size,
    grid_values, init_port, number, single_letters,
};

/// Largest number of points on a grid.
const MAX_GRID_POINTS: usize = 1 << 24;

/// Sweep strategy for a [`SteadyStateSolver`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelaxationMethod {
    /// Every update in a sweep reads the previous sweep's values.
    #[default]
    Jacobi,
    /// Updates read neighbours already updated in the same sweep.
    GaussSeidel,
}

/// Saved configuration of a [`SteadyStateSolver`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SteadySettings {
    pub equations: Vec<String>,

    /// `[x, y]`, each a single letter.
    pub variables: Vec<String>,

    pub method: RelaxationMethod,

    pub relaxation: RelaxationConfig,
}

impl Default for SteadySettings {
    fn default() -> Self {
        Self {
            equations: Vec::new(),
            variables: vec!["x".to_owned(), "y".to_owned()],
            method: RelaxationMethod::default(),
            relaxation: RelaxationConfig::default(),
        }
    }
}

/// Relaxes elliptic equations such as `T_xx + T_yy = 0` on a 2-D grid.
///
/// Inputs are `RN` (run gate), `X0`/`Y0` (origin), `DX`/`DY` (spacing),
/// `NX`/`NY` (points), and per field an optional `init:<f>` and `bc:<f>`.
/// Outputs are one row-major array per field.
///
/// While the block feeding `RN` reports itself paused, or `RN` is false,
/// ticks are skipped and outputs keep their values. Fields persist across
/// ticks, so each tick continues relaxing from where the last one stopped.
#[derive(Debug, Clone)]
pub struct SteadyStateSolver {
    base: BlockBase,
    settings: SteadySettings,
    axes: Option<(char, char)>,
    fields: Vec<Field>,
    solution: Option<Solution>,
}

#[derive(Debug, Clone)]
struct Solution {
    nx: usize,
    ny: usize,
    fields: Vec<Vec<f64>>,
}

impl SteadyStateSolver {
    #[must_use]
    pub fn new(uid: &str, position: Position) -> Self {
        Self::with_settings(uid, position, SteadySettings::default())
    }

    #[must_use]
    pub fn with_settings(uid: &str, position: Position, settings: SteadySettings) -> Self {
        let mut solver = Self {
            base: BlockBase::new(uid, position, Vec::new()),
            settings,
            axes: None,
            fields: Vec::new(),
            solution: None,
        };
        solver.rebuild();
        solver
    }

    #[must_use]
    pub fn settings(&self) -> &SteadySettings {
        &self.settings
    }

    pub fn set_method(&mut self, method: RelaxationMethod) {
        self.settings.method = method;
    }

    pub fn set_relaxation(&mut self, relaxation: RelaxationConfig) {
        self.settings.relaxation = relaxation;
    }

    fn rebuild(&mut self) {
        let mut set = EquationSet::parse(&self.settings.equations);
        let mut errors = set.take_errors();
        self.fields.clear();
        self.solution = None;

        self.axes = match single_letters(&self.settings.variables) {
            Ok(letters) if letters.len() == 2 => Some((letters[0], letters[1])),
            Ok(_) => {
                errors.push(BlockError::structural(
                    "a steady-state solver needs exactly two variables",
                ));
                None
            }
            Err(e) => {
                errors.push(e);
                None
            }
        };

        if let Some((x, y)) = self.axes {
            for equation in set.parsed() {
                match classify(equation, x, y, &self.fields) {
                    Ok(field) => self.fields.push(field),
                    Err(e) => errors.push(e),
                }
            }
        }

        let mut ports = vec![Port::input("RN", PortType::Boolean)];
        ports.extend(
            ["X0", "Y0", "DX", "DY", "NX", "NY"].map(|name| Port::input(name, PortType::Number)),
        );
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

    /// Starting fields from the optional `init:<f>` inputs; zero otherwise.
    fn initial_fields(&self, len: usize) -> Result<Vec<Vec<f64>>, BlockError> {
        self.fields
            .iter()
            .map(|field| {
                let port = init_port(&field.name);
                match self.base.input(&port) {
                    Some(value) => grid_values(&port, value, len),
                    None => Ok(vec![0.0; len]),
                }
            })
            .collect()
    }

    fn publish(&mut self) {
        let Some(solution) = &self.solution else {
            return;
        };
        for (field, values) in self.fields.iter().zip(&solution.fields) {
            self.base
                .set_output(&field.name, Some(Value::NumberArray(values.clone())));
        }
    }
}

fn classify(equation: &Equation, x: char, y: char, existing: &[Field]) -> Result<Field, BlockError> {
    let text = equation.text();
    let Some(PdeForm::Elliptic { function }) = equation.pde_form(None, &[x, y]) else {
        return Err(BlockError::structural(format!(
            "`{text}` has no derivative in `{x}` or `{y}`"
        )));
    };
    if existing.iter().any(|f| f.name == function) {
        return Err(BlockError::structural(format!(
            "`{function}` is defined more than once"
        )));
    }
    Ok(Field {
        name: function.to_owned(),
        equation: equation.clone(),
    })
}

impl SolverBlock for SteadyStateSolver {
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

impl Block for SteadyStateSolver {
    fn base(&self) -> &BlockBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BlockBase {
        &mut self.base
    }

    fn kind(&self) -> BlockKind {
        BlockKind::SteadyStateSolver
    }

    fn update_model(&mut self, ctx: &TickContext<'_>) -> Result<(), BlockError> {
        if ctx.is_upstream_paused("RN") {
            trace!(block = self.base.uid(), "upstream paused, skipping");
            return Ok(());
        }
        let Some((x, y)) = self.axes.filter(|_| !self.fields.is_empty()) else {
            self.base.clear_outputs();
            return Ok(());
        };
        let Some(run) = self.base.input("RN") else {
            self.base.clear_outputs();
            return Ok(());
        };
        if !run
            .as_bool()
            .ok_or_else(|| BlockError::structural("input `RN` is not a boolean"))?
        {
            return Ok(());
        }

        let inputs = ["X0", "Y0", "DX", "DY", "NX", "NY"].map(|port| number(&self.base, port));
        let [x0, y0, dx, dy, nx, ny] = inputs;
        let (Some(x0), Some(y0), Some(dx), Some(dy), Some(nx), Some(ny)) =
            (x0?, y0?, dx?, dy?, nx?, ny?)
        else {
            self.base.clear_outputs();
            return Ok(());
        };
        let grid = Grid {
            x,
            y,
            x0,
            y0,
            dx: constrained::<StrictlyPositive>("DX", dx)?,
            dy: constrained::<StrictlyPositive>("DY", dy)?,
            nx: grid_size::<3>("NX", nx)?,
            ny: grid_size::<3>("NY", ny)?,
        };
        let boundaries = self
            .fields
            .iter()
            .map(|f| boundary(&self.base, &bc_port(&f.name)))
            .collect::<Result<Vec<_>, _>>()?;

        let len = grid
            .len()
            .filter(|&len| len <= MAX_GRID_POINTS)
            .ok_or_else(|| {
                BlockError::structural(format!(
                    "grid of {} by {} points exceeds {MAX_GRID_POINTS} points",
                    grid.nx, grid.ny
                ))
            })?;
        let start = match &self.solution {
            Some(s) if s.nx == grid.nx && s.ny == grid.ny => s.fields.clone(),
            _ => self.initial_fields(len)?,
        };
        let relaxation = Relaxation {
            fields: &self.fields,
            boundaries: &boundaries,
            globals: ctx.globals(),
            grid,
            method: self.settings.method,
            config: self.settings.relaxation,
        };
        let relaxed = relaxation.call(&start)?;
        trace!(block = self.base.uid(), sweeps = relaxed.sweeps, "relaxed");

        self.solution = Some(Solution {
            nx: grid.nx,
            ny: grid.ny,
            fields: relaxed.fields,
        });
        self.publish();
        Ok(())
    }

    fn state(&self) -> BlockState {
        BlockState::SteadyStateSolver(self.settings.clone())
    }

    fn reset(&mut self) {
        self.solution = None;
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
        boundary::BoundaryCondition, constraint::ConstraintError, environment::Environment,
    };

    fn set_input(solver: &mut SteadyStateSolver, port: &str, value: Value) {
        solver
            .base_mut()
            .port_mut(port)
            .unwrap()
            .set_value(Some(value));
    }

    fn plate() -> SteadyStateSolver {
        let mut solver = SteadyStateSolver::new("plate", Position::default());
        solver.set_equations(vec!["T_xx + T_yy = 0".into()]);
        solver.set_relaxation(RelaxationConfig {
            steps: 100,
            tolerance: None,
        });
        for (port, value) in [
            ("X0", 0.0),
            ("Y0", 0.0),
            ("DX", 1.0),
            ("DY", 1.0),
            ("NX", 5.0),
            ("NY", 5.0),
        ] {
            set_input(&mut solver, port, Value::Number(value));
        }
        set_input(
            &mut solver,
            "bc:T",
            Value::Boundary(BoundaryCondition::dirichlet(100.0, 0.0, 0.0, 0.0)),
        );
        solver
    }

    fn field(solver: &SteadyStateSolver) -> Option<Vec<f64>> {
        solver
            .base()
            .port("T")
            .and_then(Port::value)
            .and_then(Value::as_array)
            .map(<[f64]>::to_vec)
    }

    #[test]
    fn fields_persist_across_ticks() {
        let globals = Environment::new();
        let ctx = TickContext::new(&globals);
        let mut solver = plate();
        set_input(&mut solver, "RN", Value::Boolean(true));

        solver.update_model(&ctx).unwrap();
        solver.update_model(&ctx).unwrap();
        let t = field(&solver).unwrap();
        assert_relative_eq!(t[12], 25.0, epsilon = 1e-9);
        assert_eq!(t[5 + 1], t[5 + 3]);
    }

    #[test]
    fn gate_skips_ticks() {
        let globals = Environment::new();
        let mut solver = plate();

        solver.update_model(&TickContext::new(&globals)).unwrap();
        assert_eq!(field(&solver), None);

        set_input(&mut solver, "RN", Value::Boolean(false));
        solver.update_model(&TickContext::new(&globals)).unwrap();
        assert_eq!(field(&solver), None);

        set_input(&mut solver, "RN", Value::Boolean(true));
        let paused = TickContext::new(&globals).with_paused_input("RN");
        solver.update_model(&paused).unwrap();
        assert_eq!(field(&solver), None);

        solver.update_model(&TickContext::new(&globals)).unwrap();
        assert!(field(&solver).is_some());
    }

    #[test]
    fn initial_values_seed_the_field() {
        let globals = Environment::new();
        let ctx = TickContext::new(&globals);
        let mut solver = plate();
        solver.set_relaxation(RelaxationConfig {
            steps: 0,
            tolerance: None,
        });
        set_input(&mut solver, "RN", Value::Boolean(true));
        set_input(&mut solver, "init:T", Value::Number(7.0));

        solver.update_model(&ctx).unwrap();
        assert_eq!(field(&solver).unwrap(), vec![7.0; 25]);
    }

    #[test]
    fn equations_without_field_derivatives_are_rejected() {
        let mut solver = SteadyStateSolver::new("s", Position::default());
        solver.set_equations(vec!["a = b".into(), "T_xx = 1".into()]);
        assert_eq!(solver.status().configuration_errors().len(), 1);
        assert!(solver.ports().iter().any(|p| p.name() == "init:T"));
    }

    #[test]
    fn oversized_grids_are_rejected() {
        let globals = Environment::new();
        let ctx = TickContext::new(&globals);
        let mut solver = plate();
        set_input(&mut solver, "RN", Value::Boolean(true));

        set_input(&mut solver, "NX", Value::Number(1e10));
        set_input(&mut solver, "NY", Value::Number(1e10));
        assert!(matches!(
            solver.update_model(&ctx),
            Err(BlockError::InvalidInput {
                source: ConstraintError::AboveMaximum,
                ..
            })
        ));

        let axis = super::super::MAX_GRID_SIZE as f64;
        set_input(&mut solver, "NX", Value::Number(axis));
        set_input(&mut solver, "NY", Value::Number(axis));
        assert!(matches!(
            solver.update_model(&ctx),
            Err(BlockError::Structural { .. })
        ));
        assert_eq!(field(&solver), None);

        set_input(&mut solver, "NX", Value::Number(5.0));
        set_input(&mut solver, "NY", Value::Number(5.0));
        solver.update_model(&ctx).unwrap();
        assert_eq!(field(&solver).map(|t| t.len()), Some(25));
    }
}
