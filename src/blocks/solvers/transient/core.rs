//! Finite-difference time marching on a uniform 1-D grid.

use tracing::trace;
use twine_core::Model;

use crate::{
    blocks::solvers::RelaxationConfig,
    support::{
        boundary::BoundaryCondition,
        environment::Environment,
        equation::{Binding, Derivative, Equation, EvalError, Expr, Scope},
        stencil,
    },
};

use super::TransientMethod;

/// A field advanced in time by its equation, `u_t = ...` or `u_tt = ...`.
#[derive(Debug, Clone)]
pub(super) struct Field {
    pub name: String,
    pub order: usize,
    pub equation: Equation,
}

/// Time layers for every field, indexed `[field][point]`.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct Layers {
    /// Steps taken since the initial layer.
    pub step: usize,
    pub current: Vec<Vec<f64>>,
    pub previous: Vec<Vec<f64>>,
}

impl Layers {
    /// Starts from an initial layer; the previous layer equals it.
    pub(super) fn initial(values: Vec<Vec<f64>>) -> Self {
        Self {
            step: 0,
            previous: values.clone(),
            current: values,
        }
    }

    pub(super) fn points(&self) -> usize {
        self.current.first().map_or(0, Vec::len)
    }
}

/// The grid and names a step works over.
#[derive(Debug, Clone, Copy)]
pub(super) struct Line {
    pub time: char,
    pub space: char,
    pub x0: f64,
    pub dx: f64,
    pub dt: f64,
}

impl Line {
    /// Points held at each end of the grid while `equation` is stepped.
    ///
    /// Third space derivatives need two neighbours on each side, so their
    /// equations leave the two outermost points unchanged.
    fn margin(&self, equation: &Equation) -> usize {
        let third = [equation.lhs(), equation.rhs()]
            .into_iter()
            .flat_map(Expr::derivatives)
            .any(|d| d.pure_order(self.space) == Some(3));
        if third { 2 } else { 1 }
    }
}

/// Advances all fields by one time step.
pub(super) struct TransientStep<'a> {
    pub fields: &'a [Field],
    pub boundaries: &'a [BoundaryCondition],
    pub globals: &'a Environment,
    pub line: Line,
    pub method: TransientMethod,
    pub relaxation: RelaxationConfig,
}

impl TransientStep<'_> {
    fn scope<'s>(
        &'s self,
        values: &'s [Vec<f64>],
        j: usize,
        t: f64,
        history: Option<&'s Layers>,
    ) -> LineScope<'s> {
        #[allow(clippy::cast_precision_loss)]
        let x = self.line.x0 + j as f64 * self.line.dx;
        LineScope {
            fields: self.fields,
            globals: self.globals,
            line: self.line,
            values,
            center: None,
            j,
            x,
            t,
            history,
        }
    }

    fn explicit(&self, layers: &Layers, t: f64) -> Result<Vec<Vec<f64>>, EvalError> {
        let dt = self.line.dt;
        let n = layers.points();
        let mut next = layers.current.clone();

        for (k, field) in self.fields.iter().enumerate() {
            let margin = self.line.margin(&field.equation);
            for j in margin..n.saturating_sub(margin) {
                let f = field
                    .equation
                    .rhs()
                    .evaluate(&self.scope(&layers.current, j, t, None))?;
                let u = layers.current[k][j];
                next[k][j] = match field.order {
                    1 => u + dt * f,
                    _ => 2.0 * u - layers.previous[k][j] + dt * dt * f,
                };
            }
        }
        Ok(next)
    }

    /// Gauss-Seidel sweeps over the next layer.
    ///
    /// Each point's residual is linearised in the point's own value by
    /// evaluating it at 0 and 1, then solved directly.
    fn implicit(&self, layers: &Layers, t: f64) -> Result<Vec<Vec<f64>>, EvalError> {
        let n = layers.points();
        let mut next = layers.current.clone();

        for sweep in 0..self.relaxation.steps {
            let mut largest = 0.0_f64;
            for (k, field) in self.fields.iter().enumerate() {
                let margin = self.line.margin(&field.equation);
                for j in margin..n.saturating_sub(margin) {
                    let residual_at = |v: f64| {
                        let mut scope = self.scope(&next, j, t, Some(layers));
                        scope.center = Some((k, v));
                        field.equation.residual(&scope)
                    };
                    let r0 = residual_at(0.0)?;
                    let slope = residual_at(1.0)? - r0;
                    if slope == 0.0 || !slope.is_finite() {
                        continue;
                    }
                    let v = -r0 / slope;
                    largest = largest.max((v - next[k][j]).abs());
                    next[k][j] = v;
                }
            }
            self.apply_boundaries(&mut next);
            if self.relaxation.converged(largest) {
                trace!(sweeps = sweep + 1, largest, "implicit step converged");
                break;
            }
        }
        Ok(next)
    }

    fn apply_boundaries(&self, layer: &mut [Vec<f64>]) {
        for (values, bc) in layer.iter_mut().zip(self.boundaries) {
            bc.apply_1d(values, self.line.dx);
        }
    }
}

impl Model for TransientStep<'_> {
    type Input = Layers;
    type Output = Layers;
    type Error = EvalError;

    fn call(&self, layers: &Self::Input) -> Result<Self::Output, Self::Error> {
        #[allow(clippy::cast_precision_loss)]
        let t = layers.step as f64 * self.line.dt;

        let mut next = match self.method {
            TransientMethod::Explicit => self.explicit(layers, t)?,
            TransientMethod::Implicit => self.implicit(layers, t + self.line.dt)?,
        };
        self.apply_boundaries(&mut next);

        Ok(Layers {
            step: layers.step + 1,
            previous: layers.current.clone(),
            current: next,
        })
    }
}

/// Resolves names and derivatives at grid point `j`.
struct LineScope<'a> {
    fields: &'a [Field],
    globals: &'a Environment,
    line: Line,
    values: &'a [Vec<f64>],
    /// Replaces field `k`'s value at `j` while solving a point.
    center: Option<(usize, f64)>,
    j: usize,
    x: f64,
    t: f64,
    /// Earlier layers; time derivatives resolve against them when present.
    history: Option<&'a Layers>,
}

impl LineScope<'_> {
    fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    fn sample(&self, k: usize, index: usize) -> f64 {
        match self.center {
            Some((ck, v)) if ck == k && index == self.j => v,
            _ => self.values[k][index],
        }
    }
}

fn is_letter(name: &str, letter: char) -> bool {
    let mut chars = name.chars();
    chars.next() == Some(letter) && chars.next().is_none()
}

impl Scope for LineScope<'_> {
    fn lookup(&self, name: &str) -> Option<Binding<'_>> {
        if is_letter(name, self.line.space) {
            return Some(Binding::Scalar(self.x));
        }
        if is_letter(name, self.line.time) {
            return Some(Binding::Scalar(self.t));
        }
        match self.index_of(name) {
            Some(k) => Some(Binding::Scalar(self.sample(k, self.j))),
            None => self.globals.lookup(name),
        }
    }

    fn derivative(&self, derivative: &Derivative) -> Option<f64> {
        let k = self.index_of(&derivative.function)?;
        let n = self.values[k].len();
        let at = |offset: isize| self.sample(k, stencil::clamp_offset(self.j, offset, n));
        let dx = self.line.dx;

        if let Some(order) = derivative.pure_order(self.line.space) {
            return match order {
                1 => Some(stencil::first(at, dx)),
                2 => Some(stencil::second(at, dx)),
                3 if self.j >= 2 && self.j + 2 < n => Some(stencil::third(at, dx)),
                _ => None,
            };
        }

        let history = self.history?;
        let dt = self.line.dt;
        let u = self.sample(k, self.j);
        let current = history.current[k][self.j];
        match derivative.pure_order(self.line.time)? {
            1 => Some((u - current) / dt),
            2 => Some((u - 2.0 * current + history.previous[k][self.j]) / (dt * dt)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    fn fields(equations: &[(&str, usize, &str)]) -> Vec<Field> {
        equations
            .iter()
            .map(|(name, order, text)| Field {
                name: (*name).into(),
                order: *order,
                equation: Equation::parse(text).unwrap(),
            })
            .collect()
    }

    fn line(dt: f64) -> Line {
        Line {
            time: 't',
            space: 'x',
            x0: 0.0,
            dx: 1.0,
            dt,
        }
    }

    fn pulse() -> Vec<f64> {
        vec![0.0, 0.0, 1.0, 0.0, 0.0]
    }

    #[test]
    fn explicit_heat_step() {
        let fields = fields(&[("u", 1, "u_t = u_xx")]);
        let boundaries = [BoundaryCondition::default()];
        let globals = Environment::new();
        let step = TransientStep {
            fields: &fields,
            boundaries: &boundaries,
            globals: &globals,
            line: line(0.25),
            method: TransientMethod::Explicit,
            relaxation: RelaxationConfig::default(),
        };

        let next = step.call(&Layers::initial(vec![pulse()])).unwrap();
        assert_eq!(next.step, 1);
        assert_eq!(next.previous[0], pulse());
        assert_eq!(next.current[0], [0.0, 0.25, 0.5, 0.25, 0.0]);
    }

    #[test]
    fn explicit_wave_step() {
        let fields = fields(&[("u", 2, "u_tt = u_xx")]);
        let boundaries = [BoundaryCondition::default()];
        let globals = Environment::new();
        let step = TransientStep {
            fields: &fields,
            boundaries: &boundaries,
            globals: &globals,
            line: line(0.5),
            method: TransientMethod::Explicit,
            relaxation: RelaxationConfig::default(),
        };

        let next = step.call(&Layers::initial(vec![pulse()])).unwrap();
        assert_eq!(next.current[0], [0.0, 0.25, 0.5, 0.25, 0.0]);
    }

    #[test]
    fn implicit_heat_step_solves_backward_euler() {
        let fields = fields(&[("u", 1, "u_t = u_xx")]);
        let boundaries = [BoundaryCondition::default()];
        let globals = Environment::new();
        let step = TransientStep {
            fields: &fields,
            boundaries: &boundaries,
            globals: &globals,
            line: line(0.25),
            method: TransientMethod::Implicit,
            relaxation: RelaxationConfig {
                steps: 200,
                tolerance: None,
            },
        };

        let u = pulse();
        let next = step.call(&Layers::initial(vec![u.clone()])).unwrap();
        let v = &next.current[0];
        for j in 1..4 {
            let residual = (v[j] - u[j]) / 0.25 - (v[j + 1] + v[j - 1] - 2.0 * v[j]);
            assert!(residual.abs() < 1e-9, "residual {residual} at {j}");
        }
        assert_relative_eq!(v[1], v[3], epsilon = 1e-12);
        assert!(v[2] > v[1] && v[1] > 0.0);
    }

    #[test]
    fn tolerance_stops_sweeps_early() {
        let fields = fields(&[("u", 1, "u_t = u_xx")]);
        let boundaries = [BoundaryCondition::default()];
        let globals = Environment::new();
        let mut step = TransientStep {
            fields: &fields,
            boundaries: &boundaries,
            globals: &globals,
            line: line(0.25),
            method: TransientMethod::Implicit,
            relaxation: RelaxationConfig {
                steps: 1000,
                tolerance: Some(1e-12),
            },
        };
        let layers = Layers::initial(vec![pulse()]);
        let early = step.call(&layers).unwrap();

        step.relaxation.tolerance = None;
        let full = step.call(&layers).unwrap();
        for (a, b) in early.current[0].iter().zip(&full.current[0]) {
            assert_relative_eq!(*a, *b, epsilon = 1e-10);
        }
    }

    #[test]
    fn boundaries_set_end_points() {
        let fields = fields(&[("u", 1, "u_t = 0")]);
        let boundaries = [BoundaryCondition::dirichlet(0.0, 3.0, 0.0, 1.0)];
        let globals = Environment::new();
        let step = TransientStep {
            fields: &fields,
            boundaries: &boundaries,
            globals: &globals,
            line: line(0.1),
            method: TransientMethod::Explicit,
            relaxation: RelaxationConfig::default(),
        };

        let next = step.call(&Layers::initial(vec![vec![2.0; 4]])).unwrap();
        assert_eq!(next.current[0], [1.0, 2.0, 2.0, 3.0]);
    }

    #[test]
    fn coupled_fields_see_each_other() {
        let fields = fields(&[("u", 1, "u_t = v * x"), ("v", 1, "v_t = 0")]);
        let boundaries = [BoundaryCondition::default(); 2];
        let globals = Environment::new();
        let step = TransientStep {
            fields: &fields,
            boundaries: &boundaries,
            globals: &globals,
            line: line(0.5),
            method: TransientMethod::Explicit,
            relaxation: RelaxationConfig::default(),
        };

        let next = step
            .call(&Layers::initial(vec![vec![0.0; 4], vec![2.0; 4]]))
            .unwrap();
        assert_eq!(next.current[0], [0.0, 1.0, 2.0, 0.0]);
        assert_eq!(next.current[1], [0.0, 2.0, 2.0, 0.0]);
    }

    #[test]
    fn implicit_wave_step_solves_central_difference() {
        let fields = fields(&[("u", 2, "u_tt = u_xx")]);
        let boundaries = [BoundaryCondition::default()];
        let globals = Environment::new();
        let step = TransientStep {
            fields: &fields,
            boundaries: &boundaries,
            globals: &globals,
            line: line(0.5),
            method: TransientMethod::Implicit,
            relaxation: RelaxationConfig {
                steps: 500,
                tolerance: None,
            },
        };
        let wave_residual = |v: &[f64], u: &[f64], prev: &[f64], j: usize| {
            (v[j] - 2.0 * u[j] + prev[j]) / 0.25 - (v[j + 1] + v[j - 1] - 2.0 * v[j])
        };

        let first = step.call(&Layers::initial(vec![pulse()])).unwrap();
        let (u, v) = (pulse(), &first.current[0]);
        for j in 1..4 {
            let residual = wave_residual(v, &u, &u, j);
            assert!(residual.abs() < 1e-9, "residual {residual} at {j}");
        }
        assert_relative_eq!(v[1], v[3], epsilon = 1e-12);
        assert!(v[2] < 1.0 && v[1] > 0.0);

        let second = step.call(&first).unwrap();
        assert_eq!(second.previous[0], *v);
        let w = &second.current[0];
        for j in 1..4 {
            let residual = wave_residual(w, v, &u, j);
            assert!(residual.abs() < 1e-9, "residual {residual} at {j}");
        }
    }

    #[test]
    fn third_derivatives_skip_points_next_to_the_ends() {
        let fields = fields(&[("u", 1, "u_t = u_xxx")]);
        let boundaries = [BoundaryCondition::default()];
        let globals = Environment::new();
        let step = TransientStep {
            fields: &fields,
            boundaries: &boundaries,
            globals: &globals,
            line: line(0.1),
            method: TransientMethod::Explicit,
            relaxation: RelaxationConfig::default(),
        };
        let cubic = vec![vec![0.0, 1.0, 8.0, 27.0, 64.0, 125.0, 216.0]];

        let next = step.call(&Layers::initial(cubic.clone())).unwrap();
        let expected = [0.0, 1.0, 8.6, 27.6, 64.6, 125.0, 0.0];
        for (value, expected) in next.current[0].iter().zip(expected) {
            assert_relative_eq!(*value, expected, epsilon = 1e-12);
        }

        let third = fields[0].equation.rhs().derivatives()[0];
        let near_end = step.scope(&cubic, 1, 0.0, None);
        assert_eq!(near_end.derivative(third), None);
        let interior = step.scope(&cubic, 2, 0.0, None);
        assert_eq!(interior.derivative(third), Some(6.0));
    }
}
