//! Relaxation of elliptic equations on a uniform 2-D grid.
//!
//! Fields are stored row-major, `index = j * nx + i`, with `i` running west
//! to east and `j` south to north.

use twine_core::Model;

use crate::{
    blocks::solvers::RelaxationConfig,
    support::{
        boundary::BoundaryCondition,
        environment::Environment,
        equation::{Binding, Derivative, Equation, EvalError, Scope},
        stencil,
    },
};

use super::RelaxationMethod;

/// A field and the equation it must satisfy.
#[derive(Debug, Clone)]
pub(super) struct Field {
    pub name: String,
    pub equation: Equation,
}

#[derive(Debug, Clone, Copy)]
pub(super) struct Grid {
    pub x: char,
    pub y: char,
    pub x0: f64,
    pub y0: f64,
    pub dx: f64,
    pub dy: f64,
    pub nx: usize,
    pub ny: usize,
}

impl Grid {
    /// Total number of points, or `None` if it overflows `usize`.
    pub(super) fn len(&self) -> Option<usize> {
        self.nx.checked_mul(self.ny)
    }

    fn index(&self, i: usize, j: usize) -> usize {
        j * self.nx + i
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct Relaxed {
    pub fields: Vec<Vec<f64>>,
    /// Sweeps actually performed.
    pub sweeps: usize,
}

/// Runs up to `config.steps` sweeps over every field.
pub(super) struct Relaxation<'a> {
    pub fields: &'a [Field],
    pub boundaries: &'a [BoundaryCondition],
    pub globals: &'a Environment,
    pub grid: Grid,
    pub method: RelaxationMethod,
    pub config: RelaxationConfig,
}

impl Relaxation<'_> {
    /// Solves for the value at `(i, j)` that zeroes the field's residual.
    ///
    /// The residual is linearised in the point's own value by evaluating it at
    /// 0 and 1; the difference is the diagonal factor. Returns `None` if the
    /// residual does not depend on the point.
    fn solve_point(
        &self,
        values: &[Vec<f64>],
        k: usize,
        i: usize,
        j: usize,
    ) -> Result<Option<f64>, EvalError> {
        #[allow(clippy::cast_precision_loss)]
        let (x, y) = (
            self.grid.x0 + i as f64 * self.grid.dx,
            self.grid.y0 + j as f64 * self.grid.dy,
        );
        let residual_at = |v: f64| {
            let scope = GridScope {
                fields: self.fields,
                globals: self.globals,
                grid: self.grid,
                values,
                center: (k, v),
                i,
                j,
                x,
                y,
            };
            self.fields[k].equation.residual(&scope)
        };
        let r0 = residual_at(0.0)?;
        let diagonal = residual_at(1.0)? - r0;
        if diagonal == 0.0 || !diagonal.is_finite() {
            return Ok(None);
        }
        Ok(Some(-r0 / diagonal))
    }

    /// One pass over every interior point, returning the largest change.
    fn sweep(&self, values: &mut Vec<Vec<f64>>) -> Result<f64, EvalError> {
        let Grid { nx, ny, .. } = self.grid;
        let mut largest = 0.0_f64;
        let mut next = match self.method {
            RelaxationMethod::Jacobi => Some(values.clone()),
            RelaxationMethod::GaussSeidel => None,
        };

        for k in 0..self.fields.len() {
            for j in 1..ny.saturating_sub(1) {
                for i in 1..nx.saturating_sub(1) {
                    let Some(v) = self.solve_point(values, k, i, j)? else {
                        continue;
                    };
                    let index = self.grid.index(i, j);
                    largest = largest.max((v - values[k][index]).abs());
                    match &mut next {
                        Some(next) => next[k][index] = v,
                        None => values[k][index] = v,
                    }
                }
            }
        }

        if let Some(next) = next {
            *values = next;
        }
        Ok(largest)
    }
}

impl Model for Relaxation<'_> {
    type Input = Vec<Vec<f64>>;
    type Output = Relaxed;
    type Error = EvalError;

    fn call(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
        let Grid { nx, ny, dx, dy, .. } = self.grid;
        let mut values = input.clone();
        let mut sweeps = 0;

        while sweeps < self.config.steps {
            let largest = self.sweep(&mut values)?;
            for (field, bc) in values.iter_mut().zip(self.boundaries) {
                bc.apply_2d(field, nx, ny, dx, dy);
            }
            sweeps += 1;
            if self.config.converged(largest) {
                break;
            }
        }

        Ok(Relaxed {
            fields: values,
            sweeps,
        })
    }
}

/// Resolves names and derivatives at grid point `(i, j)`.
struct GridScope<'a> {
    fields: &'a [Field],
    globals: &'a Environment,
    grid: Grid,
    values: &'a [Vec<f64>],
    /// Field `k`'s value at `(i, j)` while solving a point.
    center: (usize, f64),
    i: usize,
    j: usize,
    x: f64,
    y: f64,
}

impl GridScope<'_> {
    fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Samples field `k` at an offset from `(i, j)`, clamped to the grid.
    fn sample(&self, k: usize, di: isize, dj: isize) -> f64 {
        let i = stencil::clamp_offset(self.i, di, self.grid.nx);
        let j = stencil::clamp_offset(self.j, dj, self.grid.ny);
        match self.center {
            (ck, v) if ck == k && i == self.i && j == self.j => v,
            _ => self.values[k][self.grid.index(i, j)],
        }
    }
}

fn directional(order: usize, h: f64, sample: impl Fn(isize) -> f64) -> Option<f64> {
    match order {
        1 => Some(stencil::first(sample, h)),
        2 => Some(stencil::second(sample, h)),
        3 => Some(stencil::third(sample, h)),
        _ => None,
    }
}

fn is_letter(name: &str, letter: char) -> bool {
    let mut chars = name.chars();
    chars.next() == Some(letter) && chars.next().is_none()
}

impl Scope for GridScope<'_> {
    fn lookup(&self, name: &str) -> Option<Binding<'_>> {
        if is_letter(name, self.grid.x) {
            return Some(Binding::Scalar(self.x));
        }
        if is_letter(name, self.grid.y) {
            return Some(Binding::Scalar(self.y));
        }
        match self.index_of(name) {
            Some(k) => Some(Binding::Scalar(self.sample(k, 0, 0))),
            None => self.globals.lookup(name),
        }
    }

    fn derivative(&self, derivative: &Derivative) -> Option<f64> {
        let k = self.index_of(&derivative.function)?;
        let Grid { x, y, dx, dy, .. } = self.grid;
        if let Some(order) = derivative.pure_order(x) {
            return directional(order, dx, |o| self.sample(k, o, 0));
        }
        if let Some(order) = derivative.pure_order(y) {
            return directional(order, dy, |o| self.sample(k, 0, o));
        }

        let subscript = derivative.subscript()?;
        let mut letters: Vec<char> = subscript.chars().collect();
        letters.sort_unstable();
        let mut expected = vec![x, y];
        expected.sort_unstable();
        (letters == expected).then(|| stencil::mixed(|a, b| self.sample(k, a, b), dx, dy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    use crate::support::boundary::{Boundary, Side};

    fn grid(n: usize) -> Grid {
        Grid {
            x: 'x',
            y: 'y',
            x0: 0.0,
            y0: 0.0,
            dx: 1.0,
            dy: 1.0,
            nx: n,
            ny: n,
        }
    }

    fn field(name: &str, text: &str) -> Field {
        Field {
            name: name.into(),
            equation: Equation::parse(text).unwrap(),
        }
    }

    fn laplace(method: RelaxationMethod, steps: usize) -> Relaxed {
        let fields = [field("T", "T_xx + T_yy = 0")];
        let boundaries = [BoundaryCondition::dirichlet(100.0, 0.0, 0.0, 0.0)];
        let globals = Environment::new();
        let relaxation = Relaxation {
            fields: &fields,
            boundaries: &boundaries,
            globals: &globals,
            grid: grid(5),
            method,
            config: RelaxationConfig {
                steps,
                tolerance: None,
            },
        };
        relaxation.call(&vec![vec![0.0; 25]]).unwrap()
    }

    #[test]
    fn jacobi_laplace_is_symmetric_and_monotone() {
        let relaxed = laplace(RelaxationMethod::Jacobi, 200);
        let t = &relaxed.fields[0];
        assert_eq!(relaxed.sweeps, 200);

        for j in 0..5 {
            for i in 0..5 {
                assert_eq!(t[j * 5 + i], t[j * 5 + (4 - i)], "mirror at ({i}, {j})");
            }
        }
        for i in 0..5 {
            for j in 1..5 {
                assert!(t[j * 5 + i] >= t[(j - 1) * 5 + i], "column {i} at row {j}");
            }
        }
        assert_relative_eq!(t[2 * 5 + 2], 25.0, epsilon = 1e-9);
    }

    #[test]
    fn gauss_seidel_matches_jacobi() {
        let jacobi = laplace(RelaxationMethod::Jacobi, 200);
        let gauss_seidel = laplace(RelaxationMethod::GaussSeidel, 200);
        for (a, b) in jacobi.fields[0].iter().zip(&gauss_seidel.fields[0]) {
            assert_relative_eq!(*a, *b, epsilon = 1e-9);
        }
    }

    #[test]
    fn tolerance_stops_early() {
        let fields = [field("T", "T_xx + T_yy = 0")];
        let boundaries = [BoundaryCondition::dirichlet(100.0, 0.0, 0.0, 0.0)];
        let globals = Environment::new();
        let relaxation = Relaxation {
            fields: &fields,
            boundaries: &boundaries,
            globals: &globals,
            grid: grid(5),
            method: RelaxationMethod::GaussSeidel,
            config: RelaxationConfig {
                steps: 1000,
                tolerance: Some(1e-8),
            },
        };
        let relaxed = relaxation.call(&vec![vec![0.0; 25]]).unwrap();
        assert!(relaxed.sweeps < 1000);
        assert_relative_eq!(relaxed.fields[0][12], 25.0, epsilon = 1e-6);
    }

    #[test]
    fn neumann_sides_extrapolate() {
        let fields = [field("T", "T_xx + T_yy = 0")];
        let boundaries = [BoundaryCondition::dirichlet(0.0, 0.0, 10.0, 0.0)
            .with(Boundary::neumann(Side::North, 0.0))
            .with(Boundary::neumann(Side::East, 0.0))
            .with(Boundary::neumann(Side::West, 0.0))];
        let globals = Environment::new();
        let relaxation = Relaxation {
            fields: &fields,
            boundaries: &boundaries,
            globals: &globals,
            grid: grid(5),
            method: RelaxationMethod::GaussSeidel,
            config: RelaxationConfig {
                steps: 2000,
                tolerance: None,
            },
        };
        let relaxed = relaxation.call(&vec![vec![0.0; 25]]).unwrap();
        for value in &relaxed.fields[0][5..] {
            assert_relative_eq!(*value, 10.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn poisson_source_uses_coordinates() {
        // T = x² + y² satisfies T_xx + T_yy = 4 exactly on the grid.
        let fields = [field("T", "T_xx + T_yy = 4")];
        let exact = |i: usize, j: usize| {
            #[allow(clippy::cast_precision_loss)]
            let (x, y) = (i as f64, j as f64);
            x * x + y * y
        };
        let mut init = vec![0.0; 25];
        for j in 0..5 {
            for i in 0..5 {
                if i == 0 || j == 0 || i == 4 || j == 4 {
                    init[j * 5 + i] = exact(i, j);
                }
            }
        }
        let globals = Environment::new();

        // No boundary conditions: the edges keep their initial values.
        let relaxation = Relaxation {
            fields: &fields,
            boundaries: &[],
            globals: &globals,
            grid: grid(5),
            method: RelaxationMethod::GaussSeidel,
            config: RelaxationConfig {
                steps: 500,
                tolerance: None,
            },
        };
        let relaxed = relaxation.call(&vec![init]).unwrap();
        for j in 1..4 {
            for i in 1..4 {
                assert_relative_eq!(relaxed.fields[0][j * 5 + i], exact(i, j), epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn scope_resolves_mixed_and_coordinates() {
        let fields = [field("P", "P = 0")];
        let globals = Environment::new().with("k", 3.0);
        let g = grid(3);
        // P = x * y
        let values = vec![vec![0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 0.0, 2.0, 4.0]];
        let scope = GridScope {
            fields: &fields,
            globals: &globals,
            grid: g,
            values: &values,
            center: (0, 1.0),
            i: 1,
            j: 1,
            x: 1.0,
            y: 1.0,
        };

        let eval = |text: &str| {
            crate::support::equation::parse_expr(text)
                .unwrap()
                .evaluate(&scope)
                .unwrap()
        };
        assert_relative_eq!(eval("P_xy"), 1.0);
        assert_relative_eq!(eval("P_yx"), 1.0);
        assert_relative_eq!(eval("P_x"), 1.0);
        assert_relative_eq!(eval("P_yy"), 0.0);
        assert_relative_eq!(eval("k * (x + y)"), 6.0);
    }
}
