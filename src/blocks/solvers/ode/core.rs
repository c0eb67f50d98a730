//! Explicit one-step integrators over a system of declared unknowns.

use twine_core::Model;

use crate::support::{
    environment::Environment,
    equation::{Binding, Derivative, Equation, EvalError, Notation, Scope},
};

use super::OdeMethod;

/// One declared unknown and the equation that defines it.
#[derive(Debug, Clone)]
pub(super) struct Unknown {
    pub name: String,
    /// 0 for `x=...`, 1 for `x'=...`, 2 for `x''=...`.
    pub order: usize,
    pub equation: Equation,
}

/// The unknowns of an ODE block, in declaration order.
#[derive(Debug, Clone, Default)]
pub(super) struct OdeSystem {
    time: String,
    unknowns: Vec<Unknown>,
}

impl OdeSystem {
    pub(super) fn new(time: String, unknowns: Vec<Unknown>) -> Self {
        Self { time, unknowns }
    }

    pub(super) fn unknowns(&self) -> &[Unknown] {
        &self.unknowns
    }

    pub(super) fn is_empty(&self) -> bool {
        self.unknowns.is_empty()
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.unknowns.iter().position(|u| u.name == name)
    }
}

/// Integration state carried between ticks.
///
/// `rates` holds the velocity of second-order unknowns; other entries are
/// unused.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct OdeState {
    pub time: f64,
    pub values: Vec<f64>,
    pub rates: Vec<f64>,
}

pub(super) struct StepInput {
    pub state: OdeState,
    pub h: f64,
}

/// Advances an [`OdeState`] by one step.
///
/// Unknowns are advanced one after another in declaration order, so each
/// unknown sees the values already computed for earlier ones in the same
/// step.
pub(super) struct OdeStep<'a> {
    system: &'a OdeSystem,
    globals: &'a Environment,
    method: OdeMethod,
}

impl<'a> OdeStep<'a> {
    pub(super) fn new(system: &'a OdeSystem, globals: &'a Environment, method: OdeMethod) -> Self {
        Self {
            system,
            globals,
            method,
        }
    }

    /// Evaluates the rhs of unknown `k`.
    fn rate(&self, k: usize, time: f64, values: &[f64], rates: &[f64]) -> Result<f64, EvalError> {
        let scope = OdeScope {
            system: self.system,
            globals: self.globals,
            time,
            values,
            rates,
        };
        self.system.unknowns[k].equation.rhs().evaluate(&scope)
    }

    /// Evaluates the acceleration of second-order unknown `k` at `(x, v)`.
    fn accel(
        &self,
        k: usize,
        time: f64,
        (x, v): (f64, f64),
        values: &mut [f64],
        rates: &mut [f64],
    ) -> Result<f64, EvalError> {
        values[k] = x;
        rates[k] = v;
        self.rate(k, time, values, rates)
    }

    fn rk4_first(&self, k: usize, t: f64, h: f64, values: &mut [f64], rates: &[f64]) -> Result<(), EvalError> {
        let x = values[k];
        let k1 = self.rate(k, t, values, rates)?;
        values[k] = x + 0.5 * h * k1;
        let k2 = self.rate(k, t + 0.5 * h, values, rates)?;
        values[k] = x + 0.5 * h * k2;
        let k3 = self.rate(k, t + 0.5 * h, values, rates)?;
        values[k] = x + h * k3;
        let k4 = self.rate(k, t + h, values, rates)?;
        values[k] = x + h / 6.0 * (k1 + 2.0 * k2 + 2.0 * k3 + k4);
        Ok(())
    }

    fn rk4_second(
        &self,
        k: usize,
        t: f64,
        h: f64,
        values: &mut [f64],
        rates: &mut [f64],
    ) -> Result<(), EvalError> {
        let (x, v) = (values[k], rates[k]);
        let a1 = self.accel(k, t, (x, v), values, rates)?;
        let (x2, v2) = (x + 0.5 * h * v, v + 0.5 * h * a1);
        let a2 = self.accel(k, t + 0.5 * h, (x2, v2), values, rates)?;
        let (x3, v3) = (x + 0.5 * h * v2, v + 0.5 * h * a2);
        let a3 = self.accel(k, t + 0.5 * h, (x3, v3), values, rates)?;
        let (x4, v4) = (x + h * v3, v + h * a3);
        let a4 = self.accel(k, t + h, (x4, v4), values, rates)?;
        values[k] = x + h / 6.0 * (v + 2.0 * v2 + 2.0 * v3 + v4);
        rates[k] = v + h / 6.0 * (a1 + 2.0 * a2 + 2.0 * a3 + a4);
        Ok(())
    }

    fn verlet(&self, k: usize, t: f64, h: f64, values: &mut [f64], rates: &mut [f64]) -> Result<(), EvalError> {
        let (x, v) = (values[k], rates[k]);
        let a0 = self.accel(k, t, (x, v), values, rates)?;
        let v_half = v + 0.5 * h * a0;
        let x_next = x + h * v_half;
        let a1 = self.accel(k, t + h, (x_next, v_half), values, rates)?;
        values[k] = x_next;
        rates[k] = v_half + 0.5 * h * a1;
        Ok(())
    }

    fn euler_second(
        &self,
        k: usize,
        t: f64,
        h: f64,
        values: &mut [f64],
        rates: &mut [f64],
    ) -> Result<(), EvalError> {
        let (x, v) = (values[k], rates[k]);
        let a = self.rate(k, t, values, rates)?;
        values[k] = x + h * v;
        rates[k] = v + h * a;
        Ok(())
    }
}

impl Model for OdeStep<'_> {
    type Input = StepInput;
    type Output = OdeState;
    type Error = EvalError;

    fn call(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
        let h = input.h;
        let mut next = input.state.clone();
        let t = next.time;
        let (values, rates) = (&mut next.values, &mut next.rates);

        for (k, unknown) in self.system.unknowns.iter().enumerate() {
            match (unknown.order, self.method) {
                // Algebraic unknowns describe the state at the end of the step.
                (0, _) => {
                    let value = self.rate(k, t + h, values, rates)?;
                    values[k] = value;
                }
                (1, OdeMethod::Rk4) => self.rk4_first(k, t, h, values, rates)?,
                (1, OdeMethod::Euler | OdeMethod::VelocityVerlet) => {
                    let rate = self.rate(k, t, values, rates)?;
                    values[k] += h * rate;
                }
                (_, OdeMethod::Euler) => self.euler_second(k, t, h, values, rates)?,
                (_, OdeMethod::Rk4) => self.rk4_second(k, t, h, values, rates)?,
                (_, OdeMethod::VelocityVerlet) => self.verlet(k, t, h, values, rates)?,
            }
        }

        next.time = t + h;
        Ok(next)
    }
}

/// Resolves names against the time variable, the unknowns, then globals.
struct OdeScope<'a> {
    system: &'a OdeSystem,
    globals: &'a Environment,
    time: f64,
    values: &'a [f64],
    rates: &'a [f64],
}

impl Scope for OdeScope<'_> {
    fn lookup(&self, name: &str) -> Option<Binding<'_>> {
        if name == self.system.time {
            return Some(Binding::Scalar(self.time));
        }
        match self.system.index_of(name) {
            Some(k) => Some(Binding::Scalar(self.values[k])),
            None => self.globals.lookup(name),
        }
    }

    fn derivative(&self, derivative: &Derivative) -> Option<f64> {
        if derivative.notation != Notation::Prime(1) {
            return None;
        }
        let k = self.system.index_of(&derivative.function)?;
        (self.system.unknowns[k].order == 2).then(|| self.rates[k])
    }
}
