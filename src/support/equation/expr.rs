//! Expression trees and their evaluation.

use std::f64::consts;

use super::EvalError;

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(String),
    Derivative(Derivative),
    /// Array element access, `name[index]`.
    Index(String, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(Function, Vec<Expr>),
}

/// Derivative notation found in an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Derivative {
    /// The differentiated function, e.g. `T` in `T_xx`.
    pub function: String,

    /// How the derivative was written.
    pub notation: Notation,

    /// The identifier exactly as written, used when the scope has no
    /// derivative by that name but binds the identifier as a plain variable.
    pub symbol: String,
}

/// The two derivative spellings understood by the grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notation {
    /// Time derivative written with apostrophes: `x'` is order 1, `x''` order 2.
    Prime(usize),

    /// Partial derivative written as a subscript: each character names one
    /// differentiation variable, so `T_xy` differentiates by `x` then `y`.
    Subscript(String),
}

impl Derivative {
    /// Returns the subscript if every character of it is `var`, as its count.
    ///
    /// `u_xx` has order 2 in `x`; `u_xy` has no pure order in `x`.
    #[must_use]
    pub fn pure_order(&self, var: char) -> Option<usize> {
        match &self.notation {
            Notation::Subscript(s) if s.chars().all(|c| c == var) => Some(s.len()),
            _ => None,
        }
    }

    /// Returns the subscript characters, or `None` for prime notation.
    #[must_use]
    pub fn subscript(&self) -> Option<&str> {
        match &self.notation {
            Notation::Subscript(s) => Some(s),
            Notation::Prime(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

/// Built-in functions available to equations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Atan2,
    Sinh,
    Cosh,
    Tanh,
    Exp,
    Ln,
    Log10,
    Sqrt,
    Abs,
    Floor,
    Ceil,
    Round,
    Sign,
    Min,
    Max,
    Pow,
}

impl Function {
    pub(super) fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "sin" => Self::Sin,
            "cos" => Self::Cos,
            "tan" => Self::Tan,
            "asin" => Self::Asin,
            "acos" => Self::Acos,
            "atan" => Self::Atan,
            "atan2" => Self::Atan2,
            "sinh" => Self::Sinh,
            "cosh" => Self::Cosh,
            "tanh" => Self::Tanh,
            "exp" => Self::Exp,
            "ln" | "log" => Self::Ln,
            "log10" => Self::Log10,
            "sqrt" => Self::Sqrt,
            "abs" => Self::Abs,
            "floor" => Self::Floor,
            "ceil" => Self::Ceil,
            "round" => Self::Round,
            "sign" => Self::Sign,
            "min" => Self::Min,
            "max" => Self::Max,
            "pow" => Self::Pow,
            _ => return None,
        })
    }

    /// Number of arguments, or `None` for variadic functions.
    pub(super) fn arity(self) -> Option<usize> {
        match self {
            Self::Min | Self::Max => None,
            Self::Atan2 | Self::Pow => Some(2),
            _ => Some(1),
        }
    }

    fn apply(self, args: &[f64]) -> f64 {
        let x = args.first().copied().unwrap_or(f64::NAN);
        let y = args.get(1).copied().unwrap_or(f64::NAN);
        match self {
            Self::Sin => x.sin(),
            Self::Cos => x.cos(),
            Self::Tan => x.tan(),
            Self::Asin => x.asin(),
            Self::Acos => x.acos(),
            Self::Atan => x.atan(),
            Self::Atan2 => x.atan2(y),
            Self::Sinh => x.sinh(),
            Self::Cosh => x.cosh(),
            Self::Tanh => x.tanh(),
            Self::Exp => x.exp(),
            Self::Ln => x.ln(),
            Self::Log10 => x.log10(),
            Self::Sqrt => x.sqrt(),
            Self::Abs => x.abs(),
            Self::Floor => x.floor(),
            Self::Ceil => x.ceil(),
            Self::Round => x.round(),
            Self::Sign => {
                if x == 0.0 {
                    0.0
                } else {
                    x.signum()
                }
            }
            Self::Min => args.iter().copied().fold(f64::INFINITY, f64::min),
            Self::Max => args.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Self::Pow => x.powf(y),
        }
    }
}

/// A value bound to a name in a [`Scope`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Binding<'a> {
    Scalar(f64),
    Array(&'a [f64]),
}

/// Name resolution for expression evaluation.
///
/// Scopes are read-only: evaluating an expression never changes the values
/// it reads. Solvers build a fresh scope over their working buffers for each
/// evaluation.
pub trait Scope {
    /// Resolves a plain identifier.
    fn lookup(&self, name: &str) -> Option<Binding<'_>>;

    /// Resolves derivative notation.
    ///
    /// Returning `None` makes the evaluator fall back to looking up the
    /// derivative's symbol as a plain variable.
    fn derivative(&self, derivative: &Derivative) -> Option<f64> {
        let _ = derivative;
        None
    }
}

impl<S: Scope + ?Sized> Scope for &S {
    fn lookup(&self, name: &str) -> Option<Binding<'_>> {
        (**self).lookup(name)
    }

    fn derivative(&self, derivative: &Derivative) -> Option<f64> {
        (**self).derivative(derivative)
    }
}

fn constant(name: &str) -> Option<f64> {
    match name {
        "pi" => Some(consts::PI),
        "e" => Some(consts::E),
        _ => None,
    }
}

fn scalar(scope: &(impl Scope + ?Sized), name: &str) -> Result<f64, EvalError> {
    match scope.lookup(name) {
        Some(Binding::Scalar(value)) => Ok(value),
        Some(Binding::Array(_)) => Err(EvalError::NotAScalar(name.to_owned())),
        None => constant(name).ok_or_else(|| EvalError::UnboundVariable(name.to_owned())),
    }
}

impl Expr {
    /// Evaluates the expression.
    ///
    /// # Errors
    ///
    /// Returns an [`EvalError`] if a name cannot be resolved, or an array is
    /// used where a number is expected (or the other way round).
    pub fn evaluate(&self, scope: &(impl Scope + ?Sized)) -> Result<f64, EvalError> {
        match self {
            Self::Number(value) => Ok(*value),
            Self::Variable(name) => scalar(scope, name),
            Self::Derivative(d) => match scope.derivative(d) {
                Some(value) => Ok(value),
                None => match scope.lookup(&d.symbol) {
                    Some(Binding::Scalar(value)) => Ok(value),
                    _ => Err(EvalError::UnboundDerivative(d.symbol.clone())),
                },
            },
            Self::Index(name, index) => {
                let index = index.evaluate(scope)?;
                let values = match scope.lookup(name) {
                    Some(Binding::Array(values)) => values,
                    Some(Binding::Scalar(_)) => return Err(EvalError::NotAnArray(name.clone())),
                    None => return Err(EvalError::UnboundVariable(name.clone())),
                };
                let out_of_range = || EvalError::IndexOutOfRange {
                    name: name.clone(),
                    index,
                    len: values.len(),
                };
                if index.is_nan() || index < 0.0 {
                    return Err(out_of_range());
                }
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let i = index.floor() as usize;
                values.get(i).copied().ok_or_else(out_of_range)
            }
            Self::Unary(UnaryOp::Neg, operand) => Ok(-operand.evaluate(scope)?),
            Self::Binary(op, lhs, rhs) => {
                let a = lhs.evaluate(scope)?;
                let b = rhs.evaluate(scope)?;
                Ok(match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    BinaryOp::Pow => a.powf(b),
                })
            }
            Self::Call(function, args) => {
                let values = args
                    .iter()
                    .map(|arg| arg.evaluate(scope))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(function.apply(&values))
            }
        }
    }

    /// Calls `visit` on this node and every node below it, parents first.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Expr)) {
        visit(self);
        match self {
            Self::Number(_) | Self::Variable(_) | Self::Derivative(_) => {}
            Self::Index(_, inner) | Self::Unary(_, inner) => inner.walk(visit),
            Self::Binary(_, lhs, rhs) => {
                lhs.walk(visit);
                rhs.walk(visit);
            }
            Self::Call(_, args) => {
                for arg in args {
                    arg.walk(visit);
                }
            }
        }
    }

    /// Collects every derivative in the expression, in reading order.
    #[must_use]
    pub fn derivatives(&self) -> Vec<&Derivative> {
        let mut found = Vec::new();
        self.walk(&mut |node| {
            if let Expr::Derivative(d) = node {
                found.push(d);
            }
        });
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    use approx::assert_relative_eq;

    use crate::support::equation::parse_expr;

    struct Vars(HashMap<&'static str, f64>, Vec<f64>);

    impl Scope for Vars {
        fn lookup(&self, name: &str) -> Option<Binding<'_>> {
            if name == "arr" {
                return Some(Binding::Array(&self.1));
            }
            self.0.get(name).copied().map(Binding::Scalar)
        }

        fn derivative(&self, d: &Derivative) -> Option<f64> {
            (d.function == "u" && d.pure_order('x') == Some(2)).then_some(-4.0)
        }
    }

    fn vars() -> Vars {
        Vars(HashMap::from([("a", 2.0), ("b", 3.0)]), vec![10.0, 20.0, 30.0])
    }

    fn eval(text: &str) -> Result<f64, EvalError> {
        parse_expr(text).unwrap().evaluate(&vars())
    }

    #[test]
    fn arithmetic_and_functions() {
        assert_relative_eq!(eval("a + b * 2").unwrap(), 8.0);
        assert_relative_eq!(eval("-a^2").unwrap(), -4.0);
        assert_relative_eq!(eval("2^3^2").unwrap(), 512.0);
        assert_relative_eq!(eval("max(a, b, 1) + sqrt(16)").unwrap(), 7.0);
        assert_relative_eq!(eval("cos(pi)").unwrap(), -1.0);
    }

    #[test]
    fn arrays_are_indexed() {
        assert_relative_eq!(eval("arr[a - 1]").unwrap(), 20.0);
        assert!(matches!(
            eval("arr[3]"),
            Err(EvalError::IndexOutOfRange { len: 3, .. })
        ));
        assert_eq!(eval("arr + 1"), Err(EvalError::NotAScalar("arr".into())));
        assert_eq!(eval("a[0]"), Err(EvalError::NotAnArray("a".into())));
    }

    #[test]
    fn derivatives_resolve_through_scope() {
        assert_relative_eq!(eval("u_xx / a").unwrap(), -2.0);
        assert_eq!(
            eval("u_xy"),
            Err(EvalError::UnboundDerivative("u_xy".into()))
        );
        assert_eq!(eval("c"), Err(EvalError::UnboundVariable("c".into())));
    }

    #[test]
    fn collects_derivatives_in_order() {
        let expr = parse_expr("T_xx + k*T_yy - x'").unwrap();
        let symbols: Vec<_> = expr
            .derivatives()
            .into_iter()
            .map(|d| d.symbol.as_str())
            .collect();
        assert_eq!(symbols, ["T_xx", "T_yy", "x'"]);
    }
}
