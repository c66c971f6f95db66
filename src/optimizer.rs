//! Quasi-Newton minimization of the estimation objectives.
//!
//! BFGS with a More-Thuente line search (argmin) drives the search; the
//! gradient is a central finite difference of the objective. Every
//! evaluation goes through a tracker that remembers the best point seen, so a
//! solver error never loses progress: the best point seeds a Nelder-Mead
//! fallback, or is accepted as is.

use argmin::core::{CostFunction, Executor, Gradient, IterState, State, TerminationReason};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::neldermead::NelderMead;
use argmin::solver::quasinewton::BFGS;
use log::{debug, warn};
use nalgebra::DMatrix;
use std::cell::RefCell;

use crate::error::{ArimaError, Result};

/// Cost assigned to points where the objective is undefined.
pub const PENALTY: f64 = 1e10;

/// Relative step of the central-difference gradient (~ eps^(1/3)).
const GRAD_STEP: f64 = 6.0e-6;

/// Relative step of the numerical Hessian (~ eps^(1/4)).
const HESS_STEP: f64 = 1.2e-4;

/// Optimizer settings.
#[derive(Debug, Clone)]
pub struct OptimizerSettings {
    pub max_iters: u64,
    pub tolerance: f64,
    pub nelder_mead_fallback: bool,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            max_iters: 100,
            tolerance: f64::EPSILON.sqrt(),
            nelder_mead_fallback: true,
        }
    }
}

/// Outcome of one minimization.
#[derive(Debug, Clone)]
pub struct OptimizerReport {
    /// Best point evaluated.
    pub params: Vec<f64>,
    pub cost: f64,
    /// BFGS inverse Hessian approximation at the end of the run, if BFGS
    /// finished without error.
    pub inv_hessian: Option<DMatrix<f64>>,
    pub iterations: u64,
    pub cost_evals: u64,
    pub gradient_evals: u64,
    pub converged: bool,
    pub method: &'static str,
}

#[derive(Debug)]
struct Tracker {
    best_param: Vec<f64>,
    best_cost: f64,
    cost_evals: u64,
    gradient_evals: u64,
}

/// argmin adapter around a plain objective function.
struct TrackedObjective<'a, F> {
    f: &'a F,
    tracker: &'a RefCell<Tracker>,
}

impl<'a, F> TrackedObjective<'a, F>
where
    F: Fn(&[f64]) -> f64,
{
    fn evaluate(&self, x: &[f64]) -> f64 {
        let raw = (self.f)(x);
        let cost = if raw.is_finite() { raw.min(PENALTY) } else { PENALTY };
        let mut t = self.tracker.borrow_mut();
        t.cost_evals += 1;
        if cost < t.best_cost {
            t.best_cost = cost;
            t.best_param = x.to_vec();
        }
        cost
    }
}

impl<'a, F> CostFunction for TrackedObjective<'a, F>
where
    F: Fn(&[f64]) -> f64,
{
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Vec<f64>) -> std::result::Result<f64, argmin::core::Error> {
        Ok(self.evaluate(param))
    }
}

impl<'a, F> Gradient for TrackedObjective<'a, F>
where
    F: Fn(&[f64]) -> f64,
{
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, param: &Vec<f64>) -> std::result::Result<Vec<f64>, argmin::core::Error> {
        self.tracker.borrow_mut().gradient_evals += 1;
        Ok(central_gradient(|x| self.evaluate(x), param))
    }
}

/// Central-difference gradient; sides that hit the penalty fall back to a
/// one-sided difference, and a coordinate penalized on both sides gets 0.
pub fn central_gradient<G>(f: G, x: &[f64]) -> Vec<f64>
where
    G: Fn(&[f64]) -> f64,
{
    let f0 = f(x);
    let mut work = x.to_vec();
    let mut grad = vec![0.0; x.len()];
    for i in 0..x.len() {
        let orig = work[i];
        let h = GRAD_STEP * orig.abs().max(1.0);
        work[i] = orig + h;
        let f_plus = f(&work);
        work[i] = orig - h;
        let f_minus = f(&work);
        work[i] = orig;

        let plus_ok = f_plus < PENALTY;
        let minus_ok = f_minus < PENALTY;
        grad[i] = match (plus_ok, minus_ok) {
            (true, true) => (f_plus - f_minus) / (2.0 * h),
            (true, false) if f0 < PENALTY => (f_plus - f0) / h,
            (false, true) if f0 < PENALTY => (f0 - f_minus) / h,
            _ => 0.0,
        };
        if !grad[i].is_finite() {
            grad[i] = 0.0;
        }
    }
    grad
}

/// Central-difference Hessian of `f` at `x`; `None` if any shifted point is penalized.
pub fn numerical_hessian<G>(f: G, x: &[f64]) -> Option<DMatrix<f64>>
where
    G: Fn(&[f64]) -> f64,
{
    let n = x.len();
    let steps: Vec<f64> = x.iter().map(|v| HESS_STEP * v.abs().max(1.0)).collect();
    let mut work = x.to_vec();
    let mut shifted = |shifts: &[(usize, f64)]| -> Option<f64> {
        for &(i, s) in shifts {
            work[i] += s;
        }
        let v = f(&work);
        for &(i, s) in shifts {
            work[i] -= s;
        }
        (v.is_finite() && v < PENALTY).then_some(v)
    };

    let f0 = shifted(&[])?;
    let mut h = DMatrix::zeros(n, n);
    for i in 0..n {
        let hi = steps[i];
        let fp = shifted(&[(i, hi)])?;
        let fm = shifted(&[(i, -hi)])?;
        h[(i, i)] = (fp - 2.0 * f0 + fm) / (hi * hi);
        for j in 0..i {
            let hj = steps[j];
            let fpp = shifted(&[(i, hi), (j, hj)])?;
            let fpm = shifted(&[(i, hi), (j, -hj)])?;
            let fmp = shifted(&[(i, -hi), (j, hj)])?;
            let fmm = shifted(&[(i, -hi), (j, -hj)])?;
            let v = (fpp - fpm - fmp + fmm) / (4.0 * hi * hj);
            h[(i, j)] = v;
            h[(j, i)] = v;
        }
    }
    Some(h)
}

fn to_rows(m: &DMatrix<f64>) -> Vec<Vec<f64>> {
    m.row_iter().map(|r| r.iter().copied().collect()).collect()
}

fn from_rows(rows: &[Vec<f64>]) -> DMatrix<f64> {
    let n = rows.len();
    DMatrix::from_fn(n, n, |i, j| rows[i][j])
}

type BfgsState = IterState<Vec<f64>, Vec<f64>, (), Vec<Vec<f64>>, (), f64>;

fn run_bfgs<F>(
    problem: TrackedObjective<'_, F>,
    x0: Vec<f64>,
    inv_hessian: Vec<Vec<f64>>,
    settings: &OptimizerSettings,
) -> std::result::Result<(Option<Vec<Vec<f64>>>, u64, bool), argmin::core::Error>
where
    F: Fn(&[f64]) -> f64,
{
    let linesearch = MoreThuenteLineSearch::new().with_c(1e-4, 0.9)?;
    let solver = BFGS::new(linesearch)
        .with_tolerance_grad(settings.tolerance)?
        .with_tolerance_cost(settings.tolerance)?;

    let max_iters = settings.max_iters;
    let result = Executor::new(problem, solver)
        .configure(|state: BfgsState| state.param(x0).inv_hessian(inv_hessian).max_iters(max_iters))
        .run()?;

    let state = result.state();
    let converged = matches!(
        state.get_termination_reason(),
        Some(TerminationReason::SolverConverged) | Some(TerminationReason::TargetCostReached)
    );
    Ok((state.get_inv_hessian().cloned(), state.get_iter(), converged))
}

fn run_nelder_mead<F>(
    problem: TrackedObjective<'_, F>,
    x0: &[f64],
    settings: &OptimizerSettings,
) -> std::result::Result<(u64, bool), argmin::core::Error>
where
    F: Fn(&[f64]) -> f64,
{
    let n = x0.len();
    let mut simplex = vec![x0.to_vec()];
    for i in 0..n {
        let mut vertex = x0.to_vec();
        let delta = if vertex[i].abs() > 1e-8 {
            vertex[i] * 0.05
        } else {
            0.00025
        };
        vertex[i] += delta;
        simplex.push(vertex);
    }

    let solver = NelderMead::new(simplex).with_sd_tolerance(settings.tolerance)?;
    let result = Executor::new(problem, solver)
        .configure(|state: IterState<Vec<f64>, (), (), (), (), f64>| {
            state.max_iters(settings.max_iters.saturating_mul(10))
        })
        .run()?;

    let state = result.state();
    let converged = matches!(
        state.get_termination_reason(),
        Some(TerminationReason::SolverConverged) | Some(TerminationReason::TargetCostReached)
    );
    Ok((state.get_iter(), converged))
}

/// Minimize `f` from `x0` with BFGS.
///
/// `inv_hessian0` defaults to the identity. Points where `f` is non-finite
/// are treated as very poor, never as errors. Fails only when no evaluated
/// point escapes the penalty.
pub fn minimize<F>(
    f: &F,
    x0: &[f64],
    inv_hessian0: Option<&DMatrix<f64>>,
    settings: &OptimizerSettings,
) -> Result<OptimizerReport>
where
    F: Fn(&[f64]) -> f64,
{
    let n = x0.len();
    let tracker = RefCell::new(Tracker {
        best_param: x0.to_vec(),
        best_cost: f64::INFINITY,
        cost_evals: 0,
        gradient_evals: 0,
    });
    let objective = || TrackedObjective {
        f,
        tracker: &tracker,
    };
    objective().evaluate(x0);

    let mut inv_hessian = None;
    let mut iterations = 0;
    let mut converged = false;
    let mut method = "bfgs";

    if n == 0 {
        inv_hessian = Some(DMatrix::zeros(0, 0));
        converged = true;
    } else {
        let h0 = match inv_hessian0 {
            Some(h) if h.nrows() == n && h.ncols() == n => to_rows(h),
            _ => to_rows(&DMatrix::identity(n, n)),
        };
        match run_bfgs(objective(), x0.to_vec(), h0, settings) {
            Ok((h, iters, conv)) => {
                inv_hessian = h.map(|rows| from_rows(&rows));
                iterations = iters;
                converged = conv;
                if !conv {
                    debug!("BFGS stopped after {} iterations without converging", iters);
                }
            }
            Err(err) => {
                warn!("BFGS failed: {}", err);
                if settings.nelder_mead_fallback {
                    let start = tracker.borrow().best_param.clone();
                    match run_nelder_mead(objective(), &start, settings) {
                        Ok((iters, conv)) => {
                            iterations = iters;
                            converged = conv;
                            method = "nelder-mead";
                        }
                        Err(err) => {
                            warn!("Nelder-Mead fallback failed: {}", err);
                            method = "best-point";
                        }
                    }
                } else {
                    method = "best-point";
                }
            }
        }
    }

    let t = tracker.into_inner();
    if t.best_cost >= PENALTY {
        return Err(ArimaError::OptimizationFailed(format!(
            "objective undefined at every evaluated point ({} evaluations)",
            t.cost_evals
        )));
    }
    debug!(
        "{}: cost {:.6} after {} iterations ({} cost / {} gradient evaluations)",
        method, t.best_cost, iterations, t.cost_evals, t.gradient_evals
    );
    Ok(OptimizerReport {
        params: t.best_param,
        cost: t.best_cost,
        inv_hessian,
        iterations,
        cost_evals: t.cost_evals,
        gradient_evals: t.gradient_evals,
        converged,
        method,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
