//! Model estimation and the fitted [`Arima`] model.
//!
//! Estimation walks through [`EstimationStage`]s: starting values from an OLS
//! regression on the differenced series, an optional CSS warm start, then
//! BFGS on the chosen likelihood. Everything the optimizer sees goes through
//! [`ParamLayout`], so mean and drift are searched on a unit scale.

use log::{debug, warn};
use nalgebra::DMatrix;

use crate::coefficients::{ArimaCoefficients, CoefficientsSpec};
use crate::css::css_residuals;
use crate::error::{ArimaError, Result};
use crate::initialization::KalmanInit;
use crate::kalman::{kalman_filter, KalmanOutput};
use crate::optimizer::{minimize, numerical_hessian, OptimizerReport, OptimizerSettings};
use crate::params::ParamLayout;
use crate::polynomial::{apply_delta, differencing_delta, is_stationary};
use crate::regression::ols;
use crate::series::TimeSeries;
use crate::state_space::StateSpace;
use crate::types::{ArimaOrder, FitConfig, FitStrategy, HessianSource};

/// Progress of one estimation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimationStage {
    /// Starting values computed.
    Initialized,
    /// CSS estimates available as the starting point for ML.
    WarmStarted,
    Optimizing,
    /// Optimizer finished (converged or out of budget).
    Converged,
}

fn advance(stage: &mut EstimationStage, next: EstimationStage) {
    debug!("estimation stage {:?} -> {:?}", stage, next);
    *stage = next;
}

/// Goodness-of-fit summary of a model.
#[derive(Debug, Clone)]
pub struct ModelInformation {
    pub sigma2: f64,
    pub loglik: f64,
    pub aic: f64,
    pub bic: f64,
    /// Observations that entered the likelihood.
    pub n_used: usize,
    /// One residual per observation.
    pub residuals: Vec<f64>,
    /// observation - residual
    pub fitted: Vec<f64>,
}

/// Likelihood evaluated by an objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Likelihood {
    Css,
    Ml,
}

/// One likelihood evaluation, whichever method produced it.
struct Evaluation {
    sigma2: f64,
    loglik: f64,
    n_used: usize,
    residuals: Vec<f64>,
    /// Past shocks fed to the MA part of forecasts.
    shocks: Vec<f64>,
}

/// Observations minus mean + drift * t, t = 1..N.
pub(crate) fn regression_adjusted(x: &[f64], coefs: &ArimaCoefficients) -> Vec<f64> {
    if !coefs.has_mean() && !coefs.has_drift() {
        return x.to_vec();
    }
    x.iter()
        .enumerate()
        .map(|(t, &v)| v - coefs.regression_at(t + 1))
        .collect()
}

/// Exact likelihood; `None` when the AR or seasonal AR part is non-stationary.
fn ml_output(
    adjusted: &[f64],
    delta: &[f64],
    coefs: &ArimaCoefficients,
    kappa: f64,
) -> Option<KalmanOutput> {
    if !is_stationary(coefs.ar()) || !is_stationary(coefs.sar()) {
        return None;
    }
    let ss = StateSpace::new(&coefs.expanded_ar(), &coefs.expanded_ma(), delta);
    let init = KalmanInit::from_state_space(&ss, kappa);
    Some(kalman_filter(adjusted, &ss, &init))
}

/// Everything an objective needs besides the trial point.
struct Estimation<'a> {
    observations: &'a [f64],
    delta: Vec<f64>,
    layout: ParamLayout,
    kappa: f64,
}

impl<'a> Estimation<'a> {
    fn objective(&self, likelihood: Likelihood, flat: &[f64]) -> f64 {
        let coefs = match self.layout.unpack(flat) {
            Ok(c) => c,
            Err(_) => return f64::INFINITY,
        };
        let adjusted = regression_adjusted(self.observations, &coefs);
        match likelihood {
            Likelihood::Css => {
                let w = apply_delta(&adjusted, &self.delta);
                css_residuals(&w, &coefs.expanded_ar(), &coefs.expanded_ma()).objective()
            }
            Likelihood::Ml => match ml_output(&adjusted, &self.delta, &coefs, self.kappa) {
                Some(out) => out.objective(),
                None => f64::INFINITY,
            },
        }
    }

    fn evaluate(&self, likelihood: Likelihood, coefs: &ArimaCoefficients) -> Evaluation {
        evaluate(self.observations, &self.delta, coefs, self.kappa, likelihood)
    }
}

fn evaluate(
    x: &[f64],
    delta: &[f64],
    coefs: &ArimaCoefficients,
    kappa: f64,
    likelihood: Likelihood,
) -> Evaluation {
    let adjusted = regression_adjusted(x, coefs);
    if likelihood == Likelihood::Ml {
        if let Some(out) = ml_output(&adjusted, delta, coefs, kappa) {
            return Evaluation {
                sigma2: out.sigma2,
                loglik: out.loglik,
                n_used: out.n_used,
                residuals: out.residuals,
                shocks: out.shocks,
            };
        }
        warn!("exact likelihood undefined at the final coefficients, reporting CSS");
    }
    let w = apply_delta(&adjusted, delta);
    let out = css_residuals(&w, &coefs.expanded_ar(), &coefs.expanded_ma());
    // Residuals before the differencing window are reported as zero.
    let mut residuals = vec![0.0; delta.len()];
    residuals.extend(out.residuals);
    Evaluation {
        sigma2: out.sigma2,
        loglik: out.loglik,
        n_used: out.n_used,
        shocks: residuals.clone(),
        residuals,
    }
}

fn model_information(x: &[f64], eval: &Evaluation, npar: usize) -> ModelInformation {
    let k = (npar + 1) as f64;
    let aic = -2.0 * eval.loglik + 2.0 * k;
    let bic = -2.0 * eval.loglik + (eval.n_used as f64).ln() * k;
    let fitted = x.iter().zip(&eval.residuals).map(|(v, e)| v - e).collect();
    ModelInformation {
        sigma2: eval.sigma2,
        loglik: eval.loglik,
        aic,
        bic,
        n_used: eval.n_used,
        residuals: eval.residuals.clone(),
        fitted,
    }
}

/// Zero ARMA coefficients with OLS estimates for mean and drift, and the
/// layout scaling them by their standard errors times sqrt(rows).
fn starting_values(
    x: &[f64],
    delta: &[f64],
    order: &ArimaOrder,
    s: usize,
) -> Result<(ArimaCoefficients, ParamLayout)> {
    let n = x.len();
    let mut columns = Vec::new();
    if order.constant() {
        columns.push(vec![1.0; n]);
    }
    if order.drift() {
        columns.push((1..=n).map(|t| t as f64).collect::<Vec<f64>>());
    }
    if columns.is_empty() {
        return Ok((ArimaCoefficients::zeros(order, s)?, ParamLayout::new(*order, s)));
    }

    let y = apply_delta(x, delta);
    let columns: Vec<Vec<f64>> = columns.iter().map(|c| apply_delta(c, delta)).collect();
    let fit = ols(&y, &columns)?;
    let mut estimates = fit.coefficients.iter().copied().zip(fit.std_errors.iter().copied());
    let mean = if order.constant() { estimates.next() } else { None };
    let drift = if order.drift() { estimates.next() } else { None };
    debug!("regression start: mean {:?}, drift {:?}", mean, drift);

    let coefs = ArimaCoefficients::new(CoefficientsSpec {
        ar: vec![0.0; order.p()],
        ma: vec![0.0; order.q()],
        sar: vec![0.0; order.pp()],
        sma: vec![0.0; order.qq()],
        d: order.d(),
        dd: order.dd(),
        seasonal_frequency: s,
        mean: mean.map(|(b, _)| b),
        drift: drift.map(|(b, _)| b),
    })?;
    // se * sqrt(rows) gives the regression terms unit curvature in the
    // per-observation objective, like the ARMA coefficients.
    let root_n = (y.len() as f64).sqrt();
    let layout = ParamLayout::with_scales(
        *order,
        s,
        mean.map_or(1.0, |(_, se)| se * root_n),
        drift.map_or(1.0, |(_, se)| se * root_n),
    );
    Ok((coefs, layout))
}

/// Reset a non-stationary AR or seasonal AR block to zero.
fn restart_nonstationary(coefs: ArimaCoefficients) -> ArimaCoefficients {
    let reset = |name: &str, block: &[f64]| {
        if is_stationary(block) {
            block.to_vec()
        } else {
            warn!("CSS {} estimates {:?} are non-stationary, restarting from zero", name, block);
            vec![0.0; block.len()]
        }
    };
    let ar = reset("AR", coefs.ar());
    let sar = reset("seasonal AR", coefs.sar());
    coefs.with_arma(ar, coefs.ma().to_vec(), sar, coefs.sma().to_vec())
}

/// Diagonal of a usable inverse Hessian, as a matrix.
fn diagonal_seed(report: &OptimizerReport) -> Option<DMatrix<f64>> {
    let h = report.inv_hessian.as_ref()?;
    let diag = h.diagonal();
    if report.iterations == 0 || diag.iter().any(|v| !v.is_finite() || *v <= 0.0) {
        return None;
    }
    Some(DMatrix::from_diagonal(&diag))
}

fn usable_inverse(h: &DMatrix<f64>) -> bool {
    h.iter().all(|v| v.is_finite()) && h.diagonal().iter().all(|&v| v > 0.0)
}

/// Relative tolerance on variances when checking the BFGS inverse Hessian.
const VARIANCE_AGREEMENT: f64 = 0.15;

/// Whether the BFGS diagonal matches the diagonal of the numerical inverse.
///
/// BFGS can stop before its curvature estimate has settled in directions it
/// barely moved along.
fn diagonals_agree(bfgs: &DMatrix<f64>, numerical: &DMatrix<f64>) -> bool {
    bfgs.diagonal()
        .iter()
        .zip(numerical.diagonal().iter())
        .all(|(&a, &b)| b > 0.0 && ((a - b) / b).abs() <= VARIANCE_AGREEMENT)
}

fn standard_errors<F>(
    objective: &F,
    report: &OptimizerReport,
    layout: &ParamLayout,
    n_used: usize,
    source: HessianSource,
) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64,
{
    let npar = layout.len();
    if npar == 0 {
        return vec![];
    }
    let numerical = || numerical_hessian(objective, &report.params).and_then(|h| h.try_inverse());
    let cov = match source {
        HessianSource::Numerical => numerical(),
        HessianSource::Bfgs => match report
            .inv_hessian
            .clone()
            .filter(|h| report.iterations > 0 && usable_inverse(h))
        {
            Some(h) => match numerical() {
                Some(check) if usable_inverse(&check) && !diagonals_agree(&h, &check) => {
                    warn!("BFGS inverse Hessian disagrees with the numerical curvature, using the numerical one");
                    Some(check)
                }
                _ => Some(h),
            },
            None => {
                warn!("BFGS inverse Hessian unusable, computing it numerically");
                numerical()
            }
        },
    };

    let n = n_used as f64;
    match cov {
        Some(cov) => layout
            .scales()
            .iter()
            .enumerate()
            .map(|(i, scale)| {
                let v = cov[(i, i)];
                if v > 0.0 && n > 0.0 {
                    (v / n).sqrt() * scale
                } else {
                    f64::NAN
                }
            })
            .collect(),
        None => {
            warn!("no usable Hessian, standard errors are undefined");
            vec![f64::NAN; npar]
        }
    }
}

/// A fitted seasonal ARIMA model.
#[derive(Debug, Clone)]
pub struct Arima {
    pub(crate) observations: TimeSeries,
    pub(crate) differenced: Vec<f64>,
    pub(crate) order: ArimaOrder,
    pub(crate) coefficients: ArimaCoefficients,
    pub(crate) delta: Vec<f64>,
    pub(crate) information: ModelInformation,
    pub(crate) shocks: Vec<f64>,
    pub(crate) std_errors: Vec<f64>,
    pub(crate) strategy: FitStrategy,
    pub(crate) report: Option<OptimizerReport>,
}

impl Arima {
    /// Estimate a model of the given order.
    pub fn fit(series: &TimeSeries, order: &ArimaOrder, config: &FitConfig) -> Result<Self> {
        config.validate()?;
        let s = series.frequency();
        order.check_frequency(s)?;

        let x = series.values();
        let n = x.len();
        let delta = differencing_delta(order.d(), order.dd(), s);
        let usable = n.saturating_sub(delta.len());
        let needed = match config.strategy {
            FitStrategy::Ml => order.npar(),
            FitStrategy::Css | FitStrategy::CssMl => order.npar().max(order.k_ar(s)),
        };
        if usable <= needed {
            return Err(ArimaError::DataError(format!(
                "{} observations leave {} after differencing, need more than {} for order {:?}",
                n, usable, needed, order
            )));
        }

        let mut stage = EstimationStage::Initialized;
        debug!(
            "fitting {:?} (s = {}) to {} observations with {}",
            order,
            s,
            n,
            config.strategy.name()
        );
        let (start, layout) = starting_values(x, &delta, order, s)?;
        let estimation = Estimation {
            observations: x,
            delta,
            layout,
            kappa: config.kappa,
        };
        let settings = OptimizerSettings {
            max_iters: config.max_iters,
            tolerance: config.tolerance,
            nelder_mead_fallback: config.nelder_mead_fallback,
        };
        let css = |p: &[f64]| estimation.objective(Likelihood::Css, p);
        let ml = |p: &[f64]| estimation.objective(Likelihood::Ml, p);
        let x0 = estimation.layout.pack(&start);

        let (report, likelihood) = match config.strategy {
            FitStrategy::Css => {
                advance(&mut stage, EstimationStage::Optimizing);
                (minimize(&css, &x0, None, &settings)?, Likelihood::Css)
            }
            FitStrategy::Ml => {
                advance(&mut stage, EstimationStage::Optimizing);
                (minimize(&ml, &x0, None, &settings)?, Likelihood::Ml)
            }
            FitStrategy::CssMl => {
                let warm = minimize(&css, &x0, None, &settings)?;
                advance(&mut stage, EstimationStage::WarmStarted);
                let start = restart_nonstationary(estimation.layout.unpack(&warm.params)?);
                let seed = diagonal_seed(&warm);
                advance(&mut stage, EstimationStage::Optimizing);
                let x1 = estimation.layout.pack(&start);
                (minimize(&ml, &x1, seed.as_ref(), &settings)?, Likelihood::Ml)
            }
        };
        advance(&mut stage, EstimationStage::Converged);

        let coefficients = estimation.layout.unpack(&report.params)?;
        let eval = estimation.evaluate(likelihood, &coefficients);
        let information = model_information(x, &eval, order.npar());
        let std_errors = match likelihood {
            Likelihood::Css => {
                standard_errors(&css, &report, &estimation.layout, information.n_used, config.hessian)
            }
            Likelihood::Ml => {
                standard_errors(&ml, &report, &estimation.layout, information.n_used, config.hessian)
            }
        };
        debug!(
            "fitted {:?}: sigma2 {:.6}, loglik {:.4}, aic {:.4} ({} after {} iterations)",
            order, information.sigma2, information.loglik, information.aic, report.method, report.iterations
        );

        Ok(Self {
            differenced: apply_delta(x, &estimation.delta),
            observations: series.clone(),
            order: *order,
            coefficients,
            delta: estimation.delta,
            information,
            shocks: eval.shocks,
            std_errors,
            strategy: config.strategy,
            report: Some(report),
        })
    }

    /// Model with known coefficients, for forecasting and simulation.
    ///
    /// The exact likelihood is reported when it is defined at `coefficients`,
    /// the CSS likelihood otherwise. Standard errors are NaN.
    pub fn from_coefficients(series: &TimeSeries, coefficients: ArimaCoefficients) -> Result<Self> {
        let order = coefficients.order();
        let s = coefficients.seasonal_frequency();
        if order.is_seasonal() && s != series.frequency() {
            return Err(ArimaError::InvalidConfiguration(format!(
                "coefficients have seasonal frequency {}, series has {}",
                s,
                series.frequency()
            )));
        }
        let x = series.values();
        let delta = differencing_delta(order.d(), order.dd(), s);
        if x.len() <= delta.len() {
            return Err(ArimaError::DataError(format!(
                "{} observations cannot be differenced {} times",
                x.len(),
                delta.len()
            )));
        }

        let kappa = KalmanInit::default_kappa();
        let adjusted = regression_adjusted(x, &coefficients);
        let exact = ml_output(&adjusted, &delta, &coefficients, kappa).map_or(false, |o| o.n_used > 0);
        let (likelihood, strategy) = if exact {
            (Likelihood::Ml, FitStrategy::Ml)
        } else {
            (Likelihood::Css, FitStrategy::Css)
        };
        let eval = evaluate(x, &delta, &coefficients, kappa, likelihood);
        let information = model_information(x, &eval, order.npar());

        Ok(Self {
            differenced: apply_delta(x, &delta),
            observations: series.clone(),
            order,
            std_errors: vec![f64::NAN; order.npar()],
            coefficients,
            delta,
            information,
            shocks: eval.shocks,
            strategy,
            report: None,
        })
    }

    pub fn observations(&self) -> &TimeSeries {
        &self.observations
    }

    /// Observations after (seasonal) differencing, length N - d - D*s.
    pub fn differenced(&self) -> &[f64] {
        &self.differenced
    }

    pub fn order(&self) -> &ArimaOrder {
        &self.order
    }

    pub fn coefficients(&self) -> &ArimaCoefficients {
        &self.coefficients
    }

    pub fn information(&self) -> &ModelInformation {
        &self.information
    }

    pub fn sigma2(&self) -> f64 {
        self.information.sigma2
    }

    pub fn loglik(&self) -> f64 {
        self.information.loglik
    }

    pub fn aic(&self) -> f64 {
        self.information.aic
    }

    pub fn bic(&self) -> f64 {
        self.information.bic
    }

    /// Standard errors in packing order: ar, ma, sar, sma, mean, drift.
    pub fn std_errors(&self) -> &[f64] {
        &self.std_errors
    }

    pub fn residuals(&self) -> &[f64] {
        &self.information.residuals
    }

    pub fn fitted(&self) -> &[f64] {
        &self.information.fitted
    }

    /// Likelihood the coefficients were estimated (or evaluated) with.
    pub fn strategy(&self) -> FitStrategy {
        self.strategy
    }

    /// Optimizer diagnostics; `None` for models built from known coefficients.
    pub fn report(&self) -> Option<&OptimizerReport> {
        self.report.as_ref()
    }

    pub fn converged(&self) -> bool {
        self.report.as_ref().map_or(false, |r| r.converged)
    }
}
