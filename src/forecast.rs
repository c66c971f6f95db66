use statrs::distribution::{ContinuousCDF, Normal};

use crate::error::{ArimaError, Result};
use crate::model::{regression_adjusted, Arima};
use crate::polynomial::{apply_delta, make_ar_poly, polymul};

/// H-step ahead forecast result.
#[derive(Debug, Clone)]
pub struct Forecast {
    /// Point forecasts for h = 1..steps.
    pub mean: Vec<f64>,
    /// Lower interval bounds.
    pub lower: Vec<f64>,
    /// Upper interval bounds.
    pub upper: Vec<f64>,
    /// Forecast standard errors sigma * sqrt(sum psi_j^2).
    pub std_errors: Vec<f64>,
    /// Intervals cover 1 - alpha.
    pub alpha: f64,
}

/// First `n` psi weights of theta(L) / (phi(L) * Delta(L)), psi_0 = 1.
///
/// `phi` and `theta` are expanded coefficients; `delta` holds the
/// differencing coefficients so that non-stationary models get the growing
/// weights of the integrated process.
pub fn psi_weights(phi: &[f64], theta: &[f64], delta: &[f64], n: usize) -> Vec<f64> {
    // (1 - sum phi L^i)(1 - sum delta L^i) = 1 - sum a_i L^i
    let ar: Vec<f64> = polymul(&make_ar_poly(phi), &make_ar_poly(delta))[1..]
        .iter()
        .map(|c| -c)
        .collect();
    let mut psi = Vec::with_capacity(n);
    for j in 0..n {
        if j == 0 {
            psi.push(1.0);
            continue;
        }
        let mut v = theta.get(j - 1).copied().unwrap_or(0.0);
        for (i, &a) in ar.iter().enumerate().take(j) {
            v += a * psi[j - i - 1];
        }
        psi.push(v);
    }
    psi
}

/// Undo differencing: extend the last `delta.len()` values of `history` by
/// the differenced forecasts `diffs`.
///
/// Returns the history tail followed by one integrated value per entry of
/// `diffs`.
pub fn integrate(history: &[f64], diffs: &[f64], delta: &[f64]) -> Vec<f64> {
    let k = delta.len();
    let start = history.len().saturating_sub(k);
    let mut out = Vec::with_capacity(k + diffs.len());
    // Pad on the left when the history is shorter than the operator.
    out.extend(std::iter::repeat(0.0).take(k - (history.len() - start)));
    out.extend_from_slice(&history[start..]);
    for &w in diffs {
        let t = out.len();
        let lagged: f64 = delta.iter().enumerate().map(|(i, &c)| c * out[t - i - 1]).sum();
        out.push(w + lagged);
    }
    out
}

/// Extend the ARMA difference equation `steps` values past the end of `w`.
///
/// `shocks` must be aligned with `w`; future shocks are zero.
fn arma_forecast(w: &[f64], shocks: &[f64], phi: &[f64], theta: &[f64], steps: usize) -> Vec<f64> {
    let n = w.len();
    let mut values = w.to_vec();
    values.reserve(steps);
    for h in 0..steps {
        let t = n + h;
        let mut v = 0.0;
        for (i, &a) in phi.iter().enumerate() {
            if let Some(&past) = values.get(t.wrapping_sub(i + 1)) {
                v += a * past;
            }
        }
        for (j, &b) in theta.iter().enumerate() {
            let lag = t.wrapping_sub(j + 1);
            if lag < n {
                v += b * shocks.get(lag).copied().unwrap_or(0.0);
            }
        }
        values.push(v);
    }
    values.split_off(n)
}

fn normal_quantile(alpha: f64) -> Result<f64> {
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(ArimaError::InvalidConfiguration(format!(
            "alpha must be in (0, 1), got {}",
            alpha
        )));
    }
    Ok(Normal::standard().inverse_cdf(1.0 - alpha / 2.0))
}

impl Arima {
    /// Point forecasts with (1 - alpha) Gaussian prediction intervals.
    pub fn forecast(&self, steps: usize, alpha: f64) -> Result<Forecast> {
        let z = normal_quantile(alpha)?;
        if steps == 0 {
            return Ok(Forecast {
                mean: vec![],
                lower: vec![],
                upper: vec![],
                std_errors: vec![],
                alpha,
            });
        }

        let coefs = &self.coefficients;
        let phi = coefs.expanded_ar();
        let theta = coefs.expanded_ma();
        let delta = &self.delta;
        let x = self.observations.values();
        let n = x.len();

        let adjusted = regression_adjusted(x, coefs);
        let w = apply_delta(&adjusted, delta);
        let shocks = &self.shocks[delta.len().min(n)..];
        let w_future = arma_forecast(&w, shocks, &phi, &theta, steps);
        let integrated = integrate(&adjusted, &w_future, delta);

        let sigma = self.information.sigma2.max(0.0).sqrt();
        let psi = psi_weights(&phi, &theta, delta, steps);
        let mut cumulative = 0.0;
        let mut mean = Vec::with_capacity(steps);
        let mut lower = Vec::with_capacity(steps);
        let mut upper = Vec::with_capacity(steps);
        let mut std_errors = Vec::with_capacity(steps);
        for (h, value) in integrated[delta.len()..].iter().enumerate() {
            cumulative += psi[h] * psi[h];
            let se = sigma * cumulative.sqrt();
            let point = value + coefs.regression_at(n + h + 1);
            mean.push(point);
            lower.push(point - z * se);
            upper.push(point + z * se);
            std_errors.push(se);
        }

        Ok(Forecast {
            mean,
            lower,
            upper,
            std_errors,
            alpha,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
