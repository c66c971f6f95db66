use nalgebra::{DMatrix, DVector};

use crate::initialization::KalmanInit;
use crate::state_space::StateSpace;

/// Prediction variances at or above this are left out of the likelihood.
pub const STABILITY_LIMIT: f64 = 1e4;

/// Lower bound applied to sigma² before taking logarithms.
pub const SIGMA2_FLOOR: f64 = 1e-300;

/// Output of one Kalman filter pass.
#[derive(Debug, Clone)]
pub struct KalmanOutput {
    /// Observations that entered the likelihood.
    pub n_used: usize,
    /// Sum of e_t^2 / F_t over used observations.
    pub ssq: f64,
    /// Sum of ln F_t over used observations.
    pub sumlog: f64,
    /// Concentrated scale ssq / n_used.
    pub sigma2: f64,
    pub loglik: f64,
    /// e_t / sqrt(F_t) for every observation (0 where F_t <= 0).
    pub residuals: Vec<f64>,
    /// Filtered shock estimates E[eps_t | y_1..y_t] = e_t / F_t (0 where F_t <= 0).
    pub shocks: Vec<f64>,
}

impl KalmanOutput {
    /// Concentrated negative log-likelihood per observation, up to constants:
    /// 0.5 * (ln sigma² + sumlog / n).
    pub fn objective(&self) -> f64 {
        if self.n_used == 0 {
            return f64::INFINITY;
        }
        0.5 * (self.sigma2.max(SIGMA2_FLOOR).ln() + self.sumlog / self.n_used as f64)
    }
}

/// Filter state owned by a single pass, reset from the initialization.
struct Workspace {
    state: DVector<f64>,
    cov: DMatrix<f64>,
    identity: DMatrix<f64>,
}

impl Workspace {
    fn new(init: &KalmanInit) -> Self {
        let k = init.initial_state.len();
        Self {
            state: init.initial_state.clone(),
            cov: init.initial_state_cov.clone(),
            identity: DMatrix::identity(k, k),
        }
    }

    fn predict(&mut self, ss: &StateSpace, noise: &DMatrix<f64>) {
        let t_mat = &ss.transition;
        self.state = t_mat * &self.state;
        let cov = t_mat * &self.cov * t_mat.transpose() + noise;
        self.cov = (&cov + cov.transpose()) * 0.5;
    }

    /// Joseph-form measurement update; requires F > 0.
    fn update(&mut self, z: &DVector<f64>, pz: &DVector<f64>, e: f64, f: f64) {
        let gain = pz / f;
        self.state += &gain * e;
        let i_kz = &self.identity - &gain * z.transpose();
        self.cov = &i_kz * &self.cov * i_kz.transpose();
    }
}

/// Run the prediction-error decomposition of `y` under `ss`.
///
/// t = 0 uses the initial state directly; later steps propagate through T.
/// Never fails: ill-conditioned steps are skipped in the likelihood sums.
pub fn kalman_filter(y: &[f64], ss: &StateSpace, init: &KalmanInit) -> KalmanOutput {
    let noise = ss.state_noise();
    let z = &ss.design;
    let mut ws = Workspace::new(init);

    let mut n_used = 0usize;
    let mut ssq = 0.0;
    let mut sumlog = 0.0;
    let mut residuals = Vec::with_capacity(y.len());
    let mut shocks = Vec::with_capacity(y.len());

    for (t, &obs) in y.iter().enumerate() {
        if t > 0 {
            ws.predict(ss, &noise);
        }
        let e = obs - z.dot(&ws.state);
        let pz = &ws.cov * z;
        let f = z.dot(&pz);

        if f.is_finite() && f > 0.0 && f < STABILITY_LIMIT {
            n_used += 1;
            ssq += e * e / f;
            sumlog += f.ln();
        }
        if f > 0.0 && f.is_finite() {
            residuals.push(e / f.sqrt());
            shocks.push(e / f);
            ws.update(z, &pz, e, f);
        } else {
            residuals.push(0.0);
            shocks.push(0.0);
        }
    }

    let (sigma2, loglik) = concentrated_loglik(ssq, sumlog, n_used);
    KalmanOutput {
        n_used,
        ssq,
        sumlog,
        sigma2,
        loglik,
        residuals,
        shocks,
    }
}

/// sigma² = ssq / n and the Gaussian log-likelihood with sigma² concentrated out:
/// -0.5 * (n * (ln(2 pi sigma²) + 1) + sumlog).
pub fn concentrated_loglik(ssq: f64, sumlog: f64, n: usize) -> (f64, f64) {
    if n == 0 {
        return (f64::NAN, f64::NAN);
    }
    let nf = n as f64;
    let sigma2 = ssq / nf;
    let sigma2_safe = sigma2.max(SIGMA2_FLOOR);
    let loglik = -0.5 * (nf * ((2.0 * std::f64::consts::PI * sigma2_safe).ln() + 1.0) + sumlog);
    (sigma2, loglik)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(y: &[f64], phi: &[f64], theta: &[f64], delta: &[f64]) -> KalmanOutput {
        let ss = StateSpace::new(phi, theta, delta);
        let init = KalmanInit::from_state_space(&ss, KalmanInit::default_kappa());
        kalman_filter(y, &ss, &init)
    }

    #[test]
    fn test_white_noise_residuals_are_data() {
        let y = [1.0, -1.0, 2.0, -2.0, 0.5, -0.5];
        let out = filter(&y, &[], &[], &[]);
        assert_eq!(out.n_used, 6);
        let mean_sq = y.iter().map(|v| v * v).sum::<f64>() / 6.0;
        assert!((out.sigma2 - mean_sq).abs() < 1e-12);
        assert!(out.sumlog.abs() < 1e-12);
        for (r, v) in out.residuals.iter().zip(y.iter()) {
            assert!((r - v).abs() < 1e-12);
        }
    }

    #[test]
    fn test_ar1_exact_likelihood() {
        // Exact AR(1) likelihood: first obs has variance 1/(1-phi^2), the rest 1.
        let phi: f64 = 0.6;
        let y = [0.3, -0.2, 0.8, 1.1, 0.4, -0.6, -0.1];
        let out = filter(&y, &[phi], &[], &[]);
        let v0 = 1.0 / (1.0 - phi * phi);
        let mut ssq = y[0] * y[0] / v0;
        for t in 1..y.len() {
            ssq += (y[t] - phi * y[t - 1]).powi(2);
        }
        assert_eq!(out.n_used, y.len());
        assert!((out.ssq - ssq).abs() < 1e-12);
        assert!((out.sumlog - v0.ln()).abs() < 1e-12);
        let (s2, ll) = concentrated_loglik(ssq, v0.ln(), y.len());
        assert!((out.sigma2 - s2).abs() < 1e-12);
        assert!((out.loglik - ll).abs() < 1e-10);
    }

    #[test]
    fn test_differenced_state_skips_diffuse_observation() {
        // Random walk: first observation has F ~ kappa and is excluded.
        let y = [1.0, 1.5, 0.5, 2.0, 2.5];
        let out = filter(&y, &[], &[], &[1.0]);
        assert_eq!(out.n_used, 4);
        let ssq: f64 = y.windows(2).map(|w| (w[1] - w[0]).powi(2)).sum();
        assert!((out.ssq - ssq).abs() < 1e-6);
        assert!((out.sigma2 - ssq / 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_covariance_stays_symmetric() {
        let y: Vec<f64> = (0..40).map(|t| ((t * 7 % 11) as f64 - 5.0) / 3.0).collect();
        let ss = StateSpace::new(&[0.5, -0.2], &[0.4, 0.1], &[1.0]);
        let init = KalmanInit::from_state_space(&ss, KalmanInit::default_kappa());
        let mut ws = Workspace::new(&init);
        let noise = ss.state_noise();
        for (t, &obs) in y.iter().enumerate() {
            if t > 0 {
                ws.predict(&ss, &noise);
            }
            let pz = &ws.cov * &ss.design;
            let f = ss.design.dot(&pz);
            let e = obs - ss.design.dot(&ws.state);
            ws.update(&ss.design, &pz, e, f);
            let asym = (&ws.cov - ws.cov.transpose()).abs().max();
            assert!(asym < 1e-6, "asymmetry {} at t={}", asym, t);
        }
    }

    #[test]
    fn test_objective_matches_loglik() {
        let y = [0.3, -0.2, 0.8, 1.1, 0.4, -0.6, -0.1, 0.9];
        let out = filter(&y, &[0.4], &[0.2], &[]);
        let n = out.n_used as f64;
        let expected = -out.loglik / n - 0.5 * ((2.0 * std::f64::consts::PI).ln() + 1.0);
        assert!((out.objective() - expected).abs() < 1e-12);
    }
}
