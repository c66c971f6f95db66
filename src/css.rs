use crate::kalman::{concentrated_loglik, SIGMA2_FLOOR};

/// Result of one conditional-sum-of-squares pass.
#[derive(Debug, Clone)]
pub struct CssOutput {
    /// Observations after the conditioning window.
    pub n_used: usize,
    pub ssq: f64,
    /// ssq / n_used
    pub sigma2: f64,
    pub loglik: f64,
    /// One residual per input observation; the first p' are zero.
    pub residuals: Vec<f64>,
}

impl CssOutput {
    /// 0.5 * ln(sigma²)
    pub fn objective(&self) -> f64 {
        if self.n_used == 0 {
            return f64::INFINITY;
        }
        0.5 * self.sigma2.max(SIGMA2_FLOOR).ln()
    }
}

/// CSS residuals of the (already differenced) series `w` under expanded AR
/// `phi` and MA `theta`.
///
/// The first `phi.len()` observations are conditioned on; residuals before
/// the window are zero, so the MA sum only reaches back into it.
pub fn css_residuals(w: &[f64], phi: &[f64], theta: &[f64]) -> CssOutput {
    let n = w.len();
    let ncond = phi.len().min(n);
    let mut residuals = vec![0.0; n];
    let mut ssq = 0.0;

    for t in ncond..n {
        let mut fitted = 0.0;
        for (i, &a) in phi.iter().enumerate() {
            fitted += a * w[t - i - 1];
        }
        for (j, &b) in theta.iter().enumerate().take(t - ncond) {
            fitted += b * residuals[t - j - 1];
        }
        let e = w[t] - fitted;
        residuals[t] = e;
        ssq += e * e;
    }

    let n_used = n - ncond;
    let (sigma2, loglik) = concentrated_loglik(ssq, 0.0, n_used);
    CssOutput {
        n_used,
        ssq,
        sigma2,
        loglik,
        residuals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_white_noise() {
        let w = [1.0, -1.0, 2.0, -2.0, 0.5, -0.5];
        let out = css_residuals(&w, &[], &[]);
        assert_eq!(out.n_used, 6);
        assert_eq!(out.residuals, w.to_vec());
        let mean_sq = w.iter().map(|v| v * v).sum::<f64>() / 6.0;
        assert!((out.sigma2 - mean_sq).abs() < 1e-12);
    }

    #[test]
    fn test_ar1_conditions_on_first_observation() {
        let w = [1.0, 2.0, 0.5, -1.0];
        let out = css_residuals(&w, &[0.5], &[]);
        assert_eq!(out.n_used, 3);
        assert_eq!(out.residuals[0], 0.0);
        assert!((out.residuals[1] - 1.5).abs() < 1e-12);
        assert!((out.residuals[2] + 0.5).abs() < 1e-12);
        assert!((out.residuals[3] + 1.25).abs() < 1e-12);
        assert!((out.sigma2 - (2.25 + 0.25 + 1.5625) / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_ma1_recursion() {
        let w = [1.0, 1.0, 1.0];
        let out = css_residuals(&w, &[], &[0.5]);
        // e0 = 1, e1 = 1 - 0.5, e2 = 1 - 0.25
        assert_eq!(out.residuals, vec![1.0, 0.5, 0.75]);
    }

    #[test]
    fn test_short_series_is_empty_fit() {
        let out = css_residuals(&[1.0], &[0.5, 0.2], &[]);
        assert_eq!(out.n_used, 0);
        assert!(out.objective().is_infinite());
    }

    #[test]
    fn test_loglik_is_concentrated_gaussian() {
        let out = css_residuals(&[0.2, -0.4, 1.0, 0.3, -0.8], &[0.3], &[0.1]);
        let n = out.n_used as f64;
        let expected =
            -0.5 * n * ((2.0 * std::f64::consts::PI * out.sigma2).ln() + 1.0);
        assert!((out.loglik - expected).abs() < 1e-12);
    }
}
