use nalgebra::{DMatrix, DVector};

use crate::error::{ArimaError, Result};

/// Ordinary least squares fit `y = X b + e`.
#[derive(Debug, Clone)]
pub struct OlsFit {
    pub coefficients: Vec<f64>,
    /// Coefficient standard errors; NaN when the residual variance is undefined.
    pub std_errors: Vec<f64>,
    /// Residual variance RSS / (n - k).
    pub sigma2: f64,
    pub residuals: Vec<f64>,
}

/// Least squares of `y` on the regressor `columns` (no implicit intercept).
pub fn ols(y: &[f64], columns: &[Vec<f64>]) -> Result<OlsFit> {
    let n = y.len();
    let k = columns.len();
    if k == 0 {
        return Err(ArimaError::InvalidConfiguration(
            "regression needs at least one regressor".into(),
        ));
    }
    if let Some(col) = columns.iter().find(|c| c.len() != n) {
        return Err(ArimaError::DimensionMismatch {
            expected: n,
            got: col.len(),
        });
    }
    if n < k {
        return Err(ArimaError::DataError(format!(
            "regression with {} regressors needs at least {} observations, got {}",
            k, k, n
        )));
    }

    let x = DMatrix::from_fn(n, k, |t, j| columns[j][t]);
    let yv = DVector::from_column_slice(y);
    let xtx = x.transpose() * &x;
    let xtx_inv = xtx.try_inverse().ok_or_else(|| {
        ArimaError::DataError("regressors are linearly dependent".into())
    })?;
    let beta = &xtx_inv * (x.transpose() * &yv);
    let resid = &yv - &x * &beta;

    let dof = n - k;
    let sigma2 = if dof > 0 {
        resid.norm_squared() / dof as f64
    } else {
        f64::NAN
    };
    let std_errors = (0..k)
        .map(|j| {
            let v = sigma2 * xtx_inv[(j, j)];
            if v >= 0.0 {
                v.sqrt()
            } else {
                f64::NAN
            }
        })
        .collect();

    Ok(OlsFit {
        coefficients: beta.iter().copied().collect(),
        std_errors,
        sigma2,
        residuals: resid.iter().copied().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ols_line() {
        // y = 2 + 0.5 t exactly
        let t: Vec<f64> = (1..=10).map(|i| i as f64).collect();
        let y: Vec<f64> = t.iter().map(|v| 2.0 + 0.5 * v).collect();
        let fit = ols(&y, &[vec![1.0; 10], t]).unwrap();
        assert!((fit.coefficients[0] - 2.0).abs() < 1e-10);
        assert!((fit.coefficients[1] - 0.5).abs() < 1e-10);
        assert!(fit.sigma2.abs() < 1e-20);
        assert!(fit.residuals.iter().all(|r| r.abs() < 1e-10));
    }

    #[test]
    fn test_ols_mean_standard_error() {
        // Intercept-only regression: coefficient = mean, se = sd / sqrt(n)
        let y = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let fit = ols(&y, &[vec![1.0; 5]]).unwrap();
        assert!((fit.coefficients[0] - 3.0).abs() < 1e-12);
        assert!((fit.sigma2 - 2.5).abs() < 1e-12);
        assert!((fit.std_errors[0] - (2.5f64 / 5.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_ols_errors() {
        assert!(ols(&[1.0, 2.0], &[]).is_err());
        assert!(matches!(
            ols(&[1.0, 2.0], &[vec![1.0]]),
            Err(ArimaError::DimensionMismatch { .. })
        ));
        assert!(ols(&[1.0, 2.0, 3.0], &[vec![1.0; 3], vec![2.0; 3]]).is_err());
    }
}
