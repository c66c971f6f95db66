//! Sample paths of a seasonal ARIMA process.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::coefficients::ArimaCoefficients;
use crate::error::{ArimaError, Result};
use crate::forecast::integrate;
use crate::polynomial::differencing_delta;

/// Draw `n` observations from the model described by `coefs` with Gaussian
/// innovations of standard deviation `sigma`.
///
/// The ARMA recursion starts from zeros and runs `burn_in` extra steps that
/// are discarded. The differenced process is integrated from a zero history,
/// then mean + drift * t (t = 1..n) is added.
pub fn simulate<R: Rng + ?Sized>(
    coefs: &ArimaCoefficients,
    n: usize,
    sigma: f64,
    burn_in: usize,
    rng: &mut R,
) -> Result<Vec<f64>> {
    if !(sigma.is_finite() && sigma >= 0.0) {
        return Err(ArimaError::InvalidConfiguration(format!(
            "innovation sd must be finite and non-negative, got {}",
            sigma
        )));
    }
    let noise = Normal::new(0.0, sigma)
        .map_err(|e| ArimaError::InvalidConfiguration(format!("innovation sd {}: {}", sigma, e)))?;
    let phi = coefs.expanded_ar();
    let theta = coefs.expanded_ma();

    let total = burn_in + n;
    let mut shocks = Vec::with_capacity(total);
    for _ in 0..total {
        shocks.push(noise.sample(rng));
    }
    let mut w = vec![0.0; total];
    for t in 0..total {
        let mut v = shocks[t];
        for (i, &a) in phi.iter().enumerate().take(t) {
            v += a * w[t - i - 1];
        }
        for (j, &b) in theta.iter().enumerate().take(t) {
            v += b * shocks[t - j - 1];
        }
        w[t] = v;
    }

    let delta = differencing_delta(coefs.d(), coefs.dd(), coefs.seasonal_frequency());
    let integrated = integrate(&[], &w[burn_in..], &delta);
    Ok(integrated[delta.len()..]
        .iter()
        .enumerate()
        .map(|(t, v)| v + coefs.regression_at(t + 1))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coefficients::CoefficientsSpec;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn coefs(spec: CoefficientsSpec) -> ArimaCoefficients {
        ArimaCoefficients::new(spec).unwrap()
    }

    #[test]
    fn test_reproducible_with_seed() {
        let c = coefs(CoefficientsSpec {
            ar: vec![0.5],
            ma: vec![0.3],
            ..Default::default()
        });
        let a = simulate(&c, 50, 1.0, 20, &mut StdRng::seed_from_u64(7)).unwrap();
        let b = simulate(&c, 50, 1.0, 20, &mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 50);
    }

    #[test]
    fn test_white_noise_with_mean() {
        let c = coefs(CoefficientsSpec {
            mean: Some(3.0),
            ..Default::default()
        });
        let x = simulate(&c, 2000, 0.5, 0, &mut StdRng::seed_from_u64(1)).unwrap();
        let mean = x.iter().sum::<f64>() / x.len() as f64;
        let var = x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (x.len() - 1) as f64;
        assert!((mean - 3.0).abs() < 0.05);
        assert!((var - 0.25).abs() < 0.03);
    }

    #[test]
    fn test_random_walk_increments_are_shocks() {
        let walk = coefs(CoefficientsSpec {
            d: 1,
            ..Default::default()
        });
        let x = simulate(&walk, 30, 1.0, 0, &mut StdRng::seed_from_u64(4)).unwrap();
        let noise = coefs(CoefficientsSpec::default());
        let e = simulate(&noise, 30, 1.0, 0, &mut StdRng::seed_from_u64(4)).unwrap();
        let mut level: f64 = 0.0;
        for (v, shock) in x.iter().zip(&e) {
            level += shock;
            assert!((v - level).abs() < 1e-12);
        }
    }

    #[test]
    fn test_invalid_sigma() {
        let c = coefs(CoefficientsSpec::default());
        let mut rng = StdRng::seed_from_u64(0);
        for sigma in [-1.0, f64::NAN, f64::INFINITY] {
            let err = simulate(&c, 5, sigma, 0, &mut rng).unwrap_err();
            assert!(matches!(err, ArimaError::InvalidConfiguration(_)), "sigma {}", sigma);
        }
    }

    #[test]
    fn test_zero_sigma_is_deterministic() {
        let c = coefs(CoefficientsSpec {
            ar: vec![0.5],
            mean: Some(2.0),
            ..Default::default()
        });
        let x = simulate(&c, 5, 0.0, 10, &mut StdRng::seed_from_u64(0)).unwrap();
        assert_eq!(x, vec![2.0; 5]);
    }
}
