//! Lag-polynomial algebra.
//!
//! Polynomials are stored lowest power first: `[c0, c1, c2, ...]` means
//! `c0 + c1*L + c2*L^2 + ...`.

use nalgebra::linalg::Schur;
use nalgebra::{Complex, DMatrix};

/// Polynomial multiplication (convolution): c[k] = sum_i a[i]*b[k-i].
pub fn polymul(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return vec![];
    }
    let mut r = vec![0.0; a.len() + b.len() - 1];
    for (i, &ai) in a.iter().enumerate() {
        for (j, &bj) in b.iter().enumerate() {
            r[i + j] += ai * bj;
        }
    }
    r
}

/// 1 - c_1*L^s - c_2*L^(2s) - ...
fn lag_poly(coeffs: &[f64], s: usize, sign: f64) -> Vec<f64> {
    let s = s.max(1);
    let mut p = vec![0.0; coeffs.len() * s + 1];
    p[0] = 1.0;
    for (i, &c) in coeffs.iter().enumerate() {
        p[(i + 1) * s] = sign * c;
    }
    p
}

/// AR polynomial: 1 - phi_1*L - phi_2*L^2 - ...
pub fn make_ar_poly(coeffs: &[f64]) -> Vec<f64> {
    lag_poly(coeffs, 1, -1.0)
}

/// Seasonal AR polynomial: 1 - Phi_1*L^s - Phi_2*L^(2s) - ...
pub fn make_seasonal_ar_poly(coeffs: &[f64], s: usize) -> Vec<f64> {
    lag_poly(coeffs, s, -1.0)
}

/// MA polynomial: 1 + theta_1*L + theta_2*L^2 + ...
pub fn make_ma_poly(coeffs: &[f64]) -> Vec<f64> {
    lag_poly(coeffs, 1, 1.0)
}

/// Seasonal MA polynomial: 1 + Theta_1*L^s + Theta_2*L^(2s) + ...
pub fn make_seasonal_ma_poly(coeffs: &[f64], s: usize) -> Vec<f64> {
    lag_poly(coeffs, s, 1.0)
}

/// Non-seasonal AR coefficients equivalent to (ar, sar) at period `s`.
///
/// The result has length `p + P*s`; with `sar` empty it equals `ar`.
pub fn expand_ar(ar: &[f64], sar: &[f64], s: usize) -> Vec<f64> {
    let poly = polymul(&make_ar_poly(ar), &make_seasonal_ar_poly(sar, s));
    poly[1..].iter().map(|c| -c).collect()
}

/// Non-seasonal MA coefficients equivalent to (ma, sma) at period `s`.
pub fn expand_ma(ma: &[f64], sma: &[f64], s: usize) -> Vec<f64> {
    let poly = polymul(&make_ma_poly(ma), &make_seasonal_ma_poly(sma, s));
    poly[1..].to_vec()
}

/// Differencing operator (1 - L)^d (1 - L^s)^D.
pub fn differencing_poly(d: usize, dd: usize, s: usize) -> Vec<f64> {
    let mut poly = vec![1.0];
    for _ in 0..d {
        poly = polymul(&poly, &[1.0, -1.0]);
    }
    for _ in 0..dd {
        poly = polymul(&poly, &make_seasonal_ar_poly(&[1.0], s));
    }
    poly
}

/// Coefficients `delta` such that the differenced series is
/// `y_t - sum_i delta_i * y_{t-i-1}`; length `d + D*s`.
pub fn differencing_delta(d: usize, dd: usize, s: usize) -> Vec<f64> {
    differencing_poly(d, dd, s)[1..].iter().map(|c| -c).collect()
}

/// Apply the difference filter defined by `delta`.
///
/// Output length is `y.len() - delta.len()` (empty if too short).
pub fn apply_delta(y: &[f64], delta: &[f64]) -> Vec<f64> {
    let k = delta.len();
    if y.len() <= k {
        return vec![];
    }
    (k..y.len())
        .map(|t| y[t] - delta.iter().enumerate().map(|(i, &c)| c * y[t - i - 1]).sum::<f64>())
        .collect()
}

/// Roots of `coeffs[0] + coeffs[1]*z + ... + coeffs[n]*z^n`.
///
/// Trailing zero coefficients are dropped before solving. Returns `None` when
/// the coefficients are not finite or the eigen-solver does not converge; a
/// constant polynomial has no roots.
pub fn roots(coeffs: &[f64]) -> Option<Vec<Complex<f64>>> {
    if coeffs.iter().any(|c| !c.is_finite()) {
        return None;
    }
    let degree = match coeffs.iter().rposition(|&c| c != 0.0) {
        Some(deg) => deg,
        None => return Some(vec![]),
    };
    if degree == 0 {
        return Some(vec![]);
    }
    let lead = coeffs[degree];
    if degree == 1 {
        return Some(vec![Complex::new(-coeffs[0] / lead, 0.0)]);
    }

    // Companion matrix of the monic polynomial; its eigenvalues are the roots.
    let mut companion = DMatrix::<f64>::zeros(degree, degree);
    for j in 0..degree {
        companion[(0, j)] = -coeffs[degree - 1 - j] / lead;
    }
    for i in 1..degree {
        companion[(i, i - 1)] = 1.0;
    }
    let schur = Schur::try_new(companion, f64::EPSILON, 10_000)?;
    Some(schur.complex_eigenvalues().iter().copied().collect())
}

fn roots_outside_unit_circle(poly: &[f64]) -> bool {
    match roots(poly) {
        Some(rs) => rs.iter().all(|z| z.norm() > 1.0),
        None => false,
    }
}

/// True when 1 - phi_1*z - ... - phi_p*z^p has all roots outside the unit circle.
pub fn is_stationary(ar: &[f64]) -> bool {
    if ar.iter().all(|&c| c == 0.0) {
        return true;
    }
    roots_outside_unit_circle(&make_ar_poly(ar))
}

/// True when 1 + theta_1*z + ... + theta_q*z^q has all roots outside the unit circle.
pub fn is_invertible(ma: &[f64]) -> bool {
    if ma.iter().all(|&c| c == 0.0) {
        return true;
    }
    roots_outside_unit_circle(&make_ma_poly(ma))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
