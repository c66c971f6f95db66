use nalgebra::{DMatrix, DVector};

use crate::state_space::StateSpace;

/// Stationary covariance of the ARMA state, lower triangle packed by column
/// (column `i` holds rows `i..r`), length r(r+1)/2 with r = max(p, q+1).
///
/// Gardner, Harvey & Phillips (1980), AS 154: the equations
/// `vec(P) = vec(T P T') + vec(R R')` are solved one row at a time with a
/// square-root-free Givens regression, ordering the unknowns so that most
/// rows carry leading zeros.
pub fn stationary_covariance_packed(phi: &[f64], theta: &[f64]) -> Vec<f64> {
    let p = phi.len();
    let q = theta.len();
    let r = std::cmp::max(p, q + 1);
    let np = r * (r + 1) / 2;

    // Packed R R'
    let coef = |i: usize| -> f64 {
        if i == 0 {
            1.0
        } else if i - 1 < q {
            theta[i - 1]
        } else {
            0.0
        }
    };
    let mut v = Vec::with_capacity(np);
    for j in 0..r {
        for i in j..r {
            v.push(coef(i) * coef(j));
        }
    }

    if r == 1 {
        return if p == 0 {
            vec![1.0]
        } else {
            vec![1.0 / (1.0 - phi[0] * phi[0])]
        };
    }

    if p == 0 {
        return moving_average_covariance(&v, r);
    }

    let phi_at = |i: usize| if i < p { phi[i] } else { 0.0 };
    let nrbar = np * (np - 1) / 2;
    let mut regression = GivensRegression::new(np, nrbar);
    let mut xnext = vec![0.0; np];

    let npr = np - r;
    let mut ind = 0;
    let mut last_shift = 0;
    let mut next_shift = 0;
    let mut indj = npr;
    let mut ind2 = npr - 1;
    for j in 0..r {
        let phij = phi_at(j);
        xnext[indj] = 0.0;
        indj += 1;
        let mut indi = npr + 1 + j;
        for i in j..r {
            let ynext = v[ind];
            ind += 1;
            let phii = phi_at(i);
            if j != r - 1 {
                xnext[indj] = -phii;
                if i != r - 1 {
                    xnext[indi] -= phij;
                    last_shift = next_shift;
                    next_shift += 1;
                    xnext[last_shift] = -1.0;
                }
            }
            xnext[npr] = -phii * phij;
            ind2 += 1;
            if ind2 >= np {
                ind2 = 0;
            }
            xnext[ind2] += 1.0;
            regression.include_row(&xnext, ynext);
            xnext[ind2] = 0.0;
            if i != r - 1 {
                xnext[indi] = 0.0;
                indi += 1;
                xnext[last_shift] = 0.0;
            }
        }
    }

    let mut packed = regression.solve();

    // Undo the ordering: the last r unknowns are the first column.
    let first_col = packed[npr..].to_vec();
    for i in 0..npr {
        packed[np - 1 - i] = packed[npr - 1 - i];
    }
    packed[..r].copy_from_slice(&first_col);
    packed
}

/// Pure MA case: P solves P = S P S' + R R' with S the shift matrix, which
/// back-substitutes along the diagonals.
fn moving_average_covariance(v: &[f64], r: usize) -> Vec<f64> {
    let np = v.len();
    let mut packed = vec![0.0; np];
    let mut ind = np;
    let mut indn = np;
    for i in 0..r {
        for j in 0..=i {
            ind -= 1;
            packed[ind] = v[ind];
            if j != 0 {
                indn -= 1;
                packed[ind] += packed[indn];
            }
        }
    }
    packed
}

/// Square-root-free Givens QR accumulated one observation row at a time.
struct GivensRegression {
    np: usize,
    diag: Vec<f64>,
    rbar: Vec<f64>,
    thetab: Vec<f64>,
    xrow: Vec<f64>,
}

impl GivensRegression {
    fn new(np: usize, nrbar: usize) -> Self {
        Self {
            np,
            diag: vec![0.0; np],
            rbar: vec![0.0; nrbar],
            thetab: vec![0.0; np],
            xrow: vec![0.0; np],
        }
    }

    /// Fold the row `(xnext, ynext)` into the decomposition.
    fn include_row(&mut self, xnext: &[f64], mut ynext: f64) {
        let np = self.np;
        self.xrow.copy_from_slice(xnext);
        let mut ithisr = 0;
        for i in 0..np {
            let xi = self.xrow[i];
            if xi == 0.0 {
                ithisr += np - i - 1;
                continue;
            }
            let di = self.diag[i];
            let dpi = di + xi * xi;
            self.diag[i] = dpi;
            let cbar = di / dpi;
            let sbar = xi / dpi;
            for k in i + 1..np {
                let xk = self.xrow[k];
                let rbthis = self.rbar[ithisr];
                self.xrow[k] = xk - xi * rbthis;
                self.rbar[ithisr] = cbar * rbthis + sbar * xk;
                ithisr += 1;
            }
            let yk = ynext;
            ynext = yk - xi * self.thetab[i];
            self.thetab[i] = cbar * self.thetab[i] + sbar * yk;
            if di == 0.0 {
                return;
            }
        }
    }

    /// Back substitution through the unit upper-triangular factor.
    fn solve(&self) -> Vec<f64> {
        let np = self.np;
        let mut out = vec![0.0; np];
        let mut ithisr = self.rbar.len();
        for i in 0..np {
            let im = np - 1 - i;
            let mut bi = self.thetab[im];
            let mut jm = np;
            for _ in 0..i {
                ithisr -= 1;
                jm -= 1;
                bi -= self.rbar[ithisr] * out[jm];
            }
            out[im] = bi;
        }
        out
    }
}

/// Expand a column-packed lower triangle into a full symmetric r × r matrix.
pub fn unpack_symmetric(packed: &[f64], r: usize) -> DMatrix<f64> {
    let mut m = DMatrix::zeros(r, r);
    let mut ind = 0;
    for col in 0..r {
        for row in col..r {
            m[(row, col)] = packed[ind];
            m[(col, row)] = packed[ind];
            ind += 1;
        }
    }
    m
}

/// Kalman filter initial state and covariance.
#[derive(Debug, Clone)]
pub struct KalmanInit {
    /// Initial state vector a_0 (zeros).
    pub initial_state: DVector<f64>,
    /// Initial state covariance P_0: stationary ARMA block, kappa * I on the
    /// differencing states.
    pub initial_state_cov: DMatrix<f64>,
}

impl KalmanInit {
    pub fn from_state_space(ss: &StateSpace, kappa: f64) -> Self {
        let k = ss.k_states;
        let r = ss.k_arma;
        let q0 = unpack_symmetric(&stationary_covariance_packed(&ss.phi, &ss.theta), r);
        let mut cov = DMatrix::zeros(k, k);
        cov.view_mut((0, 0), (r, r)).copy_from(&q0);
        for i in r..k {
            cov[(i, i)] = kappa;
        }
        Self {
            initial_state: DVector::zeros(k),
            initial_state_cov: cov,
        }
    }

    /// Default kappa for the diffuse differencing states.
    pub fn default_kappa() -> f64 {
        1e6
    }
}
