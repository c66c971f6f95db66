use nalgebra::{DMatrix, DVector};

/// State-space form of an ARIMA model with differencing folded into the state.
///
/// State equation:  alpha_{t+1} = T * alpha_t + R * eps_t
/// Observation:     y_t         = Z' * alpha_t
///
/// The first `k_arma = max(p', q' + 1)` states carry the ARMA recursion; the
/// remaining `k_diff` states hold the last undifferenced observations.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSpace {
    pub k_arma: usize,
    pub k_diff: usize,
    pub k_states: usize,
    pub phi: Vec<f64>,
    pub theta: Vec<f64>,
    pub delta: Vec<f64>,
    pub transition: DMatrix<f64>, // T: k_states × k_states
    pub selection: DVector<f64>,  // R: k_states
    pub design: DVector<f64>,     // Z: k_states
}

impl StateSpace {
    /// Build the model for expanded AR `phi`, expanded MA `theta` and
    /// differencing coefficients `delta` (empty for a plain ARMA model).
    pub fn new(phi: &[f64], theta: &[f64], delta: &[f64]) -> Self {
        let p = phi.len();
        let q = theta.len();
        let r = std::cmp::max(p, q + 1);
        let d = delta.len();
        let k = r + d;

        let mut design = DVector::zeros(k);
        design[0] = 1.0;
        for (j, &c) in delta.iter().enumerate() {
            design[r + j] = c;
        }

        let mut transition = DMatrix::zeros(k, k);
        for (i, &c) in phi.iter().enumerate() {
            transition[(i, 0)] = c;
        }
        for i in 0..r - 1 {
            transition[(i, i + 1)] = 1.0;
        }
        if d > 0 {
            // First differencing state receives the current observation.
            for j in 0..k {
                transition[(r, j)] = design[j];
            }
            for i in 1..d {
                transition[(r + i, r + i - 1)] = 1.0;
            }
        }

        let mut selection = DVector::zeros(k);
        selection[0] = 1.0;
        for (j, &c) in theta.iter().enumerate() {
            selection[j + 1] = c;
        }

        Self {
            k_arma: r,
            k_diff: d,
            k_states: k,
            phi: phi.to_vec(),
            theta: theta.to_vec(),
            delta: delta.to_vec(),
            transition,
            selection,
            design,
        }
    }

    /// R * R'
    pub fn state_noise(&self) -> DMatrix<f64> {
        &self.selection * self.selection.transpose()
    }
}
