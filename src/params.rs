use crate::coefficients::{ArimaCoefficients, CoefficientsSpec};
use crate::error::{ArimaError, Result};
use crate::types::ArimaOrder;

/// Mapping between [`ArimaCoefficients`] and the optimizer's flat vector.
///
/// Layout: `[ar(p) | ma(q) | sar(P) | sma(Q) | mean/scale? | drift/scale?]`
///
/// Regression terms are divided by their OLS standard errors so every entry
/// has roughly unit curvature.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamLayout {
    order: ArimaOrder,
    seasonal_frequency: usize,
    mean_scale: f64,
    drift_scale: f64,
}

fn usable_scale(scale: f64) -> f64 {
    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        1.0
    }
}

impl ParamLayout {
    /// Layout with unit scaling.
    pub fn new(order: ArimaOrder, seasonal_frequency: usize) -> Self {
        Self::with_scales(order, seasonal_frequency, 1.0, 1.0)
    }

    /// Layout with regression scales; non-positive or non-finite scales fall back to 1.
    pub fn with_scales(
        order: ArimaOrder,
        seasonal_frequency: usize,
        mean_scale: f64,
        drift_scale: f64,
    ) -> Self {
        Self {
            order,
            seasonal_frequency,
            mean_scale: usable_scale(mean_scale),
            drift_scale: usable_scale(drift_scale),
        }
    }

    pub fn order(&self) -> &ArimaOrder {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.npar()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scale applied to each flat entry (1 for ARMA entries).
    pub fn scales(&self) -> Vec<f64> {
        let mut s = vec![1.0; self.order.sum_arma()];
        if self.order.constant() {
            s.push(self.mean_scale);
        }
        if self.order.drift() {
            s.push(self.drift_scale);
        }
        s
    }

    /// Number of leading ARMA entries (`ar | ma | sar | sma`).
    pub fn arma_len(&self) -> usize {
        self.order.sum_arma()
    }

    pub fn pack(&self, coefs: &ArimaCoefficients) -> Vec<f64> {
        let mut v = Vec::with_capacity(self.len());
        v.extend_from_slice(coefs.ar());
        v.extend_from_slice(coefs.ma());
        v.extend_from_slice(coefs.sar());
        v.extend_from_slice(coefs.sma());
        if self.order.constant() {
            v.push(coefs.mean() / self.mean_scale);
        }
        if self.order.drift() {
            v.push(coefs.drift() / self.drift_scale);
        }
        v
    }

    pub fn unpack(&self, flat: &[f64]) -> Result<ArimaCoefficients> {
        let expected = self.len();
        if flat.len() != expected {
            return Err(ArimaError::ParamLengthMismatch {
                expected,
                got: flat.len(),
            });
        }
        let o = &self.order;
        let mut i = 0;
        let mut take = |n: usize| {
            let part = flat[i..i + n].to_vec();
            i += n;
            part
        };
        let ar = take(o.p());
        let ma = take(o.q());
        let sar = take(o.pp());
        let sma = take(o.qq());
        let mean = o.constant().then(|| take(1)[0] * self.mean_scale);
        let drift = o.drift().then(|| take(1)[0] * self.drift_scale);

        ArimaCoefficients::new(CoefficientsSpec {
            ar,
            ma,
            sar,
            sma,
            d: o.d(),
            dd: o.dd(),
            seasonal_frequency: self.seasonal_frequency,
            mean,
            drift,
        })
    }
}
