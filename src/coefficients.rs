use crate::error::{ArimaError, Result};
use crate::polynomial::{expand_ar, expand_ma};
use crate::types::ArimaOrder;

/// Unvalidated coefficient set, turned into [`ArimaCoefficients`] by
/// [`ArimaCoefficients::new`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoefficientsSpec {
    pub ar: Vec<f64>,
    pub ma: Vec<f64>,
    pub sar: Vec<f64>,
    pub sma: Vec<f64>,
    pub d: usize,
    pub dd: usize,
    pub seasonal_frequency: usize,
    /// `None` excludes the mean term.
    pub mean: Option<f64>,
    /// `None` excludes the drift term.
    pub drift: Option<f64>,
}

/// Validated ARIMA coefficients.
#[derive(Debug, Clone, PartialEq)]
pub struct ArimaCoefficients {
    ar: Vec<f64>,
    ma: Vec<f64>,
    sar: Vec<f64>,
    sma: Vec<f64>,
    d: usize,
    dd: usize,
    seasonal_frequency: usize,
    mean: Option<f64>,
    drift: Option<f64>,
}

fn check_finite(name: &str, values: &[f64]) -> Result<()> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(i) => Err(ArimaError::InvalidConfiguration(format!(
            "{} coefficient {} is not finite",
            name, i
        ))),
        None => Ok(()),
    }
}

impl ArimaCoefficients {
    pub fn new(spec: CoefficientsSpec) -> Result<Self> {
        let integration = spec.d + spec.dd;
        if spec.mean.is_some() && integration > 0 {
            return Err(ArimaError::InvalidConfiguration(format!(
                "a mean cannot be included with d + D = {}",
                integration
            )));
        }
        if spec.drift.is_some() && integration > 1 {
            return Err(ArimaError::InvalidConfiguration(format!(
                "a drift cannot be included with d + D = {}",
                integration
            )));
        }
        let seasonal = !spec.sar.is_empty() || !spec.sma.is_empty() || spec.dd > 0;
        if seasonal && spec.seasonal_frequency < 2 {
            return Err(ArimaError::InvalidConfiguration(format!(
                "seasonal terms need a seasonal frequency of at least 2, got {}",
                spec.seasonal_frequency
            )));
        }
        check_finite("ar", &spec.ar)?;
        check_finite("ma", &spec.ma)?;
        check_finite("seasonal ar", &spec.sar)?;
        check_finite("seasonal ma", &spec.sma)?;
        check_finite("regression", &[spec.mean.unwrap_or(0.0), spec.drift.unwrap_or(0.0)])?;

        Ok(Self {
            ar: spec.ar,
            ma: spec.ma,
            sar: spec.sar,
            sma: spec.sma,
            d: spec.d,
            dd: spec.dd,
            seasonal_frequency: spec.seasonal_frequency,
            mean: spec.mean,
            drift: spec.drift,
        })
    }

    /// All-zero coefficients shaped like `order`, with regression terms at zero.
    pub fn zeros(order: &ArimaOrder, seasonal_frequency: usize) -> Result<Self> {
        Self::new(CoefficientsSpec {
            ar: vec![0.0; order.p()],
            ma: vec![0.0; order.q()],
            sar: vec![0.0; order.pp()],
            sma: vec![0.0; order.qq()],
            d: order.d(),
            dd: order.dd(),
            seasonal_frequency,
            mean: order.constant().then_some(0.0),
            drift: order.drift().then_some(0.0),
        })
    }

    pub fn ar(&self) -> &[f64] {
        &self.ar
    }

    pub fn ma(&self) -> &[f64] {
        &self.ma
    }

    pub fn sar(&self) -> &[f64] {
        &self.sar
    }

    pub fn sma(&self) -> &[f64] {
        &self.sma
    }

    pub fn d(&self) -> usize {
        self.d
    }

    pub fn dd(&self) -> usize {
        self.dd
    }

    pub fn seasonal_frequency(&self) -> usize {
        self.seasonal_frequency
    }

    /// Mean term (0 when excluded).
    pub fn mean(&self) -> f64 {
        self.mean.unwrap_or(0.0)
    }

    /// Drift per time step (0 when excluded).
    pub fn drift(&self) -> f64 {
        self.drift.unwrap_or(0.0)
    }

    pub fn has_mean(&self) -> bool {
        self.mean.is_some()
    }

    pub fn has_drift(&self) -> bool {
        self.drift.is_some()
    }

    /// The order these coefficients describe.
    pub fn order(&self) -> ArimaOrder {
        // Flags were validated against the differencing degrees in `new`.
        ArimaOrder::from_parts(
            [
                self.ar.len(),
                self.d,
                self.ma.len(),
                self.sar.len(),
                self.dd,
                self.sma.len(),
            ],
            self.has_mean(),
            self.has_drift(),
        )
    }

    /// Non-seasonal AR coefficients of length p + P*s.
    pub fn expanded_ar(&self) -> Vec<f64> {
        expand_ar(&self.ar, &self.sar, self.seasonal_frequency)
    }

    /// Non-seasonal MA coefficients of length q + Q*s.
    pub fn expanded_ma(&self) -> Vec<f64> {
        expand_ma(&self.ma, &self.sma, self.seasonal_frequency)
    }

    /// mean * (1 - sum of expanded AR coefficients)
    pub fn intercept(&self) -> f64 {
        self.mean() * (1.0 - self.expanded_ar().iter().sum::<f64>())
    }

    /// Regression effect mean + drift * t at 1-based time index `t`.
    pub fn regression_at(&self, t: usize) -> f64 {
        self.mean() + self.drift() * t as f64
    }

    pub(crate) fn with_arma(&self, ar: Vec<f64>, ma: Vec<f64>, sar: Vec<f64>, sma: Vec<f64>) -> Self {
        Self {
            ar,
            ma,
            sar,
            sma,
            ..self.clone()
        }
    }
}
