use crate::error::{ArimaError, Result};

/// Seasonal ARIMA order (p,d,q)(P,D,Q) with mean/drift flags.
///
/// The seasonal period is not part of the order; it comes from the series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArimaOrder {
    p: usize,  // AR order
    d: usize,  // differencing order
    q: usize,  // MA order
    pp: usize, // seasonal AR order (P)
    dd: usize, // seasonal differencing order (D)
    qq: usize, // seasonal MA order (Q)
    constant: bool,
    drift: bool,
}

impl ArimaOrder {
    /// Non-seasonal order; a constant is included iff the model is undifferenced.
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self::seasonal(p, d, q, 0, 0, 0)
    }

    /// Seasonal order with the default flags (constant iff d + D == 0, no drift).
    pub fn seasonal(p: usize, d: usize, q: usize, pp: usize, dd: usize, qq: usize) -> Self {
        Self {
            p,
            d,
            q,
            pp,
            dd,
            qq,
            constant: d + dd == 0,
            drift: false,
        }
    }

    /// Seasonal order with explicit flags.
    ///
    /// A constant is redundant once the series is differenced, and a drift
    /// once it is differenced more than once.
    pub fn with_flags(
        p: usize,
        d: usize,
        q: usize,
        pp: usize,
        dd: usize,
        qq: usize,
        constant: bool,
        drift: bool,
    ) -> Result<Self> {
        let integration = d + dd;
        if constant && integration > 0 {
            return Err(ArimaError::InvalidConfiguration(format!(
                "a constant cannot be included with d + D = {}",
                integration
            )));
        }
        if drift && integration > 1 {
            return Err(ArimaError::InvalidConfiguration(format!(
                "a drift cannot be included with d + D = {}",
                integration
            )));
        }
        Ok(Self::from_parts([p, d, q, pp, dd, qq], constant, drift))
    }

    pub(crate) fn from_parts(orders: [usize; 6], constant: bool, drift: bool) -> Self {
        let [p, d, q, pp, dd, qq] = orders;
        Self {
            p,
            d,
            q,
            pp,
            dd,
            qq,
            constant,
            drift,
        }
    }

    pub fn p(&self) -> usize {
        self.p
    }

    pub fn d(&self) -> usize {
        self.d
    }

    pub fn q(&self) -> usize {
        self.q
    }

    /// Seasonal AR order (P).
    pub fn pp(&self) -> usize {
        self.pp
    }

    /// Seasonal differencing order (D).
    pub fn dd(&self) -> usize {
        self.dd
    }

    /// Seasonal MA order (Q).
    pub fn qq(&self) -> usize {
        self.qq
    }

    pub fn constant(&self) -> bool {
        self.constant
    }

    pub fn drift(&self) -> bool {
        self.drift
    }

    pub fn is_seasonal(&self) -> bool {
        self.pp + self.dd + self.qq > 0
    }

    /// p + q + P + Q
    pub fn sum_arma(&self) -> usize {
        self.p + self.q + self.pp + self.qq
    }

    pub fn num_regressors(&self) -> usize {
        usize::from(self.constant) + usize::from(self.drift)
    }

    /// Number of estimated coefficients (sigma² excluded).
    pub fn npar(&self) -> usize {
        self.sum_arma() + self.num_regressors()
    }

    /// Expanded AR order: p + s*P
    pub fn k_ar(&self, s: usize) -> usize {
        self.p + s * self.pp
    }

    /// Expanded MA order: q + s*Q
    pub fn k_ma(&self, s: usize) -> usize {
        self.q + s * self.qq
    }

    /// ARMA state dimension: max(k_ar, k_ma + 1)
    pub fn k_order(&self, s: usize) -> usize {
        std::cmp::max(self.k_ar(s), self.k_ma(s) + 1)
    }

    /// Observations lost to differencing: d + s*D
    pub fn k_diff(&self, s: usize) -> usize {
        self.d + s * self.dd
    }

    /// Total state dimension
    pub fn k_states(&self, s: usize) -> usize {
        self.k_order(s) + self.k_diff(s)
    }

    /// Fail when seasonal terms are requested without a seasonal period.
    pub fn check_frequency(&self, s: usize) -> Result<()> {
        if self.is_seasonal() && s < 2 {
            return Err(ArimaError::InvalidConfiguration(format!(
                "seasonal order ({}, {}, {}) needs a seasonal frequency of at least 2, got {}",
                self.pp, self.dd, self.qq, s
            )));
        }
        Ok(())
    }
}

/// Likelihood used during estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FitStrategy {
    /// Conditional sum of squares only.
    Css,
    /// Exact Gaussian likelihood via the Kalman filter.
    Ml,
    /// CSS warm start refined by exact maximum likelihood.
    CssMl,
}

impl FitStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            FitStrategy::Css => "CSS",
            FitStrategy::Ml => "ML",
            FitStrategy::CssMl => "CSS-ML",
        }
    }
}

/// Where coefficient standard errors come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HessianSource {
    /// Inverse Hessian approximation accumulated by BFGS.
    Bfgs,
    /// Central-difference Hessian of the objective at the optimum.
    Numerical,
}

/// Estimation settings.
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub strategy: FitStrategy,
    /// BFGS iteration budget per optimization stage.
    pub max_iters: u64,
    /// Gradient-norm and cost-change tolerance.
    pub tolerance: f64,
    /// Retry with Nelder-Mead from the best point when BFGS errors out.
    pub nelder_mead_fallback: bool,
    pub hessian: HessianSource,
    /// Prior variance of the differencing states.
    pub kappa: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            strategy: FitStrategy::CssMl,
            max_iters: 100,
            tolerance: f64::EPSILON.sqrt(),
            nelder_mead_fallback: true,
            hessian: HessianSource::Bfgs,
            kappa: 1e6,
        }
    }
}

impl FitConfig {
    pub fn with_strategy(mut self, strategy: FitStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_max_iters(mut self, max_iters: u64) -> Self {
        self.max_iters = max_iters;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_hessian(mut self, hessian: HessianSource) -> Self {
        self.hessian = hessian;
        self
    }

    pub fn without_fallback(mut self) -> Self {
        self.nelder_mead_fallback = false;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(ArimaError::InvalidConfiguration(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if !(self.kappa.is_finite() && self.kappa > 0.0) {
            return Err(ArimaError::InvalidConfiguration(format!(
                "kappa must be positive, got {}",
                self.kappa
            )));
        }
        Ok(())
    }
}
