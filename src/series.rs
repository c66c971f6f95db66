//! Immutable univariate time series observed at a fixed period.

use crate::error::{ArimaError, Result};

/// Calendar unit of a [`TimePeriod`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

const SECONDS_PER_DAY: f64 = 86_400.0;
// Mean Gregorian month.
const DAYS_PER_MONTH: f64 = 30.436_875;

impl TimeUnit {
    fn seconds(self) -> f64 {
        match self {
            TimeUnit::Second => 1.0,
            TimeUnit::Minute => 60.0,
            TimeUnit::Hour => 3_600.0,
            TimeUnit::Day => SECONDS_PER_DAY,
            TimeUnit::Week => 7.0 * SECONDS_PER_DAY,
            TimeUnit::Month => DAYS_PER_MONTH * SECONDS_PER_DAY,
            TimeUnit::Quarter => 3.0 * DAYS_PER_MONTH * SECONDS_PER_DAY,
            TimeUnit::Year => 12.0 * DAYS_PER_MONTH * SECONDS_PER_DAY,
        }
    }

    fn is_calendar(self) -> bool {
        matches!(self, TimeUnit::Month | TimeUnit::Quarter | TimeUnit::Year)
    }

    fn months(self) -> f64 {
        match self {
            TimeUnit::Month => 1.0,
            TimeUnit::Quarter => 3.0,
            TimeUnit::Year => 12.0,
            _ => self.seconds() / (DAYS_PER_MONTH * SECONDS_PER_DAY),
        }
    }
}

/// A length of time: `length` repetitions of `unit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimePeriod {
    pub unit: TimeUnit,
    pub length: u32,
}

impl TimePeriod {
    pub fn new(unit: TimeUnit, length: u32) -> Self {
        Self { unit, length }
    }

    pub fn day() -> Self {
        Self::new(TimeUnit::Day, 1)
    }

    pub fn week() -> Self {
        Self::new(TimeUnit::Week, 1)
    }

    pub fn month() -> Self {
        Self::new(TimeUnit::Month, 1)
    }

    pub fn quarter() -> Self {
        Self::new(TimeUnit::Quarter, 1)
    }

    pub fn year() -> Self {
        Self::new(TimeUnit::Year, 1)
    }

    /// How many of `other` fit into `self`.
    ///
    /// Calendar units (month, quarter, year) are compared in months so that
    /// `year / month` is exactly 12; mixed comparisons go through seconds.
    pub fn ratio(&self, other: &TimePeriod) -> f64 {
        let len = f64::from(self.length);
        let other_len = f64::from(other.length);
        if self.unit.is_calendar() && other.unit.is_calendar() {
            (len * self.unit.months()) / (other_len * other.unit.months())
        } else {
            (len * self.unit.seconds()) / (other_len * other.unit.seconds())
        }
    }
}

/// Difference `values` at `lag`, `times` times.
///
/// Each pass shortens the series by `lag`; an over-differenced input yields
/// an empty vector.
pub fn difference(values: &[f64], lag: usize, times: usize) -> Vec<f64> {
    let mut out = values.to_vec();
    for _ in 0..times {
        if lag == 0 || out.len() <= lag {
            return vec![];
        }
        out = (lag..out.len()).map(|t| out[t] - out[t - lag]).collect();
    }
    out
}

/// Ordered, immutable observations with a fixed observation period.
///
/// All transforms return new series.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    values: Vec<f64>,
    period: TimePeriod,
    seasonal_cycle: TimePeriod,
}

impl TimeSeries {
    /// Series with a yearly period and no seasonality (frequency 1).
    pub fn new(values: Vec<f64>) -> Result<Self> {
        Self::with_period(values, TimePeriod::year(), TimePeriod::year())
    }

    /// Series observed every `period` with a seasonal cycle of `seasonal_cycle`.
    pub fn with_period(
        values: Vec<f64>,
        period: TimePeriod,
        seasonal_cycle: TimePeriod,
    ) -> Result<Self> {
        if values.is_empty() {
            return Err(ArimaError::DataError("time series is empty".into()));
        }
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(ArimaError::DataError(format!(
                "observation {} is not finite ({})",
                i, values[i]
            )));
        }
        if period.length == 0 || seasonal_cycle.length == 0 {
            return Err(ArimaError::InvalidConfiguration(
                "time periods must have a positive length".into(),
            ));
        }
        Ok(Self {
            values,
            period,
            seasonal_cycle,
        })
    }

    fn derive(&self, values: Vec<f64>) -> Result<Self> {
        Self::with_period(values, self.period, self.seasonal_cycle)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false: a series holds at least one observation.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Result<f64> {
        self.values
            .get(index)
            .copied()
            .ok_or(ArimaError::IndexOutOfBounds {
                index,
                len: self.values.len(),
            })
    }

    pub fn last(&self) -> f64 {
        self.values[self.values.len() - 1]
    }

    pub fn period(&self) -> TimePeriod {
        self.period
    }

    pub fn seasonal_cycle(&self) -> TimePeriod {
        self.seasonal_cycle
    }

    /// Observations per seasonal cycle, at least 1.
    pub fn frequency(&self) -> usize {
        let ratio = self.seasonal_cycle.ratio(&self.period).round();
        if ratio >= 1.0 {
            ratio as usize
        } else {
            1
        }
    }

    /// Difference at `lag`, repeated `times` times.
    pub fn difference(&self, lag: usize, times: usize) -> Result<Self> {
        if times == 0 {
            return Ok(self.clone());
        }
        if lag == 0 {
            return Err(ArimaError::InvalidConfiguration(
                "differencing lag must be positive".into(),
            ));
        }
        let diffed = difference(&self.values, lag, times);
        if diffed.is_empty() {
            return Err(ArimaError::DataError(format!(
                "cannot difference {} observations {} time(s) at lag {}",
                self.len(),
                times,
                lag
            )));
        }
        self.derive(diffed)
    }

    /// Element-wise `self - other`.
    pub fn minus(&self, other: &TimeSeries) -> Result<Self> {
        if other.len() != self.len() {
            return Err(ArimaError::DimensionMismatch {
                expected: self.len(),
                got: other.len(),
            });
        }
        self.derive(
            self.values
                .iter()
                .zip(other.values.iter())
                .map(|(a, b)| a - b)
                .collect(),
        )
    }

    /// Observations in `from..to`.
    pub fn slice(&self, from: usize, to: usize) -> Result<Self> {
        if to > self.len() {
            return Err(ArimaError::IndexOutOfBounds {
                index: to,
                len: self.len(),
            });
        }
        if from >= to {
            return Err(ArimaError::InvalidConfiguration(format!(
                "empty slice {}..{}",
                from, to
            )));
        }
        self.derive(self.values[from..to].to_vec())
    }

    pub fn mean(&self) -> f64 {
        self.values.iter().sum::<f64>() / self.len() as f64
    }

    /// Sample variance (n − 1 denominator); zero for a single observation.
    pub fn variance(&self) -> f64 {
        let n = self.len();
        if n < 2 {
            return 0.0;
        }
        let m = self.mean();
        self.values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}
