//! Rayon-based parallel fitting and forecasting of independent series.
//!
//! Each series is estimated on its own; results come back in input order and
//! a failing series does not affect the others.

use rayon::prelude::*;

use crate::error::Result;
use crate::forecast::Forecast;
use crate::model::Arima;
use crate::series::TimeSeries;
use crate::types::{ArimaOrder, FitConfig};

/// Fit the same order to every series in parallel.
pub fn batch_fit(series: &[TimeSeries], order: &ArimaOrder, config: &FitConfig) -> Vec<Result<Arima>> {
    series
        .par_iter()
        .map(|s| Arima::fit(s, order, config))
        .collect()
}

/// Forecast every model `steps` ahead in parallel.
pub fn batch_forecast(models: &[Arima], steps: usize, alpha: f64) -> Vec<Result<Forecast>> {
    models
        .par_iter()
        .map(|m| m.forecast(steps, alpha))
        .collect()
}
