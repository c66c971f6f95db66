//! Seasonal ARIMA estimation and forecasting.
//!
//! A model of a given order is fitted by conditional sum of squares, exact
//! maximum likelihood (Kalman filter on the state-space form), or CSS
//! followed by ML, with BFGS driving the search:
//!
//! ```no_run
//! use arima_rs::{Arima, ArimaOrder, FitConfig, TimeSeries};
//!
//! let series = TimeSeries::new(vec![2.4, 2.4, 2.4, 2.2, 2.1, 1.5, 2.3, 2.3, 2.5, 2.0]).unwrap();
//! let model = Arima::fit(&series, &ArimaOrder::new(1, 0, 0), &FitConfig::default()).unwrap();
//! let forecast = model.forecast(12, 0.05).unwrap();
//! println!("{:?}", forecast.mean);
//! ```

pub mod error;
pub mod series;
pub mod types;
pub mod polynomial;
pub mod coefficients;
pub mod params;
pub mod regression;
pub mod state_space;
pub mod initialization;
pub mod kalman;
pub mod css;
pub mod optimizer;
pub mod model;
pub mod forecast;
pub mod simulate;
pub mod batch;

pub use coefficients::{ArimaCoefficients, CoefficientsSpec};
pub use error::{ArimaError, Result};
pub use forecast::Forecast;
pub use model::{Arima, EstimationStage, ModelInformation};
pub use optimizer::OptimizerReport;
pub use series::{TimePeriod, TimeSeries, TimeUnit};
pub use types::{ArimaOrder, FitConfig, FitStrategy, HessianSource};
