//! End-to-end behaviour of fitting and forecasting.

use arima_rs::forecast::integrate;
use arima_rs::polynomial::{differencing_delta, expand_ar, expand_ma};
use arima_rs::simulate::simulate;
use arima_rs::{
    Arima, ArimaCoefficients, ArimaError, ArimaOrder, CoefficientsSpec, FitConfig, FitStrategy,
    HessianSource, TimePeriod, TimeSeries,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn simulated(spec: CoefficientsSpec, n: usize, seed: u64) -> Vec<f64> {
    let coefs = ArimaCoefficients::new(spec).unwrap();
    simulate(&coefs, n, 1.0, 200, &mut StdRng::seed_from_u64(seed)).unwrap()
}

fn arma11(n: usize, seed: u64) -> TimeSeries {
    TimeSeries::new(simulated(
        CoefficientsSpec {
            ar: vec![0.6],
            ma: vec![0.3],
            mean: Some(1.5),
            ..Default::default()
        },
        n,
        seed,
    ))
    .unwrap()
}

fn no_regression(p: usize, d: usize, q: usize) -> ArimaOrder {
    ArimaOrder::with_flags(p, d, q, 0, 0, 0, false, false).unwrap()
}

#[test]
fn test_constant_defaults_follow_differencing() {
    assert!(ArimaOrder::new(1, 0, 1).constant());
    assert!(!ArimaOrder::new(1, 1, 1).constant());
    assert!(!ArimaOrder::seasonal(0, 0, 1, 0, 1, 1).constant());
    assert!(!ArimaOrder::new(1, 0, 1).drift());
}

#[test]
fn test_expansion_without_seasonal_terms() {
    assert_eq!(expand_ar(&[0.3, 0.2], &[], 12), vec![0.3, 0.2]);
    assert_eq!(expand_ma(&[0.4], &[], 12), vec![0.4]);
    assert_eq!(expand_ar(&[], &[0.7], 4), vec![0.0, 0.0, 0.0, 0.7]);
}

#[test]
fn test_white_noise_fits_report_mean_square() {
    let values = vec![0.5, -1.2, 0.3, 0.9, -0.4, 1.1, -0.7, 0.2];
    let series = TimeSeries::new(values.clone()).unwrap();
    let mean_square = values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64;

    for strategy in [FitStrategy::Css, FitStrategy::Ml, FitStrategy::CssMl] {
        let config = FitConfig::default().with_strategy(strategy);
        let model = Arima::fit(&series, &no_regression(0, 0, 0), &config).unwrap();
        assert!((model.sigma2() - mean_square).abs() < 1e-12, "{:?}", strategy);
        for (r, v) in model.residuals().iter().zip(&values) {
            assert!((r - v).abs() < 1e-12);
        }
        assert!(model.std_errors().is_empty());
    }
}

#[test]
fn test_ar1_recovers_parameters() {
    let series = TimeSeries::new(simulated(
        CoefficientsSpec {
            ar: vec![0.5],
            ..Default::default()
        },
        200,
        42,
    ))
    .unwrap();
    let model = Arima::fit(&series, &ArimaOrder::new(1, 0, 0), &FitConfig::default()).unwrap();
    let phi = model.coefficients().ar()[0];
    assert!((phi - 0.5).abs() < 0.15, "phi {}", phi);
    assert!((model.sigma2() - 1.0).abs() < 0.3, "sigma2 {}", model.sigma2());
    assert!(model.coefficients().mean().abs() < 0.5);
    assert_eq!(model.residuals().len(), 200);
}

#[test]
fn test_constant_series() {
    let series = TimeSeries::new(vec![5.0; 40]).unwrap();
    let model = Arima::fit(&series, &ArimaOrder::new(0, 0, 0), &FitConfig::default()).unwrap();
    assert!((model.coefficients().mean() - 5.0).abs() < 1e-6);
    assert!(model.sigma2().abs() < 1e-10);
    assert!(model.residuals().iter().all(|r| r.abs() < 1e-6));
    assert!(model.loglik().is_finite());
}

#[test]
fn test_css_ml_improves_on_warm_start() {
    let series = arma11(150, 7);
    let order = ArimaOrder::new(1, 0, 1);

    let css = Arima::fit(&series, &order, &FitConfig::default().with_strategy(FitStrategy::Css)).unwrap();
    let warm = Arima::from_coefficients(&series, css.coefficients().clone()).unwrap();
    assert_eq!(warm.strategy(), FitStrategy::Ml);

    let full = Arima::fit(&series, &order, &FitConfig::default()).unwrap();
    assert_eq!(full.strategy(), FitStrategy::CssMl);
    assert!(
        full.loglik() >= warm.loglik() - 1e-8,
        "ML {} below warm start {}",
        full.loglik(),
        warm.loglik()
    );
}

#[test]
fn test_ar1_one_step_forecast() {
    let series = arma11(120, 3);
    let model = Arima::fit(&series, &ArimaOrder::new(1, 0, 0), &FitConfig::default()).unwrap();
    let coefs = model.coefficients();
    let phi = coefs.ar()[0];
    let last = series.last();

    let fc = model.forecast(1, 0.05).unwrap();
    assert!((fc.mean[0] - (coefs.intercept() + phi * last)).abs() < 1e-10);
    assert!((fc.mean[0] - (coefs.mean() + phi * (last - coefs.mean()))).abs() < 1e-10);
}

#[test]
fn test_interval_half_widths_non_decreasing() {
    let series = arma11(150, 21);
    let model = Arima::fit(&series, &ArimaOrder::new(1, 0, 1), &FitConfig::default()).unwrap();
    let fc = model.forecast(24, 0.2).unwrap();
    let half: Vec<f64> = fc.upper.iter().zip(&fc.mean).map(|(u, m)| u - m).collect();
    for h in 1..half.len() {
        assert!(half[h] >= half[h - 1] - 1e-12, "horizon {}", h);
    }
    assert_eq!(fc.alpha, 0.2);
}

#[test]
fn test_integration_continues_from_last_observations() {
    let values = [3.0, 4.5, 4.0, 6.0, 7.5, 7.0, 9.0, 10.5];
    let delta = differencing_delta(1, 1, 2);
    let out = integrate(&values, &[0.0, 0.0, 0.0], &delta);
    assert_eq!(&out[..delta.len()], &values[values.len() - delta.len()..]);

    let walk = TimeSeries::new(values.to_vec()).unwrap();
    let model = Arima::fit(&walk, &no_regression(0, 1, 0), &FitConfig::default()).unwrap();
    let fc = model.forecast(3, 0.05).unwrap();
    assert!(fc.mean.iter().all(|&m| m == 10.5));
}

#[test]
fn test_seasonal_model() {
    let values = simulated(
        CoefficientsSpec {
            ma: vec![-0.4],
            sma: vec![-0.5],
            d: 1,
            dd: 1,
            seasonal_frequency: 4,
            ..Default::default()
        },
        100,
        11,
    );
    let series = TimeSeries::with_period(values, TimePeriod::quarter(), TimePeriod::year()).unwrap();
    assert_eq!(series.frequency(), 4);

    let order = ArimaOrder::seasonal(0, 1, 1, 0, 1, 1);
    let model = Arima::fit(&series, &order, &FitConfig::default()).unwrap();
    assert_eq!(model.differenced().len(), 95);
    assert_eq!(model.residuals().len(), 100);
    assert!(model.coefficients().ma()[0].abs() < 1.0);
    assert!(model.coefficients().sma()[0].abs() < 1.0);
    assert!(model.sigma2() > 0.0 && model.loglik().is_finite());

    let fc = model.forecast(8, 0.05).unwrap();
    assert!(fc.mean.iter().all(|m| m.is_finite()));
    assert!(fc.std_errors[7] > fc.std_errors[0]);
}

#[test]
fn test_invalid_inputs() {
    let plain = TimeSeries::new((0..30).map(|t| (t as f64).sin()).collect()).unwrap();
    let seasonal = ArimaOrder::seasonal(0, 0, 0, 1, 0, 0);
    assert!(matches!(
        Arima::fit(&plain, &seasonal, &FitConfig::default()),
        Err(ArimaError::InvalidConfiguration(_))
    ));
    assert!(ArimaOrder::with_flags(0, 1, 0, 0, 0, 0, true, false).is_err());
    assert!(ArimaOrder::with_flags(0, 2, 0, 0, 0, 0, false, true).is_err());
    assert!(matches!(
        Arima::fit(&plain, &ArimaOrder::new(1, 0, 0), &FitConfig::default().with_tolerance(0.0)),
        Err(ArimaError::InvalidConfiguration(_))
    ));
    assert!(matches!(
        TimeSeries::new(vec![1.0, f64::NAN]),
        Err(ArimaError::DataError(_))
    ));

    let model = Arima::fit(&plain, &ArimaOrder::new(1, 0, 0), &FitConfig::default()).unwrap();
    assert!(model.forecast(5, 1.5).is_err());
}

fn assert_se_close(default: &Arima, numerical: &Arima) {
    assert_eq!(default.std_errors().len(), numerical.std_errors().len());
    for (i, (a, b)) in default.std_errors().iter().zip(numerical.std_errors()).enumerate() {
        assert!(b.is_finite() && *b > 0.0, "numerical se {} = {}", i, b);
        assert!(((a - b) / b).abs() < 0.1, "se {}: default {} vs numerical {}", i, a, b);
    }
}

#[test]
fn test_mean_standard_error_matches_numerical_hessian() {
    let values = simulated(
        CoefficientsSpec {
            ar: vec![0.5, -0.2],
            sar: vec![0.4],
            seasonal_frequency: 4,
            mean: Some(100.0),
            ..Default::default()
        },
        200,
        21,
    );
    let series = TimeSeries::with_period(values, TimePeriod::quarter(), TimePeriod::year()).unwrap();
    let order = ArimaOrder::seasonal(2, 0, 0, 1, 0, 0);
    let config = FitConfig::default().with_strategy(FitStrategy::Ml);

    let default = Arima::fit(&series, &order, &config).unwrap();
    let numerical = Arima::fit(&series, &order, &config.clone().with_hessian(HessianSource::Numerical)).unwrap();
    assert_se_close(&default, &numerical);

    // long-run sd / sqrt(n) = 1 / (0.7 * 0.6 * sqrt(200)) ~ 0.17
    let mean_se = default.std_errors()[3];
    assert!(mean_se > 0.08 && mean_se < 0.35, "mean se {}", mean_se);
}

#[test]
fn test_drift_standard_error_matches_numerical_hessian() {
    let values = simulated(
        CoefficientsSpec {
            ma: vec![0.4],
            d: 1,
            drift: Some(0.5),
            ..Default::default()
        },
        200,
        5,
    );
    let series = TimeSeries::new(values).unwrap();
    let order = ArimaOrder::with_flags(0, 1, 1, 0, 0, 0, false, true).unwrap();

    let default = Arima::fit(&series, &order, &FitConfig::default()).unwrap();
    let numerical = Arima::fit(
        &series,
        &order,
        &FitConfig::default().with_hessian(HessianSource::Numerical),
    )
    .unwrap();
    assert_se_close(&default, &numerical);

    // (1 + theta) / sqrt(199) ~ 0.1
    let drift_se = default.std_errors()[1];
    assert!(drift_se > 0.04 && drift_se < 0.2, "drift se {}", drift_se);
}
