use pace_extrap::data::{DecayPlateau, decay_plateau_series};
use pace_extrap::domain::{StoppingConfig, StoppingDecision, WindowAlignment};
use pace_extrap::error::EstimatorError;
use pace_extrap::stopping::{analyse_series, estimate_stopping_pace};

fn stop_index(series: &[f64], config: &StoppingConfig) -> Option<usize> {
    estimate_stopping_pace(series, 0.0, &[], config)
        .unwrap()
        .point()
        .map(|p| p.index)
}

#[test]
fn clean_plateau_stops_shortly_after_the_decay_ends() {
    let series = decay_plateau_series(&DecayPlateau::default()).unwrap();
    let stop = stop_index(&series, &StoppingConfig::default()).unwrap();
    assert!((1000..=1200).contains(&stop), "stop={stop}");
}

#[test]
fn rippling_plateau_stops_near_the_plateau_start() {
    for (amplitude, period) in [(0.01, 7.0), (0.05, 13.0)] {
        let shape = DecayPlateau {
            ripple_amplitude: amplitude,
            ripple_period: period,
            ..DecayPlateau::default()
        };
        let series = decay_plateau_series(&shape).unwrap();
        let stop = stop_index(&series, &StoppingConfig::default()).unwrap();
        assert!((1000..=1200).contains(&stop), "amplitude={amplitude} period={period} stop={stop}");
    }
}

/// No stop before two of the last `minima_lookback` completed blocks lie on
/// the plateau; the block minima still fall steeply until then.
fn earliest_stop(plateau_pace: usize, config: &StoppingConfig) -> usize {
    plateau_pace + (config.minima_lookback - 2) * config.min_window - 1
}

#[test]
fn noisy_plateau_stops_within_two_trend_windows() {
    for alignment in [WindowAlignment::Centered, WindowAlignment::Trailing] {
        let config = StoppingConfig {
            alignment,
            ..StoppingConfig::default()
        };
        for seed in 0..10 {
            let shape = DecayPlateau {
                noise_sd: 0.02,
                seed,
                ..DecayPlateau::default()
            };
            let series = decay_plateau_series(&shape).unwrap();
            let stop = stop_index(&series, &config).unwrap();
            assert!(stop >= earliest_stop(shape.plateau_pace, &config), "{alignment:?} seed={seed} stop={stop}");
            if alignment == WindowAlignment::Centered {
                let latest = shape.plateau_pace + 2 * config.trend_window;
                assert!(stop <= latest, "seed={seed} stop={stop}");
            }
        }
    }
}

#[test]
fn clean_plateaus_respect_the_minima_bound() {
    let config = StoppingConfig::default();
    for ripple_amplitude in [0.0, 0.01, 0.05] {
        let shape = DecayPlateau {
            ripple_amplitude,
            ..DecayPlateau::default()
        };
        let series = decay_plateau_series(&shape).unwrap();
        let stop = stop_index(&series, &config).unwrap();
        assert!(
            (earliest_stop(shape.plateau_pace, &config)..=shape.plateau_pace + config.trend_window).contains(&stop),
            "ripple={ripple_amplitude} stop={stop}"
        );
    }
}

#[test]
fn monotone_decay_never_stops() {
    let shape = DecayPlateau {
        plateau_pace: 2500,
        ..DecayPlateau::default()
    };
    let series = decay_plateau_series(&shape).unwrap();
    let decision = estimate_stopping_pace(&series, 0.0, &[], &StoppingConfig::default()).unwrap();
    assert_eq!(decision, StoppingDecision::NotReached);
}

#[test]
fn stopping_index_is_past_the_minimum_window_and_below_the_floor() {
    let config = StoppingConfig::default();
    let series = decay_plateau_series(&DecayPlateau::default()).unwrap();
    let decision = estimate_stopping_pace(&series, 0.0, &[], &config).unwrap();
    let point = decision.point().unwrap();
    assert!(point.index >= config.min_window);
    assert!(point.log_error < config.log_floor);
    assert_eq!(point.error, series[point.index]);
}

#[test]
fn unusable_samples_are_skipped() {
    let mut series = decay_plateau_series(&DecayPlateau::default()).unwrap();
    for i in [0, 300, 301, 1500, 2200] {
        series[i] = f64::NAN;
    }
    series[700] = 0.0;
    series[1800] = -1e-9;
    series[2000] = f64::INFINITY;

    let stats = analyse_series(&series, &StoppingConfig::default()).unwrap();
    assert!(stats.logged[700].is_nan() && stats.logged[1800].is_nan() && stats.logged[2000].is_nan());
    // Windows still average the finite samples around a gap.
    assert!(stats.average[1500].is_finite());

    let stop = stop_index(&series, &StoppingConfig::default()).unwrap();
    assert!((1000..=1200).contains(&stop), "stop={stop}");
}

#[test]
fn apd_error_is_measured_at_the_stopping_pace() {
    let series = decay_plateau_series(&DecayPlateau::default()).unwrap();
    let apd: Vec<f64> = (0..series.len()).map(|n| 300.0 + 10.0 * (-(n as f64) / 200.0).exp()).collect();
    let decision = estimate_stopping_pace(&series, 300.0, &apd, &StoppingConfig::default()).unwrap();
    let point = decision.point().unwrap();
    let expected = 10.0 * (-(point.index as f64) / 200.0).exp();
    assert!((point.apd_error.unwrap() - expected).abs() < 1e-9);

    // A non-finite APD sample gives no error rather than NaN.
    let mut gappy = apd.clone();
    gappy[point.index] = f64::NAN;
    let decision = estimate_stopping_pace(&series, 300.0, &gappy, &StoppingConfig::default()).unwrap();
    assert_eq!(decision.point().unwrap().apd_error, None);
}

#[test]
fn trailing_windows_still_reach_a_decision() {
    let config = StoppingConfig {
        alignment: WindowAlignment::Trailing,
        ..StoppingConfig::default()
    };
    let series = decay_plateau_series(&DecayPlateau::default()).unwrap();
    let stop = stop_index(&series, &config).unwrap();
    assert!(stop > 1000, "stop={stop}");
}

#[test]
fn estimates_are_deterministic() {
    let shape = DecayPlateau {
        noise_sd: 0.02,
        ..DecayPlateau::default()
    };
    let series = decay_plateau_series(&shape).unwrap();
    let config = StoppingConfig::default();
    let a = estimate_stopping_pace(&series, 0.0, &[], &config).unwrap();
    let b = estimate_stopping_pace(&series, 0.0, &[], &config).unwrap();
    assert_eq!(a, b);
}

#[test]
fn inconsistent_configs_are_rejected() {
    let series = decay_plateau_series(&DecayPlateau::default()).unwrap();
    let config = StoppingConfig {
        average_window: 0,
        ..StoppingConfig::default()
    };
    let err = estimate_stopping_pace(&series, 0.0, &[], &config).unwrap_err();
    assert!(matches!(err, EstimatorError::InvalidConfig(_)));

    let config = StoppingConfig {
        log_floor: f64::NAN,
        ..StoppingConfig::default()
    };
    assert!(analyse_series(&series, &config).is_err());
}
