use approx::assert_relative_eq;

use pace_extrap::data::{RelaxingState, relaxation_trace};
use pace_extrap::domain::{ExtrapolationConfig, FitParameters, JumpParameters, SignRule, Trace};
use pace_extrap::error::EstimatorError;
use pace_extrap::extrapolate::{extrapolate, extrapolate_reference};
use pace_extrap::fit::{FitGate, fit_exponential};

/// `V(n) = v_inf − amplitude·exp(−n/τ)` over paces `0..paces`.
fn relaxation(v_inf: f64, amplitude: f64, tau: f64, paces: usize) -> Trace {
    Trace::contiguous(0, (0..paces).map(|n| v_inf - amplitude * (-(n as f64) / tau).exp()).collect())
}

/// Log-amplitude of the pace-to-pace differences at the buffer start.
fn exact_alpha(amplitude: f64, tau: f64, buffer_start: i64) -> f64 {
    (amplitude.abs() * (-(buffer_start as f64) / tau).exp() * -(-1.0 / tau).exp_m1()).ln()
}

fn jump(jump_pace: i64, buffer_size: i64) -> JumpParameters {
    JumpParameters {
        jump_pace,
        buffer_size,
        extrapolation_coefficient: 1.0,
    }
}

#[test]
fn exact_exponential_is_reproduced() {
    let (v_inf, amplitude, tau) = (2.0, 1.5, 20.0);
    let reference = relaxation(v_inf, amplitude, tau, 400);
    let jump = jump(60, 40);
    let fit = FitParameters {
        tau,
        alpha: exact_alpha(amplitude, tau, jump.buffer_start()),
        asymptote: None,
    };

    let result = extrapolate_reference(&fit, &jump, &reference, &ExtrapolationConfig::default()).unwrap();

    assert_relative_eq!(result.asymptote, v_inf, max_relative = 1e-12);
    assert_relative_eq!(result.check_value, result.predicted_value, max_relative = 1e-10);
    assert!(result.warning.is_none());
    assert!(result.max_deviation_after_jump < 1e-10);
    assert!(result.terminal_error < 1e-8);
    assert_eq!(result.predicted.paces(), reference.paces());
    assert_relative_eq!(result.predicted.value_at(60).unwrap(), reference.value_at(60).unwrap(), epsilon = 1e-15);
}

#[test]
fn fitted_buffer_extrapolates_to_the_asymptote() {
    let (v_inf, amplitude, tau) = (-80.0, -30.0, 35.0);
    let reference = relaxation(v_inf, amplitude, tau, 600);
    let jump = jump(150, 100);

    let buffer = reference.window(jump.buffer_start(), jump.jump_pace).unwrap();
    let fit = fit_exponential(&buffer, &FitGate::default()).unwrap();
    assert_relative_eq!(fit.tau, tau, max_relative = 1e-8);
    assert_eq!(fit.buffer_size, jump.buffer_size);

    let result =
        extrapolate_reference(&fit.to_fit_parameters(), &jump, &reference, &ExtrapolationConfig::default()).unwrap();
    assert_relative_eq!(result.asymptote, v_inf, max_relative = 1e-9);
    assert!(result.v_diff < 0.0);
    assert!(result.warning.is_none());
}

#[test]
fn short_buffer_scenario() {
    // Buffer of four values ending at pace 100, so three steps.
    let mut values = vec![0.8; 97];
    values.extend([0.90, 0.92, 0.94, 0.95]);
    values.extend([0.95; 20]);
    let reference = Trace::contiguous(0, values);
    let fit = FitParameters {
        tau: 10.0,
        alpha: 0.1,
        asymptote: None,
    };
    let buffer = [0.90, 0.92, 0.94, 0.95];
    let jump = jump(100, 3);

    let result = extrapolate(&buffer, &fit, &jump, &reference, &ExtrapolationConfig::default()).unwrap();

    let expected = (0.1f64 - 0.3).exp() / (1.0 - (-0.1f64).exp());
    assert_relative_eq!(result.v_diff, expected, max_relative = 1e-12);
    assert_relative_eq!(result.v_diff, 8.6034, epsilon = 1e-3);
    assert_relative_eq!(result.asymptote, 0.95 + expected, max_relative = 1e-12);
    let at_110 = result.predicted.value_at(110).unwrap();
    assert!((at_110 - (0.95 + result.v_diff * (1.0 - (-1.0f64).exp()))).abs() < 1e-6);

    let check = 0.05 / (0.1f64.exp() / (1.0 - (-0.1f64).exp()));
    assert_relative_eq!(result.check_value, check, max_relative = 1e-9);
    assert_relative_eq!(result.predicted_value, 1.0 - (-0.3f64).exp(), max_relative = 1e-12);
    // A four-sample buffer is nowhere near the fitted curve.
    let warning = result.warning.unwrap();
    assert!(warning.relative_deviation > 0.9);
}

#[test]
fn sign_follows_the_buffer_direction() {
    let reference = Trace::contiguous(0, vec![1.0; 50]);
    let fit = FitParameters {
        tau: 5.0,
        alpha: -2.0,
        asymptote: None,
    };
    let jump = jump(20, 10);
    let config = ExtrapolationConfig::default();

    let up = extrapolate(&[0.5, 0.7, 1.0], &fit, &jump, &reference, &config).unwrap();
    let down = extrapolate(&[1.5, 1.2, 1.0], &fit, &jump, &reference, &config).unwrap();
    assert!(up.v_diff > 0.0 && down.v_diff < 0.0);
    assert_relative_eq!(up.v_diff, -down.v_diff, max_relative = 1e-15);

    let ls = ExtrapolationConfig {
        sign_rule: SignRule::LeastSquares,
        ..config
    };
    let noisy = [0.5, 0.6, 0.7, 0.8, 0.45];
    assert!(extrapolate(&noisy, &fit, &jump, &reference, &config).unwrap().v_diff < 0.0);
    assert!(extrapolate(&noisy, &fit, &jump, &reference, &ls).unwrap().v_diff > 0.0);
}

#[test]
fn check_value_flags_noisy_buffers() {
    let (v_inf, amplitude, tau) = (1.0, 0.5, 30.0);
    let exact = relaxation(v_inf, amplitude, tau, 300);
    let jump = jump(120, 60);
    let fit = FitParameters {
        tau,
        alpha: exact_alpha(amplitude, tau, jump.buffer_start()),
        asymptote: None,
    };
    let config = ExtrapolationConfig::default();
    assert!(extrapolate_reference(&fit, &jump, &exact, &config).unwrap().warning.is_none());

    // Kick the buffer start far from the curve.
    let mut values = exact.values().to_vec();
    values[jump.buffer_start() as usize] -= 0.2;
    let kicked = Trace::contiguous(0, values);
    let result = extrapolate_reference(&fit, &jump, &kicked, &config).unwrap();
    let warning = result.warning.unwrap();
    assert!(warning.relative_deviation > config.check_tolerance);
    assert_relative_eq!(warning.predicted_value, result.predicted_value);
}

#[test]
fn check_value_deviation_grows_with_gaussian_noise() {
    let state = RelaxingState {
        name: "V".into(),
        initial: 0.5,
        asymptote: 1.0,
        tau: 30.0,
    };
    let jump = jump(120, 60);
    let fit = FitParameters {
        tau: state.tau,
        alpha: exact_alpha(0.5, state.tau, jump.buffer_start()),
        asymptote: None,
    };
    let config = ExtrapolationConfig::default();
    let deviation = |noise_sd: f64| {
        let reference = relaxation_trace(&state, 300, noise_sd, 11).unwrap();
        let r = extrapolate_reference(&fit, &jump, &reference, &config).unwrap();
        (r.check_value - r.predicted_value).abs() / r.predicted_value
    };

    assert!(deviation(0.0) < 1e-9);
    let noisy: Vec<f64> = [1e-4, 1e-3, 1e-2].into_iter().map(deviation).collect();
    assert!(noisy[0] > deviation(0.0));
    assert!(noisy[0] < noisy[1] && noisy[1] < noisy[2], "{noisy:?}");
    // Same seed, scaled noise: the deviation scales with it.
    assert_relative_eq!(noisy[1], 10.0 * noisy[0], max_relative = 1e-6);
}

#[test]
fn extrapolation_is_deterministic() {
    let reference = relaxation(3.0, 1.0, 12.0, 200);
    let jump = jump(50, 25);
    let fit = FitParameters {
        tau: 12.0,
        alpha: exact_alpha(1.0, 12.0, jump.buffer_start()),
        asymptote: None,
    };
    let config = ExtrapolationConfig::default();
    let a = extrapolate_reference(&fit, &jump, &reference, &config).unwrap();
    let b = extrapolate_reference(&fit, &jump, &reference, &config).unwrap();
    assert_eq!(a, b);
}

#[test]
fn buffer_may_start_at_the_first_pace() {
    let reference = relaxation(1.0, 0.5, 10.0, 100);
    let fit = FitParameters {
        tau: 10.0,
        alpha: exact_alpha(0.5, 10.0, 0),
        asymptote: None,
    };
    // bufferSize == jump pace on a 0-based trace: the buffer starts at pace 0.
    let result = extrapolate_reference(&fit, &jump(40, 40), &reference, &ExtrapolationConfig::default()).unwrap();
    assert_relative_eq!(result.asymptote, 1.0, max_relative = 1e-12);

    // One more step would need pace -1.
    let err = extrapolate_reference(&fit, &jump(40, 41), &reference, &ExtrapolationConfig::default()).unwrap_err();
    assert_eq!(err, EstimatorError::PaceOutOfRange { pace: -1 });
}
