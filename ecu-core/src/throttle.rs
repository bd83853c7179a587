//! Throttle blend estimator.
//!
//! While cranking and through the start window the actuator is held at a
//! fixed cranking fraction derived from the configuration. Once the engine is
//! judged running, demand ramps linearly from that fraction to the live
//! operator throttle over a second dwell window, avoiding a step change in
//! actuator demand the moment the engine catches.

use crate::config::EcuConfig;
use crate::status::EngineState;

/// Fixed cranking throttle fraction, `(thr_start - thr_min) / (thr_max - thr_min)`.
///
/// [`EcuConfig::validate`] keeps `thr_min <= thr_start <= thr_max`, so the
/// fraction is always in `0.0..=1.0` for a configuration that passed
/// validation.
#[must_use]
pub fn start_fraction(config: &EcuConfig) -> f32 {
    f32::from(config.thr_start - config.thr_min) / f32::from(config.thr_max - config.thr_min)
}

/// Computes the blended throttle output for this cycle.
///
/// Pure in `(state, run_time_ms, throttle_in, config)`; recomputed every
/// control cycle whether or not a state transition occurred.
#[must_use]
pub fn blended(state: EngineState, run_time_ms: u16, throttle_in: f32, config: &EcuConfig) -> f32 {
    let throttle_start = start_fraction(config);
    if matches!(state, EngineState::Crank | EngineState::Start) {
        throttle_start
    } else if state == EngineState::Running
        && run_time_ms >= config.dwell_time_ms
        && u32::from(run_time_ms) <= 2 * u32::from(config.dwell_time_ms)
    {
        let weight =
            f32::from(run_time_ms - config.dwell_time_ms) / f32::from(config.dwell_time_ms);
        weight * throttle_in + (1.0 - weight) * throttle_start
    } else {
        throttle_in
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EcuConfig {
        EcuConfig {
            thr_min: 1_000,
            thr_max: 2_000,
            thr_start: 1_200,
            dwell_time_ms: 500,
            ..EcuConfig::default()
        }
    }

    #[test]
    fn cranking_states_hold_the_start_fraction() {
        let config = config();
        let start = start_fraction(&config);
        assert!((start - 0.2).abs() < 1e-6);
        assert_eq!(blended(EngineState::Crank, 0, 0.9, &config), start);
        assert_eq!(blended(EngineState::Start, 700, 0.9, &config), start);
    }

    #[test]
    fn start_fraction_spans_the_calibration_interval() {
        let mut config = config();
        config.thr_start = config.thr_min;
        assert_eq!(start_fraction(&config), 0.0);
        config.thr_start = config.thr_max;
        assert_eq!(start_fraction(&config), 1.0);
    }

    #[test]
    fn blend_window_boundaries() {
        let config = config();
        let start = start_fraction(&config);

        // Window opens at one dwell with zero weight: pure start fraction.
        let opening = blended(EngineState::Running, 500, 0.8, &config);
        assert!((opening - start).abs() < 1e-6);

        // Midpoint: equal parts operator throttle and start fraction.
        let mid = blended(EngineState::Running, 750, 0.8, &config);
        assert!((mid - (0.5 * 0.8 + 0.5 * start)).abs() < 1e-6);

        // Window closes at twice the dwell with full weight on the operator.
        let closing = blended(EngineState::Running, 1_000, 0.8, &config);
        assert!((closing - 0.8).abs() < 1e-6);
        assert_eq!(blended(EngineState::Running, 1_001, 0.8, &config), 0.8);
    }

    #[test]
    fn other_states_pass_through() {
        let config = config();
        assert_eq!(blended(EngineState::Stopped, 0, 0.4, &config), 0.4);
        assert_eq!(blended(EngineState::Init, 0, 0.0, &config), 0.0);
        assert_eq!(blended(EngineState::Running, 5_000, 0.6, &config), 0.6);
    }
}
