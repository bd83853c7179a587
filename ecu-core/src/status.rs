//! Engine lifecycle states and the mutable status record.

use crate::clock::TickMs;
use crate::config::EcuConfig;

/// Standard mean sea-level pressure, used until the first barometer sample.
pub const BARO_MSLP_PA: u32 = 101_325;

/// Engine lifecycle state. `Stopped` is a recurring condition, not terminal;
/// the machine runs for the life of the process.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EngineState {
    /// Waiting for a positive fuel/air correction factor before priming.
    Init,
    /// Fuel pump running to prime the lines.
    Prime,
    /// Engine at rest, guards armed for a manual or automatic start.
    Stopped,
    /// Starter engaged, waiting for the engine to spin.
    Crank,
    /// Ignition live, engine spinning but not yet judged self-sustaining.
    Start,
    /// Engine self-sustaining.
    Running,
}

impl EngineState {
    /// Stable index for atomics and wire encodings.
    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            EngineState::Init => 0,
            EngineState::Prime => 1,
            EngineState::Stopped => 2,
            EngineState::Crank => 3,
            EngineState::Start => 4,
            EngineState::Running => 5,
        }
    }

    /// Attempts to construct an [`EngineState`] from a raw index.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(EngineState::Init),
            1 => Some(EngineState::Prime),
            2 => Some(EngineState::Stopped),
            3 => Some(EngineState::Crank),
            4 => Some(EngineState::Start),
            5 => Some(EngineState::Running),
            _ => None,
        }
    }

    /// Console / telemetry label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            EngineState::Init => "init",
            EngineState::Prime => "prime",
            EngineState::Stopped => "stopped",
            EngineState::Crank => "crank",
            EngineState::Start => "start",
            EngineState::Running => "running",
        }
    }

    /// Returns `true` while a start attempt or run is in progress, i.e. the
    /// states whose run-time is measured from `engine_start_ms`.
    #[must_use]
    pub const fn has_run_time(self) -> bool {
        matches!(
            self,
            EngineState::Crank | EngineState::Start | EngineState::Running
        )
    }
}

/// Mutable engine status, owned exclusively by the control loop.
///
/// Created once at startup and never destroyed; every field is republished to
/// the telemetry collaborator on its reporting period.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EngineStatus {
    pub state: EngineState,
    /// Timestamp of the last start attempt (wrap-safe, slid every cycle).
    pub engine_start_ms: TickMs,
    /// Timestamp of the last stop (wrap-safe, slid every cycle).
    pub engine_stop_ms: TickMs,
    /// Timestamp of the prime transition (wrap-safe, slid every cycle).
    pub engine_prime_ms: TickMs,
    /// Last-sampled engine speed.
    pub rpm: u16,
    /// Last-sampled raw throttle input.
    pub thr_in: u16,
    /// Normalized operator throttle in `[0, 1]`.
    pub throttle_in: f32,
    /// Blended throttle actually driving the actuator, in `[0, 1]`.
    pub throttle_out: f32,
    /// Last published throttle-actuator duty.
    pub pwm0_out: u16,
    /// Last published crank/ignition duty.
    pub pwm1_out: u16,
    /// Automatic crank attempts since the last reset.
    pub starts: u16,
    /// Barometric pressure in Pa (external sensor collaborator).
    pub baro: u32,
    /// Intake air temperature (external).
    pub iat: i16,
    /// Cylinder head temperature (external).
    pub cht: i16,
    /// ECU board temperature (external).
    pub ecut: i16,
    /// Relative humidity (external).
    pub humidity: u16,
    /// Exhaust gas temperature (external).
    pub egt: u32,
    /// Fuel/air correction factor; positivity gates the prime transition.
    pub pt_c: f32,
}

impl EngineStatus {
    /// Builds the power-on status: state forced to `Init`, barometer seeded
    /// with the standard atmosphere, PWM outputs at their configured minimums.
    #[must_use]
    pub fn new(config: &EcuConfig) -> Self {
        Self {
            state: EngineState::Init,
            engine_start_ms: 0,
            engine_stop_ms: 0,
            engine_prime_ms: 0,
            rpm: 0,
            thr_in: 0,
            throttle_in: 0.0,
            throttle_out: 0.0,
            pwm0_out: config.pwm0_min,
            pwm1_out: config.pwm1_min,
            starts: 0,
            baro: BARO_MSLP_PA,
            iat: 0,
            cht: 0,
            ecut: 0,
            humidity: 0,
            egt: 0,
            pt_c: 0.0,
        }
    }
}
