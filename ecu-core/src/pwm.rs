//! PWM output clamping and the hardware output seam.
//!
//! Duty values are microsecond-style servo pulses. Anything above
//! [`PWM_NO_INPUT_LIMIT`] is treated as "no signal present" (disconnected
//! receiver or a garbage capture) and fails safe to the minimum drive rather
//! than passing through.

/// Sentinel above which a raw duty reading is considered missing input.
pub const PWM_NO_INPUT_LIMIT: i16 = 2200;

/// Logical output channels driven by the control loop.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PwmChannel {
    /// Channel 0: throttle actuator servo.
    Throttle,
    /// Channel 1: crank / ignition drive.
    Crank,
}

impl PwmChannel {
    /// Deterministic index matching the hardware channel numbering.
    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            PwmChannel::Throttle => 0,
            PwmChannel::Crank => 1,
        }
    }
}

/// Clamps a desired duty into `[low, high]`, mapping missing input to zero
/// first so it lands on `low` rather than whatever was read.
///
/// `low`/`high` must already be ordered; use [`ordered_bounds`] when the
/// configured pair may describe a reversed servo. The comparison runs in a
/// width that holds the full `u16` bound range.
#[must_use]
pub fn clamp_duty(value: i16, low: u16, high: u16) -> u16 {
    let value = if value > PWM_NO_INPUT_LIMIT {
        0
    } else {
        i32::from(value)
    };
    value.clamp(i32::from(low), i32::from(high)) as u16
}

/// Orders a configured min/max pair, resolving reversed-servo configurations
/// at the call boundary instead of inside the clamp primitive.
#[must_use]
pub const fn ordered_bounds(min: u16, max: u16) -> (u16, u16) {
    if min <= max { (min, max) } else { (max, min) }
}

/// Abstraction over the physical engine actuators.
///
/// The firmware target programs hardware timers and GPIOs; tests and the
/// emulator record the calls instead.
pub trait EngineOutputs {
    /// Writes a clamped duty value to the given channel. Invoked every
    /// control cycle even when unchanged; the actuators need a continuously
    /// refreshed signal.
    fn set_pwm(&mut self, channel: PwmChannel, duty: u16);

    /// Enables or disables the ignition circuit.
    fn ignition(&mut self, enabled: bool);

    /// Enables or disables the fuel pump.
    fn fuel_pump(&mut self, enabled: bool);
}

/// Engine outputs that perform no hardware interaction.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopEngineOutputs;

impl NoopEngineOutputs {
    /// Creates a new no-op output driver.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl EngineOutputs for NoopEngineOutputs {
    fn set_pwm(&mut self, _: PwmChannel, _: u16) {}

    fn ignition(&mut self, _: bool) {}

    fn fuel_pump(&mut self, _: bool) {}
}
