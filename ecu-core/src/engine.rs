//! Engine lifecycle state machine and the per-cycle control body.
//!
//! [`Ecu::cycle`] is the whole control loop body: it slides the wrap-safe
//! timestamps, snapshots the sampled inputs, recomputes the throttle blend,
//! republishes both PWM channels, feeds the injection model, and then
//! evaluates the lifecycle transition table. Guards are checked only for the
//! current state and at most one lifecycle transition fires per cycle, with
//! one deliberate exception: a cycle dispatched in `Start` re-evaluates the
//! shared protective guards after its own guards, so a just-started engine is
//! immediately checked for over-rev, throttle cut, and stall.

use heapless::Vec;

use crate::clock::{self, TickMs};
use crate::config::EcuConfig;
use crate::pwm::{self, EngineOutputs, PwmChannel};
use crate::status::{EngineState, EngineStatus};
use crate::throttle;

/// Hold time in `Prime` before the machine settles into `Stopped`.
const PRIME_TIME_MS: u16 = 1_000;

/// Inputs sampled once at the top of a control cycle and treated as an
/// instantaneous snapshot; guards never re-read them mid-cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CycleInputs {
    /// Current tick of the wrapping millisecond counter.
    pub now_ms: TickMs,
    /// Current engine speed.
    pub rpm: u16,
    /// Current raw throttle input.
    pub thr_in: u16,
}

/// External injection-correction collaborator.
///
/// The core produces the `(throttle_out, pt_c)` pair for the fuel map and
/// consumes the correction factor whose positivity gates priming.
pub trait InjectionModel {
    /// Recomputes the fuel/air correction factor from the ambient readings.
    fn corrections(&mut self, baro: u32, iat: i16, cht: i16, run_time_ms: u16) -> f32;

    /// Feeds the current operating point back into the injection map.
    fn map_update_row(&mut self, throttle_out: f32, pt_c: f32);
}

/// Injection model that returns a fixed correction factor. Handy for
/// bring-up and tests; the real model lives in the injection collaborator.
#[derive(Copy, Clone, Debug, Default)]
pub struct FixedCorrection(pub f32);

impl InjectionModel for FixedCorrection {
    fn corrections(&mut self, _: u32, _: i16, _: i16, _: u16) -> f32 {
        self.0
    }

    fn map_update_row(&mut self, _: f32, _: f32) {}
}

/// Notable lifecycle events produced by a control cycle, in occurrence order.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EngineEvent {
    /// Fuel pump enabled to prime the lines.
    Prime,
    /// Priming finished, engine settled into `Stopped`.
    Primed,
    /// Operator spun the engine with throttle open; ignition enabled.
    ManualStart,
    /// Automatic crank attempt began.
    AutoCrank,
    /// Crank attempt exceeded the start window; engine stopped.
    CrankTimeout,
    /// Engine turned over while cranking; ignition enabled.
    Ignition,
    /// Starter released after the crank window elapsed.
    CrankReleased,
    /// Start attempt survived the dwell window; engine judged running.
    Running,
    /// RPM ceiling exceeded; engine stopped.
    OverRev,
    /// Operator throttle closed; engine stopped.
    ThrottleCut,
    /// RPM fell to zero; engine stopped.
    Stall,
}

impl EngineEvent {
    /// Log line emitted when the event fires.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            EngineEvent::Prime => "engine prime",
            EngineEvent::Primed => "engine stopped",
            EngineEvent::ManualStart | EngineEvent::Ignition => "engine start",
            EngineEvent::AutoCrank => "engine crank",
            EngineEvent::CrankTimeout => "crank failure - engine stopped",
            EngineEvent::CrankReleased => "cranked",
            EngineEvent::Running => "engine running",
            EngineEvent::OverRev => "overrev - engine stopped",
            EngineEvent::ThrottleCut => "throttle - engine stopped",
            EngineEvent::Stall => "engine stopped",
        }
    }
}

/// Worst cycle is three events (starter release, running transition, one
/// protective stop) plus a slot of headroom.
pub const MAX_CYCLE_EVENTS: usize = 4;

/// Events emitted by one control cycle, in order.
pub type CycleEvents = Vec<EngineEvent, MAX_CYCLE_EVENTS>;

/// The engine control unit core: owns the status record and advances it one
/// control cycle at a time.
#[derive(Debug)]
pub struct Ecu {
    status: EngineStatus,
}

impl Ecu {
    /// Creates the core with power-on status; `now_ms` seeds the stop/start
    /// timestamps so the dwell guard measures from boot.
    #[must_use]
    pub fn new(config: &EcuConfig, now_ms: TickMs) -> Self {
        let mut status = EngineStatus::new(config);
        status.engine_stop_ms = now_ms;
        status.engine_start_ms = now_ms;
        Self { status }
    }

    /// Read access for telemetry and the embedding target.
    #[must_use]
    pub const fn status(&self) -> &EngineStatus {
        &self.status
    }

    /// Mutable access for the sensor collaborator to deposit ambient
    /// readings (`baro`, `iat`, `cht`, ...) between cycles.
    pub const fn status_mut(&mut self) -> &mut EngineStatus {
        &mut self.status
    }

    /// Runs one control cycle. Returns the lifecycle events that fired.
    pub fn cycle<O, I>(
        &mut self,
        config: &EcuConfig,
        inputs: CycleInputs,
        outputs: &mut O,
        injection: &mut I,
    ) -> CycleEvents
    where
        O: EngineOutputs,
        I: InjectionModel,
    {
        let now = inputs.now_ms;
        let mut events = CycleEvents::new();

        // Keep every tracked timestamp sliding so none outlives half the
        // counter range, independent of the active state.
        self.status.engine_stop_ms = clock::slide(self.status.engine_stop_ms, now);
        self.status.engine_start_ms = clock::slide(self.status.engine_start_ms, now);
        self.status.engine_prime_ms = clock::slide(self.status.engine_prime_ms, now);

        let run_time_ms = if self.status.state.has_run_time() {
            clock::elapsed_ms(now, self.status.engine_start_ms)
        } else {
            0
        };

        self.status.rpm = inputs.rpm;
        self.status.thr_in = inputs.thr_in;

        let thr_clamped = pwm::clamp_duty(saturate_i16(inputs.thr_in), config.thr_min, config.thr_max);
        self.status.throttle_in =
            f32::from(thr_clamped - config.thr_min) / f32::from(config.thr_max - config.thr_min);
        self.status.throttle_out =
            throttle::blended(self.status.state, run_time_ms, self.status.throttle_in, config);

        self.publish_throttle(config, outputs);
        // The crank channel wants the same continuous refresh; its level only
        // changes on transitions but the frame must keep coming.
        outputs.set_pwm(PwmChannel::Crank, self.status.pwm1_out);

        self.status.pt_c = injection.corrections(
            self.status.baro,
            self.status.iat,
            self.status.cht,
            run_time_ms,
        );
        injection.map_update_row(self.status.throttle_out, self.status.pt_c);

        match self.status.state {
            EngineState::Init => {
                if self.status.pt_c > 0.0 {
                    self.status.engine_prime_ms = now;
                    outputs.fuel_pump(true);
                    self.status.state = EngineState::Prime;
                    note(&mut events, EngineEvent::Prime);
                }
            }
            EngineState::Prime => {
                if clock::elapsed_ms(now, self.status.engine_prime_ms) > PRIME_TIME_MS {
                    self.stop_engine(now, config, outputs);
                    self.status.state = EngineState::Stopped;
                    note(&mut events, EngineEvent::Primed);
                }
            }
            EngineState::Stopped => {
                self.stopped_guards(now, config, outputs, &mut events);
            }
            EngineState::Crank => {
                if run_time_ms > config.start_time_ms {
                    self.stop_engine(now, config, outputs);
                    self.status.state = EngineState::Stopped;
                    note(&mut events, EngineEvent::CrankTimeout);
                } else if self.status.rpm > 0 {
                    outputs.ignition(true);
                    self.status.state = EngineState::Start;
                    note(&mut events, EngineEvent::Ignition);
                }
            }
            EngineState::Start => {
                self.start_guards(run_time_ms, config, outputs, &mut events);
                self.protective_guards(now, config, outputs, &mut events);
            }
            EngineState::Running => {
                self.protective_guards(now, config, outputs, &mut events);
            }
        }

        events
    }

    /// `Stopped` branch: dwell must have elapsed before anything may happen.
    /// The manual-start branch is evaluated before auto-crank and wins when
    /// both match; the reset guard re-arms the attempt budget whenever the
    /// operator throttle sits below the start threshold.
    fn stopped_guards<O: EngineOutputs>(
        &mut self,
        now: TickMs,
        config: &EcuConfig,
        outputs: &mut O,
        events: &mut CycleEvents,
    ) {
        if clock::elapsed_ms(now, self.status.engine_stop_ms) <= config.dwell_time_ms {
            return;
        }
        if config.auto_start > 0 && self.status.thr_in < config.thr_start {
            self.status.starts = 0;
        }
        if self.status.rpm > 0 && self.status.throttle_in > 0.0 {
            self.status.engine_start_ms = now;
            outputs.ignition(true);
            outputs.fuel_pump(true);
            self.status.state = EngineState::Start;
            note(events, EngineEvent::ManualStart);
        } else if config.auto_start > 0
            && self.status.thr_in > config.thr_start
            && self.status.starts < config.auto_start
        {
            self.status.starts += 1;
            self.status.engine_start_ms = now;
            self.crank(config, outputs, true);
            outputs.fuel_pump(true);
            self.status.state = EngineState::Crank;
            note(events, EngineEvent::AutoCrank);
        }
    }

    /// `Start` branch: release the starter once the crank window has elapsed
    /// and promote to `Running` after a full dwell of sustained rotation.
    fn start_guards<O: EngineOutputs>(
        &mut self,
        run_time_ms: u16,
        config: &EcuConfig,
        outputs: &mut O,
        events: &mut CycleEvents,
    ) {
        if config.auto_start > 0
            && self.status.pwm1_out == config.pwm1_max
            && run_time_ms > config.start_time_ms
        {
            self.crank(config, outputs, false);
            note(events, EngineEvent::CrankReleased);
        }
        if self.status.rpm > 0 && run_time_ms > config.dwell_time_ms {
            self.status.starts = 0;
            self.status.state = EngineState::Running;
            note(events, EngineEvent::Running);
        }
    }

    /// Shared protective guards for `Start` and `Running`. Also evaluated on
    /// the same cycle a start promotes to `Running`.
    fn protective_guards<O: EngineOutputs>(
        &mut self,
        now: TickMs,
        config: &EcuConfig,
        outputs: &mut O,
        events: &mut CycleEvents,
    ) {
        if self.status.rpm > config.rpm_limit {
            self.stop_engine(now, config, outputs);
            self.status.state = EngineState::Stopped;
            note(events, EngineEvent::OverRev);
        } else if self.status.throttle_in <= 0.0 {
            self.stop_engine(now, config, outputs);
            self.status.state = EngineState::Stopped;
            note(events, EngineEvent::ThrottleCut);
        } else if self.status.rpm == 0 {
            self.stop_engine(now, config, outputs);
            self.status.state = EngineState::Stopped;
            note(events, EngineEvent::Stall);
        }
    }

    /// Shared stop side effect: record the stop time, kill ignition and
    /// pump, drive the crank channel to its minimum.
    fn stop_engine<O: EngineOutputs>(&mut self, now: TickMs, config: &EcuConfig, outputs: &mut O) {
        self.status.engine_stop_ms = now;
        outputs.ignition(false);
        outputs.fuel_pump(false);
        self.crank(config, outputs, false);
    }

    /// Drives the crank channel to its configured maximum (engaged) or
    /// minimum (released) and records the published duty.
    fn crank<O: EngineOutputs>(&mut self, config: &EcuConfig, outputs: &mut O, engage: bool) {
        self.status.pwm1_out = if engage { config.pwm1_max } else { config.pwm1_min };
        outputs.set_pwm(PwmChannel::Crank, self.status.pwm1_out);
    }

    /// Maps the blended throttle onto the actuator duty range and publishes
    /// it. The configured pair may be reversed; bounds are normalized here,
    /// at the boundary, so the clamp primitive stays direction-agnostic.
    fn publish_throttle<O: EngineOutputs>(&mut self, config: &EcuConfig, outputs: &mut O) {
        let span = i32::from(config.pwm0_max) - i32::from(config.pwm0_min);
        let desired = i32::from(config.pwm0_min) + scale(self.status.throttle_out, span);
        let (low, high) = pwm::ordered_bounds(config.pwm0_min, config.pwm0_max);
        self.status.pwm0_out = pwm::clamp_duty(saturate_duty(desired), low, high);
        outputs.set_pwm(PwmChannel::Throttle, self.status.pwm0_out);
    }
}

fn note(events: &mut CycleEvents, event: EngineEvent) {
    // Capacity covers the worst cycle; see MAX_CYCLE_EVENTS.
    let _ = events.push(event);
}

fn scale(fraction: f32, span: i32) -> i32 {
    let scaled = fraction * span as f32;
    scaled as i32
}

fn saturate_i16(value: u16) -> i16 {
    i16::try_from(value).unwrap_or(i16::MAX)
}

fn saturate_duty(value: i32) -> i16 {
    i16::try_from(value).unwrap_or(i16::MAX)
}
