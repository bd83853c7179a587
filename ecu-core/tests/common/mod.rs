//! Shared harness for the lifecycle integration tests.

use ecu_core::config::EcuConfig;
use ecu_core::engine::{CycleEvents, CycleInputs, Ecu, FixedCorrection};
use ecu_core::pwm::{EngineOutputs, PwmChannel};

/// Engine outputs that record the most recent hardware calls.
#[derive(Copy, Clone, Debug, Default)]
pub struct RecordingOutputs {
    pub ignition: Option<bool>,
    pub fuel_pump: Option<bool>,
    pub duty: [Option<u16>; 2],
    pub pwm_writes: usize,
}

impl EngineOutputs for RecordingOutputs {
    fn set_pwm(&mut self, channel: PwmChannel, duty: u16) {
        self.duty[channel.as_index()] = Some(duty);
        self.pwm_writes += 1;
    }

    fn ignition(&mut self, enabled: bool) {
        self.ignition = Some(enabled);
    }

    fn fuel_pump(&mut self, enabled: bool) {
        self.fuel_pump = Some(enabled);
    }
}

/// One engine core plus recorded outputs and a fixed injection correction.
pub struct TestRig {
    pub config: EcuConfig,
    pub ecu: Ecu,
    pub outputs: RecordingOutputs,
    pub injection: FixedCorrection,
}

impl TestRig {
    /// Builds a rig whose correction factor immediately allows priming.
    pub fn new(config: EcuConfig) -> Self {
        Self {
            ecu: Ecu::new(&config, 0),
            config,
            outputs: RecordingOutputs::default(),
            injection: FixedCorrection(1.0),
        }
    }

    /// Runs one control cycle with the given samples.
    pub fn cycle(&mut self, now_ms: u16, rpm: u16, thr_in: u16) -> CycleEvents {
        self.ecu.cycle(
            &self.config,
            CycleInputs { now_ms, rpm, thr_in },
            &mut self.outputs,
            &mut self.injection,
        )
    }

    /// Drives the rig from power-on into `Stopped` with the throttle closed.
    ///
    /// Finishes with the stop timestamp at `1_100`; the dwell guard opens
    /// `dwell_time_ms` after that.
    pub fn settle_stopped(&mut self) {
        let events = self.cycle(0, 0, self.config.thr_min);
        assert_eq!(events.as_slice(), &[ecu_core::engine::EngineEvent::Prime]);
        let events = self.cycle(1_100, 0, self.config.thr_min);
        assert_eq!(events.as_slice(), &[ecu_core::engine::EngineEvent::Primed]);
    }
}
