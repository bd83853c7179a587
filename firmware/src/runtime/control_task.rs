use embassy_time::{Duration, Instant, Ticker};
use portable_atomic::Ordering;

use ecu_core::clock::TickMs;
use ecu_core::config::EcuConfig;
use ecu_core::console::{self, NoopConfigStore};
use ecu_core::engine::{CycleInputs, Ecu, FixedCorrection};
use ecu_core::telemetry::{EventLog, ReportScheduler, StatusReport};

use super::{LINE_QUEUE, REPLY_QUEUE, TACH_PULSES, hw};
use crate::telemetry;

/// Control cycle period. Short enough that every PWM frame carries a fresh
/// duty value.
const CONTROL_PERIOD_MS: u64 = 20;

/// Tach pulses per crank revolution for the fitted pickup.
const PULSES_PER_REV: u32 = 1;

fn now_ticks() -> TickMs {
    (Instant::now().as_millis() & 0xFFFF) as TickMs
}

/// RPM from the pulse delta of one control period.
fn rpm_from_pulses(pulses: u32) -> u16 {
    let per_minute = pulses * (60_000 / CONTROL_PERIOD_MS as u32) / PULSES_PER_REV;
    per_minute.min(u32::from(u16::MAX)) as u16
}

#[embassy_executor::task]
pub async fn run(mut outputs: hw::EcuOutputs, mut sensors: hw::SensorBank) -> ! {
    let mut config = EcuConfig::default();
    let now = now_ticks();
    let mut ecu = Ecu::new(&config, now);
    let mut scheduler = ReportScheduler::new(now);
    let mut events = EventLog::new();
    // Correction-factor computation belongs to the injection collaborator;
    // a unity factor lets the lifecycle run until it is fitted.
    let mut injection = FixedCorrection(1.0);
    let mut store = NoopConfigStore;

    let mut ticker = Ticker::every(Duration::from_millis(CONTROL_PERIOD_MS));
    loop {
        ticker.next().await;
        let now = now_ticks();

        let pulses = TACH_PULSES.swap(0, Ordering::Relaxed);
        let inputs = CycleInputs {
            now_ms: now,
            rpm: rpm_from_pulses(pulses),
            thr_in: sensors.read_throttle_raw(),
        };

        for event in ecu.cycle(&config, inputs, &mut outputs, &mut injection) {
            events.record(now, event);
            telemetry::log_event(now, event);
        }

        while let Ok(line) = LINE_QUEUE.try_receive() {
            match console::parse_line(line.as_str()) {
                Ok(command) => {
                    match console::execute(command, &mut config, &mut scheduler, &mut store) {
                        Ok(reply) => {
                            for rendered in telemetry::format_reply(&reply) {
                                let _ = REPLY_QUEUE.try_send(rendered);
                            }
                        }
                        Err(error) => {
                            let _ = REPLY_QUEUE.try_send(telemetry::format_error(&error));
                        }
                    }
                }
                Err(_) => {
                    defmt::warn!("console: unrecognized command: {}", line.as_str());
                }
            }
        }

        if scheduler.due(now) {
            // Sensor refresh shares the report period, as does handing the
            // raw head-temperature sample to the status record for the
            // calibration collaborator.
            let cht_raw = sensors.read_cht_raw();
            ecu.status_mut().cht = cht_raw as i16;

            telemetry::emit_report(&StatusReport::capture(ecu.status()));
        }
    }
}
