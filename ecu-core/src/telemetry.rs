//! Periodic status reporting and the lifecycle event log.
//!
//! The scheduler fires the sensor-refresh / status-report side effects on a
//! configurable period without drifting: the deadline advances by whole
//! periods rather than resnapping to `now`. The event log is a fixed-size
//! ring the reporting collaborator drains at its leisure. The rendered line
//! formats of the serial protocol live here too, so the firmware UART and the
//! emulator session emit identical frames.

use core::fmt::Write as _;

use heapless::{HistoryBuf, OldestOrdered, String, Vec};

use crate::clock::{self, TickMs};
use crate::config::{EcuConfig, Field};
use crate::console::{CommandError, Reply};
use crate::engine::EngineEvent;
use crate::status::{EngineState, EngineStatus};

/// Default status-report period.
pub const DEFAULT_REPORT_PERIOD_MS: u16 = 2_000;
/// Bounds accepted by [`ReportScheduler::set_period`].
pub const MIN_REPORT_PERIOD_MS: u16 = 50;
pub const MAX_REPORT_PERIOD_MS: u16 = 5_000;

/// Rejected report-period change.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PeriodOutOfRange(pub u16);

/// Drift-free periodic trigger in the wrapping tick domain.
#[derive(Copy, Clone, Debug)]
pub struct ReportScheduler {
    period_ms: u16,
    last_ms: TickMs,
}

impl ReportScheduler {
    /// Creates a scheduler whose first report fires half a default period
    /// after boot, so a fresh status shows up promptly.
    #[must_use]
    pub const fn new(now: TickMs) -> Self {
        Self {
            period_ms: DEFAULT_REPORT_PERIOD_MS,
            last_ms: now.wrapping_sub(DEFAULT_REPORT_PERIOD_MS / 2),
        }
    }

    /// Returns `true` when a report is due, advancing the deadline by one
    /// whole period.
    pub fn due(&mut self, now: TickMs) -> bool {
        if clock::elapsed_ms(now, self.last_ms) >= self.period_ms {
            self.last_ms = self.last_ms.wrapping_add(self.period_ms);
            true
        } else {
            false
        }
    }

    /// Changes the report period, bounded to
    /// [`MIN_REPORT_PERIOD_MS`]..=[`MAX_REPORT_PERIOD_MS`].
    pub fn set_period(&mut self, period_ms: u16) -> Result<(), PeriodOutOfRange> {
        if !(MIN_REPORT_PERIOD_MS..=MAX_REPORT_PERIOD_MS).contains(&period_ms) {
            return Err(PeriodOutOfRange(period_ms));
        }
        self.period_ms = period_ms;
        Ok(())
    }

    /// Currently configured period.
    #[must_use]
    pub const fn period_ms(&self) -> u16 {
        self.period_ms
    }
}

/// Snapshot of the reportable status fields, captured once per report period
/// so every consumer sees one consistent view.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StatusReport {
    pub state: EngineState,
    pub thr_in: u16,
    pub throttle_in: f32,
    pub throttle_out: f32,
    pub rpm: u16,
    pub cht: i16,
    pub iat: i16,
    pub baro: u32,
    pub ecut: i16,
    pub humidity: u16,
    pub egt: u32,
    pub pt_c: f32,
    pub starts: u16,
    pub pwm0_out: u16,
    pub pwm1_out: u16,
}

impl StatusReport {
    /// Captures the reportable subset of the engine status.
    #[must_use]
    pub fn capture(status: &EngineStatus) -> Self {
        Self {
            state: status.state,
            thr_in: status.thr_in,
            throttle_in: status.throttle_in,
            throttle_out: status.throttle_out,
            rpm: status.rpm,
            cht: status.cht,
            iat: status.iat,
            baro: status.baro,
            ecut: status.ecut,
            humidity: status.humidity,
            egt: status.egt,
            pt_c: status.pt_c,
            starts: status.starts,
            pwm0_out: status.pwm0_out,
            pwm1_out: status.pwm1_out,
        }
    }
}

/// One rendered protocol line.
pub type Line = String<160>;

/// Number of JSON frames in one status report.
pub const REPORT_LINES: usize = 4;

/// Upper bound on lines a single reply can produce (the config dump).
pub const MAX_REPLY_LINES: usize = Field::ALL.len() + 1;

/// Renders a status report as JSON frames.
#[must_use]
pub fn format_report(report: &StatusReport) -> Vec<Line, REPORT_LINES> {
    let mut lines = Vec::new();
    let mut line = Line::new();
    let _ = write!(
        line,
        "{{\"status\":{{\"state\":\"{}\",\"thr_in\":{},\"throttle_in\":{},\"throttle_out\":{},\"rpm\":{},\"cht\":{},\"iat\":{}}}}}",
        report.state.label(),
        report.thr_in,
        percent(report.throttle_in),
        percent(report.throttle_out),
        report.rpm,
        report.cht,
        report.iat,
    );
    let _ = lines.push(line);

    let mut line = Line::new();
    let _ = write!(
        line,
        "{{\"status\":{{\"baro\":{},\"ecut\":{},\"humidity\":{},\"egt\":{}}}}}",
        report.baro, report.ecut, report.humidity, report.egt,
    );
    let _ = lines.push(line);

    let mut line = Line::new();
    let _ = write!(
        line,
        "{{\"status\":{{\"pt_c\":{:.4},\"starts\":{}}}}}",
        report.pt_c, report.starts,
    );
    let _ = lines.push(line);

    let mut line = Line::new();
    let _ = write!(
        line,
        "{{\"status\":{{\"pwm0_out\":{},\"pwm1_out\":{}}}}}",
        report.pwm0_out, report.pwm1_out,
    );
    let _ = lines.push(line);

    lines
}

/// Renders a successful console reply; the config dump expands to one line
/// per field.
#[must_use]
pub fn format_reply(reply: &Reply) -> Vec<Line, MAX_REPLY_LINES> {
    let mut lines = Vec::new();
    match reply {
        Reply::ConfigDump(config) => {
            for field in Field::ALL {
                let _ = lines.push(field_line(field, config));
            }
        }
        Reply::DefaultsRestored => {
            let _ = lines.push(literal("config reset to defaults"));
        }
        Reply::Saved => {
            let _ = lines.push(literal("config saved"));
        }
        Reply::Period(period_ms) => {
            let mut line = Line::new();
            let _ = write!(line, "new period {period_ms}");
            let _ = lines.push(line);
        }
        Reply::Value { field, value } | Reply::Updated { field, value } => {
            let mut line = Line::new();
            let _ = write!(line, "{}={value}", field.name());
            let _ = lines.push(line);
        }
    }
    lines
}

/// Renders a console failure.
#[must_use]
pub fn format_error(error: &CommandError) -> Line {
    let mut line = Line::new();
    let _ = write!(line, "{error}");
    line
}

fn field_line(field: Field, config: &EcuConfig) -> Line {
    let mut line = Line::new();
    let _ = write!(line, "{}={}", field.name(), config.get(field));
    line
}

fn literal(text: &str) -> Line {
    let mut line = Line::new();
    let _ = line.push_str(text);
    line
}

#[allow(clippy::cast_possible_truncation)]
fn percent(fraction: f32) -> i32 {
    (100.0 * fraction) as i32
}

/// Number of lifecycle events retained in memory.
pub const EVENT_LOG_CAPACITY: usize = 32;

/// Timestamped lifecycle event.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct EventRecord {
    pub at_ms: TickMs,
    pub event: EngineEvent,
}

/// Fixed-capacity ring of recent lifecycle events.
#[derive(Debug, Default)]
pub struct EventLog {
    ring: HistoryBuf<EventRecord, EVENT_LOG_CAPACITY>,
}

impl EventLog {
    /// Creates an empty log.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
        }
    }

    /// Records one event at the given tick.
    pub fn record(&mut self, at_ms: TickMs, event: EngineEvent) {
        self.ring.write(EventRecord { at_ms, event });
    }

    /// Most recent event, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&EventRecord> {
        self.ring.recent()
    }

    /// Iterates the retained events in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, EventRecord> {
        self.ring.oldest_ordered()
    }

    /// Number of retained events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when nothing has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduler_fires_on_whole_periods() {
        let mut scheduler = ReportScheduler::new(0);

        // Boot offset: first report half a period in.
        assert!(!scheduler.due(999));
        assert!(scheduler.due(1_000));
        assert!(!scheduler.due(1_100));
        assert!(!scheduler.due(2_999));
        assert!(scheduler.due(3_000));
        // A late poll advances the deadline by a whole period, not to `now`.
        assert!(scheduler.due(5_123));
        assert!(!scheduler.due(6_900));
        assert!(scheduler.due(7_000));
    }

    #[test]
    fn scheduler_survives_counter_wrap() {
        let mut scheduler = ReportScheduler::new(u16::MAX - 500);

        assert!(!scheduler.due(u16::MAX - 1));
        assert!(scheduler.due(500));
        assert!(!scheduler.due(2_498));
        assert!(scheduler.due(2_499));
    }

    #[test]
    fn period_bounds_are_enforced() {
        let mut scheduler = ReportScheduler::new(0);
        assert_eq!(scheduler.set_period(49), Err(PeriodOutOfRange(49)));
        assert_eq!(scheduler.set_period(5_001), Err(PeriodOutOfRange(5_001)));
        assert_eq!(scheduler.period_ms(), DEFAULT_REPORT_PERIOD_MS);
        scheduler.set_period(50).unwrap();
        assert_eq!(scheduler.period_ms(), 50);
    }

    fn sample_report() -> StatusReport {
        let mut status = EngineStatus::new(&EcuConfig::default());
        status.state = EngineState::Running;
        status.thr_in = 1_500;
        status.throttle_in = 0.5;
        status.throttle_out = 0.35;
        status.rpm = 6_200;
        status.cht = 143;
        status.iat = 21;
        status.pt_c = 1.0825;
        status.pwm0_out = 1_350;
        status.pwm1_out = 1_000;
        StatusReport::capture(&status)
    }

    #[test]
    fn report_lines_match_the_wire_format() {
        let lines = format_report(&sample_report());
        assert_eq!(lines.len(), REPORT_LINES);
        assert_eq!(
            lines[0].as_str(),
            "{\"status\":{\"state\":\"running\",\"thr_in\":1500,\"throttle_in\":50,\
             \"throttle_out\":35,\"rpm\":6200,\"cht\":143,\"iat\":21}}"
        );
        assert_eq!(
            lines[1].as_str(),
            "{\"status\":{\"baro\":101325,\"ecut\":0,\"humidity\":0,\"egt\":0}}"
        );
        assert_eq!(
            lines[2].as_str(),
            "{\"status\":{\"pt_c\":1.0825,\"starts\":0}}"
        );
        assert_eq!(
            lines[3].as_str(),
            "{\"status\":{\"pwm0_out\":1350,\"pwm1_out\":1000}}"
        );
    }

    #[test]
    fn config_dump_lists_every_field() {
        let config = EcuConfig::default();
        let lines = format_reply(&Reply::ConfigDump(config));
        assert_eq!(lines.len(), Field::ALL.len());
        assert_eq!(lines[0].as_str(), "pwm0_min=1000");
        assert_eq!(lines[10].as_str(), "auto_start=3");
    }

    #[test]
    fn scalar_replies_are_single_lines() {
        assert_eq!(
            format_reply(&Reply::Period(500))[0].as_str(),
            "new period 500"
        );
        assert_eq!(
            format_reply(&Reply::Value {
                field: Field::RpmLimit,
                value: 9_000
            })[0]
                .as_str(),
            "rpm_limit=9000"
        );
    }

    #[test]
    fn event_log_keeps_chronological_order() {
        let mut log = EventLog::new();
        assert!(log.is_empty());

        log.record(10, EngineEvent::Prime);
        log.record(1_020, EngineEvent::Primed);
        log.record(4_100, EngineEvent::AutoCrank);

        assert_eq!(log.len(), 3);
        assert_eq!(
            log.latest(),
            Some(&EventRecord {
                at_ms: 4_100,
                event: EngineEvent::AutoCrank
            })
        );
        let order: heapless::Vec<EngineEvent, 4> =
            log.oldest_first().map(|record| record.event).collect();
        assert_eq!(
            order.as_slice(),
            &[EngineEvent::Prime, EngineEvent::Primed, EngineEvent::AutoCrank]
        );
    }
}
