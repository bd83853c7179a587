//! Emission of the rendered serial-protocol lines.
//!
//! The line formats themselves live in [`ecu_core::telemetry`] so the
//! emulator emits identical frames; this module mirrors every emission to
//! defmt on the MCU target or stdout on the host.

#![allow(dead_code)]

use ecu_core::clock::TickMs;
use ecu_core::engine::EngineEvent;
use ecu_core::telemetry::{StatusReport, format_report};

pub use ecu_core::telemetry::{Line, format_error, format_reply};

/// Emits every line of a status report.
pub fn emit_report(report: &StatusReport) {
    for line in format_report(report) {
        emit_log(line.as_str());
    }
}

/// Logs a lifecycle event at its tick.
pub fn log_event(at_ms: TickMs, event: EngineEvent) {
    #[cfg(target_os = "none")]
    defmt::info!("[{}ms] {}", at_ms, event.label());

    #[cfg(not(target_os = "none"))]
    println!("[{at_ms}ms] {}", event.label());
}

#[cfg(target_os = "none")]
fn emit_log(line: &str) {
    defmt::info!("{}", line);
}

#[cfg(not(target_os = "none"))]
fn emit_log(line: &str) {
    println!("{line}");
}
