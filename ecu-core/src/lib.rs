#![no_std]

// Portable control core for the EMU ECU firmware.
//
// This crate stays portable across MCU firmware and host tooling by avoiding
// the Rust standard library. Hardware access (PWM channels, ignition, fuel
// pump) and the injection model are abstracted behind traits so the engine
// lifecycle logic can be exercised on the host.

pub mod clock;
pub mod config;
pub mod console;
pub mod engine;
pub mod pwm;
pub mod status;
pub mod telemetry;
pub mod throttle;
