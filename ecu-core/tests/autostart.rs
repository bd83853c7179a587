//! Automatic crank attempts, the retry budget, and starter release.

mod common;

use common::TestRig;
use ecu_core::config::EcuConfig;
use ecu_core::engine::EngineEvent;
use ecu_core::status::EngineState;

fn quick_config() -> EcuConfig {
    EcuConfig {
        dwell_time_ms: 500,
        start_time_ms: 1_000,
        auto_start: 3,
        ..EcuConfig::default()
    }
}

#[test]
fn three_failed_cranks_exhaust_the_budget_until_throttle_drops() {
    let mut rig = TestRig::new(quick_config());
    rig.settle_stopped();

    let mut now: u16 = 1_100;
    for attempt in 1..=3 {
        // Dwell after the last stop, throttle above the start threshold.
        now += 600;
        let events = rig.cycle(now, 0, 1_500);
        assert_eq!(events.as_slice(), &[EngineEvent::AutoCrank]);
        assert_eq!(rig.ecu.status().state, EngineState::Crank);
        assert_eq!(rig.ecu.status().starts, attempt);
        assert_eq!(rig.ecu.status().pwm1_out, rig.config.pwm1_max);
        assert_eq!(rig.outputs.fuel_pump, Some(true));

        // The engine never turns over; the crank window expires.
        now += 1_001;
        let events = rig.cycle(now, 0, 1_500);
        assert_eq!(events.as_slice(), &[EngineEvent::CrankTimeout]);
        assert_eq!(rig.ecu.status().state, EngineState::Stopped);
        assert_eq!(rig.ecu.status().pwm1_out, rig.config.pwm1_min);
    }

    // Budget exhausted: the machine holds in Stopped without cranking.
    for _ in 0..3 {
        now += 600;
        let events = rig.cycle(now, 0, 1_500);
        assert!(events.is_empty());
        assert_eq!(rig.ecu.status().state, EngineState::Stopped);
        assert_eq!(rig.ecu.status().starts, 3);
    }

    // Throttle below the start threshold re-arms the budget...
    now += 600;
    let events = rig.cycle(now, 0, 1_000);
    assert!(events.is_empty());
    assert_eq!(rig.ecu.status().starts, 0);

    // ...and the next above-threshold sample cranks again.
    now += 20;
    let events = rig.cycle(now, 0, 1_500);
    assert_eq!(events.as_slice(), &[EngineEvent::AutoCrank]);
    assert_eq!(rig.ecu.status().starts, 1);
}

#[test]
fn crank_catches_and_releases_the_starter() {
    let mut rig = TestRig::new(EcuConfig {
        dwell_time_ms: 2_000,
        start_time_ms: 1_000,
        auto_start: 3,
        ..EcuConfig::default()
    });
    rig.settle_stopped();

    // Dwell since the boot-time stop, then crank.
    let events = rig.cycle(3_200, 0, 1_500);
    assert_eq!(events.as_slice(), &[EngineEvent::AutoCrank]);

    // The engine turns over: ignition comes on, starter stays engaged.
    let events = rig.cycle(3_400, 300, 1_500);
    assert_eq!(events.as_slice(), &[EngineEvent::Ignition]);
    assert_eq!(rig.ecu.status().state, EngineState::Start);
    assert_eq!(rig.outputs.ignition, Some(true));
    assert_eq!(rig.ecu.status().pwm1_out, rig.config.pwm1_max);

    // Crank window expires mid-start: the starter is released while the
    // start attempt continues.
    let events = rig.cycle(4_300, 800, 1_500);
    assert_eq!(events.as_slice(), &[EngineEvent::CrankReleased]);
    assert_eq!(rig.ecu.status().state, EngineState::Start);
    assert_eq!(rig.ecu.status().pwm1_out, rig.config.pwm1_min);

    // Full dwell of rotation: running.
    let events = rig.cycle(5_300, 1_200, 1_500);
    assert_eq!(events.as_slice(), &[EngineEvent::Running]);
    assert_eq!(rig.ecu.status().state, EngineState::Running);
}

#[test]
fn manual_start_takes_priority_over_auto_crank() {
    let mut rig = TestRig::new(quick_config());
    rig.settle_stopped();

    // Both branches match: engine already spinning with the throttle above
    // the start threshold. Manual start is evaluated first and wins.
    let events = rig.cycle(1_700, 50, 1_500);
    assert_eq!(events.as_slice(), &[EngineEvent::ManualStart]);
    assert_eq!(rig.ecu.status().state, EngineState::Start);
    // No crank attempt was consumed.
    assert_eq!(rig.ecu.status().starts, 0);
    assert_eq!(rig.ecu.status().pwm1_out, rig.config.pwm1_min);
}

#[test]
fn auto_start_disabled_never_cranks() {
    let mut rig = TestRig::new(EcuConfig {
        auto_start: 0,
        dwell_time_ms: 500,
        ..EcuConfig::default()
    });
    rig.settle_stopped();

    for step in 1..=5 {
        let events = rig.cycle(1_100 + step * 600, 0, 1_800);
        assert!(events.is_empty());
        assert_eq!(rig.ecu.status().state, EngineState::Stopped);
        assert_eq!(rig.ecu.status().starts, 0);
    }
}
