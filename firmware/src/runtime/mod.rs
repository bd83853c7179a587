use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::adc::Adc;
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{Level, Output, OutputType, Pull, Speed};
use embassy_stm32::time::hz;
use embassy_stm32::timer::simple_pwm::{PwmPin, SimplePwm};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use portable_atomic::AtomicU32;

use ecu_core::console;

use crate::telemetry;

mod console_task;
mod control_task;
mod hw;
mod tach_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

/// Completed console lines waiting for the control loop.
pub(super) static LINE_QUEUE: Channel<CriticalSectionRawMutex, console::Line, 4> = Channel::new();
/// Rendered reply lines waiting for the console UART.
pub(super) static REPLY_QUEUE: Channel<CriticalSectionRawMutex, telemetry::Line, 8> =
    Channel::new();
/// Tachometer pulses accumulated by the EXTI task.
pub(super) static TACH_PULSES: AtomicU32 = AtomicU32::new(0);

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        TIM3,
        PA6,
        PA7,
        PB0,
        PB1,
        PA0,
        PA1,
        PA8,
        EXTI8,
        ADC1,
        USART2,
        PA2,
        PA3,
        ..
    } = hal::init(config);

    // 50 Hz servo-style PWM on TIM3: channel 1 drives the throttle
    // actuator, channel 2 the crank/ignition output.
    let throttle_pin = PwmPin::new_ch1(PA6, OutputType::PushPull);
    let crank_pin = PwmPin::new_ch2(PA7, OutputType::PushPull);
    let pwm = SimplePwm::new(
        TIM3,
        Some(throttle_pin),
        Some(crank_pin),
        None,
        None,
        hz(50),
        Default::default(),
    );

    let outputs = hw::EcuOutputs::new(
        pwm,
        Output::new(PB0, Level::Low, Speed::Low),
        Output::new(PB1, Level::Low, Speed::Low),
    );

    let sensors = hw::SensorBank::new(Adc::new(ADC1), PA0, PA1);

    let tach = ExtiInput::new(PA8, EXTI8, Pull::Down);

    spawner
        .spawn(control_task::run(outputs, sensors))
        .expect("failed to spawn control task");
    spawner
        .spawn(tach_task::run(tach))
        .expect("failed to spawn tach task");
    spawner
        .spawn(console_task::run(USART2, PA2, PA3))
        .expect("failed to spawn console task");

    core::future::pending::<()>().await;
}
