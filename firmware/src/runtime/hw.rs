//! Bindings between the control core's output/input seams and the STM32
//! peripherals.

use embassy_stm32::Peri;
use embassy_stm32::adc::{Adc, SampleTime};
use embassy_stm32::gpio::Output;
use embassy_stm32::peripherals::{ADC1, PA0, PA1, TIM3};
use embassy_stm32::timer::Channel;
use embassy_stm32::timer::simple_pwm::SimplePwm;

use ecu_core::pwm::{EngineOutputs, PwmChannel};

/// Servo frame length at 50 Hz, in microseconds.
const PWM_FRAME_US: u32 = 20_000;

/// PWM timer plus the ignition and fuel pump switches.
pub struct EcuOutputs {
    pwm: SimplePwm<'static, TIM3>,
    ignition: Output<'static>,
    pump: Output<'static>,
}

impl EcuOutputs {
    pub fn new(
        mut pwm: SimplePwm<'static, TIM3>,
        ignition: Output<'static>,
        pump: Output<'static>,
    ) -> Self {
        pwm.channel(Channel::Ch1).enable();
        pwm.channel(Channel::Ch2).enable();
        Self {
            pwm,
            ignition,
            pump,
        }
    }

    fn timer_channel(channel: PwmChannel) -> Channel {
        match channel {
            PwmChannel::Throttle => Channel::Ch1,
            PwmChannel::Crank => Channel::Ch2,
        }
    }
}

impl EngineOutputs for EcuOutputs {
    fn set_pwm(&mut self, channel: PwmChannel, duty: u16) {
        // Duty values are pulse widths in microseconds within the 20 ms
        // servo frame.
        let mut timer_channel = self.pwm.channel(Self::timer_channel(channel));
        let max = timer_channel.max_duty_cycle();
        let compare = u32::from(duty) * u32::from(max) / PWM_FRAME_US;
        timer_channel.set_duty_cycle(compare as u16);
    }

    fn ignition(&mut self, enabled: bool) {
        if enabled {
            self.ignition.set_high();
        } else {
            self.ignition.set_low();
        }
    }

    fn fuel_pump(&mut self, enabled: bool) {
        if enabled {
            self.pump.set_high();
        } else {
            self.pump.set_low();
        }
    }
}

/// Analog inputs: throttle demand on PA0, head temperature on PA1.
pub struct SensorBank {
    adc: Adc<'static, ADC1>,
    throttle_pin: Peri<'static, PA0>,
    cht_pin: Peri<'static, PA1>,
}

impl SensorBank {
    pub fn new(
        mut adc: Adc<'static, ADC1>,
        throttle_pin: Peri<'static, PA0>,
        cht_pin: Peri<'static, PA1>,
    ) -> Self {
        adc.set_sample_time(SampleTime::CYCLES160_5);
        Self {
            adc,
            throttle_pin,
            cht_pin,
        }
    }

    /// Reads the throttle potentiometer and maps it onto the servo pulse
    /// range so the core sees the same units as an RC receiver input.
    pub fn read_throttle_raw(&mut self) -> u16 {
        let sample = u32::from(self.adc.blocking_read(&mut self.throttle_pin));
        (1_000 + sample * 1_000 / 4_095) as u16
    }

    /// Raw head-temperature sample; calibration-table interpolation lives in
    /// the sensor collaborator.
    pub fn read_cht_raw(&mut self) -> u16 {
        self.adc.blocking_read(&mut self.cht_pin)
    }
}
