use embassy_stm32::exti::ExtiInput;
use portable_atomic::Ordering;

use super::TACH_PULSES;

/// Counts rising edges from the tachometer pickup. The control task turns
/// the pulse delta into an RPM figure once per cycle.
#[embassy_executor::task]
pub async fn run(mut tach: ExtiInput<'static>) -> ! {
    loop {
        tach.wait_for_rising_edge().await;
        TACH_PULSES.fetch_add(1, Ordering::Relaxed);
    }
}
