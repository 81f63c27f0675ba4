use defmt::*;
use embassy_stm32::gpio::{AnyPin, Level, Output, Speed};
use embassy_time::Duration;

#[embassy_executor::task]
pub async fn buzzer(control: &'static crate::Control, pin: AnyPin, timeout: Duration) {
    let buzzer = Output::new(pin, Level::Low, Speed::Low);
    info!("Buzzer ready");
    control.run_buzzer(buzzer, timeout).await;
}
