use defmt::*;
use embassy_stm32::{
    exti::{AnyChannel, ExtiInput},
    gpio::{AnyPin, Pull},
};

#[embassy_executor::task]
pub async fn button(presses: &'static crate::Presses, button: AnyPin, exti: AnyChannel) {
    let mut button = ExtiInput::new(button, exti, Pull::Up);
    loop {
        button.wait_for_rising_edge().await;
        if let Some(press) = unwrap!(presses.on_button_edge()) {
            info!("Press {}: {} us since previous", press.count, press.interval);
        }
    }
}
