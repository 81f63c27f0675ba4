use defmt::*;
use embassy_stm32::{
    exti::{AnyChannel, ExtiInput},
    gpio::{AnyPin, Pull},
};
use stm32f401_gptimer::alarm::PressAction;

#[embassy_executor::task]
pub async fn button(control: &'static crate::Control, button: AnyPin, exti: AnyChannel) {
    let mut button = ExtiInput::new(button, exti, Pull::Up);
    loop {
        button.wait_for_rising_edge().await;
        match unwrap!(control.on_button_edge()) {
            PressAction::Armed => info!("Alarm armed (press {})", control.presses()),
            PressAction::Disarmed => info!("Alarm disarmed (press {})", control.presses()),
        }
    }
}
