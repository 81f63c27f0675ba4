use defmt::*;

#[embassy_executor::task]
pub async fn report(presses: &'static crate::Presses) {
    let counter = unwrap!(presses.report().await);
    let _tim5 = counter.free();
    info!("Reporter done after {} presses", presses.presses());
}
