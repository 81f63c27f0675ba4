//! Print the time of the last button press, measured from when the timer
//! was started. Presses closer than 10 ms to the previous one are treated
//! as contact bounce. After ten presses the timer is torn down.

#![no_std]
#![no_main]

use cortex_m_rt::entry;
use defmt::*;
use embassy_executor::{Executor, InterruptExecutor};
use embassy_stm32::interrupt;
use embassy_stm32::interrupt::{InterruptExt, Priority};
use embassy_stm32::{exti::Channel, gpio::Pin};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use static_cell::StaticCell;
use stm32f401_gptimer::board::{self, Tim5Counter};
use stm32f401_gptimer::config::ButtonCheckConfig;
use stm32f401_gptimer::gptimer::{GpTimer, TimerConfig};
use stm32f401_gptimer::press::PressTimer;
use {defmt_rtt as _, panic_probe as _};

mod button_task;
mod report_task;

pub type Presses = PressTimer<CriticalSectionRawMutex, Tim5Counter>;

const CONFIG: ButtonCheckConfig = ButtonCheckConfig::DEFAULT;

static PRESSES: StaticCell<Presses> = StaticCell::new();

static INTERRUPT_EXECUTOR: InterruptExecutor = InterruptExecutor::new();
static EXECUTOR: StaticCell<Executor> = StaticCell::new();

#[interrupt]
unsafe fn SPI4() {
    INTERRUPT_EXECUTOR.on_interrupt()
}

#[entry]
fn main() -> ! {
    let p = embassy_stm32::init(board::clock_config());
    info!("embassy_stm32::init");

    // 1 MHz free-running up-counter, started right away
    let counter = Tim5Counter::new(p.TIM5, board::TIMER_CLOCK);
    let timer = unwrap!(GpTimer::new(
        counter,
        &TimerConfig::up(CONFIG.resolution_hz)
    ));
    let presses: &'static Presses = PRESSES.init(unwrap!(PressTimer::new(timer, CONFIG)));

    // Spawn tasks
    interrupt::SPI4.set_priority(Priority::P6);
    let interrupt_spawner = INTERRUPT_EXECUTOR.start(interrupt::SPI4);
    interrupt_spawner.must_spawn(button_task::button(
        presses,
        p.PA0.degrade(),
        p.EXTI0.degrade(),
    ));
    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| {
        spawner.must_spawn(report_task::report(presses));
    });
}
