//! Press the button once and the buzzer sounds two seconds later, then
//! toggles every two seconds. Press it again to stop.

#![no_std]
#![no_main]

use cortex_m_rt::entry;
use defmt::*;
use embassy_executor::{Executor, InterruptExecutor};
use embassy_stm32::interrupt;
use embassy_stm32::interrupt::{InterruptExt, Priority};
use embassy_stm32::{exti::Channel, gpio::Pin};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::once_lock::OnceLock;
use static_cell::StaticCell;
use stm32f401_gptimer::alarm::AlarmControl;
use stm32f401_gptimer::board::{self, Tim5Counter};
use stm32f401_gptimer::config::{AlarmPeriodConfig, ALARM_QUEUE_DEPTH};
use stm32f401_gptimer::gptimer::{GpTimer, TimerConfig};
use {defmt_rtt as _, panic_probe as _};

mod button_task;
mod buzzer_task;

pub type Control = AlarmControl<CriticalSectionRawMutex, Tim5Counter, ALARM_QUEUE_DEPTH>;

const CONFIG: AlarmPeriodConfig = AlarmPeriodConfig::DEFAULT;

static CONTROL: StaticCell<Control> = StaticCell::new();
// The TIM5 vector can't take arguments, main hands it the context here.
static TIM5_CONTROL: OnceLock<&'static Control> = OnceLock::new();

static INTERRUPT_EXECUTOR: InterruptExecutor = InterruptExecutor::new();
static EXECUTOR: StaticCell<Executor> = StaticCell::new();

#[interrupt]
unsafe fn SPI4() {
    INTERRUPT_EXECUTOR.on_interrupt()
}

#[interrupt]
unsafe fn TIM5() {
    if let Some(control) = TIM5_CONTROL.try_get() {
        if let Some(level) = control.on_timer_interrupt() {
            trace!("Alarm: {}", level);
        }
    }
}

#[entry]
fn main() -> ! {
    let p = embassy_stm32::init(board::clock_config());
    info!("embassy_stm32::init");

    // 1 MHz up-counter, alarm every two seconds, reload with zero
    let counter = Tim5Counter::new(p.TIM5, board::TIMER_CLOCK);
    let timer = unwrap!(GpTimer::new(
        counter,
        &TimerConfig::up(CONFIG.resolution_hz)
    ));
    let control: &'static Control =
        CONTROL.init(unwrap!(AlarmControl::new(timer, CONFIG.period_ticks)));
    if TIM5_CONTROL.init(control).is_err() {
        panic!("TIM5 handler already installed");
    }

    interrupt::TIM5.set_priority(Priority::P5);
    unsafe { interrupt::TIM5.enable() };

    // Spawn tasks
    interrupt::SPI4.set_priority(Priority::P6);
    let interrupt_spawner = INTERRUPT_EXECUTOR.start(interrupt::SPI4);
    interrupt_spawner.must_spawn(button_task::button(
        control,
        p.PA0.degrade(),
        p.EXTI0.degrade(),
    ));
    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| {
        spawner.must_spawn(buzzer_task::buzzer(
            control,
            p.PA1.degrade(),
            CONFIG.receive_timeout,
        ));
    });
}
