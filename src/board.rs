//! STM32F401 board support: clock tree and TIM5 as a [`Counter`].

use embassy_stm32::pac;
use embassy_stm32::pac::timer::vals;
use embassy_stm32::peripherals::TIM5;
use embassy_stm32::time::Hertz;

use crate::error::{Error, Result};
use crate::gptimer::{AlarmConfig, CountDirection, Counter};

/// Timer kernel clock on APB1 with [`clock_config`] (APB1 = 30 MHz, x2).
pub const TIMER_CLOCK: Hertz = Hertz(60_000_000);

/// 25 MHz HSE, 60 MHz SYSCLK.
pub fn clock_config() -> embassy_stm32::Config {
    let mut config = embassy_stm32::Config::default();
    {
        use embassy_stm32::rcc::*;
        config.rcc.hse = Some(Hse {
            freq: Hertz(25_000_000),
            mode: HseMode::Oscillator,
        });
        config.rcc.pll_src = PllSource::HSE;
        config.rcc.pll = Some(Pll {
            prediv: PllPreDiv::DIV25,  // 1Mhz
            mul: PllMul::MUL240,       // 240Mhz
            divp: Some(PllPDiv::DIV4), // 240MHz / 4 = 60Mhz SYSCLK
            divq: Some(PllQDiv::DIV5), // 240MHz / 5 = 48MHz USB CLK
            divr: None,
        });
        config.rcc.sys = Sysclk::PLL1_P; // SYSCLK = PLL1_P (60MHz)
        config.rcc.ahb_pre = AHBPrescaler::DIV1; // AHB = SYSCLK     (60MHz)
        config.rcc.apb1_pre = APBPrescaler::DIV2; // APB1 = SYSCLK/2  (30MHz)
        config.rcc.apb2_pre = APBPrescaler::DIV2; // APB2 = SYSCLK/2  (30MHz)
    }
    config
}

/// TIM5, a 32-bit up/down counter. The alarm is the update event, so the
/// counter always reloads with zero.
pub struct Tim5Counter {
    _tim: TIM5,
    clock: Hertz,
    alarm: Option<AlarmConfig>,
}

impl Tim5Counter {
    pub fn new(tim: TIM5, clock: Hertz) -> Self {
        Self {
            _tim: tim,
            clock,
            alarm: None,
        }
    }

    /// Give the peripheral back.
    pub fn free(self) -> TIM5 {
        self._tim
    }

    fn regs(&self) -> pac::timer::TimGp32 {
        pac::TIM5
    }
}

impl Counter for Tim5Counter {
    fn power(&mut self, on: bool) {
        pac::RCC.apb1enr().modify(|w| w.set_tim5en(on));
        if on {
            pac::RCC.apb1rstr().modify(|w| w.set_tim5rst(true));
            pac::RCC.apb1rstr().modify(|w| w.set_tim5rst(false));
        }
    }

    fn set_resolution(&mut self, hz: u32) -> Result<()> {
        let clock = self.clock.0;
        if hz == 0 || hz > clock || clock % hz != 0 {
            return Err(Error::InvalidArgument);
        }
        let psc = u16::try_from(clock / hz - 1).map_err(|_| Error::InvalidArgument)?;

        let regs = self.regs();
        regs.psc().write_value(psc);
        // PSC is buffered, force an update to load it now.
        regs.egr().write(|w| w.set_ug(true));
        regs.sr().modify(|w| w.set_uif(false));
        Ok(())
    }

    fn set_direction(&mut self, direction: CountDirection) -> Result<()> {
        self.regs().cr1().modify(|w| {
            w.set_dir(match direction {
                CountDirection::Up => vals::Dir::UP,
                CountDirection::Down => vals::Dir::DOWN,
            })
        });
        Ok(())
    }

    /// Without an alarm the update flag marks a wrap past `u32::MAX`; one
    /// pending wrap is folded into the count. A second wrap before the next
    /// `set_count` is lost.
    fn count(&self) -> u64 {
        let regs = self.regs();
        let wrapped = self.alarm.is_none() && regs.sr().read().uif();
        let count = regs.cnt().read() as u64;
        if wrapped {
            count + (1 << 32)
        } else {
            count
        }
    }

    fn set_count(&mut self, value: u64) -> Result<()> {
        let value = u32::try_from(value).map_err(|_| Error::InvalidArgument)?;
        let regs = self.regs();
        regs.cnt().write_value(value);
        if self.alarm.is_none() {
            regs.sr().modify(|w| w.set_uif(false));
        }
        Ok(())
    }

    fn run(&mut self, on: bool) {
        self.regs().cr1().modify(|w| w.set_cen(on));
    }

    fn listen(&mut self, on: bool) {
        let on = on && self.alarm.is_some();
        self.regs().dier().modify(|w| w.set_uie(on));
    }

    fn set_alarm(&mut self, alarm: Option<AlarmConfig>) -> Result<()> {
        let regs = self.regs();
        match alarm {
            None => {
                regs.dier().modify(|w| w.set_uie(false));
                regs.cr1().modify(|w| w.set_opm(false));
                regs.arr().write_value(u32::MAX);
            }
            Some(a) => {
                if a.reload_count != 0 {
                    return Err(Error::NotSupported);
                }
                // Update fires when the counter wraps from ARR to zero.
                let arr = a
                    .alarm_count
                    .checked_sub(1)
                    .and_then(|arr| u32::try_from(arr).ok())
                    .ok_or(Error::InvalidArgument)?;
                regs.arr().write_value(arr);
                regs.cr1().modify(|w| w.set_opm(!a.auto_reload_on_alarm));
            }
        }
        self.alarm = alarm;
        Ok(())
    }

    fn take_alarm_event(&mut self) -> bool {
        let regs = self.regs();
        if regs.sr().read().uif() {
            regs.sr().modify(|w| w.set_uif(false));
            true
        } else {
            false
        }
    }
}
