//! Periodic alarm toggled by a button.
//!
//! Odd presses arm the timer from zero, even presses disarm it. While armed,
//! every alarm event flips the alarm state and queues it for the buzzer task.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use embassy_time::{with_timeout, Duration};
use embedded_hal::digital::{OutputPin, PinState};

use crate::error::Result;
use crate::gptimer::{AlarmConfig, Counter, GpTimer, TimerState};

/// What a button edge did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PressAction {
    Armed,
    Disarmed,
}

struct State<C: Counter> {
    timer: GpTimer<C>,
    presses: u32,
    alarm: bool,
}

/// Shared context of the alarm program: the timer, the press counter, the
/// alarm state and the queue towards the buzzer task.
///
/// Edge and alarm handlers only take the blocking mutex and `try_send`, so
/// both are safe to call from interrupt context.
pub struct AlarmControl<M: RawMutex, C: Counter, const N: usize> {
    state: Mutex<M, RefCell<State<C>>>,
    queue: Channel<M, bool, N>,
}

impl<M: RawMutex, C: Counter, const N: usize> AlarmControl<M, C, N> {
    /// Program a periodic alarm of `period_ticks` on `timer` and enable it.
    /// The timer is left stopped until the first press.
    pub fn new(mut timer: GpTimer<C>, period_ticks: u64) -> Result<Self> {
        timer.set_alarm_action(Some(AlarmConfig::periodic(period_ticks)))?;
        timer.enable()?;
        Ok(Self {
            state: Mutex::new(RefCell::new(State {
                timer,
                presses: 0,
                alarm: false,
            })),
            queue: Channel::new(),
        })
    }

    /// Button edge handler. Every edge counts, there is no debouncing.
    pub fn on_button_edge(&self) -> Result<PressAction> {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            state.presses = state.presses.wrapping_add(1);
            if state.presses % 2 == 1 {
                Self::arm(&mut state)?;
                debug!("alarm: armed by press {}", state.presses);
                Ok(PressAction::Armed)
            } else {
                self.disarm_locked(&mut state)?;
                debug!("alarm: disarmed by press {}", state.presses);
                Ok(PressAction::Disarmed)
            }
        })
    }

    /// Stop the timer and silence the buzzer. Calling it on a disarmed
    /// alarm publishes `false` again and leaves the timer stopped.
    pub fn disarm(&self) -> Result<()> {
        self.state
            .lock(|state| self.disarm_locked(&mut state.borrow_mut()))
    }

    /// Timer interrupt handler. Returns the new alarm state if an alarm
    /// event was pending. Events seen while disarmed are acknowledged and
    /// dropped.
    pub fn on_timer_interrupt(&self) -> Option<bool> {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            if !state.timer.take_alarm_event() || !state.timer.is_running() {
                return None;
            }
            state.alarm = !state.alarm;
            self.publish(state.alarm);
            Some(state.alarm)
        })
    }

    pub fn presses(&self) -> u32 {
        self.state.lock(|state| state.borrow().presses)
    }

    pub fn alarm(&self) -> bool {
        self.state.lock(|state| state.borrow().alarm)
    }

    pub fn timer_state(&self) -> TimerState {
        self.state.lock(|state| state.borrow().timer.state())
    }

    /// Wait up to `timeout` for an alarm state update and drive `buzzer` to
    /// it. Returns the level written, or `None` on timeout.
    pub async fn update_buzzer<P: OutputPin>(
        &self,
        buzzer: &mut P,
        timeout: Duration,
    ) -> Option<bool> {
        match with_timeout(timeout, self.queue.receive()).await {
            Ok(level) => {
                buzzer.set_state(PinState::from(level)).ok();
                Some(level)
            }
            Err(_) => None,
        }
    }

    /// Buzzer task body; never returns.
    pub async fn run_buzzer<P: OutputPin>(&self, mut buzzer: P, timeout: Duration) {
        loop {
            if let Some(level) = self.update_buzzer(&mut buzzer, timeout).await {
                trace!("buzzer: {}", level);
            }
        }
    }

    fn arm(state: &mut State<C>) -> Result<()> {
        state.timer.set_raw_count(0)?;
        if !state.timer.is_running() {
            state.timer.start()?;
        }
        Ok(())
    }

    fn disarm_locked(&self, state: &mut State<C>) -> Result<()> {
        state.alarm = false;
        self.publish(false);
        if state.timer.is_running() {
            state.timer.stop()?;
        }
        // An event latched while we held the lock must not re-raise the alarm.
        state.timer.take_alarm_event();
        Ok(())
    }

    fn publish(&self, level: bool) {
        if self.queue.try_send(level).is_err() {
            trace!("alarm: queue full, dropped {}", level);
        }
    }
}

#[cfg(test)]
mod tests {
    use core::convert::Infallible;

    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use embedded_hal::digital::ErrorType;

    use super::*;
    use crate::gptimer::mock::MockCounter;
    use crate::gptimer::TimerConfig;

    const PERIOD: u64 = 2_000_000;
    const MS: u64 = 1_000;

    type Control = AlarmControl<CriticalSectionRawMutex, MockCounter, 3>;

    #[derive(Default)]
    struct Buzzer {
        high: bool,
        writes: usize,
    }

    impl ErrorType for Buzzer {
        type Error = Infallible;
    }

    impl OutputPin for Buzzer {
        fn set_low(&mut self) -> core::result::Result<(), Infallible> {
            self.high = false;
            self.writes += 1;
            Ok(())
        }

        fn set_high(&mut self) -> core::result::Result<(), Infallible> {
            self.high = true;
            self.writes += 1;
            Ok(())
        }
    }

    fn control() -> Control {
        let timer = GpTimer::new(MockCounter::default(), &TimerConfig::up(1_000_000)).unwrap();
        AlarmControl::new(timer, PERIOD).unwrap()
    }

    /// Let `ticks` elapse on the counter and run the timer interrupt for
    /// every alarm event, returning the published levels.
    fn elapse(control: &Control, ticks: u64) -> Vec<bool> {
        control.state.lock(|state| {
            state.borrow_mut().timer.counter_mut().advance(ticks);
        });
        let mut levels = Vec::new();
        while let Some(level) = control.on_timer_interrupt() {
            levels.push(level);
        }
        levels
    }

    fn drain(control: &Control) -> Vec<bool> {
        let mut levels = Vec::new();
        while let Ok(level) = control.queue.try_receive() {
            levels.push(level);
        }
        levels
    }

    #[test]
    fn new_enables_without_starting() {
        let control = control();
        assert_eq!(control.timer_state(), TimerState::Enabled);
        assert_eq!(control.presses(), 0);
        assert!(!control.alarm());
    }

    #[test]
    fn press_parity_arms_and_disarms() {
        let control = control();
        for press in 1..=7u32 {
            let action = control.on_button_edge().unwrap();
            assert_eq!(control.presses(), press);
            if press % 2 == 1 {
                assert_eq!(action, PressAction::Armed);
                assert_eq!(control.timer_state(), TimerState::Running);
            } else {
                assert_eq!(action, PressAction::Disarmed);
                assert_eq!(control.timer_state(), TimerState::Stopped);
                assert!(!control.alarm());
                assert_eq!(drain(&control), vec![false]);
            }
        }
    }

    #[test]
    fn arming_restarts_count_from_zero() {
        let control = control();
        control.on_button_edge().unwrap();
        elapse(&control, 1_500 * MS);
        control.on_button_edge().unwrap();
        control.on_button_edge().unwrap();
        // A full period must pass after re-arming before the alarm fires.
        assert!(elapse(&control, 1_999 * MS).is_empty());
        assert_eq!(elapse(&control, MS), vec![true]);
    }

    #[test]
    fn alarm_alternates_while_armed() {
        let control = control();
        control.on_button_edge().unwrap();
        let mut expected = false;
        for _ in 0..6 {
            let levels = elapse(&control, PERIOD);
            expected = !expected;
            assert_eq!(levels, vec![expected]);
            assert_eq!(drain(&control), vec![expected]);
        }
    }

    #[test]
    fn stopped_timer_does_not_fire() {
        let control = control();
        assert!(elapse(&control, 10 * PERIOD).is_empty());
        control.on_button_edge().unwrap();
        control.on_button_edge().unwrap();
        drain(&control);
        assert!(elapse(&control, 10 * PERIOD).is_empty());
        assert!(drain(&control).is_empty());
    }

    #[test]
    fn alarm_latched_during_disarm_is_dropped() {
        let control = control();
        control.on_button_edge().unwrap();
        // The period elapses but the interrupt has not been serviced yet.
        control.state.lock(|state| {
            state.borrow_mut().timer.counter_mut().advance(PERIOD);
        });
        assert_eq!(control.on_button_edge().unwrap(), PressAction::Disarmed);

        assert_eq!(control.on_timer_interrupt(), None);
        assert_eq!(control.timer_state(), TimerState::Stopped);
        assert!(!control.alarm());
        assert_eq!(drain(&control), vec![false]);
    }

    #[test]
    fn stale_event_while_stopped_is_ignored() {
        let control = control();
        control.on_button_edge().unwrap();
        control.on_button_edge().unwrap();
        drain(&control);
        control.state.lock(|state| {
            state.borrow_mut().timer.counter_mut().pending_alarms = 1;
        });
        assert_eq!(control.on_timer_interrupt(), None);
        assert!(!control.alarm());
        assert!(drain(&control).is_empty());
        // The event was acknowledged, not left pending.
        assert_eq!(control.on_timer_interrupt(), None);
        control.state.lock(|state| {
            assert_eq!(state.borrow_mut().timer.counter_mut().pending_alarms, 0);
        });
    }

    #[test]
    fn disarm_twice_is_idempotent() {
        let control = control();
        control.on_button_edge().unwrap();
        elapse(&control, PERIOD);
        assert!(control.alarm());

        control.disarm().unwrap();
        assert_eq!(control.timer_state(), TimerState::Stopped);
        assert!(!control.alarm());
        control.disarm().unwrap();
        assert_eq!(control.timer_state(), TimerState::Stopped);
        assert!(!control.alarm());
        assert_eq!(drain(&control), vec![true, false, false]);
    }

    #[test]
    fn full_queue_drops_newest_updates() {
        let control = control();
        control.on_button_edge().unwrap();
        let levels = elapse(&control, 5 * PERIOD);
        assert_eq!(levels, vec![true, false, true, false, true]);
        // Nobody consumed, so only the first three made it.
        assert_eq!(drain(&control), vec![true, false, true]);
    }

    #[test]
    fn buzzer_follows_queue() {
        let control = control();
        let mut buzzer = Buzzer::default();
        control.on_button_edge().unwrap();
        elapse(&control, PERIOD);

        let level = block_on(control.update_buzzer(&mut buzzer, Duration::from_millis(10)));
        assert_eq!(level, Some(true));
        assert!(buzzer.high);

        elapse(&control, PERIOD);
        let level = block_on(control.update_buzzer(&mut buzzer, Duration::from_millis(10)));
        assert_eq!(level, Some(false));
        assert!(!buzzer.high);
    }

    #[test]
    fn buzzer_timeout_leaves_pin_alone() {
        let control = control();
        let mut buzzer = Buzzer::default();
        let level = block_on(control.update_buzzer(&mut buzzer, Duration::from_millis(5)));
        assert_eq!(level, None);
        assert_eq!(buzzer.writes, 0);
    }

    #[test]
    fn arm_fire_disarm_scenario() {
        let control = control();
        let mut buzzer = Buzzer::default();
        let timeout = Duration::from_millis(10);

        // t = 0 ms: arm
        assert_eq!(control.on_button_edge().unwrap(), PressAction::Armed);
        // t = 1000 ms: nothing yet
        assert!(elapse(&control, 1_000 * MS).is_empty());
        // t = 2000 ms: first alarm
        assert_eq!(elapse(&control, 1_000 * MS), vec![true]);
        assert_eq!(block_on(control.update_buzzer(&mut buzzer, timeout)), Some(true));
        assert!(buzzer.high);
        // t = 2500 ms: disarm
        assert!(elapse(&control, 500 * MS).is_empty());
        assert_eq!(control.on_button_edge().unwrap(), PressAction::Disarmed);
        assert_eq!(block_on(control.update_buzzer(&mut buzzer, timeout)), Some(false));

        assert_eq!(control.timer_state(), TimerState::Stopped);
        assert!(!control.alarm());
        assert!(!buzzer.high);
    }
}
