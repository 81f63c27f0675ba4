//! Debounced button press timing.
//!
//! Each edge reads the tick counter and resets it. The elapsed count is
//! folded into a 64-bit timeline, so `now` and `last` are ticks since the
//! timer was started even though the hardware counter is narrower.
//!
//! The timeline is only as good as the counter between two edges: TIM5
//! counts 32 bits plus one folded wrap, about 8589 s at 1 MHz. A longer
//! quiet gap is under-counted.
//!
//! A press is accepted when `|now - last| > debounce_ticks`. `last` starts
//! at zero, so the first press is judged by how long the timer ran before
//! it rather than by a previous press.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::Timer;
use portable_atomic::{AtomicU32, AtomicU64, Ordering};

use crate::config::ButtonCheckConfig;
use crate::error::{Error, Result};
use crate::gptimer::{ticks_to_secs, Counter, GpTimer};

/// An edge that passed the debounce check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AcceptedPress {
    /// Ticks since the timer was started.
    pub at: u64,
    /// Ticks since the previously accepted press.
    pub interval: u64,
    /// Accepted presses so far, this one included.
    pub count: u32,
}

struct Inner<C: Counter> {
    /// `None` once the timer has been torn down.
    timer: Option<GpTimer<C>>,
    now: u64,
}

pub struct PressTimer<M: RawMutex, C: Counter> {
    inner: Mutex<M, RefCell<Inner<C>>>,
    // Read without the lock by the reporter; display only.
    last: AtomicU64,
    presses: AtomicU32,
    config: ButtonCheckConfig,
}

impl<M: RawMutex, C: Counter> PressTimer<M, C> {
    /// Enable and start `timer`; it counts from zero from here on.
    pub fn new(mut timer: GpTimer<C>, config: ButtonCheckConfig) -> Result<Self> {
        timer.enable()?;
        timer.start()?;
        Ok(Self {
            inner: Mutex::new(RefCell::new(Inner {
                timer: Some(timer),
                now: 0,
            })),
            last: AtomicU64::new(0),
            presses: AtomicU32::new(0),
            config,
        })
    }

    /// Button edge handler.
    ///
    /// Edges arriving after [`teardown`](Self::teardown) are ignored.
    pub fn on_button_edge(&self) -> Result<Option<AcceptedPress>> {
        self.inner.lock(|inner| {
            let mut inner = inner.borrow_mut();
            let Some(timer) = inner.timer.as_mut() else {
                trace!("press: timer gone, edge ignored");
                return Ok(None);
            };
            let elapsed = timer.take_raw_count()?;
            inner.now = inner.now.wrapping_add(elapsed);

            let now = inner.now;
            let last = self.last.load(Ordering::Relaxed);
            let interval = now.abs_diff(last);
            if interval <= self.config.debounce_ticks {
                trace!("press: bounce after {} ticks", interval);
                return Ok(None);
            }

            self.last.store(now, Ordering::Relaxed);
            let count = self.presses.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
            debug!("press: {} at {} ticks", count, now);
            Ok(Some(AcceptedPress {
                at: now,
                interval,
                count,
            }))
        })
    }

    /// Ticks since start of the last accepted press.
    pub fn last(&self) -> u64 {
        self.last.load(Ordering::Relaxed)
    }

    pub fn presses(&self) -> u32 {
        self.presses.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &ButtonCheckConfig {
        &self.config
    }

    /// Log the last press time until the press target is reached, then tear
    /// the timer down and hand the counter back.
    pub async fn report(&self) -> Result<C> {
        while self.presses() < self.config.press_target {
            info!(
                "Last time button pressed (in seconds): {}",
                ticks_to_secs(self.last(), self.config.resolution_hz)
            );
            Timer::after(self.config.poll_interval).await;
        }
        self.teardown()
    }

    /// Stop, disable and delete the timer. Fails with
    /// [`Error::InvalidState`] if it was already torn down.
    pub fn teardown(&self) -> Result<C> {
        let mut timer = self
            .inner
            .lock(|inner| inner.borrow_mut().timer.take())
            .ok_or(Error::InvalidState)?;

        info!("Stop timer");
        timer.stop()?;
        info!("Disable timer");
        timer.disable()?;
        info!("Delete timer");
        timer.delete()
    }
}

#[cfg(test)]
mod tests {
    use embassy_futures::block_on;
    use embassy_futures::join::join;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use embassy_time::Duration;

    use super::*;
    use crate::gptimer::mock::MockCounter;
    use crate::gptimer::{TimerConfig, TimerState};

    const MS: u64 = 1_000;

    type Presses = PressTimer<CriticalSectionRawMutex, MockCounter>;

    fn press_timer() -> Presses {
        let timer = GpTimer::new(MockCounter::default(), &TimerConfig::up(1_000_000)).unwrap();
        let config = ButtonCheckConfig {
            poll_interval: Duration::from_millis(1),
            ..ButtonCheckConfig::DEFAULT
        };
        PressTimer::new(timer, config).unwrap()
    }

    fn elapse(presses: &Presses, ticks: u64) {
        presses.inner.lock(|inner| {
            if let Some(timer) = inner.borrow_mut().timer.as_mut() {
                timer.counter_mut().advance(ticks);
            }
        });
    }

    fn edge_after(presses: &Presses, ticks: u64) -> Option<AcceptedPress> {
        elapse(presses, ticks);
        presses.on_button_edge().unwrap()
    }

    fn timer_state(presses: &Presses) -> Option<TimerState> {
        presses
            .inner
            .lock(|inner| inner.borrow().timer.as_ref().map(|t| t.state()))
    }

    #[test]
    fn new_starts_timer() {
        let presses = press_timer();
        assert_eq!(timer_state(&presses), Some(TimerState::Running));
        assert_eq!(presses.presses(), 0);
        assert_eq!(presses.last(), 0);
    }

    #[test]
    fn edge_resets_hardware_count() {
        let presses = press_timer();
        edge_after(&presses, 30 * MS);
        let count = presses
            .inner
            .lock(|inner| inner.borrow().timer.as_ref().map(|t| t.raw_count()));
        assert_eq!(count, Some(0));
    }

    #[test]
    fn accepted_press_reports_interval() {
        let presses = press_timer();
        let first = edge_after(&presses, 50 * MS).unwrap();
        assert_eq!(first, AcceptedPress { at: 50 * MS, interval: 50 * MS, count: 1 });

        let second = edge_after(&presses, 700 * MS).unwrap();
        assert_eq!(second, AcceptedPress { at: 750 * MS, interval: 700 * MS, count: 2 });
        assert_eq!(presses.last(), 750 * MS);
    }

    #[test]
    fn bounce_is_rejected() {
        let presses = press_timer();
        edge_after(&presses, 20 * MS).unwrap();
        assert_eq!(edge_after(&presses, 5 * MS), None);
        assert_eq!(presses.presses(), 1);
        assert_eq!(presses.last(), 20 * MS);
    }

    #[test]
    fn threshold_is_exclusive() {
        let presses = press_timer();
        edge_after(&presses, 20 * MS).unwrap();
        assert_eq!(edge_after(&presses, 10 * MS), None);
        // The rejected edge still moved the timeline forward.
        assert!(edge_after(&presses, 1).is_some());
    }

    #[test]
    fn timeline_keeps_counts_wider_than_32_bits() {
        let presses = press_timer();
        let long = (1u64 << 32) + 123;
        let first = edge_after(&presses, long).unwrap();
        assert_eq!(first.at, long);
        let second = edge_after(&presses, long).unwrap();
        assert_eq!(second.at, 2 * long);
        assert_eq!(second.interval, long);
        assert_eq!(presses.last(), 2 * long);
    }

    #[test]
    fn first_press_is_measured_from_timer_start() {
        let presses = press_timer();
        assert_eq!(edge_after(&presses, 5 * MS), None);
        assert_eq!(presses.presses(), 0);

        let presses = press_timer();
        assert!(edge_after(&presses, 11 * MS).is_some());
    }

    #[test]
    fn accepted_presses_are_more_than_threshold_apart() {
        let presses = press_timer();
        let gaps_ms = [3, 12, 1, 1, 2, 40, 9, 9, 0, 15, 4, 4, 4, 30, 11, 1];
        let mut accepted = Vec::new();
        for gap in gaps_ms {
            if let Some(press) = edge_after(&presses, gap * MS) {
                accepted.push(press.at);
            }
        }
        assert!(accepted.len() > 2);
        for pair in accepted.windows(2) {
            assert!(pair[1] - pair[0] > presses.config().debounce_ticks);
        }
        assert_eq!(presses.presses() as usize, accepted.len());
    }

    #[test]
    fn report_tears_down_after_target() {
        let presses = press_timer();
        let presser = async {
            for _ in 0..10 {
                edge_after(&presses, 250 * MS).unwrap();
                Timer::after_millis(2).await;
            }
        };
        let (counter, ()) = block_on(join(presses.report(), presser));
        let counter = counter.unwrap();

        assert_eq!(presses.presses(), 10);
        assert_eq!(presses.last(), 2_500 * MS);
        assert!(!counter.powered);
        assert!(!counter.running);
        assert!(!counter.listening);
        assert_eq!(timer_state(&presses), None);
    }

    #[test]
    fn teardown_happens_once() {
        let presses = press_timer();
        assert!(presses.teardown().is_ok());
        assert_eq!(presses.teardown().err(), Some(Error::InvalidState));
    }

    #[test]
    fn edges_after_teardown_are_ignored() {
        let presses = press_timer();
        edge_after(&presses, 20 * MS).unwrap();
        presses.teardown().unwrap();
        assert_eq!(presses.on_button_edge(), Ok(None));
        assert_eq!(presses.presses(), 1);
    }
}
