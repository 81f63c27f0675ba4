//! General-purpose timer driver.
//!
//! [`Counter`] is the low-level access to one hardware counter. [`GpTimer`]
//! wraps it and enforces the timer lifecycle:
//!
//! ```text
//! Idle -> Enabled -> Running <-> Stopped -> Disabled -> (deleted)
//!            ^                                  |
//!            +----------------------------------+
//! ```
//!
//! Calls made in the wrong state return [`Error::InvalidState`] and do not
//! touch the hardware.

use crate::error::{Error, Result};

/// Counting direction
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CountDirection {
    #[default]
    Up,
    Down,
}

/// Timer configuration, fixed for the lifetime of the handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerConfig {
    pub direction: CountDirection,
    /// Tick frequency of the counter.
    pub resolution_hz: u32,
}

impl TimerConfig {
    pub const fn up(resolution_hz: u32) -> Self {
        Self {
            direction: CountDirection::Up,
            resolution_hz,
        }
    }
}

/// Alarm action
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlarmConfig {
    /// Count at which the alarm event fires.
    pub alarm_count: u64,
    /// Value loaded into the counter when the alarm fires and auto-reload is on.
    pub reload_count: u64,
    pub auto_reload_on_alarm: bool,
}

impl AlarmConfig {
    /// Alarm every `period` ticks, reloading the counter with zero.
    pub const fn periodic(period: u64) -> Self {
        Self {
            alarm_count: period,
            reload_count: 0,
            auto_reload_on_alarm: true,
        }
    }

    /// Single alarm at `alarm_count`.
    pub const fn oneshot(alarm_count: u64) -> Self {
        Self {
            alarm_count,
            reload_count: 0,
            auto_reload_on_alarm: false,
        }
    }
}

/// Lifecycle state of a [`GpTimer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerState {
    Idle,
    Enabled,
    Running,
    Stopped,
    Disabled,
}

/// Low-level access to a hardware counter.
pub trait Counter {
    /// Gate the peripheral clock.
    fn power(&mut self, on: bool);

    /// Derive a tick frequency of `hz` from the counter clock.
    fn set_resolution(&mut self, hz: u32) -> Result<()>;

    fn set_direction(&mut self, direction: CountDirection) -> Result<()>;

    /// Current raw count.
    fn count(&self) -> u64;

    fn set_count(&mut self, value: u64) -> Result<()>;

    /// Start or halt counting.
    fn run(&mut self, on: bool);

    /// Unmask or mask the alarm interrupt.
    fn listen(&mut self, on: bool);

    /// Program the alarm, or remove it with `None`.
    fn set_alarm(&mut self, alarm: Option<AlarmConfig>) -> Result<()>;

    /// Clear a pending alarm event, returning whether there was one.
    fn take_alarm_event(&mut self) -> bool;
}

/// Lifecycle-checked timer handle.
pub struct GpTimer<C: Counter> {
    counter: C,
    config: TimerConfig,
    state: TimerState,
}

impl<C: Counter> GpTimer<C> {
    /// Power up `counter` and configure it; the timer starts in [`TimerState::Idle`]
    /// with a raw count of zero.
    pub fn new(mut counter: C, config: &TimerConfig) -> Result<Self> {
        if config.resolution_hz == 0 {
            return Err(Error::InvalidArgument);
        }

        counter.power(true);
        let configured = counter
            .set_resolution(config.resolution_hz)
            .and_then(|_| counter.set_direction(config.direction))
            .and_then(|_| counter.set_count(0));
        if let Err(e) = configured {
            counter.power(false);
            return Err(e);
        }

        debug!("gptimer: new, {} Hz", config.resolution_hz);
        Ok(Self {
            counter,
            config: *config,
            state: TimerState::Idle,
        })
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    /// Set or clear the alarm action. Allowed in every state.
    pub fn set_alarm_action(&mut self, alarm: Option<AlarmConfig>) -> Result<()> {
        if let Some(a) = alarm {
            if a.auto_reload_on_alarm
                && self.config.direction == CountDirection::Up
                && a.reload_count >= a.alarm_count
            {
                return Err(Error::InvalidArgument);
            }
        }
        self.counter.set_alarm(alarm)
    }

    pub fn enable(&mut self) -> Result<()> {
        self.transition(&[TimerState::Idle, TimerState::Disabled], TimerState::Enabled)?;
        self.counter.listen(true);
        Ok(())
    }

    pub fn start(&mut self) -> Result<()> {
        self.transition(&[TimerState::Enabled, TimerState::Stopped], TimerState::Running)?;
        self.counter.run(true);
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        self.transition(&[TimerState::Running], TimerState::Stopped)?;
        self.counter.run(false);
        Ok(())
    }

    pub fn disable(&mut self) -> Result<()> {
        self.transition(&[TimerState::Enabled, TimerState::Stopped], TimerState::Disabled)?;
        self.counter.listen(false);
        Ok(())
    }

    /// Release the counter. Only an idle or disabled timer can be deleted.
    pub fn delete(mut self) -> Result<C> {
        match self.state {
            TimerState::Idle | TimerState::Disabled => {
                self.counter.power(false);
                debug!("gptimer: deleted");
                Ok(self.counter)
            }
            _ => Err(Error::InvalidState),
        }
    }

    pub fn raw_count(&self) -> u64 {
        self.counter.count()
    }

    pub fn set_raw_count(&mut self, value: u64) -> Result<()> {
        self.counter.set_count(value)
    }

    /// Read the raw count and restart counting from zero.
    pub fn take_raw_count(&mut self) -> Result<u64> {
        let count = self.counter.count();
        self.counter.set_count(0)?;
        Ok(count)
    }

    /// Acknowledge a pending alarm event. Meant to be called from the
    /// counter's interrupt handler.
    pub fn take_alarm_event(&mut self) -> bool {
        self.counter.take_alarm_event()
    }

    #[cfg(test)]
    pub(crate) fn counter_mut(&mut self) -> &mut C {
        &mut self.counter
    }

    fn transition(&mut self, from: &[TimerState], to: TimerState) -> Result<()> {
        if !from.contains(&self.state) {
            warn!("gptimer: {:?} -> {:?} not allowed", self.state, to);
            return Err(Error::InvalidState);
        }
        trace!("gptimer: {:?} -> {:?}", self.state, to);
        self.state = to;
        Ok(())
    }
}

/// Convert a tick count to seconds at the given resolution.
pub fn ticks_to_secs(ticks: u64, resolution_hz: u32) -> f64 {
    ticks as f64 / resolution_hz as f64
}
