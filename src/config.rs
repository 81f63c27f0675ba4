//! Fixed settings of the two demo programs.

use embassy_time::Duration;

/// Counter resolution shared by both programs: 1 tick = 1 µs.
pub const TIMER_RESOLUTION_HZ: u32 = 1_000_000;

/// Alarm period of `alarm_period`, in ticks (2 s).
pub const ALARM_PERIOD_TICKS: u64 = 2_000_000;

/// Depth of the alarm state queue.
pub const ALARM_QUEUE_DEPTH: usize = 3;

/// Minimum ticks between two accepted presses in `button_check` (10 ms).
pub const DEBOUNCE_TICKS: u64 = 10_000;

/// Presses `button_check` waits for before tearing the timer down.
pub const PRESS_TARGET: u32 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AlarmPeriodConfig {
    pub resolution_hz: u32,
    pub period_ticks: u64,
    /// How long the buzzer task waits for a state update before it loops.
    pub receive_timeout: Duration,
}

impl AlarmPeriodConfig {
    pub const DEFAULT: Self = Self {
        resolution_hz: TIMER_RESOLUTION_HZ,
        period_ticks: ALARM_PERIOD_TICKS,
        receive_timeout: Duration::from_millis(2000),
    };
}

impl Default for AlarmPeriodConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ButtonCheckConfig {
    pub resolution_hz: u32,
    pub debounce_ticks: u64,
    pub press_target: u32,
    pub poll_interval: Duration,
}

impl ButtonCheckConfig {
    pub const DEFAULT: Self = Self {
        resolution_hz: TIMER_RESOLUTION_HZ,
        debounce_ticks: DEBOUNCE_TICKS,
        press_target: PRESS_TARGET,
        poll_interval: Duration::from_millis(100),
    };
}

impl Default for ButtonCheckConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
