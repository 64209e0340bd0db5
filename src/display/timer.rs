use crate::config::DisplayConfig;
use std::time::Duration;
use tracing::debug;

/// Which of the two fixed countdowns is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownKind {
    /// Certificate, product or compliance result screen
    Result,
    /// Transient error screen
    Error,
}

/// Outcome of advancing the timer by one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTick {
    Inactive,
    Paused { remaining: u32 },
    Running { remaining: u32 },
    /// Fired exactly once per countdown
    Expired(CountdownKind),
}

#[derive(Debug, Clone, Copy)]
struct Countdown {
    kind: CountdownKind,
    remaining: u32,
    paused: bool,
}

/// Tick-driven countdown for result and error screens.
///
/// The owner calls [`tick`](DisplayTimer::tick) at the configured tick
/// granularity. A paused countdown keeps its remaining count until resumed,
/// however long the pause lasts.
#[derive(Debug, Clone)]
pub struct DisplayTimer {
    result_ticks: u32,
    error_ticks: u32,
    tick: Duration,
    current: Option<Countdown>,
}

impl DisplayTimer {
    pub fn new(result_ticks: u32, error_ticks: u32, tick: Duration) -> Self {
        Self {
            result_ticks: result_ticks.max(1),
            error_ticks: error_ticks.max(1),
            tick,
            current: None,
        }
    }

    pub fn from_config(config: &DisplayConfig) -> Self {
        Self::new(
            config.ticks_for_seconds(config.result_seconds),
            config.ticks_for_seconds(config.error_seconds),
            config.tick(),
        )
    }

    /// Start a countdown, replacing any countdown in progress
    pub fn start(&mut self, kind: CountdownKind) {
        let remaining = match kind {
            CountdownKind::Result => self.result_ticks,
            CountdownKind::Error => self.error_ticks,
        };
        if let Some(previous) = self.current {
            debug!(
                "Replacing {:?} countdown with {} ticks left",
                previous.kind, previous.remaining
            );
        }
        self.current = Some(Countdown {
            kind,
            remaining,
            paused: false,
        });
    }

    pub fn tick(&mut self) -> TimerTick {
        let Some(countdown) = self.current.as_mut() else {
            return TimerTick::Inactive;
        };

        if countdown.paused {
            return TimerTick::Paused {
                remaining: countdown.remaining,
            };
        }

        countdown.remaining = countdown.remaining.saturating_sub(1);
        if countdown.remaining == 0 {
            let kind = countdown.kind;
            self.current = None;
            return TimerTick::Expired(kind);
        }

        TimerTick::Running {
            remaining: countdown.remaining,
        }
    }

    /// Freeze the countdown. Returns false when there is nothing to pause.
    pub fn pause(&mut self) -> bool {
        match self.current.as_mut() {
            Some(countdown) if !countdown.paused => {
                countdown.paused = true;
                true
            }
            _ => false,
        }
    }

    pub fn resume(&mut self) -> bool {
        match self.current.as_mut() {
            Some(countdown) if countdown.paused => {
                countdown.paused = false;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.current = None;
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.current.map(|c| c.paused).unwrap_or(false)
    }

    pub fn kind(&self) -> Option<CountdownKind> {
        self.current.map(|c| c.kind)
    }

    pub fn remaining_ticks(&self) -> Option<u32> {
        self.current.map(|c| c.remaining)
    }

    /// Remaining time rounded up to whole seconds, for the status line
    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_ticks()
            .map(|ticks| self.ticks_to_seconds(ticks))
            .unwrap_or(0)
    }

    pub fn ticks_to_seconds(&self, ticks: u32) -> u32 {
        let millis = self.tick.as_millis() as u64 * ticks as u64;
        millis.div_ceil(1000) as u32
    }
}
