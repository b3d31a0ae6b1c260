use std::time::{Duration, Instant};

/// Sampling interval the firmware uses.
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(500);

/// Non-blocking interval gate.
///
/// The first call to [`ready`](Self::ready) fires immediately; after that it
/// fires once per elapsed interval. Missed intervals are not replayed.
#[derive(Debug, Clone)]
pub struct SampleTimer {
    interval: Duration,
    last: Option<Instant>,
}

impl SampleTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Returns `true` (and re-arms) if a sample is due at `now`.
    pub fn ready(&mut self, now: Instant) -> bool {
        let due = match self.last {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };
        if due {
            self.last = Some(now);
        }
        due
    }

    /// Time left until the next sample is due.
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.last {
            None => Duration::ZERO,
            Some(last) => self
                .interval
                .saturating_sub(now.saturating_duration_since(last)),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for SampleTimer {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_INTERVAL)
    }
}
