use std::time::{Duration, Instant};

/// Suppresses a payload identical to the last emitted one while inside the
/// cooldown window. Suppressed repeats do not extend the window.
#[derive(Debug)]
pub struct ScanDebouncer {
    cooldown: Duration,
    last: Option<(String, Instant)>,
}

impl ScanDebouncer {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last: None,
        }
    }

    /// Returns true when `payload` should be emitted, recording it as the
    /// new last-seen payload
    pub fn accept(&mut self, payload: &str, now: Instant) -> bool {
        if let Some((last_payload, last_at)) = &self.last {
            if last_payload == payload && now.saturating_duration_since(*last_at) < self.cooldown {
                return false;
            }
        }
        self.last = Some((payload.to_string(), now));
        true
    }

    pub fn last_payload(&self) -> Option<&str> {
        self.last.as_ref().map(|(p, _)| p.as_str())
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
