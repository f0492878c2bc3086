use std::time::{Duration, Instant};

/// Gate for progress writes: opens when the value moved by at least
/// `min_delta` since the last recorded write, or when `min_interval` has
/// elapsed since it. The first write always passes.
#[derive(Debug, Clone)]
pub struct WriteThrottle {
    min_delta: u8,
    min_interval: Duration,
    last_value: Option<u8>,
    last_write: Option<Instant>,
}

impl WriteThrottle {
    pub fn new(min_delta: u8, min_interval: Duration) -> Self {
        Self {
            min_delta,
            min_interval,
            last_value: None,
            last_write: None,
        }
    }

    /// Throttle that treats `value` as already persisted at `at`.
    pub fn primed(min_delta: u8, min_interval: Duration, value: u8, at: Instant) -> Self {
        let mut throttle = Self::new(min_delta, min_interval);
        throttle.record(value, at);
        throttle
    }

    pub fn should_write(&self, value: u8, now: Instant) -> bool {
        match (self.last_value, self.last_write) {
            (Some(last), Some(at)) => {
                value.abs_diff(last) >= self.min_delta || now.duration_since(at) >= self.min_interval
            }
            _ => true,
        }
    }

    pub fn record(&mut self, value: u8, at: Instant) {
        self.last_value = Some(value);
        self.last_write = Some(at);
    }
}
