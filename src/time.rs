use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Source of time for the engine.
///
/// The engine never reads the system clock directly so that deadline and
/// timer behavior can be driven deterministically.
pub trait Clock {
    /// Monotonic seconds since an arbitrary origin.
    fn now(&self) -> f64;

    /// Seconds since the UNIX epoch, used for message timestamps.
    fn epoch(&self) -> f64 {
        self.now()
    }
}

/// Clock backed by the operating system.
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }

    fn epoch(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl<C: Clock + ?Sized> Clock for std::rc::Rc<C> {
    fn now(&self) -> f64 {
        (**self).now()
    }

    fn epoch(&self) -> f64 {
        (**self).epoch()
    }
}

/// Periodic deadline counter.
pub struct Counter {
    top: f64,
    deadline: f64,
}

impl Counter {
    pub fn new(top: f64, now: f64) -> Self {
        Self {
            top,
            deadline: now + top,
        }
    }

    /// Whether the period elapsed.
    pub fn overflow(&self, now: f64) -> bool {
        now >= self.deadline
    }

    /// Start a new period.
    pub fn reset(&mut self, now: f64) {
        self.deadline = now + self.top;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_overflows_after_period() {
        let mut counter = Counter::new(0.5, 10.0);

        assert!(!counter.overflow(10.0));
        assert!(!counter.overflow(10.4));
        assert!(counter.overflow(10.5));

        counter.reset(10.5);
        assert!(!counter.overflow(10.9));
        assert!(counter.overflow(11.0));
    }
}
