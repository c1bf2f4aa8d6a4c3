use chrono::{DateTime, Utc};

/// Injectable time source. The DCA strategy and the safety coordinator's
/// timers (circuit reset, bucket refill, daily-loss midnight boundary) read
/// time only through this trait so tests can control it instead of sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    pub struct FixedClock(AtomicI64);

    impl FixedClock {
        pub fn new(initial: DateTime<Utc>) -> Self {
            Self(AtomicI64::new(initial.timestamp_millis()))
        }

        pub fn set(&self, ts: DateTime<Utc>) {
            self.0.store(ts.timestamp_millis(), Ordering::SeqCst);
        }

        pub fn advance(&self, delta: chrono::Duration) {
            self.0.fetch_add(delta.num_milliseconds(), Ordering::SeqCst);
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            DateTime::from_timestamp_millis(self.0.load(Ordering::SeqCst)).unwrap()
        }
    }
}
