//! Time source for polling loops.

use async_trait::async_trait;
use std::time::{Duration, Instant};

/// Monotonic clock plus the ability to wait on it
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> Instant;

    /// Suspend the caller for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
pub(crate) mod manual {
    use super::{async_trait, Clock, Duration, Instant};
    use std::sync::Mutex;

    /// Clock that only moves when slept on
    pub struct ManualClock {
        start: Instant,
        elapsed: Mutex<Duration>,
        sleeps: Mutex<u32>,
    }

    impl ManualClock {
        pub fn new() -> Self {
            Self {
                start: Instant::now(),
                elapsed: Mutex::new(Duration::ZERO),
                sleeps: Mutex::new(0),
            }
        }

        pub fn elapsed(&self) -> Duration {
            *self.elapsed.lock().unwrap()
        }

        pub fn sleeps(&self) -> u32 {
            *self.sleeps.lock().unwrap()
        }
    }

    #[async_trait]
    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.start + self.elapsed()
        }

        async fn sleep(&self, duration: Duration) {
            *self.elapsed.lock().unwrap() += duration;
            *self.sleeps.lock().unwrap() += 1;
        }
    }

    #[test]
    fn test_manual_clock_advances_on_sleep() {
        let clock = ManualClock::new();
        let t0 = clock.now();
        tokio_test::block_on(async {
            clock.sleep(Duration::from_secs(2)).await;
            clock.sleep(Duration::from_secs(3)).await;
        });
        assert_eq!(clock.now() - t0, Duration::from_secs(5));
        assert_eq!(clock.sleeps(), 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_sleeps_on_the_runtime_timer() {
        let t0 = tokio::time::Instant::now();
        TokioClock.sleep(Duration::from_secs(3600)).await;
        assert!(t0.elapsed() >= Duration::from_secs(3600));
    }
}
