//! Clock / sleep collaborator seam.
//!
//! Retry backoff and the watch-interval loop both need to sleep for a
//! configurable duration. Routing that through a trait lets tests replace
//! real waiting with an instantly-resolving fake, rather than the real
//! sync engine having any notion of "are we in a test".

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Dynamic trait object used by the auth and download retry state machines.
pub type ClockHandle = std::sync::Arc<dyn Clock + Send + Sync>;

#[async_trait]
pub trait Clock: Send + Sync {
    /// Current time, used to timestamp log lines and decide EXIF dates.
    fn now(&self) -> DateTime<Utc>;

    /// Suspends the caller for `duration`. A real clock awaits
    /// `tokio::time::sleep`; a fake clock may return immediately.
    async fn sleep(&self, duration: Duration);
}

/// Production clock backed by the system clock and the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Test clock that never actually waits, and counts how many times
    /// `sleep` was called so retry-cap tests can assert on it.
    #[derive(Debug, Default)]
    pub struct FakeClock {
        sleep_calls: AtomicUsize,
    }

    impl FakeClock {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn sleep_calls(&self) -> usize {
            self.sleep_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Clock for FakeClock {
        fn now(&self) -> DateTime<Utc> {
            DateTime::<Utc>::from_timestamp(0, 0).unwrap()
        }

        async fn sleep(&self, _duration: Duration) {
            self.sleep_calls.fetch_add(1, Ordering::SeqCst);
        }
    }
}
