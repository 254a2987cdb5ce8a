//! Clock with optional virtual time
//!
//! The engine takes every timestamp from a `Clock` so tests can drive
//! timeout expiry by moving time forward instead of sleeping. Real time is
//! used until `set` or `forward` switches the clock to virtual time.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default)]
pub struct Clock {
    virtual_time: Arc<RwLock<Option<DateTime<Utc>>>>,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current time, virtual if one has been set
    pub async fn now(&self) -> DateTime<Utc> {
        let time = self.virtual_time.read().await;
        time.unwrap_or_else(Utc::now)
    }

    /// Whether the clock is running on virtual time
    pub async fn is_virtual(&self) -> bool {
        self.virtual_time.read().await.is_some()
    }

    /// Pin the clock to a specific time
    pub async fn set(&self, time: DateTime<Utc>) {
        let mut slot = self.virtual_time.write().await;
        *slot = Some(time);
    }

    /// Advance the clock by a duration, pinning it if it was real
    pub async fn forward(&self, duration: Duration) {
        let mut slot = self.virtual_time.write().await;
        let current = slot.unwrap_or_else(Utc::now);
        *slot = Some(current + duration);
    }

    /// Return to real time
    pub async fn reset(&self) {
        let mut slot = self.virtual_time.write().await;
        *slot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_real_time_by_default() {
        let clock = Clock::new();
        assert!(!clock.is_virtual().await);

        let before = Utc::now();
        let now = clock.now().await;
        assert!(now >= before);
    }

    #[tokio::test]
    async fn test_set_and_forward() {
        let clock = Clock::new();
        let start = "2024-01-15T10:00:00Z".parse::<DateTime<Utc>>().unwrap();

        clock.set(start).await;
        assert!(clock.is_virtual().await);
        assert_eq!(clock.now().await, start);

        clock.forward(Duration::hours(3)).await;
        assert_eq!(clock.now().await, start + Duration::hours(3));

        clock.reset().await;
        assert!(!clock.is_virtual().await);
    }

    #[test]
    fn test_clones_share_time() {
        tokio_test::block_on(async {
            let clock = Clock::new();
            let other = clock.clone();
            let start = "2024-06-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();

            clock.set(start).await;
            assert_eq!(other.now().await, start);
        });
    }
}
