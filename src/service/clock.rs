use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::model::BatchId;

/// Time source for timestamps written by the service
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

/// Manually driven clock for tests and replays
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        let mut guard = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// One async mutex per batch id; serializes mutating calls on the same batch
#[derive(Debug, Default)]
pub(crate) struct BatchLocks {
    locks: AsyncMutex<HashMap<BatchId, Arc<AsyncMutex<()>>>>,
}

impl BatchLocks {
    pub(crate) async fn acquire(&self, batch_id: BatchId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // entries nobody else holds are dropped as we go
            locks.retain(|id, lock| *id == batch_id || Arc::strong_count(lock) > 1);
            locks.entry(batch_id).or_default().clone()
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration as StdDuration;

    #[test]
    fn test_fixed_clock_advances() {
        let start = Utc.with_ymd_and_hms(2024, 10, 1, 8, 0, 0).unwrap();
        let clock = FixedClock::new(start);
        clock.advance(Duration::days(3));
        assert_eq!(clock.now(), start + Duration::days(3));
    }

    #[tokio::test]
    async fn test_batch_lock_is_exclusive_per_batch() {
        let locks = Arc::new(BatchLocks::default());
        let batch = BatchId::new();

        let guard = locks.acquire(batch).await;
        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(batch).await;
            })
        };
        tokio::time::sleep(StdDuration::from_millis(20)).await;
        assert!(!contender.is_finished());

        // a different batch is not blocked
        let _other = locks.acquire(BatchId::new()).await;

        drop(guard);
        contender.await.unwrap();
    }
}
