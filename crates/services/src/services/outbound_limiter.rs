use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{AcquireError, Mutex, OwnedSemaphorePermit, Semaphore},
    time::Instant,
};

/// Bounds concurrent outbound analytics calls and spaces out their start times.
#[derive(Clone)]
pub struct OutboundLimiter {
    permits: Arc<Semaphore>,
    max_concurrency: usize,
    spacing: Duration,
    next_start: Arc<Mutex<Instant>>,
}

/// Held for the duration of one outbound call.
pub struct OutboundPermit {
    _permit: OwnedSemaphorePermit,
}

impl OutboundLimiter {
    pub fn new(max_concurrency: usize, spacing: Duration) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
            spacing,
            next_start: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub async fn acquire(&self) -> Result<OutboundPermit, AcquireError> {
        let permit = self.permits.clone().acquire_owned().await?;

        let start_at = {
            let mut next_start = self.next_start.lock().await;
            let now = Instant::now();
            let start_at = (*next_start).max(now);
            *next_start = start_at + self.spacing;
            start_at
        };
        tokio::time::sleep_until(start_at).await;

        Ok(OutboundPermit { _permit: permit })
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}
