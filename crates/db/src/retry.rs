use std::{future::Future, time::Duration};

use sea_orm::DbErr;

const MAX_RETRIES: usize = 3;
const INITIAL_BACKOFF_MS: u64 = 50;
const MAX_BACKOFF_MS: u64 = 1_000;

/// Errors that can tell whether they were caused by a locked SQLite database.
pub trait BusyError {
    fn is_sqlite_busy(&self) -> bool;
}

impl BusyError for DbErr {
    fn is_sqlite_busy(&self) -> bool {
        let message = self.to_string();
        message.contains("database is locked") || message.contains("database is busy")
    }
}

/// Re-runs `op` with exponential backoff while it fails with a busy/locked error.
/// `op` must be safe to repeat, which holds for whole transactions that rolled back.
pub async fn retry_on_sqlite_busy<T, E, F, Fut>(mut op: F) -> Result<T, E>
where
    E: BusyError,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut backoff = Duration::from_millis(INITIAL_BACKOFF_MS);
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_sqlite_busy() && attempt < MAX_RETRIES => {
                attempt += 1;
                tracing::debug!(
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "SQLite busy; retrying"
                );
                tokio::time::sleep(backoff).await;
                let next_ms = (backoff.as_millis() as u64)
                    .saturating_mul(2)
                    .min(MAX_BACKOFF_MS);
                backoff = Duration::from_millis(next_ms);
            }
            Err(err) => return Err(err),
        }
    }
}
