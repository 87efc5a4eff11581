/*
 * Responsibility
 * - What a store reports upward
 * - Bounding every store call with a deadline (elapsed = failure)
 */
use std::future::Future;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("db error")]
    Db(#[from] sqlx::Error),
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Run a store call under `limit`. The inner future is dropped on expiry.
pub async fn bounded<T, F>(limit: Duration, fut: F) -> RepoResult<T>
where
    F: Future<Output = RepoResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res,
        Err(_) => Err(RepoError::Timeout(limit)),
    }
}
