use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::handlers::AppState;

/// Bounds the number of documents being encoded at once.
///
/// A permit stays with the encoding work, not the request, so a job whose
/// caller has already timed out keeps counting until it finishes.
#[derive(Debug)]
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    total_requests: AtomicU64,
    rejected_requests: AtomicU64,
}

impl RateLimiter {
    pub fn new(max_concurrent_requests: usize) -> Self {
        info!(
            max_concurrent_requests = max_concurrent_requests,
            "Initializing request semaphore"
        );
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent_requests)),
            total_requests: AtomicU64::new(0),
            rejected_requests: AtomicU64::new(0),
        }
    }

    /// Takes a permit for one encoding job, or fails with 429 when all are in use.
    pub fn try_acquire(&self) -> AppResult<OwnedSemaphorePermit> {
        let total_requests = self.total_requests.fetch_add(1, Ordering::Relaxed) + 1;

        match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => {
                debug!(
                    available_permits = self.semaphore.available_permits(),
                    "Request permit acquired"
                );
                Ok(permit)
            }
            Err(_) => {
                let rejected = self.rejected_requests.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    total_requests = total_requests,
                    rejected_requests = rejected,
                    "Rate limit exceeded - too many concurrent requests"
                );
                Err(AppError::RateLimitExceeded)
            }
        }
    }

    fn reject_early(&self, path: &str) -> AppError {
        let total_requests = self.total_requests.fetch_add(1, Ordering::Relaxed) + 1;
        let rejected = self.rejected_requests.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(
            path = %path,
            total_requests = total_requests,
            rejected_requests = rejected,
            "Rate limit exceeded - rejecting before reading the upload"
        );
        AppError::RateLimitExceeded
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// (total submissions, rejected submissions, free permits)
    pub fn metrics(&self) -> (u64, u64, usize) {
        (
            self.total_requests.load(Ordering::Relaxed),
            self.rejected_requests.load(Ordering::Relaxed),
            self.available_permits(),
        )
    }
}

fn is_submission(path: &str) -> bool {
    path == "/upload" || path.starts_with("/api/v1/encode")
}

/// Turns submissions away with 429 before their body is read when every
/// permit is taken. The permit itself is taken by the encoding service.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let limiter = state.service.limiter();
    if is_submission(request.uri().path()) && limiter.available_permits() == 0 {
        return Err(limiter.reject_early(request.uri().path()));
    }
    Ok(next.run(request).await)
}
