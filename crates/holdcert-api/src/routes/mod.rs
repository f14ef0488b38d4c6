//! # API Route Modules
//!
//! - `certificates`: certificate lifecycle, generation, verification and download.
//! - `expiry`: expiry statistics, reports, manual monitor runs and renewal.
//! - `signing`: the verification key for artifact signatures.

pub mod certificates;
pub mod expiry;
pub mod signing;

use crate::error::AppError;

/// Run synchronous work (registry locks, signing, storage I/O) on the
/// blocking pool instead of an executor thread.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("blocking task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blocking_runs_off_the_calling_thread_and_keeps_errors() {
        let caller = std::thread::current().id();
        let worker = blocking(|| Ok(std::thread::current().id())).await.unwrap();
        assert_ne!(worker, caller);
        assert!(matches!(
            blocking::<(), _>(|| Err(AppError::NotFound("x".into()))).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn panicking_work_becomes_an_internal_error() {
        let result = blocking::<(), _>(|| panic!("renderer crashed")).await;
        assert!(matches!(result, Err(AppError::Internal(_))));
    }
}
