//! Time-bounded collaborator calls.

use std::future::Future;
use std::time::Duration;
use delegate_services::ServiceError;

/// Run `call`, failing with [`ServiceError::Timeout`] if it exceeds `limit`.
pub(crate) async fn bounded<T, F>(limit: Option<Duration>, call: F) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| ServiceError::Timeout(limit))?,
        None => call.await,
    }
}
