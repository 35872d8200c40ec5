//! Per-call deadlines for collaborator invocations.

use std::future::Future;
use std::time::Duration;

use asclepius_common::{AsclepiusError, Result};

/// Await `call`, failing with [`AsclepiusError::Timeout`] once `limit` elapses.
/// With no limit the call runs to completion.
pub async fn with_deadline<T, F>(collaborator: &'static str, limit: Option<Duration>, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| AsclepiusError::Timeout {
                collaborator,
                elapsed: limit,
            })?,
        None => call.await,
    }
}
