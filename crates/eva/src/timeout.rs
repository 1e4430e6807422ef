use std::future::Future;
use std::time::Duration;

use crate::errors::{AgentError, AgentResult};

/// Await `future`, failing with [`AgentError::Timeout`] once `limit` elapses.
/// Without a limit the future is awaited to completion.
pub async fn with_deadline<F, T>(limit: Option<Duration>, what: &str, future: F) -> AgentResult<T>
where
    F: Future<Output = AgentResult<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, future)
            .await
            .map_err(|_| AgentError::Timeout(limit.as_millis(), what.to_string()))?,
        None => future.await,
    }
}
