use std::str::FromStr;
use std::sync::Arc;

use storeops_core::DomainError;
use storeops_infra::WorkflowResult;

use crate::app::errors::ApiError;
use crate::app::services::AppServices;

/// Parse a path segment into a typed id; malformed ids are a 400.
pub fn parse_id<T>(raw: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse::<T>().map_err(ApiError::from)
}

/// Run a workflow on the blocking pool.
///
/// Workflows are synchronous and the postgres store bridges into the runtime
/// from inside them, so they must not run on an async worker thread.
pub async fn blocking<T, F>(services: Arc<AppServices>, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&AppServices) -> WorkflowResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&services))
        .await
        .map_err(|e| ApiError::Worker(e.to_string()))?
        .map_err(ApiError::from)
}
