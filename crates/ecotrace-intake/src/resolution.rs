//! Batch resolution

use ecotrace_core::models::ResolvedBatch;
use ecotrace_core::{ResolveError, TraceabilityApi};

/// Fetch the origins and manufacturing time for `batch_id`.
///
/// Origin order is kept exactly as the server returned it.
#[tracing::instrument(skip(api))]
pub async fn resolve_batch(
    api: &dyn TraceabilityApi,
    batch_id: i64,
) -> Result<ResolvedBatch, ResolveError> {
    let origins = api.available_origins(batch_id).await?;
    let batch = ResolvedBatch::new(batch_id, origins);
    tracing::info!(
        batch_id,
        origins = batch.available_origins.len(),
        manufactured_at = ?batch.manufactured_at,
        "Batch resolved"
    );
    Ok(batch)
}
