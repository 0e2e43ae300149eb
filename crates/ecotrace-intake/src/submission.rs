//! Transport submission

use ecotrace_core::models::{ResolvedBatch, TransportDraft, TransportRecord};
use ecotrace_core::{build_transport_request, SubmitError, TraceabilityApi};

/// Validate `draft` against `batch` and record the transport leg.
///
/// Nothing is sent when client-side validation fails.
#[tracing::instrument(skip(api, batch, draft), fields(batch_id = batch.batch_id, origin = %draft.selected_origin))]
pub async fn submit_transport(
    api: &dyn TraceabilityApi,
    batch: &ResolvedBatch,
    draft: &TransportDraft,
) -> Result<TransportRecord, SubmitError> {
    let request = build_transport_request(batch, draft)?;
    let record = api.create_transport(&request).await?;
    tracing::info!(
        transport_id = record.id,
        distance_km = record.distance_km,
        "Transport recorded"
    );
    Ok(record)
}
