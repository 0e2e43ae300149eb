//! Service seams
//!
//! The intake workflow talks to the remote API only through
//! [`TraceabilityApi`]. The HTTP client implements it; tests substitute an
//! in-memory implementation.

use async_trait::async_trait;

use crate::error::ApiError;
use crate::models::{BatchOrigins, CreateTransportRequest, TransportRecord};

#[async_trait]
pub trait TraceabilityApi: Send + Sync {
    /// Origins a transport leg for `batch_id` may start from, plus the
    /// batch's manufacturing time.
    async fn available_origins(&self, batch_id: i64) -> Result<BatchOrigins, ApiError>;

    /// Record a transport leg.
    async fn create_transport(
        &self,
        request: &CreateTransportRequest,
    ) -> Result<TransportRecord, ApiError>;
}
