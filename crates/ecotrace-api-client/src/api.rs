//! EcoTrace endpoints.

use async_trait::async_trait;
use ecotrace_core::models::{
    AuthResponse, BatchOrigins, CreateTransportRequest, LoginRequest, PublicBatchView,
    RegisterRequest, TransportPage, TransportQuery, TransportRecord, TransportStats,
};
use ecotrace_core::{ApiError, TraceabilityApi};

use crate::ApiClient;

impl ApiClient {
    #[tracing::instrument(skip(self, request), fields(email = %request.email))]
    pub async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError> {
        self.post_json("/auth/login", request).await
    }

    #[tracing::instrument(skip(self, request), fields(email = %request.email, role = %request.role))]
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        self.post_json("/auth/register", request).await
    }

    /// Origins a transport leg for `batch_id` may start from.
    #[tracing::instrument(skip(self))]
    pub async fn available_origins(&self, batch_id: i64) -> Result<BatchOrigins, ApiError> {
        self.get(
            &format!("/api/transports/batch/{}/available-origins", batch_id),
            &[],
        )
        .await
    }

    #[tracing::instrument(skip(self, request), fields(batch_id = request.batch_id))]
    pub async fn create_transport(
        &self,
        request: &CreateTransportRequest,
    ) -> Result<TransportRecord, ApiError> {
        self.post_json("/api/transports", request).await
    }

    /// Transports logged by the signed-in transporter.
    #[tracing::instrument(skip(self))]
    pub async fn my_transports(&self, query: &TransportQuery) -> Result<TransportPage, ApiError> {
        self.get("/api/transports/my", &query.to_query_pairs()).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn transport(&self, transport_id: i64) -> Result<TransportRecord, ApiError> {
        self.get(&format!("/api/transports/{}", transport_id), &[])
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn transport_stats(&self) -> Result<TransportStats, ApiError> {
        self.get("/api/transports/my/stats", &[]).await
    }

    /// Public trust summary for a batch. Needs no auth.
    #[tracing::instrument(skip(self))]
    pub async fn public_batch(&self, batch_id: i64) -> Result<PublicBatchView, ApiError> {
        self.get(&format!("/api/batch/{}", batch_id), &[]).await
    }
}

#[async_trait]
impl TraceabilityApi for ApiClient {
    async fn available_origins(&self, batch_id: i64) -> Result<BatchOrigins, ApiError> {
        ApiClient::available_origins(self, batch_id).await
    }

    async fn create_transport(
        &self,
        request: &CreateTransportRequest,
    ) -> Result<TransportRecord, ApiError> {
        ApiClient::create_transport(self, request).await
    }
}
