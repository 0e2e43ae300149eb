use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timestamp;

/// Response of `GET /api/transports/batch/{id}/available-origins`.
///
/// Origin order is defined by the server and preserved as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOrigins {
    #[serde(default)]
    pub origins: Vec<String>,
    #[serde(default, deserialize_with = "timestamp::deserialize_optional")]
    pub manufactured_at: Option<DateTime<Utc>>,
}

/// Batch context needed to log a transport leg.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedBatch {
    pub batch_id: i64,
    pub manufactured_at: Option<DateTime<Utc>>,
    pub available_origins: Vec<String>,
}

impl ResolvedBatch {
    pub fn new(batch_id: i64, origins: BatchOrigins) -> Self {
        Self {
            batch_id,
            manufactured_at: origins.manufactured_at,
            available_origins: origins.origins,
        }
    }

    /// First server-provided origin, or empty when there is none.
    pub fn default_origin(&self) -> String {
        self.available_origins.first().cloned().unwrap_or_default()
    }

    pub fn has_origin(&self, origin: &str) -> bool {
        self.available_origins.iter().any(|o| o == origin)
    }
}

/// Consolidated trust summary served by `GET /api/batch/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicBatchView {
    pub product: ProductSummary,
    pub batch: BatchSummary,
    #[serde(default)]
    pub transport: Vec<TransportLeg>,
    #[serde(default)]
    pub lab_reports: Vec<LabReportSummary>,
    #[serde(default)]
    pub ai_score: Option<AiScore>,
}

impl PublicBatchView {
    pub fn sustainability_score(&self) -> Option<f64> {
        self.ai_score.as_ref().and_then(|s| s.final_score)
    }

    pub fn total_transport_distance_km(&self) -> f64 {
        self.transport.iter().map(|leg| leg.distance_km).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSummary {
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub status: String,
    #[serde(default)]
    pub manufactured: Option<String>,
    #[serde(default)]
    pub expiry: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub base_carbon: Option<f64>,
    #[serde(default)]
    pub material_info: Option<String>,
}

impl BatchSummary {
    pub fn is_approved(&self) -> bool {
        self.status.eq_ignore_ascii_case("approved")
    }

    /// Comma-separated `material_info`, trimmed, empty entries dropped.
    pub fn materials(&self) -> Vec<String> {
        self.material_info
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportLeg {
    pub origin: String,
    pub destination: String,
    pub distance_km: f64,
    #[serde(default)]
    pub emission: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabReportSummary {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub eco_rating: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiScore {
    #[serde(rename = "final", default)]
    pub final_score: Option<f64>,
}
