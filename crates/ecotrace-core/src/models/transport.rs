use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::timestamp;

/// Editable fields of the transport form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    Destination,
    DistanceKm,
    FuelType,
    VehicleType,
    Notes,
}

impl DraftField {
    pub const ALL: [DraftField; 5] = [
        DraftField::Destination,
        DraftField::DistanceKm,
        DraftField::FuelType,
        DraftField::VehicleType,
        DraftField::Notes,
    ];

    /// Form label, also used in validation messages.
    pub fn label(&self) -> &'static str {
        match self {
            DraftField::Destination => "Destination",
            DraftField::DistanceKm => "Distance (km)",
            DraftField::FuelType => "Fuel Type",
            DraftField::VehicleType => "Vehicle Type",
            DraftField::Notes => "Notes",
        }
    }
}

impl fmt::Display for DraftField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DraftField {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "destination" => Ok(DraftField::Destination),
            "distance_km" | "distance" => Ok(DraftField::DistanceKm),
            "fuel_type" | "fuel" => Ok(DraftField::FuelType),
            "vehicle_type" | "vehicle" => Ok(DraftField::VehicleType),
            "notes" => Ok(DraftField::Notes),
            other => Err(anyhow::anyhow!("Unknown transport field '{}'", other)),
        }
    }
}

/// User-entered shipment fields, kept as typed text until submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransportDraft {
    pub destination: String,
    pub distance_km: String,
    pub fuel_type: String,
    pub vehicle_type: String,
    pub notes: String,
    pub selected_origin: String,
}

impl TransportDraft {
    /// Fresh draft for a newly resolved batch.
    pub fn with_origin(origin: impl Into<String>) -> Self {
        Self {
            selected_origin: origin.into(),
            ..Self::default()
        }
    }

    pub fn set(&mut self, field: DraftField, value: impl Into<String>) {
        let value = value.into();
        match field {
            DraftField::Destination => self.destination = value,
            DraftField::DistanceKm => self.distance_km = value,
            DraftField::FuelType => self.fuel_type = value,
            DraftField::VehicleType => self.vehicle_type = value,
            DraftField::Notes => self.notes = value,
        }
    }

    pub fn get(&self, field: DraftField) -> &str {
        match field {
            DraftField::Destination => &self.destination,
            DraftField::DistanceKm => &self.distance_km,
            DraftField::FuelType => &self.fuel_type,
            DraftField::VehicleType => &self.vehicle_type,
            DraftField::Notes => &self.notes,
        }
    }
}

/// Body of `POST /api/transports`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CreateTransportRequest {
    #[validate(range(min = 1))]
    pub batch_id: i64,
    #[validate(length(min = 1, max = 255))]
    pub origin: String,
    #[validate(length(min = 1, max = 255))]
    pub destination: String,
    #[validate(range(min = 0.0))]
    pub distance_km: f64,
    #[validate(length(min = 1, max = 100))]
    pub fuel_type: String,
    #[validate(length(min = 1, max = 100))]
    pub vehicle_type: String,
    #[validate(length(max = 2000))]
    pub notes: String,
}

/// A stored transport leg as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportRecord {
    pub id: i64,
    pub batch_id: i64,
    pub origin: String,
    pub destination: String,
    pub distance_km: f64,
    #[serde(default)]
    pub fuel_type: Option<String>,
    #[serde(default)]
    pub vehicle_type: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub transport_emission: Option<f64>,
    #[serde(default)]
    pub transporter_id: Option<i64>,
    #[serde(default, deserialize_with = "timestamp::deserialize_optional")]
    pub created_at: Option<DateTime<Utc>>,
}

/// One page of `GET /api/transports/my`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportPage {
    #[serde(default)]
    pub items: Vec<TransportRecord>,
    #[serde(default)]
    pub total: u64,
}

/// Aggregates served by `GET /api/transports/my/stats`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportStats {
    pub total_transports: u64,
    pub total_distance: f64,
    pub total_emission: f64,
    pub avg_emission_per_km: f64,
}

/// List query in page terms; the API speaks `skip`/`limit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportQuery {
    pub page: u32,
    pub limit: u32,
    pub search: Option<String>,
}

impl Default for TransportQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            search: None,
        }
    }
}

impl TransportQuery {
    pub fn skip(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.limit)
    }

    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("skip", self.skip().to_string()),
            ("limit", self.limit.to_string()),
        ];
        if let Some(search) = self.search.as_deref().map(str::trim) {
            if !search.is_empty() {
                pairs.push(("search", search.to_string()));
            }
        }
        pairs
    }
}
