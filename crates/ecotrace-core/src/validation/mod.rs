//! Client-side transport validation
//!
//! These checks only catch obviously incomplete drafts before a request is
//! sent. The API remains the authority on what a valid transport is.

use validator::Validate;

use crate::error::SubmitError;
use crate::models::{CreateTransportRequest, DraftField, ResolvedBatch, TransportDraft};

/// Fields the form marks as required.
pub const REQUIRED_FIELDS: [DraftField; 5] = DraftField::ALL;

/// Parse a user-entered distance. Accepts surrounding whitespace and a
/// decimal comma; rejects negatives, NaN and infinities.
pub fn parse_distance_km(raw: &str) -> Result<f64, SubmitError> {
    let normalized = raw.trim().replace(',', ".");
    let value: f64 = normalized
        .parse()
        .map_err(|_| SubmitError::InvalidDistance(raw.to_string()))?;
    if !value.is_finite() || value < 0.0 {
        return Err(SubmitError::InvalidDistance(raw.to_string()));
    }
    Ok(value)
}

/// Check `draft` against `batch` and build the creation payload.
pub fn build_transport_request(
    batch: &ResolvedBatch,
    draft: &TransportDraft,
) -> Result<CreateTransportRequest, SubmitError> {
    if batch.available_origins.is_empty() || draft.selected_origin.is_empty() {
        return Err(SubmitError::NoOriginSelected);
    }
    if !batch.has_origin(&draft.selected_origin) {
        return Err(SubmitError::UnknownOrigin(draft.selected_origin.clone()));
    }

    for field in REQUIRED_FIELDS {
        if draft.get(field).trim().is_empty() {
            return Err(SubmitError::MissingField(field.label()));
        }
    }

    let request = CreateTransportRequest {
        batch_id: batch.batch_id,
        origin: draft.selected_origin.clone(),
        destination: draft.destination.trim().to_string(),
        distance_km: parse_distance_km(&draft.distance_km)?,
        fuel_type: draft.fuel_type.trim().to_string(),
        vehicle_type: draft.vehicle_type.trim().to_string(),
        notes: draft.notes.trim().to_string(),
    };
    request.validate()?;
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch() -> ResolvedBatch {
        ResolvedBatch {
            batch_id: 17,
            manufactured_at: None,
            available_origins: vec!["Warehouse A".to_string(), "Warehouse B".to_string()],
        }
    }

    fn complete_draft() -> TransportDraft {
        TransportDraft {
            destination: " Store 4 ".to_string(),
            distance_km: "120.5".to_string(),
            fuel_type: "diesel".to_string(),
            vehicle_type: "truck".to_string(),
            notes: "chilled".to_string(),
            selected_origin: "Warehouse B".to_string(),
        }
    }

    #[test]
    fn builds_request_from_complete_draft() {
        let request = build_transport_request(&batch(), &complete_draft()).unwrap();
        assert_eq!(request.batch_id, 17);
        assert_eq!(request.origin, "Warehouse B");
        assert_eq!(request.destination, "Store 4");
        assert_eq!(request.distance_km, 120.5);
    }

    #[test]
    fn missing_field_is_reported() {
        let mut draft = complete_draft();
        draft.vehicle_type = "   ".to_string();
        assert_eq!(
            build_transport_request(&batch(), &draft),
            Err(SubmitError::MissingField("Vehicle Type"))
        );
    }

    #[test]
    fn distance_must_be_non_negative_number() {
        for bad in ["-1", "abc", "NaN", "inf", ""] {
            assert!(parse_distance_km(bad).is_err(), "input: {bad:?}");
        }
        assert_eq!(parse_distance_km("0").unwrap(), 0.0);
        assert_eq!(parse_distance_km(" 12,5 ").unwrap(), 12.5);

        let mut draft = complete_draft();
        draft.distance_km = "-3".to_string();
        assert_eq!(
            build_transport_request(&batch(), &draft),
            Err(SubmitError::InvalidDistance("-3".to_string()))
        );
    }

    #[test]
    fn origin_must_belong_to_batch() {
        let mut draft = complete_draft();
        draft.selected_origin = "Somewhere".to_string();
        assert_eq!(
            build_transport_request(&batch(), &draft),
            Err(SubmitError::UnknownOrigin("Somewhere".to_string()))
        );
    }

    #[test]
    fn empty_origin_list_refuses_submission() {
        let empty = ResolvedBatch {
            available_origins: vec![],
            ..batch()
        };
        let mut draft = complete_draft();
        draft.selected_origin = String::new();
        assert_eq!(
            build_transport_request(&empty, &draft),
            Err(SubmitError::NoOriginSelected)
        );
    }
}
