use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::models::{Attachment, Photo};

/// Calendar-date format used on the wire.
const CALENDAR_DATE_FORMAT: &str = "%Y-%m-%d";

/// Formats a date the way the backend expects it (`YYYY-MM-DD`).
#[must_use]
pub fn format_calendar_date(date: NaiveDate) -> String {
    date.format(CALENDAR_DATE_FORMAT).to_string()
}

/// Acceptance outcome assigned to a vehicle on arrival.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleStatus {
    Accepted,
    Damaged,
}

impl VehicleStatus {
    pub fn to_str(self) -> &'static str {
        match self {
            VehicleStatus::Accepted => "accepted",
            VehicleStatus::Damaged => "damaged",
        }
    }
}

/// Entry of the backend's vehicle-type enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleType {
    pub id: i64,
    #[serde(rename = "v_type")]
    pub label: String,
}

/// A stored vehicle record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: i64,
    #[serde(default)]
    pub client: Option<i64>,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub year_brand_model: String,
    #[serde(default)]
    pub v_type: Option<i64>,
    #[serde(default)]
    pub v_type_name: Option<String>,
    pub vin: String,
    #[serde(default, deserialize_with = "decimal_string")]
    pub price: Option<String>,
    #[serde(default)]
    pub container_number: Option<String>,
    #[serde(default, deserialize_with = "calendar_date")]
    pub arrival_date: Option<NaiveDate>,
    #[serde(default)]
    pub transporter: Option<String>,
    #[serde(default)]
    pub recipient: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub status: Option<VehicleStatus>,
    #[serde(default)]
    pub status_changed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub creation_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub document_photos: Vec<Photo>,
}

/// # New vehicle payload
///
/// Backend shape of one record of a batch create. Empty optionals are omitted from both the JSON
/// and the multipart encodings; photographs only travel in multipart requests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleRequest {
    pub client: i64,
    pub year_brand_model: String,
    pub vin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v_type: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_number: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_calendar_date"
    )]
    pub arrival_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transporter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<VehicleStatus>,
    #[serde(skip)]
    pub document_photos: Vec<Attachment>,
}

impl VehicleRequest {
    #[must_use]
    pub fn has_attachments(&self) -> bool {
        !self.document_photos.is_empty()
    }

    /// Scalar fields as `(name, value)` pairs for a multipart body.
    #[must_use]
    pub fn text_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("client", self.client.to_string()),
            ("year_brand_model", self.year_brand_model.clone()),
            ("vin", self.vin.clone()),
        ];
        if let Some(v_type) = self.v_type {
            fields.push(("v_type", v_type.to_string()));
        }
        if let Some(price) = self.price {
            fields.push(("price", price.to_string()));
        }
        push_text(&mut fields, "container_number", self.container_number.as_ref());
        if let Some(date) = self.arrival_date {
            fields.push(("arrival_date", format_calendar_date(date)));
        }
        push_text(&mut fields, "transporter", self.transporter.as_ref());
        push_text(&mut fields, "recipient", self.recipient.as_ref());
        push_text(&mut fields, "comment", self.comment.as_ref());
        if let Some(status) = self.status {
            fields.push(("status", status.to_str().to_string()));
        }
        fields
    }
}

/// # Partial vehicle update
///
/// Only populated fields are sent. Nullable fields use `Option<Option<T>>`: `Some(None)` clears
/// the stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VehicleUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_brand_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v_type: Option<Option<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_number: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_nullable_calendar_date"
    )]
    pub arrival_date: Option<Option<NaiveDate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transporter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<VehicleStatus>,
    #[serde(skip)]
    pub document_photos: Vec<Attachment>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remove_document_photo_ids: Vec<i64>,
}

impl VehicleUpdate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.year_brand_model.is_none()
            && self.vin.is_none()
            && self.v_type.is_none()
            && self.price.is_none()
            && self.container_number.is_none()
            && self.arrival_date.is_none()
            && self.transporter.is_none()
            && self.recipient.is_none()
            && self.comment.is_none()
            && self.status.is_none()
            && self.document_photos.is_empty()
            && self.remove_document_photo_ids.is_empty()
    }

    /// Photo additions and deletions can only be expressed in a multipart body.
    #[must_use]
    pub fn requires_multipart(&self) -> bool {
        !self.document_photos.is_empty() || !self.remove_document_photo_ids.is_empty()
    }

    /// Scalar fields as `(name, value)` pairs for a multipart body. Cleared values are sent as
    /// empty strings.
    #[must_use]
    pub fn text_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = Vec::new();
        push_text(&mut fields, "year_brand_model", self.year_brand_model.as_ref());
        push_text(&mut fields, "vin", self.vin.as_ref());
        if let Some(v_type) = self.v_type {
            fields.push(("v_type", v_type.map(|t| t.to_string()).unwrap_or_default()));
        }
        if let Some(price) = self.price {
            fields.push(("price", price.map(|p| p.to_string()).unwrap_or_default()));
        }
        if let Some(container) = &self.container_number {
            fields.push(("container_number", container.clone()));
        }
        if let Some(date) = self.arrival_date {
            fields.push(("arrival_date", date.map(format_calendar_date).unwrap_or_default()));
        }
        if let Some(transporter) = &self.transporter {
            fields.push(("transporter", transporter.clone()));
        }
        if let Some(recipient) = &self.recipient {
            fields.push(("recipient", recipient.clone()));
        }
        if let Some(comment) = &self.comment {
            fields.push(("comment", comment.clone()));
        }
        if let Some(status) = self.status {
            fields.push(("status", status.to_str().to_string()));
        }
        for id in &self.remove_document_photo_ids {
            fields.push(("remove_document_photo_ids", id.to_string()));
        }
        fields
    }
}

fn push_text(fields: &mut Vec<(&'static str, String)>, name: &'static str, value: Option<&String>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        fields.push((name, value.clone()));
    }
}

#[allow(clippy::ref_option)]
fn serialize_calendar_date<S>(date: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match date {
        Some(date) => serializer.serialize_str(&format_calendar_date(*date)),
        None => serializer.serialize_none(),
    }
}

#[allow(clippy::ref_option)]
fn serialize_nullable_calendar_date<S>(
    date: &Option<Option<NaiveDate>>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serialize_calendar_date(&date.flatten(), serializer)
}

fn calendar_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, CALENDAR_DATE_FORMAT)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Accepts decimals encoded either as JSON strings or as JSON numbers.
fn decimal_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        match Option::<serde_json::Value>::deserialize(deserializer)? {
            Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> VehicleRequest {
        VehicleRequest {
            client: 3,
            year_brand_model: "2025 BMW X7".to_string(),
            vin: "WBA00000000000001".to_string(),
            v_type: Some(2),
            price: Some(45_000.5),
            container_number: Some(String::new()),
            arrival_date: NaiveDate::from_ymd_opt(2025, 3, 9),
            transporter: None,
            recipient: Some("Ivanov".to_string()),
            comment: None,
            status: None,
            document_photos: vec![Attachment::new("a.jpg", "image/jpeg", vec![1])],
        }
    }

    #[test]
    fn test_request_json_omits_empty_optionals() {
        let mut req = request();
        req.container_number = None;
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "client": 3,
                "year_brand_model": "2025 BMW X7",
                "vin": "WBA00000000000001",
                "v_type": 2,
                "price": 45000.5,
                "arrival_date": "2025-03-09",
                "recipient": "Ivanov",
            })
        );
    }

    #[test]
    fn test_request_text_fields_skip_blank_strings() {
        let fields = request().text_fields();
        let names: Vec<_> = fields.iter().map(|(n, _)| *n).collect();
        assert_eq!(
            names,
            ["client", "year_brand_model", "vin", "v_type", "price", "arrival_date", "recipient"]
        );
        assert!(fields.contains(&("arrival_date", "2025-03-09".to_string())));
    }

    #[test]
    fn test_update_clears_nullable_fields() {
        let update = VehicleUpdate {
            price: Some(None),
            arrival_date: Some(None),
            comment: Some("scratched door".to_string()),
            ..VehicleUpdate::new()
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "price": null,
                "arrival_date": null,
                "comment": "scratched door",
            })
        );
        assert!(!update.requires_multipart());
    }

    #[test]
    fn test_update_with_removed_photos_needs_multipart() {
        let update = VehicleUpdate {
            remove_document_photo_ids: vec![11, 12],
            ..VehicleUpdate::new()
        };
        assert!(!update.is_empty());
        assert!(update.requires_multipart());
        assert_eq!(
            update.text_fields(),
            vec![
                ("remove_document_photo_ids", "11".to_string()),
                ("remove_document_photo_ids", "12".to_string()),
            ]
        );
    }

    #[test]
    fn test_vehicle_deserializes_backend_record() {
        let vehicle: Vehicle = serde_json::from_value(serde_json::json!({
            "id": 14,
            "client_name": "ООО Гараж",
            "year_brand_model": "2021 Toyota Camry",
            "v_type_name": "Sedan",
            "vin": "JT000000000000001",
            "price": "1200.00",
            "container_number": "MSCU1234567",
            "arrival_date": "2025-01-31",
            "transporter": "Sea Line",
            "recipient": "Petrov",
            "comment": null,
            "status": "damaged",
            "document_photos": [{"id": 1, "image": "/media/1.jpg"}],
        }))
        .unwrap();
        assert_eq!(vehicle.price.as_deref(), Some("1200.00"));
        assert_eq!(vehicle.arrival_date, NaiveDate::from_ymd_opt(2025, 1, 31));
        assert_eq!(vehicle.status, Some(VehicleStatus::Damaged));
        assert_eq!(vehicle.document_photos.len(), 1);
    }
}
