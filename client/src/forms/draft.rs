use chrono::NaiveDate;

use crate::{
    forms::field::{ErrorKind, FieldErrors},
    models::{Attachment, Vehicle, VehicleRequest, VehicleStatus},
};

/// Fields of a vehicle form, in the order they are laid out.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VehicleField {
    YearBrandModel,
    VType,
    Vin,
    Price,
    ContainerNumber,
    ArrivalDate,
    Transporter,
    Recipient,
    Comment,
    Status,
    DocumentPhotos,
}

impl VehicleField {
    /// Name of the field in backend payloads and error bodies.
    #[must_use]
    pub fn wire_name(self) -> &'static str {
        match self {
            VehicleField::YearBrandModel => "year_brand_model",
            VehicleField::VType => "v_type",
            VehicleField::Vin => "vin",
            VehicleField::Price => "price",
            VehicleField::ContainerNumber => "container_number",
            VehicleField::ArrivalDate => "arrival_date",
            VehicleField::Transporter => "transporter",
            VehicleField::Recipient => "recipient",
            VehicleField::Comment => "comment",
            VehicleField::Status => "status",
            VehicleField::DocumentPhotos => "uploaded_document_photos",
        }
    }

    #[must_use]
    pub fn from_wire(name: &str) -> Option<VehicleField> {
        Some(match name {
            "year_brand_model" => VehicleField::YearBrandModel,
            "v_type" => VehicleField::VType,
            "vin" => VehicleField::Vin,
            "price" => VehicleField::Price,
            "container_number" => VehicleField::ContainerNumber,
            "arrival_date" => VehicleField::ArrivalDate,
            "transporter" => VehicleField::Transporter,
            "recipient" => VehicleField::Recipient,
            "comment" => VehicleField::Comment,
            "status" => VehicleField::Status,
            "uploaded_document_photos" | "document_photos" => VehicleField::DocumentPhotos,
            _ => return None,
        })
    }
}

pub const DESCRIPTOR_REQUIRED: &str = "Enter the year, brand and model.";
pub const VIN_REQUIRED: &str = "Enter the VIN.";
pub const PRICE_INVALID: &str = "Price must be a non-negative number.";

/// # Vehicle draft
///
/// Form-side state of one vehicle. Text inputs are kept as typed; [`VehicleDraft::to_request`]
/// converts them into the backend shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VehicleDraft {
    pub year_brand_model: String,
    pub v_type: Option<i64>,
    pub vin: String,
    pub price: String,
    pub container_number: String,
    pub arrival_date: Option<NaiveDate>,
    pub transporter: String,
    pub recipient: String,
    pub comment: String,
    pub status: Option<VehicleStatus>,
    pub document_photos: Vec<Attachment>,
}

impl VehicleDraft {
    /// A new draft that carries over the shipment details of `first`: arrival date, container
    /// and transporter.
    #[must_use]
    pub fn seeded_from(first: &VehicleDraft) -> Self {
        Self {
            container_number: first.container_number.clone(),
            arrival_date: first.arrival_date,
            transporter: first.transporter.clone(),
            ..Self::default()
        }
    }

    /// A draft holding the current values of a stored vehicle. Stored photographs are not
    /// copied; they stay on the vehicle until explicitly removed.
    #[must_use]
    pub fn from_vehicle(vehicle: &Vehicle) -> Self {
        Self {
            year_brand_model: vehicle.year_brand_model.clone(),
            v_type: vehicle.v_type,
            vin: vehicle.vin.clone(),
            price: vehicle.price.clone().unwrap_or_default(),
            container_number: vehicle.container_number.clone().unwrap_or_default(),
            arrival_date: vehicle.arrival_date,
            transporter: vehicle.transporter.clone().unwrap_or_default(),
            recipient: vehicle.recipient.clone().unwrap_or_default(),
            comment: vehicle.comment.clone().unwrap_or_default(),
            status: vehicle.status,
            document_photos: Vec::new(),
        }
    }

    /// Parsed price. `Ok(None)` for a blank input.
    pub(crate) fn parsed_price(&self) -> Result<Option<f64>, ()> {
        let raw = self.price.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        match raw.replace(',', ".").parse::<f64>() {
            Ok(price) if price.is_finite() && price >= 0.0 => Ok(Some(price)),
            _ => Err(()),
        }
    }

    /// Runs the form rules over this draft.
    #[must_use]
    pub fn validate(&self) -> FieldErrors<VehicleField> {
        let mut errors = FieldErrors::new();
        if self.year_brand_model.trim().is_empty() {
            errors.insert(
                VehicleField::YearBrandModel,
                ErrorKind::Schema,
                DESCRIPTOR_REQUIRED,
            );
        }
        if self.vin.trim().is_empty() {
            errors.insert(VehicleField::Vin, ErrorKind::Schema, VIN_REQUIRED);
        }
        if self.parsed_price().is_err() {
            errors.insert(VehicleField::Price, ErrorKind::Schema, PRICE_INVALID);
        }
        if let Some(error) = self
            .document_photos
            .iter()
            .find_map(|photo| photo.validate_image().err())
        {
            errors.insert(
                VehicleField::DocumentPhotos,
                ErrorKind::Schema,
                error.to_string(),
            );
        }
        errors
    }

    /// Converts the draft into the backend payload for `client_id`. Blank optionals are
    /// omitted. Call [`VehicleDraft::validate`] first; an unparseable price is dropped.
    #[must_use]
    pub fn to_request(&self, client_id: i64) -> VehicleRequest {
        VehicleRequest {
            client: client_id,
            year_brand_model: self.year_brand_model.trim().to_string(),
            vin: self.vin.trim().to_string(),
            v_type: self.v_type,
            price: self.parsed_price().ok().flatten(),
            container_number: non_blank(&self.container_number),
            arrival_date: self.arrival_date,
            transporter: non_blank(&self.transporter),
            recipient: non_blank(&self.recipient),
            comment: non_blank(&self.comment),
            status: self.status,
            document_photos: self.document_photos.clone(),
        }
    }
}

pub(crate) fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> VehicleDraft {
        VehicleDraft {
            year_brand_model: " 2022 Hyundai Tucson ".to_string(),
            vin: "KM8J33A40NU000001".to_string(),
            price: "18 500".to_string(),
            container_number: "TGHU0000001".to_string(),
            arrival_date: NaiveDate::from_ymd_opt(2025, 4, 1),
            transporter: "Caspian Line".to_string(),
            recipient: "Sardor".to_string(),
            ..VehicleDraft::default()
        }
    }

    #[test]
    fn test_validate_orders_errors_by_form_layout() {
        let errors = VehicleDraft::default().validate();
        assert_eq!(errors.len(), 2);
        let (field, error) = errors.first().unwrap();
        assert_eq!(field, VehicleField::YearBrandModel);
        assert_eq!(error.kind, ErrorKind::Schema);
        assert!(errors.get(VehicleField::Vin).is_some());
    }

    #[test]
    fn test_price_must_be_numeric() {
        let mut d = draft();
        assert!(d.validate().get(VehicleField::Price).is_some());
        d.price = "18500,75".to_string();
        assert!(d.validate().is_empty());
        assert_eq!(d.to_request(1).price, Some(18_500.75));
        d.price = "-1".to_string();
        assert!(d.validate().get(VehicleField::Price).is_some());
    }

    #[test]
    fn test_invalid_photo_is_reported() {
        let mut d = draft();
        d.price.clear();
        d.document_photos = vec![Attachment::new("title.pdf", "application/pdf", vec![1])];
        let errors = d.validate();
        assert_eq!(errors.first().unwrap().0, VehicleField::DocumentPhotos);
    }

    #[test]
    fn test_to_request_trims_and_omits_blanks() {
        let mut d = draft();
        d.price.clear();
        d.comment = "   ".to_string();
        let request = d.to_request(12);
        assert_eq!(request.client, 12);
        assert_eq!(request.year_brand_model, "2022 Hyundai Tucson");
        assert_eq!(request.price, None);
        assert_eq!(request.comment, None);
        assert_eq!(request.transporter.as_deref(), Some("Caspian Line"));
    }

    #[test]
    fn test_seeded_from_copies_shipment_details_only() {
        let seeded = VehicleDraft::seeded_from(&draft());
        assert_eq!(seeded.arrival_date, NaiveDate::from_ymd_opt(2025, 4, 1));
        assert_eq!(seeded.container_number, "TGHU0000001");
        assert_eq!(seeded.transporter, "Caspian Line");
        assert!(seeded.vin.is_empty());
        assert!(seeded.year_brand_model.is_empty());
        assert!(seeded.recipient.is_empty());
        assert_eq!(seeded.v_type, None);
    }

    #[test]
    fn test_wire_names_round_trip() {
        for field in [
            VehicleField::YearBrandModel,
            VehicleField::VType,
            VehicleField::Vin,
            VehicleField::Price,
            VehicleField::ContainerNumber,
            VehicleField::ArrivalDate,
            VehicleField::Transporter,
            VehicleField::Recipient,
            VehicleField::Comment,
            VehicleField::Status,
            VehicleField::DocumentPhotos,
        ] {
            assert_eq!(VehicleField::from_wire(field.wire_name()), Some(field));
        }
        assert_eq!(VehicleField::from_wire("non_field_errors"), None);
    }
}
