//! Request body planning.
//!
//! Bodies are first described as plain field lists, which are converted into `reqwest` forms only
//! when the request is sent.

use reqwest::multipart::{Form, Part};
use serde_json::Value;

use crate::{
    backend::BackendError,
    models::{Attachment, ClientRegistration, ReceiverRegistration, VehicleRequest, VehicleUpdate},
};

/// Multipart field carrying the photographs of one vehicle.
pub const DOCUMENT_PHOTOS_FIELD: &str = "uploaded_document_photos";
/// Multipart field carrying identity photographs at registration.
pub const IDENTITY_PHOTOS_FIELD: &str = "uploaded_images";

#[derive(Debug, Clone, PartialEq)]
pub enum FormPart<'a> {
    Text {
        name: &'static str,
        value: String,
    },
    File {
        name: &'static str,
        attachment: &'a Attachment,
    },
}

impl FormPart<'_> {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            FormPart::Text { name, .. } | FormPart::File { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlannedBody<'a> {
    Json(Value),
    Multipart(Vec<FormPart<'a>>),
}

/// How a batch of new vehicles travels to the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum VehicleCreatePlan<'a> {
    /// A single JSON array request for the whole batch.
    Batch(Value),
    /// One multipart request per record, in batch order.
    PerRecord(Vec<Vec<FormPart<'a>>>),
}

/// Plans a batch create. A batch without photographs is one JSON request; as soon as any record
/// carries photographs every record becomes its own multipart request carrying only that
/// record's files.
pub fn plan_vehicle_create(
    vehicles: &[VehicleRequest],
) -> Result<VehicleCreatePlan<'_>, serde_json::Error> {
    if !vehicles.iter().any(VehicleRequest::has_attachments) {
        return Ok(VehicleCreatePlan::Batch(serde_json::to_value(vehicles)?));
    }
    Ok(VehicleCreatePlan::PerRecord(
        vehicles
            .iter()
            .map(|vehicle| {
                let mut parts = text_parts(vehicle.text_fields());
                parts.extend(file_parts(DOCUMENT_PHOTOS_FIELD, &vehicle.document_photos));
                parts
            })
            .collect(),
    ))
}

pub fn plan_vehicle_update(update: &VehicleUpdate) -> Result<PlannedBody<'_>, serde_json::Error> {
    if !update.requires_multipart() {
        return Ok(PlannedBody::Json(serde_json::to_value(update)?));
    }
    let mut parts = text_parts(update.text_fields());
    parts.extend(file_parts(DOCUMENT_PHOTOS_FIELD, &update.document_photos));
    Ok(PlannedBody::Multipart(parts))
}

#[must_use]
pub fn plan_receiver_registration(draft: &ReceiverRegistration) -> Vec<FormPart<'_>> {
    let mut parts = text_parts(vec![
        ("full_name", draft.full_name.clone()),
        ("phone", draft.phone.clone()),
        ("telegram", draft.telegram.clone()),
        ("password", draft.password.clone()),
        ("confirm_password", draft.confirm_password.clone()),
    ]);
    parts.extend(file_parts(IDENTITY_PHOTOS_FIELD, &draft.identity_photos));
    parts
}

#[must_use]
pub fn plan_client_registration(draft: &ClientRegistration) -> Vec<FormPart<'static>> {
    let mut fields = vec![
        ("full_name", draft.full_name.clone()),
        ("phone", draft.phone.clone()),
        ("telegram", draft.telegram.clone()),
        ("address", draft.address.clone()),
    ];
    // optional
    for (name, value) in [("company", &draft.company), ("email", &draft.email)] {
        if !value.trim().is_empty() {
            fields.push((name, value.clone()));
        }
    }
    fields.push(("password", draft.password.clone()));
    fields.push(("confirm_password", draft.confirm_password.clone()));
    text_parts(fields)
}

#[must_use]
pub fn plan_spreadsheet(client_id: i64, file: &Attachment) -> Vec<FormPart<'_>> {
    vec![
        FormPart::Text {
            name: "client",
            value: client_id.to_string(),
        },
        FormPart::File {
            name: "excel_file",
            attachment: file,
        },
    ]
}

/// Converts planned parts into a `reqwest` multipart form.
pub fn into_form(parts: Vec<FormPart<'_>>) -> Result<Form, BackendError> {
    let mut form = Form::new();
    for part in parts {
        form = match part {
            FormPart::Text { name, value } => form.text(name, value),
            FormPart::File { name, attachment } => {
                let mut file = Part::bytes(attachment.bytes.clone())
                    .file_name(attachment.file_name.clone());
                if !attachment.content_type.is_empty() {
                    file = file.mime_str(&attachment.content_type)?;
                }
                form.part(name, file)
            }
        };
    }
    Ok(form)
}

fn text_parts(fields: Vec<(&'static str, String)>) -> Vec<FormPart<'static>> {
    fields
        .into_iter()
        .map(|(name, value)| FormPart::Text { name, value })
        .collect()
}

fn file_parts<'a>(
    name: &'static str,
    attachments: &'a [Attachment],
) -> impl Iterator<Item = FormPart<'a>> + 'a {
    attachments
        .iter()
        .map(move |attachment| FormPart::File { name, attachment })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vehicle(vin: &str, photos: &[&str]) -> VehicleRequest {
        VehicleRequest {
            client: 5,
            year_brand_model: "2024 Kia K5".to_string(),
            vin: vin.to_string(),
            v_type: None,
            price: None,
            container_number: None,
            arrival_date: None,
            transporter: None,
            recipient: None,
            comment: None,
            status: None,
            document_photos: photos
                .iter()
                .map(|name| Attachment::new(*name, "image/jpeg", vec![0xff, 0xd8]))
                .collect(),
        }
    }

    fn file_names<'a>(parts: &'a [FormPart<'a>]) -> Vec<&'a str> {
        parts
            .iter()
            .filter_map(|part| match part {
                FormPart::File { attachment, .. } => Some(attachment.file_name.as_str()),
                FormPart::Text { .. } => None,
            })
            .collect()
    }

    #[test]
    fn test_batch_without_photos_is_one_json_array() {
        let vehicles = [vehicle("A1", &[]), vehicle("B2", &[])];
        let plan = plan_vehicle_create(&vehicles).unwrap();
        let VehicleCreatePlan::Batch(json) = plan else {
            panic!("expected a JSON batch, got {plan:?}");
        };
        assert_eq!(json.as_array().map(Vec::len), Some(2));
        assert_eq!(json[1]["vin"], "B2");
        assert!(json[0].get("document_photos").is_none());
    }

    #[test]
    fn test_photos_split_batch_per_record() {
        let vehicles = [
            vehicle("A1", &["front.jpg", "rear.jpg"]),
            vehicle("B2", &[]),
            vehicle("C3", &["vin-plate.jpg"]),
        ];
        let VehicleCreatePlan::PerRecord(requests) = plan_vehicle_create(&vehicles).unwrap() else {
            panic!("expected per-record multipart requests");
        };
        assert_eq!(requests.len(), 3);
        assert_eq!(file_names(&requests[0]), ["front.jpg", "rear.jpg"]);
        assert!(file_names(&requests[1]).is_empty());
        assert_eq!(file_names(&requests[2]), ["vin-plate.jpg"]);
        assert!(requests[2].contains(&FormPart::Text {
            name: "vin",
            value: "C3".to_string()
        }));
        assert!(
            requests
                .iter()
                .flatten()
                .filter(|p| matches!(p, FormPart::File { .. }))
                .all(|p| p.name() == DOCUMENT_PHOTOS_FIELD)
        );
    }

    #[test]
    fn test_update_plans_json_unless_photos_change() {
        let update = VehicleUpdate {
            comment: Some("ok".to_string()),
            ..VehicleUpdate::new()
        };
        assert!(matches!(
            plan_vehicle_update(&update).unwrap(),
            PlannedBody::Json(_)
        ));

        let update = VehicleUpdate {
            document_photos: vec![Attachment::new("new.png", "image/png", vec![1])],
            remove_document_photo_ids: vec![4],
            ..VehicleUpdate::new()
        };
        let PlannedBody::Multipart(parts) = plan_vehicle_update(&update).unwrap() else {
            panic!("expected multipart");
        };
        assert_eq!(file_names(&parts), ["new.png"]);
        assert_eq!(parts[0].name(), "remove_document_photo_ids");
    }

    #[test]
    fn test_client_registration_omits_blank_optionals() {
        let draft = ClientRegistration {
            full_name: "Aziz".to_string(),
            phone: "+998 90 123 45 67".to_string(),
            telegram: "aziz".to_string(),
            address: "Tashkent".to_string(),
            password: "Secret1!".to_string(),
            confirm_password: "Secret1!".to_string(),
            consent: true,
            ..ClientRegistration::default()
        };
        let names: Vec<_> = plan_client_registration(&draft)
            .iter()
            .map(FormPart::name)
            .collect();
        assert_eq!(
            names,
            ["full_name", "phone", "telegram", "address", "password", "confirm_password"]
        );
    }

    #[test]
    fn test_receiver_registration_attaches_identity_photos() {
        let draft = ReceiverRegistration {
            identity_photos: vec![Attachment::new("passport.jpg", "image/jpeg", vec![1])],
            ..ReceiverRegistration::default()
        };
        let parts = plan_receiver_registration(&draft);
        assert_eq!(parts.last().map(FormPart::name), Some(IDENTITY_PHOTOS_FIELD));
        assert_eq!(file_names(&parts), ["passport.jpg"]);
    }
}
