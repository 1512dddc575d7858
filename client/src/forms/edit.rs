//! # Single-vehicle edit form
//!
//! Starts from a stored vehicle and sends only what changed.

use tracing::{debug, warn};

use crate::{
    backend::BackendError,
    forms::{
        CONFIRM_TITLE, Confirm,
        draft::{VehicleDraft, VehicleField},
        field::{ErrorKind, FieldErrors},
    },
    models::{Attachment, Photo, Vehicle, VehicleUpdate},
    vehicles::VehicleStore,
};

pub const EDIT_CONFIRMATION: &str = "Save the changes to this vehicle?";

#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error("field {field:?} is invalid")]
    Invalid { field: VehicleField },

    /// The backend rejected individual fields; they are now set on the form.
    #[error("the server rejected the changes")]
    Rejected(#[source] BackendError),

    #[error("failed to save vehicle: {0}")]
    Backend(#[source] BackendError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    Saved(Box<Vehicle>),
    /// Nothing changed, so nothing was sent.
    Unchanged,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct VehicleEdit {
    original: Vehicle,
    /// Field values as currently edited. Photos here are new attachments only.
    pub draft: VehicleDraft,
    removed_photos: Vec<i64>,
    errors: FieldErrors<VehicleField>,
    focus: Option<VehicleField>,
}

impl VehicleEdit {
    #[must_use]
    pub fn new(vehicle: Vehicle) -> Self {
        Self {
            draft: VehicleDraft::from_vehicle(&vehicle),
            original: vehicle,
            removed_photos: Vec::new(),
            errors: FieldErrors::new(),
            focus: None,
        }
    }

    #[must_use]
    pub fn vehicle(&self) -> &Vehicle {
        &self.original
    }

    #[must_use]
    pub fn errors(&self) -> &FieldErrors<VehicleField> {
        &self.errors
    }

    #[must_use]
    pub fn focus(&self) -> Option<VehicleField> {
        self.focus
    }

    pub fn attach(&mut self, photo: Attachment) {
        self.draft.document_photos.push(photo);
    }

    /// Marks a stored photograph for deletion. Returns `false` for an id that does not belong to
    /// the vehicle or is already marked.
    pub fn remove_photo(&mut self, id: i64) -> bool {
        let known = self.original.document_photos.iter().any(|p| p.id == id);
        if !known || self.removed_photos.contains(&id) {
            return false;
        }
        self.removed_photos.push(id);
        true
    }

    /// Stored photographs that will remain after saving.
    pub fn remaining_photos(&self) -> impl Iterator<Item = &Photo> {
        self.original
            .document_photos
            .iter()
            .filter(|p| !self.removed_photos.contains(&p.id))
    }

    /// The partial update holding every changed field, new photographs and deletions.
    #[must_use]
    pub fn changes(&self) -> VehicleUpdate {
        let before = VehicleDraft::from_vehicle(&self.original);
        let after = &self.draft;
        let changed_text =
            |old: &str, new: &str| (old.trim() != new.trim()).then(|| new.trim().to_string());

        let price = match (before.parsed_price(), after.parsed_price()) {
            (Ok(old), Ok(new)) if old == new => None,
            (_, new) => Some(new.ok().flatten()),
        };

        VehicleUpdate {
            year_brand_model: changed_text(&before.year_brand_model, &after.year_brand_model),
            vin: changed_text(&before.vin, &after.vin),
            v_type: (before.v_type != after.v_type).then_some(after.v_type),
            price,
            container_number: changed_text(&before.container_number, &after.container_number),
            arrival_date: (before.arrival_date != after.arrival_date)
                .then_some(after.arrival_date),
            transporter: changed_text(&before.transporter, &after.transporter),
            recipient: changed_text(&before.recipient, &after.recipient),
            comment: changed_text(&before.comment, &after.comment),
            status: after.status.filter(|s| before.status != Some(*s)),
            document_photos: after.document_photos.clone(),
            remove_document_photo_ids: self.removed_photos.clone(),
        }
    }

    /// Validates, confirms and saves the changes through `store`.
    pub async fn save(
        &mut self,
        store: &mut VehicleStore,
        confirm: &dyn Confirm,
    ) -> Result<EditOutcome, EditError> {
        self.errors = self.draft.validate();
        if let Some((field, _)) = self.errors.first() {
            self.focus = Some(field);
            return Err(EditError::Invalid { field });
        }

        let update = self.changes();
        if update.is_empty() {
            debug!(id = self.original.id, "No changes to save");
            return Ok(EditOutcome::Unchanged);
        }
        if !confirm.confirm(CONFIRM_TITLE, EDIT_CONFIRMATION) {
            return Ok(EditOutcome::Cancelled);
        }

        match store.update_vehicle(self.original.id, &update).await {
            Ok(saved) => {
                *self = Self::new(saved.clone());
                Ok(EditOutcome::Saved(Box::new(saved)))
            }
            Err(error) => {
                let issues = error.body().map(|b| b.field_issues()).unwrap_or_default();
                for (name, issue) in issues {
                    if let Some(field) = VehicleField::from_wire(&name) {
                        self.errors.insert(field, ErrorKind::Manual, issue.message);
                    }
                }
                warn!(id = self.original.id, "Failed to save vehicle: {error}");
                match self.errors.first() {
                    Some((field, _)) => {
                        self.focus = Some(field);
                        Err(EditError::Rejected(error))
                    }
                    None => Err(EditError::Backend(error)),
                }
            }
        }
    }
}
