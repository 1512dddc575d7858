//! # Multi-record vehicle form
//!
//! A batch is an ordered list of structurally identical vehicle drafts shown as tabs and
//! submitted together. It never has fewer than one record. Validation errors are kept per record
//! and the batch tracks which tab is active and which field should receive focus.

use tracing::{debug, info, warn};

use crate::{
    backend::{BackendClient, BackendError, ErrorBody},
    forms::{
        CONFIRM_TITLE, Confirm,
        draft::{VehicleDraft, VehicleField},
        field::{ErrorKind, FieldErrors},
    },
    models::{Vehicle, VehicleRequest},
};

pub const DUPLICATE_VIN: &str = "This VIN is already used by another vehicle in this batch.";
pub const SUBMIT_CONFIRMATION: &str = "Save the vehicles?";

/// The field that should receive input focus.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FieldFocus {
    pub record: usize,
    pub field: VehicleField,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
    #[error("a batch must keep at least one vehicle")]
    LastRecord,

    #[error("vehicle {index} does not exist (batch has {len})")]
    OutOfRange { index: usize, len: usize },

    #[error("vehicle {record} repeats a VIN used earlier in the batch")]
    DuplicateVin { record: usize },

    #[error("vehicle {record} has invalid fields")]
    Invalid { record: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Invalid(#[from] BatchError),

    /// The backend rejected individual fields; they are now set on the batch.
    #[error("the server rejected some vehicles")]
    Rejected(#[source] BackendError),

    #[error("failed to save vehicles: {0}")]
    Backend(#[source] BackendError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Submitted(Vec<Vehicle>),
    /// The confirmation prompt was declined; nothing was sent.
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct VehicleBatch {
    client_id: i64,
    records: Vec<VehicleDraft>,
    errors: Vec<FieldErrors<VehicleField>>,
    active_tab: usize,
    focus: Option<FieldFocus>,
}

impl VehicleBatch {
    /// A batch with one empty record whose vehicles will belong to `client_id`.
    #[must_use]
    pub fn new(client_id: i64) -> Self {
        Self {
            client_id,
            records: vec![VehicleDraft::default()],
            errors: vec![FieldErrors::new()],
            active_tab: 0,
            focus: None,
        }
    }

    #[must_use]
    pub fn client_id(&self) -> i64 {
        self.client_id
    }

    /// Number of records; always at least one.
    #[must_use]
    pub fn count(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn records(&self) -> &[VehicleDraft] {
        &self.records
    }

    #[must_use]
    pub fn record(&self, index: usize) -> Option<&VehicleDraft> {
        self.records.get(index)
    }

    /// Mutable access for field edits.
    pub fn record_mut(&mut self, index: usize) -> Option<&mut VehicleDraft> {
        self.records.get_mut(index)
    }

    /// Errors currently shown on record `index`.
    #[must_use]
    pub fn errors(&self, index: usize) -> Option<&FieldErrors<VehicleField>> {
        self.errors.get(index)
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.errors.iter().any(|e| !e.is_empty())
    }

    #[must_use]
    pub fn active_tab(&self) -> usize {
        self.active_tab
    }

    pub fn select_tab(&mut self, index: usize) -> Result<(), BatchError> {
        self.check_index(index)?;
        self.active_tab = index;
        Ok(())
    }

    #[must_use]
    pub fn focus(&self) -> Option<FieldFocus> {
        self.focus
    }

    /// Appends a record and makes it the active tab.
    ///
    /// While the batch holds a single record, that record must be valid first; otherwise nothing
    /// is appended and its first invalid field is focused. The new record carries over the
    /// arrival date, container and transporter of the first record.
    pub fn add_record(&mut self) -> Result<usize, BatchError> {
        if self.records.len() == 1 {
            let errors = self.records[0].validate();
            if let Some((field, _)) = errors.first() {
                self.errors[0] = errors;
                self.show(0, field);
                return Err(BatchError::Invalid { record: 0 });
            }
        }

        let record = VehicleDraft::seeded_from(&self.records[0]);
        self.records.push(record);
        self.errors.push(FieldErrors::new());
        self.active_tab = self.records.len() - 1;
        self.focus = None;
        debug!(count = self.records.len(), "Added vehicle to batch");
        Ok(self.active_tab)
    }

    /// Removes record `index` and re-validates what remains. The last record cannot be removed.
    pub fn remove_record(&mut self, index: usize) -> Result<(), BatchError> {
        if self.records.len() <= 1 {
            return Err(BatchError::LastRecord);
        }
        self.check_index(index)?;

        self.records.remove(index);
        self.errors.remove(index);
        if self.active_tab >= index {
            self.active_tab = self.active_tab.saturating_sub(1);
        }
        self.focus = None;
        debug!(index, count = self.records.len(), "Removed vehicle from batch");

        self.collect_errors();
        Ok(())
    }

    /// Validates the whole batch.
    ///
    /// A repeated VIN is reported first and alone: the first record repeating an earlier VIN
    /// gets exactly one error and nothing else is checked. Otherwise every record is validated
    /// and the first record with errors becomes the active tab.
    pub fn validate_batch(&mut self) -> Result<(), BatchError> {
        match self.collect_errors() {
            None => Ok(()),
            Some((focus, error)) => {
                self.show(focus.record, focus.field);
                Err(error)
            }
        }
    }

    /// Validates, asks for confirmation and sends the batch.
    ///
    /// On success the batch is reset to a single empty record. Field errors returned by the
    /// backend are mapped onto their records and focused; any other failure leaves the batch as
    /// it was so it can be retried.
    pub async fn submit(
        &mut self,
        backend: &dyn BackendClient,
        confirm: &dyn Confirm,
    ) -> Result<SubmitOutcome, SubmitError> {
        self.validate_batch()?;
        if !confirm.confirm(CONFIRM_TITLE, SUBMIT_CONFIRMATION) {
            debug!("Batch submission cancelled");
            return Ok(SubmitOutcome::Cancelled);
        }

        let requests: Vec<VehicleRequest> = self
            .records
            .iter()
            .map(|record| record.to_request(self.client_id))
            .collect();
        match backend.create_vehicles(&requests).await {
            Ok(created) => {
                info!(count = created.len(), "Vehicles saved");
                *self = Self::new(self.client_id);
                Ok(SubmitOutcome::Submitted(created))
            }
            Err(error) => {
                let mapped = error
                    .body()
                    .is_some_and(|body| self.apply_server_errors(body));
                if mapped {
                    warn!("Backend rejected vehicle fields: {error}");
                    return Err(SubmitError::Rejected(error));
                }
                warn!("Failed to save vehicles: {error}");
                Err(SubmitError::Backend(error))
            }
        }
    }

    /// Maps backend field errors onto the records and focuses the first one. Returns whether any
    /// error could be mapped.
    fn apply_server_errors(&mut self, body: &ErrorBody) -> bool {
        let mut issues = body.record_issues();
        if issues.is_empty() && self.records.len() == 1 {
            let single = body.field_issues();
            if !single.is_empty() {
                issues.push((0, single));
            }
        }

        let mut first: Option<FieldFocus> = None;
        for (record, fields) in issues {
            let Some(errors) = self.errors.get_mut(record) else {
                continue;
            };
            for (name, issue) in fields {
                let Some(field) = VehicleField::from_wire(&name) else {
                    debug!(field = %name, "Ignoring error for unknown field");
                    continue;
                };
                errors.insert(field, ErrorKind::Manual, issue.message);
            }
            if first.is_none() {
                first = errors
                    .first()
                    .map(|(field, _)| FieldFocus { record, field });
            }
        }

        match first {
            Some(focus) => {
                self.show(focus.record, focus.field);
                true
            }
            None => false,
        }
    }

    /// Recomputes every record's errors without moving the active tab. Returns where the first
    /// error is and which error it is.
    fn collect_errors(&mut self) -> Option<(FieldFocus, BatchError)> {
        for errors in &mut self.errors {
            errors.clear();
        }

        if let Some(record) = self.duplicate_vin() {
            self.errors[record].insert(VehicleField::Vin, ErrorKind::Manual, DUPLICATE_VIN);
            let focus = FieldFocus {
                record,
                field: VehicleField::Vin,
            };
            return Some((focus, BatchError::DuplicateVin { record }));
        }

        let mut first = None;
        for (record, draft) in self.records.iter().enumerate() {
            let errors = draft.validate();
            if first.is_none() {
                first = errors.first().map(|(field, _)| FieldFocus { record, field });
            }
            self.errors[record] = errors;
        }
        first.map(|focus| {
            (
                focus,
                BatchError::Invalid {
                    record: focus.record,
                },
            )
        })
    }

    /// First record whose VIN repeats one used by an earlier record. Blank VINs are left to
    /// the required-field rule.
    fn duplicate_vin(&self) -> Option<usize> {
        let vins: Vec<&str> = self.records.iter().map(|r| r.vin.trim()).collect();
        vins.iter()
            .enumerate()
            .find(|(i, vin)| !vin.is_empty() && vins[..*i].contains(*vin))
            .map(|(i, _)| i)
    }

    fn show(&mut self, record: usize, field: VehicleField) {
        self.active_tab = record;
        self.focus = Some(FieldFocus { record, field });
    }

    fn check_index(&self, index: usize) -> Result<(), BatchError> {
        if index < self.records.len() {
            Ok(())
        } else {
            Err(BatchError::OutOfRange {
                index,
                len: self.records.len(),
            })
        }
    }
}
