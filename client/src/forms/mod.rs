//! # Forms
//!
//! Client-side form state: the multi-record vehicle batch, the single-vehicle edit form, the
//! registration forms and the spreadsheet import. Forms validate locally before anything reaches
//! the backend and map backend field errors back onto their fields.

pub mod batch;
pub mod draft;
pub mod edit;
pub mod field;
pub mod import;
pub mod register;

pub use batch::{BatchError, FieldFocus, SubmitError, SubmitOutcome, VehicleBatch};
pub use draft::{VehicleDraft, VehicleField};
pub use field::{ErrorKind, FieldError, FieldErrors};

/// Blocking yes/no prompt shown before a form is sent.
pub trait Confirm {
    fn confirm(&self, title: &str, message: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str, &str) -> bool,
{
    fn confirm(&self, title: &str, message: &str) -> bool {
        self(title, message)
    }
}

pub const CONFIRM_TITLE: &str = "Confirm";
