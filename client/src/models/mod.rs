use serde::{Deserialize, Serialize};

mod attachment;
mod session;
mod user;
mod vehicle;

pub use attachment::{
    ALLOWED_IMAGE_TYPES, Attachment, AttachmentError, MAX_ATTACHMENT_BYTES, SPREADSHEET_EXTENSIONS,
};
pub use session::{AccessToken, Claims, Role, Session, SessionPhase, TokenPair};
pub use user::{Client, ClientRegistration, Photo, ReceiverRegistration, User};
pub use vehicle::{
    Vehicle, VehicleRequest, VehicleStatus, VehicleType, VehicleUpdate, format_calendar_date,
};

/// A `{value, label}` pair as shown in a select box.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

impl SelectOption {
    pub fn new(value: impl ToString, label: impl Into<String>) -> Self {
        Self {
            value: value.to_string(),
            label: label.into(),
        }
    }
}
