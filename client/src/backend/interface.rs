use std::{collections::BTreeMap, future::Future, pin::Pin};

use serde_json::Value;

use crate::models::{
    AccessToken, Attachment, Client, ClientRegistration, ReceiverRegistration, TokenPair, User,
    Vehicle, VehicleRequest, VehicleType, VehicleUpdate,
};

/// Boxed future returned by every [`BackendClient`] operation.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, BackendError>> + Send + 'a>>;

pub trait BackendClient: Send + Sync + 'static {
    // Accounts

    /// Exchanges a phone number and password for a bearer token pair.
    fn obtain_tokens<'a>(
        &self,
        identifier: &'a str,
        secret: &'a str,
    ) -> BackendFuture<'a, TokenPair>;

    fn refresh_access<'a>(&self, refresh: &'a str) -> BackendFuture<'a, AccessToken>;

    fn register<'a>(&self, draft: &'a ReceiverRegistration) -> BackendFuture<'a, ()>;

    fn register_client<'a>(&self, draft: &'a ClientRegistration) -> BackendFuture<'a, ()>;

    /// Acknowledges the onboarding guide for the current user.
    fn onboard(&self) -> BackendFuture<'static, ()>;

    // Users (admin)

    fn list_users(&self) -> BackendFuture<'static, Vec<User>>;

    fn list_clients(&self) -> BackendFuture<'static, Vec<Client>>;

    fn approve_user(&self, id: i64) -> BackendFuture<'static, ()>;

    // Vehicles

    fn list_vehicle_types(&self) -> BackendFuture<'static, Vec<VehicleType>>;

    fn list_vehicles(&self, client_id: Option<i64>) -> BackendFuture<'static, Vec<Vehicle>>;

    fn get_vehicle(&self, id: i64) -> BackendFuture<'static, Vehicle>;

    /// Creates a batch of vehicles. When any record carries photographs the batch is sent as one
    /// multipart request per record.
    fn create_vehicles<'a>(
        &self,
        vehicles: &'a [VehicleRequest],
    ) -> BackendFuture<'a, Vec<Vehicle>>;

    fn update_vehicle<'a>(&self, id: i64, update: &'a VehicleUpdate) -> BackendFuture<'a, Vehicle>;

    fn upload_spreadsheet<'a>(&self, client_id: i64, file: &'a Attachment) -> BackendFuture<'a, ()>;
}

/// Error type for backend operations
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),

    #[error("backend responded with status {status}")]
    Status { status: u16, body: ErrorBody },

    #[error("failed to decode backend response: {0}")]
    Decode(String),

    /// The request could not be built, e.g. an attachment carries an invalid MIME type.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl BackendError {
    /// Body of an error response, if the backend produced one.
    #[must_use]
    pub fn body(&self) -> Option<&ErrorBody> {
        match self {
            BackendError::Status { body, .. } => Some(body),
            _ => None,
        }
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, BackendError::Network(_))
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Decode(error.to_string())
        } else if error.is_builder() {
            Self::InvalidRequest(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}

/// One error reported by the backend for a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    /// Machine-readable code such as `phone_exists`, when present.
    pub code: Option<String>,
    pub message: String,
}

/// # Error response body
///
/// The backend reports errors in several shapes: `{"detail": "..."}` for authentication
/// failures, `{"field": ["msg", ...]}` or `{"field": {"error_type": "...", "message": "..."}}`
/// for field validation, and a JSON array of such objects (one per record) for batch creates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorBody(pub Value);

impl ErrorBody {
    /// Parses a raw response body; non-JSON text is kept as a string value.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        if text.trim().is_empty() {
            return Self(Value::Null);
        }
        Self(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())))
    }

    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        self.0.get("detail").and_then(Value::as_str)
    }

    /// Field errors of an object body, keyed by field name.
    #[must_use]
    pub fn field_issues(&self) -> BTreeMap<String, FieldIssue> {
        object_issues(&self.0)
    }

    /// Places a single-record error body at position `index` of an array body, so errors of
    /// one request in a per-record batch read like errors of a batch request.
    #[must_use]
    pub fn at_record(self, index: usize) -> Self {
        if self.0.is_array() {
            return self;
        }
        let mut records = vec![Value::Object(serde_json::Map::new()); index];
        records.push(self.0);
        Self(Value::Array(records))
    }

    /// Per-record field errors of an array body, as `(record index, errors)` pairs. Records
    /// without errors are skipped.
    #[must_use]
    pub fn record_issues(&self) -> Vec<(usize, BTreeMap<String, FieldIssue>)> {
        let Some(records) = self.0.as_array() else {
            return Vec::new();
        };
        records
            .iter()
            .enumerate()
            .map(|(i, record)| (i, object_issues(record)))
            .filter(|(_, issues)| !issues.is_empty())
            .collect()
    }
}

fn object_issues(value: &Value) -> BTreeMap<String, FieldIssue> {
    let Some(object) = value.as_object() else {
        return BTreeMap::new();
    };
    object
        .iter()
        .filter(|(key, _)| key.as_str() != "detail")
        .filter_map(|(key, value)| field_issue(value).map(|issue| (key.clone(), issue)))
        .collect()
}

fn field_issue(value: &Value) -> Option<FieldIssue> {
    match value {
        Value::String(message) => Some(FieldIssue {
            code: None,
            message: message.clone(),
        }),
        Value::Array(items) => items.iter().find_map(field_issue),
        Value::Object(object) => {
            let code = object
                .get("error_type")
                .and_then(Value::as_str)
                .map(str::to_string);
            let message = object
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| code.clone())?;
            Some(FieldIssue { code, message })
        }
        _ => None,
    }
}
