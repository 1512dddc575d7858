//! # Spreadsheet import
//!
//! Bulk-creates a client's vehicles from an `.xlsx`/`.xls` file. The backend parses the file; a
//! rejection is flattened into one message for the user.

use serde_json::Value;
use tracing::{info, warn};

use crate::{
    backend::BackendError,
    models::{Attachment, Vehicle},
    vehicles::VehicleStore,
};

pub const UPLOAD_FAILED: &str = "Failed to import the file.";

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("only .xlsx and .xls files can be imported")]
    UnsupportedFile,

    /// The upload failed. `message` is what the user is shown.
    #[error("{message}")]
    Rejected {
        message: String,
        #[source]
        source: BackendError,
    },
}

#[derive(Debug, Clone)]
pub struct SpreadsheetImport {
    client_id: i64,
    file: Attachment,
}

impl SpreadsheetImport {
    /// Prepares an import of `file` for `client_id`. Only spreadsheet extensions are accepted.
    pub fn new(client_id: i64, file: Attachment) -> Result<Self, ImportError> {
        if !file.is_spreadsheet() {
            return Err(ImportError::UnsupportedFile);
        }
        Ok(Self { client_id, file })
    }

    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file.file_name
    }

    /// Uploads the file, then reloads the client's vehicles so the imported records show up.
    pub async fn upload<'s>(
        &self,
        store: &'s mut VehicleStore,
    ) -> Result<&'s [Vehicle], ImportError> {
        if let Err(error) = store
            .backend()
            .upload_spreadsheet(self.client_id, &self.file)
            .await
        {
            warn!(file = %self.file.file_name, "Spreadsheet import failed: {error}");
            return Err(ImportError::Rejected {
                message: rejection_message(&error),
                source: error,
            });
        }
        info!(client_id = self.client_id, file = %self.file.file_name, "Spreadsheet imported");

        store
            .fetch_vehicles(Some(self.client_id))
            .await
            .map_err(|error| ImportError::Rejected {
                message: rejection_message(&error),
                source: error,
            })
    }
}

/// Row errors are listed one per line; file errors are joined with commas.
#[must_use]
pub fn rejection_message(error: &BackendError) -> String {
    let body = error.body().map(|b| &b.0);
    let strings = |value: Option<&Value>, key: &str| -> Vec<String> {
        value
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| match key {
                        "" => item.as_str(),
                        key => item.get(key).and_then(Value::as_str),
                    })
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    };

    let rows = strings(body.and_then(|b| b.get("errors")), "error");
    if !rows.is_empty() {
        return rows.join("\n");
    }
    let file = strings(body.and_then(|b| b.get("excel_file")), "");
    if !file.is_empty() {
        return file.join(", ");
    }
    format!("{UPLOAD_FAILED} {error}")
}
