use std::path::Path;

/// Largest accepted photograph, in bytes.
pub const MAX_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024; // 10 MiB

/// Image MIME types accepted for document and identity photographs.
pub const ALLOWED_IMAGE_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/heic",
    "image/heif",
];

/// File extensions accepted by the spreadsheet import.
pub const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xls"];

const KNOWN_EXTENSIONS: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("heic", "image/heic"),
    ("heif", "image/heif"),
    ("xlsx", "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
    ("xls", "application/vnd.ms-excel"),
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttachmentError {
    #[error("{file_name} is larger than 10 MiB ({size} bytes)")]
    TooLarge { file_name: String, size: usize },

    #[error("{file_name} has an unsupported file type")]
    UnsupportedType { file_name: String },
}

/// A file attached to a form, held in memory until it is sent.
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl Attachment {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Reads a file from disk, deriving the content type from its extension.
    pub async fn from_path(path: &Path) -> Result<Self, std::io::Error> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content_type = content_type_for(&file_name).unwrap_or("application/octet-stream");
        Ok(Self::new(file_name, content_type, bytes))
    }

    #[must_use]
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
    }

    /// Checks the size limit and that either the MIME type or the extension is an allowed image
    /// type.
    pub fn validate_image(&self) -> Result<(), AttachmentError> {
        if self.bytes.len() > MAX_ATTACHMENT_BYTES {
            return Err(AttachmentError::TooLarge {
                file_name: self.file_name.clone(),
                size: self.bytes.len(),
            });
        }
        let mime_ok = ALLOWED_IMAGE_TYPES.contains(&self.content_type.as_str());
        let ext_ok = self
            .extension()
            .and_then(|ext| content_type_for_extension(&ext))
            .is_some_and(|ct| ALLOWED_IMAGE_TYPES.contains(&ct));
        if mime_ok || ext_ok {
            Ok(())
        } else {
            Err(AttachmentError::UnsupportedType {
                file_name: self.file_name.clone(),
            })
        }
    }

    #[must_use]
    pub fn is_spreadsheet(&self) -> bool {
        self.extension()
            .is_some_and(|ext| SPREADSHEET_EXTENSIONS.contains(&ext.as_str()))
    }
}

fn content_type_for(file_name: &str) -> Option<&'static str> {
    let ext = Path::new(file_name).extension()?.to_string_lossy().to_ascii_lowercase();
    content_type_for_extension(&ext)
}

fn content_type_for_extension(ext: &str) -> Option<&'static str> {
    KNOWN_EXTENSIONS
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, ct)| *ct)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_image_accepts_by_extension() {
        let a = Attachment::new("IMG_0001.HEIC", "application/octet-stream", vec![0; 16]);
        assert_eq!(a.validate_image(), Ok(()));
    }

    #[test]
    fn test_validate_image_rejects_oversized() {
        let a = Attachment::new("big.jpg", "image/jpeg", vec![0; MAX_ATTACHMENT_BYTES + 1]);
        assert!(matches!(
            a.validate_image(),
            Err(AttachmentError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_validate_image_rejects_pdf() {
        let a = Attachment::new("scan.pdf", "application/pdf", vec![1, 2, 3]);
        assert!(matches!(
            a.validate_image(),
            Err(AttachmentError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn test_is_spreadsheet() {
        assert!(Attachment::new("batch.XLSX", "", Vec::new()).is_spreadsheet());
        assert!(!Attachment::new("batch.csv", "text/csv", Vec::new()).is_spreadsheet());
    }
}
