use serde::{Deserialize, Serialize};

/// Query parameters accepted by the raw-body upload route.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct BinaryUploadQuery {
    pub filename: Option<String>,
}

/// An uploaded document awaiting encoding.
#[derive(Debug, Clone)]
pub struct ProcessedFile {
    pub name: String,
    pub content: Vec<u8>,
    pub mime_type: Option<String>,
}

impl ProcessedFile {
    pub fn new(name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content,
            mime_type: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn size(&self) -> usize {
        self.content.len()
    }

    /// Accepts the upload when any of name, declared type or magic bytes say PDF.
    pub fn is_pdf(&self) -> bool {
        self.name.to_lowercase().ends_with(".pdf")
            || self.mime_type.as_deref() == Some("application/pdf")
            || self.content.starts_with(b"%PDF")
    }
}
