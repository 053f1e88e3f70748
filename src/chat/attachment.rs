//! Pending attachment selection.

use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::error::Result;

/// A file chosen by the user but not yet sent.
#[derive(Clone, PartialEq, Eq)]
pub struct PendingFile {
    name: String,
    mime_type: String,
    bytes: Vec<u8>,
}

impl std::fmt::Debug for PendingFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

impl PendingFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, guessing its MIME type from the extension.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Ok(Self::new(name, mime_type, bytes))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// Inline `data:` URL for local preview.
    #[must_use]
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }
}

/// The underlying file-picker control.
///
/// Like a browser file input, choosing the value the picker already holds
/// fires no change; the picker has to be reset first.
#[derive(Debug, Default)]
pub struct FilePicker {
    value: Option<PathBuf>,
}

impl FilePicker {
    /// Record a choice. Returns `true` if it registers as a change.
    pub fn choose(&mut self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        if self.value.as_ref() == Some(&path) {
            return false;
        }
        self.value = Some(path);
        true
    }

    pub fn reset(&mut self) {
        self.value = None;
    }

    #[must_use]
    pub fn value(&self) -> Option<&Path> {
        self.value.as_deref()
    }
}

/// At most one pending file, plus the picker that produced it.
#[derive(Debug, Default)]
pub struct AttachmentSelection {
    picker: FilePicker,
    selected: Option<PendingFile>,
}

impl AttachmentSelection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick a file from disk through the picker.
    ///
    /// Returns `Ok(false)` when the picker registered no change.
    pub async fn pick(&mut self, path: &Path) -> Result<bool> {
        if !self.picker.choose(path) {
            return Ok(false);
        }
        match PendingFile::from_path(path).await {
            Ok(file) => {
                self.select(file);
                Ok(true)
            }
            Err(e) => {
                self.picker.reset();
                Err(e)
            }
        }
    }

    /// Replace any current selection.
    pub fn select(&mut self, file: PendingFile) {
        if let Some(previous) = self.selected.replace(file) {
            tracing::debug!(name: "attachment.replaced", previous = %previous.name(), "Replaced pending attachment");
        }
    }

    /// Drop the selection and reset the picker.
    pub fn clear(&mut self) {
        self.selected = None;
        self.picker.reset();
    }

    #[must_use]
    pub fn selected(&self) -> Option<&PendingFile> {
        self.selected.as_ref()
    }

    #[must_use]
    pub fn picker(&self) -> &FilePicker {
        &self.picker
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selected.is_none()
    }
}
