use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Media types the staging list accepts. `image/jpg` is what some pickers
/// report for JPEG files.
pub const ACCEPTED_MEDIA_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(pub(super) u64);

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "img-{}", self.0)
    }
}

/// A file picked or dropped by the user that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub path: PathBuf,
    pub name: String,
    pub media_type: String,
    pub size: u64,
}

/// Anything the user offers to the staging list before validation.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub media_type: Option<String>,
}

impl CandidateFile {
    pub fn new(path: impl Into<PathBuf>, size: u64, media_type: Option<&str>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        Self {
            path,
            name,
            size,
            media_type: media_type.map(str::to_string),
        }
    }

    /// Reads size from metadata and sniffs the media type from the content,
    /// falling back to the extension.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let media_type = match infer::get_from_path(path) {
            Ok(Some(kind)) => Some(kind.mime_type().to_string()),
            _ => media_type_from_extension(path).map(str::to_string),
        };

        let mut candidate = Self::new(path, metadata.len(), None);
        candidate.media_type = media_type;
        Ok(candidate)
    }

    pub fn has_accepted_type(&self) -> bool {
        self.media_type
            .as_deref()
            .map(|t| ACCEPTED_MEDIA_TYPES.contains(&t.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }
}

/// Only the accepted image types are recognised; anything else is `None`.
pub fn media_type_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Image content ready to display.
#[derive(Clone, PartialEq, Eq)]
pub struct Preview {
    pub media_type: String,
    pub bytes: Arc<[u8]>,
}

impl Preview {
    pub fn new(media_type: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            media_type: media_type.into(),
            bytes: bytes.into(),
        }
    }
}

impl fmt::Debug for Preview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Preview")
            .field("media_type", &self.media_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    PendingPreview,
    Ready,
}

#[derive(Debug, Clone)]
pub struct StagedImage {
    pub id: ImageId,
    /// Only set for files picked locally; server images have no source.
    pub source: Option<LocalFile>,
    pub name: String,
    pub size: u64,
    pub preview: Option<Preview>,
}

impl StagedImage {
    pub fn is_local(&self) -> bool {
        self.source.is_some()
    }

    pub fn state(&self) -> EntryState {
        if self.preview.is_some() {
            EntryState::Ready
        } else {
            EntryState::PendingPreview
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    UnsupportedType,
    TooLarge,
    Duplicate,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::UnsupportedType | RejectReason::TooLarge => {
                write!(f, "Archivo no válido")
            }
            RejectReason::Duplicate => write!(f, "Ya está cargado"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub name: String,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, Default)]
pub struct AddReport {
    pub accepted: Vec<ImageId>,
    pub rejected: Vec<Rejection>,
}

impl AddReport {
    /// All rejections folded into one line for the user
    pub fn error_message(&self) -> Option<String> {
        if self.rejected.is_empty() {
            return None;
        }
        Some(
            self.rejected
                .iter()
                .map(|r| format!("{}: {}", r.name, r.reason))
                .collect::<Vec<_>>()
                .join(", "),
        )
    }

    pub fn success_message(&self) -> Option<String> {
        if self.accepted.is_empty() {
            return None;
        }
        Some(format!(
            "{} imagen(es) cargada(s) correctamente",
            self.accepted.len()
        ))
    }
}

/// Emitted on every mutation so a renderer can follow the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListChange {
    Added(ImageId),
    PreviewReady(ImageId),
    Removed(ImageId),
    Cleared,
}

/// Identifies one hydration run. Only the latest token may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HydrationToken(pub(super) u64);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HydrationSummary {
    pub loaded: usize,
    pub failed: usize,
}

impl HydrationSummary {
    pub fn message(&self) -> Option<String> {
        if self.loaded == 0 {
            return None;
        }
        Some(format!(
            "{} imagen(es) cargada(s) desde el servidor",
            self.loaded
        ))
    }
}
