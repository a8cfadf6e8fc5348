//! Artifact discovery and packaging.

pub mod package;
pub mod resolve;

pub use package::{cleanup_outputs, package};
pub use resolve::resolve;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

pub const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "webp", "bmp"];
pub const VIDEO_EXTENSIONS: [&str; 3] = ["mp4", "webm", "gif"];

/// Coarse media classification, derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Image,
    Video,
    Other,
}

impl ArtifactKind {
    pub fn from_filename(filename: &str) -> Self {
        match extension_of(filename) {
            Some(ext) if IMAGE_EXTENSIONS.contains(&ext.as_str()) => Self::Image,
            Some(ext) if VIDEO_EXTENSIONS.contains(&ext.as_str()) => Self::Video,
            _ => Self::Other,
        }
    }
}

pub(crate) fn extension_of(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Identifies one produced file, not its bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    pub kind: ArtifactKind,
    #[serde(default)]
    pub subfolder: String,
    pub filename: String,
    #[serde(default)]
    pub format: Option<String>,
}

impl ArtifactDescriptor {
    pub fn new(
        filename: impl Into<String>,
        subfolder: impl Into<String>,
        format: Option<String>,
    ) -> Self {
        let filename = filename.into();
        let kind = ArtifactKind::from_filename(&filename);
        let format = format.or_else(|| extension_of(&filename));
        Self {
            kind,
            subfolder: subfolder.into(),
            filename,
            format,
        }
    }

    /// Location relative to the output root.
    pub fn relative_path(&self) -> Utf8PathBuf {
        if self.subfolder.is_empty() {
            Utf8PathBuf::from(&self.filename)
        } else {
            Utf8PathBuf::from(&self.subfolder).join(&self.filename)
        }
    }
}

/// How an artifact's bytes travel back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    Inline,
    Reference,
}

/// The externally returned representation of one artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedArtifact {
    pub filename: String,
    pub kind: ArtifactKind,
    pub encoding: Encoding,
    /// Base64 bytes for `inline`, the storage URL for `reference`.
    pub payload: String,
}
