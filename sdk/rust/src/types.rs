use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Kind of disc image being mounted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerKind {
    #[default]
    PlainIso,
    DvdIso,
    BlurayIso,
}

impl ContainerKind {
    /// Whether mounted images of this kind carry a playable stream layout.
    pub fn has_stream_layout(&self) -> bool {
        matches!(self, ContainerKind::DvdIso | ContainerKind::BlurayIso)
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerKind::PlainIso => write!(f, "iso"),
            ContainerKind::DvdIso => write!(f, "dvdiso"),
            ContainerKind::BlurayIso => write!(f, "blurayiso"),
        }
    }
}

impl FromStr for ContainerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "iso" | "plainiso" => Ok(ContainerKind::PlainIso),
            "dvd" | "dvdiso" => Ok(ContainerKind::DvdIso),
            "bluray" | "blurayiso" => Ok(ContainerKind::BlurayIso),
            other => Err(format!("unknown container kind '{}'", other)),
        }
    }
}

/// How the mounted media is reached by a reader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaProtocol {
    #[default]
    File,
}

/// A single mount request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRequest {
    pub source_image_path: PathBuf,
    pub container_kind: ContainerKind,
}

impl MountRequest {
    pub fn new(source_image_path: impl Into<PathBuf>, container_kind: ContainerKind) -> Self {
        Self {
            source_image_path: source_image_path.into(),
            container_kind,
        }
    }

    /// Returns true if the image path carries an `.iso` extension (any case).
    pub fn has_iso_extension(&self) -> bool {
        has_iso_extension(&self.source_image_path)
    }
}

pub(crate) fn has_iso_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("iso"))
        .unwrap_or(false)
}
