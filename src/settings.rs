//! The session's mutable state: photo list, chosen page and template,
//! output destination and caption defaults.

use std::path::PathBuf;

use serde::Deserialize;
use serde::de::{self, Deserializer};

use crate::photo::{Caption, Photo};
use crate::template::PhotoSize;

/// Raster format for exported pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
    Tiff,
}

impl OutputFormat {
    const NAMES: &'static [&'static str] = &["jpeg", "png", "tiff"];

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Tiff => "tif",
        }
    }

    pub fn image_format(&self) -> image::ImageFormat {
        match self {
            Self::Jpeg => image::ImageFormat::Jpeg,
            Self::Png => image::ImageFormat::Png,
            Self::Tiff => image::ImageFormat::Tiff,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let lower = raw.to_ascii_lowercase();
        match lower.as_str() {
            "jpeg" | "jpg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "tiff" | "tif" => Some(Self::Tiff),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for OutputFormat {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).ok_or_else(|| de::Error::unknown_variant(&raw, Self::NAMES))
    }
}

/// What to do when an output file already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictRule {
    /// Replace the existing file.
    Overwrite,
    /// Pick a fresh `_v<k>` suffixed name.
    #[default]
    Rename,
}

impl<'de> Deserialize<'de> for ConflictRule {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        match raw.as_str() {
            "overwrite" => Ok(Self::Overwrite),
            "rename" => Ok(Self::Rename),
            _ => Err(de::Error::unknown_variant(&raw, &["overwrite", "rename"])),
        }
    }
}

/// Whole-session aggregate, owned by the controller (the CLI here).
#[derive(Debug, Clone)]
pub struct Settings {
    pub photos: Vec<Photo>,
    pub page_label: String,
    pub page_w: i32,
    pub page_h: i32,
    pub photo_sizes: Vec<PhotoSize>,
    pub selected_size: usize,
    pub output_dir: PathBuf,
    pub format: OutputFormat,
    pub conflict: ConflictRule,
    /// External editor command to hand the written pages to, if any.
    pub open_in_editor: Option<String>,
    pub crop_disabled: bool,
    /// Caption applied to photos that carry none of their own.
    pub caption_default: Option<Caption>,
}

impl Settings {
    /// The chosen template; an out-of-range index clamps to the last
    /// entry, `None` only when the catalog is empty.
    pub fn selected(&self) -> Option<&PhotoSize> {
        self.photo_sizes
            .get(self.selected_size)
            .or_else(|| self.photo_sizes.last())
    }

    /// Value-copy of everything a preview job needs, so a new request
    /// cannot corrupt one already in flight.
    pub fn preview_snapshot(&self, page_index: usize, max_dim: u32) -> PreviewSnapshot {
        PreviewSnapshot {
            photos: self.photos.clone(),
            size: self
                .selected()
                .cloned()
                .unwrap_or_else(crate::template::fallback_photo_size),
            page_index,
            crop_disabled: self.crop_disabled,
            max_dim,
        }
    }
}

/// Frozen inputs for one preview render.
#[derive(Debug, Clone)]
pub struct PreviewSnapshot {
    pub photos: Vec<Photo>,
    pub size: PhotoSize,
    pub page_index: usize,
    pub crop_disabled: bool,
    /// Longest canvas edge in pixels.
    pub max_dim: u32,
}
