//! Photo model: one entry per source image, with copy count, rotation,
//! crop state and an optional caption descriptor.

use std::fmt;
use std::path::PathBuf;

use image::RgbaImage;
use image::imageops::FilterType;
use serde::Deserialize;
use serde::de::{self, Deserializer};

use crate::error::Error;
use crate::layout::Rect;

/// Longest edge of the cached preview thumbnail.
pub const THUMBNAIL_DIM: u32 = 256;

/// Quarter-turn rotation applied to a photo before placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn degrees(self) -> u32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    pub fn from_degrees(deg: u32) -> Option<Self> {
        match deg % 360 {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }

    /// One more quarter turn clockwise.
    pub fn quarter_turn(self) -> Self {
        match self {
            Rotation::Deg0 => Rotation::Deg90,
            Rotation::Deg90 => Rotation::Deg180,
            Rotation::Deg180 => Rotation::Deg270,
            Rotation::Deg270 => Rotation::Deg0,
        }
    }

    /// Whether width and height trade places under this rotation.
    pub fn swaps_axes(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

/// Crop resolution state. Replaces the sentinel rectangles of older
/// layout engines with an explicit three-state flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CropState {
    /// Never computed; the resolver may also auto-rotate.
    #[default]
    Unset,
    /// Must be recomputed, but rotation was already decided by the caller.
    NeedsRecompute,
    /// Crop rectangle in rotated-thumbnail pixel space.
    Resolved(Rect),
}

/// What a photo's caption shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptionType {
    #[default]
    None,
    FileNames,
    ExifDateTime,
    Comment,
    Custom,
}

impl CaptionType {
    const ALL: &'static [Self] = &[
        Self::None,
        Self::FileNames,
        Self::ExifDateTime,
        Self::Comment,
        Self::Custom,
    ];
    const NAMES: &'static [&'static str] = &["none", "file-names", "date-time", "comment", "custom"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::FileNames => "file-names",
            Self::ExifDateTime => "date-time",
            Self::Comment => "comment",
            Self::Custom => "custom",
        }
    }

    /// Numeric code used by the session document.
    pub fn code(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::FileNames => 1,
            Self::ExifDateTime => 2,
            Self::Comment => 3,
            Self::Custom => 4,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }
}

impl fmt::Display for CaptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CaptionType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        for kind in Self::ALL {
            if raw == kind.as_str() {
                return Ok(*kind);
            }
        }
        Err(de::Error::unknown_variant(&raw, Self::NAMES))
    }
}

/// Caption descriptor attached to a photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caption {
    pub kind: CaptionType,
    /// Font family name or a path to a font file.
    pub font: String,
    /// Glyph height as a percentage of the slot height.
    pub size: u32,
    pub color: [u8; 3],
    /// Free-text template, used when `kind` is `Custom`.
    pub text: String,
}

impl Caption {
    pub fn color_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.color[0], self.color[1], self.color[2])
    }

    pub fn parse_color(raw: &str) -> Option<[u8; 3]> {
        let hex = raw.strip_prefix('#')?;
        if hex.len() != 6 {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some([r, g, b])
    }
}

/// One source image in the print job.
///
/// Multiplicity is a copy count on the entry, not duplicated objects;
/// [`placements`] expands the list into the ordered placement sequence.
#[derive(Debug, Clone)]
pub struct Photo {
    pub path: PathBuf,
    pub copies: u32,
    pub rotation: Rotation,
    pub crop: CropState,
    pub caption: Option<Caption>,
    thumbnail: Option<RgbaImage>,
    natural_size: Option<(u32, u32)>,
}

impl Photo {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            copies: 1,
            rotation: Rotation::Deg0,
            crop: CropState::Unset,
            caption: None,
            thumbnail: None,
            natural_size: None,
        }
    }

    /// Full file name including the extension, as the `%f` caption token
    /// shows it.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned()
    }

    /// Natural (unrotated) pixel size, probed from the file header once.
    pub fn natural_size(&mut self) -> Result<(u32, u32), Error> {
        if let Some(sz) = self.natural_size {
            return Ok(sz);
        }
        let sz = image::image_dimensions(&self.path)?;
        self.natural_size = Some(sz);
        Ok(sz)
    }

    /// Cached preview thumbnail; decoded and downscaled on first use,
    /// never invalidated once set.
    pub fn thumbnail(&mut self) -> Result<&RgbaImage, Error> {
        if self.thumbnail.is_none() {
            let img = image::open(&self.path)?.to_rgba8();
            self.natural_size = Some(img.dimensions());
            let (w, h) = img.dimensions();
            let thumb = if w.max(h) > THUMBNAIL_DIM {
                let scale = THUMBNAIL_DIM as f64 / w.max(h) as f64;
                image::imageops::resize(
                    &img,
                    ((w as f64 * scale) as u32).max(1),
                    ((h as f64 * scale) as u32).max(1),
                    FilterType::Triangle,
                )
            } else {
                img
            };
            self.thumbnail = Some(thumb);
        }
        Ok(self.thumbnail.as_ref().unwrap())
    }

    /// Install an externally produced thumbnail (hosts with their own
    /// preview cache, tests). A later `thumbnail()` call returns this.
    pub fn set_thumbnail(&mut self, img: RgbaImage) {
        self.natural_size.get_or_insert(img.dimensions());
        self.thumbnail = Some(img);
    }

    /// Thumbnail size after applying the current rotation.
    pub fn rotated_thumb_size(&mut self) -> Result<(u32, u32), Error> {
        let rot = self.rotation;
        let (w, h) = self.thumbnail()?.dimensions();
        Ok(if rot.swaps_axes() { (h, w) } else { (w, h) })
    }

    /// Natural size after applying the current rotation.
    pub fn rotated_natural_size(&mut self) -> Result<(u32, u32), Error> {
        let (w, h) = self.natural_size()?;
        Ok(if self.rotation.swaps_axes() { (h, w) } else { (w, h) })
    }
}

/// Expand the photo list into the ordered placement sequence: each index
/// appears `copies` times, list order preserved.
pub fn placements(photos: &[Photo]) -> Vec<usize> {
    let mut out = Vec::new();
    for (idx, photo) in photos.iter().enumerate() {
        for _ in 0..photo.copies.max(1) {
            out.push(idx);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placements_expand_copies_in_order() {
        let mut a = Photo::new("a.jpg");
        a.copies = 2;
        let b = Photo::new("b.jpg");
        let mut c = Photo::new("c.jpg");
        c.copies = 3;
        assert_eq!(placements(&[a, b, c]), vec![0, 0, 1, 2, 2, 2]);
    }

    #[test]
    fn caption_color_round_trips() {
        let c = Caption {
            kind: CaptionType::Custom,
            font: "Sans".into(),
            size: 10,
            color: [18, 52, 86],
            text: "%f".into(),
        };
        assert_eq!(Caption::parse_color(&c.color_hex()), Some([18, 52, 86]));
        assert_eq!(Caption::parse_color("not-a-color"), None);
    }

    #[test]
    fn rotation_axis_swap() {
        assert!(Rotation::Deg90.swaps_axes());
        assert!(!Rotation::Deg180.swaps_axes());
        assert_eq!(Rotation::Deg270.quarter_turn(), Rotation::Deg0);
        assert_eq!(Rotation::from_degrees(450), Some(Rotation::Deg90));
        assert_eq!(Rotation::from_degrees(45), None);
    }
}
