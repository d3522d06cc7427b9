//! Caption text: token substitution, metadata lookup, word wrap and
//! rasterization onto a page.
//!
//! Tokens: `%f` file name, `%c` comment, `%d` date-time, `%t` exposure
//! time, `%i` ISO, `%r` resolution, `%a` aperture, `%l` focal length.

use std::collections::HashMap;
use std::fs;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use ab_glyph::{Font, FontVec, Glyph, PxScale, ScaleFont, point};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use image::{Rgba, RgbaImage};
use tracing::{debug, warn};

use crate::error::Error;
use crate::photo::{Caption, CaptionType, Photo, Rotation};

/// Metadata fields a caption can reference. Missing fields stay empty.
#[derive(Debug, Clone, Default)]
pub struct ItemInfo {
    pub comment: String,
    pub date: Option<DateTime<Local>>,
    pub exposure: String,
    pub iso: String,
    pub resolution: String,
    pub aperture: String,
    pub focal: String,
}

/// Source of per-item metadata. Hosts with an album database supply their
/// own; [`ExifInfoProvider`] reads straight from the file.
pub trait ItemInfoProvider: Send {
    fn item_info(&self, path: &Path) -> ItemInfo;
}

/// Direct-from-file provider backed by EXIF tags, with the file's
/// modification time as the date fallback.
#[derive(Debug, Default)]
pub struct ExifInfoProvider;

impl ItemInfoProvider for ExifInfoProvider {
    fn item_info(&self, path: &Path) -> ItemInfo {
        let mut info = ItemInfo::default();

        if let Ok((w, h)) = image::image_dimensions(path) {
            info.resolution = format!("{w}x{h}");
        }
        if let Ok(meta) = fs::metadata(path)
            && let Ok(mtime) = meta.modified()
        {
            info.date = Some(DateTime::<Local>::from(mtime));
        }

        let Ok(file) = fs::File::open(path) else {
            return info;
        };
        let mut reader = BufReader::new(file);
        let Ok(exif) = exif::Reader::new().read_from_container(&mut reader) else {
            debug!("no EXIF container in {}", path.display());
            return info;
        };

        let field = |tag: exif::Tag| {
            exif.get_field(tag, exif::In::PRIMARY)
                .map(|f| f.display_value().to_string())
        };
        if let Some(v) = field(exif::Tag::ExposureTime) {
            info.exposure = v;
        }
        if let Some(v) = field(exif::Tag::PhotographicSensitivity) {
            info.iso = v;
        }
        if let Some(v) = field(exif::Tag::FNumber) {
            info.aperture = v;
        }
        if let Some(v) = field(exif::Tag::FocalLength) {
            info.focal = v;
        }
        if let Some(v) = field(exif::Tag::ImageDescription) {
            info.comment = v.trim_matches('"').to_string();
        }
        if let Some(raw) = field(exif::Tag::DateTimeOriginal)
            && let Ok(naive) = NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%d %H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(raw.trim(), "%Y:%m:%d %H:%M:%S"))
            && let Some(local) = Local.from_local_datetime(&naive).single()
        {
            info.date = Some(local);
        }
        info
    }
}

/// Expand a caption into its final text for one photo. Each token is
/// substituted once per occurrence; unknown `%x` sequences pass through.
pub fn format_caption(caption: &Caption, photo: &Photo, info: &ItemInfo) -> String {
    let template = match caption.kind {
        CaptionType::None => return String::new(),
        CaptionType::FileNames => "%f",
        CaptionType::ExifDateTime => "%d",
        CaptionType::Comment => "%c",
        CaptionType::Custom => caption.text.as_str(),
    };

    let date = info
        .date
        .map(|d| d.format("%c").to_string())
        .unwrap_or_default();

    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        match chars.peek() {
            Some('f') => {
                out.push_str(&photo.file_name());
                chars.next();
            }
            Some('c') => {
                out.push_str(&info.comment);
                chars.next();
            }
            Some('d') => {
                out.push_str(&date);
                chars.next();
            }
            Some('t') => {
                out.push_str(&info.exposure);
                chars.next();
            }
            Some('i') => {
                out.push_str(&info.iso);
                chars.next();
            }
            Some('r') => {
                out.push_str(&info.resolution);
                chars.next();
            }
            Some('a') => {
                out.push_str(&info.aperture);
                chars.next();
            }
            Some('l') => {
                out.push_str(&info.focal);
                chars.next();
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Load the caption font: a file path, or a family name resolved through
/// the system font database with a sans-serif fallback.
pub fn load_caption_font(family_or_path: &str) -> Result<FontVec, Error> {
    let as_path = Path::new(family_or_path);
    if as_path.is_file() {
        let bytes = fs::read(as_path)?;
        return FontVec::try_from_vec(bytes).map_err(|e| Error::Font(e.to_string()));
    }

    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    let families = [
        fontdb::Family::Name(family_or_path),
        fontdb::Family::SansSerif,
    ];
    let query = fontdb::Query {
        families: &families,
        ..fontdb::Query::default()
    };
    let id = db
        .query(&query)
        .ok_or_else(|| Error::Font(format!("no system font matches {family_or_path:?}")))?;
    let bytes = db
        .with_face_data(id, |data, _index| data.to_vec())
        .ok_or_else(|| Error::Font("font face data unavailable".into()))?;
    FontVec::try_from_vec(bytes).map_err(|e| Error::Font(e.to_string()))
}

/// Per-job cache of caption fonts, keyed by the caption's family name or
/// font-file path. Each name is looked up once; a caption whose own font
/// fails to load falls back to the shared default.
pub struct FontCache {
    default: Option<Arc<FontVec>>,
    loaded: HashMap<String, Option<Arc<FontVec>>>,
    loader: fn(&str) -> Result<FontVec, Error>,
}

impl FontCache {
    pub fn new(default: Option<Arc<FontVec>>) -> Self {
        Self::with_loader(default, load_caption_font)
    }

    fn with_loader(
        default: Option<Arc<FontVec>>,
        loader: fn(&str) -> Result<FontVec, Error>,
    ) -> Self {
        Self {
            default,
            loaded: HashMap::new(),
            loader,
        }
    }

    /// Font for one caption. An empty name means "use the default".
    pub fn get(&mut self, family_or_path: &str) -> Option<Arc<FontVec>> {
        if family_or_path.is_empty() {
            return self.default.clone();
        }
        let loader = self.loader;
        let entry = self
            .loaded
            .entry(family_or_path.to_string())
            .or_insert_with(|| match loader(family_or_path) {
                Ok(font) => Some(Arc::new(font)),
                Err(err) => {
                    warn!("cannot load caption font {family_or_path:?}: {err}");
                    None
                }
            });
        entry.clone().or_else(|| self.default.clone())
    }
}

fn line_width(font: &FontVec, scale: PxScale, text: &str) -> f32 {
    let scaled = font.as_scaled(scale);
    let mut width = 0.0;
    let mut prev: Option<ab_glyph::GlyphId> = None;
    for ch in text.chars() {
        let id = scaled.glyph_id(ch);
        if let Some(p) = prev {
            width += scaled.kern(p, id);
        }
        width += scaled.h_advance(id);
        prev = Some(id);
    }
    width
}

/// Greedy word wrap against a pixel width. Words longer than the line go
/// on a line of their own rather than being split.
pub fn word_wrap(font: &FontVec, scale: PxScale, text: &str, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if current.is_empty() || line_width(font, scale, &candidate) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Where a caption sits inside its slot, keyed by the effective angle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    BottomLeft,
    TopLeft,
    TopRight,
    BottomRight,
}

/// Combine the photo rotation with the EXIF auto-orientation correction.
/// EXIF orientations 5-8 (the 90/270/mirrored-90 family) already imply a
/// quarter turn, so they subtract an extra 90 degrees.
pub fn effective_caption_angle(rotation: Rotation, exif_orientation: u16) -> u32 {
    let exif_deg: i32 = match exif_orientation {
        3 | 4 => 180,
        5 | 6 => 90,
        7 | 8 => 270,
        _ => 0,
    };
    let mut angle = rotation.degrees() as i32 + exif_deg;
    if matches!(exif_orientation, 5..=8) {
        angle -= 90;
    }
    angle.rem_euclid(360) as u32
}

pub fn anchor_for_angle(angle: u32) -> Anchor {
    match angle % 360 {
        90 => Anchor::TopLeft,
        180 => Anchor::TopRight,
        270 => Anchor::BottomRight,
        _ => Anchor::BottomLeft,
    }
}

/// Rasterize wrapped caption lines into a transparent RGBA tile.
pub fn render_caption_tile(
    font: &FontVec,
    scale: PxScale,
    lines: &[String],
    color: [u8; 3],
) -> RgbaImage {
    let scaled = font.as_scaled(scale);
    let line_h = (scaled.ascent() - scaled.descent() + scaled.line_gap()).ceil();
    let width = lines
        .iter()
        .map(|l| line_width(font, scale, l).ceil() as u32)
        .max()
        .unwrap_or(0)
        .max(1);
    let height = ((line_h * lines.len() as f32).ceil() as u32).max(1);
    let mut tile = RgbaImage::new(width, height);

    for (row, line) in lines.iter().enumerate() {
        let baseline = row as f32 * line_h + scaled.ascent();
        let mut caret = 0.0f32;
        let mut prev: Option<ab_glyph::GlyphId> = None;
        for ch in line.chars() {
            let id = scaled.glyph_id(ch);
            if let Some(p) = prev {
                caret += scaled.kern(p, id);
            }
            let glyph: Glyph = id.with_scale_and_position(scale, point(caret, baseline));
            caret += scaled.h_advance(id);
            prev = Some(id);
            if let Some(outlined) = font.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                outlined.draw(|gx, gy, coverage| {
                    let px = bounds.min.x as i32 + gx as i32;
                    let py = bounds.min.y as i32 + gy as i32;
                    if px < 0 || py < 0 || px >= tile.width() as i32 || py >= tile.height() as i32 {
                        return;
                    }
                    let alpha = (coverage * 255.0).round().clamp(0.0, 255.0) as u8;
                    let pixel = tile.get_pixel_mut(px as u32, py as u32);
                    if alpha > pixel[3] {
                        *pixel = Rgba([color[0], color[1], color[2], alpha]);
                    }
                });
            }
        }
    }
    tile
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn photo() -> Photo {
        Photo::new("/albums/holiday/beach.jpg")
    }

    fn info() -> ItemInfo {
        ItemInfo {
            comment: "low tide".into(),
            date: Some(Local.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap()),
            exposure: "1/250 s".into(),
            iso: "100".into(),
            resolution: "6000x4000".into(),
            aperture: "f/8".into(),
            focal: "35 mm".into(),
        }
    }

    fn custom(text: &str) -> Caption {
        Caption {
            kind: CaptionType::Custom,
            font: "Sans".into(),
            size: 10,
            color: [0, 0, 0],
            text: text.into(),
        }
    }

    #[test]
    fn custom_template_substitutes_each_token_once() {
        let out = format_caption(&custom("%f - %d"), &photo(), &info());
        assert!(out.starts_with("beach.jpg - "));
        assert!(!out.contains("%f"));
        assert!(!out.contains("%d"));
        assert!(out.contains("2024"));
    }

    #[test]
    fn unknown_tokens_pass_through() {
        let out = format_caption(&custom("%z 100%"), &photo(), &info());
        assert_eq!(out, "%z 100%");
    }

    #[test]
    fn builtin_kinds_map_to_single_tokens() {
        let mut c = custom("");
        c.kind = CaptionType::FileNames;
        assert_eq!(format_caption(&c, &photo(), &info()), "beach.jpg");
        c.kind = CaptionType::Comment;
        assert_eq!(format_caption(&c, &photo(), &info()), "low tide");
        c.kind = CaptionType::None;
        assert_eq!(format_caption(&c, &photo(), &info()), "");
    }

    #[test]
    fn exif_quarter_turns_subtract_ninety() {
        assert_eq!(effective_caption_angle(Rotation::Deg0, 1), 0);
        assert_eq!(effective_caption_angle(Rotation::Deg0, 6), 0);
        assert_eq!(effective_caption_angle(Rotation::Deg90, 6), 90);
        assert_eq!(effective_caption_angle(Rotation::Deg0, 8), 180);
        assert_eq!(effective_caption_angle(Rotation::Deg0, 3), 180);
    }

    #[test]
    fn anchors_follow_the_effective_angle() {
        assert_eq!(anchor_for_angle(0), Anchor::BottomLeft);
        assert_eq!(anchor_for_angle(90), Anchor::TopLeft);
        assert_eq!(anchor_for_angle(180), Anchor::TopRight);
        assert_eq!(anchor_for_angle(270), Anchor::BottomRight);
    }

    #[test]
    fn font_cache_looks_each_name_up_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        fn failing(_: &str) -> Result<FontVec, Error> {
            CALLS.fetch_add(1, Ordering::SeqCst);
            Err(Error::Font("unavailable".into()))
        }

        let mut cache = FontCache::with_loader(None, failing);
        assert!(cache.get("Serif").is_none());
        assert!(cache.get("Serif").is_none());
        assert!(cache.get("Sans").is_none());
        // One lookup per distinct name, repeats served from the cache.
        assert_eq!(CALLS.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn empty_font_name_means_the_default() {
        fn exploding(_: &str) -> Result<FontVec, Error> {
            unreachable!("empty names never reach the loader")
        }
        let mut cache = FontCache::with_loader(None, exploding);
        assert!(cache.get("").is_none());
    }
}
