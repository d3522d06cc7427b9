//! Page painter: composes one page of photos (and captions) onto an RGBA
//! canvas. The same routine serves previews, file export and any future
//! print backend; only the canvas size and the thumbnail/full-decode
//! choice differ.

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use tracing::warn;

use crate::caption::{
    self, Anchor, FontCache, ItemInfoProvider, anchor_for_angle, effective_caption_angle,
};
use crate::error::Error;
use crate::layout::{Rect, center_offset, fit_scale};
use crate::photo::{CaptionType, CropState, Photo, Rotation};
use crate::template::PhotoSize;
use crate::units::round_half_up;

/// Shared inputs for painting one or more pages.
pub struct PaintContext<'a> {
    pub provider: &'a dyn ItemInfoProvider,
    /// Per-caption font resolution; captions whose font cannot be found
    /// (nor any default) are skipped with a warning.
    pub fonts: FontCache,
    pub crop_disabled: bool,
    /// Compose from cached thumbnails (preview) instead of full decodes.
    pub use_thumbnails: bool,
}

/// Paint the page starting at placement `*current`.
///
/// Consumes up to `photos_per_page` placements and advances `*current`.
/// Returns `true` while more placements remain for subsequent pages,
/// `false` once the last placement has been painted. An empty placement
/// or slot list paints nothing and reports the page sequence finished.
pub fn paint_one_page(
    canvas: &mut RgbaImage,
    photos: &mut [Photo],
    placements: &[usize],
    size: &PhotoSize,
    current: &mut usize,
    ctx: &mut PaintContext<'_>,
) -> Result<bool, Error> {
    if placements.is_empty() || size.photos_per_page() == 0 {
        warn!("nothing to paint: empty photo list or template without photo slots");
        return Ok(false);
    }

    // Blank the page before composition.
    for pixel in canvas.pixels_mut() {
        *pixel = Rgba([0, 0, 0, 0]);
    }

    let page = size.page_rect();
    let scale = fit_scale(canvas.width() as i32, canvas.height() as i32, page.w, page.h);
    let page_px_w = round_half_up(page.w as f64 * scale);
    let page_px_h = round_half_up(page.h as f64 * scale);
    let (off_x, off_y) = center_offset(
        page_px_w,
        page_px_h,
        canvas.width() as i32,
        canvas.height() as i32,
    );

    for slot in size.photo_slots() {
        if *current >= placements.len() {
            break;
        }
        let photo = &mut photos[placements[*current]];
        let dest = Rect::new(
            off_x + round_half_up(slot.x as f64 * scale),
            off_y + round_half_up(slot.y as f64 * scale),
            round_half_up(slot.w as f64 * scale).max(1),
            round_half_up(slot.h as f64 * scale).max(1),
        );
        paint_photo(canvas, photo, &dest, ctx)?;
        *current += 1;
    }

    Ok(*current < placements.len())
}

fn paint_photo(
    canvas: &mut RgbaImage,
    photo: &mut Photo,
    dest: &Rect,
    ctx: &mut PaintContext<'_>,
) -> Result<(), Error> {
    let source: RgbaImage = if ctx.use_thumbnails {
        photo.thumbnail()?.clone()
    } else {
        image::open(&photo.path)?.to_rgba8()
    };

    let rotated = match photo.rotation {
        Rotation::Deg0 => source,
        Rotation::Deg90 => imageops::rotate90(&source),
        Rotation::Deg180 => imageops::rotate180(&source),
        Rotation::Deg270 => imageops::rotate270(&source),
    };

    if ctx.crop_disabled {
        // Letterbox: aspect-contain the whole image centered in the slot.
        let s = fit_scale(dest.w, dest.h, rotated.width() as i32, rotated.height() as i32);
        let w = round_half_up(rotated.width() as f64 * s).max(1) as u32;
        let h = round_half_up(rotated.height() as f64 * s).max(1) as u32;
        let scaled = imageops::resize(&rotated, w, h, FilterType::Triangle);
        let (cx, cy) = center_offset(w as i32, h as i32, dest.w, dest.h);
        imageops::overlay(canvas, &scaled, (dest.x + cx) as i64, (dest.y + cy) as i64);
    } else {
        // Crops are stored in rotated-thumbnail space; remap into the
        // pixel space we are actually compositing from.
        let (thumb_w, thumb_h) = photo.rotated_thumb_size()?;
        let crop = match photo.crop {
            CropState::Resolved(r) => r,
            _ => Rect::new(0, 0, thumb_w as i32, thumb_h as i32),
        };
        let fx = rotated.width() as f64 / thumb_w.max(1) as f64;
        let fy = rotated.height() as f64 / thumb_h.max(1) as f64;
        let x = round_half_up(crop.x as f64 * fx).clamp(0, rotated.width() as i32 - 1);
        let y = round_half_up(crop.y as f64 * fy).clamp(0, rotated.height() as i32 - 1);
        let w = round_half_up(crop.w as f64 * fx).clamp(1, rotated.width() as i32 - x);
        let h = round_half_up(crop.h as f64 * fy).clamp(1, rotated.height() as i32 - y);
        let cropped =
            imageops::crop_imm(&rotated, x as u32, y as u32, w as u32, h as u32).to_image();
        let scaled = imageops::resize(
            &cropped,
            dest.w.max(1) as u32,
            dest.h.max(1) as u32,
            FilterType::Triangle,
        );
        imageops::overlay(canvas, &scaled, dest.x as i64, dest.y as i64);
    }

    if let Some(cap) = photo.caption.clone()
        && cap.kind != CaptionType::None
    {
        match ctx.fonts.get(&cap.font) {
            Some(font) => paint_caption(canvas, photo, &cap, dest, &font, ctx.provider),
            None => warn!(
                "caption requested for {} but neither {:?} nor a default font is available",
                photo.path.display(),
                cap.font
            ),
        }
    }
    Ok(())
}

fn paint_caption(
    canvas: &mut RgbaImage,
    photo: &Photo,
    cap: &crate::photo::Caption,
    dest: &Rect,
    font: &FontVec,
    provider: &dyn ItemInfoProvider,
) {
    let info = provider.item_info(&photo.path);
    let text = caption::format_caption(cap, photo, &info);
    if text.is_empty() {
        return;
    }

    // Glyph height is a fraction of the slot height; the slot is already
    // in page units, so derive pixels from the painted destination.
    let px = (dest.h as f32 * cap.size.clamp(1, 100) as f32 / 100.0).max(4.0);
    let scale = PxScale::from(px);
    let angle = effective_caption_angle(photo.rotation, read_orientation(&photo.path));
    let sideways = angle == 90 || angle == 270;
    let wrap_width = if sideways { dest.h } else { dest.w } as f32;

    let lines = caption::word_wrap(font, scale, &text, wrap_width);
    if lines.is_empty() {
        return;
    }
    let tile = caption::render_caption_tile(font, scale, &lines, cap.color);
    let tile = match angle {
        90 => imageops::rotate90(&tile),
        180 => imageops::rotate180(&tile),
        270 => imageops::rotate270(&tile),
        _ => tile,
    };

    let (tw, th) = (tile.width() as i32, tile.height() as i32);
    let (x, y) = match anchor_for_angle(angle) {
        Anchor::BottomLeft => (dest.x, dest.bottom() - th),
        Anchor::TopLeft => (dest.x, dest.y),
        Anchor::TopRight => (dest.right() - tw, dest.y),
        Anchor::BottomRight => (dest.right() - tw, dest.bottom() - th),
    };
    imageops::overlay(canvas, &tile, x.max(0) as i64, y.max(0) as i64);
}

fn read_orientation(path: &Path) -> u16 {
    let Ok(file) = std::fs::File::open(path) else {
        return 1;
    };
    let mut reader = std::io::BufReader::new(file);
    let Ok(exif) = exif::Reader::new().read_from_container(&mut reader) else {
        return 1;
    };
    exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .map(|v| v as u16)
        .unwrap_or(1)
}
