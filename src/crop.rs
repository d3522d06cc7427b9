//! Per-photo crop and rotation resolution.
//!
//! For a given photo and a target slot the resolver decides the photo's
//! rotation and a centered, aspect-matched crop rectangle. Crops are kept
//! in rotated-thumbnail pixel space; the painter remaps them into whichever
//! pixel space (thumbnail or full decode) it is compositing from.

use crate::error::Error;
use crate::layout::Rect;
use crate::photo::{CropState, Photo, Rotation};
use crate::units::round_half_up;

/// Resolve `photo`'s crop region for a `slot_w` x `slot_h` slot.
///
/// - `Unset` with `auto_rotate`: rotate a quarter turn when the slot's
///   orientation disagrees with the photo's natural orientation, then
///   compute the crop.
/// - `NeedsRecompute`: compute the crop only; rotation was already set by
///   the caller (an explicit user rotate, a reloaded session).
/// - `Resolved`: recompute from the current rotation. Same inputs produce
///   the same rectangle, so repeated calls are idempotent.
///
/// Returns the rotation in effect so the caller can paint with the same
/// transform.
pub fn update_crop_region(
    photo: &mut Photo,
    slot_w: i32,
    slot_h: i32,
    auto_rotate: bool,
) -> Result<Rotation, Error> {
    if slot_w <= 0 || slot_h <= 0 {
        return Err(Error::CustomLayout("slot has no area".into()));
    }

    if matches!(photo.crop, CropState::Unset) && auto_rotate {
        let (tw, th) = photo.thumbnail()?.dimensions();
        let slot_portrait = slot_h > slot_w;
        let photo_portrait = th > tw;
        if slot_portrait != photo_portrait {
            photo.rotation = photo.rotation.quarter_turn();
        }
    }

    let (avail_w, avail_h) = photo.rotated_thumb_size()?;
    let rect = max_centered_crop(avail_w, avail_h, slot_w, slot_h);
    photo.crop = CropState::Resolved(rect);
    Ok(photo.rotation)
}

/// Largest rectangle with the slot's aspect ratio centered inside an
/// `avail_w` x `avail_h` box.
pub fn max_centered_crop(avail_w: u32, avail_h: u32, slot_w: i32, slot_h: i32) -> Rect {
    let aw = avail_w.max(1) as f64;
    let ah = avail_h.max(1) as f64;
    let scale = (aw / slot_w as f64).min(ah / slot_h as f64);
    let w = round_half_up(slot_w as f64 * scale).clamp(1, avail_w as i32);
    let h = round_half_up(slot_h as f64 * scale).clamp(1, avail_h as i32);
    let x = round_half_up((aw - w as f64) / 2.0);
    let y = round_half_up((ah - h as f64) / 2.0);
    Rect::new(x, y, w, h)
}
