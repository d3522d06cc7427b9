//! Page template model and the on-disk template catalog.
//!
//! A template descriptor is an XML file with `<paper>` elements carrying
//! `<template>` children; each template lists explicit `<photo>` slot
//! rectangles or a `<photogrid rows= columns=>` shorthand. A sibling
//! `<template-name>.desktop` file may supply a display name.

use std::fs;
use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};
use tracing::{debug, warn};

use crate::error::Error;
use crate::layout::{self, Rect};
use crate::units::{self, Unit};

/// Rendered preview icons are this many pixels tall.
pub const PREVIEW_ICON_HEIGHT: u32 = 80;

/// How far (in tmm) a paper's declared size may deviate from the requested
/// page size and still match.
pub const PAGE_MATCH_TOLERANCE_TMM: i32 = 20;

/// Fallback page synthesized when no template matches: B10, one
/// full-bleed slot.
const FALLBACK_W_TMM: i32 = 320;
const FALLBACK_H_TMM: i32 = 450;

/// One selectable page template.
///
/// Slot 0 is the page-bounds rectangle; slots 1.. are photo placements,
/// assigned to photos strictly in list order, wrapping to a new page every
/// `photos_per_page()` slots.
#[derive(Debug, Clone)]
pub struct PhotoSize {
    pub label: String,
    /// Output DPI hint; 0 means "compute automatically per page".
    pub dpi: u32,
    pub auto_rotate: bool,
    pub slots: Vec<Rect>,
}

impl PhotoSize {
    pub fn photos_per_page(&self) -> usize {
        self.slots.len().saturating_sub(1)
    }

    pub fn page_rect(&self) -> Rect {
        self.slots.first().copied().unwrap_or(Rect::new(0, 0, 1, 1))
    }

    pub fn photo_slots(&self) -> &[Rect] {
        if self.slots.len() > 1 { &self.slots[1..] } else { &[] }
    }

    /// Miniature line drawing of the page with slot outlines, rendered at
    /// a fixed height.
    pub fn preview_icon(&self, height_px: u32) -> RgbaImage {
        let page = self.page_rect();
        let scale = height_px.max(1) as f64 / page.h.max(1) as f64;
        let w = ((page.w as f64 * scale) as u32).max(1);
        let h = height_px.max(1);
        let mut icon = RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255]));
        let border = Rgba([90, 90, 90, 255]);
        stroke_rect(&mut icon, &Rect::new(0, 0, w as i32, h as i32), border);
        for slot in self.photo_slots() {
            stroke_rect(&mut icon, &slot.scaled(scale), Rgba([40, 40, 40, 255]));
        }
        icon
    }
}

fn stroke_rect(canvas: &mut RgbaImage, rect: &Rect, color: Rgba<u8>) {
    let (cw, ch) = (canvas.width() as i32, canvas.height() as i32);
    let left = rect.x.clamp(0, cw - 1);
    let right = (rect.right() - 1).clamp(0, cw - 1);
    let top = rect.y.clamp(0, ch - 1);
    let bottom = (rect.bottom() - 1).clamp(0, ch - 1);
    if left >= right || top >= bottom {
        return;
    }
    for x in left..=right {
        canvas.put_pixel(x as u32, top as u32, color);
        canvas.put_pixel(x as u32, bottom as u32, color);
    }
    for y in top..=bottom {
        canvas.put_pixel(left as u32, y as u32, color);
        canvas.put_pixel(right as u32, y as u32, color);
    }
}

/// Build the catalog of selectable templates for one page size.
///
/// Parse failures are warnings: the offending paper or template is skipped
/// and parsing continues. An empty result synthesizes the fallback page so
/// callers never observe an empty catalog.
pub fn build_catalog(dirs: &[PathBuf], page_w: i32, page_h: i32) -> Vec<PhotoSize> {
    let mut catalog = Vec::new();

    let mut files: Vec<PathBuf> = Vec::new();
    for dir in dirs {
        let entries = match fs::read_dir(dir) {
            Ok(e) => e,
            Err(err) => {
                debug!("skipping template dir {}: {err}", dir.display());
                continue;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("xml") {
                files.push(path);
            }
        }
    }
    files.sort();

    for file in &files {
        if let Err(err) = parse_template_file(file, page_w, page_h, &mut catalog) {
            warn!("skipping template file {}: {err}", file.display());
        }
    }

    if catalog.is_empty() {
        warn!("no templates matched the requested page; falling back to a single full-bleed B10 page");
        catalog.push(fallback_photo_size());
    }
    catalog
}

pub fn fallback_photo_size() -> PhotoSize {
    PhotoSize {
        label: "B10 (32x45mm)".into(),
        dpi: 0,
        auto_rotate: true,
        slots: vec![
            Rect::new(0, 0, FALLBACK_W_TMM, FALLBACK_H_TMM),
            Rect::new(0, 0, FALLBACK_W_TMM, FALLBACK_H_TMM),
        ],
    }
}

fn parse_template_file(
    path: &Path,
    page_w: i32,
    page_h: i32,
    out: &mut Vec<PhotoSize>,
) -> Result<(), Error> {
    let text = fs::read_to_string(path)?;
    let doc = roxmltree::Document::parse(&text).map_err(|e| Error::TemplateParse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    for paper in doc
        .root_element()
        .children()
        .filter(|n| n.has_tag_name("paper"))
    {
        let unit = match Unit::parse(paper.attribute("unit").unwrap_or("mm")) {
            Ok(u) => u,
            Err(err) => {
                warn!(
                    "paper {:?} in {}: {err}",
                    paper.attribute("name").unwrap_or("?"),
                    path.display()
                );
                continue;
            }
        };

        let declared_w = units::to_tmm(attr_f64(&paper, "width"), unit);
        let declared_h = units::to_tmm(attr_f64(&paper, "height"), unit);

        // Zero-size papers inherit the requested page.
        let (paper_w, paper_h) = if declared_w == 0 || declared_h == 0 {
            (page_w, page_h)
        } else {
            (declared_w, declared_h)
        };

        if !size_matches(paper_w, paper_h, page_w, page_h) {
            debug!(
                "paper {:?} ({paper_w}x{paper_h} tmm) does not match requested page ({page_w}x{page_h} tmm)",
                paper.attribute("name").unwrap_or("?")
            );
            continue;
        }

        // Template coordinates are declared against the paper size; map
        // them onto the requested page.
        let sx = page_w as f64 / paper_w as f64;
        let sy = page_h as f64 / paper_h as f64;
        let page = Rect::new(0, 0, page_w, page_h);

        for tpl in paper.children().filter(|n| n.has_tag_name("template")) {
            let name = tpl.attribute("name").unwrap_or("untitled").to_string();
            let dpi = tpl
                .attribute("dpi")
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(0);
            let auto_rotate = tpl.attribute("autorotate") == Some("true");

            let mut slots = vec![page];
            let mut ok = true;
            for child in tpl.children().filter(|n| n.is_element()) {
                if child.has_tag_name("photo") {
                    let slot = Rect::new(
                        units::to_tmm(attr_f64(&child, "x") * sx, unit),
                        units::to_tmm(attr_f64(&child, "y") * sy, unit),
                        units::to_tmm(attr_f64(&child, "width") * sx, unit),
                        units::to_tmm(attr_f64(&child, "height") * sy, unit),
                    );
                    if !page_contains(&page, &slot) {
                        warn!("template {name:?}: slot outside the page, template skipped");
                        ok = false;
                        break;
                    }
                    slots.push(slot);
                } else if child.has_tag_name("photogrid") {
                    let rows = child
                        .attribute("rows")
                        .and_then(|v| v.parse::<u32>().ok())
                        .unwrap_or(0);
                    let columns = child
                        .attribute("columns")
                        .and_then(|v| v.parse::<u32>().ok())
                        .unwrap_or(0);
                    match layout::create_photo_grid(page_w, page_h, rows, columns) {
                        Ok(cells) => slots.extend(cells),
                        Err(err) => {
                            warn!("template {name:?}: {err}, template skipped");
                            ok = false;
                            break;
                        }
                    }
                }
            }

            if !ok || slots.len() < 2 {
                if ok {
                    warn!("template {name:?} declares no photo slots, skipped");
                }
                continue;
            }

            out.push(PhotoSize {
                label: desktop_display_name(path, &name).unwrap_or(name),
                dpi,
                auto_rotate,
                slots,
            });
        }
    }
    Ok(())
}

fn attr_f64(node: &roxmltree::Node<'_, '_>, name: &str) -> f64 {
    node.attribute(name)
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(0.0)
}

fn size_matches(paper_w: i32, paper_h: i32, page_w: i32, page_h: i32) -> bool {
    let close = |a: i32, b: i32| (a - b).abs() <= PAGE_MATCH_TOLERANCE_TMM;
    (close(paper_w, page_w) && close(paper_h, page_h))
        || (close(paper_w, page_h) && close(paper_h, page_w))
}

fn page_contains(page: &Rect, slot: &Rect) -> bool {
    // Allow the same rounding slack as the paper match.
    let grown = Rect::new(
        page.x - PAGE_MATCH_TOLERANCE_TMM,
        page.y - PAGE_MATCH_TOLERANCE_TMM,
        page.w + 2 * PAGE_MATCH_TOLERANCE_TMM,
        page.h + 2 * PAGE_MATCH_TOLERANCE_TMM,
    );
    grown.contains(slot)
}

/// Look for `<template-name>.desktop` next to the descriptor and read its
/// `Name=` entry.
fn desktop_display_name(xml_path: &Path, template_name: &str) -> Option<String> {
    let desktop = xml_path.with_file_name(format!("{template_name}.desktop"));
    let text = fs::read_to_string(desktop).ok()?;
    text.lines()
        .find_map(|line| line.strip_prefix("Name="))
        .map(|s| s.trim().to_string())
}

/// Synthesize a one-off R x C grid template for the current page.
pub fn custom_grid(page_w: i32, page_h: i32, rows: u32, columns: u32) -> Result<PhotoSize, Error> {
    let cells = layout::create_photo_grid(page_w, page_h, rows, columns)?;
    let mut slots = vec![Rect::new(0, 0, page_w, page_h)];
    slots.extend(cells);
    Ok(PhotoSize {
        label: format!("Custom {rows}x{columns}"),
        dpi: 0,
        auto_rotate: false,
        slots,
    })
}

/// Synthesize a "fit as many as possible" template for a fixed photo size
/// given in tmm.
pub fn custom_fit(
    page_w: i32,
    page_h: i32,
    photo_w: i32,
    photo_h: i32,
) -> Result<PhotoSize, Error> {
    let cells = layout::fit_as_many(page_w, page_h, photo_w, photo_h)?;
    let mut slots = vec![Rect::new(0, 0, page_w, page_h)];
    slots.extend(cells);
    Ok(PhotoSize {
        label: format!("Custom fit {}x{}mm", photo_w / 10, photo_h / 10),
        dpi: 0,
        auto_rotate: false,
        slots,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_is_full_bleed() {
        let ps = fallback_photo_size();
        assert_eq!(ps.photos_per_page(), 1);
        assert_eq!(ps.page_rect(), ps.photo_slots()[0]);
    }

    #[test]
    fn preview_icon_has_requested_height() {
        let ps = custom_grid(2100, 2970, 2, 2).unwrap();
        let icon = ps.preview_icon(PREVIEW_ICON_HEIGHT);
        assert_eq!(icon.height(), PREVIEW_ICON_HEIGHT);
        assert!(icon.width() > 0);
    }

    #[test]
    fn size_match_tolerates_rotation_and_rounding() {
        assert!(size_matches(2100, 2970, 2970, 2100));
        assert!(size_matches(2100, 2970, 2110, 2965));
        assert!(!size_matches(2100, 2970, 1480, 2100));
    }
}
