//! Rectangle math and layout synthesis for page templates.

use crate::error::Error;
use crate::units::round_half_up;

/// A plain rectangle, in template (tmm) or pixel space depending on context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> i32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.h
    }

    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn is_portrait(&self) -> bool {
        self.h > self.w
    }

    /// Scale all four coordinates by `factor`, rounding half away from zero.
    pub fn scaled(&self, factor: f64) -> Rect {
        Rect::new(
            round_half_up(self.x as f64 * factor),
            round_half_up(self.y as f64 * factor),
            round_half_up(self.w as f64 * factor),
            round_half_up(self.h as f64 * factor),
        )
    }
}

/// Scale factor that fits `src` inside `avail` preserving aspect ratio:
/// whichever axis binds wins.
pub fn fit_scale(avail_w: i32, avail_h: i32, src_w: i32, src_h: i32) -> f64 {
    let sw = src_w.max(1) as f64;
    let sh = src_h.max(1) as f64;
    (avail_w as f64 / sw).min(avail_h as f64 / sh)
}

/// Offset that centers an `inner` box inside an `outer` box.
pub fn center_offset(inner_w: i32, inner_h: i32, outer_w: i32, outer_h: i32) -> (i32, i32) {
    (((outer_w - inner_w) / 2).max(0), ((outer_h - inner_h) / 2).max(0))
}

/// Fill an R x C array of equal-size photo cells onto a page.
///
/// The margin is 4% of the average page dimension, the gap between cells a
/// quarter of the margin; cells are laid out left-to-right, top-to-bottom
/// and never exceed the printable area.
pub fn create_photo_grid(
    page_w: i32,
    page_h: i32,
    rows: u32,
    columns: u32,
) -> Result<Vec<Rect>, Error> {
    if rows == 0 || columns == 0 {
        return Err(Error::CustomLayout(
            "grid needs at least one row and one column".into(),
        ));
    }
    if page_w <= 0 || page_h <= 0 {
        return Err(Error::CustomLayout("page has no printable area".into()));
    }

    let margin = round_half_up((page_w + page_h) as f64 / 2.0 * 0.04);
    let gap = margin / 4;
    let cols = columns as i32;
    let rows = rows as i32;
    let cell_w = (page_w - 2 * margin - (cols - 1) * gap) / cols;
    let cell_h = (page_h - 2 * margin - (rows - 1) * gap) / rows;
    if cell_w <= 0 || cell_h <= 0 {
        return Err(Error::CustomLayout(format!(
            "a {rows}x{cols} grid leaves no room for photos on a {page_w}x{page_h} page"
        )));
    }

    let mut cells = Vec::with_capacity((rows * cols) as usize);
    let mut y = margin;
    for _ in 0..rows {
        let mut x = margin;
        for _ in 0..cols {
            cells.push(Rect::new(x, y, cell_w, cell_h));
            x += cell_w + gap;
        }
        y += cell_h + gap;
    }
    Ok(cells)
}

/// Place as many `photo_w` x `photo_h` cells on the page as fit whole.
///
/// Leftover space on each axis becomes equal gaps before/between/after the
/// cells. When a dimension divides the page exactly we drop one cell on
/// that axis so neighbouring photos never touch.
pub fn fit_as_many(
    page_w: i32,
    page_h: i32,
    photo_w: i32,
    photo_h: i32,
) -> Result<Vec<Rect>, Error> {
    if photo_w <= 0 || photo_h <= 0 {
        return Err(Error::CustomLayout("photo size must be positive".into()));
    }

    let mut nx = page_w / photo_w;
    let mut ny = page_h / photo_h;
    if nx < 1 || ny < 1 {
        return Err(Error::CustomLayout(format!(
            "a {photo_w}x{photo_h} photo does not fit on a {page_w}x{page_h} page"
        )));
    }

    let mut spare_x = page_w - nx * photo_w;
    if spare_x == 0 && nx > 1 {
        nx -= 1;
        spare_x = photo_w;
    }
    let mut spare_y = page_h - ny * photo_h;
    if spare_y == 0 && ny > 1 {
        ny -= 1;
        spare_y = photo_h;
    }

    let gap_x = spare_x / (nx + 1);
    let gap_y = spare_y / (ny + 1);

    let mut cells = Vec::with_capacity((nx * ny) as usize);
    for r in 0..ny {
        for c in 0..nx {
            cells.push(Rect::new(
                gap_x + c * (photo_w + gap_x),
                gap_y + r * (photo_h + gap_y),
                photo_w,
                photo_h,
            ));
        }
    }
    Ok(cells)
}
