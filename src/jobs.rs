//! Background print jobs: crop preparation, preview rendering and page
//! export, executed one at a time on a dedicated worker thread.
//!
//! The controller submits jobs over a FIFO channel and reads results from
//! the event channel; crop preparation therefore always happens-before the
//! paint pass that consumes it. Cancellation is a cooperative flag checked
//! once per photo or page iteration.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use ab_glyph::FontVec;
use crossbeam_channel::{Receiver, Sender, unbounded};
use image::{RgbImage, RgbaImage};
use tracing::{debug, info, warn};

use crate::caption::{ExifInfoProvider, FontCache};
use crate::crop::update_crop_region;
use crate::error::Error;
use crate::events::{Event, Severity};
use crate::painter::{PaintContext, paint_one_page};
use crate::photo::{Photo, placements};
use crate::settings::{ConflictRule, OutputFormat, PreviewSnapshot};
use crate::template::PhotoSize;
use crate::units::{tmm_to_inches, tmm_to_px};

/// Fallback output resolution when auto-DPI has nothing to measure.
const DEFAULT_DPI: f64 = 300.0;

/// Crop/rotation pre-resolution for every photo in the list.
#[derive(Debug)]
pub struct PrepareSpec {
    pub photos: Vec<Photo>,
    pub size: PhotoSize,
    pub auto_rotate: bool,
}

/// Paginate the whole photo list into raster page files.
#[derive(Debug)]
pub struct ExportSpec {
    pub photos: Vec<Photo>,
    pub size: PhotoSize,
    pub dir: PathBuf,
    pub format: OutputFormat,
    pub conflict: ConflictRule,
    pub crop_disabled: bool,
    /// Hand the written files to this external editor command afterwards.
    pub editor: Option<String>,
}

/// One unit of work for the worker thread.
#[derive(Debug)]
pub enum Job {
    Prepare(PrepareSpec),
    Preview(PreviewSnapshot),
    Export(ExportSpec),
}

/// Handle to the dedicated worker thread. Exactly one job runs at a time;
/// submissions queue in FIFO order.
pub struct PrintWorker {
    jobs: Option<Sender<Job>>,
    pub events: Receiver<Event>,
    cancel: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl PrintWorker {
    /// Spawn the worker. `font` is shared with every caption paint; jobs
    /// that need captions warn and skip them when it is `None`.
    pub fn spawn(font: Option<Arc<FontVec>>) -> Self {
        let (job_tx, job_rx) = unbounded::<Job>();
        let (event_tx, event_rx) = unbounded::<Event>();
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);
        let handle = thread::spawn(move || run_worker(job_rx, event_tx, flag, font));
        Self {
            jobs: Some(job_tx),
            events: event_rx,
            cancel,
            handle: Some(handle),
        }
    }

    pub fn submit(&self, job: Job) {
        if let Some(tx) = &self.jobs
            && tx.send(job).is_err()
        {
            warn!("print worker is gone; job dropped");
        }
    }

    /// Request cancellation of the in-flight job. Takes effect at the next
    /// photo/page checkpoint.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Clear the cancel flag before submitting the next job.
    pub fn reset_cancel(&self) {
        self.cancel.store(false, Ordering::Relaxed);
    }

    /// Drop the job queue and wait for the worker to drain and exit.
    pub fn shutdown(mut self) {
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_worker(
    jobs: Receiver<Job>,
    events: Sender<Event>,
    cancel: Arc<AtomicBool>,
    font: Option<Arc<FontVec>>,
) {
    let provider = ExifInfoProvider;
    while let Ok(job) = jobs.recv() {
        let completed = match job {
            Job::Prepare(spec) => run_prepare(spec, &events, &cancel),
            Job::Preview(snapshot) => run_preview(snapshot, &events, &cancel, &provider, &font),
            Job::Export(spec) => run_export(spec, &events, &cancel, &provider, &font),
        };
        let _ = events.send(Event::Finished { completed });
    }
    debug!("print worker exiting");
}

fn log(events: &Sender<Event>, severity: Severity, message: String) {
    let _ = events.send(Event::Log { severity, message });
}

fn run_prepare(mut spec: PrepareSpec, events: &Sender<Event>, cancel: &AtomicBool) -> bool {
    let total = spec.photos.len();
    let order = placements(&spec.photos);
    let slots = spec.size.photo_slots().to_vec();
    if slots.is_empty() {
        log(
            events,
            Severity::Warning,
            "template has no photo slots; nothing to prepare".into(),
        );
        let _ = events.send(Event::Prepared(spec.photos));
        return true;
    }

    for (idx, photo) in spec.photos.iter_mut().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            log(events, Severity::Warning, "print preparation canceled".into());
            return false;
        }
        // Resolve against the slot this photo's first placement lands in.
        let slot = order
            .iter()
            .position(|&p| p == idx)
            .map(|pos| slots[pos % slots.len()])
            .unwrap_or(slots[0]);
        match update_crop_region(photo, slot.w, slot.h, spec.auto_rotate && spec.size.auto_rotate)
        {
            Ok(rot) => debug!(
                "prepared {} (rotation {} deg)",
                photo.path.display(),
                rot.degrees()
            ),
            Err(err) => {
                log(
                    events,
                    Severity::Error,
                    format!("cannot prepare {}: {err}", photo.path.display()),
                );
                return false;
            }
        }
        let _ = events.send(Event::Progress {
            done: idx + 1,
            total,
        });
    }

    log(events, Severity::Info, "print preparation complete".into());
    let _ = events.send(Event::Prepared(spec.photos));
    true
}

fn run_preview(
    mut snapshot: PreviewSnapshot,
    events: &Sender<Event>,
    cancel: &AtomicBool,
    provider: &ExifInfoProvider,
    font: &Option<Arc<FontVec>>,
) -> bool {
    if cancel.load(Ordering::Relaxed) {
        log(events, Severity::Warning, "preview canceled".into());
        return false;
    }

    let page = snapshot.size.page_rect();
    let max_dim = snapshot.max_dim.max(16);
    let (w, h) = if page.w >= page.h {
        let h = (max_dim as f64 * page.h as f64 / page.w.max(1) as f64).round() as u32;
        (max_dim, h.max(1))
    } else {
        let w = (max_dim as f64 * page.w as f64 / page.h.max(1) as f64).round() as u32;
        (w.max(1), max_dim)
    };
    let mut canvas = RgbaImage::new(w, h);

    let order = placements(&snapshot.photos);
    let per_page = snapshot.size.photos_per_page().max(1);
    let mut current = (snapshot.page_index * per_page).min(order.len());
    let mut ctx = PaintContext {
        provider,
        fonts: FontCache::new(font.clone()),
        crop_disabled: snapshot.crop_disabled,
        use_thumbnails: true,
    };
    match paint_one_page(
        &mut canvas,
        &mut snapshot.photos,
        &order,
        &snapshot.size,
        &mut current,
        &mut ctx,
    ) {
        Ok(_) => {
            let _ = events.send(Event::PreviewReady(canvas));
            true
        }
        Err(err) => {
            log(events, Severity::Error, format!("preview failed: {err}"));
            false
        }
    }
}

fn run_export(
    mut spec: ExportSpec,
    events: &Sender<Event>,
    cancel: &AtomicBool,
    provider: &ExifInfoProvider,
    font: &Option<Arc<FontVec>>,
) -> bool {
    if let Err(err) = std::fs::create_dir_all(&spec.dir) {
        log(
            events,
            Severity::Error,
            format!("cannot create {}: {err}", spec.dir.display()),
        );
        return false;
    }

    let order = placements(&spec.photos);
    let per_page = spec.size.photos_per_page();
    if order.is_empty() || per_page == 0 {
        log(
            events,
            Severity::Warning,
            "nothing to export: empty photo list or template without slots".into(),
        );
        return true;
    }
    let total_pages = order.len().div_ceil(per_page);

    let mut written: Vec<PathBuf> = Vec::new();
    let mut current = 0usize;
    let mut page_no = 0usize;
    let mut ctx = PaintContext {
        provider,
        fonts: FontCache::new(font.clone()),
        crop_disabled: spec.crop_disabled,
        use_thumbnails: false,
    };
    loop {
        if cancel.load(Ordering::Relaxed) {
            log(events, Severity::Warning, "export canceled".into());
            return false;
        }

        let dpi = if spec.size.dpi > 0 {
            spec.size.dpi as f64
        } else {
            match page_auto_dpi(&mut spec.photos, &order, current, &spec.size) {
                Ok(dpi) => dpi,
                Err(err) => {
                    log(events, Severity::Error, format!("auto DPI failed: {err}"));
                    return false;
                }
            }
        };
        let page = spec.size.page_rect();
        let mut canvas = RgbaImage::new(tmm_to_px(page.w, dpi), tmm_to_px(page.h, dpi));

        let more = match paint_one_page(
            &mut canvas,
            &mut spec.photos,
            &order,
            &spec.size,
            &mut current,
            &mut ctx,
        ) {
            Ok(more) => more,
            Err(err) => {
                log(events, Severity::Error, format!("page paint failed: {err}"));
                return false;
            }
        };

        let path = unique_output_path(&spec.dir, page_no + 1, spec.format, spec.conflict);
        if let Err(err) = save_page(&canvas, &path, spec.format) {
            // Pages already written stay in place; remaining pages abort.
            log(
                events,
                Severity::Error,
                format!("cannot write {}: {err}", path.display()),
            );
            return false;
        }
        info!("wrote {} at {:.0} dpi", path.display(), dpi);
        let _ = events.send(Event::PageWritten(path.clone()));
        written.push(path);
        page_no += 1;
        let _ = events.send(Event::Progress {
            done: page_no,
            total: total_pages,
        });
        if !more {
            break;
        }
    }

    if let Some(editor) = &spec.editor {
        open_in_editor(editor, &written, events);
    }
    log(
        events,
        Severity::Info,
        format!("export complete: {page_no} page(s)"),
    );
    true
}

/// Automatic output DPI for the page starting at placement `start`:
/// 1.1x the largest DPI any photo on the page requires to fill its slot
/// from its cropped source pixels.
fn page_auto_dpi(
    photos: &mut [Photo],
    order: &[usize],
    start: usize,
    size: &PhotoSize,
) -> Result<f64, Error> {
    let mut max_dpi = 0.0f64;
    for (offset, slot) in size.photo_slots().iter().enumerate() {
        let Some(&photo_idx) = order.get(start + offset) else {
            break;
        };
        let photo = &mut photos[photo_idx];
        let (tw, th) = photo.rotated_thumb_size()?;
        let (nw, nh) = photo.rotated_natural_size()?;
        // Crop in full-image pixels.
        let (crop_w, crop_h) = match photo.crop {
            crate::photo::CropState::Resolved(r) => (
                r.w as f64 * nw as f64 / tw.max(1) as f64,
                r.h as f64 * nh as f64 / th.max(1) as f64,
            ),
            _ => (nw as f64, nh as f64),
        };
        let denom = tmm_to_inches(slot.w) + tmm_to_inches(slot.h);
        if denom > 0.0 {
            max_dpi = max_dpi.max((crop_w + crop_h) / denom);
        }
    }
    if max_dpi <= 0.0 {
        return Ok(DEFAULT_DPI);
    }
    Ok(max_dpi * 1.1)
}

/// Output file name for a page, honoring the conflict rule.
pub fn unique_output_path(
    dir: &Path,
    page_no: usize,
    format: OutputFormat,
    conflict: ConflictRule,
) -> PathBuf {
    let ext = format.extension();
    let base = dir.join(format!("output_{page_no}.{ext}"));
    match conflict {
        ConflictRule::Overwrite => base,
        ConflictRule::Rename => {
            if !base.exists() {
                return base;
            }
            let mut k = 2;
            loop {
                let candidate = dir.join(format!("output_{page_no}_v{k}.{ext}"));
                if !candidate.exists() {
                    return candidate;
                }
                k += 1;
            }
        }
    }
}

fn save_page(canvas: &RgbaImage, path: &Path, format: OutputFormat) -> Result<(), Error> {
    match format {
        // JPEG has no alpha channel; flatten onto white.
        OutputFormat::Jpeg => {
            let flat = flatten_onto_white(canvas);
            flat.save_with_format(path, format.image_format())?;
        }
        OutputFormat::Png | OutputFormat::Tiff => {
            canvas.save_with_format(path, format.image_format())?;
        }
    }
    Ok(())
}

fn flatten_onto_white(canvas: &RgbaImage) -> RgbImage {
    let mut flat = RgbImage::new(canvas.width(), canvas.height());
    for (x, y, pixel) in canvas.enumerate_pixels() {
        let alpha = pixel[3] as f32 / 255.0;
        let blend = |c: u8| (c as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8;
        flat.put_pixel(x, y, image::Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]));
    }
    flat
}

/// Detached handoff of the written pages to an external editor.
fn open_in_editor(command: &str, files: &[PathBuf], events: &Sender<Event>) {
    let mut parts = command.split_whitespace();
    let Some(program) = parts.next() else {
        log(events, Severity::Warning, "empty editor command".into());
        return;
    };
    let mut cmd = Command::new(program);
    cmd.args(parts).args(files);
    match cmd.spawn() {
        Ok(child) => {
            drop(child);
            log(
                events,
                Severity::Info,
                format!("handed {} file(s) to {program}", files.len()),
            );
        }
        Err(err) => log(
            events,
            Severity::Error,
            format!("cannot launch editor {program:?}: {err}"),
        ),
    }
}
