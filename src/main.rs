//! Binary entrypoint for photoprint.
//!
//! Delegates all logic to the library crate; no local modules here.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand};
use tracing::{Level, debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use photoprint::caption::load_caption_font;
use photoprint::config::{Config, from_yaml_file};
use photoprint::events::{Event, Severity};
use photoprint::jobs::{ExportSpec, Job, PrepareSpec, PrintWorker};
use photoprint::photo::{CaptionType, Photo};
use photoprint::scan::collect_photos;
use photoprint::session::{self, SessionLayout};
use photoprint::settings::Settings;
use photoprint::template::{self, PREVIEW_ICON_HEIGHT, PhotoSize};
use photoprint::units::{Unit, to_tmm};

/// Lay out photos onto fixed-size page templates and paginate them to
/// raster files.
#[derive(Debug, Parser)]
#[command(name = "photoprint", about = "Photo print-layout and pagination")]
struct Cli {
    /// Path to YAML config file
    #[arg(short, long, value_name = "FILE", default_value = "photoprint.yaml")]
    config: PathBuf,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: CommandKind,
}

#[derive(Debug, Subcommand)]
enum CommandKind {
    /// List the selectable templates for a page size
    Templates {
        #[command(flatten)]
        page: PageArgs,
        /// Also write each template's preview icon into this directory
        #[arg(long, value_name = "DIR")]
        icons: Option<PathBuf>,
    },
    /// Render one page to an image for inspection
    Preview {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        page: PageArgs,
        #[command(flatten)]
        layout: LayoutArgs,
        /// Zero-based page number to render
        #[arg(long, default_value_t = 0)]
        page_index: usize,
        /// Destination image file
        #[arg(long, value_name = "FILE", default_value = "preview.png")]
        out: PathBuf,
    },
    /// Paginate the whole photo list into output_<n>.<ext> files
    Export {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        page: PageArgs,
        #[command(flatten)]
        layout: LayoutArgs,
        /// Output directory for page files
        #[arg(long, value_name = "DIR", default_value = "pages")]
        out_dir: PathBuf,
        /// Output format (jpeg, png, tiff); default from config
        #[arg(long)]
        format: Option<String>,
        /// Save the resulting job back to a session file
        #[arg(long, value_name = "FILE")]
        save_session: Option<PathBuf>,
    },
}

#[derive(Debug, clap::Args)]
struct InputArgs {
    /// Photo files or directories, in print order
    #[arg(value_name = "PHOTO")]
    photos: Vec<PathBuf>,

    /// Load the photo list from a session XML file instead
    #[arg(long, value_name = "FILE", conflicts_with = "photos")]
    session: Option<PathBuf>,

    /// Print this many copies of every photo
    #[arg(long, default_value_t = 1)]
    copies: u32,
}

#[derive(Debug, clap::Args)]
struct PageArgs {
    /// Page size: a name (A3..A6, Letter) or WxH with unit, e.g. 210x297mm
    #[arg(long, default_value = "A4")]
    page_size: String,

    /// Extra template directories searched after the configured ones
    #[arg(long = "template-dir", value_name = "DIR")]
    template_dirs: Vec<PathBuf>,
}

#[derive(Debug, clap::Args)]
struct LayoutArgs {
    /// Catalog index of the template to use
    #[arg(long, default_value_t = 0, conflicts_with_all = ["grid", "fit"])]
    template: usize,

    /// Synthesize a custom RxC grid instead, e.g. 3x2
    #[arg(long, value_name = "RxC")]
    grid: Option<String>,

    /// Synthesize a "fit as many as possible" layout for this photo size,
    /// e.g. 9x13cm
    #[arg(long, value_name = "WxH")]
    fit: Option<String>,

    /// Letterbox whole photos instead of cropping to the slot aspect
    #[arg(long)]
    no_crop: bool,

    /// Keep every photo's orientation even when the slot disagrees
    #[arg(long)]
    no_auto_rotate: bool,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("photoprint={}", level).parse()?);
    fmt().with_env_filter(filter).with_target(true).init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let cfg = if cli.config.is_file() {
        from_yaml_file(&cli.config)
            .with_context(|| format!("loading config from {}", cli.config.display()))?
    } else {
        debug!("no config file at {}; using defaults", cli.config.display());
        Config::default()
    };
    cfg.validate().context("validating configuration")?;

    match cli.command {
        CommandKind::Templates { page, icons } => run_templates(&cfg, &page, icons),
        CommandKind::Preview {
            input,
            page,
            layout,
            page_index,
            out,
        } => run_preview(&cfg, input, &page, &layout, page_index, out),
        CommandKind::Export {
            input,
            page,
            layout,
            out_dir,
            format,
            save_session,
        } => run_export(&cfg, input, &page, &layout, out_dir, format, save_session),
    }
}

/// Named page sizes, in tenths of millimetres.
fn parse_page_size(raw: &str) -> Result<(String, i32, i32)> {
    let named: &[(&str, i32, i32)] = &[
        ("A3", 2970, 4200),
        ("A4", 2100, 2970),
        ("A5", 1480, 2100),
        ("A6", 1050, 1480),
        ("Letter", 2159, 2794),
    ];
    for (name, w, h) in named {
        if raw.eq_ignore_ascii_case(name) {
            return Ok((name.to_string(), *w, *h));
        }
    }
    let (w, h) = parse_dimensions(raw)?;
    Ok((raw.to_string(), w, h))
}

/// Parse `WxH<unit>` like `210x297mm`, `10x15cm` or `4x6inch`.
fn parse_dimensions(raw: &str) -> Result<(i32, i32)> {
    let unit_start = raw
        .find(|c: char| c.is_ascii_alphabetic())
        .with_context(|| format!("{raw:?} is missing a unit (mm, cm, inch)"))?;
    let (dims, unit_str) = raw.split_at(unit_start);
    let unit = Unit::parse(unit_str)?;
    let (w_str, h_str) = dims
        .split_once(['x', 'X'])
        .with_context(|| format!("{raw:?} is not WxH<unit>"))?;
    let w: f64 = w_str.trim().parse().with_context(|| format!("bad width in {raw:?}"))?;
    let h: f64 = h_str.trim().parse().with_context(|| format!("bad height in {raw:?}"))?;
    let (w, h) = (to_tmm(w, unit), to_tmm(h, unit));
    if w <= 0 || h <= 0 {
        bail!("page dimensions must be positive");
    }
    Ok((w, h))
}

fn parse_grid(raw: &str) -> Result<(u32, u32)> {
    let (r, c) = raw
        .split_once(['x', 'X'])
        .with_context(|| format!("{raw:?} is not RxC"))?;
    Ok((r.trim().parse()?, c.trim().parse()?))
}

fn build_catalog_for(cfg: &Config, page: &PageArgs) -> Result<(String, i32, i32, Vec<PhotoSize>)> {
    let (label, w, h) = parse_page_size(&page.page_size)?;
    let mut dirs = cfg.template_dirs.clone();
    dirs.extend(page.template_dirs.iter().cloned());
    let catalog = template::build_catalog(&dirs, w, h);
    Ok((label, w, h, catalog))
}

fn run_templates(cfg: &Config, page: &PageArgs, icons: Option<PathBuf>) -> Result<()> {
    let (label, _, _, catalog) = build_catalog_for(cfg, page)?;
    println!("{} template(s) for {label}:", catalog.len());
    for (idx, size) in catalog.iter().enumerate() {
        println!(
            "  [{idx}] {}: {} photo(s) per page, dpi {}",
            size.label,
            size.photos_per_page(),
            if size.dpi == 0 { "auto".to_string() } else { size.dpi.to_string() },
        );
    }
    if let Some(dir) = icons {
        std::fs::create_dir_all(&dir)?;
        for (idx, size) in catalog.iter().enumerate() {
            let path = dir.join(format!("template_{idx}.png"));
            size.preview_icon(PREVIEW_ICON_HEIGHT).save(&path)?;
            info!("wrote {}", path.display());
        }
    }
    Ok(())
}

fn load_photos(cfg: &Config, input: &InputArgs) -> Result<Vec<Photo>> {
    let mut photos = if let Some(session_path) = &input.session {
        let (photos, layout) = session::load(session_path)
            .with_context(|| format!("loading session {}", session_path.display()))?;
        debug!(
            "session wants printer {:?}, page {:?}, template {:?}",
            layout.printer, layout.page_size, layout.photo_size
        );
        photos
    } else {
        collect_photos(&input.photos)?
            .into_iter()
            .map(Photo::new)
            .collect()
    };
    if photos.is_empty() {
        bail!("no photos to print");
    }
    if input.copies > 1 {
        for photo in &mut photos {
            photo.copies = input.copies;
        }
    }
    if let Some(default) = cfg.caption_default() {
        for photo in &mut photos {
            photo.caption.get_or_insert_with(|| default.clone());
        }
    }
    Ok(photos)
}

fn choose_size(
    catalog: Vec<PhotoSize>,
    layout: &LayoutArgs,
    page_w: i32,
    page_h: i32,
) -> Result<(Vec<PhotoSize>, usize)> {
    if let Some(grid) = &layout.grid {
        let (rows, columns) = parse_grid(grid)?;
        let size = template::custom_grid(page_w, page_h, rows, columns)?;
        let mut catalog = catalog;
        catalog.push(size);
        let idx = catalog.len() - 1;
        return Ok((catalog, idx));
    }
    if let Some(fit) = &layout.fit {
        let (w, h) = parse_dimensions(fit)?;
        let size = template::custom_fit(page_w, page_h, w, h)?;
        let mut catalog = catalog;
        catalog.push(size);
        let idx = catalog.len() - 1;
        return Ok((catalog, idx));
    }
    if layout.template >= catalog.len() {
        bail!(
            "template index {} out of range (catalog has {})",
            layout.template,
            catalog.len()
        );
    }
    Ok((catalog, layout.template))
}

/// Shared default caption font, taken from the first captioned photo.
/// Photos naming their own font resolve it at paint time and only fall
/// back to this one when that fails.
fn caption_font(photos: &[Photo]) -> Option<Arc<ab_glyph::FontVec>> {
    let family = photos
        .iter()
        .filter_map(|p| p.caption.as_ref())
        .find(|c| c.kind != CaptionType::None)
        .map(|c| c.font.clone())?;
    match load_caption_font(&family) {
        Ok(font) => Some(Arc::new(font)),
        Err(err) => {
            warn!("captions disabled: {err}");
            None
        }
    }
}

/// Drain worker events until the job finishes, logging as we go.
/// Returns the completion flag plus any payload events.
fn drain_until_finished(worker: &PrintWorker) -> (bool, Vec<Event>) {
    let mut payloads = Vec::new();
    for event in worker.events.iter() {
        match event {
            Event::Log { severity, message } => match severity {
                Severity::Info => info!("{message}"),
                Severity::Warning => warn!("{message}"),
                Severity::Error => tracing::error!("{message}"),
            },
            Event::Progress { done, total } => debug!("progress {done}/{total}"),
            Event::Finished { completed } => return (completed, payloads),
            other => payloads.push(other),
        }
    }
    (false, payloads)
}

fn prepare_photos(
    worker: &PrintWorker,
    photos: Vec<Photo>,
    size: &PhotoSize,
    auto_rotate: bool,
) -> Result<Vec<Photo>> {
    worker.submit(Job::Prepare(PrepareSpec {
        photos,
        size: size.clone(),
        auto_rotate,
    }));
    let (completed, payloads) = drain_until_finished(worker);
    if !completed {
        bail!("print preparation did not complete");
    }
    payloads
        .into_iter()
        .find_map(|e| match e {
            Event::Prepared(photos) => Some(photos),
            _ => None,
        })
        .context("prepare job finished without a result")
}

fn run_preview(
    cfg: &Config,
    input: InputArgs,
    page: &PageArgs,
    layout: &LayoutArgs,
    page_index: usize,
    out: PathBuf,
) -> Result<()> {
    let (_, page_w, page_h, catalog) = build_catalog_for(cfg, page)?;
    let (catalog, selected) = choose_size(catalog, layout, page_w, page_h)?;
    let photos = load_photos(cfg, &input)?;
    let font = caption_font(&photos);

    let worker = PrintWorker::spawn(font);
    let photos = prepare_photos(&worker, photos, &catalog[selected], !layout.no_auto_rotate)?;

    let settings = Settings {
        photos,
        page_label: page.page_size.clone(),
        page_w,
        page_h,
        photo_sizes: catalog,
        selected_size: selected,
        output_dir: PathBuf::new(),
        format: cfg.output.format,
        conflict: cfg.output.on_conflict,
        open_in_editor: None,
        crop_disabled: layout.no_crop,
        caption_default: cfg.caption_default(),
    };
    worker.submit(Job::Preview(
        settings.preview_snapshot(page_index, cfg.preview.max_dim),
    ));
    let (completed, payloads) = drain_until_finished(&worker);
    worker.shutdown();
    if !completed {
        bail!("preview did not complete");
    }
    let image = payloads
        .into_iter()
        .find_map(|e| match e {
            Event::PreviewReady(img) => Some(img),
            _ => None,
        })
        .context("preview job finished without an image")?;
    image.save(&out)?;
    info!("wrote {}", out.display());
    Ok(())
}

fn run_export(
    cfg: &Config,
    input: InputArgs,
    page: &PageArgs,
    layout: &LayoutArgs,
    out_dir: PathBuf,
    format: Option<String>,
    save_session: Option<PathBuf>,
) -> Result<()> {
    let (page_label, page_w, page_h, catalog) = build_catalog_for(cfg, page)?;
    let (catalog, selected) = choose_size(catalog, layout, page_w, page_h)?;
    let photos = load_photos(cfg, &input)?;
    let font = caption_font(&photos);
    let format = match format {
        Some(raw) => photoprint::settings::OutputFormat::parse(&raw)
            .with_context(|| format!("unknown output format {raw:?}"))?,
        None => cfg.output.format,
    };

    let worker = PrintWorker::spawn(font);
    let photos = prepare_photos(&worker, photos, &catalog[selected], !layout.no_auto_rotate)?;

    if let Some(path) = &save_session {
        let layout_record = SessionLayout {
            printer: cfg
                .output
                .editor
                .clone()
                .unwrap_or_else(|| "files".to_string()),
            page_size: page_label.clone(),
            photo_size: selected.to_string(),
        };
        session::save(path, &photos, &layout_record)
            .with_context(|| format!("saving session to {}", path.display()))?;
        info!("saved session to {}", path.display());
    }

    worker.submit(Job::Export(ExportSpec {
        photos,
        size: catalog[selected].clone(),
        dir: out_dir,
        format,
        conflict: cfg.output.on_conflict,
        crop_disabled: layout.no_crop,
        editor: cfg.output.editor.clone(),
    }));
    let (completed, payloads) = drain_until_finished(&worker);
    worker.shutdown();

    let pages = payloads
        .iter()
        .filter(|e| matches!(e, Event::PageWritten(_)))
        .count();
    if !completed {
        bail!("export stopped after {pages} page(s)");
    }
    info!("export finished: {pages} page(s)");
    Ok(())
}
