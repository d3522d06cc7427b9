use std::path::PathBuf;
use std::time::Duration;

use image::{Rgba, RgbaImage};
use photoprint::events::Event;
use photoprint::jobs::{ExportSpec, Job, PrepareSpec, PrintWorker, unique_output_path};
use photoprint::photo::{CropState, Photo};
use photoprint::settings::{ConflictRule, OutputFormat, PreviewSnapshot, Settings};
use photoprint::template::custom_grid;
use tempfile::tempdir;

const WAIT: Duration = Duration::from_secs(30);

fn write_photo(dir: &std::path::Path, name: &str, w: u32, h: u32) -> PathBuf {
    let path = dir.join(name);
    RgbaImage::from_pixel(w, h, Rgba([10, 120, 200, 255]))
        .save(&path)
        .unwrap();
    path
}

/// Collect events until `Finished`, returning the payloads + flag.
fn drain(worker: &PrintWorker) -> (bool, Vec<Event>) {
    let mut payloads = Vec::new();
    loop {
        match worker.events.recv_timeout(WAIT).expect("worker went quiet") {
            Event::Finished { completed } => return (completed, payloads),
            other => payloads.push(other),
        }
    }
}

#[test]
fn prepare_then_export_writes_ceil_n_over_k_pages() {
    let tmp = tempdir().unwrap();
    let photos: Vec<Photo> = (0..5)
        .map(|i| Photo::new(write_photo(tmp.path(), &format!("p{i}.png"), 40, 30)))
        .collect();
    let size = custom_grid(1000, 1000, 2, 1).unwrap();
    let out_dir = tmp.path().join("pages");

    let worker = PrintWorker::spawn(None);
    worker.submit(Job::Prepare(PrepareSpec {
        photos,
        size: size.clone(),
        auto_rotate: true,
    }));
    let (completed, payloads) = drain(&worker);
    assert!(completed);
    let photos = payloads
        .into_iter()
        .find_map(|e| match e {
            Event::Prepared(p) => Some(p),
            _ => None,
        })
        .unwrap();
    assert!(photos.iter().all(|p| matches!(p.crop, CropState::Resolved(_))));

    worker.submit(Job::Export(ExportSpec {
        photos,
        size,
        dir: out_dir.clone(),
        format: OutputFormat::Png,
        conflict: ConflictRule::Rename,
        crop_disabled: false,
        editor: None,
    }));
    let (completed, payloads) = drain(&worker);
    worker.shutdown();
    assert!(completed);

    let written: Vec<PathBuf> = payloads
        .into_iter()
        .filter_map(|e| match e {
            Event::PageWritten(p) => Some(p),
            _ => None,
        })
        .collect();
    assert_eq!(written.len(), 3);
    assert!(out_dir.join("output_1.png").is_file());
    assert!(out_dir.join("output_2.png").is_file());
    assert!(out_dir.join("output_3.png").is_file());
}

#[test]
fn rename_policy_never_clobbers_existing_pages() {
    let tmp = tempdir().unwrap();
    std::fs::write(tmp.path().join("output_1.png"), b"keep me").unwrap();

    let path = unique_output_path(tmp.path(), 1, OutputFormat::Png, ConflictRule::Rename);
    assert_eq!(path, tmp.path().join("output_1_v2.png"));
    std::fs::write(&path, b"second").unwrap();
    let path = unique_output_path(tmp.path(), 1, OutputFormat::Png, ConflictRule::Rename);
    assert_eq!(path, tmp.path().join("output_1_v3.png"));

    let path = unique_output_path(tmp.path(), 1, OutputFormat::Png, ConflictRule::Overwrite);
    assert_eq!(path, tmp.path().join("output_1.png"));
}

#[test]
fn cancellation_finishes_incomplete() {
    let tmp = tempdir().unwrap();
    let photos = vec![Photo::new(write_photo(tmp.path(), "p.png", 20, 20))];
    let size = custom_grid(1000, 1000, 1, 1).unwrap();

    let worker = PrintWorker::spawn(None);
    worker.cancel();
    worker.submit(Job::Export(ExportSpec {
        photos,
        size,
        dir: tmp.path().join("pages"),
        format: OutputFormat::Png,
        conflict: ConflictRule::Rename,
        crop_disabled: false,
        editor: None,
    }));
    let (completed, payloads) = drain(&worker);
    worker.shutdown();
    assert!(!completed);
    assert!(
        !payloads
            .iter()
            .any(|e| matches!(e, Event::PageWritten(_)))
    );
}

#[test]
fn preview_renders_the_requested_page_from_a_snapshot() {
    let tmp = tempdir().unwrap();
    let photos: Vec<Photo> = (0..3)
        .map(|i| Photo::new(write_photo(tmp.path(), &format!("p{i}.png"), 30, 20)))
        .collect();
    let size = custom_grid(2100, 2970, 2, 1).unwrap();

    let settings = Settings {
        photos,
        page_label: "A4".into(),
        page_w: 2100,
        page_h: 2970,
        photo_sizes: vec![size],
        selected_size: 0,
        output_dir: PathBuf::new(),
        format: OutputFormat::Png,
        conflict: ConflictRule::Rename,
        open_in_editor: None,
        crop_disabled: false,
        caption_default: None,
    };
    let snapshot: PreviewSnapshot = settings.preview_snapshot(1, 256);

    let worker = PrintWorker::spawn(None);
    worker.submit(Job::Preview(snapshot));
    let (completed, payloads) = drain(&worker);
    worker.shutdown();
    assert!(completed);
    let img = payloads
        .into_iter()
        .find_map(|e| match e {
            Event::PreviewReady(img) => Some(img),
            _ => None,
        })
        .unwrap();
    // Portrait page: the long edge is the requested max dimension.
    assert_eq!(img.height(), 256);
    assert!(img.width() < 256);
    assert!(img.pixels().any(|p| p[3] != 0));
}
