use std::path::PathBuf;

use image::{Rgba, RgbaImage};
use photoprint::caption::{ExifInfoProvider, FontCache};
use photoprint::painter::{PaintContext, paint_one_page};
use photoprint::photo::{Caption, CaptionType, Photo, placements};
use photoprint::template::custom_grid;
use tempfile::tempdir;

fn write_photo(dir: &std::path::Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    RgbaImage::from_pixel(8, 6, Rgba([200, 10, 10, 255]))
        .save(&path)
        .unwrap();
    path
}

fn ctx(provider: &ExifInfoProvider) -> PaintContext<'_> {
    PaintContext {
        provider,
        fonts: FontCache::new(None),
        crop_disabled: false,
        use_thumbnails: true,
    }
}

#[test]
fn five_photos_on_two_slots_take_three_pages() {
    let tmp = tempdir().unwrap();
    let mut photos: Vec<Photo> = (0..5)
        .map(|i| Photo::new(write_photo(tmp.path(), &format!("p{i}.png"))))
        .collect();
    let order = placements(&photos);
    let size = custom_grid(1000, 1000, 2, 1).unwrap();
    assert_eq!(size.photos_per_page(), 2);

    let provider = ExifInfoProvider;
    let mut ctx = ctx(&provider);
    let mut canvas = RgbaImage::new(200, 200);
    let mut current = 0;
    let mut pages = 0;
    loop {
        let more =
            paint_one_page(&mut canvas, &mut photos, &order, &size, &mut current, &mut ctx).unwrap();
        pages += 1;
        if !more {
            break;
        }
    }
    assert_eq!(pages, 3);
    assert_eq!(current, 5);
}

#[test]
fn last_page_partial_occupancy_is_not_an_error() {
    let tmp = tempdir().unwrap();
    let mut photos = vec![Photo::new(write_photo(tmp.path(), "only.png"))];
    let order = placements(&photos);
    let size = custom_grid(1000, 1000, 2, 1).unwrap();

    let provider = ExifInfoProvider;
    let mut ctx = ctx(&provider);
    let mut canvas = RgbaImage::new(100, 100);
    let mut current = 0;
    let more =
        paint_one_page(&mut canvas, &mut photos, &order, &size, &mut current, &mut ctx).unwrap();
    assert!(!more);
    assert_eq!(current, 1);
    // Something was painted.
    assert!(canvas.pixels().any(|p| p[3] != 0));
}

#[test]
fn copies_expand_the_placement_sequence() {
    let tmp = tempdir().unwrap();
    let mut a = Photo::new(write_photo(tmp.path(), "a.png"));
    a.copies = 3;
    let b = Photo::new(write_photo(tmp.path(), "b.png"));
    let mut photos = vec![a, b];
    let order = placements(&photos);
    assert_eq!(order, vec![0, 0, 0, 1]);

    let size = custom_grid(1000, 1000, 3, 1).unwrap();
    let provider = ExifInfoProvider;
    let mut ctx = ctx(&provider);
    let mut canvas = RgbaImage::new(100, 100);
    let mut current = 0;
    // Page 1 holds the three copies, page 2 the final photo.
    assert!(paint_one_page(&mut canvas, &mut photos, &order, &size, &mut current, &mut ctx).unwrap());
    assert_eq!(current, 3);
    assert!(!paint_one_page(&mut canvas, &mut photos, &order, &size, &mut current, &mut ctx).unwrap());
    assert_eq!(current, 4);
}

#[test]
fn empty_photo_list_reports_sequence_finished() {
    let size = custom_grid(1000, 1000, 2, 2).unwrap();
    let provider = ExifInfoProvider;
    let mut ctx = ctx(&provider);
    let mut canvas = RgbaImage::new(100, 100);
    let mut current = 0;
    let more = paint_one_page(&mut canvas, &mut [], &[], &size, &mut current, &mut ctx).unwrap();
    assert!(!more);
    assert_eq!(current, 0);
}

#[test]
fn letterbox_mode_paints_inside_the_slot() {
    let tmp = tempdir().unwrap();
    let mut photos = vec![Photo::new(write_photo(tmp.path(), "wide.png"))];
    let order = placements(&photos);
    let size = custom_grid(1000, 1000, 1, 1).unwrap();
    let provider = ExifInfoProvider;
    let mut ctx = PaintContext {
        provider: &provider,
        fonts: FontCache::new(None),
        crop_disabled: true,
        use_thumbnails: true,
    };
    let mut canvas = RgbaImage::new(100, 100);
    let mut current = 0;
    paint_one_page(&mut canvas, &mut photos, &order, &size, &mut current, &mut ctx).unwrap();
    assert!(canvas.pixels().any(|p| p[3] != 0));
}

#[test]
fn each_caption_resolves_its_own_font() {
    let tmp = tempdir().unwrap();
    let mut a = Photo::new(write_photo(tmp.path(), "a.png"));
    a.caption = Some(Caption {
        kind: CaptionType::FileNames,
        font: "Serif".into(),
        size: 10,
        color: [0, 0, 0],
        text: String::new(),
    });
    let mut b = Photo::new(write_photo(tmp.path(), "b.png"));
    b.caption = Some(Caption {
        kind: CaptionType::FileNames,
        font: "definitely-not-a-font-family".into(),
        size: 10,
        color: [0, 0, 0],
        text: String::new(),
    });
    let mut photos = vec![a, b];
    let order = placements(&photos);
    let size = custom_grid(1000, 1000, 2, 1).unwrap();

    let provider = ExifInfoProvider;
    let mut ctx = ctx(&provider);
    let mut canvas = RgbaImage::new(120, 120);
    let mut current = 0;
    // Two different font names on one page: each caption resolves its own
    // font at paint time, and an unresolvable name is never fatal.
    let more =
        paint_one_page(&mut canvas, &mut photos, &order, &size, &mut current, &mut ctx).unwrap();
    assert!(!more);
    assert_eq!(current, 2);
    assert!(canvas.pixels().any(|p| p[3] != 0));
}
