use photoprint::layout::Rect;
use photoprint::photo::{Caption, CaptionType, CropState, Photo, Rotation};
use photoprint::session::{SessionLayout, from_xml, load, save, to_xml};
use tempfile::tempdir;

fn sample_photos() -> Vec<Photo> {
    let mut a = Photo::new("/albums/2024/beach.jpg");
    a.copies = 2;
    a.rotation = Rotation::Deg90;
    a.crop = CropState::Resolved(Rect::new(10, 20, 180, 120));
    a.caption = Some(Caption {
        kind: CaptionType::Custom,
        font: "DejaVu Sans".into(),
        size: 10,
        color: [255, 255, 0],
        text: "%f <at> %d & more".into(),
    });

    let mut b = Photo::new("/albums/2024/dunes \"edit\".png");
    b.caption = Some(Caption {
        kind: CaptionType::ExifDateTime,
        font: "Serif".into(),
        size: 8,
        color: [0, 0, 0],
        text: String::new(),
    });

    let c = Photo::new("/albums/2024/plain.jpg");
    vec![a, b, c]
}

#[test]
fn photo_list_round_trips_through_xml() {
    let photos = sample_photos();
    let layout = SessionLayout {
        printer: "files".into(),
        page_size: "A4".into(),
        photo_size: "2".into(),
    };
    let xml = to_xml(&photos, &layout);
    let (loaded, loaded_layout) = from_xml(&xml).unwrap();

    assert_eq!(loaded.len(), photos.len());
    assert_eq!(loaded_layout, layout);
    for (orig, back) in photos.iter().zip(&loaded) {
        assert_eq!(orig.path, back.path);
        assert_eq!(orig.copies, back.copies);
        assert_eq!(orig.rotation, back.rotation);
        assert_eq!(orig.crop, back.crop);
        assert_eq!(orig.caption, back.caption);
    }
}

#[test]
fn round_trip_through_a_file() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("job.xml");
    let photos = sample_photos();
    let layout = SessionLayout::default();
    save(&path, &photos, &layout).unwrap();
    let (loaded, _) = load(&path).unwrap();
    assert_eq!(loaded.len(), 3);
    assert_eq!(loaded[0].caption.as_ref().unwrap().text, "%f <at> %d & more");
}

#[test]
fn missing_crop_attributes_mean_unset() {
    let xml = r#"<?xml version="1.0"?>
<Images>
  <Image url="/a.jpg" copies="1" rotation="0"/>
</Images>"#;
    let (photos, _) = from_xml(xml).unwrap();
    assert_eq!(photos[0].crop, CropState::Unset);
}

#[test]
fn malformed_documents_are_session_errors() {
    assert!(from_xml("<NotImages/>").is_err());
    assert!(from_xml("<Images><Image/></Images>").is_err());
    assert!(from_xml("not xml at all").is_err());
}
