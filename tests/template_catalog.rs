use std::fs;
use std::path::PathBuf;

use photoprint::template::{PAGE_MATCH_TOLERANCE_TMM, build_catalog};
use tempfile::tempdir;

// Requested page throughout: A6, 1050x1480 tmm.
const PAGE_W: i32 = 1050;
const PAGE_H: i32 = 1480;

fn write_templates(dir: &std::path::Path, body: &str) -> PathBuf {
    let path = dir.join("test_templates.xml");
    fs::write(&path, format!("<templates>{body}</templates>")).unwrap();
    path
}

#[test]
fn matching_paper_is_kept_larger_paper_is_skipped() {
    let tmp = tempdir().unwrap();
    write_templates(
        tmp.path(),
        r#"
        <paper name="a6" width="105" height="148" unit="mm">
          <template name="full" autorotate="true">
            <photo x="0" y="0" width="105" height="148"/>
          </template>
        </paper>
        <paper name="a4" width="210" height="297" unit="mm">
          <template name="too_big">
            <photo x="0" y="0" width="210" height="297"/>
          </template>
        </paper>
        "#,
    );
    let catalog = build_catalog(&[tmp.path().to_path_buf()], PAGE_W, PAGE_H);
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog[0].label, "full");
    assert!(catalog[0].auto_rotate);
    assert_eq!(catalog[0].photos_per_page(), 1);
}

#[test]
fn paper_declared_in_inches_matches_within_tolerance() {
    let tmp = tempdir().unwrap();
    // 4.13x5.83 inch = 1049x1481 tmm, within the tolerance.
    write_templates(
        tmp.path(),
        r#"
        <paper name="a6in" width="4.13" height="5.83" unit="inches">
          <template name="pair" dpi="300">
            <photo x="0.2" y="0.2" width="3.7" height="2.6"/>
            <photo x="0.2" y="3.0" width="3.7" height="2.6"/>
          </template>
        </paper>
        "#,
    );
    let catalog = build_catalog(&[tmp.path().to_path_buf()], PAGE_W, PAGE_H);
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog[0].dpi, 300);
    assert_eq!(catalog[0].photos_per_page(), 2);
    let page = catalog[0].page_rect();
    assert!((page.w - PAGE_W).abs() <= PAGE_MATCH_TOLERANCE_TMM);
}

#[test]
fn bad_unit_skips_the_paper_but_not_the_file() {
    let tmp = tempdir().unwrap();
    write_templates(
        tmp.path(),
        r#"
        <paper name="weird" width="105" height="148" unit="furlong">
          <template name="nope"><photo x="0" y="0" width="105" height="148"/></template>
        </paper>
        <paper name="ok" width="105" height="148" unit="mm">
          <template name="grid"><photogrid pageWidth="105" pageHeight="148" rows="2" columns="2"/></template>
        </paper>
        "#,
    );
    let catalog = build_catalog(&[tmp.path().to_path_buf()], PAGE_W, PAGE_H);
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog[0].label, "grid");
    assert_eq!(catalog[0].photos_per_page(), 4);
}

#[test]
fn zero_size_paper_inherits_the_page() {
    let tmp = tempdir().unwrap();
    write_templates(
        tmp.path(),
        r#"
        <paper name="any" width="0" height="0" unit="mm">
          <template name="inherit"><photo x="0" y="0" width="105" height="148"/></template>
        </paper>
        "#,
    );
    let catalog = build_catalog(&[tmp.path().to_path_buf()], PAGE_W, PAGE_H);
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog[0].page_rect().w, PAGE_W);
}

#[test]
fn slot_outside_the_page_skips_the_template() {
    let tmp = tempdir().unwrap();
    write_templates(
        tmp.path(),
        r#"
        <paper name="a6" width="105" height="148" unit="mm">
          <template name="escapes"><photo x="60" y="0" width="105" height="148"/></template>
          <template name="fits"><photo x="0" y="0" width="105" height="148"/></template>
        </paper>
        "#,
    );
    let catalog = build_catalog(&[tmp.path().to_path_buf()], PAGE_W, PAGE_H);
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog[0].label, "fits");
}

#[test]
fn empty_catalog_falls_back_to_single_full_bleed_page() {
    let tmp = tempdir().unwrap();
    let catalog = build_catalog(&[tmp.path().to_path_buf()], PAGE_W, PAGE_H);
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog[0].photos_per_page(), 1);
    assert_eq!(catalog[0].page_rect(), catalog[0].photo_slots()[0]);
}

#[test]
fn desktop_file_supplies_the_display_name() {
    let tmp = tempdir().unwrap();
    write_templates(
        tmp.path(),
        r#"
        <paper name="a6" width="105" height="148" unit="mm">
          <template name="pretty_pair"><photogrid pageWidth="105" pageHeight="148" rows="2" columns="1"/></template>
        </paper>
        "#,
    );
    fs::write(
        tmp.path().join("pretty_pair.desktop"),
        "[Desktop Entry]\nName=Two per page\n",
    )
    .unwrap();
    let catalog = build_catalog(&[tmp.path().to_path_buf()], PAGE_W, PAGE_H);
    assert_eq!(catalog[0].label, "Two per page");
}
