//! Session persistence: the print job list and per-photo caption, crop and
//! copy metadata as a small XML document.
//!
//! ```xml
//! <Images>
//!   <Image url="..." copies="2" rotation="90" cropX=.. cropY=.. cropW=.. cropH=..>
//!     <pa_caption type="4" font="Sans" size="10" color="#ffffff" text="%f"/>
//!   </Image>
//!   <pa_layout Printer="files" PageSize="A4" PhotoSize="2"/>
//! </Images>
//! ```

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::layout::Rect;
use crate::photo::{Caption, CaptionType, CropState, Photo, Rotation};

/// The output device / page selection recorded alongside the photo list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionLayout {
    /// Sink name ("files", an editor command, a printer name).
    pub printer: String,
    /// Display name of the chosen page size.
    pub page_size: String,
    /// Index of the chosen template within the catalog.
    pub photo_size: String,
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Serialize the session to an XML string.
pub fn to_xml(photos: &[Photo], layout: &SessionLayout) -> String {
    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Images>\n");
    for photo in photos {
        let _ = write!(
            xml,
            "  <Image url=\"{}\" copies=\"{}\" rotation=\"{}\"",
            escape(&photo.path.to_string_lossy()),
            photo.copies,
            photo.rotation.degrees(),
        );
        if let CropState::Resolved(r) = photo.crop {
            let _ = write!(
                xml,
                " cropX=\"{}\" cropY=\"{}\" cropW=\"{}\" cropH=\"{}\"",
                r.x, r.y, r.w, r.h
            );
        }
        match &photo.caption {
            Some(cap) => {
                xml.push_str(">\n");
                let _ = writeln!(
                    xml,
                    "    <pa_caption type=\"{}\" font=\"{}\" size=\"{}\" color=\"{}\" text=\"{}\"/>",
                    cap.kind.code(),
                    escape(&cap.font),
                    cap.size,
                    cap.color_hex(),
                    escape(&cap.text),
                );
                xml.push_str("  </Image>\n");
            }
            None => xml.push_str("/>\n"),
        }
    }
    let _ = writeln!(
        xml,
        "  <pa_layout Printer=\"{}\" PageSize=\"{}\" PhotoSize=\"{}\"/>",
        escape(&layout.printer),
        escape(&layout.page_size),
        escape(&layout.photo_size),
    );
    xml.push_str("</Images>\n");
    xml
}

pub fn save(path: &Path, photos: &[Photo], layout: &SessionLayout) -> Result<(), Error> {
    fs::write(path, to_xml(photos, layout))?;
    Ok(())
}

/// Parse a session document back into the ordered photo list and layout.
pub fn from_xml(text: &str) -> Result<(Vec<Photo>, SessionLayout), Error> {
    let doc = roxmltree::Document::parse(text).map_err(|e| Error::Session(e.to_string()))?;
    let root = doc.root_element();
    if !root.has_tag_name("Images") {
        return Err(Error::Session(format!(
            "unexpected root element {:?}",
            root.tag_name().name()
        )));
    }

    let mut photos = Vec::new();
    let mut layout = SessionLayout::default();

    for node in root.children().filter(|n| n.is_element()) {
        if node.has_tag_name("pa_layout") {
            layout.printer = node.attribute("Printer").unwrap_or_default().to_string();
            layout.page_size = node.attribute("PageSize").unwrap_or_default().to_string();
            layout.photo_size = node.attribute("PhotoSize").unwrap_or_default().to_string();
            continue;
        }
        if !node.has_tag_name("Image") {
            continue;
        }

        let url = node
            .attribute("url")
            .ok_or_else(|| Error::Session("Image element without url".into()))?;
        let mut photo = Photo::new(PathBuf::from(url));
        photo.copies = node
            .attribute("copies")
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);
        photo.rotation = node
            .attribute("rotation")
            .and_then(|v| v.parse::<u32>().ok())
            .and_then(Rotation::from_degrees)
            .unwrap_or_default();

        let crop_attr = |name: &str| node.attribute(name).and_then(|v| v.parse::<i32>().ok());
        photo.crop = match (
            crop_attr("cropX"),
            crop_attr("cropY"),
            crop_attr("cropW"),
            crop_attr("cropH"),
        ) {
            (Some(x), Some(y), Some(w), Some(h)) if w > 0 && h > 0 => {
                // Rotation came from the document, not the resolver.
                CropState::Resolved(Rect::new(x, y, w, h))
            }
            _ => CropState::Unset,
        };

        if let Some(cap) = node.children().find(|n| n.has_tag_name("pa_caption")) {
            let kind = cap
                .attribute("type")
                .and_then(|v| v.parse::<u32>().ok())
                .and_then(CaptionType::from_code)
                .ok_or_else(|| Error::Session("pa_caption with unknown type".into()))?;
            photo.caption = Some(Caption {
                kind,
                font: cap.attribute("font").unwrap_or("").to_string(),
                size: cap
                    .attribute("size")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10),
                color: cap
                    .attribute("color")
                    .and_then(Caption::parse_color)
                    .unwrap_or([0, 0, 0]),
                text: cap.attribute("text").unwrap_or("").to_string(),
            });
        }
        photos.push(photo);
    }

    Ok((photos, layout))
}

pub fn load(path: &Path) -> Result<(Vec<Photo>, SessionLayout), Error> {
    let text = fs::read_to_string(path)?;
    from_xml(&text)
}
