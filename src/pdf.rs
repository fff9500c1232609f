use crate::assets::{ImageAsset, ImageStore};
use crate::canvas::{Command, Document, Page};
use crate::error::OnePageError;
use crate::font::Base14Font;
use crate::image_header::ImageMime;
use crate::types::{Color, Pt};
use lopdf::{Dictionary, Object, ObjectId, Stream, dictionary};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Serializes a laid-out document. Fonts are the standard base-14 set and are
/// referenced, not embedded. Images are looked up in `images` by resource id.
pub fn document_to_pdf(document: &Document, images: &ImageStore) -> Result<Vec<u8>, OnePageError> {
    let mut pdf = lopdf::Document::with_version("1.5");
    let pages_id = pdf.new_object_id();

    let font_map = build_font_objects(&mut pdf, document);
    let image_map = build_image_objects(&mut pdf, document, images);

    let mut font_dict = Dictionary::new();
    for (name, id) in font_map.values() {
        font_dict.set(name.as_bytes().to_vec(), *id);
    }
    let mut xobject_dict = Dictionary::new();
    let mut seen_names = BTreeSet::new();
    for (name, id) in image_map.values() {
        if seen_names.insert(name.clone()) {
            xobject_dict.set(name.as_bytes().to_vec(), *id);
        }
    }
    let resources_id = pdf.add_object(dictionary! {
        "Font" => font_dict,
        "XObject" => xobject_dict,
    });

    let page_width = document.page_size.width;
    let page_height = document.page_size.height;
    let mut kids: Vec<Object> = Vec::with_capacity(document.pages.len());
    for page in &document.pages {
        let content = render_page(page, page_height, &font_map, &image_map);
        let content_id = pdf.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = pdf.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), pt_object(page_width), pt_object(page_height)],
        });
        kids.push(page_id.into());
    }
    let count = kids.len() as i64;
    pdf.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = pdf.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    pdf.trailer.set("Root", catalog_id);
    pdf.compress();

    let mut out = Vec::new();
    pdf.save_to(&mut out)?;
    Ok(out)
}

pub(crate) fn pt_object(value: Pt) -> Object {
    let milli = value.to_milli_i64();
    if milli % 1000 == 0 {
        Object::Integer(milli / 1000)
    } else {
        Object::Real((milli as f64 / 1000.0) as _)
    }
}

fn build_font_objects(
    pdf: &mut lopdf::Document,
    document: &Document,
) -> BTreeMap<Base14Font, (String, ObjectId)> {
    // Canvas state starts in Helvetica, so it is always referenced.
    let mut used = BTreeSet::from([Base14Font::Helvetica]);
    for page in &document.pages {
        for cmd in &page.commands {
            if let Command::SetFont(font) = cmd {
                used.insert(*font);
            }
        }
    }
    used.into_iter()
        .enumerate()
        .map(|(idx, font)| {
            let id = pdf.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => font.pdf_name(),
                "Encoding" => "WinAnsiEncoding",
            });
            (font, (format!("F{}", idx + 1), id))
        })
        .collect()
}

struct ImageData {
    width: u32,
    height: u32,
    color_space: &'static str,
    filter: Option<&'static str>,
    data: Vec<u8>,
    alpha: Option<Vec<u8>>,
}

// Resource id -> (XObject name, object id). Identical payloads share one object.
fn build_image_objects(
    pdf: &mut lopdf::Document,
    document: &Document,
    images: &ImageStore,
) -> BTreeMap<String, (String, ObjectId)> {
    let mut resource_ids = BTreeSet::new();
    for page in &document.pages {
        for cmd in &page.commands {
            if let Command::DrawImage { resource_id, .. } = cmd {
                resource_ids.insert(resource_id.as_str());
            }
        }
    }

    let mut by_hash: HashMap<Vec<u8>, (String, ObjectId)> = HashMap::new();
    let mut out = BTreeMap::new();
    for resource_id in resource_ids {
        let Some(asset) = images.get(resource_id) else {
            log::warn!("image {resource_id} is drawn but missing from the image store");
            continue;
        };
        let key = Sha256::digest(&asset.data).to_vec();
        if let Some(existing) = by_hash.get(&key) {
            out.insert(resource_id.to_string(), existing.clone());
            continue;
        }
        let Some(image) = decode_image(asset) else {
            log::warn!("image {resource_id} could not be decoded for embedding");
            continue;
        };
        let id = add_image_object(pdf, image);
        let entry = (format!("Im{}", by_hash.len() + 1), id);
        by_hash.insert(key, entry.clone());
        out.insert(resource_id.to_string(), entry);
    }
    out
}

fn decode_image(asset: &ImageAsset) -> Option<ImageData> {
    let kind = asset.kind()?;
    let format = match kind {
        ImageMime::Png => image::ImageFormat::Png,
        ImageMime::Jpeg => image::ImageFormat::Jpeg,
    };
    let decoded = image::load_from_memory_with_format(&asset.data, format).ok()?;
    let (width, height) = (decoded.width(), decoded.height());

    if kind == ImageMime::Jpeg {
        let color_space = match decoded.color() {
            image::ColorType::L8 | image::ColorType::La8 => "DeviceGray",
            _ => "DeviceRGB",
        };
        return Some(ImageData {
            width,
            height,
            color_space,
            filter: Some("DCTDecode"),
            data: asset.data.clone(),
            alpha: None,
        });
    }

    let rgba = decoded.to_rgba8();
    let mut rgb = Vec::with_capacity((width as usize) * (height as usize) * 3);
    let mut alpha = Vec::with_capacity((width as usize) * (height as usize));
    let mut has_alpha = false;
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        if a != 255 {
            has_alpha = true;
        }
        rgb.extend_from_slice(&[r, g, b]);
        alpha.push(a);
    }
    Some(ImageData {
        width,
        height,
        color_space: "DeviceRGB",
        filter: None,
        data: rgb,
        alpha: has_alpha.then_some(alpha),
    })
}

fn add_image_object(pdf: &mut lopdf::Document, image: ImageData) -> ObjectId {
    let smask_id = image.alpha.map(|alpha| {
        pdf.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => image.width as i64,
                "Height" => image.height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            alpha,
        ))
    });
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => image.width as i64,
        "Height" => image.height as i64,
        "ColorSpace" => image.color_space,
        "BitsPerComponent" => 8,
    };
    if let Some(smask_id) = smask_id {
        dict.set("SMask", smask_id);
    }
    match image.filter {
        // Already-compressed payloads must not be deflated a second time.
        Some(filter) => {
            dict.set("Filter", filter);
            pdf.add_object(Stream::new(dict, image.data).with_compression(false))
        }
        None => pdf.add_object(Stream::new(dict, image.data)),
    }
}

fn render_page(
    page: &Page,
    page_height: Pt,
    font_map: &BTreeMap<Base14Font, (String, ObjectId)>,
    image_map: &BTreeMap<String, (String, ObjectId)>,
) -> String {
    let mut out = String::new();
    let mut current_font_size = Pt::from_f32(12.0);
    let mut current_font = Base14Font::Helvetica;

    for cmd in &page.commands {
        match cmd {
            Command::SaveState => out.push_str("q\n"),
            Command::RestoreState => out.push_str("Q\n"),
            Command::SetFillColor(color) => out.push_str(&color_to_pdf(*color, "rg")),
            Command::SetStrokeColor(color) => out.push_str(&color_to_pdf(*color, "RG")),
            Command::SetLineWidth(width) => {
                out.push_str(&format!("{} w\n", fmt_pt(*width)));
            }
            Command::SetFont(font) => current_font = *font,
            Command::SetFontSize(size) => current_font_size = *size,
            Command::DrawString { x, y, text } => {
                let resource = font_map
                    .get(&current_font)
                    .map(|(name, _)| name.as_str())
                    .unwrap_or("F1");
                out.push_str("BT\n");
                out.push_str(&format!("/{} {} Tf\n", resource, fmt_pt(current_font_size)));
                out.push_str(&format!(
                    "{} {} Td\n",
                    fmt_pt(*x),
                    fmt_pt(page_height - *y - current_font_size)
                ));
                out.push_str(&format!("({}) Tj\n", encode_winansi_pdf_string(text)));
                out.push_str("ET\n");
            }
            Command::DrawRect {
                x,
                y,
                width,
                height,
            } => {
                out.push_str(&format!(
                    "{} {} {} {} re\nf\n",
                    fmt_pt(*x),
                    fmt_pt(page_height - *y - *height),
                    fmt_pt(*width),
                    fmt_pt(*height)
                ));
            }
            Command::StrokeRect {
                x,
                y,
                width,
                height,
            } => {
                out.push_str(&format!(
                    "{} {} {} {} re\nS\n",
                    fmt_pt(*x),
                    fmt_pt(page_height - *y - *height),
                    fmt_pt(*width),
                    fmt_pt(*height)
                ));
            }
            Command::DrawImage {
                x,
                y,
                width,
                height,
                resource_id,
            } => {
                if let Some((name, _)) = image_map.get(resource_id) {
                    let draw_y = page_height - *y - *height;
                    out.push_str("q\n");
                    out.push_str(&format!(
                        "{} 0 0 {} {} {} cm\n",
                        fmt_pt(*width),
                        fmt_pt(*height),
                        fmt_pt(*x),
                        fmt_pt(draw_y)
                    ));
                    out.push_str(&format!("/{} Do\n", name));
                    out.push_str("Q\n");
                }
            }
        }
    }
    out
}

// WinAnsi covers ASCII and Latin-1 directly; anything else degrades to '?'.
fn encode_winansi_pdf_string(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        let byte = match ch {
            '\u{0000}'..='\u{007F}' | '\u{00A0}'..='\u{00FF}' => ch as u8,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            _ => b'?',
        };
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            b if b < 0x20 || b >= 0x7f => out.push_str(&format!("\\{:03o}", b)),
            b => out.push(b as char),
        }
    }
    out
}

pub(crate) fn format_milli(milli: i64) -> String {
    if milli == 0 {
        return "0".to_string();
    }
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.abs();
    let int_part = abs / 1000;
    let frac_part = abs % 1000;
    if frac_part == 0 {
        format!("{}{}", sign, int_part)
    } else {
        let mut s = format!("{}{}.{:03}", sign, int_part, frac_part);
        while s.ends_with('0') {
            s.pop();
        }
        s
    }
}

pub(crate) fn fmt_pt(value: Pt) -> String {
    format_milli(value.to_milli_i64())
}

fn fmt_unit(value: f32) -> String {
    let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
    format_milli((value as f64 * 1000.0).round() as i64)
}

fn color_to_pdf(color: Color, op: &str) -> String {
    format!(
        "{} {} {} {}\n",
        fmt_unit(color.r),
        fmt_unit(color.g),
        fmt_unit(color.b),
        op
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Canvas;
    use crate::types::Size;

    fn tiny_png(width: u32, height: u32, alpha: u8) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 10, 10, alpha]));
        let mut out = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .expect("encode png");
        out.into_inner()
    }

    #[test]
    fn format_milli_trims_trailing_zeros() {
        assert_eq!(format_milli(0), "0");
        assert_eq!(format_milli(1500), "1.5");
        assert_eq!(format_milli(-27746000), "-27746");
        assert_eq!(format_milli(12), "0.012");
    }

    #[test]
    fn winansi_escapes_delimiters_and_latin1() {
        assert_eq!(encode_winansi_pdf_string("a(b)\\"), "a\\(b\\)\\\\");
        assert_eq!(encode_winansi_pdf_string("é"), "\\351");
        assert_eq!(encode_winansi_pdf_string("漢"), "?");
    }

    #[test]
    fn text_baseline_is_flipped_into_pdf_space() {
        let mut canvas = Canvas::new(Size::new(100.0, 200.0));
        canvas.set_font_size(Pt::from_i32(10));
        canvas.draw_string(Pt::from_i32(5), Pt::from_i32(20), "hi");
        let doc = canvas.finish();
        let fonts = BTreeMap::from([(
            Base14Font::Helvetica,
            ("F1".to_string(), (1, 0)),
        )]);
        let content = render_page(&doc.pages[0], doc.page_size.height, &fonts, &BTreeMap::new());
        assert!(content.contains("/F1 10 Tf\n5 170 Td\n(hi) Tj"));
    }

    #[test]
    fn document_round_trips_through_lopdf() {
        let mut images = ImageStore::new();
        images.insert_bytes("a", tiny_png(2, 2, 255), "image/png");
        images.insert_bytes("b", tiny_png(2, 2, 255), "image/png");
        images.insert_bytes("c", tiny_png(3, 1, 128), "image/png");

        let mut canvas = Canvas::new(Size::new(300.0, 400.0));
        canvas.set_font(Base14Font::Courier);
        canvas.draw_string(Pt::from_i32(10), Pt::from_i32(10), "page one");
        for id in ["a", "b", "c"] {
            canvas.draw_image(Pt::ZERO, Pt::ZERO, Size::new(10.0, 10.0), id);
        }
        canvas.show_page();
        canvas.draw_string(Pt::from_i32(10), Pt::from_i32(10), "page two");
        let bytes = document_to_pdf(&canvas.finish(), &images).expect("pdf");

        let pdf = lopdf::Document::load_mem(&bytes).expect("load");
        let pages = pdf.get_pages();
        assert_eq!(pages.len(), 2);
        let images: Vec<_> = pdf
            .objects
            .values()
            .filter_map(|obj| obj.as_stream().ok())
            .filter(|stream| {
                stream
                    .dict
                    .get(b"Subtype")
                    .and_then(|v| v.as_name())
                    .map(|name| name == b"Image")
                    .unwrap_or(false)
            })
            .collect();
        // "a" and "b" share one XObject; "c" brings its own plus an SMask.
        assert_eq!(images.len(), 3);
    }

    #[test]
    fn undecodable_images_are_skipped() {
        let mut images = ImageStore::new();
        images.insert_bytes("bad", b"\x89PNG broken".to_vec(), "image/png");
        let mut canvas = Canvas::new(Size::new(100.0, 100.0));
        canvas.draw_image(Pt::ZERO, Pt::ZERO, Size::new(10.0, 10.0), "bad");
        let bytes = document_to_pdf(&canvas.finish(), &images).expect("pdf");
        let pdf = lopdf::Document::load_mem(&bytes).expect("load");
        assert_eq!(pdf.get_pages().len(), 1);
    }
}
