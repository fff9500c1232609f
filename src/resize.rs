//! Shrinks the oversized render to its target height, keeping content anchored
//! to the top edge.

use crate::error::OnePageError;
use crate::pdf::{fmt_pt, pt_object};
use crate::pdfinspect::page_box;
use crate::types::{Margins, Pt};
use lopdf::{Object, Stream, dictionary};

#[derive(Debug, Clone, PartialEq)]
pub enum ResizeOutcome {
    Applied {
        target_height: Pt,
        translation: Pt,
        removed_pages: usize,
    },
    /// The PDF had no pages; bytes were passed through untouched.
    Skipped,
}

/// Page height needed to hold `corrected_extent` plus margins and padding.
pub fn target_page_height(margins: &Margins, corrected_extent: Pt, bottom_padding: Pt) -> Pt {
    margins.top + corrected_extent + margins.bottom + bottom_padding
}

/// Vertical shift that keeps the top edge in place when a page of height
/// `oversized` becomes `target` tall (PDF origin is bottom-left).
pub fn final_offset(target: Pt, oversized: Pt) -> Pt {
    target - oversized
}

/// Resizes the first page of `bytes` to `target_height`, shifts its content by
/// `final_offset(target_height, oversized_height)` and drops every other page.
pub fn resize_pdf(
    bytes: &[u8],
    target_height: Pt,
    oversized_height: Pt,
) -> Result<(Vec<u8>, ResizeOutcome), OnePageError> {
    let mut pdf = lopdf::Document::load_mem(bytes)?;
    let pages = pdf.get_pages();
    let Some((&first_number, &first_id)) = pages.iter().next() else {
        return Ok((bytes.to_vec(), ResizeOutcome::Skipped));
    };

    let width = page_box(&pdf, first_id, b"MediaBox")
        .map(|page_box| Pt::from_f64(page_box.width()))
        .ok_or_else(|| OnePageError::Pdf("first page has no usable MediaBox".to_string()))?;
    let had_crop_box = page_box(&pdf, first_id, b"CropBox").is_some();
    let translation = final_offset(target_height, oversized_height);

    let mut contents: Vec<Object> = Vec::new();
    let prefix_id = pdf.add_object(Stream::new(
        dictionary! {},
        format!("q 1 0 0 1 0 {} cm\n", fmt_pt(translation)).into_bytes(),
    ));
    contents.push(prefix_id.into());
    for content_id in pdf.get_page_contents(first_id) {
        contents.push(content_id.into());
    }
    let suffix_id = pdf.add_object(Stream::new(dictionary! {}, b"\nQ\n".to_vec()));
    contents.push(suffix_id.into());

    let new_box = vec![0.into(), 0.into(), pt_object(width), pt_object(target_height)];
    let page = pdf.get_dictionary_mut(first_id)?;
    page.set("Contents", contents);
    page.set("MediaBox", new_box.clone());
    if had_crop_box {
        page.set("CropBox", new_box);
    }

    let extra: Vec<u32> = pages
        .keys()
        .copied()
        .filter(|number| *number != first_number)
        .collect();
    if !extra.is_empty() {
        pdf.delete_pages(&extra);
        pdf.prune_objects();
    }

    let mut out = Vec::new();
    pdf.save_to(&mut out)?;
    Ok((
        out,
        ResizeOutcome::Applied {
            target_height,
            translation,
            removed_pages: extra.len(),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdfinspect::inspect_pdf_bytes;

    fn make_pdf(page_count: usize, height: i64, crop_box: bool) -> Vec<u8> {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids: Vec<Object> = Vec::new();
        for idx in 0..page_count {
            let content = format!("0 0 m {} {} l S", idx + 1, idx + 1).into_bytes();
            let content_id = doc.add_object(Stream::new(dictionary! {}, content));
            let mut page = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "MediaBox" => vec![0.into(), 0.into(), Object::Real(595.28), height.into()],
            };
            if crop_box {
                page.set("CropBox", vec![0.into(), 0.into(), Object::Real(595.28), height.into()]);
            }
            kids.push(doc.add_object(page).into());
        }
        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut out = Vec::new();
        doc.save_to(&mut out).expect("save");
        out
    }

    fn first_page_text(bytes: &[u8]) -> String {
        let pdf = lopdf::Document::load_mem(bytes).expect("load");
        let (_, page_id) = pdf.get_pages().into_iter().next().expect("page");
        String::from_utf8_lossy(&pdf.get_page_content(page_id).expect("content")).into_owned()
    }

    #[test]
    fn offset_preserves_the_top_edge() {
        let oversized = Pt::from_i32(28346);
        for target in [100, 600, 28346, 40000] {
            let target = Pt::from_i32(target);
            // A point `d` below the top of the big page sits at `oversized - d`; after
            // the shift it must sit `d` below the top of the small page.
            let d = Pt::from_i32(37);
            assert_eq!(oversized - d + final_offset(target, oversized), target - d);
        }
        assert_eq!(
            final_offset(Pt::from_i32(600), oversized),
            Pt::from_i32(-27746)
        );
    }

    #[test]
    fn target_height_adds_margins_and_padding() {
        let margins = Margins::all(40.0);
        assert_eq!(
            target_page_height(&margins, Pt::from_i32(500), Pt::from_i32(25)),
            Pt::from_i32(605)
        );
    }

    #[test]
    fn resize_sets_height_keeps_width_and_wraps_content() {
        let bytes = make_pdf(1, 28346, false);
        let (out, outcome) =
            resize_pdf(&bytes, Pt::from_i32(600), Pt::from_i32(28346)).expect("resize");
        assert_eq!(
            outcome,
            ResizeOutcome::Applied {
                target_height: Pt::from_i32(600),
                translation: Pt::from_i32(-27746),
                removed_pages: 0,
            }
        );
        let report = inspect_pdf_bytes(&out).expect("inspect");
        let media_box = report.media_boxes[0].expect("media box");
        assert_eq!(media_box.height(), 600.0);
        assert!((media_box.width() - 595.28).abs() < 1e-3);

        let text = first_page_text(&out);
        assert!(text.starts_with("q 1 0 0 1 0 -27746 cm\n"));
        assert!(text.contains("0 0 m 1 1 l S"));
        assert!(text.trim_end().ends_with('Q'));
    }

    #[test]
    fn resize_drops_trailing_pages() {
        let bytes = make_pdf(3, 28346, false);
        let (out, outcome) =
            resize_pdf(&bytes, Pt::from_i32(700), Pt::from_i32(28346)).expect("resize");
        assert!(matches!(outcome, ResizeOutcome::Applied { removed_pages: 2, .. }));
        let report = inspect_pdf_bytes(&out).expect("inspect");
        assert_eq!(report.page_count, 1);
        assert!(first_page_text(&out).contains("0 0 m 1 1 l S"));
    }

    #[test]
    fn crop_box_follows_media_box() {
        let bytes = make_pdf(1, 28346, true);
        let (out, _) =
            resize_pdf(&bytes, Pt::from_f32(612.5), Pt::from_i32(28346)).expect("resize");
        let pdf = lopdf::Document::load_mem(&out).expect("load");
        let (_, page_id) = pdf.get_pages().into_iter().next().expect("page");
        let crop = page_box(&pdf, page_id, b"CropBox").expect("crop box");
        assert!((crop.height() - 612.5).abs() < 1e-3);
    }

    #[test]
    fn empty_page_set_is_passed_through() {
        let bytes = make_pdf(0, 28346, false);
        let (out, outcome) =
            resize_pdf(&bytes, Pt::from_i32(600), Pt::from_i32(28346)).expect("resize");
        assert_eq!(outcome, ResizeOutcome::Skipped);
        assert_eq!(out, bytes);
    }

    #[test]
    fn garbage_input_is_a_pdf_error() {
        let err = resize_pdf(b"nope", Pt::from_i32(600), Pt::from_i32(28346)).expect_err("garbage");
        assert!(matches!(err, OnePageError::Pdf(_)));
    }
}
