use lopdf::{Document as LoDocument, Object, ObjectId};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfInspectErrorCode {
    PdfParseFailed,
    PdfIoError,
}

impl PdfInspectErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PdfInspectErrorCode::PdfParseFailed => "PDF_PARSE_FAILED",
            PdfInspectErrorCode::PdfIoError => "PDF_IO_ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfInspectError {
    pub code: PdfInspectErrorCode,
    pub message: String,
}

impl std::fmt::Display for PdfInspectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for PdfInspectError {}

/// `[llx, lly, urx, ury]` in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub llx: f64,
    pub lly: f64,
    pub urx: f64,
    pub ury: f64,
}

impl PageBox {
    pub fn width(&self) -> f64 {
        self.urx - self.llx
    }

    pub fn height(&self) -> f64 {
        self.ury - self.lly
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PdfInspectReport {
    pub pdf_version: String,
    pub page_count: usize,
    pub encrypted: bool,
    pub file_size_bytes: usize,
    /// Media box of each page in page order; `None` when absent or malformed.
    pub media_boxes: Vec<Option<PageBox>>,
}

pub fn inspect_pdf_bytes(bytes: &[u8]) -> Result<PdfInspectReport, PdfInspectError> {
    let pdf = LoDocument::load_mem(bytes).map_err(|err| PdfInspectError {
        code: PdfInspectErrorCode::PdfParseFailed,
        message: err.to_string(),
    })?;

    let pages = pdf.get_pages();
    let media_boxes = pages
        .values()
        .map(|page_id| page_box(&pdf, *page_id, b"MediaBox"))
        .collect();
    Ok(PdfInspectReport {
        pdf_version: pdf.version.clone(),
        page_count: pages.len(),
        encrypted: pdf.is_encrypted(),
        file_size_bytes: bytes.len(),
        media_boxes,
    })
}

pub fn inspect_pdf_path(path: &Path) -> Result<PdfInspectReport, PdfInspectError> {
    let data = std::fs::read(path).map_err(|err| PdfInspectError {
        code: PdfInspectErrorCode::PdfIoError,
        message: err.to_string(),
    })?;
    inspect_pdf_bytes(&data)
}

const MAX_INHERIT_DEPTH: usize = 32;

/// Reads `key` (`MediaBox`, `CropBox`) from a page dictionary, falling back to
/// the `Pages` ancestors and following an indirect reference if the array is
/// stored separately.
pub(crate) fn page_box(pdf: &LoDocument, page_id: ObjectId, key: &[u8]) -> Option<PageBox> {
    let mut node = pdf.get_dictionary(page_id).ok()?;
    let mut value = None;
    for _ in 0..MAX_INHERIT_DEPTH {
        if let Ok(found) = node.get(key) {
            value = Some(found);
            break;
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = pdf.get_dictionary(parent).ok()?;
    }
    let mut value = value?;
    if let Object::Reference(id) = value {
        value = pdf.get_object(*id).ok()?;
    }
    let values = value.as_array().ok()?;
    if values.len() != 4 {
        return None;
    }
    let mut nums = [0.0f64; 4];
    for (slot, value) in nums.iter_mut().zip(values) {
        *slot = number(value)?;
    }
    Some(PageBox {
        llx: nums[0],
        lly: nums[1],
        urx: nums[2],
        ury: nums[3],
    })
}

fn number(value: &Object) -> Option<f64> {
    match value {
        Object::Integer(v) => Some(*v as f64),
        Object::Real(v) => Some(*v as f64),
        _ => None,
    }
}
