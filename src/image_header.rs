//! Pixel dimension sniffing for PNG and JPEG payloads.
//!
//! Only the container headers are inspected; nothing is decoded. Every failure mode
//! (unknown MIME type, bad signature, truncated buffer, zero-sized image) reports
//! `None` so a broken image never aborts a conversion.

const PNG_SIGNATURE: [u8; 4] = [0x89, b'P', b'N', b'G'];
const PNG_WIDTH_OFFSET: usize = 16;
const PNG_HEIGHT_OFFSET: usize = 20;

const JPEG_SOI: u16 = 0xFFD8;
const JPEG_EOI: u16 = 0xFFD9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageMime {
    Png,
    Jpeg,
}

impl ImageMime {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageMime::Png => "image/png",
            ImageMime::Jpeg => "image/jpeg",
        }
    }

    pub fn from_mime(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "image/png" => Some(ImageMime::Png),
            "image/jpeg" => Some(ImageMime::Jpeg),
            _ => None,
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim().to_ascii_lowercase().as_str() {
            "png" => Some(ImageMime::Png),
            "jpg" | "jpeg" => Some(ImageMime::Jpeg),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

impl ImageDimensions {
    // Zero-sized images are treated as "no dimensions".
    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self { width, height })
    }
}

/// Reads pixel dimensions for a payload declared as `mime`.
pub fn read_dimensions(data: &[u8], mime: &str) -> Option<ImageDimensions> {
    match ImageMime::from_mime(mime)? {
        ImageMime::Png => png_dimensions(data),
        ImageMime::Jpeg => jpeg_dimensions(data),
    }
}

pub fn png_dimensions(data: &[u8]) -> Option<ImageDimensions> {
    if data.get(..PNG_SIGNATURE.len())? != PNG_SIGNATURE {
        return None;
    }
    let width = read_u32_be(data, PNG_WIDTH_OFFSET)?;
    let height = read_u32_be(data, PNG_HEIGHT_OFFSET)?;
    ImageDimensions::new(width, height)
}

pub fn jpeg_dimensions(data: &[u8]) -> Option<ImageDimensions> {
    if read_u16_be(data, 0)? != JPEG_SOI {
        return None;
    }
    let mut offset = 2usize;
    loop {
        if *data.get(offset)? != 0xFF {
            return None;
        }
        let code = read_u16_be(data, offset)?;
        if code == 0xFFFF {
            // Fill byte before the real marker.
            offset += 1;
            continue;
        }
        if code == JPEG_EOI {
            return None;
        }
        if jpeg_marker_without_payload(code) {
            offset += 2;
            continue;
        }
        let length = read_u16_be(data, offset + 2)? as usize;
        if length < 2 {
            return None;
        }
        if jpeg_is_start_of_frame(code) {
            let height = read_u16_be(data, offset + 5)? as u32;
            let width = read_u16_be(data, offset + 7)? as u32;
            return ImageDimensions::new(width, height);
        }
        offset = offset.checked_add(2 + length)?;
    }
}

fn jpeg_marker_without_payload(code: u16) -> bool {
    matches!(code, 0xFF01 | 0xFFD0..=0xFFD7 | JPEG_SOI)
}

fn jpeg_is_start_of_frame(code: u16) -> bool {
    // SOF0..SOF15 minus DHT (C4), JPG (C8) and DAC (CC), which share the range.
    matches!(code, 0xFFC0..=0xFFCF) && !matches!(code, 0xFFC4 | 0xFFC8 | 0xFFCC)
}

fn read_u16_be(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

fn read_u32_be(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_header(width: u32, height: u32) -> Vec<u8> {
        let mut out = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        out.extend_from_slice(&13u32.to_be_bytes());
        out.extend_from_slice(b"IHDR");
        out.extend_from_slice(&width.to_be_bytes());
        out.extend_from_slice(&height.to_be_bytes());
        out
    }

    #[test]
    fn png_header_reads_dimensions() {
        let bytes = png_header(800, 600);
        assert_eq!(bytes.len(), 24);
        assert_eq!(
            read_dimensions(&bytes, "image/png"),
            Some(ImageDimensions {
                width: 800,
                height: 600
            })
        );
    }

    #[test]
    fn png_signature_mismatch_yields_none() {
        let mut bytes = png_header(800, 600);
        bytes[1] = b'X';
        assert_eq!(read_dimensions(&bytes, "image/png"), None);
    }

    #[test]
    fn png_truncated_header_yields_none() {
        let bytes = png_header(800, 600);
        assert_eq!(png_dimensions(&bytes[..22]), None);
        assert_eq!(png_dimensions(&[]), None);
    }

    #[test]
    fn png_zero_height_is_rejected() {
        assert_eq!(png_dimensions(&png_header(10, 0)), None);
    }

    #[test]
    fn jpeg_start_of_frame_reads_dimensions() {
        let bytes = [
            0xFF, 0xD8, 0xFF, 0xC0, 0x00, 0x11, 0x08, 0x01, 0x40, 0x01, 0x90, 0x03, 0x01, 0x22,
            0x00,
        ];
        assert_eq!(
            read_dimensions(&bytes, "image/jpeg"),
            Some(ImageDimensions {
                width: 400,
                height: 320
            })
        );
    }

    #[test]
    fn jpeg_skips_app_segments_before_frame() {
        let mut bytes = vec![0xFF, 0xD8];
        // APP0 with a 16-byte payload (length includes the length field).
        bytes.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10]);
        bytes.extend_from_slice(&[0u8; 14]);
        // Padding byte, then a progressive SOF2.
        bytes.extend_from_slice(&[0xFF, 0xFF, 0xC2, 0x00, 0x11, 0x08, 0x00, 0x20, 0x00, 0x40]);
        assert_eq!(
            jpeg_dimensions(&bytes),
            Some(ImageDimensions {
                width: 64,
                height: 32
            })
        );
    }

    #[test]
    fn jpeg_huffman_table_is_not_a_frame() {
        let mut bytes = vec![0xFF, 0xD8];
        bytes.extend_from_slice(&[0xFF, 0xC4, 0x00, 0x07, 0x00, 0x10, 0x00, 0x20, 0x00]);
        bytes.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08, 0x00, 0x05, 0x00, 0x06]);
        assert_eq!(
            jpeg_dimensions(&bytes),
            Some(ImageDimensions {
                width: 6,
                height: 5
            })
        );
    }

    #[test]
    fn jpeg_end_of_image_before_frame_yields_none() {
        let bytes = [0xFF, 0xD8, 0xFF, 0xD9, 0xFF, 0xC0, 0x00, 0x11, 0x08, 0x00, 0x05];
        assert_eq!(jpeg_dimensions(&bytes), None);
    }

    #[test]
    fn jpeg_truncated_stream_yields_none() {
        let bytes = [0xFF, 0xD8, 0xFF, 0xE1, 0x00, 0x40, 0x00];
        assert_eq!(jpeg_dimensions(&bytes), None);
        assert_eq!(jpeg_dimensions(&[0xFF, 0xD8]), None);
        assert_eq!(jpeg_dimensions(&[0xFF]), None);
    }

    #[test]
    fn jpeg_bad_length_yields_none() {
        let bytes = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x01, 0x00, 0x00];
        assert_eq!(jpeg_dimensions(&bytes), None);
    }

    #[test]
    fn unsupported_mime_yields_none() {
        let bytes = png_header(800, 600);
        assert_eq!(read_dimensions(&bytes, "image/gif"), None);
        assert_eq!(read_dimensions(&bytes, "image/svg+xml"), None);
    }

    #[test]
    fn mime_parsing_is_case_insensitive() {
        assert_eq!(ImageMime::from_mime(" IMAGE/PNG "), Some(ImageMime::Png));
        assert_eq!(ImageMime::from_extension("JPG"), Some(ImageMime::Jpeg));
        assert_eq!(ImageMime::from_extension("webp"), None);
    }
}
