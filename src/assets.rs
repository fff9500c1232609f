use crate::error::OnePageError;
use crate::image_extent::ImageRecord;
use crate::image_header::{self, ImageDimensions, ImageMime};
use base64::Engine;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct ImageAsset {
    pub data: Vec<u8>,
    pub mime: String,
    pub source: Option<String>,
}

impl ImageAsset {
    pub fn new(data: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            data,
            mime: mime.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> Option<ImageMime> {
        ImageMime::from_mime(&self.mime)
    }

    pub fn dimensions(&self) -> Option<ImageDimensions> {
        image_header::read_dimensions(&self.data, &self.mime)
    }

    pub fn bytes_len(&self) -> usize {
        self.data.len()
    }
}

/// Encoded image payloads keyed by the id content nodes refer to.
#[derive(Debug, Clone, Default)]
pub struct ImageStore {
    by_id: BTreeMap<String, ImageAsset>,
}

impl ImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, asset: ImageAsset) {
        self.by_id.insert(id.into(), asset);
    }

    pub fn insert_bytes(&mut self, id: impl Into<String>, data: Vec<u8>, mime: &str) {
        self.insert(id, ImageAsset::new(data, mime));
    }

    // MIME type comes from the file extension; unknown extensions are kept with an
    // octet-stream type so the node degrades to a placeholder instead of failing.
    pub fn insert_path(&mut self, id: impl Into<String>, path: &Path) -> Result<(), OnePageError> {
        let data = std::fs::read(path).map_err(|err| {
            OnePageError::Asset(format!("failed to read image {}: {}", path.display(), err))
        })?;
        let mime = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(ImageMime::from_extension)
            .map(|kind| kind.as_str())
            .unwrap_or("application/octet-stream");
        let asset = ImageAsset::new(data, mime).with_source(path.display().to_string());
        self.insert(id, asset);
        Ok(())
    }

    pub fn insert_data_uri(
        &mut self,
        id: impl Into<String>,
        uri: &str,
    ) -> Result<(), OnePageError> {
        let (mime, data) = parse_data_uri(uri)
            .ok_or_else(|| OnePageError::Asset("malformed data uri".to_string()))?;
        self.insert(id, ImageAsset::new(data, mime));
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&ImageAsset> {
        self.by_id.get(id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn dimensions(&self, id: &str) -> Option<ImageDimensions> {
        self.get(id).and_then(ImageAsset::dimensions)
    }

    /// Header-derived records for the given ids; unknown or unreadable ids are skipped.
    pub fn records<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> Vec<ImageRecord> {
        let mut out: BTreeMap<&str, ImageRecord> = BTreeMap::new();
        for id in ids {
            if out.contains_key(id) {
                continue;
            }
            if let Some(dims) = self.dimensions(id) {
                out.insert(id, ImageRecord::new(id, dims));
            }
        }
        out.into_values().collect()
    }
}

fn parse_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.strip_prefix("data:")?;
    let (header, data_part) = rest.split_once(',')?;
    let mime = header
        .split(';')
        .next()
        .filter(|v| !v.is_empty())
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = if header.contains("base64") {
        base64::engine::general_purpose::STANDARD
            .decode(data_part.trim())
            .ok()?
    } else {
        data_part.as_bytes().to_vec()
    };
    Some((mime, data))
}
