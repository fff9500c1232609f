use crate::image_header::ImageDimensions;
use crate::types::{Pt, Size};

/// Box every image is scaled into, preserving aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitBox {
    pub width: Pt,
    pub height: Pt,
}

impl FitBox {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width: Pt::from_f32(width),
            height: Pt::from_f32(height),
        }
    }

    fn aspect(&self) -> Option<f64> {
        let height = self.height.to_f64();
        if height <= 0.0 {
            return None;
        }
        Some(self.width.to_f64() / height)
    }
}

impl Default for FitBox {
    fn default() -> Self {
        Self::new(500.0, 400.0)
    }
}

/// Image placement rules shared by the layout engine and the extent corrector.
///
/// The engine draws every image with [`fit_image`] against this fit box and pads it
/// with these margins; the corrector predicts image footprints from the same value.
/// Passing one `ImageLayout` to both is what keeps the two computations in agreement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageLayout {
    pub fit_box: FitBox,
    pub margin_top: Pt,
    pub margin_bottom: Pt,
}

impl ImageLayout {
    pub fn new(fit_box: FitBox, margin_top: f32, margin_bottom: f32) -> Self {
        Self {
            fit_box,
            margin_top: Pt::from_f32(margin_top),
            margin_bottom: Pt::from_f32(margin_bottom),
        }
    }

    pub fn vertical_margin(&self) -> Pt {
        self.margin_top + self.margin_bottom
    }

    /// Rendered height plus the fixed top and bottom margins.
    pub fn footprint(&self, dims: ImageDimensions) -> Option<Pt> {
        let size = fit_image(dims, self.fit_box)?;
        Some(size.height + self.vertical_margin())
    }
}

impl Default for ImageLayout {
    fn default() -> Self {
        Self::new(FitBox::default(), 5.0, 10.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub id: String,
    pub pixel_width: u32,
    pub pixel_height: u32,
}

impl ImageRecord {
    pub fn new(id: impl Into<String>, dims: ImageDimensions) -> Self {
        Self {
            id: id.into(),
            pixel_width: dims.width,
            pixel_height: dims.height,
        }
    }

    pub fn dimensions(&self) -> Option<ImageDimensions> {
        ImageDimensions::new(self.pixel_width, self.pixel_height)
    }
}

/// Rendered size of an image scaled into `fit_box`.
///
/// Wider-than-box images are width-constrained and take the full box width. Everything
/// else is height-constrained and never upscaled past its pixel height.
pub fn fit_image(dims: ImageDimensions, fit_box: FitBox) -> Option<Size> {
    if dims.height == 0 || dims.width == 0 {
        return None;
    }
    let box_aspect = fit_box.aspect()?;
    let aspect = dims.width as f64 / dims.height as f64;
    if aspect > box_aspect {
        let height = fit_box.width.to_f64() / aspect;
        return Some(Size {
            width: fit_box.width,
            height: Pt::from_f64(height),
        });
    }
    let height = (dims.height as f64).min(fit_box.height.to_f64());
    Some(Size {
        width: Pt::from_f64(height * aspect),
        height: Pt::from_f64(height),
    })
}

pub fn rendered_height(dims: ImageDimensions, fit_box: FitBox) -> Option<Pt> {
    fit_image(dims, fit_box).map(|size| size.height)
}
