mod assets;
mod canvas;
mod content;
mod correct;
mod debug;
mod doc_template;
mod error;
mod flowable;
mod font;
mod frame;
mod image_extent;
mod image_header;
mod layout;
mod measure;
mod metrics;
mod pdf;
mod pdfinspect;
mod resize;
mod story;
mod types;

pub use assets::{ImageAsset, ImageStore};
pub use canvas::{Canvas, Command, Document, NodeKind, Page, Placement};
pub use content::{ContentNode, FontRole, TableNode, TextBlock, TextStyle};
pub use correct::{CorrectionMethod, DEFAULT_FALLBACK_RATIO, ExtentCorrection, ExtentCorrector};
use debug::DebugLogger;
pub use doc_template::DocTemplate;
pub use error::OnePageError;
pub use flowable::{
    ColumnsFlowable, Flowable, ImageFlowable, Paragraph, Spacer, StackFlowable, TableFlowable,
};
pub use font::{Base14Font, FontConfig};
pub use frame::{AddResult, Frame};
pub use image_extent::{FitBox, ImageLayout, ImageRecord, fit_image, rendered_height};
pub use image_header::{
    ImageDimensions, ImageMime, jpeg_dimensions, png_dimensions, read_dimensions,
};
pub use layout::{BreakDecision, FlowEngine, LayoutEngine, LayoutJob, LayoutObserver, NodeEvent};
pub use measure::{ExtentObserver, MeasurementResult, measure};
pub use metrics::{ConversionMetrics, DocumentMetrics, PageMetrics};
pub use pdf::document_to_pdf;
pub use pdfinspect::{
    PageBox, PdfInspectError, PdfInspectErrorCode, PdfInspectReport, inspect_pdf_bytes,
    inspect_pdf_path,
};
pub use resize::{ResizeOutcome, final_offset, resize_pdf, target_page_height};
pub use story::StoryBuilder;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
pub use types::{Color, Margins, Pt, Rect, Size};

/// Height of the canvas the final render is laid out on (about 10 m), tall enough
/// that realistic content never needs a second page.
pub const OVERSIZED_CANVAS_HEIGHT: f32 = 28346.0;

/// Extra space kept below the content on the resized page.
pub const BOTTOM_PADDING: f32 = 25.0;

pub const DEFAULT_PAGE_WIDTH: f32 = 595.28;

pub const DEFAULT_MARGIN: f32 = 40.0;

/// Everything the sizing pipeline decided for one conversion.
#[derive(Debug, Clone)]
pub struct ConversionReport {
    pub measurement: MeasurementResult,
    pub correction: ExtentCorrection,
    pub target_height: Pt,
    pub resize: ResizeOutcome,
    /// Image ids replaced by placeholder text because no dimensions could be read.
    pub placeholder_images: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Conversion {
    pub pdf: Vec<u8>,
    pub report: ConversionReport,
    pub metrics: ConversionMetrics,
}

/// Renders a content tree onto a single page sized to the content.
pub struct OnePage {
    page_width: Pt,
    margins: Margins,
    oversized_height: Pt,
    bottom_padding: Pt,
    image_layout: ImageLayout,
    font_config: FontConfig,
    fallback_ratio: f32,
    parallel_stages: bool,
    engine: Arc<dyn LayoutEngine>,
    debug: Option<Arc<DebugLogger>>,
}

#[derive(Clone)]
pub struct OnePageBuilder {
    page_width: f32,
    margins: Margins,
    oversized_height: f32,
    bottom_padding: f32,
    image_layout: ImageLayout,
    font_config: FontConfig,
    fallback_ratio: f32,
    parallel_stages: bool,
    engine: Option<Arc<dyn LayoutEngine>>,
    debug_path: Option<PathBuf>,
}

impl Default for OnePageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OnePageBuilder {
    pub fn new() -> Self {
        Self {
            page_width: DEFAULT_PAGE_WIDTH,
            margins: Margins::all(DEFAULT_MARGIN),
            oversized_height: OVERSIZED_CANVAS_HEIGHT,
            bottom_padding: BOTTOM_PADDING,
            image_layout: ImageLayout::default(),
            font_config: FontConfig::default(),
            fallback_ratio: DEFAULT_FALLBACK_RATIO,
            parallel_stages: false,
            engine: None,
            debug_path: None,
        }
    }

    pub fn page_width(mut self, width: f32) -> Self {
        self.page_width = width;
        self
    }

    pub fn margins(mut self, margins: Margins) -> Self {
        self.margins = margins;
        self
    }

    pub fn margin_all(mut self, value: f32) -> Self {
        self.margins = Margins::all(value);
        self
    }

    pub fn oversized_height(mut self, height: f32) -> Self {
        self.oversized_height = height;
        self
    }

    pub fn bottom_padding(mut self, padding: f32) -> Self {
        self.bottom_padding = padding;
        self
    }

    pub fn image_layout(mut self, layout: ImageLayout) -> Self {
        self.image_layout = layout;
        self
    }

    pub fn fit_box(mut self, width: f32, height: f32) -> Self {
        self.image_layout.fit_box = FitBox::new(width, height);
        self
    }

    pub fn font_config(mut self, config: FontConfig) -> Self {
        self.font_config = config;
        self
    }

    // Share of the total image footprint added when the layout reported no image
    // positions at all. Heuristic.
    pub fn fallback_ratio(mut self, ratio: f32) -> Self {
        self.fallback_ratio = ratio;
        self
    }

    /// Run the measure/correct stages and the oversized render on separate threads.
    pub fn parallel_stages(mut self, enabled: bool) -> Self {
        self.parallel_stages = enabled;
        self
    }

    pub fn layout_engine(mut self, engine: impl LayoutEngine + 'static) -> Self {
        self.engine = Some(Arc::new(engine));
        self
    }

    pub fn debug_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<OnePage, OnePageError> {
        if !self.page_width.is_finite() || self.page_width <= 0.0 {
            return Err(OnePageError::InvalidConfiguration(
                "page_width must be > 0".to_string(),
            ));
        }
        if !self.oversized_height.is_finite() || self.oversized_height <= 0.0 {
            return Err(OnePageError::InvalidConfiguration(
                "oversized_height must be > 0".to_string(),
            ));
        }
        if !self.margins.is_non_negative() {
            return Err(OnePageError::InvalidConfiguration(
                "margins must be >= 0".to_string(),
            ));
        }
        if Pt::from_f32(self.oversized_height) <= self.margins.vertical() {
            return Err(OnePageError::InvalidConfiguration(
                "oversized_height must exceed the vertical margins".to_string(),
            ));
        }
        if !self.bottom_padding.is_finite() || self.bottom_padding < 0.0 {
            return Err(OnePageError::InvalidConfiguration(
                "bottom_padding must be >= 0".to_string(),
            ));
        }
        let fit_box = self.image_layout.fit_box;
        if fit_box.width <= Pt::ZERO || fit_box.height <= Pt::ZERO {
            return Err(OnePageError::InvalidConfiguration(
                "fit box sides must be > 0".to_string(),
            ));
        }
        if self.image_layout.margin_top < Pt::ZERO || self.image_layout.margin_bottom < Pt::ZERO {
            return Err(OnePageError::InvalidConfiguration(
                "image margins must be >= 0".to_string(),
            ));
        }
        if !self.fallback_ratio.is_finite() || self.fallback_ratio < 0.0 {
            return Err(OnePageError::InvalidConfiguration(
                "fallback_ratio must be >= 0".to_string(),
            ));
        }
        if self.font_config.line_height_percent <= 0 {
            return Err(OnePageError::InvalidConfiguration(
                "line_height_percent must be > 0".to_string(),
            ));
        }
        let debug = if let Some(path) = self.debug_path {
            Some(Arc::new(DebugLogger::new(path)?))
        } else {
            None
        };
        let engine = self
            .engine
            .unwrap_or_else(|| Arc::new(FlowEngine::new().with_debug(debug.clone())));
        Ok(OnePage {
            page_width: Pt::from_f32(self.page_width),
            margins: self.margins,
            oversized_height: Pt::from_f32(self.oversized_height),
            bottom_padding: Pt::from_f32(self.bottom_padding),
            image_layout: self.image_layout,
            font_config: self.font_config,
            fallback_ratio: self.fallback_ratio,
            parallel_stages: self.parallel_stages,
            engine,
            debug,
        })
    }
}

type SizingStage = (MeasurementResult, ExtentCorrection, f64);

impl OnePage {
    pub fn builder() -> OnePageBuilder {
        OnePageBuilder::new()
    }

    pub fn oversized_canvas(&self) -> Size {
        Size {
            width: self.page_width,
            height: self.oversized_height,
        }
    }

    fn emit_debug_summary(&self, context: &str) {
        if let Some(logger) = self.debug.as_deref() {
            logger.emit_summary(context);
            logger.flush();
        }
    }

    fn log_event(&self, value: serde_json::Value) {
        if let Some(logger) = self.debug.as_deref() {
            logger.log_value(&value);
        }
    }

    /// Lays `content` out once to find its extent, renders it on the oversized
    /// canvas, and shrinks that render to a single page of the corrected height.
    pub fn convert(
        &self,
        content: &ContentNode,
        images: &ImageStore,
    ) -> Result<Conversion, OnePageError> {
        let total_start = Instant::now();
        let (tree, placeholder_images) = content.with_image_placeholders(images);
        for id in &placeholder_images {
            log::warn!("image {id} has no readable dimensions; rendering a placeholder");
            self.log_event(json!({
                "type": "image.placeholder",
                "image_id": id,
                "declared_mime": images.get(id).map(|asset| asset.mime.as_str()),
            }));
            if let Some(logger) = self.debug.as_deref() {
                logger.increment("image.placeholder", 1);
            }
        }

        let job = LayoutJob {
            content: &tree,
            page_size: self.oversized_canvas(),
            margins: self.margins,
            images,
            fonts: &self.font_config,
            image_layout: self.image_layout,
        };
        let size_stage = || self.run_sizing(&job, images);
        let render_stage = || -> Result<(Vec<u8>, f64), OnePageError> {
            let start = Instant::now();
            let bytes = self.engine.render(&job)?;
            Ok((bytes, start.elapsed().as_secs_f64() * 1000.0))
        };
        let ((measurement, correction, measure_ms), (oversized_pdf, render_ms)) =
            if self.parallel_stages {
                let (sized, rendered) = rayon::join(size_stage, render_stage);
                (sized?, rendered?)
            } else {
                let sized = size_stage()?;
                (sized, render_stage()?)
            };

        let resize_start = Instant::now();
        let target_height =
            target_page_height(&self.margins, correction.corrected_extent, self.bottom_padding);
        let (pdf, resize) = resize_pdf(&oversized_pdf, target_height, self.oversized_height)?;
        let resize_ms = resize_start.elapsed().as_secs_f64() * 1000.0;
        match &resize {
            ResizeOutcome::Applied {
                translation,
                removed_pages,
                ..
            } => {
                log::debug!(
                    "resized page to {}pt (shift {}pt, {} page(s) dropped)",
                    target_height.to_f32(),
                    translation.to_f32(),
                    removed_pages
                );
                self.log_event(json!({
                    "type": "resize.applied",
                    "target_height": target_height.to_f64(),
                    "translation": translation.to_f64(),
                    "removed_pages": removed_pages,
                }));
            }
            ResizeOutcome::Skipped => {
                log::warn!("rendered PDF has no pages; returning it unresized");
                self.log_event(json!({"type": "resize.skipped", "reason": "no_pages"}));
            }
        }

        let metrics = ConversionMetrics {
            measure_ms,
            render_ms,
            resize_ms,
            total_ms: total_start.elapsed().as_secs_f64() * 1000.0,
            node_events: measurement.node_count,
            measured_pages: measurement.max_page_index,
        };
        if let Some(logger) = self.debug.as_deref() {
            logger.increment("convert.pdf_bytes", pdf.len() as u64);
        }
        self.emit_debug_summary("convert");
        Ok(Conversion {
            pdf,
            report: ConversionReport {
                measurement,
                correction,
                target_height,
                resize,
                placeholder_images,
            },
            metrics,
        })
    }

    pub fn convert_to_file(
        &self,
        content: &ContentNode,
        images: &ImageStore,
        path: impl AsRef<std::path::Path>,
    ) -> Result<Conversion, OnePageError> {
        let conversion = self.convert(content, images)?;
        std::fs::write(path, &conversion.pdf)?;
        Ok(conversion)
    }

    fn run_sizing(
        &self,
        job: &LayoutJob<'_>,
        images: &ImageStore,
    ) -> Result<SizingStage, OnePageError> {
        let start = Instant::now();
        let measurement = measure(self.engine.as_ref(), job)?;
        log::debug!(
            "measured extent {}pt over {} page(s), {} node event(s)",
            measurement.max_extent.to_f32(),
            measurement.max_page_index,
            measurement.node_count
        );
        self.log_event(json!({
            "type": "measure.summary",
            "max_extent": measurement.max_extent.to_f64(),
            "max_page_index": measurement.max_page_index,
            "node_count": measurement.node_count,
            "image_tops": measurement
                .image_top_positions
                .iter()
                .map(|(id, top)| (id.clone(), json!(top.to_f64())))
                .collect::<serde_json::Map<_, _>>(),
        }));

        let records = images.records(job.content.image_refs());
        let correction = ExtentCorrector::new(self.image_layout)
            .with_fallback_ratio(self.fallback_ratio)
            .correct(&measurement, &records);
        log::debug!(
            "extent correction {:?}: +{}pt",
            correction.method,
            correction.correction.to_f32()
        );
        self.log_event(json!({
            "type": "extent.correction",
            "method": format!("{:?}", correction.method),
            "correction": correction.correction.to_f64(),
            "corrected_extent": correction.corrected_extent.to_f64(),
            "total_footprint": correction.total_footprint.to_f64(),
            "images": correction.footprints.len(),
        }));
        Ok((measurement, correction, start.elapsed().as_secs_f64() * 1000.0))
    }
}
