//! Boundary between the page-sizing core and whatever lays the content out.
//!
//! A [`LayoutEngine`] runs in one of two modes: `measure` walks the layout and reports
//! each resolved node to a [`LayoutObserver`], `render` produces finished PDF bytes.
//! [`FlowEngine`] is the bundled implementation.

use crate::assets::ImageStore;
use crate::canvas::NodeKind;
use crate::content::ContentNode;
use crate::debug::DebugLogger;
use crate::doc_template::DocTemplate;
use crate::error::OnePageError;
use crate::font::FontConfig;
use crate::image_extent::ImageLayout;
use crate::pdf;
use crate::story::StoryBuilder;
use crate::types::{Margins, Pt, Size};
use std::sync::Arc;

/// Everything one engine invocation needs. Nothing is registered globally, so two
/// jobs can run concurrently.
#[derive(Clone, Copy)]
pub struct LayoutJob<'a> {
    pub content: &'a ContentNode,
    pub page_size: Size,
    pub margins: Margins,
    pub images: &'a ImageStore,
    pub fonts: &'a FontConfig,
    pub image_layout: ImageLayout,
}

/// A node whose position has been resolved.
///
/// `top` is measured from the top of the page's content area. Image nodes never
/// carry a `height`.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeEvent {
    pub kind: NodeKind,
    /// 1-based.
    pub page_index: Option<usize>,
    pub top: Option<Pt>,
    pub height: Option<Pt>,
    pub image_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakDecision {
    Continue,
    ForceBreak,
}

pub trait LayoutObserver {
    fn page_break_before(&mut self, _event: &NodeEvent) -> BreakDecision {
        BreakDecision::Continue
    }

    fn node_positioned(&mut self, event: &NodeEvent);
}

pub trait LayoutEngine: Send + Sync {
    fn measure(
        &self,
        job: &LayoutJob<'_>,
        observer: &mut dyn LayoutObserver,
    ) -> Result<(), OnePageError>;

    fn render(&self, job: &LayoutJob<'_>) -> Result<Vec<u8>, OnePageError>;
}

/// Single-column flow layout over base-14 fonts.
#[derive(Clone, Default)]
pub struct FlowEngine {
    debug: Option<Arc<DebugLogger>>,
}

impl FlowEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_debug(mut self, debug: Option<Arc<DebugLogger>>) -> Self {
        self.debug = debug;
        self
    }

    fn template(&self, job: &LayoutJob<'_>) -> DocTemplate {
        let mut template =
            DocTemplate::new(job.page_size, job.margins).with_debug(self.debug.clone());
        let builder = StoryBuilder::new(job.images, job.fonts, job.image_layout);
        for flowable in builder.build(job.content) {
            template.add_flowable(flowable);
        }
        template
    }
}

impl LayoutEngine for FlowEngine {
    fn measure(
        &self,
        job: &LayoutJob<'_>,
        observer: &mut dyn LayoutObserver,
    ) -> Result<(), OnePageError> {
        let (_, metrics) = self.template(job).build_observed(Some(observer))?;
        log::debug!(
            "measure pass laid out {} page(s) in {:.2}ms",
            metrics.pages.len(),
            metrics.total_render_ms
        );
        Ok(())
    }

    fn render(&self, job: &LayoutJob<'_>) -> Result<Vec<u8>, OnePageError> {
        let (document, metrics) = self.template(job).build()?;
        let commands: usize = metrics.pages.iter().map(|page| page.command_count).sum();
        log::debug!(
            "render pass produced {} page(s), {} drawing command(s)",
            metrics.pages.len(),
            commands
        );
        pdf::document_to_pdf(&document, job.images)
    }
}
