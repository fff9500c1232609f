use crate::canvas::{Canvas, Document, Placement};
use crate::debug::DebugLogger;
use crate::error::OnePageError;
use crate::flowable::Flowable;
use crate::frame::{AddResult, Frame};
use crate::layout::{BreakDecision, LayoutObserver, NodeEvent};
use crate::metrics::{DocumentMetrics, PageMetrics};
use crate::types::{Margins, Pt, Rect, Size};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

/// Paginates a story of flowables into fixed-size pages with one content frame each.
pub struct DocTemplate {
    page_size: Size,
    margins: Margins,
    story: Vec<Box<dyn Flowable>>,
    debug: Option<Arc<DebugLogger>>,
}

impl DocTemplate {
    pub fn new(page_size: Size, margins: Margins) -> Self {
        Self {
            page_size,
            margins,
            story: Vec::new(),
            debug: None,
        }
    }

    pub(crate) fn with_debug(mut self, debug: Option<Arc<DebugLogger>>) -> Self {
        self.debug = debug;
        self
    }

    pub fn add_flowable(&mut self, flowable: Box<dyn Flowable>) {
        self.story.push(flowable);
    }

    pub fn content_rect(&self) -> Rect {
        Rect {
            x: self.margins.left,
            y: self.margins.top,
            width: (self.page_size.width - self.margins.horizontal()).max(Pt::ZERO),
            height: (self.page_size.height - self.margins.vertical()).max(Pt::ZERO),
        }
    }

    pub fn build(self) -> Result<(Document, DocumentMetrics), OnePageError> {
        self.build_observed(None)
    }

    /// Lays out the story, reporting every placement to `observer`.
    ///
    /// The observer is asked before each top-level flowable whether to force a page
    /// break; the request is honored only when the current page already has content.
    /// Nested flowables are reported but never consulted.
    pub fn build_observed(
        self,
        mut observer: Option<&mut dyn LayoutObserver>,
    ) -> Result<(Document, DocumentMetrics), OnePageError> {
        let content_rect = self.content_rect();
        let debug = self.debug.clone();
        let log_page_break = |from_page: usize, reason: &str, flowable_name: &str| {
            let Some(logger) = debug.as_deref() else {
                return;
            };
            logger.log_value(&json!({
                "type": "layout.page_break",
                "reason": reason,
                "from_page": from_page,
                "to_page": from_page + 1,
                "flowable": flowable_name,
            }));
            logger.increment("layout.page_break", 1);
        };

        let mut canvas = Canvas::new(self.page_size);
        let mut page_number = 1usize;
        let mut frame = Frame::new(content_rect);
        let mut placed_on_page = false;
        let mut metrics = DocumentMetrics::default();
        let mut page_start = Instant::now();
        let mut page_flowables = 0usize;

        let finish_page = |canvas: &mut Canvas,
                           page_number: usize,
                           page_flowables: &mut usize,
                           metrics: &mut DocumentMetrics,
                           page_start: &mut Instant| {
            let elapsed = page_start.elapsed().as_secs_f64() * 1000.0;
            metrics.total_render_ms += elapsed;
            metrics.pages.push(PageMetrics {
                page_number,
                render_ms: elapsed,
                command_count: canvas.pending_commands(),
                flowable_count: *page_flowables,
            });
            canvas.show_page();
            *page_flowables = 0;
            *page_start = Instant::now();
        };

        let mut story: VecDeque<Box<dyn Flowable>> = self.story.into_iter().collect();
        while let Some(flowable) = story.pop_front() {
            let name = flowable.debug_name();
            if let Some(observer) = observer.as_deref_mut() {
                let size = flowable.wrap(content_rect.width, frame.remaining_height());
                let event = NodeEvent {
                    kind: flowable.kind(),
                    page_index: Some(page_number),
                    top: Some(content_rect.height - frame.remaining_height()),
                    height: flowable.image_id().is_none().then_some(size.height),
                    image_id: flowable.image_id().map(str::to_string),
                };
                if observer.page_break_before(&event) == BreakDecision::ForceBreak
                    && placed_on_page
                {
                    log_page_break(page_number, "forced", name);
                    finish_page(
                        &mut canvas,
                        page_number,
                        &mut page_flowables,
                        &mut metrics,
                        &mut page_start,
                    );
                    page_number += 1;
                    frame = Frame::new(content_rect);
                    placed_on_page = false;
                }
            }

            let mut current = flowable;
            loop {
                let result = frame.add(current, &mut canvas);
                let placements = canvas.take_placements();
                if let Some(observer) = observer.as_deref_mut() {
                    for placement in placements {
                        observer.node_positioned(&node_event(placement, page_number, content_rect));
                    }
                }
                match result {
                    AddResult::Placed => {
                        placed_on_page = true;
                        page_flowables += 1;
                        break;
                    }
                    AddResult::Split(remaining) => {
                        page_flowables += 1;
                        log_page_break(page_number, "flowable_split", name);
                        current = remaining;
                    }
                    AddResult::Overflow(remaining) => {
                        if !placed_on_page {
                            let size = remaining.wrap(content_rect.width, content_rect.height);
                            return Err(OnePageError::UnplaceableFlowable(format!(
                                "{} size={}x{}pt frame={}x{}pt",
                                name,
                                size.width.to_f32(),
                                size.height.to_f32(),
                                content_rect.width.to_f32(),
                                content_rect.height.to_f32(),
                            )));
                        }
                        log_page_break(page_number, "frame_overflow", name);
                        current = remaining;
                    }
                }
                finish_page(
                    &mut canvas,
                    page_number,
                    &mut page_flowables,
                    &mut metrics,
                    &mut page_start,
                );
                page_number += 1;
                frame = Frame::new(content_rect);
                placed_on_page = false;
            }
        }

        if placed_on_page || metrics.pages.is_empty() {
            finish_page(
                &mut canvas,
                page_number,
                &mut page_flowables,
                &mut metrics,
                &mut page_start,
            );
        }

        Ok((canvas.finish(), metrics))
    }
}

fn node_event(placement: Placement, page_number: usize, content_rect: Rect) -> NodeEvent {
    NodeEvent {
        kind: placement.kind,
        page_index: Some(page_number),
        top: Some(placement.y - content_rect.y),
        height: placement.height,
        image_id: placement.image_id,
    }
}
