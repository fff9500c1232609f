//! Dry-run layout pass that folds placement events into the content's true extent.

use crate::error::OnePageError;
use crate::layout::{BreakDecision, LayoutEngine, LayoutJob, LayoutObserver, NodeEvent};
use crate::types::Pt;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasurementResult {
    /// Lowest content bottom seen, folded across pages into one logical column.
    pub max_extent: Pt,
    /// Top offset of each image id; a repeated id keeps its last position.
    pub image_top_positions: BTreeMap<String, Pt>,
    /// Highest 1-based page index reported, 0 when nothing was placed.
    pub max_page_index: usize,
    pub node_count: usize,
}

/// Observer that never breaks pages and keeps the running aggregate.
pub struct ExtentObserver {
    usable_height: Pt,
    result: MeasurementResult,
}

impl ExtentObserver {
    pub fn new(usable_height: Pt) -> Self {
        Self {
            usable_height,
            result: MeasurementResult::default(),
        }
    }

    pub fn finish(self) -> MeasurementResult {
        self.result
    }
}

impl LayoutObserver for ExtentObserver {
    fn page_break_before(&mut self, _event: &NodeEvent) -> BreakDecision {
        BreakDecision::Continue
    }

    fn node_positioned(&mut self, event: &NodeEvent) {
        let result = &mut self.result;
        result.node_count += 1;
        let page = event.page_index.unwrap_or(1).max(1);
        result.max_page_index = result.max_page_index.max(page);

        if let (Some(id), Some(top)) = (event.image_id.as_ref(), event.top) {
            result.image_top_positions.insert(id.clone(), top);
        }
        if let (Some(top), Some(height)) = (event.top, event.height) {
            let preceding = i32::try_from(page - 1).unwrap_or(i32::MAX);
            let bottom = self.usable_height * preceding + top + height;
            result.max_extent = result.max_extent.max(bottom);
        }
    }
}

/// Runs `engine` once in measure mode and returns the folded aggregate.
pub fn measure(
    engine: &dyn LayoutEngine,
    job: &LayoutJob<'_>,
) -> Result<MeasurementResult, OnePageError> {
    let usable_height = job.page_size.height - job.margins.vertical();
    let mut observer = ExtentObserver::new(usable_height);
    engine.measure(job, &mut observer)?;
    Ok(observer.finish())
}
