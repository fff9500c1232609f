#[derive(Debug, Clone, Default)]
pub struct PageMetrics {
    pub page_number: usize,
    pub render_ms: f64,
    pub command_count: usize,
    pub flowable_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct DocumentMetrics {
    pub pages: Vec<PageMetrics>,
    pub total_render_ms: f64,
}

/// Wall-clock timings and counts for one conversion.
#[derive(Debug, Clone, Default)]
pub struct ConversionMetrics {
    pub measure_ms: f64,
    pub render_ms: f64,
    pub resize_ms: f64,
    pub total_ms: f64,
    pub node_events: usize,
    pub measured_pages: usize,
}
