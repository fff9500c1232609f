//! Reconciles the measured extent with image footprints the layout never reports.

use crate::image_extent::{ImageLayout, ImageRecord};
use crate::measure::MeasurementResult;
use crate::types::Pt;
use std::collections::BTreeMap;

pub const DEFAULT_FALLBACK_RATIO: f32 = 0.22;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionMethod {
    /// Image tops were observed; the lowest predicted image bottom decides.
    ImageBottoms,
    /// No tops were observed; a fixed share of the total footprint is added.
    FootprintRatio,
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtentCorrection {
    pub correction: Pt,
    pub corrected_extent: Pt,
    pub method: CorrectionMethod,
    pub total_footprint: Pt,
    /// Footprint (fitted height plus image margins) per distinct image id.
    pub footprints: BTreeMap<String, Pt>,
}

#[derive(Debug, Clone, Copy)]
pub struct ExtentCorrector {
    image_layout: ImageLayout,
    fallback_ratio: f32,
}

impl ExtentCorrector {
    pub fn new(image_layout: ImageLayout) -> Self {
        Self {
            image_layout,
            fallback_ratio: DEFAULT_FALLBACK_RATIO,
        }
    }

    pub fn with_fallback_ratio(mut self, ratio: f32) -> Self {
        self.fallback_ratio = ratio;
        self
    }

    pub fn footprints(&self, images: &[ImageRecord]) -> BTreeMap<String, Pt> {
        let mut out = BTreeMap::new();
        for record in images {
            let Some(footprint) = record
                .dimensions()
                .and_then(|dims| self.image_layout.footprint(dims))
            else {
                continue;
            };
            out.entry(record.id.clone()).or_insert(footprint);
        }
        out
    }

    pub fn correct(
        &self,
        measurement: &MeasurementResult,
        images: &[ImageRecord],
    ) -> ExtentCorrection {
        let footprints = self.footprints(images);
        let total_footprint: Pt = footprints.values().copied().sum();
        let tops = &measurement.image_top_positions;

        let (correction, method) = if !tops.is_empty() && total_footprint > Pt::ZERO {
            let lowest_bottom = footprints
                .iter()
                .filter_map(|(id, footprint)| tops.get(id).map(|top| *top + *footprint))
                .fold(None, |acc: Option<Pt>, bottom| {
                    Some(acc.map_or(bottom, |current| current.max(bottom)))
                });
            let correction = lowest_bottom
                .map(|bottom| (bottom - measurement.max_extent).max(Pt::ZERO))
                .unwrap_or(Pt::ZERO);
            (correction, CorrectionMethod::ImageBottoms)
        } else if total_footprint > Pt::ZERO {
            let ratio = if self.fallback_ratio.is_finite() {
                self.fallback_ratio.max(0.0)
            } else {
                0.0
            };
            let correction = Pt::from_f64(total_footprint.to_f64() * ratio as f64);
            (correction, CorrectionMethod::FootprintRatio)
        } else {
            (Pt::ZERO, CorrectionMethod::None)
        };

        ExtentCorrection {
            correction,
            corrected_extent: measurement.max_extent + correction,
            method,
            total_footprint,
            footprints,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_extent::FitBox;
    use crate::image_header::ImageDimensions;

    fn record(id: &str, width: u32, height: u32) -> ImageRecord {
        ImageRecord::new(id, ImageDimensions::new(width, height).expect("dims"))
    }

    fn corrector() -> ExtentCorrector {
        ExtentCorrector::new(ImageLayout::new(FitBox::new(500.0, 400.0), 5.0, 10.0))
    }

    fn measurement(max_extent: i32, tops: &[(&str, i32)]) -> MeasurementResult {
        MeasurementResult {
            max_extent: Pt::from_i32(max_extent),
            image_top_positions: tops
                .iter()
                .map(|(id, top)| (id.to_string(), Pt::from_i32(*top)))
                .collect(),
            max_page_index: 1,
            node_count: tops.len(),
        }
    }

    #[test]
    fn image_below_text_extends_the_extent() {
        // 1000x500 fits to 250pt tall, 265pt with margins.
        let result = corrector().correct(
            &measurement(300, &[("a", 200)]),
            &[record("a", 1000, 500)],
        );
        assert_eq!(result.method, CorrectionMethod::ImageBottoms);
        assert_eq!(result.correction, Pt::from_i32(165));
        assert_eq!(result.corrected_extent, Pt::from_i32(465));
    }

    #[test]
    fn correction_is_never_negative() {
        let result = corrector().correct(
            &measurement(2000, &[("a", 0)]),
            &[record("a", 1000, 500)],
        );
        assert_eq!(result.correction, Pt::ZERO);
        assert_eq!(result.corrected_extent, Pt::from_i32(2000));
    }

    #[test]
    fn no_images_means_no_correction() {
        let measured = measurement(120, &[]);
        let result = corrector().correct(&measured, &[]);
        assert_eq!(result.method, CorrectionMethod::None);
        assert_eq!(result.corrected_extent, measured.max_extent);
    }

    #[test]
    fn fallback_ratio_applies_without_tops() {
        let result = corrector().correct(&measurement(100, &[]), &[record("a", 1000, 500)]);
        assert_eq!(result.method, CorrectionMethod::FootprintRatio);
        assert_eq!(result.correction, Pt::from_f32(58.3));
    }

    #[test]
    fn fallback_is_monotonic_in_footprint_and_non_negative() {
        let c = corrector();
        let one = c.correct(&measurement(0, &[]), &[record("a", 1000, 500)]);
        let two = c.correct(
            &measurement(0, &[]),
            &[record("a", 1000, 500), record("b", 400, 1000)],
        );
        assert!(one.correction >= Pt::ZERO);
        assert!(two.correction >= one.correction);

        let negative = c
            .with_fallback_ratio(-1.0)
            .correct(&measurement(0, &[]), &[record("a", 1000, 500)]);
        assert_eq!(negative.correction, Pt::ZERO);
    }

    #[test]
    fn repeated_ids_count_once() {
        let records = [record("a", 1000, 500), record("a", 1000, 500)];
        let result = corrector().correct(&measurement(0, &[]), &records);
        assert_eq!(result.footprints.len(), 1);
        assert_eq!(result.total_footprint, Pt::from_i32(265));
    }

    #[test]
    fn images_without_tops_are_ignored_when_others_have_them() {
        let result = corrector().correct(
            &measurement(100, &[("a", 0)]),
            &[record("a", 1000, 500), record("b", 400, 1000)],
        );
        assert_eq!(result.correction, Pt::from_i32(165));
    }
}
