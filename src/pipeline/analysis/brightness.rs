use super::core::{Analyzer, AnalyzerKind, AnalyzerResult, BrightnessCategory, BrightnessResult, SampleStride};
use crate::common::Frame;
use crate::config::BrightnessThresholds;
use crate::error::ConfigError;

/// Mean luminance over sampled pixels, classified on a descending ladder of
/// four cut points.
pub struct BrightnessAnalyzer {
    stride: SampleStride,
    cut_points: [f32; 4],
}

impl BrightnessAnalyzer {
    pub fn new(stride: SampleStride, cut_points: [f32; 4]) -> Self {
        Self { stride, cut_points }
    }

    pub fn from_config(thresholds: &BrightnessThresholds) -> Result<Self, ConfigError> {
        let stride =
            SampleStride::new(thresholds.stride).ok_or(ConfigError::ZeroStride("brightness"))?;
        Ok(Self::new(
            stride,
            [
                thresholds.very_bright,
                thresholds.bright,
                thresholds.moderate,
                thresholds.dim,
            ],
        ))
    }

    /// A mean exactly on a cut point falls into the brighter category.
    pub fn classify(&self, mean: f32) -> BrightnessCategory {
        let [very_bright, bright, moderate, dim] = self.cut_points;
        if mean >= very_bright {
            BrightnessCategory::VeryBright
        } else if mean >= bright {
            BrightnessCategory::Bright
        } else if mean >= moderate {
            BrightnessCategory::Moderate
        } else if mean >= dim {
            BrightnessCategory::Dim
        } else {
            BrightnessCategory::VeryDim
        }
    }

    pub fn score(mean: f32) -> u8 {
        ((mean / 255.0) * 100.0).clamp(0.0, 100.0) as u8
    }
}

impl Analyzer for BrightnessAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Brightness
    }

    fn name(&self) -> &'static str {
        "Brightness"
    }

    fn stride(&self) -> SampleStride {
        self.stride
    }

    fn analyze(&self, frame: &Frame) -> AnalyzerResult {
        let mut sum = 0f64;
        let mut count = 0usize;
        for index in frame.sample_indices(self.stride.get()) {
            sum += frame.luminance_at(index) as f64;
            count += 1;
        }

        // Nothing sampled: report VeryDim rather than divide by zero.
        if count == 0 {
            return AnalyzerResult::Brightness(BrightnessResult {
                category: BrightnessCategory::VeryDim,
                mean_luminance: 0.0,
                score: 0,
                samples: 0,
            });
        }

        let mean = (sum / count as f64) as f32;
        AnalyzerResult::Brightness(BrightnessResult {
            category: self.classify(mean),
            mean_luminance: mean,
            score: Self::score(mean),
            samples: count,
        })
    }
}
