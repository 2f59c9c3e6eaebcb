use super::core::{
    population_variance, Analyzer, AnalyzerKind, AnalyzerResult, SampleStride, SkyFeatureResult,
};
use crate::common::Frame;
use crate::config::SkyFeatureThresholds;
use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelClass {
    BlueSky,
    Cloud,
    Other,
}

/// Per-pixel blue-sky / cloud-white classification. The only analyzer that
/// looks at pixels individually, so it runs on the coarsest stride.
pub struct SkyFeatureAnalyzer {
    stride: SampleStride,
    thresholds: SkyFeatureThresholds,
}

impl SkyFeatureAnalyzer {
    pub fn new(stride: SampleStride, thresholds: SkyFeatureThresholds) -> Self {
        Self { stride, thresholds }
    }

    pub fn from_config(thresholds: &SkyFeatureThresholds) -> Result<Self, ConfigError> {
        let stride = SampleStride::new(thresholds.stride)
            .ok_or(ConfigError::ZeroStride("sky feature"))?;
        Ok(Self::new(stride, thresholds.clone()))
    }

    pub fn classify_pixel(&self, [r, g, b]: [u8; 3]) -> PixelClass {
        let (r, g, b) = (r as f32, g as f32, b as f32);
        let t = &self.thresholds;

        if b >= t.blue_sky_min_value && b - r >= t.blue_sky_red_diff && b - g >= t.blue_sky_green_diff
        {
            return PixelClass::BlueSky;
        }

        let brightness = (r + g + b) / 3.0;
        if brightness >= t.white_brightness_min && population_variance(r, g, b) <= t.white_variance_max
        {
            PixelClass::Cloud
        } else {
            PixelClass::Other
        }
    }
}

impl Analyzer for SkyFeatureAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::SkyFeature
    }

    fn name(&self) -> &'static str {
        "SkyFeature"
    }

    fn stride(&self) -> SampleStride {
        self.stride
    }

    fn analyze(&self, frame: &Frame) -> AnalyzerResult {
        let (mut blue, mut white, mut other) = (0usize, 0usize, 0usize);
        for index in frame.sample_indices(self.stride.get()) {
            match self.classify_pixel(frame.rgb_at(index)) {
                PixelClass::BlueSky => blue += 1,
                PixelClass::Cloud => white += 1,
                PixelClass::Other => other += 1,
            }
        }

        let total = blue + white + other;
        if total == 0 {
            return AnalyzerResult::SkyFeature(SkyFeatureResult {
                blue_sky_fraction: 0.0,
                white_fraction: 0.0,
                other_fraction: 0.0,
                samples: 0,
            });
        }

        let fraction = |count: usize| count as f32 / total as f32;
        AnalyzerResult::SkyFeature(SkyFeatureResult {
            blue_sky_fraction: fraction(blue),
            white_fraction: fraction(white),
            other_fraction: fraction(other),
            samples: total,
        })
    }
}
