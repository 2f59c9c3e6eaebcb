use crate::common::Frame;
use serde::Serialize;
use std::num::NonZeroUsize;

/// Evaluate every Nth pixel. Trades accuracy for bounded compute time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SampleStride(NonZeroUsize);

impl SampleStride {
    pub fn new(stride: usize) -> Option<Self> {
        NonZeroUsize::new(stride).map(Self)
    }

    pub fn get(self) -> usize {
        self.0.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AnalyzerKind {
    Brightness,
    Color,
    SkyFeature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BrightnessCategory {
    VeryBright,
    Bright,
    Moderate,
    Dim,
    VeryDim,
}

impl BrightnessCategory {
    /// Higher is brighter.
    pub fn rank(self) -> u8 {
        match self {
            BrightnessCategory::VeryBright => 4,
            BrightnessCategory::Bright => 3,
            BrightnessCategory::Moderate => 2,
            BrightnessCategory::Dim => 1,
            BrightnessCategory::VeryDim => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ColorCategory {
    BlueDominant,
    Gray,
    Mixed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrightnessResult {
    pub category: BrightnessCategory,
    pub mean_luminance: f32,
    /// mean / 255 on a 0-100 scale
    pub score: u8,
    pub samples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorResult {
    pub category: ColorCategory,
    pub mean_red: f32,
    pub mean_green: f32,
    pub mean_blue: f32,
    /// Population variance of (mean_red, mean_green, mean_blue).
    pub variance: f32,
    pub samples: usize,
}

/// Fractions are over sampled pixels only and sum to at most 1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkyFeatureResult {
    pub blue_sky_fraction: f32,
    pub white_fraction: f32,
    pub other_fraction: f32,
    pub samples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "analyzer")]
pub enum AnalyzerResult {
    Brightness(BrightnessResult),
    Color(ColorResult),
    SkyFeature(SkyFeatureResult),
}

impl AnalyzerResult {
    pub fn kind(&self) -> AnalyzerKind {
        match self {
            AnalyzerResult::Brightness(_) => AnalyzerKind::Brightness,
            AnalyzerResult::Color(_) => AnalyzerKind::Color,
            AnalyzerResult::SkyFeature(_) => AnalyzerKind::SkyFeature,
        }
    }

    pub fn samples(&self) -> usize {
        match self {
            AnalyzerResult::Brightness(r) => r.samples,
            AnalyzerResult::Color(r) => r.samples,
            AnalyzerResult::SkyFeature(r) => r.samples,
        }
    }

    /// No pixel was sampled; the result carries the safe default.
    pub fn is_degenerate(&self) -> bool {
        self.samples() == 0
    }
}

/// A single-frame analyzer. Implementations hold no state between frames, so
/// the same frame and configuration always yield the same result.
pub trait Analyzer: Send + Sync {
    fn kind(&self) -> AnalyzerKind;
    fn name(&self) -> &'static str;
    fn stride(&self) -> SampleStride;
    fn analyze(&self, frame: &Frame) -> AnalyzerResult;
}

/// Population variance of three values.
pub fn population_variance(a: f32, b: f32, c: f32) -> f32 {
    let mean = (a + b + c) / 3.0;
    ((a - mean).powi(2) + (b - mean).powi(2) + (c - mean).powi(2)) / 3.0
}
