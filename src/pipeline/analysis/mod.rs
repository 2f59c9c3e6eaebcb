pub mod brightness;
pub mod color;
pub mod core;
pub mod sky_feature;

pub use brightness::BrightnessAnalyzer;
pub use color::{blue_sky_score, ColorAnalyzer};
pub use core::{
    Analyzer, AnalyzerKind, AnalyzerResult, BrightnessCategory, BrightnessResult, ColorCategory,
    ColorResult, SampleStride, SkyFeatureResult,
};
pub use sky_feature::{PixelClass, SkyFeatureAnalyzer};
