use super::core::{
    population_variance, Analyzer, AnalyzerKind, AnalyzerResult, ColorCategory, ColorResult,
    SampleStride,
};
use crate::common::Frame;
use crate::config::ColorThresholds;
use crate::error::ConfigError;

/// Sparse per-channel means, classified as blue-dominant, gray or mixed.
pub struct ColorAnalyzer {
    stride: SampleStride,
    blue_red_diff: f32,
    blue_green_diff: f32,
    gray_variance: f32,
}

impl ColorAnalyzer {
    pub fn new(stride: SampleStride, thresholds: &ColorThresholds) -> Self {
        Self {
            stride,
            blue_red_diff: thresholds.blue_red_diff,
            blue_green_diff: thresholds.blue_green_diff,
            gray_variance: thresholds.gray_variance,
        }
    }

    pub fn from_config(thresholds: &ColorThresholds) -> Result<Self, ConfigError> {
        let stride = SampleStride::new(thresholds.stride).ok_or(ConfigError::ZeroStride("color"))?;
        Ok(Self::new(stride, thresholds))
    }

    /// Blue dominance is checked before grayness, so a low-variance frame
    /// that is also blue-dominant reports BlueDominant.
    pub fn classify(&self, mean_red: f32, mean_green: f32, mean_blue: f32) -> (ColorCategory, f32) {
        let variance = population_variance(mean_red, mean_green, mean_blue);
        let category = if mean_blue - mean_red >= self.blue_red_diff
            && mean_blue - mean_green >= self.blue_green_diff
        {
            ColorCategory::BlueDominant
        } else if variance < self.gray_variance {
            ColorCategory::Gray
        } else {
            ColorCategory::Mixed
        };
        (category, variance)
    }
}

impl Analyzer for ColorAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Color
    }

    fn name(&self) -> &'static str {
        "Color"
    }

    fn stride(&self) -> SampleStride {
        self.stride
    }

    fn analyze(&self, frame: &Frame) -> AnalyzerResult {
        let (mut red, mut green, mut blue) = (0u64, 0u64, 0u64);
        let mut count = 0usize;
        for index in frame.sample_indices(self.stride.get()) {
            let [r, g, b] = frame.rgb_at(index);
            red += r as u64;
            green += g as u64;
            blue += b as u64;
            count += 1;
        }

        if count == 0 {
            return AnalyzerResult::Color(ColorResult {
                category: ColorCategory::Mixed,
                mean_red: 0.0,
                mean_green: 0.0,
                mean_blue: 0.0,
                variance: 0.0,
                samples: 0,
            });
        }

        let n = count as f32;
        let (mean_red, mean_green, mean_blue) = (red as f32 / n, green as f32 / n, blue as f32 / n);
        let (category, variance) = self.classify(mean_red, mean_green, mean_blue);
        AnalyzerResult::Color(ColorResult {
            category,
            mean_red,
            mean_green,
            mean_blue,
            variance,
            samples: count,
        })
    }
}

/// 0-100 estimate of how much the average color looks like clear sky,
/// weighted by the overall channel brightness.
pub fn blue_sky_score(result: &ColorResult) -> u8 {
    let brightness = (result.mean_red + result.mean_green + result.mean_blue) / 3.0;
    let scaled = |weight: f32| ((brightness / 255.0) * weight) as u8;
    let gray = result.category == ColorCategory::Gray;

    if result.category == ColorCategory::BlueDominant && brightness > 100.0 {
        scaled(100.0)
    } else if gray && brightness > 150.0 {
        scaled(50.0)
    } else if gray && brightness > 100.0 {
        scaled(30.0)
    } else if gray && brightness > 50.0 {
        10
    } else if brightness < 50.0 {
        0
    } else {
        scaled(40.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageBuffer, Rgb};

    fn analyzer() -> ColorAnalyzer {
        ColorAnalyzer::from_config(&ColorThresholds::default()).unwrap()
    }

    fn solid(rgb: [u8; 3]) -> Frame {
        Frame::new(DynamicImage::ImageRgb8(ImageBuffer::from_pixel(
            100,
            50,
            Rgb(rgb),
        )))
    }

    fn color(result: AnalyzerResult) -> ColorResult {
        match result {
            AnalyzerResult::Color(result) => result,
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn blue_sky_means_are_blue_dominant() {
        // 120-50 = 70 >= 20 and 120-80 = 40 >= 10
        let (category, _) = analyzer().classify(50.0, 80.0, 120.0);
        assert_eq!(category, ColorCategory::BlueDominant);
    }

    #[test]
    fn exact_differences_count_as_dominant() {
        let (category, _) = analyzer().classify(100.0, 110.0, 120.0);
        assert_eq!(category, ColorCategory::BlueDominant);
    }

    #[test]
    fn blue_dominance_wins_over_gray() {
        let thresholds = ColorThresholds {
            blue_red_diff: 2.0,
            blue_green_diff: 1.0,
            gray_variance: 1_000.0,
            ..ColorThresholds::default()
        };
        let analyzer = ColorAnalyzer::from_config(&thresholds).unwrap();
        let (category, variance) = analyzer.classify(100.0, 101.0, 103.0);
        assert!(variance < thresholds.gray_variance);
        assert_eq!(category, ColorCategory::BlueDominant);
    }

    #[test]
    fn neutral_frame_is_gray() {
        let result = color(analyzer().analyze(&solid([128, 130, 132])));
        assert_eq!(result.category, ColorCategory::Gray);
        assert_eq!(result.samples, 100);
        assert_eq!(result.mean_green, 130.0);
    }

    #[test]
    fn warm_frame_is_mixed() {
        let result = color(analyzer().analyze(&solid([200, 120, 60])));
        assert_eq!(result.category, ColorCategory::Mixed);
        assert!(result.variance >= 30.0);
    }

    #[test]
    fn empty_frame_reports_mixed_default() {
        let frame = Frame::new(DynamicImage::ImageRgb8(ImageBuffer::new(0, 0)));
        let result = color(analyzer().analyze(&frame));
        assert_eq!(result.category, ColorCategory::Mixed);
        assert_eq!(result.samples, 0);
    }

    #[test]
    fn blue_sky_score_follows_brightness() {
        let clear = color(analyzer().analyze(&solid([90, 140, 220])));
        assert_eq!(clear.category, ColorCategory::BlueDominant);
        // brightness 150 -> 58
        assert_eq!(blue_sky_score(&clear), 58);

        let dark = color(analyzer().analyze(&solid([20, 20, 22])));
        assert_eq!(blue_sky_score(&dark), 0);
    }

    #[test]
    fn analysis_is_deterministic() {
        let mut img = ImageBuffer::from_pixel(64, 32, Rgb([70u8, 120, 210]));
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            if (x + y) % 3 == 0 {
                *pixel = Rgb([230, 230, 232]);
            }
        }
        let frame = Frame::new(DynamicImage::ImageRgb8(img));
        let analyzer = analyzer();
        assert_eq!(analyzer.analyze(&frame), analyzer.analyze(&frame));
        assert_eq!(
            analyzer.analyze(&frame),
            ColorAnalyzer::from_config(&ColorThresholds::default())
                .unwrap()
                .analyze(&frame.clone())
        );
    }
}
