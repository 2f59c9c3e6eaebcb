/// Classification aggregator - runs the enabled analyzers and folds their
/// results into one verdict per frame.
use super::analysis::{
    blue_sky_score, Analyzer, AnalyzerKind, AnalyzerResult, BrightnessAnalyzer,
    BrightnessCategory, BrightnessResult, ColorAnalyzer, ColorCategory, ColorResult,
    SkyFeatureAnalyzer, SkyFeatureResult,
};
use crate::common::Frame;
use crate::config::{AggregationThresholds, AnalysisConfig};
use crate::error::ConfigError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SkyCondition {
    Clear,
    PartlyCloudy,
    Cloudy,
    Overcast,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Which way a single result points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lean {
    Clearer,
    Cloudier,
    Neutral,
}

/// Per-cycle classification. Built once by the aggregator and never changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    frame_id: Uuid,
    overall_condition: SkyCondition,
    confidence: Confidence,
    contributing_results: Vec<AnalyzerResult>,
    clear_sky_score: Option<u8>,
    analysis_time_us: u64,
    decided_at: DateTime<Utc>,
}

impl Verdict {
    pub fn frame_id(&self) -> Uuid {
        self.frame_id
    }

    pub fn overall_condition(&self) -> SkyCondition {
        self.overall_condition
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    pub fn contributing_results(&self) -> &[AnalyzerResult] {
        &self.contributing_results
    }

    pub fn result(&self, kind: AnalyzerKind) -> Option<&AnalyzerResult> {
        self.contributing_results.iter().find(|r| r.kind() == kind)
    }

    /// 0-100, present when both Brightness and Color ran.
    pub fn clear_sky_score(&self) -> Option<u8> {
        self.clear_sky_score
    }

    pub fn analysis_time_us(&self) -> u64 {
        self.analysis_time_us
    }

    pub fn decided_at(&self) -> DateTime<Utc> {
        self.decided_at
    }
}

pub struct ClassificationAggregator {
    analyzers: Vec<Box<dyn Analyzer>>,
    thresholds: AggregationThresholds,
}

impl ClassificationAggregator {
    pub fn new(thresholds: AggregationThresholds) -> Self {
        Self {
            analyzers: Vec::new(),
            thresholds,
        }
    }

    /// Build the analyzers enabled by configuration.
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, ConfigError> {
        let mut aggregator = Self::new(config.aggregation.clone());
        if config.enable_brightness {
            aggregator =
                aggregator.add_analyzer(Box::new(BrightnessAnalyzer::from_config(&config.brightness)?));
        }
        if config.enable_color {
            aggregator = aggregator.add_analyzer(Box::new(ColorAnalyzer::from_config(&config.color)?));
        }
        if config.enable_sky_feature {
            aggregator = aggregator
                .add_analyzer(Box::new(SkyFeatureAnalyzer::from_config(&config.sky_feature)?));
        }
        if aggregator.analyzers.is_empty() {
            return Err(ConfigError::NoAnalyzerEnabled);
        }
        Ok(aggregator)
    }

    /// Registers an analyzer, replacing any previous one of the same kind.
    pub fn add_analyzer(mut self, analyzer: Box<dyn Analyzer>) -> Self {
        self.analyzers.retain(|a| a.kind() != analyzer.kind());
        self.analyzers.push(analyzer);
        self
    }

    pub fn enabled(&self) -> Vec<AnalyzerKind> {
        self.analyzers.iter().map(|a| a.kind()).collect()
    }

    /// Samples the enabled analyzers would visit on this frame.
    pub fn sample_cost(&self, frame: &Frame) -> u64 {
        self.analyzers
            .iter()
            .map(|a| frame.sample_count(a.stride().get()) as u64)
            .sum()
    }

    /// Analyze a frame and produce its verdict
    pub fn analyze(&self, frame: &Frame) -> Verdict {
        let analysis_start = Instant::now();

        let mut results = Vec::with_capacity(self.analyzers.len());
        for analyzer in &self.analyzers {
            let analyzer_start = Instant::now();
            let result = analyzer.analyze(frame);
            debug!(
                "{}: {} samples in {}us",
                analyzer.name(),
                result.samples(),
                analyzer_start.elapsed().as_micros()
            );
            results.push(result);
        }

        let (overall_condition, confidence) = self.classify(&results);
        let clear_sky_score = clear_sky_score(&results);
        let analysis_time_us = analysis_start.elapsed().as_micros() as u64;

        info!(
            "Sky classified in {}us: {:?} with {:?} confidence",
            analysis_time_us, overall_condition, confidence
        );

        Verdict {
            frame_id: frame.id(),
            overall_condition,
            confidence,
            contributing_results: results,
            clear_sky_score,
            analysis_time_us,
            decided_at: Utc::now(),
        }
    }

    /// Fold analyzer results into a condition and confidence. Sky features take
    /// priority when they saw enough sky, then the brightness/color lookup, then
    /// single-analyzer maps.
    pub fn classify(&self, results: &[AnalyzerResult]) -> (SkyCondition, Confidence) {
        let mut brightness = None;
        let mut color = None;
        let mut sky = None;
        for result in results {
            match result {
                AnalyzerResult::Brightness(r) => brightness = Some(r),
                AnalyzerResult::Color(r) => color = Some(r),
                AnalyzerResult::SkyFeature(r) => sky = Some(r),
            }
        }

        let sky_verdict = sky.and_then(|sky| self.sky_condition(sky));
        if sky.is_some() && sky_verdict.is_none() {
            debug!("Too little sky in frame, falling back to brightness and color");
        }

        let condition = match (sky_verdict, brightness, color) {
            (Some(condition), _, _) => condition,
            (None, Some(b), Some(c)) => combined_condition(b, c),
            (None, Some(b), None) => brightness_condition(b.category),
            (None, None, Some(c)) => color_condition(c.category),
            (None, None, None) => SkyCondition::Unknown,
        };

        (condition, confidence(condition, results))
    }

    /// Judged on the white share of sky pixels, so a larger share never maps
    /// to a clearer category. `None` when too few sampled pixels were sky.
    fn sky_condition(&self, sky: &SkyFeatureResult) -> Option<SkyCondition> {
        let sky_pixels = sky.blue_sky_fraction + sky.white_fraction;
        if sky_pixels <= 0.0 || sky_pixels < self.thresholds.min_sky_fraction {
            return None;
        }

        let white_share = sky.white_fraction / sky_pixels;
        let condition = if 1.0 - white_share >= self.thresholds.clear_fraction {
            SkyCondition::Clear
        } else if white_share >= self.thresholds.overcast_fraction {
            SkyCondition::Overcast
        } else if white_share < self.thresholds.cloudy_ratio {
            SkyCondition::PartlyCloudy
        } else {
            SkyCondition::Cloudy
        };
        Some(condition)
    }
}

fn combined_condition(brightness: &BrightnessResult, color: &ColorResult) -> SkyCondition {
    use BrightnessCategory::*;
    use ColorCategory::*;

    match (brightness.category, color.category) {
        (VeryBright, BlueDominant) => SkyCondition::Clear,
        (Bright, BlueDominant) => SkyCondition::PartlyCloudy,
        (Moderate | Dim, Gray) => SkyCondition::Cloudy,
        (VeryDim, _) => SkyCondition::Overcast,
        _ => SkyCondition::Unknown,
    }
}

fn brightness_condition(category: BrightnessCategory) -> SkyCondition {
    match category {
        BrightnessCategory::VeryBright => SkyCondition::Clear,
        BrightnessCategory::Bright => SkyCondition::PartlyCloudy,
        BrightnessCategory::Moderate => SkyCondition::Cloudy,
        BrightnessCategory::Dim | BrightnessCategory::VeryDim => SkyCondition::Overcast,
    }
}

fn color_condition(category: ColorCategory) -> SkyCondition {
    match category {
        ColorCategory::BlueDominant => SkyCondition::Clear,
        ColorCategory::Gray => SkyCondition::Cloudy,
        ColorCategory::Mixed => SkyCondition::Unknown,
    }
}

pub fn lean(result: &AnalyzerResult) -> Lean {
    if result.is_degenerate() {
        return Lean::Neutral;
    }
    match result {
        AnalyzerResult::Brightness(r) => match r.category {
            BrightnessCategory::VeryBright | BrightnessCategory::Bright => Lean::Clearer,
            _ => Lean::Cloudier,
        },
        AnalyzerResult::Color(r) => match r.category {
            ColorCategory::BlueDominant => Lean::Clearer,
            ColorCategory::Gray => Lean::Cloudier,
            ColorCategory::Mixed => Lean::Neutral,
        },
        AnalyzerResult::SkyFeature(r) => {
            if r.blue_sky_fraction > r.white_fraction {
                Lean::Clearer
            } else if r.white_fraction > r.blue_sky_fraction {
                Lean::Cloudier
            } else {
                Lean::Neutral
            }
        }
    }
}

fn confidence(condition: SkyCondition, results: &[AnalyzerResult]) -> Confidence {
    let direction = match condition {
        SkyCondition::Clear | SkyCondition::PartlyCloudy => Lean::Clearer,
        SkyCondition::Cloudy | SkyCondition::Overcast => Lean::Cloudier,
        SkyCondition::Unknown => return Confidence::Low,
    };
    if results.len() < 2 || results.iter().any(AnalyzerResult::is_degenerate) {
        return Confidence::Low;
    }

    let agreeing = results.iter().filter(|r| lean(r) == direction).count();
    if results.len() == 3 && agreeing == 3 {
        Confidence::High
    } else if agreeing >= 2 {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

/// Average of the brightness score and the color blue-sky score, nudged by
/// sky coverage when available.
fn clear_sky_score(results: &[AnalyzerResult]) -> Option<u8> {
    let mut brightness = None;
    let mut color = None;
    let mut sky = None;
    for result in results {
        match result {
            AnalyzerResult::Brightness(r) => brightness = Some(r),
            AnalyzerResult::Color(r) => color = Some(r),
            AnalyzerResult::SkyFeature(r) => sky = Some(r),
        }
    }
    let (brightness, color) = (brightness?, color?);

    let mut score = (brightness.score as f32 + blue_sky_score(color) as f32) / 2.0;
    if let Some(sky) = sky {
        if sky.blue_sky_fraction > 0.6 {
            score *= 1.1;
        } else if sky.white_fraction > 0.6 {
            score *= 0.8;
        }
    }
    Some(score.clamp(0.0, 100.0) as u8)
}
