use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level device configuration, constructed once at start-up and passed by
/// reference into each component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub analysis: AnalysisConfig,
    pub capture: CaptureConfig,
    pub reliability: ReliabilityConfig,
    pub watchdog: WatchdogConfig,
    pub source: SourceConfig,
    pub log_level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub enable_brightness: bool,
    pub enable_color: bool,
    pub enable_sky_feature: bool,
    pub brightness: BrightnessThresholds,
    pub color: ColorThresholds,
    pub sky_feature: SkyFeatureThresholds,
    pub aggregation: AggregationThresholds,
}

/// Descending cut points on the 0-255 luminance scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrightnessThresholds {
    pub stride: usize,
    pub very_bright: f32,
    pub bright: f32,
    pub moderate: f32,
    pub dim: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorThresholds {
    pub stride: usize,
    pub blue_red_diff: f32,
    pub blue_green_diff: f32,
    /// Population variance of the three channel means.
    pub gray_variance: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkyFeatureThresholds {
    pub stride: usize,
    pub blue_sky_min_value: f32,
    pub blue_sky_red_diff: f32,
    pub blue_sky_green_diff: f32,
    pub white_brightness_min: f32,
    pub white_variance_max: f32,
}

/// Shares used to turn a sky-feature distribution into a condition. All of
/// them except `min_sky_fraction` are measured over sky pixels (blue + white),
/// not over every sampled pixel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationThresholds {
    /// Blue share at or above which the sky is Clear.
    pub clear_fraction: f32,
    /// White share at or above which the sky is Overcast.
    pub overcast_fraction: f32,
    /// White share at or above which a mixed sky is Cloudy.
    pub cloudy_ratio: f32,
    /// Below this share of sampled pixels the sky features carry no verdict
    /// and brightness/color decide.
    pub min_sky_fraction: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub interval_ms: u64,
    pub minimum_interval_ms: u64,
    pub max_capture_retries: u32,
    pub max_delivery_retries: u32,
    pub retry_delay_ms: u64,
    pub loop_period_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReliabilityConfig {
    pub degraded_after: u32,
    pub critical_after: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    pub enabled: bool,
    pub timeout_ms: u64,
    pub expected_width: u32,
    pub expected_height: u32,
    pub sample_budget: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub image_dir: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            analysis: AnalysisConfig::default(),
            capture: CaptureConfig::default(),
            reliability: ReliabilityConfig::default(),
            watchdog: WatchdogConfig::default(),
            source: SourceConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            enable_brightness: true,
            enable_color: true,
            enable_sky_feature: false,
            brightness: BrightnessThresholds::default(),
            color: ColorThresholds::default(),
            sky_feature: SkyFeatureThresholds::default(),
            aggregation: AggregationThresholds::default(),
        }
    }
}

impl Default for BrightnessThresholds {
    fn default() -> Self {
        Self {
            stride: 10,
            very_bright: 180.0, // Clear/sunny
            bright: 140.0,      // Partly cloudy
            moderate: 100.0,    // Cloudy
            dim: 60.0,          // Overcast
        }
    }
}

impl Default for ColorThresholds {
    fn default() -> Self {
        Self {
            stride: 50,
            blue_red_diff: 20.0,
            blue_green_diff: 10.0,
            gray_variance: 30.0,
        }
    }
}

impl Default for SkyFeatureThresholds {
    fn default() -> Self {
        Self {
            stride: 100,
            blue_sky_min_value: 150.0,
            blue_sky_red_diff: 30.0,
            blue_sky_green_diff: 20.0,
            white_brightness_min: 200.0,
            white_variance_max: 40.0,
        }
    }
}

impl Default for AggregationThresholds {
    fn default() -> Self {
        Self {
            clear_fraction: 0.75,
            overcast_fraction: 0.75,
            cloudy_ratio: 0.5,
            min_sky_fraction: 0.1,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interval_ms: 10_000,
            minimum_interval_ms: 1_000,
            max_capture_retries: 3,
            max_delivery_retries: 2,
            retry_delay_ms: 1_000,
            loop_period_ms: 100,
        }
    }
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        Self {
            degraded_after: 2,
            critical_after: 5,
        }
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: 60_000,
            expected_width: 800, // SVGA sensor output
            expected_height: 600,
            sample_budget: 200_000,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            image_dir: "frames".to_string(),
        }
    }
}

impl Configuration {
    /// Brightness only, one capture a minute (battery powered).
    pub fn fast() -> Self {
        let mut config = Self::default();
        config.analysis.enable_color = false;
        config.analysis.enable_sky_feature = false;
        config.capture.interval_ms = 60_000;
        config
    }

    /// Every analyzer, with a finer sky-feature stride.
    pub fn detailed() -> Self {
        let mut config = Self::default();
        config.analysis.enable_sky_feature = true;
        config.analysis.sky_feature.stride = 25;
        config.capture.interval_ms = 30_000;
        config
    }

    /// Quick captures for development.
    pub fn testing() -> Self {
        let mut config = Self::default();
        config.capture.interval_ms = 5_000;
        config.log_level = "debug".to_string();
        config
    }

    /// Layer an optional file and `SKYWATCH__` environment variables over the
    /// defaults, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix("SKYWATCH")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let configuration: Configuration = settings.try_deserialize()?;
        configuration.validate()?;
        Ok(configuration)
    }

    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?;
        let configuration: Configuration = settings.try_deserialize()?;
        configuration.validate()?;
        Ok(configuration)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        let analysis = &self.analysis;

        if !analysis.enable_brightness && !analysis.enable_color && !analysis.enable_sky_feature {
            return Err(ConfigError::NoAnalyzerEnabled);
        }
        if analysis.brightness.stride == 0 {
            return Err(ConfigError::ZeroStride("brightness"));
        }
        if analysis.color.stride == 0 {
            return Err(ConfigError::ZeroStride("color"));
        }
        if analysis.sky_feature.stride == 0 {
            return Err(ConfigError::ZeroStride("sky feature"));
        }

        let b = &analysis.brightness;
        if !(b.very_bright > b.bright && b.bright > b.moderate && b.moderate > b.dim) {
            return Err(ConfigError::UnorderedBrightnessThresholds([
                b.very_bright,
                b.bright,
                b.moderate,
                b.dim,
            ]));
        }

        let agg = &analysis.aggregation;
        for (name, value) in [
            ("clear_fraction", agg.clear_fraction),
            ("overcast_fraction", agg.overcast_fraction),
            ("cloudy_ratio", agg.cloudy_ratio),
            ("min_sky_fraction", agg.min_sky_fraction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::FractionOutOfRange { name, value });
            }
        }
        // White share bands must not overlap: Clear, PartlyCloudy, Cloudy, Overcast.
        let clear_band_top = 1.0 - agg.clear_fraction;
        if !(clear_band_top <= agg.cloudy_ratio && agg.cloudy_ratio <= agg.overcast_fraction) {
            return Err(ConfigError::UnorderedSkyThresholds {
                clear_fraction: agg.clear_fraction,
                cloudy_ratio: agg.cloudy_ratio,
                overcast_fraction: agg.overcast_fraction,
            });
        }

        if self.capture.minimum_interval_ms == 0 {
            return Err(ConfigError::ZeroMinimumInterval);
        }
        if self.capture.max_capture_retries == 0 {
            return Err(ConfigError::ZeroCaptureAttempts);
        }
        if self.capture.max_delivery_retries == 0 {
            return Err(ConfigError::ZeroDeliveryAttempts);
        }

        if self.reliability.degraded_after >= self.reliability.critical_after {
            return Err(ConfigError::HealthThresholds {
                degraded: self.reliability.degraded_after,
                critical: self.reliability.critical_after,
            });
        }

        if self.watchdog.enabled {
            if self.capture.loop_period_ms >= self.watchdog.timeout_ms {
                return Err(ConfigError::LoopPeriodTooLong {
                    loop_period_ms: self.capture.loop_period_ms,
                    timeout_ms: self.watchdog.timeout_ms,
                });
            }
            let samples = self.worst_case_samples();
            if samples > self.watchdog.sample_budget {
                return Err(ConfigError::SampleBudgetExceeded {
                    samples,
                    budget: self.watchdog.sample_budget,
                });
            }
        }

        Ok(())
    }

    /// Samples visited per cycle on a frame of the expected size, summed over
    /// the enabled analyzers.
    pub fn worst_case_samples(&self) -> u64 {
        let pixels = self.watchdog.expected_width as u64 * self.watchdog.expected_height as u64;
        let cost = |enabled: bool, stride: usize| {
            if enabled && stride > 0 {
                pixels.div_ceil(stride as u64)
            } else {
                0
            }
        };
        let analysis = &self.analysis;
        cost(analysis.enable_brightness, analysis.brightness.stride)
            + cost(analysis.enable_color, analysis.color.stride)
            + cost(analysis.enable_sky_feature, analysis.sky_feature.stride)
    }

    /// Select which analyzers run
    pub fn with_analyzers(mut self, brightness: bool, color: bool, sky_feature: bool) -> Self {
        self.analysis.enable_brightness = brightness;
        self.analysis.enable_color = color;
        self.analysis.enable_sky_feature = sky_feature;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_presets_are_valid() {
        assert!(Configuration::default().validate().is_ok());
        assert!(Configuration::fast().validate().is_ok());
        assert!(Configuration::detailed().validate().is_ok());
        assert!(Configuration::testing().validate().is_ok());
    }

    #[test]
    fn zero_stride_is_rejected() {
        let mut config = Configuration::default();
        config.analysis.color.stride = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroStride("color")));
    }

    #[test]
    fn unordered_brightness_thresholds_are_rejected() {
        let mut config = Configuration::default();
        config.analysis.brightness.bright = 100.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnorderedBrightnessThresholds(_))
        ));
    }

    #[test]
    fn no_enabled_analyzer_is_rejected() {
        let config = Configuration::default().with_analyzers(false, false, false);
        assert_eq!(config.validate(), Err(ConfigError::NoAnalyzerEnabled));
    }

    #[test]
    fn overlapping_sky_thresholds_are_rejected() {
        let mut config = Configuration::default();
        config.analysis.aggregation.clear_fraction = 0.4;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnorderedSkyThresholds { .. })
        ));

        let mut config = Configuration::default();
        config.analysis.aggregation.overcast_fraction = 0.45;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnorderedSkyThresholds { .. })
        ));

        let mut config = Configuration::default();
        config.analysis.aggregation.min_sky_fraction = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::FractionOutOfRange {
                name: "min_sky_fraction",
                ..
            })
        ));
    }

    #[test]
    fn health_thresholds_must_be_ordered() {
        let mut config = Configuration::default();
        config.reliability.degraded_after = 5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::HealthThresholds { .. })
        ));
    }

    #[test]
    fn sample_budget_bounds_the_brightness_stride() {
        let mut config = Configuration::default();
        config.analysis.brightness.stride = 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::SampleBudgetExceeded { .. })
        ));

        config.watchdog.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn worst_case_samples_sums_enabled_analyzers() {
        let config = Configuration::default().with_analyzers(true, true, true);
        // 480_000 pixels at strides 10, 50 and 100
        assert_eq!(config.worst_case_samples(), 48_000 + 9_600 + 4_800);
    }

    #[test]
    fn toml_overrides_are_layered_on_defaults() {
        let config = Configuration::from_toml(
            r#"
            log_level = "debug"

            [analysis]
            enable_sky_feature = true

            [capture]
            interval_ms = 30000
            "#,
        )
        .unwrap();

        assert!(config.analysis.enable_sky_feature);
        assert_eq!(config.capture.interval_ms, 30_000);
        assert_eq!(config.capture.minimum_interval_ms, 1_000);
        assert_eq!(config.analysis.brightness.very_bright, 180.0);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn toml_with_invalid_values_fails_validation() {
        let result = Configuration::from_toml(
            r#"
            [analysis.sky_feature]
            stride = 0
            "#,
        );
        assert_eq!(result, Err(ConfigError::ZeroStride("sky feature")));
    }
}
