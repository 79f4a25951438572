use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::audio::error::AnalysisError;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Request-scoped analysis parameters. Every field has a default so a
/// partially filled `[analysis]` table is valid.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnalysisConfig {
    /// Analysis window in samples.
    #[serde(default = "default_frame_length")]
    pub frame_length: usize,
    /// Stride between consecutive windows in samples.
    #[serde(default = "default_hop_length")]
    pub hop_length: usize,
    /// Plausible tempo range `[min, max]` in BPM.
    #[serde(default = "default_bpm_range")]
    pub bpm_range: (f64, f64),
    /// Centre of the log-Gaussian tempo prior used against octave errors.
    #[serde(default = "default_tempo_prior_center")]
    pub tempo_prior_center: f64,
    /// Standard deviation of the tempo prior, in octaves.
    #[serde(default = "default_tempo_prior_width")]
    pub tempo_prior_width: f64,
    /// Tempo reported when the onset envelope shows no periodicity.
    #[serde(default = "default_fallback_bpm")]
    pub fallback_bpm: f64,
    /// Weight of the interval penalty in the beat tracker.
    #[serde(default = "default_tightness")]
    pub tightness: f64,
    #[serde(default = "default_log_compression")]
    pub log_compression: bool,
    #[serde(default = "default_compression_gain")]
    pub compression_gain: f32,
    /// Results below this confidence are flagged as low confidence.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    #[serde(default)]
    pub timeout_secs: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub include_beats: bool,
    #[serde(default)]
    pub compact: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            frame_length: default_frame_length(),
            hop_length: default_hop_length(),
            bpm_range: default_bpm_range(),
            tempo_prior_center: default_tempo_prior_center(),
            tempo_prior_width: default_tempo_prior_width(),
            fallback_bpm: default_fallback_bpm(),
            tightness: default_tightness(),
            log_compression: default_log_compression(),
            compression_gain: default_compression_gain(),
            min_confidence: default_min_confidence(),
            timeout_secs: None,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.frame_length == 0 {
            return Err(AnalysisError::invalid_config("frame_length must be positive"));
        }
        if self.hop_length == 0 {
            return Err(AnalysisError::invalid_config("hop_length must be positive"));
        }
        if self.hop_length > self.frame_length {
            return Err(AnalysisError::invalid_config(format!(
                "hop_length ({}) must not exceed frame_length ({})",
                self.hop_length, self.frame_length
            )));
        }
        let (min_bpm, max_bpm) = self.bpm_range;
        if !(min_bpm.is_finite() && max_bpm.is_finite() && min_bpm > 0.0 && min_bpm < max_bpm) {
            return Err(AnalysisError::invalid_config(format!(
                "bpm_range must satisfy 0 < min < max, got [{}, {}]",
                min_bpm, max_bpm
            )));
        }
        if !(self.tempo_prior_center.is_finite() && self.tempo_prior_center > 0.0) {
            return Err(AnalysisError::invalid_config("tempo_prior_center must be positive"));
        }
        if !(self.tempo_prior_width.is_finite() && self.tempo_prior_width > 0.0) {
            return Err(AnalysisError::invalid_config("tempo_prior_width must be positive"));
        }
        if !(self.fallback_bpm.is_finite() && self.fallback_bpm > 0.0) {
            return Err(AnalysisError::invalid_config("fallback_bpm must be positive"));
        }
        if !(self.tightness.is_finite() && self.tightness >= 0.0) {
            return Err(AnalysisError::invalid_config("tightness must be non-negative"));
        }
        if !(self.compression_gain.is_finite() && self.compression_gain > 0.0) {
            return Err(AnalysisError::invalid_config("compression_gain must be positive"));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(AnalysisError::invalid_config("min_confidence must lie in [0, 1]"));
        }
        if let Some(secs) = self.timeout_secs {
            if !(secs.is_finite() && secs > 0.0) {
                return Err(AnalysisError::invalid_config("timeout_secs must be positive"));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs_f64)
    }
}

fn default_frame_length() -> usize { 2048 }
fn default_hop_length() -> usize { 512 }
fn default_bpm_range() -> (f64, f64) { (40.0, 240.0) }
fn default_tempo_prior_center() -> f64 { 120.0 }
fn default_tempo_prior_width() -> f64 { 1.0 }
fn default_fallback_bpm() -> f64 { 120.0 }
fn default_tightness() -> f64 { 100.0 }
fn default_log_compression() -> bool { true }
fn default_compression_gain() -> f32 { 1.0 }
fn default_min_confidence() -> f64 { 0.1 }

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(err) => {
            log::warn!("Ignoring malformed config {}: {}", path.display(), err);
            None
        }
    }
}
