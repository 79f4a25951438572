use serde::Serialize;

/// Output of one analysis run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnalysisResult {
    /// Tempo rounded half away from zero.
    pub bpm: u32,
    /// Unrounded tempo the integer was derived from.
    pub raw_bpm: f64,
    /// Mean per-frame RMS, rounded to 4 decimal places.
    pub energy: f64,
    pub tempo_confidence: f64,
    /// Set when confidence is below the configured minimum or the tempo
    /// falls outside the configured range.
    pub low_confidence: bool,
    /// Beat instants in seconds.
    pub beat_track: Vec<f64>,
}

/// JSON record for one analysed file.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrackReport {
    pub file_name: String,
    pub bpm: u32,
    pub energy: f64,
    pub tempo_confidence: f64,
    pub low_confidence: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beat_track: Option<Vec<f64>>,
}

impl TrackReport {
    pub fn new(file_name: impl Into<String>, result: AnalysisResult, include_beats: bool) -> Self {
        Self {
            file_name: file_name.into(),
            bpm: result.bpm,
            energy: result.energy,
            tempo_confidence: round_to(result.tempo_confidence, 4),
            low_confidence: result.low_confidence,
            beat_track: include_beats.then_some(result.beat_track),
        }
    }
}

/// Round half away from zero to `digits` decimal places.
pub fn round_to(value: f64, digits: i32) -> f64 {
    let scale = 10f64.powi(digits);
    (value * scale).round() / scale
}
