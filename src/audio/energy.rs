use rayon::prelude::*;

use super::error::AnalysisError;
use super::framer::Frame;

#[derive(Clone, Debug, PartialEq)]
pub struct EnergyProfile {
    pub frame_rms: Vec<f64>,
    /// Arithmetic mean of `frame_rms`.
    pub mean: f64,
}

/// Root-mean-square of the frame's signal samples. Zero padding is excluded.
pub fn frame_rms(frame: &Frame<'_>) -> f64 {
    let samples = frame.signal();
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| s as f64 * s as f64).sum();
    (sum_sq / samples.len() as f64).sqrt()
}

pub fn estimate_energy(frames: &[Frame<'_>]) -> Result<EnergyProfile, AnalysisError> {
    if frames.is_empty() {
        return Err(AnalysisError::invalid_input("no frames to measure energy over"));
    }
    let frame_rms: Vec<f64> = frames.par_iter().map(frame_rms).collect();
    let mean = frame_rms.iter().sum::<f64>() / frame_rms.len() as f64;
    Ok(EnergyProfile { frame_rms, mean })
}
