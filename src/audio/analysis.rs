use std::time::{Duration, Instant};

use super::beat::{track_beats, FrameClock};
use super::energy::estimate_energy;
use super::error::AnalysisError;
use super::features::{round_to, AnalysisResult};
use super::framer::frame_signal;
use super::onset::{onset_envelope, Compression};
use super::signal::AudioSignal;
use super::spectrum::compute_spectra;
use super::tempo::estimate_tempo;
use crate::config::AnalysisConfig;

/// Wall-clock bound on one analysis, checked between stages.
struct Deadline {
    started: Instant,
    limit: Option<Duration>,
}

impl Deadline {
    fn new(limit: Option<Duration>) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    fn check(&self, next_stage: &'static str) -> Result<(), AnalysisError> {
        match self.limit {
            Some(limit) if self.started.elapsed() > limit => Err(AnalysisError::Timeout {
                stage: next_stage,
                limit,
            }),
            _ => Ok(()),
        }
    }
}

/// Estimate tempo and energy for one clip.
pub fn analyze(signal: &AudioSignal, config: &AnalysisConfig) -> Result<AnalysisResult, AnalysisError> {
    config.validate()?;
    let deadline = Deadline::new(config.timeout());
    let frame_rate = signal.sample_rate() as f64 / config.hop_length as f64;

    log::info!("Framing {} samples ({}/{})...", signal.len(), config.frame_length, config.hop_length);
    let frames = frame_signal(signal, config.frame_length, config.hop_length)?;
    deadline.check("spectral transform")?;

    log::info!("Spectra and energy ({} frames)...", frames.len());
    let (spectra, energy) = rayon::join(|| compute_spectra(&frames), || estimate_energy(&frames));
    let spectra = spectra?;
    let energy = energy?;
    log::debug!(
        "Energy: mean {:.4}, loudest frame {:.4}",
        energy.mean,
        energy.frame_rms.iter().copied().fold(0.0f64, f64::max)
    );
    deadline.check("onset detection")?;

    let compression = if config.log_compression {
        Compression::Log {
            gain: config.compression_gain,
        }
    } else {
        Compression::Linear
    };
    let envelope = onset_envelope(&spectra, compression);
    drop(spectra);
    deadline.check("tempo estimation")?;

    log::info!("Tempo estimation...");
    let candidate = estimate_tempo(&envelope, frame_rate, config);
    deadline.check("beat tracking")?;

    log::info!("Beat tracking...");
    let clock = FrameClock::centred(
        config.hop_length,
        config.frame_length,
        signal.sample_rate(),
        signal.duration(),
    );
    let estimate = track_beats(&envelope, candidate, clock, config.tightness);

    let raw_bpm = estimate.tempo.bpm;
    let (min_bpm, max_bpm) = config.bpm_range;
    let in_range = (min_bpm..=max_bpm).contains(&raw_bpm);
    let low_confidence = !in_range || estimate.tempo.confidence < config.min_confidence;
    if low_confidence {
        log::warn!(
            "Low-confidence tempo: {:.2} BPM (confidence {:.3}, range [{}, {}])",
            raw_bpm,
            estimate.tempo.confidence,
            min_bpm,
            max_bpm
        );
    }

    let result = AnalysisResult {
        bpm: raw_bpm.round() as u32,
        raw_bpm,
        energy: round_to(energy.mean, 4),
        tempo_confidence: estimate.tempo.confidence,
        low_confidence,
        beat_track: estimate.beats.times,
    };

    log::info!(
        "Result: {} BPM (raw {:.2}, confidence {:.3}), energy {:.4}, {} beats",
        result.bpm,
        result.raw_bpm,
        result.tempo_confidence,
        result.energy,
        result.beat_track.len()
    );

    Ok(result)
}
