use crate::config::AnalysisConfig;

/// Local maxima this close (in frames) to a multiple of the winning lag are
/// echoes of the same periodicity, not competitors.
const HARMONIC_TOLERANCE: f64 = 1.5;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TempoCandidate {
    pub bpm: f64,
    /// 0 means no reliable periodicity was found.
    pub confidence: f64,
}

/// Log-Gaussian weighting over tempo, centred on `center` BPM with a
/// standard deviation of `width` octaves.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TempoPrior {
    pub center: f64,
    pub width: f64,
}

impl TempoPrior {
    pub fn weight(&self, bpm: f64) -> f64 {
        let octaves = (bpm / self.center).log2() / self.width;
        (-0.5 * octaves * octaves).exp()
    }
}

/// Lags (in frames) whose tempo lies inside `bpm_range`.
fn lag_bounds(frame_rate: f64, (min_bpm, max_bpm): (f64, f64)) -> (usize, usize) {
    let min_lag = ((60.0 * frame_rate / max_bpm).ceil() as usize).max(1);
    let max_lag = (60.0 * frame_rate / min_bpm).floor() as usize;
    (min_lag, max_lag)
}

/// Autocovariance of the mean-removed envelope, each lag averaged over the
/// `n - lag` products that exist for it. Index 0 is the variance.
fn autocorrelation(envelope: &[f32], max_lag: usize) -> Vec<f64> {
    let n = envelope.len();
    let mean = envelope.iter().map(|&v| v as f64).sum::<f64>() / n as f64;
    let centred: Vec<f64> = envelope.iter().map(|&v| v as f64 - mean).collect();
    (0..=max_lag)
        .map(|lag| {
            let sum: f64 = centred[lag..].iter().zip(&centred).map(|(a, b)| a * b).sum();
            sum / (n - lag) as f64
        })
        .collect()
}

/// Dominant periodicity of the onset envelope, expressed in BPM.
///
/// The envelope's autocorrelation coefficients inside the configured lag range
/// are weighted by the tempo prior before the maximum is taken; the winning
/// lag is then refined with a parabola through its unweighted neighbours.
///
/// Confidence is the product of three terms in `[0, 1]`:
/// - sharpness, `1 - second / best` over the weighted local maxima, ignoring
///   maxima that sit on multiples of the winning lag;
/// - strength, the correlation coefficient at the winning lag;
/// - `1 - ambiguity`, where ambiguity is how well the half lag (double tempo)
///   correlates relative to the winning lag.
pub fn estimate_tempo(envelope: &[f32], frame_rate: f64, config: &AnalysisConfig) -> TempoCandidate {
    let fallback = TempoCandidate {
        bpm: config.fallback_bpm,
        confidence: 0.0,
    };

    if envelope.iter().all(|&v| v <= 0.0) {
        log::warn!(
            "Onset envelope is empty or silent; falling back to {:.1} BPM",
            config.fallback_bpm
        );
        return fallback;
    }

    let (min_lag, max_lag) = lag_bounds(frame_rate, config.bpm_range);
    let max_lag = max_lag.min(envelope.len().saturating_sub(1));
    if min_lag > max_lag {
        log::warn!(
            "Clip too short for tempo range ({} onset frames, need lag {}); falling back to {:.1} BPM",
            envelope.len(),
            min_lag,
            config.fallback_bpm
        );
        return fallback;
    }

    let ac = autocorrelation(envelope, (max_lag + 1).min(envelope.len() - 1));
    let variance = ac[0];
    if variance <= 0.0 {
        log::warn!(
            "Onset envelope is flat; falling back to {:.1} BPM",
            config.fallback_bpm
        );
        return fallback;
    }
    let rho: Vec<f64> = ac.iter().map(|&c| c / variance).collect();

    let prior = TempoPrior {
        center: config.tempo_prior_center,
        width: config.tempo_prior_width,
    };
    let weighted: Vec<f64> = (min_lag..=max_lag)
        .map(|lag| rho[lag].max(0.0) * prior.weight(60.0 * frame_rate / lag as f64))
        .collect();

    let mut best = 0;
    for (i, &score) in weighted.iter().enumerate() {
        if score > weighted[best] {
            best = i;
        }
    }
    if weighted[best] <= 0.0 {
        log::warn!(
            "No positive correlation in tempo range; falling back to {:.1} BPM",
            config.fallback_bpm
        );
        return fallback;
    }

    let lag = min_lag + best;
    let refined_lag = lag as f64 + parabolic_offset(&rho, lag);
    let bpm = 60.0 * frame_rate / refined_lag;

    let is_harmonic = |i: usize| {
        let candidate = (min_lag + i) as f64;
        let multiple = (candidate / refined_lag).round();
        multiple >= 2.0 && (candidate - multiple * refined_lag).abs() <= HARMONIC_TOLERANCE
    };
    let last = weighted.len() - 1;
    let second = (0..weighted.len())
        .filter(|&i| i != best && !is_harmonic(i))
        .filter(|&i| {
            let rises = i == 0 || weighted[i] > weighted[i - 1];
            let falls = i == last || weighted[i] >= weighted[i + 1];
            rises && falls
        })
        .map(|i| weighted[i])
        .fold(0.0f64, f64::max);
    let sharpness = (1.0 - second / weighted[best]).clamp(0.0, 1.0);

    let strength = rho[lag].clamp(0.0, 1.0);

    let half = refined_lag / 2.0;
    let lo = (half.floor() as usize).saturating_sub(1).max(min_lag);
    let hi = (half.ceil() as usize + 1).min(max_lag);
    let ambiguity = if lo <= hi {
        let half_peak = rho[lo..=hi].iter().copied().fold(0.0f64, f64::max);
        (half_peak / rho[lag]).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let confidence = sharpness * strength * (1.0 - ambiguity);

    log::debug!(
        "Tempo: lag {} (refined {:.3}) -> {:.2} BPM, confidence {:.3} (sharpness {:.3}, strength {:.3}, octave ambiguity {:.3})",
        lag,
        refined_lag,
        bpm,
        confidence,
        sharpness,
        strength,
        ambiguity
    );

    TempoCandidate { bpm, confidence }
}

/// Vertex offset of the parabola through `values[i-1..=i+1]`, in (-0.5, 0.5).
fn parabolic_offset(values: &[f64], i: usize) -> f64 {
    if i == 0 || i + 1 >= values.len() {
        return 0.0;
    }
    let (y0, y1, y2) = (values[i - 1], values[i], values[i + 1]);
    let denom = y0 - 2.0 * y1 + y2;
    if denom >= 0.0 {
        return 0.0;
    }
    let offset = 0.5 * (y0 - y2) / denom;
    if offset.abs() < 0.5 {
        offset
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Deterministic values in `[0, 1)` from a 64-bit LCG.
    fn noise(len: usize, mut state: u64) -> Vec<f32> {
        (0..len)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                (state >> 40) as f32 / (1u64 << 24) as f32
            })
            .collect()
    }

    fn pulses(len: usize, first: usize, period: usize) -> Vec<f32> {
        let mut env = vec![0.0f32; len];
        for i in (first..len).step_by(period) {
            env[i] = 1.0;
        }
        env
    }

    #[test]
    fn silent_envelope_falls_back() {
        let config = AnalysisConfig::default();
        let candidate = estimate_tempo(&vec![0.0; 200], 43.0, &config);
        assert_eq!(candidate.confidence, 0.0);
        assert_eq!(candidate.bpm, config.fallback_bpm);
    }

    #[test]
    fn too_short_envelope_falls_back() {
        let config = AnalysisConfig::default();
        let candidate = estimate_tempo(&[0.0, 1.0, 0.5], 43.0, &config);
        assert_eq!(candidate.confidence, 0.0);
        assert_eq!(candidate.bpm, config.fallback_bpm);
    }

    #[test]
    fn finds_period_of_pulse_train() {
        // 40 frames per second, a pulse every 20 frames = 120 BPM
        let env = pulses(400, 5, 20);
        let candidate = estimate_tempo(&env, 40.0, &AnalysisConfig::default());
        assert_abs_diff_eq!(candidate.bpm, 120.0, epsilon = 0.01);
        assert!(candidate.confidence > 0.5 && candidate.confidence <= 1.0);
    }

    #[test]
    fn flat_envelope_falls_back() {
        let config = AnalysisConfig::default();
        let candidate = estimate_tempo(&vec![0.7; 300], 43.0, &config);
        assert_eq!(candidate.confidence, 0.0);
        assert_eq!(candidate.bpm, config.fallback_bpm);
    }

    #[test]
    fn aperiodic_envelope_has_low_confidence() {
        let config = AnalysisConfig::default();
        for seed in [1, 7, 42, 1234] {
            // Large positive offset: only the fluctuations may count.
            let env: Vec<f32> = noise(430, seed).into_iter().map(|v| 10.0 + v).collect();
            let candidate = estimate_tempo(&env, 43.07, &config);
            assert!(
                candidate.confidence < config.min_confidence,
                "seed {}: confidence {}",
                seed,
                candidate.confidence
            );
        }
    }

    #[test]
    fn octave_ambiguity_lowers_confidence() {
        // A pulse every 13 frames at 40 fps is 184.6 BPM; the prior prefers
        // the 92.3 BPM octave, which correlates exactly as well.
        let env = pulses(400, 3, 13);
        let config = AnalysisConfig::default();
        let candidate = estimate_tempo(&env, 40.0, &config);
        assert_abs_diff_eq!(candidate.bpm, 2400.0 / 26.0, epsilon = 0.1);
        assert!(candidate.confidence < config.min_confidence, "confidence {}", candidate.confidence);
    }

    #[test]
    fn prior_resolves_octave_ambiguity() {
        // A pulse every 10 frames correlates at 240, 120 and 60 BPM alike.
        let env = pulses(400, 5, 10);

        let centred_120 = estimate_tempo(&env, 40.0, &AnalysisConfig::default());
        assert_abs_diff_eq!(centred_120.bpm, 120.0, epsilon = 0.01);

        let config = AnalysisConfig {
            tempo_prior_center: 60.0,
            ..Default::default()
        };
        let centred_60 = estimate_tempo(&env, 40.0, &config);
        assert_abs_diff_eq!(centred_60.bpm, 60.0, epsilon = 0.01);
    }

    #[test]
    fn interpolates_between_lags() {
        // Period of 21.4 frames: spread pulses land 21 or 22 frames apart.
        let mut env = vec![0.0f32; 430];
        let mut pos = 3.0f64;
        while (pos as usize) + 1 < env.len() {
            let c = pos as usize;
            env[c - 1] += 0.5;
            env[c] += 1.0;
            env[c + 1] += 0.5;
            pos += 21.4;
        }
        let candidate = estimate_tempo(&env, 43.0, &AnalysisConfig::default());
        let lag = 60.0 * 43.0 / candidate.bpm;
        assert!(lag > 21.0 && lag < 22.0, "lag {}", lag);
    }

    #[test]
    fn prior_peaks_at_center() {
        let prior = TempoPrior { center: 120.0, width: 1.0 };
        assert_abs_diff_eq!(prior.weight(120.0), 1.0);
        assert_abs_diff_eq!(prior.weight(60.0), prior.weight(240.0), epsilon = 1e-12);
        assert!(prior.weight(60.0) < prior.weight(100.0));
    }
}
