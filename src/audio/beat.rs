use super::tempo::TempoCandidate;

/// Half-width, in frames, of the neighbourhood used to place a beat between
/// frame boundaries.
const REFINE_RADIUS: usize = 2;

/// Beats whose onset falls below this fraction of the RMS onset at beats are
/// trimmed from either end of the track.
const TRIM_RATIO: f64 = 0.5;

/// Maps envelope positions (in frames) to seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameClock {
    pub frame_rate: f64,
    /// Seconds from a frame's first sample to the instant it represents.
    pub offset: f64,
    /// Clip length in seconds; no time is reported past it.
    pub duration: f64,
}

impl FrameClock {
    /// Frames stamped at the centre of their analysis window.
    pub fn centred(hop_length: usize, frame_length: usize, sample_rate: u32, duration: f64) -> Self {
        Self {
            frame_rate: sample_rate as f64 / hop_length as f64,
            offset: frame_length as f64 / 2.0 / sample_rate as f64,
            duration,
        }
    }

    pub fn time_at(&self, position: f64) -> f64 {
        (position / self.frame_rate + self.offset).min(self.duration)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BeatTrack {
    /// Onset frame chosen for each beat.
    pub frames: Vec<usize>,
    /// Beat instants in seconds, strictly increasing. A beat is stamped at the
    /// centre of its analysis window, where the onset it responds to lies.
    pub times: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BeatEstimate {
    pub tempo: TempoCandidate,
    pub beats: BeatTrack,
}

/// Place a globally consistent beat sequence on the onset envelope and
/// re-derive the tempo from it.
///
/// Each frame's cumulative score is its normalised onset strength plus the
/// best predecessor score, penalised by `tightness * ((interval - period) /
/// period)^2`. The backtrace from the strongest frame in the final period
/// yields the track. The refined tempo is the median inter-beat interval.
/// With fewer than two beats the candidate is returned unchanged.
pub fn track_beats(
    envelope: &[f32],
    candidate: TempoCandidate,
    clock: FrameClock,
    tightness: f64,
) -> BeatEstimate {
    let frame_rate = clock.frame_rate;
    let unchanged = |beats: BeatTrack| BeatEstimate {
        tempo: candidate,
        beats,
    };

    let Some(local) = normalize(envelope) else {
        return unchanged(BeatTrack::default());
    };
    let period = 60.0 * frame_rate / candidate.bpm;
    if !period.is_finite() || period <= 0.0 {
        return unchanged(BeatTrack::default());
    }

    let frames = trim(dp_search(&local, period, tightness), &local);
    let positions = refine(&frames, &local);
    let beats = BeatTrack {
        times: positions.iter().map(|&p| clock.time_at(p)).collect(),
        frames,
    };
    if beats.frames.len() < 2 {
        log::warn!(
            "Beat tracker found {} beat(s); keeping raw tempo",
            beats.frames.len()
        );
        return unchanged(beats);
    }

    let mut intervals: Vec<f64> = positions.windows(2).map(|w| w[1] - w[0]).collect();
    let interval = median(&mut intervals);
    let bpm = 60.0 * frame_rate / interval;

    log::debug!(
        "Beat tracker: {} beats, median interval {:.3} frames -> {:.2} BPM (candidate {:.2})",
        beats.frames.len(),
        interval,
        bpm,
        candidate.bpm
    );

    BeatEstimate {
        tempo: TempoCandidate {
            bpm,
            confidence: candidate.confidence,
        },
        beats,
    }
}

/// Scale the envelope to unit standard deviation. `None` when it carries no
/// onsets at all.
fn normalize(envelope: &[f32]) -> Option<Vec<f64>> {
    let peak = envelope.iter().copied().fold(0.0f32, f32::max);
    if envelope.is_empty() || peak <= 0.0 {
        return None;
    }
    let n = envelope.len() as f64;
    let mean = envelope.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = envelope.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;
    let scale = if var > 0.0 { var.sqrt() } else { peak as f64 };
    Some(envelope.iter().map(|&v| v as f64 / scale).collect())
}

fn dp_search(local: &[f64], period: f64, tightness: f64) -> Vec<usize> {
    let n = local.len();
    let min_gap = ((period / 2.0).round() as usize).max(1);
    let max_gap = ((2.0 * period).round() as usize).max(min_gap);

    let mut cumulative = vec![0.0f64; n];
    let mut backlink: Vec<Option<usize>> = vec![None; n];

    for t in 0..n {
        let mut best: Option<(usize, f64)> = None;
        if t >= min_gap {
            for prev in t.saturating_sub(max_gap)..=t - min_gap {
                let deviation = ((t - prev) as f64 - period) / period;
                let score = cumulative[prev] - tightness * deviation * deviation;
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((prev, score));
                }
            }
        }
        cumulative[t] = local[t];
        if let Some((prev, score)) = best.filter(|&(_, s)| s > 0.0) {
            cumulative[t] += score;
            backlink[t] = Some(prev);
        }
    }

    let tail_start = n.saturating_sub(period.ceil() as usize);
    let mut last = tail_start;
    for t in tail_start..n {
        if cumulative[t] > cumulative[last] {
            last = t;
        }
    }

    let mut beats = vec![last];
    let mut cursor = last;
    while let Some(prev) = backlink[cursor] {
        beats.push(prev);
        cursor = prev;
    }
    beats.reverse();
    beats
}

/// Drop weak beats from both ends; the DP happily extrapolates the grid into
/// silence before the first and after the last onset.
fn trim(beats: Vec<usize>, local: &[f64]) -> Vec<usize> {
    if beats.is_empty() {
        return beats;
    }
    let rms = (beats.iter().map(|&b| local[b] * local[b]).sum::<f64>() / beats.len() as f64).sqrt();
    let threshold = TRIM_RATIO * rms;
    let strong = |b: &usize| local[*b] >= threshold && local[*b] > 0.0;

    let Some(first) = beats.iter().position(strong) else {
        return Vec::new();
    };
    let last = beats.iter().rposition(strong).unwrap_or(first);
    beats[first..=last].to_vec()
}

/// Sub-frame beat positions: each beat moves to the onset centroid of its
/// neighbourhood. Falls back to the raw frames if the refined positions would
/// not be strictly increasing.
fn refine(frames: &[usize], local: &[f64]) -> Vec<f64> {
    let last_frame = local.len().saturating_sub(1);
    let refined: Vec<f64> = frames
        .iter()
        .map(|&b| {
            let lo = b.saturating_sub(REFINE_RADIUS);
            let hi = (b + REFINE_RADIUS).min(last_frame);
            let mass: f64 = local[lo..=hi].iter().sum();
            if mass > 0.0 {
                let moment: f64 = (lo..=hi).map(|j| j as f64 * local[j]).sum();
                (moment / mass).clamp(0.0, last_frame as f64)
            } else {
                b as f64
            }
        })
        .collect();

    if refined.windows(2).all(|w| w[1] > w[0]) {
        refined
    } else {
        frames.iter().map(|&b| b as f64).collect()
    }
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        0.5 * (values[mid - 1] + values[mid])
    } else {
        values[mid]
    }
}
