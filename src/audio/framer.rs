use std::borrow::Cow;

use super::error::AnalysisError;
use super::signal::AudioSignal;

/// One analysis window over the signal. Always `frame_length` samples long.
/// Interior frames borrow straight from the signal; only the tail frame is
/// copied so it can be zero-padded, and `valid_len` records how much of it
/// is real signal.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame<'a> {
    pub start: usize,
    pub valid_len: usize,
    pub samples: Cow<'a, [f32]>,
}

impl Frame<'_> {
    pub fn signal(&self) -> &[f32] {
        &self.samples[..self.valid_len]
    }
}

/// Number of frames needed to cover `len` samples. Never zero for a
/// non-empty signal: clips shorter than one frame yield exactly one frame.
pub fn frame_count(len: usize, frame_length: usize, hop_length: usize) -> usize {
    if len <= frame_length {
        1
    } else {
        1 + (len - frame_length).div_ceil(hop_length)
    }
}

/// Slice the signal into overlapping frames covering every sample.
pub fn frame_signal(
    signal: &AudioSignal,
    frame_length: usize,
    hop_length: usize,
) -> Result<Vec<Frame<'_>>, AnalysisError> {
    if frame_length == 0 || hop_length == 0 {
        return Err(AnalysisError::invalid_config(
            "frame_length and hop_length must be positive",
        ));
    }
    if hop_length > frame_length {
        return Err(AnalysisError::invalid_config(format!(
            "hop_length ({}) must not exceed frame_length ({})",
            hop_length, frame_length
        )));
    }

    let samples = signal.samples();
    let count = frame_count(samples.len(), frame_length, hop_length);

    let frames = (0..count)
        .map(|i| {
            let start = i * hop_length;
            let end = (start + frame_length).min(samples.len());
            let samples = if end - start == frame_length {
                Cow::Borrowed(&samples[start..end])
            } else {
                let mut buf = vec![0.0f32; frame_length];
                buf[..end - start].copy_from_slice(&samples[start..end]);
                Cow::Owned(buf)
            };
            Frame {
                start,
                valid_len: end - start,
                samples,
            }
        })
        .collect();

    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> AudioSignal {
        AudioSignal::new((0..len).map(|i| i as f32 / len as f32).collect(), 8000).unwrap()
    }

    #[test]
    fn short_clip_yields_one_padded_frame() {
        let signal = ramp(100);
        let frames = frame_signal(&signal, 256, 64).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].samples.len(), 256);
        assert_eq!(frames[0].valid_len, 100);
        assert!(frames[0].samples[100..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn frames_cover_whole_signal() {
        let signal = ramp(1000);
        let frames = frame_signal(&signal, 256, 100).unwrap();
        assert_eq!(frames.len(), frame_count(1000, 256, 100));
        let last = frames.last().unwrap();
        assert_eq!(last.start + last.valid_len, 1000);
        assert!(frames.iter().all(|f| f.samples.len() == 256));
        for pair in frames.windows(2) {
            assert_eq!(pair[1].start - pair[0].start, 100);
        }
    }

    #[test]
    fn consecutive_frames_overlap() {
        let signal = ramp(600);
        let frames = frame_signal(&signal, 200, 50).unwrap();
        assert_eq!(frames[0].samples[50..], frames[1].samples[..150]);
    }

    #[test]
    fn only_the_padded_tail_is_copied() {
        let signal = ramp(1000);
        let frames = frame_signal(&signal, 256, 100).unwrap();
        let (tail, interior) = frames.split_last().unwrap();
        for frame in interior {
            assert!(matches!(frame.samples, Cow::Borrowed(_)));
            assert_eq!(frame.samples.as_ptr(), signal.samples()[frame.start..].as_ptr());
        }
        assert!(tail.valid_len < 256);
        assert!(matches!(tail.samples, Cow::Owned(_)));
    }

    #[test]
    fn exact_fit_needs_no_padding() {
        let signal = ramp(1024);
        let frames = frame_signal(&signal, 512, 256).unwrap();
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.valid_len == 512));
        assert!(frames.iter().all(|f| matches!(f.samples, Cow::Borrowed(_))));
    }

    #[test]
    fn rejects_bad_configuration() {
        let signal = ramp(100);
        assert!(matches!(
            frame_signal(&signal, 0, 10),
            Err(AnalysisError::InvalidConfig(_))
        ));
        assert!(matches!(
            frame_signal(&signal, 10, 0),
            Err(AnalysisError::InvalidConfig(_))
        ));
        assert!(matches!(
            frame_signal(&signal, 10, 20),
            Err(AnalysisError::InvalidConfig(_))
        ));
    }
}
