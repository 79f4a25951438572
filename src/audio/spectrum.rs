use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};

use super::error::AnalysisError;
use super::framer::Frame;

/// Magnitude spectrum of one frame, bins `0..=fft_size/2`.
#[derive(Clone, Debug, PartialEq)]
pub struct SpectrumFrame {
    pub magnitudes: Vec<f32>,
}

/// Transform length for a frame: the next power of two at or above it.
pub fn fft_size(frame_length: usize) -> usize {
    frame_length.next_power_of_two()
}

/// Windowed magnitude spectra, one per frame and in frame order.
///
/// The Hann window spans the logical frame; any extra length needed to reach
/// a power of two is zero-padded after windowing.
pub fn compute_spectra(frames: &[Frame<'_>]) -> Result<Vec<SpectrumFrame>, AnalysisError> {
    let Some(first) = frames.first() else {
        return Ok(Vec::new());
    };
    let frame_length = first.samples.len();
    let size = fft_size(frame_length);
    let bins = size / 2 + 1;
    let hann = hann_window(frame_length);

    // Plans are Send + Sync; one plan is shared by every worker.
    let fft = FftPlanner::<f32>::new().plan_fft_forward(size);

    let spectra: Vec<SpectrumFrame> = frames
        .par_iter()
        .map(|frame| {
            let mut buffer = vec![Complex::new(0.0f32, 0.0); size];
            for (slot, (&s, &w)) in buffer.iter_mut().zip(frame.samples.iter().zip(&hann)) {
                slot.re = s * w;
            }
            fft.process(&mut buffer);
            SpectrumFrame {
                magnitudes: buffer[..bins].iter().map(|c| c.norm()).collect(),
            }
        })
        .collect();

    if let Some((index, _)) = spectra
        .iter()
        .enumerate()
        .find(|(_, s)| s.magnitudes.iter().any(|m| !m.is_finite()))
    {
        return Err(AnalysisError::NumericInstability {
            stage: "spectral transform",
            detail: format!(
                "non-finite magnitude in frame {} (start sample {})",
                index, frames[index].start
            ),
        });
    }

    Ok(spectra)
}

/// Symmetric Hann window.
pub fn hann_window(size: usize) -> Vec<f32> {
    if size == 1 {
        return vec![1.0];
    }
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn frame_of(samples: Vec<f32>) -> Frame<'static> {
        Frame {
            start: 0,
            valid_len: samples.len(),
            samples: samples.into(),
        }
    }

    #[test]
    fn hann_window_tapers_to_zero() {
        let w = hann_window(1024);
        assert_abs_diff_eq!(w[0], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(w[1023], 0.0, epsilon = 1e-6);
        assert!(w[511] > 0.99);
    }

    #[test]
    fn pads_to_power_of_two() {
        assert_eq!(fft_size(1000), 1024);
        assert_eq!(fft_size(2048), 2048);
        let spectra = compute_spectra(&[frame_of(vec![0.1; 1000])]).unwrap();
        assert_eq!(spectra[0].magnitudes.len(), 513);
    }

    #[test]
    fn sine_peaks_at_its_bin() {
        let size = 1024;
        let bin = 32;
        let samples: Vec<f32> = (0..size)
            .map(|i| (2.0 * std::f32::consts::PI * bin as f32 * i as f32 / size as f32).sin())
            .collect();
        let spectra = compute_spectra(&[frame_of(samples)]).unwrap();
        let peak = spectra[0]
            .magnitudes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, bin);
    }

    #[test]
    fn preserves_frame_order() {
        let frames: Vec<Frame> = (0..8).map(|i| frame_of(vec![i as f32 * 0.1; 256])).collect();
        let spectra = compute_spectra(&frames).unwrap();
        assert_eq!(spectra.len(), 8);
        for pair in spectra.windows(2) {
            assert!(pair[1].magnitudes[0] > pair[0].magnitudes[0]);
        }
    }

    #[test]
    fn non_finite_input_is_reported() {
        let mut samples = vec![0.0; 256];
        samples[100] = f32::NAN;
        let err = compute_spectra(&[frame_of(samples)]).unwrap_err();
        assert!(matches!(err, AnalysisError::NumericInstability { .. }));
    }
}
