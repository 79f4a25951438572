use super::spectrum::SpectrumFrame;

/// Magnitude compression applied before differencing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Compression {
    Linear,
    /// `ln(1 + gain * |X|)`
    Log { gain: f32 },
}

impl Compression {
    fn apply(self, magnitude: f32) -> f32 {
        match self {
            Compression::Linear => magnitude,
            Compression::Log { gain } => (gain * magnitude).ln_1p(),
        }
    }
}

/// Half-wave rectified spectral flux, one value per spectrum frame.
///
/// The first value has no predecessor and is always 0, so the envelope is
/// exactly as long as the frame sequence. Only the previous compressed row is
/// kept while walking the spectra.
pub fn onset_envelope(spectra: &[SpectrumFrame], compression: Compression) -> Vec<f32> {
    let Some((first, rest)) = spectra.split_first() else {
        return Vec::new();
    };

    let mut envelope = Vec::with_capacity(spectra.len());
    envelope.push(0.0);

    let mut prev: Vec<f32> = first.magnitudes.iter().map(|&m| compression.apply(m)).collect();
    for spectrum in rest {
        let mut flux = 0.0f32;
        for (slot, &m) in prev.iter_mut().zip(&spectrum.magnitudes) {
            let cur = compression.apply(m);
            flux += (cur - *slot).max(0.0);
            *slot = cur;
        }
        envelope.push(flux);
    }
    envelope
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrum(values: &[f32]) -> SpectrumFrame {
        SpectrumFrame {
            magnitudes: values.to_vec(),
        }
    }

    #[test]
    fn envelope_matches_frame_count() {
        let spectra = vec![spectrum(&[1.0, 2.0]); 5];
        let env = onset_envelope(&spectra, Compression::Linear);
        assert_eq!(env.len(), 5);
        assert_eq!(env[0], 0.0);
    }

    #[test]
    fn ignores_decreases() {
        let spectra = vec![
            spectrum(&[1.0, 1.0, 1.0]),
            spectrum(&[3.0, 0.0, 1.5]),
            spectrum(&[0.0, 0.0, 0.0]),
        ];
        let env = onset_envelope(&spectra, Compression::Linear);
        assert_eq!(env, vec![0.0, 2.5, 0.0]);
    }

    #[test]
    fn log_compression_reduces_flux() {
        let spectra = vec![spectrum(&[0.0; 4]), spectrum(&[10.0; 4])];
        let linear = onset_envelope(&spectra, Compression::Linear);
        let log = onset_envelope(&spectra, Compression::Log { gain: 1.0 });
        assert!(log[1] > 0.0);
        assert!(log[1] < linear[1]);
    }

    #[test]
    fn each_frame_is_compared_with_its_direct_predecessor() {
        let spectra = vec![
            spectrum(&[0.0, 4.0]),
            spectrum(&[2.0, 0.0]),
            spectrum(&[2.0, 1.0]),
            spectrum(&[5.0, 1.0]),
        ];
        let env = onset_envelope(&spectra, Compression::Linear);
        assert_eq!(env, vec![0.0, 2.0, 1.0, 3.0]);
    }

    #[test]
    fn empty_input() {
        assert!(onset_envelope(&[], Compression::Linear).is_empty());
    }
}
