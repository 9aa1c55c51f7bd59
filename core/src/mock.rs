use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::sample::{SampleBatch, SamplePair};

/// Deterministic synthetic dual-channel PPG recording.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticPpg {
    pub heart_rate_bpm: f64,
    pub sampling_hz: f64,
    pub duration_secs: f64,
    pub dc_level: f64,
    pub amplitude: f64,
    /// Peak-to-peak width of the uniform noise added to every sample.
    pub noise: f64,
    pub seed: u64,
}

impl Default for SyntheticPpg {
    fn default() -> Self {
        SyntheticPpg {
            heart_rate_bpm: 72.0,
            sampling_hz: 10.0,
            duration_secs: 10.0,
            dc_level: 50_000.0,
            amplitude: 800.0,
            noise: 0.0,
            seed: 7,
        }
    }
}

impl SyntheticPpg {
    pub fn sample_count(&self) -> usize {
        (self.duration_secs * self.sampling_hz).round() as usize
    }

    pub fn batch(&self) -> SampleBatch {
        let mut rng = StdRng::seed_from_u64(self.seed);
        (0..self.sample_count())
            .map(|i| {
                let time = i as f64 / self.sampling_hz;
                let pulse = self.amplitude * pulse_shape(time * self.heart_rate_bpm / 60.0);
                let ir = self.dc_level + pulse + self.jitter(&mut rng);
                // red rides lower and with a smaller AC part, like a real sensor
                let red = 0.8 * self.dc_level + 0.6 * pulse + self.jitter(&mut rng);
                SamplePair::new(to_adc(red), to_adc(ir))
            })
            .collect()
    }

    fn jitter(&self, rng: &mut StdRng) -> f64 {
        if self.noise > 0.0 {
            rng.gen_range(-self.noise / 2.0..=self.noise / 2.0)
        } else {
            0.0
        }
    }
}

/// Sharp systolic crest over a broad trough, one cycle per unit phase.
/// The crest sits at integer phases.
fn pulse_shape(phase: f64) -> f64 {
    let angle = 2.0 * PI * phase;
    angle.cos() + 0.25 * (2.0 * angle).cos()
}

fn to_adc(value: f64) -> u32 {
    value.round().clamp(0.0, u32::MAX as f64) as u32
}

/// A batch whose samples all carry the same reading.
pub fn flat_batch(len: usize, red: u32, infrared: u32) -> SampleBatch {
    (0..len).map(|_| SamplePair::new(red, infrared)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_requested_length() {
        let ppg = SyntheticPpg::default();
        assert_eq!(ppg.sample_count(), 100);
        assert_eq!(ppg.batch().len(), 100);
    }

    #[test]
    fn same_seed_same_batch() {
        let ppg = SyntheticPpg {
            noise: 40.0,
            ..SyntheticPpg::default()
        };
        assert_eq!(ppg.batch(), ppg.batch());
        let other = SyntheticPpg { seed: 8, ..ppg.clone() };
        assert_ne!(ppg.batch(), other.batch());
    }

    #[test]
    fn samples_stay_around_dc_level() {
        let ppg = SyntheticPpg::default();
        for s in ppg.batch().iter() {
            assert!((s.infrared as f64 - ppg.dc_level).abs() <= 1.25 * ppg.amplitude + 1.0);
        }
    }

    #[test]
    fn flat_batch_is_flat() {
        let batch = flat_batch(10, 3, 4);
        assert_eq!(batch.len(), 10);
        assert!(batch.iter().all(|s| *s == SamplePair::new(3, 4)));
    }
}
