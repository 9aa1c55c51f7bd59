use std::f64::consts::PI;

use biquad::{Biquad, Coefficients, DirectForm2Transposed};
use ndarray::{s, Array1, ArrayView1};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Parameters of a Butterworth bandpass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    pub order: usize,
    pub low_hz: f64,
    pub high_hz: f64,
    pub sampling_hz: f64,
}

impl FilterConfig {
    pub fn nyquist_hz(&self) -> f64 {
        self.sampling_hz / 2.0
    }

    /// Band edges relative to Nyquist, validated to satisfy `0 < low < high < 1`.
    pub fn normalized_band(&self) -> Result<(f64, f64)> {
        let nyquist = self.nyquist_hz();
        let invalid = Error::InvalidFilterConfig {
            low_hz: self.low_hz,
            high_hz: self.high_hz,
            nyquist_hz: nyquist,
        };
        if !(self.sampling_hz > 0.0 && self.sampling_hz.is_finite()) {
            return Err(invalid);
        }
        let (low, high) = (self.low_hz / nyquist, self.high_hz / nyquist);
        if !(0.0 < low && low < high && high < 1.0) {
            return Err(invalid);
        }
        Ok((low, high))
    }
}

/// A designed filter as a cascade of second-order sections.
#[derive(Debug, Clone)]
pub struct FilterCoefficients {
    sections: Vec<Coefficients<f64>>,
    sampling_hz: f64,
    min_samples: usize,
}

impl FilterCoefficients {
    /// Overrides the shortest sequence `apply` accepts.
    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples;
        self
    }

    pub fn min_samples(&self) -> usize {
        self.min_samples
    }

    pub fn sections(&self) -> &[Coefficients<f64>] {
        &self.sections
    }

    pub fn sampling_hz(&self) -> f64 {
        self.sampling_hz
    }

    /// Order of the full transfer function (twice the prototype order for a bandpass).
    pub fn order(&self) -> usize {
        2 * self.sections.len()
    }

    /// Numerator polynomial in powers of `z^-1`.
    pub fn feed_forward(&self) -> Vec<f64> {
        self.sections
            .iter()
            .fold(vec![1.0], |acc, c| poly_mul(&acc, &[c.b0, c.b1, c.b2]))
    }

    /// Denominator polynomial in powers of `z^-1`, leading coefficient 1.
    pub fn feed_back(&self) -> Vec<f64> {
        self.sections
            .iter()
            .fold(vec![1.0], |acc, c| poly_mul(&acc, &[1.0, c.a1, c.a2]))
    }

    pub fn magnitude_response(&self, freq_hz: f64) -> f64 {
        let omega = 2.0 * PI * freq_hz / self.sampling_hz;
        let z1 = Complex64::from_polar(1.0, -omega);
        let z2 = z1 * z1;
        self.sections
            .iter()
            .map(|c| {
                let num = z2 * c.b2 + z1 * c.b1 + c.b0;
                let den = z2 * c.a2 + z1 * c.a1 + 1.0;
                num / den
            })
            .fold(Complex64::new(1.0, 0.0), |acc, h| acc * h)
            .norm()
    }
}

/// Designs a digital Butterworth bandpass of the given prototype order.
///
/// The analog lowpass prototype is shifted to the band with the usual
/// lowpass-to-bandpass substitution, then mapped to the z-plane with the
/// bilinear transform on prewarped edges, so the -3 dB points land exactly
/// on `low_hz` and `high_hz`.
pub fn design(config: &FilterConfig) -> Result<FilterCoefficients> {
    let (low, high) = config.normalized_band()?;
    let order = config.order;
    if order == 0 {
        return Err(Error::InvalidParameter("filter order must be at least 1".to_string()));
    }

    // Work on a normalized sampling rate of 2 so that Nyquist is 1.
    let fs2 = 4.0;
    let warped_low = fs2 * (PI * low / 2.0).tan();
    let warped_high = fs2 * (PI * high / 2.0).tan();
    let bandwidth = warped_high - warped_low;
    let center_sq = warped_low * warped_high;

    let mut analog_poles = Vec::with_capacity(2 * order);
    for k in 0..order {
        let theta = PI * (2 * k + order + 1) as f64 / (2 * order) as f64;
        let half = Complex64::from_polar(1.0, theta) * (bandwidth / 2.0);
        let root = (half * half - center_sq).sqrt();
        analog_poles.push(half + root);
        analog_poles.push(half - root);
    }

    // Bandpass zeros: `order` at s = 0 and `order` at infinity.
    let analog_gain = bandwidth.powi(order as i32);
    let pole_product = analog_poles
        .iter()
        .fold(Complex64::new(1.0, 0.0), |acc, &p| acc * (fs2 - p));
    let gain = analog_gain * fs2.powi(order as i32) / pole_product.re;

    let digital_poles: Vec<Complex64> = analog_poles.iter().map(|&p| (fs2 + p) / (fs2 - p)).collect();

    let mut sections = pair_poles(&digital_poles)
        .into_iter()
        .map(|(a1, a2)| Coefficients {
            a1,
            a2,
            b0: 1.0,
            b1: 0.0,
            b2: -1.0,
        })
        .collect::<Vec<_>>();

    if let Some(first) = sections.first_mut() {
        first.b0 *= gain;
        first.b2 *= gain;
    }

    Ok(FilterCoefficients {
        sections,
        sampling_hz: config.sampling_hz,
        min_samples: min_samples(order),
    })
}

/// Groups poles into conjugate pairs (or pairs of real poles) and returns the
/// `(a1, a2)` denominator terms for each section.
fn pair_poles(poles: &[Complex64]) -> Vec<(f64, f64)> {
    let tolerance = 1e-10;

    let mut upper: Vec<Complex64> = poles.iter().copied().filter(|p| p.im > tolerance).collect();
    upper.sort_by(|a, b| a.arg().total_cmp(&b.arg()));

    let mut real: Vec<f64> = poles
        .iter()
        .filter(|p| p.im.abs() <= tolerance)
        .map(|p| p.re)
        .collect();
    real.sort_by(|a, b| a.total_cmp(b));

    let mut pairs: Vec<(f64, f64)> = upper.iter().map(|p| (-2.0 * p.re, p.norm_sqr())).collect();
    for chunk in real.chunks(2) {
        match chunk {
            [r0, r1] => pairs.push((-(r0 + r1), r0 * r1)),
            [r0] => pairs.push((-r0, 0.0)),
            _ => {}
        }
    }
    pairs
}

fn poly_mul(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// Default shortest sequence accepted for a given prototype order.
pub fn min_samples(order: usize) -> usize {
    3 * order
}

/// Zero-phase bandpass: the sequence is filtered forward, then backward, so
/// the output keeps the input's timing. Output length equals input length.
pub fn apply(coefficients: &FilterCoefficients, data: ArrayView1<f64>) -> Result<Array1<f64>> {
    let len = data.len();
    if len == 0 {
        return Err(Error::EmptyBatch);
    }
    if len < coefficients.min_samples {
        return Err(Error::InsufficientSamples {
            required: coefficients.min_samples,
            available: len,
        });
    }

    // The band excludes DC, so removing the mean only shortens the start-up transient.
    let mean = data.mean().unwrap_or(0.0);
    let centered = data.mapv(|x| x - mean);

    let pad = (3 * (coefficients.order() + 1)).min(len - 1);
    let extended = odd_extension(centered.view(), pad);

    let forward = forward_filter(extended.view(), coefficients.sections());
    let backward = backward_filter(forward.view(), coefficients.sections());

    Ok(backward.slice(s![pad..pad + len]).to_owned())
}

fn odd_extension(data: ArrayView1<f64>, pad: usize) -> Array1<f64> {
    let len = data.len();
    if pad == 0 {
        return data.to_owned();
    }
    let first = data[0];
    let last = data[len - 1];

    let mut extended = Vec::with_capacity(len + 2 * pad);
    extended.extend(data.slice(s![1..=pad;-1]).iter().map(|x| 2.0 * first - x));
    extended.extend(data.iter().copied());
    extended.extend(data.slice(s![len - 1 - pad..len - 1;-1]).iter().map(|x| 2.0 * last - x));
    Array1::from_vec(extended)
}

fn forward_filter(data: ArrayView1<f64>, sections: &[Coefficients<f64>]) -> Array1<f64> {
    let mut cascade: Vec<DirectForm2Transposed<f64>> =
        sections.iter().map(|c| DirectForm2Transposed::<f64>::new(*c)).collect();

    let mut processed_data = data.to_owned();
    for sample in processed_data.iter_mut() {
        *sample = cascade.iter_mut().fold(*sample, |x, stage| stage.run(x));
    }

    processed_data
}

fn backward_filter(data: ArrayView1<f64>, sections: &[Coefficients<f64>]) -> Array1<f64> {
    let reversed = data.slice(s![..;-1]);
    let processed_data = forward_filter(reversed, sections);
    processed_data.slice(s![..;-1]).to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::FRAC_1_SQRT_2;

    fn pulse_band(fs: f64) -> FilterConfig {
        FilterConfig {
            order: 2,
            low_hz: 0.5,
            high_hz: 3.0,
            sampling_hz: fs,
        }
    }

    #[test]
    fn rejects_band_outside_nyquist() {
        let config = FilterConfig { high_hz: 5.0, ..pulse_band(10.0) };
        assert!(matches!(design(&config), Err(Error::InvalidFilterConfig { .. })));

        let config = FilterConfig { low_hz: 0.0, ..pulse_band(10.0) };
        assert!(matches!(design(&config), Err(Error::InvalidFilterConfig { .. })));

        let config = FilterConfig { low_hz: 3.0, high_hz: 0.5, ..pulse_band(10.0) };
        assert!(matches!(design(&config), Err(Error::InvalidFilterConfig { .. })));

        let config = FilterConfig { sampling_hz: 0.0, ..pulse_band(10.0) };
        assert!(matches!(design(&config), Err(Error::InvalidFilterConfig { .. })));
    }

    #[test]
    fn rejects_zero_order() {
        let config = FilterConfig { order: 0, ..pulse_band(10.0) };
        assert!(matches!(design(&config), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn section_count_matches_order() {
        for order in 1..=5 {
            let coeff = design(&FilterConfig { order, ..pulse_band(50.0) }).unwrap();
            assert_eq!(coeff.sections().len(), order);
            assert_eq!(coeff.feed_forward().len(), 2 * order + 1);
            assert_eq!(coeff.feed_back().len(), 2 * order + 1);
        }
    }

    #[test]
    fn edges_are_half_power_points() {
        for fs in [10.0, 30.0, 100.0] {
            let coeff = design(&pulse_band(fs)).unwrap();
            assert_eq!(coeff.sampling_hz(), fs);
            assert_abs_diff_eq!(coeff.magnitude_response(0.5), FRAC_1_SQRT_2, epsilon = 1e-9);
            assert_abs_diff_eq!(coeff.magnitude_response(3.0), FRAC_1_SQRT_2, epsilon = 1e-9);
        }
    }

    #[test]
    fn passes_band_and_blocks_dc() {
        let coeff = design(&pulse_band(10.0)).unwrap();
        assert_abs_diff_eq!(coeff.magnitude_response(0.0), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(coeff.magnitude_response(4.999), 0.0, epsilon = 1e-2);
        assert!(coeff.magnitude_response(1.2) > 0.9);
    }

    #[test]
    fn feed_forward_is_symmetric_bandpass_numerator() {
        let coeff = design(&pulse_band(10.0)).unwrap();
        let b = coeff.feed_forward();
        // (1 - z^-2)^2 scaled: b = g * [1, 0, -2, 0, 1]
        assert_abs_diff_eq!(b[1], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(b[3], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(b[2], -2.0 * b[0], epsilon = 1e-12);
        assert_abs_diff_eq!(b[4], b[0], epsilon = 1e-12);
        assert_eq!(coeff.feed_back()[0], 1.0);
    }

    #[test]
    fn poles_are_stable() {
        for order in 1..=4 {
            let coeff = design(&FilterConfig { order, ..pulse_band(10.0) }).unwrap();
            for c in coeff.sections() {
                // stability triangle for a second-order section
                assert!(c.a2.abs() < 1.0);
                assert!(c.a1.abs() < 1.0 + c.a2);
            }
        }
    }

    #[test]
    fn apply_preserves_length() {
        let coeff = design(&pulse_band(10.0)).unwrap();
        for len in [6, 7, 15, 16, 100] {
            let data = Array1::from_iter((0..len).map(|i| (i as f64 * 0.7).sin()));
            let filtered = apply(&coeff, data.view()).unwrap();
            assert_eq!(filtered.len(), len);
        }
    }

    #[test]
    fn apply_rejects_short_and_empty_input() {
        let coeff = design(&pulse_band(10.0)).unwrap();
        let data = Array1::from_vec(vec![1.0, 2.0, 3.0]);
        assert_eq!(
            apply(&coeff, data.view()),
            Err(Error::InsufficientSamples { required: 6, available: 3 })
        );
        let empty = Array1::<f64>::zeros(0);
        assert_eq!(apply(&coeff, empty.view()), Err(Error::EmptyBatch));

        let strict = coeff.with_min_samples(20);
        let data = Array1::from_elem(19, 1.0);
        assert!(matches!(apply(&strict, data.view()), Err(Error::InsufficientSamples { required: 20, .. })));
    }

    #[test]
    fn constant_input_filters_to_zero() {
        let coeff = design(&pulse_band(10.0)).unwrap();
        let data = Array1::from_elem(40, 51234.0);
        let filtered = apply(&coeff, data.view()).unwrap();
        for x in filtered.iter() {
            assert_abs_diff_eq!(*x, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn sinusoid_peaks_are_not_shifted() {
        let fs = 40.0;
        let freq = 1.25;
        let period = (fs / freq) as usize;
        let data = Array1::from_iter((0..800).map(|i| 1000.0 + 50.0 * (2.0 * PI * freq * i as f64 / fs).cos()));
        let coeff = design(&pulse_band(fs)).unwrap();
        let filtered = apply(&coeff, data.view()).unwrap();

        // skip the edges where the filter is still settling
        let mut checked = 0;
        for expected in (0..800).step_by(period).filter(|&i| i >= 200 && i + 200 < 800) {
            let window = filtered.slice(s![expected - period / 2..expected + period / 2]);
            let argmax = window
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, _)| i + expected - period / 2)
                .unwrap();
            assert!(argmax.abs_diff(expected) <= 1, "peak at {} expected {}", argmax, expected);
            checked += 1;
        }
        assert!(checked >= 10);
    }
}
