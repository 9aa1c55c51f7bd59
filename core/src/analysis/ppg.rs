use ndarray::{s, Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use slog::{debug, info, warn, Logger};

use crate::analysis::filter::{self, FilterCoefficients, FilterConfig};
use crate::analysis::normalize::{NormalizationRange, TargetRange};
use crate::analysis::peaks::{Extremum, PeakDetector, PeakSet};
use crate::error::{Error, Result};
use crate::log::silent_logger;
use crate::sample::SampleBatch;

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Parameters {
    pub sampling_frequency: f64,
    pub filter_cutoff_low: f64,
    pub filter_cutoff_high: f64,
    pub filter_order: usize,
    pub normalized_min: f64,
    pub normalized_max: f64,
    pub peak_min_distance_secs: f64,
    pub peak_min_prominence: f64,
    /// Shortest batch accepted; `None` means `3 × filter_order`.
    pub min_samples: Option<usize>,
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters {
            sampling_frequency: 10.0,
            filter_cutoff_low: 0.5,
            filter_cutoff_high: 3.0,
            filter_order: 2,
            normalized_min: 500.0,
            normalized_max: 600.0,
            peak_min_distance_secs: 0.5,
            peak_min_prominence: 5.0,
            min_samples: None,
        }
    }
}

impl Parameters {
    pub fn filter_config(&self) -> FilterConfig {
        FilterConfig {
            order: self.filter_order,
            low_hz: self.filter_cutoff_low,
            high_hz: self.filter_cutoff_high,
            sampling_hz: self.sampling_frequency,
        }
    }

    pub fn target_range(&self) -> Result<TargetRange> {
        TargetRange::new(self.normalized_min, self.normalized_max)
    }

    /// Minimum spacing between accepted extrema in samples, never below one.
    pub fn peak_min_distance(&self) -> usize {
        ((self.peak_min_distance_secs * self.sampling_frequency).ceil() as usize).max(1)
    }
}

/// Signal-derived features of one batch. Every field that depends on
/// detected extrema is `None` when its precondition is not met.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub heart_rate_bpm: Option<f64>,
    pub systolic_peak_amplitude: Option<f64>,
    pub diastolic_peak_amplitude: Option<f64>,
    pub mean_normalized_infrared: f64,
    pub pulse_area: Option<f64>,
    pub dc_component: f64,
}

impl FeatureRecord {
    pub fn is_complete(&self) -> bool {
        self.heart_rate_bpm.is_some()
            && self.systolic_peak_amplitude.is_some()
            && self.diastolic_peak_amplitude.is_some()
            && self.pulse_area.is_some()
    }
}

/// Everything one extraction produces: the feature record plus the
/// per-sample sequences handed on for archival.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub record: FeatureRecord,
    pub raw_red: Array1<f64>,
    pub raw_infrared: Array1<f64>,
    pub normalized_red: Array1<f64>,
    pub normalized_infrared: Array1<f64>,
    pub normalized_filtered_infrared: Array1<f64>,
    pub peaks: PeakSet,
    pub valleys: PeakSet,
}

pub struct FeatureExtractor {
    params: Parameters,
    coefficients: FilterCoefficients,
    target: TargetRange,
    detector: PeakDetector,
    logger: Logger,
}

impl FeatureExtractor {
    /// Validates the parameters and designs the filter once. Any
    /// configuration problem is reported here rather than per batch.
    pub fn new(params: Parameters) -> Result<Self> {
        if !(params.peak_min_distance_secs >= 0.0 && params.peak_min_distance_secs.is_finite()) {
            return Err(Error::InvalidParameter(format!(
                "peak_min_distance_secs must be a non-negative number, got {}",
                params.peak_min_distance_secs
            )));
        }
        if !(params.peak_min_prominence >= 0.0) {
            return Err(Error::InvalidParameter(format!(
                "peak_min_prominence must be non-negative, got {}",
                params.peak_min_prominence
            )));
        }

        let target = params.target_range()?;
        let mut coefficients = filter::design(&params.filter_config())?;
        if let Some(min_samples) = params.min_samples {
            coefficients = coefficients.with_min_samples(min_samples);
        }
        let detector = PeakDetector::new(params.peak_min_distance(), params.peak_min_prominence);

        Ok(FeatureExtractor {
            params,
            coefficients,
            target,
            detector,
            logger: silent_logger(),
        })
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        info!(logger, "feature extractor configured";
            "sampling_hz" => self.params.sampling_frequency,
            "band_low_hz" => self.params.filter_cutoff_low,
            "band_high_hz" => self.params.filter_cutoff_high,
            "order" => self.params.filter_order,
            "min_distance" => self.detector.min_separation);
        self.logger = logger;
        self
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn coefficients(&self) -> &FilterCoefficients {
        &self.coefficients
    }

    pub fn extract(&self, batch: &SampleBatch) -> Result<FeatureRecord> {
        self.analyze(batch).map(|analysis| analysis.record)
    }

    /// Runs every batch independently; a failing batch does not stop the run.
    pub fn extract_all<'a, I>(&self, batches: I) -> Vec<Result<FeatureRecord>>
    where
        I: IntoIterator<Item = &'a SampleBatch>,
    {
        batches
            .into_iter()
            .enumerate()
            .map(|(index, batch)| {
                let result = self.extract(batch);
                if let Err(e) = &result {
                    warn!(self.logger, "skipping batch"; "index" => index, "error" => %e);
                }
                result
            })
            .collect()
    }

    pub fn analyze(&self, batch: &SampleBatch) -> Result<Analysis> {
        if batch.is_empty() {
            return Err(Error::EmptyBatch);
        }

        let raw_red = batch.red();
        let raw_infrared = batch.infrared();

        let filtered = filter::apply(&self.coefficients, raw_infrared.view())?;

        let infrared_range = NormalizationRange::from_signal(raw_infrared.view(), self.target)?;
        let normalized_infrared = infrared_range.apply_all(raw_infrared.view());

        let filtered_range = NormalizationRange::from_signal(filtered.view(), self.target)?;
        let normalized_filtered = filtered_range.apply_all(filtered.view());

        let red_range = NormalizationRange::from_signal(raw_red.view(), self.target)?;
        let normalized_red = red_range.apply_all(raw_red.view());

        let peaks = self.detector.find(normalized_filtered.view(), Extremum::Peak);
        let valleys = self.detector.find(normalized_filtered.view(), Extremum::Valley);
        debug!(self.logger, "detected extrema";
            "samples" => batch.len(),
            "peaks" => peaks.len(),
            "valleys" => valleys.len());

        let fs = self.params.sampling_frequency;
        let mean_normalized_infrared = if infrared_range.is_degenerate() {
            // a flat batch sits in the middle of the target range
            self.target.midpoint()
        } else {
            mean(normalized_infrared.view())
        };

        let record = FeatureRecord {
            heart_rate_bpm: heart_rate(&peaks, fs),
            systolic_peak_amplitude: mean_at(&peaks, normalized_filtered.view()),
            diastolic_peak_amplitude: mean_at(&valleys, normalized_filtered.view()),
            mean_normalized_infrared,
            pulse_area: pulse_area(&peaks, normalized_filtered.view(), fs),
            dc_component: mean(raw_infrared.view()),
        };

        Ok(Analysis {
            record,
            raw_red,
            raw_infrared,
            normalized_red,
            normalized_infrared,
            normalized_filtered_infrared: normalized_filtered,
            peaks,
            valleys,
        })
    }
}

/// One-shot extraction with a freshly designed filter.
pub fn extract(batch: &SampleBatch, params: &Parameters) -> Result<FeatureRecord> {
    FeatureExtractor::new(params.clone())?.extract(batch)
}

fn mean(signal: ArrayView1<f64>) -> f64 {
    signal.mean().unwrap_or(f64::NAN)
}

/// Mean signal value at the given extrema; `None` without extrema.
pub fn mean_at(extrema: &PeakSet, signal: ArrayView1<f64>) -> Option<f64> {
    if extrema.is_empty() {
        return None;
    }
    let values = extrema.values_in(signal);
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Mean of the instantaneous rates `60 / Δt` over consecutive peaks.
pub fn heart_rate(peaks: &PeakSet, sampling_hz: f64) -> Option<f64> {
    if peaks.len() < 2 {
        return None;
    }
    let rates: Vec<f64> = peaks
        .intervals()
        .iter()
        .map(|&d| 60.0 / (d as f64 / sampling_hz))
        .collect();
    Some(rates.iter().sum::<f64>() / rates.len() as f64)
}

/// Mean area under `|signal|` between consecutive peaks, each beat covering
/// the half-open range from one peak up to the next.
pub fn pulse_area(peaks: &PeakSet, signal: ArrayView1<f64>, sampling_hz: f64) -> Option<f64> {
    if peaks.len() < 2 {
        return None;
    }
    let dx = 1.0 / sampling_hz;
    let areas: Vec<f64> = peaks
        .indices()
        .windows(2)
        .map(|w| {
            let beat = signal.slice(s![w[0]..w[1]]).mapv(f64::abs);
            simpson(beat.view(), dx)
        })
        .collect();
    Some(areas.iter().sum::<f64>() / areas.len() as f64)
}

/// Composite Simpson's rule on uniformly spaced samples. An even number of
/// samples gets a three-point correction on the last interval; two samples
/// fall back to the trapezoid rule.
pub fn simpson(y: ArrayView1<f64>, dx: f64) -> f64 {
    let n = y.len();
    match n {
        0 | 1 => 0.0,
        2 => dx * (y[0] + y[1]) / 2.0,
        _ if n % 2 == 1 => simpson_odd(y, dx),
        _ => {
            let head = simpson_odd(y.slice(s![..n - 1]), dx);
            head + dx * (5.0 * y[n - 1] + 8.0 * y[n - 2] - y[n - 3]) / 12.0
        }
    }
}

fn simpson_odd(y: ArrayView1<f64>, dx: f64) -> f64 {
    let n = y.len();
    let inner: f64 = y
        .iter()
        .enumerate()
        .take(n - 1)
        .skip(1)
        .map(|(i, v)| if i % 2 == 1 { 4.0 * v } else { 2.0 * v })
        .sum();
    dx / 3.0 * (y[0] + inner + y[n - 1])
}
