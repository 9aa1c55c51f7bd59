//! Fixed-shape input vector for a downstream predictive model.
//!
//! The core only assembles the vector; what the model does with it is up to
//! the implementor of [`PredictiveModel`].

use serde::{Deserialize, Serialize};

use crate::analysis::ppg::FeatureRecord;
use crate::error::{Error, Result};

/// Column names in the order of [`ModelInput::to_vector`].
pub const FEATURE_NAMES: [&str; 9] = [
    "PPG_Signal",
    "Heart_Rate",
    "Systolic_Peak",
    "Diastolic_Peak",
    "Pulse_Area",
    "Gender",
    "Age",
    "Height",
    "Weight",
];

/// Subject data collected outside the signal pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubjectMetadata {
    /// Encoded the same way as the model's training data.
    pub gender: u8,
    pub age_years: f64,
    pub height_cm: f64,
    pub weight_kg: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelInput {
    pub ppg_signal: f64,
    pub heart_rate: f64,
    pub systolic_peak: f64,
    pub diastolic_peak: f64,
    pub pulse_area: f64,
    pub subject: SubjectMetadata,
}

impl ModelInput {
    /// Combines a feature record with subject metadata. Absent features are
    /// an error; no defaults are substituted.
    pub fn assemble(record: &FeatureRecord, subject: &SubjectMetadata) -> Result<Self> {
        Ok(ModelInput {
            ppg_signal: record.mean_normalized_infrared,
            heart_rate: record.heart_rate_bpm.ok_or(Error::MissingFeature("heart_rate"))?,
            systolic_peak: record
                .systolic_peak_amplitude
                .ok_or(Error::MissingFeature("systolic_peak"))?,
            diastolic_peak: record
                .diastolic_peak_amplitude
                .ok_or(Error::MissingFeature("diastolic_peak"))?,
            pulse_area: record.pulse_area.ok_or(Error::MissingFeature("pulse_area"))?,
            subject: *subject,
        })
    }

    pub fn to_vector(&self) -> [f64; 9] {
        [
            self.ppg_signal,
            self.heart_rate,
            self.systolic_peak,
            self.diastolic_peak,
            self.pulse_area,
            self.subject.gender as f64,
            self.subject.age_years,
            self.subject.height_cm,
            self.subject.weight_kg,
        ]
    }
}

/// A model mapping one feature vector to a scalar estimate.
pub trait PredictiveModel {
    fn predict(&self, input: &ModelInput) -> Result<f64>;
}

impl<F> PredictiveModel for F
where
    F: Fn(&[f64; 9]) -> f64,
{
    fn predict(&self, input: &ModelInput) -> Result<f64> {
        let estimate = self(&input.to_vector());
        if estimate.is_finite() {
            Ok(estimate)
        } else {
            Err(Error::Model(format!("non-finite estimate {}", estimate)))
        }
    }
}
