//! Feature extraction for dual-channel (red / infrared) optical pulse sensors.
//!
//! A [`SampleBatch`] goes through a zero-phase bandpass, batch-local min-max
//! normalization and peak/valley detection, and comes out as a
//! [`FeatureRecord`]: heart rate, systolic and diastolic amplitude, mean
//! normalized signal, pulse area and DC level.

pub mod analysis;
pub mod error;
pub mod log;
pub mod mock;
pub mod model;
pub mod sample;

pub use analysis::{Analysis, FeatureExtractor, FeatureRecord, Parameters};
pub use error::{Error, Result};
pub use sample::{SampleBatch, SamplePair};
