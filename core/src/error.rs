//! Error types for the PPG feature pipeline.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid filter configuration: band {low_hz} Hz - {high_hz} Hz must lie strictly inside (0, {nyquist_hz}) Hz")]
    InvalidFilterConfig {
        low_hz: f64,
        high_hz: f64,
        nyquist_hz: f64,
    },

    #[error("Insufficient samples: need {required}, have {available}")]
    InsufficientSamples { required: usize, available: usize },

    #[error("Empty batch")]
    EmptyBatch,

    #[error("Invalid normalization target range: {min} must be below {max}")]
    InvalidTargetRange { min: f64, max: f64 },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Signal contains non-finite values")]
    NonFiniteSignal,

    #[error("Malformed sample line: {0:?}")]
    MalformedSample(String),

    #[error("Feature not available: {0}")]
    MissingFeature(&'static str),

    #[error("Model error: {0}")]
    Model(String),
}

pub type Result<T> = std::result::Result<T, Error>;
