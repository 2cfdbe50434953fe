//! DSP Error Types

use thiserror::Error;

/// Errors that can occur when configuring DSP components
#[derive(Error, Debug)]
pub enum DspError {
    #[error("Unknown parameter '{key}' for {component}")]
    UnknownParameter {
        component: &'static str,
        key: String,
    },

    #[error("Sample rate must be positive, got {0}")]
    InvalidSampleRate(f64),
}

/// Result type alias for DSP configuration calls
pub type DspResult<T> = Result<T, DspError>;

/// Reject non-positive or non-finite sample rates
pub(crate) fn check_sample_rate(sample_rate: f64) -> DspResult<f64> {
    if sample_rate.is_finite() && sample_rate > 0.0 {
        Ok(sample_rate)
    } else {
        Err(DspError::InvalidSampleRate(sample_rate))
    }
}
