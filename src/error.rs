//! Common errors across the ames-rs crate

use itertools::Itertools;

/// Errors from the optical depth scaling and column integration
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OpticalDepthError {
    #[error("{what}: expected shape [{}] but got [{}]", .expected.iter().join(", "), .actual.iter().join(", "))]
    ShapeMismatch {
        what: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("{what} must be {expected}-D, got {actual}-D")]
    WrongDimensionality {
        what: String,
        expected: usize,
        actual: usize,
    },
    #[error("The {axis} axis has {len} value(s), at least 2 are needed to interpolate")]
    RangeDegenerate { axis: &'static str, len: usize },
    #[error("{quantity} is zero at {location}, cannot divide by it")]
    NumericDegenerate { quantity: &'static str, location: String },
    #[error("The {axis} axis must be strictly increasing, but value {index} ({next}) is not greater than the one before it ({prev})")]
    NotIncreasing {
        axis: &'static str,
        index: usize,
        prev: f64,
        next: f64,
    },
    #[error("Invalid radiative property table: {0}")]
    InvalidTable(String),
}

impl OpticalDepthError {
    pub(crate) fn shape_mismatch<S: ToString>(what: S, expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            what: what.to_string(),
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }
}
