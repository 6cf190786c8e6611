//! Classifier capability.
//!
//! The engine only needs "probability of an up move" per feature row. Models
//! that can only produce a hard label are accepted too; their label maps to
//! probability 0.0 or 1.0.

use crate::features::FeatureRow;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model not found at {path}; train one first")]
    NotFound { path: PathBuf },

    #[error("model has not been fitted")]
    NotFitted,

    #[error("invalid training data: {0}")]
    InvalidData(String),

    #[error("model I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("model serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// What a model says about one row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpEstimate {
    Probability(f64),
    Label(bool),
}

impl UpEstimate {
    pub fn into_probability(self) -> f64 {
        match self {
            UpEstimate::Probability(p) => p,
            UpEstimate::Label(true) => 1.0,
            UpEstimate::Label(false) => 0.0,
        }
    }
}

pub trait DirectionModel: Send + Sync {
    fn name(&self) -> &str;

    fn estimate(&self, row: &FeatureRow) -> UpEstimate;
}

/// Score every row, one probability per row in order.
pub fn predict_probabilities(model: &dyn DirectionModel, rows: &[FeatureRow]) -> Vec<f64> {
    rows.iter()
        .map(|row| model.estimate(row).into_probability())
        .collect()
}
