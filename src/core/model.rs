use std::fmt;
use thiserror::Error;
use crate::core::features::{FeatureSchema, FeatureVector};

/// Raw output of a learned model
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    /// Class probabilities; the positive class is index 1 when present
    Probabilities(Vec<f64>),
    /// Single regression value
    Raw(f64),
}

/// Errors raised while invoking a learned model
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("feature shape mismatch: expected {expected} features, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("feature schema mismatch: model expects v{expected}, got v{actual}")]
    SchemaMismatch { expected: u32, actual: u32 },

    #[error("unsupported model output: {0}")]
    UnsupportedOutput(String),

    #[error("non-finite model output: {0}")]
    NonFinite(f64),

    #[error("model evaluation failed: {0}")]
    Evaluation(String),
}

impl ModelError {
    /// Shape, schema and output problems are recoverable; anything raised
    /// from inside the model's own evaluation is not
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ModelError::Evaluation(_))
    }
}

/// A trained donor/recipient compatibility model
///
/// Implementations are loaded once at startup and only read afterward, so
/// they must be shareable across worker threads.
pub trait CompatibilityModel: Send + Sync + fmt::Debug {
    /// Feature layout the model was trained on
    fn schema(&self) -> FeatureSchema;

    /// Run the model on one encoded pair
    fn predict(&self, features: &FeatureVector) -> Result<ModelOutput, ModelError>;
}

impl ModelOutput {
    /// Convert model output to a 0-100 compatibility score
    ///
    /// Probabilities are scaled by 100. A raw value at or below 1 is read as
    /// a probability; larger values are taken as a score already.
    pub fn to_score(&self) -> Result<f64, ModelError> {
        let score = match self {
            ModelOutput::Probabilities(probs) => {
                let positive = match probs.as_slice() {
                    [] => {
                        return Err(ModelError::UnsupportedOutput(
                            "empty probability vector".to_string(),
                        ))
                    }
                    [only] => *only,
                    [_, positive, ..] => *positive,
                };
                positive * 100.0
            }
            ModelOutput::Raw(value) => {
                if *value <= 1.0 {
                    value * 100.0
                } else {
                    *value
                }
            }
        };

        if !score.is_finite() {
            return Err(ModelError::NonFinite(score));
        }

        Ok(score.clamp(0.0, 100.0))
    }
}

/// Check that encoded features fit the layout a model expects
pub fn check_features(schema: FeatureSchema, features: &FeatureVector) -> Result<(), ModelError> {
    if features.schema() != schema {
        return Err(ModelError::SchemaMismatch {
            expected: schema.version(),
            actual: features.schema().version(),
        });
    }
    if features.len() != schema.width() {
        return Err(ModelError::ShapeMismatch {
            expected: schema.width(),
            actual: features.len(),
        });
    }
    Ok(())
}
