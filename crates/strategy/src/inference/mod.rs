use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tract_onnx::prelude::*;
use tracing::{debug, error, info, warn};

use crate::features::FeatureMatrix;
use crate::filter::ClassProbabilities;

type RunnableModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Number of classes the model scores: SELL, HOLD, BUY.
pub const CLASS_COUNT: usize = 3;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("invalid input: {0}")]
    Input(String),
    #[error("model run failed: {0}")]
    Run(String),
    #[error("unexpected model output: {0}")]
    Output(String),
}

/// Scores a feature matrix, one probability row per input row.
pub trait ProbabilityModel: Send + Sync {
    fn predict_proba(
        &self,
        features: &FeatureMatrix,
    ) -> Result<Vec<ClassProbabilities>, InferenceError>;
}

#[derive(Clone)]
pub struct InferenceEngine {
    model: Option<Arc<RunnableModel>>,
}

impl InferenceEngine {
    pub fn new(model_path: &Path) -> Self {
        let model = if model_path.exists() {
            info!("Loading ONNX model from {:?}", model_path);
            match Self::load_model(model_path) {
                Ok(plan) => Some(Arc::new(plan)),
                Err(e) => {
                    error!("Failed to load model: {}", e);
                    None
                }
            }
        } else {
            warn!(
                "ONNX model not found at {:?}. Running in SIMULATION mode (every bar scores HOLD).",
                model_path
            );
            None
        };

        Self { model }
    }

    /// Engine without a model; every bar scores as a certain HOLD.
    pub fn simulation() -> Self {
        Self { model: None }
    }

    pub fn is_simulated(&self) -> bool {
        self.model.is_none()
    }

    fn load_model(path: &Path) -> TractResult<RunnableModel> {
        let model = tract_onnx::onnx()
            .model_for_path(path)?
            .into_optimized()?
            .into_runnable()?;
        Ok(model)
    }

    fn run(
        model: &RunnableModel,
        features: &FeatureMatrix,
    ) -> Result<Vec<ClassProbabilities>, InferenceError> {
        let rows = features.nrows();
        let input =
            tract_ndarray::Array2::from_shape_vec(features.dim(), features.iter().copied().collect())
                .map_err(|e| InferenceError::Input(e.to_string()))?
                .into_tensor();

        let outputs = model
            .run(tvec!(input.into()))
            .map_err(|e| InferenceError::Run(e.to_string()))?;

        // Classifier exports carry a label output next to the probabilities;
        // take the first [rows, 3] float tensor.
        let probabilities = outputs
            .iter()
            .filter_map(|t| t.to_array_view::<f32>().ok())
            .find(|view| view.shape() == [rows, CLASS_COUNT])
            .ok_or_else(|| {
                InferenceError::Output(format!("no [{}, {}] probability tensor", rows, CLASS_COUNT))
            })?;

        Ok(probabilities
            .outer_iter()
            .map(|row| {
                // row length is CLASS_COUNT, checked above
                let v: Vec<f32> = row.iter().copied().collect();
                ClassProbabilities::from_row([v[0], v[1], v[2]])
            })
            .collect())
    }
}

impl ProbabilityModel for InferenceEngine {
    fn predict_proba(
        &self,
        features: &FeatureMatrix,
    ) -> Result<Vec<ClassProbabilities>, InferenceError> {
        if features.nrows() == 0 {
            return Ok(Vec::new());
        }

        match &self.model {
            Some(model) => {
                let probs = Self::run(model, features)?;
                debug!("Scored {} rows", probs.len());
                Ok(probs)
            }
            None => Ok(vec![ClassProbabilities::CERTAIN_HOLD; features.nrows()]),
        }
    }
}
