use crate::aggregator::AggregationError;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::{error::Error, fmt::Display};
use tracing::info;

/// Ordered `(token, label)` pairs predicted by a model for a single sentence.
pub type SentencePredictions = Vec<(String, String)>;

/// A model able to tag sentences. The tokenization is left to the model: two predictors can split
/// the same sentence differently.
pub trait Predictor: Sync {
    /// Name of the model. It becomes the header of the model's column.
    fn name(&self) -> &str;
    /// Returns one `SentencePredictions` per input sentence, in input order.
    fn predict(&self, sentences: &[String]) -> Result<Vec<SentencePredictions>, PredictorError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Failure reported by a `Predictor`.
pub struct PredictorError(pub String);

impl Display for PredictorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Error for PredictorError {}

/// One predicted label, flattened out of a `ModelPredictions`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PredictionRow {
    pub token: String,
    pub label: String,
    pub sentence_index: usize,
    pub model_name: String,
}

/// Predictions of every model, in the order the models were supplied. A model name appears at
/// most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelPredictions {
    models: Vec<(String, Vec<SentencePredictions>)>,
}

impl ModelPredictions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the predictions of a model. Returns `DuplicateModel` if the model was already added.
    pub fn insert<S: Into<String>>(
        &mut self,
        model: S,
        predictions: Vec<SentencePredictions>,
    ) -> Result<(), AggregationError> {
        let model = model.into();
        if self.models.iter().any(|(name, _)| *name == model) {
            return Err(AggregationError::DuplicateModel(model));
        }
        self.models.push((model, predictions));
        Ok(())
    }

    /// Number of models.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(|(name, _)| name.as_str())
    }

    pub fn get(&self, model: &str) -> Option<&[SentencePredictions]> {
        self.models
            .iter()
            .find(|(name, _)| name == model)
            .map(|(_, predictions)| predictions.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[SentencePredictions])> {
        self.models
            .iter()
            .map(|(name, predictions)| (name.as_str(), predictions.as_slice()))
    }

    /// Flattens the predictions into one row per predicted token, model after model.
    pub fn rows(&self) -> impl Iterator<Item = PredictionRow> + '_ {
        self.iter().flat_map(|(model, per_sentence)| {
            per_sentence
                .iter()
                .enumerate()
                .flat_map(move |(sentence_index, pairs)| {
                    pairs.iter().map(move |(token, label)| PredictionRow {
                        token: token.clone(),
                        label: label.clone(),
                        sentence_index,
                        model_name: String::from(model),
                    })
                })
        })
    }

    /// Runs every predictor over `sentences`. With `parallel`, the predictors run concurrently;
    /// the models keep the order of `predictors` either way.
    pub fn collect<P: Predictor>(
        predictors: &[P],
        sentences: &[String],
        parallel: bool,
    ) -> Result<Self, AggregationError> {
        let run = |p: &P| (String::from(p.name()), p.predict(sentences));
        let outputs: Vec<_> = if parallel {
            predictors.par_iter().map(run).collect()
        } else {
            predictors.iter().map(run).collect()
        };
        let mut collected = Self::new();
        for (model, output) in outputs {
            let predictions = output.map_err(|err| AggregationError::Predictor {
                model: model.clone(),
                message: err.to_string(),
            })?;
            info!(model = %model, sentences = predictions.len(), "collected predictions");
            collected.insert(model, predictions)?;
        }
        Ok(collected)
    }
}

impl TryFrom<Vec<(String, Vec<SentencePredictions>)>> for ModelPredictions {
    type Error = AggregationError;
    fn try_from(value: Vec<(String, Vec<SentencePredictions>)>) -> Result<Self, Self::Error> {
        let mut predictions = Self::new();
        for (model, per_sentence) in value {
            predictions.insert(model, per_sentence)?;
        }
        Ok(predictions)
    }
}
