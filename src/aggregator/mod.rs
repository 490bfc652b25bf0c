/**
This module merges the predictions of several models into a single comparison table. Each row of
the table is a `(token, sentence_index)` pair and each column holds the label a model predicted
for that pair.
*/
use crate::reporter::{ComparisonRow, ComparisonTable};
use ahash::AHashMap;
use std::{error::Error, fmt::Display};
use tracing::{debug, info};

mod predictor;

// Re-exporting
pub use predictor::{
    ModelPredictions, PredictionRow, Predictor, PredictorError, SentencePredictions,
};

#[derive(Debug, Clone, PartialEq, Eq)]
/// Enum error encompassing the failures that can happen when collecting and aggregating
/// predictions.
pub enum AggregationError {
    /// A model returned a number of sentences different from the number of input sentences.
    ShapeMismatch {
        model: String,
        expected: usize,
        actual: usize,
    },
    /// The same model name was supplied twice.
    DuplicateModel(String),
    /// A predictor failed.
    Predictor { model: String, message: String },
}

impl Display for AggregationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ShapeMismatch {
                model,
                expected,
                actual,
            } => write!(
                f,
                "Inconsistent number of sentences for model {}. Expected {}, got {}",
                model, expected, actual
            ),
            Self::DuplicateModel(model) => write!(f, "Model {} was supplied twice", model),
            Self::Predictor { model, message } => {
                write!(f, "Model {} could not predict: {}", model, message)
            }
        }
    }
}

impl Error for AggregationError {}

/// Checks that every model predicted exactly one sequence per sentence.
fn check_consistent_shape(
    n_sentences: usize,
    predictions: &ModelPredictions,
) -> Result<(), AggregationError> {
    for (model, per_sentence) in predictions.iter() {
        if per_sentence.len() != n_sentences {
            return Err(AggregationError::ShapeMismatch {
                model: String::from(model),
                expected: n_sentences,
                actual: per_sentence.len(),
            });
        }
    }
    Ok(())
}

/// Merges the predictions of every model into a `ComparisonTable`. Rows are keyed by the exact
/// `(token, sentence_index)` reported by each model: tokens segmented differently by two models
/// end up in distinct rows. A model that did not predict the token of a row has a missing value in
/// that row. Rows are sorted by sentence and keep their first-insertion order inside a sentence.
///
/// * `sentences`: The sentences given to every model.
/// * `predictions`: One `SentencePredictions` per sentence, for every model.
pub fn aggregate<S: AsRef<str>>(
    sentences: &[S],
    predictions: &ModelPredictions,
) -> Result<ComparisonTable, AggregationError> {
    if predictions.is_empty() {
        return Ok(ComparisonTable::default());
    }
    check_consistent_shape(sentences.len(), predictions)?;
    let n_models = predictions.len();
    let mut positions: AHashMap<(&str, usize), usize> = AHashMap::default();
    let mut rows: Vec<ComparisonRow> = Vec::new();
    for (column, (model, per_sentence)) in predictions.iter().enumerate() {
        let mut emitted = 0usize;
        for (sentence_index, pairs) in per_sentence.iter().enumerate() {
            for (token, label) in pairs {
                let position = *positions
                    .entry((token.as_str(), sentence_index))
                    .or_insert_with(|| {
                        rows.push(ComparisonRow::new(token.clone(), sentence_index, n_models));
                        rows.len() - 1
                    });
                rows[position].labels[column] = Some(label.clone());
                emitted += 1;
            }
        }
        debug!(model, emitted, "merged predictions");
    }
    // Stable: rows of a sentence keep their insertion order.
    rows.sort_by_key(|row| row.sentence_index);
    info!(
        models = n_models,
        sentences = sentences.len(),
        rows = rows.len(),
        "aggregated predictions"
    );
    Ok(ComparisonTable::new(
        predictions.model_names().map(String::from).collect(),
        rows,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::{Gen, QuickCheck, TestResult};
    use rstest::rstest;

    fn sentence(pairs: &[(&str, &str)]) -> SentencePredictions {
        pairs
            .iter()
            .map(|(t, l)| (String::from(*t), String::from(*l)))
            .collect()
    }

    fn build_predictions(models: Vec<(&str, Vec<SentencePredictions>)>) -> ModelPredictions {
        ModelPredictions::try_from(
            models
                .into_iter()
                .map(|(m, p)| (String::from(m), p))
                .collect::<Vec<_>>(),
        )
        .unwrap()
    }

    #[test]
    fn test_aggregate_scenario() {
        let sentences = vec!["hi"];
        let predictions = build_predictions(vec![
            ("m1", vec![sentence(&[("hi", "O")])]),
            ("m2", vec![sentence(&[("hi", "B-PER")])]),
        ]);
        let table = aggregate(&sentences, &predictions).unwrap();
        assert_eq!(table.models(), &["m1", "m2"]);
        assert_eq!(
            table.rows(),
            &[ComparisonRow {
                token: String::from("hi"),
                sentence_index: 0,
                labels: vec![Some(String::from("O")), Some(String::from("B-PER"))],
            }]
        );
    }

    #[test]
    fn test_aggregate_no_model() {
        let sentences = vec!["hi", "there"];
        let table = aggregate(&sentences, &ModelPredictions::new()).unwrap();
        assert!(table.is_empty());
        assert!(table.models().is_empty());
    }

    #[rstest]
    #[case(vec![], 1)]
    #[case(vec![sentence(&[("a", "O")]), sentence(&[("b", "O")])], 1)]
    #[case(vec![sentence(&[("a", "O")])], 2)]
    fn test_aggregate_shape_mismatch(
        #[case] per_sentence: Vec<SentencePredictions>,
        #[case] n_sentences: usize,
    ) {
        let sentences = vec!["sentence"; n_sentences];
        let actual_len = per_sentence.len();
        let predictions = build_predictions(vec![
            ("ok", vec![SentencePredictions::new(); n_sentences]),
            ("broken", per_sentence),
        ]);
        let expected = Err(AggregationError::ShapeMismatch {
            model: String::from("broken"),
            expected: n_sentences,
            actual: actual_len,
        });
        assert_eq!(aggregate(&sentences, &predictions), expected);
    }

    #[test]
    fn test_single_model_one_row_per_pair() {
        let sentences = vec!["Vin Diesel movies", "best of 2015"];
        let predictions = build_predictions(vec![(
            "bert",
            vec![
                sentence(&[("Vin", "B-ACTOR"), ("Diesel", "I-ACTOR"), ("movies", "O")]),
                sentence(&[("best", "B-RATING"), ("of", "O"), ("2015", "B-YEAR")]),
            ],
        )]);
        let table = aggregate(&sentences, &predictions).unwrap();
        assert_eq!(table.len(), 6);
        assert!(table.rows().iter().all(|r| r.labels[0].is_some()));
    }

    #[test]
    fn test_superset_model_fills_missing_values() {
        let sentences = vec!["show me Vin Diesel"];
        let predictions = build_predictions(vec![
            ("a", vec![sentence(&[("Vin", "B-ACTOR")])]),
            (
                "b",
                vec![sentence(&[
                    ("show", "O"),
                    ("me", "O"),
                    ("Vin", "B-ACTOR"),
                    ("Diesel", "I-ACTOR"),
                ])],
            ),
        ]);
        let table = aggregate(&sentences, &predictions).unwrap();
        assert_eq!(table.len(), 4);
        for row in table.rows() {
            assert!(row.labels[1].is_some());
            assert_eq!(row.labels[0].is_some(), row.token == "Vin");
        }
    }

    #[test]
    fn test_model_without_predictions_keeps_its_column() {
        let sentences = vec!["hi"];
        let predictions = build_predictions(vec![
            ("silent", vec![SentencePredictions::new()]),
            ("m1", vec![sentence(&[("hi", "O")])]),
        ]);
        let table = aggregate(&sentences, &predictions).unwrap();
        assert_eq!(table.models(), &["silent", "m1"]);
        assert_eq!(table.column("silent").unwrap().collect::<Vec<_>>(), vec![None]);
    }

    #[test]
    fn test_different_segmentation_is_not_merged() {
        let sentences = vec!["New-York"];
        let predictions = build_predictions(vec![
            ("whole", vec![sentence(&[("New-York", "B-LOC")])]),
            ("split", vec![sentence(&[("New", "B-LOC"), ("-York", "I-LOC")])]),
        ]);
        let table = aggregate(&sentences, &predictions).unwrap();
        let tokens: Vec<&str> = table.rows().iter().map(|r| r.token.as_str()).collect();
        assert_eq!(tokens, vec!["New-York", "New", "-York"]);
    }

    #[test]
    fn test_rows_sorted_by_sentence_then_insertion() {
        let sentences = vec!["first", "second"];
        let predictions = build_predictions(vec![
            (
                "m1",
                vec![sentence(&[("b", "O")]), sentence(&[("z", "O"), ("y", "O")])],
            ),
            (
                "m2",
                vec![sentence(&[("a", "O"), ("b", "O")]), sentence(&[("x", "O")])],
            ),
        ]);
        let table = aggregate(&sentences, &predictions).unwrap();
        let keys: Vec<(&str, usize)> = table
            .rows()
            .iter()
            .map(|r| (r.token.as_str(), r.sentence_index))
            .collect();
        assert_eq!(
            keys,
            vec![("b", 0), ("a", 0), ("z", 1), ("y", 1), ("x", 1)]
        );
    }

    #[test]
    fn test_repeated_token_overrides_label() {
        let sentences = vec!["the best of the best"];
        let predictions = build_predictions(vec![(
            "m1",
            vec![sentence(&[("the", "O"), ("best", "O"), ("the", "B-TITLE")])],
        )]);
        let table = aggregate(&sentences, &predictions).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("the", 0).unwrap().labels[0].as_deref(), Some("B-TITLE"));
    }

    #[test]
    fn test_label_named_zero_is_not_missing() {
        let sentences = vec!["hi"];
        let predictions = build_predictions(vec![
            ("m1", vec![sentence(&[("hi", "0")])]),
            ("m2", vec![SentencePredictions::new()]),
        ]);
        let table = aggregate(&sentences, &predictions).unwrap();
        assert_eq!(
            table.rows()[0].labels,
            vec![Some(String::from("0")), None]
        );
    }

    #[test]
    fn test_duplicate_model() {
        let mut predictions = ModelPredictions::new();
        predictions.insert("m1", vec![]).unwrap();
        assert_eq!(
            predictions.insert("m1", vec![]),
            Err(AggregationError::DuplicateModel(String::from("m1")))
        );
    }

    #[test]
    fn test_prediction_rows() {
        let predictions = build_predictions(vec![
            ("m1", vec![sentence(&[("hi", "O")]), sentence(&[])]),
            ("m2", vec![sentence(&[]), sentence(&[("yo", "B-PER")])]),
        ]);
        let rows: Vec<PredictionRow> = predictions.rows().collect();
        assert_eq!(
            rows,
            vec![
                PredictionRow {
                    token: String::from("hi"),
                    label: String::from("O"),
                    sentence_index: 0,
                    model_name: String::from("m1"),
                },
                PredictionRow {
                    token: String::from("yo"),
                    label: String::from("B-PER"),
                    sentence_index: 1,
                    model_name: String::from("m2"),
                },
            ]
        );
    }

    struct Uniform {
        name: &'static str,
        label: &'static str,
        fail: bool,
    }

    impl Predictor for Uniform {
        fn name(&self) -> &str {
            self.name
        }
        fn predict(
            &self,
            sentences: &[String],
        ) -> Result<Vec<SentencePredictions>, PredictorError> {
            if self.fail {
                return Err(PredictorError(String::from("no checkpoint")));
            }
            Ok(sentences
                .iter()
                .map(|s| {
                    s.split_whitespace()
                        .map(|t| (String::from(t), String::from(self.label)))
                        .collect()
                })
                .collect())
        }
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn test_collect_keeps_model_order(#[case] parallel: bool) {
        let predictors = [
            Uniform { name: "roberta", label: "O", fail: false },
            Uniform { name: "bert", label: "B-PER", fail: false },
            Uniform { name: "distilbert", label: "I-PER", fail: false },
        ];
        let sentences = vec![String::from("Christopher Nolan"), String::from("2015")];
        let collected = ModelPredictions::collect(&predictors, &sentences, parallel).unwrap();
        assert_eq!(
            collected.model_names().collect::<Vec<_>>(),
            vec!["roberta", "bert", "distilbert"]
        );
        assert_eq!(
            collected.get("bert").unwrap()[0],
            sentence(&[("Christopher", "B-PER"), ("Nolan", "B-PER")])
        );
    }

    #[test]
    fn test_collect_reports_failing_predictor() {
        let predictors = [
            Uniform { name: "bert", label: "O", fail: false },
            Uniform { name: "roberta", label: "O", fail: true },
        ];
        let res = ModelPredictions::collect(&predictors, &[String::from("hi")], false);
        assert_eq!(
            res,
            Err(AggregationError::Predictor {
                model: String::from("roberta"),
                message: String::from("no checkpoint"),
            })
        );
    }

    /// Small vocabulary so that the generated predictions share keys between models.
    fn to_predictions(raw: Vec<Vec<Vec<(u8, u8)>>>, n_sentences: usize) -> ModelPredictions {
        const TOKENS: [&str; 4] = ["the", "movie", "Nolan", "2015"];
        const LABELS: [&str; 3] = ["O", "B-PER", "B-YEAR"];
        let mut predictions = ModelPredictions::new();
        for (m, per_sentence) in raw.into_iter().enumerate() {
            let mut per_sentence: Vec<SentencePredictions> = per_sentence
                .into_iter()
                .take(n_sentences)
                .map(|pairs| {
                    pairs
                        .into_iter()
                        .map(|(t, l)| {
                            (
                                String::from(TOKENS[t as usize % TOKENS.len()]),
                                String::from(LABELS[l as usize % LABELS.len()]),
                            )
                        })
                        .collect()
                })
                .collect();
            per_sentence.resize(n_sentences, SentencePredictions::new());
            predictions.insert(format!("model_{}", m), per_sentence).unwrap();
        }
        predictions
    }

    #[test]
    fn test_property_keys_are_unique_and_sorted() {
        fn keys_are_unique_and_sorted(raw: Vec<Vec<Vec<(u8, u8)>>>, n_sentences: u8) -> TestResult {
            let n_sentences = (n_sentences % 5) as usize;
            let predictions = to_predictions(raw, n_sentences);
            let sentences = vec![""; n_sentences];
            let table = match aggregate(&sentences, &predictions) {
                Ok(t) => t,
                Err(_) => return TestResult::failed(),
            };
            let mut keys: Vec<(&str, usize)> = table
                .rows()
                .iter()
                .map(|r| (r.token.as_str(), r.sentence_index))
                .collect();
            let is_sorted = keys.windows(2).all(|w| w[0].1 <= w[1].1);
            let distinct_pairs = predictions
                .rows()
                .map(|r| (r.token, r.sentence_index))
                .collect::<ahash::AHashSet<_>>()
                .len();
            let n_rows = keys.len();
            keys.sort_unstable();
            keys.dedup();
            TestResult::from_bool(
                is_sorted
                    && keys.len() == n_rows
                    && n_rows == distinct_pairs
                    && table.models().len() == predictions.len(),
            )
        }
        let mut qc = QuickCheck::new().tests(500).gen(Gen::new(8));
        qc.quickcheck(keys_are_unique_and_sorted as fn(Vec<Vec<Vec<(u8, u8)>>>, u8) -> TestResult)
    }

    #[test]
    fn test_property_aggregation_is_deterministic() {
        fn is_deterministic(raw: Vec<Vec<Vec<(u8, u8)>>>, n_sentences: u8) -> bool {
            let n_sentences = (n_sentences % 5) as usize;
            let predictions = to_predictions(raw, n_sentences);
            let sentences = vec![""; n_sentences];
            aggregate(&sentences, &predictions) == aggregate(&sentences, &predictions)
        }
        let mut qc = QuickCheck::new().tests(500).gen(Gen::new(8));
        qc.quickcheck(is_deterministic as fn(Vec<Vec<Vec<(u8, u8)>>>, u8) -> bool)
    }
}
