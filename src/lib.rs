/*!
This library prepares BIO-tagged corpora for sequence labelling and compares the predictions of
several named entity recognition (NER) models. It is built with a focus on determinism: the same
input always produces the same tables, row for row.

# STAGES
The library is made of two independent stages:
* Corpus preparation: a line-oriented BIO file (one `<label> <token>` pair per line, blank lines
    between sentences) is parsed into a `TokenTable`, a flat list of `TokenRecord`s grouped by
    sentence. The distinct labels of the training split form the `LabelSet` used to configure a
    model's output vocabulary.
* Prediction comparison: the predictions of every model over the same list of sentences are
    merged into a `ComparisonTable`. Each row is a `(token, sentence)` pair and each column holds
    the label predicted by one model.

# Terminology
* A split is a named partition of the corpus, such as `train` or `test`.
* A sentence boundary is a blank line in the raw corpus. Each one increments the sentence id of
    the records following it.
* A missing prediction is a model column for which the model did not emit the exact token of the
    row. It is represented by `None` and rendered as `0` when the table is exported.

# Example
```rust
use ruseq::{aggregate, parse_split, ModelPredictions};

let lines = vec!["B-PER John\n", "O likes\n", "\n", "O Movies\n"];
let table = parse_split(&lines).unwrap();
assert_eq!(table.sentence_count(), 2);
assert_eq!(table.label_set().into_sorted_vec(), vec!["B-PER", "O"]);

let sentences = vec!["hi"];
let mut predictions = ModelPredictions::new();
predictions
    .insert("m1", vec![vec![(String::from("hi"), String::from("O"))]])
    .unwrap();
predictions
    .insert("m2", vec![vec![(String::from("hi"), String::from("B-PER"))]])
    .unwrap();
let comparison = aggregate(&sentences, &predictions).unwrap();
assert_eq!(comparison.to_string(), "Token, Sentence, m1, m2\nhi, 0, O, B-PER\n");
```
*/

mod aggregator;
mod config;
mod corpus;
mod datastructure;
mod reporter;

// The public api starts here
pub use corpus::{
    derive_label_set, parse_split, parse_split_conf, prepare, Corpus, CorpusError, LabelSet,
    PreparedCorpus, Split, SplitStats, TokenRecord,
};

pub use aggregator::{
    aggregate, AggregationError, ModelPredictions, PredictionRow, Predictor, PredictorError,
    SentencePredictions,
};

pub use datastructure::{SentencesIter, TokenTable};

pub use reporter::{ComparisonRow, ComparisonTable};

pub use config::{AggregatorConfig, AggregatorConfigBuilder, CorpusConfig, CorpusConfigBuilder};

/// Main entrypoint of the comparison stage. This function runs every predictor over the
/// sentences and merges their outputs into a single `ComparisonTable`. The predictors are run in
/// parallel when the configuration allows it; the resulting table does not depend on it.
///
/// * `predictors`: The models to compare, in the order their columns should appear.
/// * `sentences`: Raw sentences given to every model.
/// * `config`: Parameters used when collecting the predictions.
///
/// #Example
/// ```rust
/// use ruseq::{compare, AggregatorConfig, Predictor, PredictorError, SentencePredictions};
///
/// struct Whitespace(&'static str, &'static str);
///
/// impl Predictor for Whitespace {
///     fn name(&self) -> &str {
///         self.0
///     }
///     fn predict(&self, sentences: &[String]) -> Result<Vec<SentencePredictions>, PredictorError> {
///         Ok(sentences
///             .iter()
///             .map(|s| {
///                 s.split_whitespace()
///                     .map(|t| (t.to_string(), self.1.to_string()))
///                     .collect()
///             })
///             .collect())
///     }
/// }
///
/// let models = [Whitespace("all_o", "O"), Whitespace("all_per", "B-PER")];
/// let sentences = vec![String::from("Vin Diesel")];
/// let table = compare(&models, &sentences, &AggregatorConfig::default()).unwrap();
/// let expected = "Token, Sentence, all_o, all_per
/// Vin, 0, O, B-PER
/// Diesel, 0, O, B-PER\n";
/// assert_eq!(expected, table.to_string());
/// ```
pub fn compare<P: Predictor>(
    predictors: &[P],
    sentences: &[String],
    config: &AggregatorConfig,
) -> Result<ComparisonTable, AggregationError> {
    let predictions = ModelPredictions::collect(predictors, sentences, config.parallel())?;
    aggregate(sentences, &predictions)
}
