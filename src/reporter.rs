/**
This modules gives a few tools to prettyprint and export the comparison of several models.
*/
use crate::config::DEFAULT_MISSING_VALUE;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::io;

/// A `(token, sentence)` pair and the label predicted for it by every model. `labels[i]` is the
/// label of the i-th model of the table, or `None` if that model did not predict this exact
/// token in this sentence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub token: String,
    pub sentence_index: usize,
    pub labels: Vec<Option<String>>,
}

impl ComparisonRow {
    /// Row without any prediction.
    pub(crate) fn new(token: String, sentence_index: usize, n_models: usize) -> Self {
        Self {
            token,
            sentence_index,
            labels: vec![None; n_models],
        }
    }

    /// Do all the models that predicted this token agree?
    pub fn is_unanimous(&self) -> bool {
        self.labels.iter().flatten().all_equal()
    }

    fn labels_or<'a>(&'a self, missing_value: &'a str) -> impl Iterator<Item = &'a str> {
        self.labels
            .iter()
            .map(move |l| l.as_deref().unwrap_or(missing_value))
    }
}

/// The ComparisonRow struct acts as a line in a dataframe when displayed.
impl Display for ComparisonRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.token, self.sentence_index)?;
        for label in self.labels_or(DEFAULT_MISSING_VALUE) {
            write!(f, ", {}", label)?
        }
        Ok(())
    }
}

/// The comparison table holds one column per model and one row per `(token, sentence)` pair
/// predicted by at least one model. It can be displayed as if it was a dataframe or exported as
/// CSV. It is built with the `aggregate` function.
///
/// # Example
///
/// ```rust
/// use ruseq::{aggregate, ModelPredictions};
///
/// let sentences = vec!["Vin Diesel"];
/// let mut predictions = ModelPredictions::new();
/// predictions
///     .insert("bert", vec![vec![(String::from("Vin"), String::from("B-ACTOR"))]])
///     .unwrap();
/// predictions
///     .insert(
///         "roberta",
///         vec![vec![
///             (String::from("Vin"), String::from("B-ACTOR")),
///             (String::from("Diesel"), String::from("I-ACTOR")),
///         ]],
///     )
///     .unwrap();
///
/// let table = aggregate(&sentences, &predictions).unwrap();
///
/// let expected_table =
/// "Token, Sentence, bert, roberta
/// Vin, 0, B-ACTOR, B-ACTOR
/// Diesel, 0, 0, I-ACTOR\n";
///
/// assert_eq!(expected_table, table.to_string());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ComparisonTable {
    models: Vec<String>,
    rows: Vec<ComparisonRow>,
}

impl ComparisonTable {
    pub(crate) fn new(models: Vec<String>, rows: Vec<ComparisonRow>) -> Self {
        Self { models, rows }
    }

    /// Model names, in column order.
    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn rows(&self) -> &[ComparisonRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row of `token` in sentence `sentence_index`, if any model predicted it.
    pub fn get(&self, token: &str, sentence_index: usize) -> Option<&ComparisonRow> {
        self.rows
            .iter()
            .find(|r| r.sentence_index == sentence_index && r.token == token)
    }

    /// Labels of a model, row by row. Returns `None` if the model is not part of the table.
    pub fn column<'a>(&'a self, model: &str) -> Option<impl Iterator<Item = Option<&'a str>>> {
        let index = self.models.iter().position(|m| m == model)?;
        Some(self.rows.iter().map(move |r| r.labels[index].as_deref()))
    }

    /// Rows on which at least two models predicted different labels.
    pub fn disagreements(&self) -> impl Iterator<Item = &ComparisonRow> {
        self.rows.iter().filter(|r| !r.is_unanimous())
    }

    /// Writes the table as CSV: a `token` and a `sentence` column followed by one column per
    /// model, in table order. Missing predictions are written as `missing_value`.
    pub fn write_csv<W: io::Write>(&self, writer: W, missing_value: &str) -> Result<(), csv::Error> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(
            ["token", "sentence"]
                .into_iter()
                .chain(self.models.iter().map(String::as_str)),
        )?;
        for row in self.rows.iter() {
            let sentence = row.sentence_index.to_string();
            wtr.write_record(
                [row.token.as_str(), sentence.as_str()]
                    .into_iter()
                    .chain(row.labels_or(missing_value)),
            )?;
        }
        wtr.flush()?;
        Ok(())
    }
}

impl<'a> IntoIterator for &'a ComparisonTable {
    type Item = &'a ComparisonRow;
    type IntoIter = std::slice::Iter<'a, ComparisonRow>;
    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// The ComparisonTable struct acts as a dataframe when displayed.
impl Display for ComparisonTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Token, Sentence")?;
        for model in self.models.iter() {
            write!(f, ", {}", model)?
        }
        writeln!(f)?;
        for row in self.rows.iter() {
            writeln!(f, "{}", row)?
        }
        Ok(())
    }
}
