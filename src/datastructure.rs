use crate::corpus::{CorpusError, LabelSet, SplitStats, TokenRecord};
use itertools::Itertools;
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::slice::Iter;

/// Flat table of the records of a split. The records are stored contiguously and `indices`
/// holds the offset at which each sentence starts, followed by the total length. A sentence is
/// therefore the slice `records[indices[i]..indices[i + 1]]`.
#[derive(Debug, Eq, PartialEq, Hash, Clone, Default, Serialize, Deserialize)]
pub struct TokenTable {
    pub(crate) records: Box<[TokenRecord]>,
    pub(crate) indices: Box<[usize]>,
}

impl TokenTable {
    pub fn new(records: Vec<TokenRecord>) -> Self {
        Self::from(records)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of distinct sentence ids. Sentences left without any record (e.g. only malformed
    /// lines between two delimiters) are not counted.
    pub fn sentence_count(&self) -> usize {
        self.indices.len().saturating_sub(1)
    }

    pub fn records(&self) -> &[TokenRecord] {
        &self.records
    }

    /// Distinct labels of the table.
    pub fn label_set(&self) -> LabelSet {
        crate::corpus::derive_label_set(&self.records)
    }

    pub fn stats(&self) -> SplitStats {
        SplitStats {
            tokens: self.len(),
            sentences: self.sentence_count(),
        }
    }

    /// Keeps a random `fraction` of the records. The sampling is reproducible for a given `seed`
    /// and the kept records stay in corpus order, so the sentence grouping is preserved.
    pub fn sample(&self, fraction: f64, seed: u64) -> Result<Self, CorpusError> {
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(CorpusError::InvalidFraction(fraction));
        }
        let amount = ((self.len() as f64) * fraction).round() as usize;
        let mut rng = StdRng::seed_from_u64(seed);
        let kept: Vec<TokenRecord> = rand::seq::index::sample(&mut rng, self.len(), amount)
            .into_iter()
            .sorted_unstable()
            .map(|i| self.records[i].clone())
            .collect();
        Ok(Self::from(kept))
    }
}

impl From<Vec<TokenRecord>> for TokenTable {
    #[inline(always)]
    fn from(value: Vec<TokenRecord>) -> Self {
        let length = value.len();
        let mut indices = Vec::new();
        if length > 0 {
            indices.push(0);
            indices.extend(
                value
                    .iter()
                    .tuple_windows()
                    .positions(|(prev, next)| prev.sentence_id != next.sentence_id)
                    .map(|p| p + 1),
            );
            indices.push(length);
        }
        Self {
            records: value.into_boxed_slice(),
            indices: indices.into_boxed_slice(),
        }
    }
}

impl<'a> TokenTable {
    pub fn iter(&'a self) -> Iter<'a, TokenRecord> {
        self.records.iter()
    }
    /// Iterates over the sentences of the table. Each item holds every record sharing a
    /// `sentence_id`.
    pub fn sentences(&'a self) -> SentencesIter<'a> {
        SentencesIter::new(self)
    }
}

impl<'a> IntoIterator for &'a TokenTable {
    type Item = &'a TokenRecord;
    type IntoIter = Iter<'a, TokenRecord>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct SentencesIter<'a> {
    indice_index: usize,
    table: &'a TokenTable,
}

impl<'a> SentencesIter<'a> {
    fn new(table: &'a TokenTable) -> Self {
        Self {
            indice_index: 0,
            table,
        }
    }
}

impl<'a> Iterator for SentencesIter<'a> {
    type Item = &'a [TokenRecord];
    fn next(&mut self) -> Option<Self::Item> {
        let start = *self.table.indices.get(self.indice_index)?;
        let end = *self.table.indices.get(self.indice_index + 1)?;
        self.indice_index += 1;
        self.table.records.get(start..end)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.table.sentence_count().saturating_sub(self.indice_index);
        (remaining, Some(remaining))
    }
}

impl<'a> ExactSizeIterator for SentencesIter<'a> {}
